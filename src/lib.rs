//! Electricity bill calculation: tiered kWh pricing, tariff-flag surcharge,
//! proportional taxes and a self-check of the resulting totals.
//!
//! [`core`] is pure and synchronous. [`api`] is the CLI and HTTP front end.

pub mod api;
pub mod core;

pub use crate::core::{BillResult, ValidationError, check_invariants, compute_bill};
