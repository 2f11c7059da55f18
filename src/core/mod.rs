mod engine;
mod error;
mod invariants;
mod types;
mod validate;

pub use engine::{aggregate, compute_bill, compute_bill_with, compute_taxes, decompose, surcharge};
pub use error::{InvariantViolation, TableError, ValidationError};
pub use invariants::{TOTAL_TOLERANCE, check_invariants, verify};
pub use types::{
    BillResult, ConditionRate, ConditionTable, MAX_CONDITION_RATE, MAX_UNIT_PRICE, SurchargeBasis,
    Tariff, TariffTable, TaxLine, TaxRate, TaxTable, Tier, TierLine, ValidatedInput,
};
pub use validate::{MAX_QUANTITY, parse_quantity, validate};
