use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid number '{input}': enter a valid consumption in kWh")]
    InvalidNumber { input: String },

    #[error("consumption must be >= 0, got {value}")]
    NegativeValue { value: f64 },

    #[error("unknown tariff flag '{input}'; use one of: {}", .allowed.join(", "))]
    UnknownCondition { input: String, allowed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("tariff table has no tiers")]
    EmptyTariff,

    #[error("first tier must start at 0, starts at {lower}")]
    TariffNotFromZero { lower: f64 },

    #[error("tier {index} is empty: lower {lower} >= upper {upper}")]
    EmptyTier { index: usize, lower: f64, upper: f64 },

    #[error("tier {index} ends at {upper} but the next tier starts at {next_lower}")]
    Gap {
        index: usize,
        upper: f64,
        next_lower: f64,
    },

    #[error("tier {index} is unbounded but is not the last tier")]
    UnboundedBeforeEnd { index: usize },

    #[error("last tier must be unbounded")]
    BoundedLastTier,

    #[error("tier {index} has invalid unit price {price}")]
    InvalidPrice { index: usize, price: f64 },

    #[error("condition table has no entries")]
    EmptyConditions,

    #[error("condition '{key}' has invalid rate {rate}")]
    InvalidConditionRate { key: String, rate: f64 },

    #[error("tax '{name}' rate {rate} is outside [0, 1)")]
    InvalidTaxRate { name: String, rate: f64 },

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),
}

/// Arithmetic inconsistency in a computed bill. Always a defect, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("grand total {grand_total} differs from recomputed {recomputed} by more than {tolerance}")]
    TotalMismatch {
        grand_total: f64,
        recomputed: f64,
        tolerance: f64,
    },

    #[error("grand total {0} is negative")]
    NegativeTotal(f64),

    #[error("grand total is not finite")]
    NonFiniteTotal,
}
