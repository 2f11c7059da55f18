use super::error::ValidationError;
use super::types::{ConditionTable, ValidatedInput};

// Quantity is checked first, so input wrong on both counts reports the number.
pub fn validate(
    raw_quantity: &str,
    raw_condition: &str,
    conditions: &ConditionTable,
) -> Result<ValidatedInput, ValidationError> {
    let quantity = parse_quantity(raw_quantity)?;
    let condition = conditions
        .find(raw_condition)
        .ok_or_else(|| ValidationError::UnknownCondition {
            input: raw_condition.to_string(),
            allowed: conditions.keys(),
        })?;

    Ok(ValidatedInput {
        quantity,
        condition: condition.key.clone(),
    })
}

/// Largest accepted reading in kWh. Keeps every tier, surcharge and tax value
/// finite for any table the checked constructors accept.
pub const MAX_QUANTITY: f64 = 1.0e12;

pub fn parse_quantity(raw: &str) -> Result<f64, ValidationError> {
    let normalized = raw.trim().replace(',', ".");
    let value = normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v <= MAX_QUANTITY)
        .ok_or_else(|| ValidationError::InvalidNumber {
            input: raw.to_string(),
        })?;

    if value < 0.0 {
        return Err(ValidationError::NegativeValue { value });
    }
    // -0.0 would otherwise leak into the bill as "-0.00".
    Ok(value.abs())
}
