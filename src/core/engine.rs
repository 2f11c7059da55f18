use tracing::{debug, warn};

use super::error::ValidationError;
use super::types::{
    BillResult, ConditionTable, SurchargeBasis, Tariff, TariffTable, TaxLine, TaxTable, TierLine,
    ValidatedInput,
};
use super::validate::validate;

pub fn compute_bill(raw_quantity: &str, raw_condition: &str) -> Result<BillResult, ValidationError> {
    compute_bill_with(Tariff::standard(), raw_quantity, raw_condition)
}

pub fn compute_bill_with(
    tariff: &Tariff,
    raw_quantity: &str,
    raw_condition: &str,
) -> Result<BillResult, ValidationError> {
    let input = match validate(raw_quantity, raw_condition, &tariff.conditions) {
        Ok(input) => input,
        Err(err) => {
            warn!(raw_quantity, raw_condition, error = %err, "rejected bill input");
            return Err(err);
        }
    };

    let tiers = decompose(input.quantity, &tariff.tiers);
    let subtotal = sum_tier_values(&tiers);
    let base = match tariff.conditions.basis() {
        SurchargeBasis::Subtotal => subtotal,
        SurchargeBasis::PerUnit => input.quantity,
    };
    let Some(surcharge) = surcharge(base, &input.condition, &tariff.conditions) else {
        return Err(ValidationError::UnknownCondition {
            input: input.condition,
            allowed: tariff.conditions.keys(),
        });
    };
    let taxes = compute_taxes(subtotal + surcharge, &tariff.taxes);
    let result = aggregate(input, tiers, surcharge, taxes);

    debug!(
        quantity = result.quantity,
        condition = %result.condition,
        subtotal = result.subtotal,
        surcharge = result.surcharge,
        total_tax = result.total_tax,
        grand_total = result.grand_total,
        "computed bill"
    );
    Ok(result)
}

// The first tier is always present so a zero reading still has a line to show.
pub fn decompose(quantity: f64, table: &TariffTable) -> Vec<TierLine> {
    let mut lines = Vec::new();
    for (index, tier) in table.tiers().iter().enumerate() {
        let ceiling = tier.upper.map_or(quantity, |upper| quantity.min(upper));
        let in_tier = (ceiling - tier.lower).max(0.0);
        if in_tier > 0.0 || index == 0 {
            lines.push(TierLine {
                label: tier.label(),
                quantity: in_tier,
                unit_price: tier.unit_price,
                value: in_tier * tier.unit_price,
            });
        }
        if tier.upper.is_none_or(|upper| quantity <= upper) {
            break;
        }
    }
    lines
}

pub fn surcharge(base: f64, condition: &str, table: &ConditionTable) -> Option<f64> {
    let rate = table.rate(condition)?;
    Some(if rate == 0.0 { 0.0 } else { base * rate })
}

pub fn compute_taxes(base: f64, table: &TaxTable) -> Vec<TaxLine> {
    table
        .taxes()
        .iter()
        .map(|tax| TaxLine {
            name: tax.name.clone(),
            rate: tax.rate,
            value: base * tax.rate,
        })
        .collect()
}

pub fn aggregate(
    input: ValidatedInput,
    tiers: Vec<TierLine>,
    surcharge: f64,
    taxes: Vec<TaxLine>,
) -> BillResult {
    let subtotal = sum_tier_values(&tiers);
    let total_tax = sum_tax_values(&taxes);
    let tax_base = subtotal + surcharge;

    BillResult {
        quantity: input.quantity,
        condition: input.condition,
        tiers,
        subtotal,
        surcharge,
        tax_base,
        taxes,
        total_tax,
        grand_total: tax_base + total_tax,
    }
}

pub(crate) fn sum_tier_values(tiers: &[TierLine]) -> f64 {
    tiers.iter().fold(0.0, |acc, line| acc + line.value)
}

pub(crate) fn sum_tax_values(taxes: &[TaxLine]) -> f64 {
    taxes.iter().fold(0.0, |acc, line| acc + line.value)
}
