use serde::Serialize;
use std::sync::LazyLock;

use super::error::TableError;

pub const MAX_UNIT_PRICE: f64 = 1.0e6;
pub const MAX_CONDITION_RATE: f64 = 1.0e6;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub lower: f64,
    // None marks the open-ended top tier.
    pub upper: Option<f64>,
    pub unit_price: f64,
}

impl Tier {
    pub fn label(&self) -> String {
        match self.upper {
            Some(upper) => format!("{}-{} kWh", self.lower, upper),
            None => format!("{}-∞ kWh", self.lower),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TariffTable {
    tiers: Vec<Tier>,
}

impl TariffTable {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, TableError> {
        let Some(first) = tiers.first() else {
            return Err(TableError::EmptyTariff);
        };
        if first.lower != 0.0 {
            return Err(TableError::TariffNotFromZero { lower: first.lower });
        }

        let last = tiers.len() - 1;
        for (index, tier) in tiers.iter().enumerate() {
            if !(0.0..=MAX_UNIT_PRICE).contains(&tier.unit_price) {
                return Err(TableError::InvalidPrice {
                    index,
                    price: tier.unit_price,
                });
            }
            match tier.upper {
                None if index != last => return Err(TableError::UnboundedBeforeEnd { index }),
                None => {}
                Some(_) if index == last => return Err(TableError::BoundedLastTier),
                Some(upper) => {
                    if !upper.is_finite() || upper <= tier.lower {
                        return Err(TableError::EmptyTier {
                            index,
                            lower: tier.lower,
                            upper,
                        });
                    }
                    let next_lower = tiers[index + 1].lower;
                    if next_lower != upper {
                        return Err(TableError::Gap {
                            index,
                            upper,
                            next_lower,
                        });
                    }
                }
            }
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurchargeBasis {
    #[default]
    Subtotal,
    PerUnit,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRate {
    pub key: String,
    pub rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionTable {
    basis: SurchargeBasis,
    conditions: Vec<ConditionRate>,
}

impl ConditionTable {
    pub fn new(basis: SurchargeBasis, conditions: Vec<ConditionRate>) -> Result<Self, TableError> {
        if conditions.is_empty() {
            return Err(TableError::EmptyConditions);
        }
        for (index, condition) in conditions.iter().enumerate() {
            if !(0.0..=MAX_CONDITION_RATE).contains(&condition.rate) {
                return Err(TableError::InvalidConditionRate {
                    key: condition.key.clone(),
                    rate: condition.rate,
                });
            }
            let duplicate = conditions[..index]
                .iter()
                .any(|earlier| same_key(&earlier.key, &condition.key));
            if duplicate {
                return Err(TableError::DuplicateKey(condition.key.clone()));
            }
        }
        Ok(Self { basis, conditions })
    }

    pub fn basis(&self) -> SurchargeBasis {
        self.basis
    }

    pub fn with_basis(&self, basis: SurchargeBasis) -> Self {
        Self {
            basis,
            conditions: self.conditions.clone(),
        }
    }

    pub fn conditions(&self) -> &[ConditionRate] {
        &self.conditions
    }

    pub fn find(&self, key: &str) -> Option<&ConditionRate> {
        let key = key.trim();
        self.conditions
            .iter()
            .find(|condition| same_key(&condition.key, key))
    }

    pub fn rate(&self, key: &str) -> Option<f64> {
        self.find(key).map(|condition| condition.rate)
    }

    pub fn keys(&self) -> Vec<String> {
        self.conditions.iter().map(|c| c.key.clone()).collect()
    }
}

fn same_key(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRate {
    pub name: String,
    pub rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TaxTable {
    taxes: Vec<TaxRate>,
}

impl TaxTable {
    pub fn new(taxes: Vec<TaxRate>) -> Result<Self, TableError> {
        for (index, tax) in taxes.iter().enumerate() {
            if !(0.0..1.0).contains(&tax.rate) {
                return Err(TableError::InvalidTaxRate {
                    name: tax.name.clone(),
                    rate: tax.rate,
                });
            }
            if taxes[..index].iter().any(|earlier| earlier.name == tax.name) {
                return Err(TableError::DuplicateKey(tax.name.clone()));
            }
        }
        Ok(Self { taxes })
    }

    pub fn taxes(&self) -> &[TaxRate] {
        &self.taxes
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        self.taxes.iter().find(|t| t.name == name).map(|t| t.rate)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub tiers: TariffTable,
    pub conditions: ConditionTable,
    pub taxes: TaxTable,
}

impl Tariff {
    pub fn standard() -> &'static Tariff {
        &STANDARD_TARIFF
    }

    pub fn with_surcharge_basis(&self, basis: SurchargeBasis) -> Tariff {
        Tariff {
            tiers: self.tiers.clone(),
            conditions: self.conditions.with_basis(basis),
            taxes: self.taxes.clone(),
        }
    }
}

const STANDARD_TIERS: [Tier; 4] = [
    Tier {
        lower: 0.0,
        upper: Some(100.0),
        unit_price: 0.50,
    },
    Tier {
        lower: 100.0,
        upper: Some(200.0),
        unit_price: 0.75,
    },
    Tier {
        lower: 200.0,
        upper: Some(500.0),
        unit_price: 1.00,
    },
    Tier {
        lower: 500.0,
        upper: None,
        unit_price: 1.35,
    },
];

const STANDARD_FLAGS: [(&str, f64); 3] = [("green", 0.0), ("yellow", 0.05), ("red", 0.10)];

const STANDARD_TAXES: [(&str, f64); 3] = [("ICMS", 0.18), ("PIS", 0.0165), ("COFINS", 0.0761)];

static STANDARD_TARIFF: LazyLock<Tariff> = LazyLock::new(|| Tariff {
    tiers: TariffTable {
        tiers: STANDARD_TIERS.to_vec(),
    },
    conditions: ConditionTable {
        basis: SurchargeBasis::Subtotal,
        conditions: STANDARD_FLAGS
            .iter()
            .map(|&(key, rate)| ConditionRate {
                key: key.to_string(),
                rate,
            })
            .collect(),
    },
    taxes: TaxTable {
        taxes: STANDARD_TAXES
            .iter()
            .map(|&(name, rate)| TaxRate {
                name: name.to_string(),
                rate,
            })
            .collect(),
    },
});

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedInput {
    pub quantity: f64,
    pub condition: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLine {
    pub label: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLine {
    pub name: String,
    pub rate: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResult {
    pub quantity: f64,
    pub condition: String,
    pub tiers: Vec<TierLine>,
    pub subtotal: f64,
    pub surcharge: f64,
    pub tax_base: f64,
    pub taxes: Vec<TaxLine>,
    pub total_tax: f64,
    pub grand_total: f64,
}
