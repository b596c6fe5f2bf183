use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::error::ConfigError;

/// One step of the progressive personal income tax schedule.
///
/// `limit` is inclusive: an assessable income equal to the limit still
/// falls into this bracket. The top bracket has `limit = f64::INFINITY`,
/// which is written as `null` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxBracket {
    #[serde(serialize_with = "serialize_limit", deserialize_with = "deserialize_limit")]
    #[schema(example = 5000000.0, nullable = true, value_type = Option<f64>)]
    pub limit: f64,

    #[schema(example = 0.05)]
    pub rate: f64,

    #[schema(example = 0.0)]
    pub deduction: f64,
}

fn serialize_limit<S: Serializer>(limit: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if limit.is_finite() {
        serializer.serialize_some(limit)
    } else {
        serializer.serialize_none()
    }
}

fn deserialize_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl TaxBracket {
    pub const fn new(limit: f64, rate: f64, deduction: f64) -> Self {
        Self {
            limit,
            rate,
            deduction,
        }
    }
}

/// Vietnamese PIT schedule (VND, 2024).
pub const VN_2024_BRACKETS: [TaxBracket; 7] = [
    TaxBracket::new(5_000_000.0, 0.05, 0.0),
    TaxBracket::new(10_000_000.0, 0.10, 250_000.0),
    TaxBracket::new(18_000_000.0, 0.15, 750_000.0),
    TaxBracket::new(32_000_000.0, 0.20, 1_650_000.0),
    TaxBracket::new(52_000_000.0, 0.25, 3_250_000.0),
    TaxBracket::new(80_000_000.0, 0.30, 5_850_000.0),
    TaxBracket::new(f64::INFINITY, 0.35, 9_850_000.0),
];

/// Validated, ascending bracket table. Every non-negative income matches
/// exactly one bracket.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxTable {
    brackets: Vec<TaxBracket>,
}

impl TaxTable {
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, ConfigError> {
        let Some(last) = brackets.last() else {
            return Err(ConfigError::EmptyTaxTable);
        };
        if last.limit != f64::INFINITY {
            return Err(ConfigError::UnboundedTopBracketMissing);
        }

        let top = brackets.len() - 1;
        for (index, bracket) in brackets.iter().enumerate() {
            if index < top && !bracket.limit.is_finite() {
                return Err(ConfigError::InvalidLimit {
                    index,
                    limit: bracket.limit,
                });
            }
            if !bracket.deduction.is_finite() || bracket.deduction < 0.0 {
                return Err(ConfigError::InvalidDeduction {
                    index,
                    deduction: bracket.deduction,
                });
            }
            if !(0.0..=1.0).contains(&bracket.rate) {
                return Err(ConfigError::InvalidRate {
                    index,
                    rate: bracket.rate,
                });
            }
            if index > 0 && bracket.limit <= brackets[index - 1].limit {
                return Err(ConfigError::UnorderedBrackets { index });
            }
        }

        Ok(Self { brackets })
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// First bracket whose limit is at or above `income`.
    pub fn bracket_for(&self, income: f64) -> &TaxBracket {
        self.brackets
            .iter()
            .find(|b| income <= b.limit)
            // the top bracket is unbounded, so only NaN gets here
            .unwrap_or(&self.brackets[self.brackets.len() - 1])
    }
}

impl Default for TaxTable {
    fn default() -> Self {
        Self {
            brackets: VN_2024_BRACKETS.to_vec(),
        }
    }
}
