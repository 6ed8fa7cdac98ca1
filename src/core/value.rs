// src/core/value.rs
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{ExplainError, Result};

/// The kind of a feature or output value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Number,
    Boolean,
    Categorical,
}

/// A typed scalar carried by features and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Categorical(String),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Number(_) => Kind::Number,
            Value::Boolean(_) => Kind::Boolean,
            Value::Categorical(_) => Kind::Categorical,
        }
    }

    /// Numeric encoding: numbers as-is, booleans as 1/0, categorical values have none.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Categorical(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Categorical(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{:.4}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Categorical(s) => write!(f, "{}", s),
        }
    }
}

/// The set of values a feature may take during search.
///
/// Deserialized domains go through [`Domain::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DomainRepr")]
pub enum Domain {
    /// Closed numeric interval `[lower, upper]`.
    Numeric { lower: f64, upper: f64 },
    /// Explicit set of admissible values (categorical levels or discrete numbers).
    Set(Vec<Value>),
}

#[derive(Deserialize)]
enum DomainRepr {
    Numeric { lower: f64, upper: f64 },
    Set(Vec<Value>),
}

impl TryFrom<DomainRepr> for Domain {
    type Error = ExplainError;

    fn try_from(repr: DomainRepr) -> Result<Self> {
        match repr {
            DomainRepr::Numeric { lower, upper } => Domain::numeric(lower, upper),
            DomainRepr::Set(values) => Domain::set(values),
        }
    }
}

impl Domain {
    pub fn numeric(lower: f64, upper: f64) -> Result<Self> {
        let domain = Domain::Numeric { lower, upper };
        domain.validate()?;
        Ok(domain)
    }

    pub fn set<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Result<Self> {
        let domain = Domain::Set(values.into_iter().map(Into::into).collect());
        domain.validate()?;
        Ok(domain)
    }

    /// Numeric bounds must be finite and ordered, sets non-empty.
    pub fn validate(&self) -> Result<()> {
        match self {
            Domain::Numeric { lower, upper } => {
                if !(lower.is_finite() && upper.is_finite()) || lower > upper {
                    return Err(ExplainError::Configuration(format!(
                        "Invalid numeric domain [{}, {}]",
                        lower, upper
                    )));
                }
            }
            Domain::Set(values) => {
                if values.is_empty() {
                    return Err(ExplainError::Configuration(
                        "A set domain needs at least one value".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Domain::Numeric { lower, upper }, Value::Number(v)) => *v >= *lower && *v <= *upper,
            (Domain::Numeric { .. }, _) => false,
            (Domain::Set(values), v) => values.contains(v),
        }
    }

    /// A singleton domain pins the feature to one value.
    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::Numeric { lower, upper } => lower == upper,
            Domain::Set(values) => values.len() == 1,
        }
    }

    /// Width used to normalise numeric change magnitudes.
    pub fn span(&self) -> Option<f64> {
        match self {
            Domain::Numeric { lower, upper } => Some(upper - lower),
            Domain::Set(values) => {
                let nums: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
                if nums.len() != values.len() || nums.is_empty() {
                    return None;
                }
                let lo = nums.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                Some(hi - lo)
            }
        }
    }

    /// Uniform draw from the domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Domain::Numeric { lower, upper } => {
                if lower == upper {
                    Value::Number(*lower)
                } else {
                    Value::Number(rng.gen_range(*lower..=*upper))
                }
            }
            // `set` rejects empty domains, the fallback only covers hand-built ones
            Domain::Set(values) => values
                .choose(rng)
                .cloned()
                .unwrap_or(Value::Number(f64::NAN)),
        }
    }

    /// Draw a value different from `current` when the domain allows it.
    pub fn sample_other<R: Rng + ?Sized>(&self, current: &Value, rng: &mut R) -> Value {
        match self {
            Domain::Set(values) => {
                let others: Vec<&Value> = values.iter().filter(|v| *v != current).collect();
                match others.choose(rng) {
                    Some(v) => (*v).clone(),
                    None => current.clone(),
                }
            }
            Domain::Numeric { .. } => self.sample(rng),
        }
    }
}
