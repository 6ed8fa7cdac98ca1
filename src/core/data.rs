// src/core/data.rs
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::{Domain, ExplainError, Kind, Result, Value};

/// A numeric matrix, one encoded data point per row.
pub type Dataset = Array2<f64>;

/// A named model input. Immutable once built; `with_domain` validates the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureRepr")]
pub struct Feature {
    name: String,
    value: Value,
    domain: Option<Domain>,
    constrained: bool,
}

#[derive(Deserialize)]
struct FeatureRepr {
    name: String,
    value: Value,
    domain: Option<Domain>,
    #[serde(default)]
    constrained: bool,
}

impl TryFrom<FeatureRepr> for Feature {
    type Error = ExplainError;

    fn try_from(repr: FeatureRepr) -> Result<Self> {
        let feature = Feature {
            constrained: repr.constrained,
            ..Feature::new(repr.name, repr.value)
        };
        match repr.domain {
            Some(domain) => feature.with_domain(domain),
            None => Ok(feature),
        }
    }
}

impl Feature {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Feature {
            name: name.into(),
            value: value.into(),
            domain: None,
            constrained: false,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Value::Number(value))
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, Value::Boolean(value))
    }

    pub fn categorical(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::Categorical(value.into()))
    }

    /// Attach a search domain. Fails when the domain is malformed or the
    /// current value lies outside it.
    pub fn with_domain(mut self, domain: Domain) -> Result<Self> {
        domain.validate()?;
        if !domain.contains(&self.value) {
            return Err(ExplainError::InvalidValue(format!(
                "Feature '{}' value {} is outside its domain {:?}",
                self.name, self.value, domain
            )));
        }
        self.domain = Some(domain);
        Ok(self)
    }

    /// Mark the feature as fixed: searches never change it.
    pub fn constrained(mut self) -> Self {
        self.constrained = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    pub fn domain(&self) -> Option<&Domain> {
        self.domain.as_ref()
    }

    /// Constrained explicitly, or pinned by a singleton domain.
    pub fn is_constrained(&self) -> bool {
        self.constrained || self.domain.as_ref().map_or(false, Domain::is_singleton)
    }

    /// Same name, domain and constraint, different value. The value is not domain-checked.
    pub(crate) fn with_value(&self, value: Value) -> Self {
        Feature {
            name: self.name.clone(),
            value,
            domain: self.domain.clone(),
            constrained: self.constrained,
        }
    }

    pub(crate) fn replace_domain(&self, domain: Option<Domain>) -> Self {
        Feature {
            domain,
            ..self.clone()
        }
    }
}

/// A named model output. `score` carries the model's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub score: f64,
}

impl Output {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, score: f64) -> Self {
        Output {
            name: name.into(),
            value: value.into(),
            score,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Value::Number(value), 1.0)
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }
}

/// Ordered model arguments; position matches the model's argument order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionInput {
    pub features: Vec<Feature>,
}

impl PredictionInput {
    pub fn new(features: Vec<Feature>) -> Self {
        PredictionInput { features }
    }

    /// Unconstrained numeric features named `x0..xn` without domains.
    pub fn from_numbers(values: &[f64]) -> Self {
        PredictionInput::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Feature::number(format!("x{}", i), *v))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.features.iter().map(Feature::value)
    }

    /// Numeric view of the row. Fails on categorical features.
    pub fn to_numbers(&self) -> Result<Vec<f64>> {
        self.features
            .iter()
            .map(|f| {
                f.value().as_number().ok_or_else(|| {
                    ExplainError::InvalidValue(format!(
                        "Feature '{}' is categorical and has no numeric value",
                        f.name()
                    ))
                })
            })
            .collect()
    }
}

/// Ordered model outputs for one input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub outputs: Vec<Output>,
}

impl PredictionOutput {
    pub fn new(outputs: Vec<Output>) -> Self {
        PredictionOutput { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Numeric value of the output at `index`, if it has one.
    pub fn number_at(&self, index: usize) -> Option<f64> {
        self.outputs.get(index).and_then(|o| o.value.as_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_must_contain_value() {
        let ok = Feature::number("a", 5.0).with_domain(Domain::numeric(0.0, 10.0).unwrap());
        assert!(ok.is_ok());
        let bad = Feature::number("a", 50.0).with_domain(Domain::numeric(0.0, 10.0).unwrap());
        assert!(matches!(bad, Err(ExplainError::InvalidValue(_))));
    }

    #[test]
    fn unbounded_domain_is_rejected() {
        let unbounded = Feature::number("a", 5.0).with_domain(Domain::Numeric { lower: 0.0, upper: f64::INFINITY });
        assert!(matches!(unbounded, Err(ExplainError::Configuration(_))));
        let reversed = Feature::number("a", 5.0).with_domain(Domain::Numeric { lower: 10.0, upper: 0.0 });
        assert!(matches!(reversed, Err(ExplainError::Configuration(_))));
    }

    #[test]
    fn deserialized_features_are_validated() {
        let reversed = r#"{"name":"a","value":{"Number":5.0},"domain":{"Numeric":{"lower":10.0,"upper":0.0}},"constrained":false}"#;
        assert!(serde_json::from_str::<Feature>(reversed).is_err());
        let outside = r#"{"name":"a","value":{"Number":50.0},"domain":{"Numeric":{"lower":0.0,"upper":10.0}},"constrained":false}"#;
        assert!(serde_json::from_str::<Feature>(outside).is_err());

        let feature = Feature::number("a", 5.0).with_domain(Domain::numeric(0.0, 10.0).unwrap()).unwrap().constrained();
        let back: Feature = serde_json::from_str(&serde_json::to_string(&feature).unwrap()).unwrap();
        assert_eq!(back, feature);
    }

    #[test]
    fn singleton_domain_constrains() {
        let f = Feature::categorical("c", "x")
            .with_domain(Domain::set(["x"]).unwrap())
            .unwrap();
        assert!(f.is_constrained());
        assert!(Feature::number("n", 1.0).constrained().is_constrained());
        assert!(!Feature::number("n", 1.0).is_constrained());
    }

    #[test]
    fn numeric_views() {
        let input = PredictionInput::new(vec![
            Feature::number("a", 1.5),
            Feature::boolean("b", true),
        ]);
        assert_eq!(input.to_numbers().unwrap(), vec![1.5, 1.0]);
        let with_cat = PredictionInput::new(vec![Feature::categorical("c", "x")]);
        assert!(with_cat.to_numbers().is_err());

        let out = PredictionOutput::new(vec![Output::number("y", 3.0)]);
        assert_eq!(out.number_at(0), Some(3.0));
        assert_eq!(out.get("y").map(|o| o.score), Some(1.0));
        assert!(out.get("z").is_none());
    }
}
