// src/utils/encoding.rs
use ndarray::{Array2, ArrayView1};

use crate::core::{Dataset, Domain, ExplainError, Feature, PredictionInput, Result, Value};

#[derive(Debug, Clone)]
enum Column {
    Number { snap: Option<Vec<f64>> },
    Boolean,
    OneHot { levels: Vec<String> },
}

impl Column {
    fn width(&self) -> usize {
        match self {
            Column::OneHot { levels } => levels.len(),
            _ => 1,
        }
    }
}

/// Maps mixed-type inputs to numeric rows and back.
///
/// Numbers keep their value, booleans become 1/0 and categorical features are
/// one-hot encoded over their domain levels (or, lacking a domain, the levels
/// seen in the pool, in order of first appearance).
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    columns: Vec<Column>,
    template: PredictionInput,
}

impl FeatureEncoder {
    pub fn fit(pool: &[PredictionInput]) -> Result<Self> {
        let template = pool
            .first()
            .cloned()
            .ok_or_else(|| ExplainError::configuration("Cannot encode an empty pool"))?;
        let mut columns = Vec::with_capacity(template.len());
        for (idx, feature) in template.features.iter().enumerate() {
            let column = match feature.value() {
                Value::Number(_) => Column::Number {
                    snap: match feature.domain() {
                        Some(Domain::Set(values)) => {
                            let nums: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
                            Some(nums).filter(|n| !n.is_empty())
                        }
                        _ => None,
                    },
                },
                Value::Boolean(_) => Column::Boolean,
                Value::Categorical(_) => {
                    let mut levels: Vec<String> = match feature.domain() {
                        Some(Domain::Set(values)) => values
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                        _ => Vec::new(),
                    };
                    for point in pool {
                        if let Some(level) = point.features.get(idx).and_then(|f| f.value().as_str()) {
                            if !levels.iter().any(|l| l == level) {
                                levels.push(level.to_string());
                            }
                        }
                    }
                    Column::OneHot { levels }
                }
            };
            columns.push(column);
        }
        Ok(FeatureEncoder { columns, template })
    }

    /// Total number of numeric columns.
    pub fn width(&self) -> usize {
        self.columns.iter().map(Column::width).sum()
    }

    pub fn encode(&self, input: &PredictionInput) -> Result<Vec<f64>> {
        if input.len() != self.columns.len() {
            return Err(ExplainError::IncompatibleDimensions(format!(
                "Expected {} features, got {}",
                self.columns.len(),
                input.len()
            )));
        }
        let mut row = Vec::with_capacity(self.width());
        for (column, feature) in self.columns.iter().zip(&input.features) {
            match (column, feature.value()) {
                (Column::Number { .. }, Value::Number(v)) => row.push(*v),
                (Column::Boolean, Value::Boolean(b)) => row.push(if *b { 1.0 } else { 0.0 }),
                (Column::OneHot { levels }, Value::Categorical(s)) => {
                    row.extend(levels.iter().map(|l| if l == s { 1.0 } else { 0.0 }))
                }
                (_, value) => {
                    return Err(ExplainError::InvalidValue(format!(
                        "Feature '{}' changed kind within the pool ({:?})",
                        feature.name(),
                        value.kind()
                    )))
                }
            }
        }
        Ok(row)
    }

    pub fn encode_all(&self, pool: &[PredictionInput]) -> Result<Dataset> {
        let mut flat = Vec::with_capacity(pool.len() * self.width());
        for input in pool {
            flat.extend(self.encode(input)?);
        }
        Ok(Array2::from_shape_vec((pool.len(), self.width()), flat)?)
    }

    /// Turns an encoded row (e.g. a centroid) back into a valid input.
    pub fn decode(&self, row: ArrayView1<f64>) -> PredictionInput {
        let mut offset = 0;
        let mut features = Vec::with_capacity(self.columns.len());
        for (column, feature) in self.columns.iter().zip(&self.template.features) {
            let value = match column {
                Column::Number { snap: None } => Value::Number(row[offset]),
                Column::Number { snap: Some(levels) } => {
                    Value::Number(nearest(levels, row[offset]))
                }
                Column::Boolean => Value::Boolean(row[offset] >= 0.5),
                Column::OneHot { levels } => {
                    let best = (0..levels.len())
                        .max_by(|&a, &b| row[offset + a].total_cmp(&row[offset + b]))
                        .unwrap_or(0);
                    Value::Categorical(levels.get(best).cloned().unwrap_or_default())
                }
            };
            offset += column.width();
            features.push(decoded_feature(feature, value));
        }
        PredictionInput::new(features)
    }
}

fn nearest(levels: &[f64], v: f64) -> f64 {
    levels
        .iter()
        .cloned()
        .min_by(|a, b| (a - v).abs().total_cmp(&(b - v).abs()))
        .unwrap_or(v)
}

// Keeps the template's name and domain; drops the domain if the value escaped it.
fn decoded_feature(template: &Feature, value: Value) -> Feature {
    let feature = template.with_value(value);
    match feature.domain() {
        Some(domain) if !domain.contains(feature.value()) => feature.replace_domain(None),
        _ => feature,
    }
}
