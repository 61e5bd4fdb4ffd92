//! Exposition-agnostic metric families produced from domain snapshots.

use thiserror::Error;

/// A structural problem with a [`MetricFamily`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("invalid metric name '{0}'")]
    InvalidName(String),

    #[error("invalid label name '{0}'")]
    InvalidLabel(String),

    #[error("sample {index} of '{family}' has {actual} label values, expected {expected}")]
    LabelArity {
        family: String,
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// One data point of a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Values in the same order as the family's `label_names`.
    pub label_values: Vec<String>,
    pub value: f64,
}

/// A named group of samples sharing a label schema.
///
/// The order of `label_names` is part of the family's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Create an empty family with the given schema.
    pub fn new<I, S>(name: impl Into<String>, help: impl Into<String>, label_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            help: help.into(),
            label_names: label_names.into_iter().map(Into::into).collect(),
            samples: Vec::new(),
        }
    }

    /// Append a sample. Arity is checked by [`MetricFamily::validate`].
    pub fn push(&mut self, label_values: Vec<String>, value: f64) {
        self.samples.push(Sample {
            label_values,
            value,
        });
    }

    /// Check the name pattern and that every sample matches the label schema.
    pub fn validate(&self) -> Result<(), MetricError> {
        if !is_valid_name(&self.name) {
            return Err(MetricError::InvalidName(self.name.clone()));
        }

        if let Some(label) = self.label_names.iter().find(|l| !is_valid_name(l)) {
            return Err(MetricError::InvalidLabel(label.clone()));
        }

        for (index, sample) in self.samples.iter().enumerate() {
            if sample.label_values.len() != self.label_names.len() {
                return Err(MetricError::LabelArity {
                    family: self.name.clone(),
                    index,
                    expected: self.label_names.len(),
                    actual: sample.label_values.len(),
                });
            }
        }

        Ok(())
    }

    /// Label pairs of one sample, in schema order.
    pub fn labels_of<'a>(&'a self, sample: &'a Sample) -> Vec<(&'a str, &'a str)> {
        self.label_names
            .iter()
            .map(String::as_str)
            .zip(sample.label_values.iter().map(String::as_str))
            .collect()
    }
}

/// Names emitted by this crate must match `[a-z_][a-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
