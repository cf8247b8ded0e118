//! Configuration types for similarity indexes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, XiphosError};

/// Distance metrics a similarity index can rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MetricKind {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// Inner product similarity (higher is more similar)
    InnerProduct,
    /// Cosine similarity (higher is more similar)
    Cosine,
    /// Hamming distance over bit vectors
    Hamming,
    /// Jaccard distance over bit vectors
    Jaccard,
}

impl MetricKind {
    /// Get the name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::L2 => "l2",
            MetricKind::InnerProduct => "inner_product",
            MetricKind::Cosine => "cosine",
            MetricKind::Hamming => "hamming",
            MetricKind::Jaccard => "jaccard",
        }
    }

    /// Parse a metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(MetricKind::L2),
            "inner_product" | "ip" => Ok(MetricKind::InnerProduct),
            "cosine" => Ok(MetricKind::Cosine),
            "hamming" => Ok(MetricKind::Hamming),
            "jaccard" => Ok(MetricKind::Jaccard),
            _ => Err(XiphosError::index(format!("Unknown metric: {s}"))),
        }
    }

    /// Whether the metric operates on bit vectors.
    pub fn is_binary(&self) -> bool {
        matches!(self, MetricKind::Hamming | MetricKind::Jaccard)
    }

    /// Whether larger values mean closer matches.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, MetricKind::InnerProduct | MetricKind::Cosine)
    }
}

/// Similarity index variants selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exact scan over f32 vectors.
    Flat,
    /// Exact scan over bit-packed vectors.
    BinaryFlat,
}

impl IndexKind {
    /// Get the name of this index kind.
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Flat => "flat",
            IndexKind::BinaryFlat => "binary_flat",
        }
    }

    /// Parse an index kind from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "binary_flat" => Ok(IndexKind::BinaryFlat),
            _ => Err(XiphosError::index(format!("Unknown index kind: {s}"))),
        }
    }
}

/// String-keyed parameter map for index variants.
///
/// The segment layer does not interpret the keys; each variant enumerates
/// what it accepts. The common ones are `metric` and `dimension`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexParams {
    values: HashMap<String, Value>,
}

impl IndexParams {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a string parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Look up an unsigned integer parameter.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
    }

    /// The configured metric, defaulting to L2.
    pub fn metric(&self) -> Result<MetricKind> {
        match self.get_str("metric") {
            Some(name) => MetricKind::parse_str(name),
            None => Ok(MetricKind::default()),
        }
    }

    /// The configured dimension; required for index construction.
    pub fn dimension(&self) -> Result<usize> {
        self.get_usize("dimension")
            .ok_or_else(|| XiphosError::index("Missing required parameter: dimension"))
    }
}
