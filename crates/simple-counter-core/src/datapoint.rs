//! Data points emitted by a poll cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single named sample value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Data point name
    pub name: String,
    /// Sampled value
    pub value: Value,
}

/// The ordered set of data points produced by one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointBatch {
    /// Adapter that produced the batch
    pub adapter_id: String,
    /// When the sample was taken
    pub sampled_at: DateTime<Utc>,
    /// Data points in insertion order
    pub data_points: Vec<DataPoint>,
}

impl DataPointBatch {
    /// Create an empty batch stamped with the current time.
    #[must_use]
    pub fn new(adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            sampled_at: Utc::now(),
            data_points: Vec::new(),
        }
    }

    /// Append a data point.
    pub fn add_data_point(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data_points.push(DataPoint {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Look up a data point value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data_points
            .iter()
            .find(|point| point.name == name)
            .map(|point| &point.value)
    }

    /// Number of data points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    /// Check if the batch holds no data points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    /// Encode the batch as a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
