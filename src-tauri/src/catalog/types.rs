use serde::{Deserialize, Serialize};

/// A selectable processing profile offered by the remote service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelProfile {
    pub id: String,
    pub display_name: String,
    pub modality: String,
    pub expected_accuracy: String,
    pub relative_speed: RelativeSpeed,
}

/// Coarse speed class shown next to each model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelativeSpeed {
    Fast,
    Medium,
    Slow,
}

impl ModelProfile {
    pub fn new(
        id: &str,
        display_name: &str,
        modality: &str,
        expected_accuracy: &str,
        relative_speed: RelativeSpeed,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            modality: modality.to_string(),
            expected_accuracy: expected_accuracy.to_string(),
            relative_speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Model catalog must contain at least one model")]
    Empty,

    #[error("Model '{0}' is listed more than once")]
    DuplicateId(String),
}
