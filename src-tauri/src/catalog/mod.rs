pub mod types;

pub use types::*;

use std::collections::HashSet;

/// Ordered, read-only list of processing profiles.
///
/// The first entry is the default selection for a fresh session.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelProfile>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelProfile>) -> Result<Self, CatalogError> {
        if models.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for model in &models {
            if !seen.insert(model.id.as_str()) {
                return Err(CatalogError::DuplicateId(model.id.clone()));
            }
        }

        Ok(Self { models })
    }

    /// Models served by the processing backend
    pub fn builtin() -> Self {
        Self {
            models: vec![
                ModelProfile::new(
                    "unet_t1c",
                    "3D U-Net",
                    "T1 Contrast",
                    "92%",
                    RelativeSpeed::Fast,
                ),
                ModelProfile::new(
                    "deepmedic",
                    "DeepMedic",
                    "Multimodal",
                    "94%",
                    RelativeSpeed::Medium,
                ),
                ModelProfile::new("nnunet", "nnU-Net", "Ensemble", "96%", RelativeSpeed::Slow),
            ],
        }
    }

    pub fn default_model(&self) -> &ModelProfile {
        // Non-empty is checked at construction
        &self.models[0]
    }

    pub fn get(&self, id: &str) -> Option<&ModelProfile> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn models(&self) -> &[ModelProfile] {
        &self.models
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
