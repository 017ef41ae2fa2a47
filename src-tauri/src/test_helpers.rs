#[cfg(test)]
pub mod fixtures {
    use crate::artifact::Artifact;
    use crate::transfer::ProcessingResult;
    use serde_json::json;
    use std::collections::HashMap;

    /// What the processing service returns for a finished segmentation
    pub fn sample_result() -> ProcessingResult {
        let mut metrics = HashMap::new();
        metrics.insert("volume".to_string(), json!("14.7 cm³"));
        metrics.insert("confidence".to_string(), json!("92%"));

        ProcessingResult {
            image: "aGVsbG8=".to_string(),
            metrics,
            extra: HashMap::new(),
        }
    }

    pub fn study_artifact(size: usize) -> Artifact {
        Artifact::from_bytes("study.zip", vec![7u8; size]).unwrap()
    }
}
