use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Extension accepted for input bundles (an archived image series)
pub const ACCEPTED_EXTENSION: &str = "zip";

/// Handle to exactly one input bundle.
///
/// Cloning is cheap; file-backed artifacts are re-opened for every submission.
#[derive(Debug, Clone)]
pub struct Artifact {
    file_name: String,
    len: u64,
    source: ArtifactSource,
}

#[derive(Debug, Clone)]
enum ArtifactSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// What renderers get to see about the selected artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactSummary {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Artifact is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Unsupported artifact '{0}': expected a .zip archive")]
    UnsupportedFormat(String),

    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl Artifact {
    /// Open a `.zip` bundle from disk, recording its size for progress reporting.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ArtifactError::Io(e)),
        };

        if !metadata.is_file() {
            return Err(ArtifactError::NotAFile(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        check_extension(&file_name)?;

        Ok(Self {
            file_name,
            len: metadata.len(),
            source: ArtifactSource::File(path.to_path_buf()),
        })
    }

    pub fn from_bytes(file_name: &str, bytes: impl Into<Vec<u8>>) -> Result<Self, ArtifactError> {
        check_extension(file_name)?;
        let bytes: Arc<[u8]> = Arc::from(bytes.into());

        Ok(Self {
            file_name: file_name.to_string(),
            len: bytes.len() as u64,
            source: ArtifactSource::Memory(bytes),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            file_name: self.file_name.clone(),
            size_bytes: self.len,
        }
    }

    pub async fn reader(&self) -> Result<Box<dyn AsyncRead + Send + Sync + Unpin>, ArtifactError> {
        match &self.source {
            ArtifactSource::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file))
            }
            ArtifactSource::Memory(bytes) => Ok(Box::new(std::io::Cursor::new(bytes.clone()))),
        }
    }
}

fn check_extension(file_name: &str) -> Result<(), ArtifactError> {
    let accepted = Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(ACCEPTED_EXTENSION))
        .unwrap_or(false);

    if accepted {
        Ok(())
    } else {
        Err(ArtifactError::UnsupportedFormat(file_name.to_string()))
    }
}
