use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// On-disk layout of uploaded images and their derived artifacts.
///
/// ```text
/// <root>/originals/<id>
/// <root>/thumbnails/<id>
/// <root>/metadata/<id>.json
/// <root>/analysis/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory tree if missing.
    pub async fn init(&self) -> Result<(), MediaError> {
        for dir in ["originals", "thumbnails", "metadata", "analysis"] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    pub fn original_path(&self, resource_id: &str) -> Result<PathBuf, MediaError> {
        validate_resource_id(resource_id)?;
        Ok(self.root.join("originals").join(resource_id))
    }

    pub fn thumbnail_path(&self, resource_id: &str) -> Result<PathBuf, MediaError> {
        validate_resource_id(resource_id)?;
        Ok(self.root.join("thumbnails").join(resource_id))
    }

    pub fn metadata_path(&self, resource_id: &str) -> Result<PathBuf, MediaError> {
        validate_resource_id(resource_id)?;
        Ok(self.root.join("metadata").join(format!("{resource_id}.json")))
    }

    pub fn analysis_path(&self, resource_id: &str) -> Result<PathBuf, MediaError> {
        validate_resource_id(resource_id)?;
        Ok(self.root.join("analysis").join(format!("{resource_id}.json")))
    }

    /// Store an uploaded original under `resource_id`.
    pub async fn save_original(&self, resource_id: &str, data: &[u8]) -> Result<(), MediaError> {
        let path = self.original_path(resource_id)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    pub async fn read_original(&self, resource_id: &str) -> Result<Vec<u8>, MediaError> {
        let path = self.original_path(resource_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::NotFound(resource_id.to_string()))
            }
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), MediaError> {
        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, MediaError> {
        let body = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Resource ids become file names, so they must not escape the library.
pub fn validate_resource_id(resource_id: &str) -> Result<(), MediaError> {
    let valid = !resource_id.is_empty()
        && resource_id.len() <= 200
        && resource_id != "."
        && !resource_id.contains("..")
        && !resource_id.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(MediaError::InvalidResourceId(resource_id.to_string()))
    }
}

/// Guess a MIME type from the file extension of a resource id.
pub fn mime_type_for(resource_id: &str) -> &'static str {
    let ext = Path::new(resource_id)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid resource id: {0:?}")]
    InvalidResourceId(String),

    #[error("Media I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sidecar serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_validation() {
        assert!(validate_resource_id("abc123.jpg").is_ok());
        assert!(validate_resource_id("").is_err());
        assert!(validate_resource_id("../etc/passwd").is_err());
        assert!(validate_resource_id("a/b.png").is_err());
        assert!(validate_resource_id("a\\b.png").is_err());
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("x.PNG"), "image/png");
        assert_eq!(mime_type_for("x.webp"), "image/webp");
        assert_eq!(mime_type_for("x.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("noext"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_missing_original_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaLibrary::new(dir.path());
        media.init().await.unwrap();

        let err = media.read_original("ghost.jpg").await.unwrap_err();
        assert!(matches!(err, MediaError::NotFound(ref id) if id == "ghost.jpg"));
        assert_eq!(err.to_string(), "Image not found: ghost.jpg");
    }
}
