use std::path::PathBuf;

/// Failure kinds for the versioned artifact store.
///
/// `NotFound` means the requested version (or any version at all, for
/// "latest") does not exist. `PartialArtifact` means a version directory
/// exists but one of its bundle files is missing, unreadable, or carries an
/// unsupported schema; loads never partially succeed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("model version not found: {0}")]
    NotFound(String),

    #[error("incomplete artifact bundle for version '{version}': {detail}")]
    PartialArtifact { version: String, detail: String },

    #[error("failed to read models root {}: {source}", root.display())]
    Io {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn partial(version: &str, detail: impl Into<String>) -> Self {
        StoreError::PartialArtifact {
            version: version.to_string(),
            detail: detail.into(),
        }
    }
}
