//! Versioned, append-only artifact store.
//!
//! Each training run lands in its own timestamped directory under the
//! models root, holding the estimator, the preprocessor, and the metadata
//! as separate files. Published versions are never rewritten; promotion to
//! production copies the bundle into an alias directory instead.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::StoreError;
use crate::models::{load_estimator, Estimator};
use crate::preprocessing::Preprocessor;
use crate::trainer::{ModelMetadata, TrainedBundle, ARTIFACT_SCHEMA_VERSION};

pub const MODEL_FILE: &str = "model.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const METADATA_FILE: &str = "metadata.json";
/// Directory name reserved for the promoted bundle. Never produced by
/// `save`, never returned by `resolve(Latest)`.
pub const PRODUCTION_ALIAS: &str = "production";

/// How a caller names the bundle it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// The most recently published version.
    Latest,
    Named(String),
}

/// A fully loaded, immutable artifact bundle.
pub struct ModelBundle {
    pub version: String,
    pub model: Box<dyn Estimator>,
    pub preprocessor: Preprocessor,
    pub metadata: ModelMetadata,
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("version", &self.version)
            .field("model", &self.model.kind())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publish a trained bundle under a fresh timestamped version name and
    /// return that name. Existing versions are never touched.
    pub fn save(&self, bundle: &TrainedBundle) -> Result<String> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create models root {}", self.root.display()))?;

        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let (version, dir) = self.claim_version_dir(&stamp)?;

        bundle.estimator.save(&dir.join(MODEL_FILE))?;

        let preprocessor_json = serde_json::to_vec_pretty(&bundle.preprocessor)?;
        fs::write(dir.join(PREPROCESSOR_FILE), preprocessor_json)
            .with_context(|| format!("failed to write preprocessor for version {}", version))?;

        let metadata_json = serde_json::to_vec_pretty(&bundle.metadata)?;
        fs::write(dir.join(METADATA_FILE), metadata_json)
            .with_context(|| format!("failed to write metadata for version {}", version))?;

        log::info!("published model version {}", version);
        Ok(version)
    }

    /// Reserve a new version directory. Two runs inside the same second get
    /// distinct names through a numeric suffix.
    fn claim_version_dir(&self, stamp: &str) -> Result<(String, PathBuf)> {
        let mut candidate = stamp.to_string();
        let mut attempt = 0u32;
        loop {
            let dir = self.root.join(&candidate);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((candidate, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    candidate = format!("{}_{}", stamp, attempt);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("failed to create version directory {}", dir.display())
                    })
                }
            }
        }
    }

    /// Published version names, ascending. Timestamped names sort
    /// chronologically, so the last entry is the newest.
    pub fn versions(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            root: self.root.clone(),
            source,
        })?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                root: self.root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_version_name(name) {
                    versions.push(name.to_string());
                }
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Turn a version spec into a concrete version name.
    pub fn resolve(&self, spec: &VersionSpec) -> Result<String, StoreError> {
        match spec {
            VersionSpec::Named(name) => {
                if name == PRODUCTION_ALIAS && self.root.join(name).is_dir() {
                    return Ok(name.clone());
                }
                if is_version_name(name) && self.root.join(name).is_dir() {
                    Ok(name.clone())
                } else {
                    Err(StoreError::NotFound(name.clone()))
                }
            }
            VersionSpec::Latest => self
                .versions()?
                .pop()
                .ok_or_else(|| StoreError::NotFound("latest".to_string())),
        }
    }

    /// Load a bundle atomically: either every file parses and the schema is
    /// understood, or the whole load fails. No partially initialised bundle
    /// ever reaches a caller.
    pub fn load(&self, spec: &VersionSpec) -> Result<ModelBundle, StoreError> {
        let version = self.resolve(spec)?;
        let dir = self.root.join(&version);

        let metadata_path = dir.join(METADATA_FILE);
        let metadata_raw = fs::read_to_string(&metadata_path).map_err(|e| {
            StoreError::partial(&version, format!("cannot read {}: {}", METADATA_FILE, e))
        })?;
        let metadata: ModelMetadata = serde_json::from_str(&metadata_raw).map_err(|e| {
            StoreError::partial(&version, format!("cannot parse {}: {}", METADATA_FILE, e))
        })?;
        if metadata.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(StoreError::partial(
                &version,
                format!(
                    "unsupported artifact schema {} (this build understands {})",
                    metadata.schema_version, ARTIFACT_SCHEMA_VERSION
                ),
            ));
        }

        let preprocessor_path = dir.join(PREPROCESSOR_FILE);
        let preprocessor_raw = fs::read_to_string(&preprocessor_path).map_err(|e| {
            StoreError::partial(&version, format!("cannot read {}: {}", PREPROCESSOR_FILE, e))
        })?;
        let preprocessor: Preprocessor = serde_json::from_str(&preprocessor_raw).map_err(|e| {
            StoreError::partial(&version, format!("cannot parse {}: {}", PREPROCESSOR_FILE, e))
        })?;

        let model = load_estimator(metadata.model_type, &dir.join(MODEL_FILE)).map_err(|e| {
            StoreError::partial(&version, format!("cannot load {}: {:#}", MODEL_FILE, e))
        })?;

        Ok(ModelBundle {
            version,
            model,
            preprocessor,
            metadata,
        })
    }

    /// Copy a published version's files into the production alias directory,
    /// replacing whatever was promoted before.
    pub fn promote(&self, version: &str) -> Result<()> {
        let source = self.root.join(version);
        anyhow::ensure!(
            is_version_name(version) && source.is_dir(),
            "cannot promote unknown version '{}'",
            version
        );
        let alias = self.root.join(PRODUCTION_ALIAS);
        if alias.exists() {
            fs::remove_dir_all(&alias).with_context(|| {
                format!("failed to clear previous promotion at {}", alias.display())
            })?;
        }
        fs::create_dir_all(&alias)?;
        for file in [MODEL_FILE, PREPROCESSOR_FILE, METADATA_FILE] {
            fs::copy(source.join(file), alias.join(file))
                .with_context(|| format!("failed to copy {} while promoting {}", file, version))?;
        }
        log::info!("promoted model version {} to {}", version, PRODUCTION_ALIAS);
        Ok(())
    }
}

/// Version directories start with a digit; that keeps the production alias
/// and stray directories out of version listings.
pub fn is_version_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names_start_with_a_digit() {
        assert!(is_version_name("20260825_101500"));
        assert!(is_version_name("20260825_101500_1"));
        assert!(!is_version_name("production"));
        assert!(!is_version_name(".tmp"));
        assert!(!is_version_name(""));
    }
}
