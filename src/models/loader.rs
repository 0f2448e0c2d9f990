//! Model artifact loader

use crate::error::{PipelineError, Result};
use crate::features::FeatureStore;
use crate::models::linear::{LogisticArtifact, LogisticModel};
use crate::models::tree::{ForestArtifact, ForestModel, TreeArtifact, TreeModel};
use crate::models::{FittedModel, ModelId, ModelRegistry};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Loads JSON model artifacts against one feature store.
pub struct ModelLoader<'a> {
    store: &'a FeatureStore,
}

impl<'a> ModelLoader<'a> {
    pub fn new(store: &'a FeatureStore) -> Self {
        Self { store }
    }

    /// Load a single model artifact from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, id: ModelId) -> Result<Box<dyn FittedModel>> {
        let path = path.as_ref();

        info!(model = %id, path = %path.display(), "Loading model artifact");

        let model: Box<dyn FittedModel> = match id {
            ModelId::Linear => {
                let artifact: LogisticArtifact = read_artifact(path)?;
                self.check_version(path, &artifact.feature_store_version)?;
                Box::new(LogisticModel::from_artifact(artifact, self.store)?)
            }
            ModelId::Tree => {
                let artifact: TreeArtifact = read_artifact(path)?;
                self.check_version(path, &artifact.feature_store_version)?;
                Box::new(TreeModel::from_artifact(artifact, self.store, path)?)
            }
            ModelId::Ensemble => {
                let artifact: ForestArtifact = read_artifact(path)?;
                self.check_version(path, &artifact.feature_store_version)?;
                Box::new(ForestModel::from_artifact(artifact, self.store, path)?)
            }
        };

        info!(model = %id, form = %model.form(), "Model loaded successfully");
        Ok(model)
    }

    /// Load every artifact present in `models_dir`.
    ///
    /// A missing file is skipped with a warning; whether that is acceptable is
    /// decided by [`ModelRegistry::require`]. A present but unreadable or
    /// inconsistent artifact is an error.
    pub fn load_all_models<P: AsRef<Path>>(&self, models_dir: P) -> Result<ModelRegistry> {
        let models_dir = models_dir.as_ref();
        let mut registry = ModelRegistry::new();

        for id in ModelId::ALL {
            let path = models_dir.join(id.artifact_file());
            if path.exists() {
                registry.insert(self.load_model(&path, id)?);
            } else {
                warn!(model = %id, path = %path.display(), "Model artifact not found");
            }
        }

        info!(
            count = registry.len(),
            "Loaded {} models from {}",
            registry.len(),
            models_dir.display()
        );

        Ok(registry)
    }

    fn check_version(&self, path: &Path, version: &str) -> Result<()> {
        if version != self.store.version() {
            return Err(PipelineError::InvalidArtifact {
                path: path.to_path_buf(),
                reason: format!(
                    "built against feature store '{version}', loaded store is '{}'",
                    self.store.version()
                ),
            });
        }
        Ok(())
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| PipelineError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PipelineError::ArtifactFormat {
        path: path.to_path_buf(),
        source,
    })
}
