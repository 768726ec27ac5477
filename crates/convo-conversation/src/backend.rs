use convo_config::{StorageMode, StorageSettings};
use convo_core::Result;
use std::sync::Arc;
use tracing::info;

use crate::object_store::ObjectStorageBackend;
use crate::storage::{LocalFileBackend, StorageBackend};

/// Construct the backend selected by `settings`.
///
/// Called once at startup; any failure here is a configuration error.
pub async fn build_backend(settings: &StorageSettings) -> Result<Arc<dyn StorageBackend>> {
    match settings.mode {
        StorageMode::Local => {
            let backend = LocalFileBackend::new(settings.local.root_dir.clone())?;
            info!("Using local conversation storage: {:?}", backend.root());
            Ok(Arc::new(backend))
        }
        StorageMode::S3 => {
            let backend = ObjectStorageBackend::from_settings(&settings.s3).await?;
            Ok(Arc::new(backend))
        }
    }
}
