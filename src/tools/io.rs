use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::types::Entity;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to load JSON file: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load JSON file: {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write JSON file: {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read a JSON object of `key -> entity record`, keeping the file's key order.
pub fn load_entities(path: impl AsRef<Path>) -> Result<Vec<(String, Entity)>, DataError> {
    let path = path.as_ref();
    let parse_err = |source: serde_json::Error| DataError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let contents = std::fs::read_to_string(path).map_err(|source| DataError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&contents).map_err(parse_err)?;
    let entities = records
        .into_iter()
        .map(|(key, record)| serde_json::from_value::<Entity>(record).map(|entity| (key, entity)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_err)?;
    info!("📥 Loaded {} entities from {}", entities.len(), path.display());
    Ok(entities)
}

/// Write entities as a pretty-printed JSON array, creating parent directories.
pub fn save_json<'a>(
    entities: impl IntoIterator<Item = &'a Entity>,
    path: impl AsRef<Path>,
) -> Result<(), DataError> {
    let path = path.as_ref();
    let entities: Vec<&Entity> = entities.into_iter().collect();
    let body = serde_json::to_string_pretty(&entities)?;

    let write_err = |source| DataError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, body).map_err(write_err)?;
    info!("💾 Saved {} entities to {}", entities.len(), path.display());
    Ok(())
}
