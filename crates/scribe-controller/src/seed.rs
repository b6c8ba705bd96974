//! Initial objects for the in-memory store.
//!
//! A seed file is JSON: either an array of objects or a list object with an
//! `items` array, as printed by `kubectl get -o json`.

use std::path::Path;

use scribe_core::ManagedObject;
use scribe_storage::{ObjectStore, StorageError};
use serde_json::Value;

use crate::config::ConfigError;

pub fn parse_seed(text: &str) -> Result<Vec<ManagedObject>, ConfigError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ConfigError::invalid(format!("seed file is not valid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut list) => match list.remove("items") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ConfigError::invalid(
                    "seed file must be an array or an object with an items array",
                ));
            }
        },
        _ => {
            return Err(ConfigError::invalid(
                "seed file must be an array or an object with an items array",
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            ManagedObject::from_value(item)
                .map_err(|e| ConfigError::invalid(format!("seed item {index}: {e}")))
        })
        .collect()
}

pub fn load_seed(path: impl AsRef<Path>) -> Result<Vec<ManagedObject>, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::invalid(format!("cannot read seed file {}: {e}", path.display()))
    })?;
    parse_seed(&text)
}

/// Creates every object, Namespaces first. Returns how many were created.
pub async fn seed_store(
    store: &dyn ObjectStore,
    mut objects: Vec<ManagedObject>,
) -> Result<usize, StorageError> {
    objects.sort_by_key(|object| !object.gvk().is_namespace());
    for object in &objects {
        store.create(object).await?;
    }
    Ok(objects.len())
}
