use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::annotations::Annotations;
use crate::error::{CoreError, Result};

/// Identifies a resource kind independently of any compiled-in schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Builds a kind from an `apiVersion` string (`v1`, `apps/v1`) and a kind name.
    pub fn from_api_version_and_kind(api_version: &str, kind: impl Into<String>) -> Result<Self> {
        let (group, version) = match api_version.split_once('/') {
            None => ("", api_version),
            Some((group, version)) if !group.is_empty() && !version.contains('/') => {
                (group, version)
            }
            Some(_) => return Err(CoreError::invalid_api_version(api_version)),
        };
        if version.is_empty() {
            return Err(CoreError::invalid_api_version(api_version));
        }
        Ok(Self::new(group, version, kind))
    }

    /// The core `v1/Namespace` kind, which acts as the scope of namespaced objects.
    pub fn namespace() -> Self {
        Self::new("", "v1", "Namespace")
    }

    pub fn is_namespace(&self) -> bool {
        self.group.is_empty() && self.kind == "Namespace"
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// Namespace and name of an object. Cluster-scoped objects have an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// A fully qualified pointer to an object, used as the target of recorded events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    pub gvk: GroupVersionKind,
    pub key: ObjectKey,
}

impl ObjectReference {
    pub fn new(gvk: GroupVersionKind, key: ObjectKey) -> Self {
        Self { gvk, key }
    }

    /// Reference to the Namespace object named `name`.
    pub fn namespace(name: impl Into<String>) -> Self {
        Self::new(GroupVersionKind::namespace(), ObjectKey::cluster(name))
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.gvk.kind, self.key)
    }
}

/// An object of arbitrary kind, held as its generic value tree.
///
/// The body is the complete object (`apiVersion`, `kind`, `metadata`,
/// `spec`, ...) and doubles as the template context for scope rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedObject {
    body: Value,
}

impl ManagedObject {
    /// Creates an empty object of the given kind and key.
    pub fn new(gvk: &GroupVersionKind, key: &ObjectKey) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_string(), Value::String(key.name.clone()));
        if !key.namespace.is_empty() {
            metadata.insert(
                "namespace".to_string(),
                Value::String(key.namespace.clone()),
            );
        }

        let mut body = Map::new();
        body.insert("apiVersion".to_string(), Value::String(gvk.api_version()));
        body.insert("kind".to_string(), Value::String(gvk.kind.clone()));
        body.insert("metadata".to_string(), Value::Object(metadata));

        Self {
            body: Value::Object(body),
        }
    }

    /// Wraps a value tree, checking that it identifies an object.
    pub fn from_value(body: Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| CoreError::invalid_object("object body must be a JSON object"))?;

        let api_version = object
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_object("apiVersion is required"))?;
        let kind = object
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::invalid_object("kind is required"))?;
        GroupVersionKind::from_api_version_and_kind(api_version, kind)?;

        let has_name = object
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());
        if !has_name {
            return Err(CoreError::invalid_object("metadata.name is required"));
        }

        Ok(Self { body })
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn gvk(&self) -> GroupVersionKind {
        let api_version = self.body.get("apiVersion").and_then(Value::as_str).unwrap_or("");
        let kind = self.body.get("kind").and_then(Value::as_str).unwrap_or("");
        GroupVersionKind::from_api_version_and_kind(api_version, kind)
            .unwrap_or_else(|_| GroupVersionKind::new("", api_version, kind))
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name").unwrap_or("")
    }

    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace").unwrap_or("")
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace(), self.name())
    }

    pub fn reference(&self) -> ObjectReference {
        ObjectReference::new(self.gvk(), self.key())
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata_str("resourceVersion")
    }

    pub fn set_resource_version(&mut self, version: impl Into<String>) {
        self.set_metadata_field("resourceVersion", Value::String(version.into()));
    }

    pub fn deletion_timestamp(&self) -> Option<&str> {
        self.metadata_str("deletionTimestamp")
    }

    /// Whether a deletion has been requested for this object.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.deletion_timestamp().is_some()
    }

    pub fn finalizers(&self) -> Vec<&str> {
        self.metadata()
            .and_then(|m| m.get("finalizers"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the annotation map; non-string values are skipped.
    pub fn annotations(&self) -> Annotations {
        self.metadata()
            .and_then(|m| m.get("annotations"))
            .and_then(Value::as_object)
            .map(|annotations| {
                annotations
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces the annotation map. An empty map removes the field.
    pub fn set_annotations(&mut self, annotations: &Annotations) {
        let Some(metadata) = self.metadata_mut() else {
            return;
        };
        if annotations.is_empty() {
            metadata.remove("annotations");
            return;
        }

        let values = annotations
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>();
        metadata.insert("annotations".to_string(), Value::Object(values));
    }

    /// Sets an arbitrary metadata field.
    pub fn set_metadata_field(&mut self, field: &str, value: Value) {
        if let Some(metadata) = self.metadata_mut() {
            metadata.insert(field.to_string(), value);
        }
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.body.get("metadata").and_then(Value::as_object)
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }

    fn metadata_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let body = self.body.as_object_mut()?;
        let metadata = body
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        metadata.as_object_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gvk_from_api_version() {
        let gvk = GroupVersionKind::from_api_version_and_kind("v1", "Namespace").unwrap();
        assert_eq!(gvk, GroupVersionKind::new("", "v1", "Namespace"));
        assert!(gvk.is_namespace());
        assert_eq!(gvk.api_version(), "v1");

        let gvk = GroupVersionKind::from_api_version_and_kind("apps/v1", "Deployment").unwrap();
        assert_eq!(gvk, GroupVersionKind::new("apps", "v1", "Deployment"));
        assert_eq!(gvk.api_version(), "apps/v1");
        assert_eq!(gvk.to_string(), "apps/v1, Kind=Deployment");
    }

    #[test]
    fn test_gvk_rejects_malformed_api_version() {
        assert!(GroupVersionKind::from_api_version_and_kind("a/b/c", "X").is_err());
        assert!(GroupVersionKind::from_api_version_and_kind("/v1", "X").is_err());
        assert!(GroupVersionKind::from_api_version_and_kind("apps/", "X").is_err());
        assert!(GroupVersionKind::from_api_version_and_kind("", "X").is_err());
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("ns", "pod").to_string(), "ns/pod");
        assert_eq!(ObjectKey::cluster("ns").to_string(), "ns");
        assert!(ObjectKey::cluster("ns").is_cluster_scoped());
    }

    #[test]
    fn test_new_object() {
        let gvk = GroupVersionKind::new("", "v1", "Pod");
        let obj = ManagedObject::new(&gvk, &ObjectKey::new("test-namespace", "pod1"));
        assert_eq!(obj.gvk(), gvk);
        assert_eq!(obj.name(), "pod1");
        assert_eq!(obj.namespace(), "test-namespace");
        assert_eq!(obj.body()["apiVersion"], "v1");
        assert!(obj.annotations().is_empty());
    }

    #[test]
    fn test_from_value_validation() {
        assert!(ManagedObject::from_value(json!("pod")).is_err());
        assert!(ManagedObject::from_value(json!({"kind": "Pod", "metadata": {"name": "a"}})).is_err());
        assert!(
            ManagedObject::from_value(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {}}))
                .is_err()
        );
        assert!(
            ManagedObject::from_value(
                json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "a"}})
            )
            .is_ok()
        );
    }

    #[test]
    fn test_annotations_roundtrip_through_body() {
        let mut obj = ManagedObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "pod1",
                "annotations": {"a": "1", "ignored": 5}
            }
        }))
        .unwrap();

        let annotations = obj.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations["a"], "1");

        let mut updated = Annotations::new();
        updated.insert("b".to_string(), "2".to_string());
        obj.set_annotations(&updated);
        assert_eq!(obj.body()["metadata"]["annotations"], json!({"b": "2"}));

        obj.set_annotations(&Annotations::new());
        assert!(obj.body()["metadata"].get("annotations").is_none());
    }

    #[test]
    fn test_deletion_and_finalizers() {
        let obj = ManagedObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "pod1",
                "deletionTimestamp": "2024-01-01T00:00:00Z",
                "finalizers": ["example.com/cleanup"]
            }
        }))
        .unwrap();
        assert!(obj.is_marked_for_deletion());
        assert_eq!(obj.finalizers(), vec!["example.com/cleanup"]);
    }
}
