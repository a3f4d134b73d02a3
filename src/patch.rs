//! Declarative patch files for changes outside the fixed set of CSV rewrites.
//!
//! A patch file is a YAML sequence of operations applied in order:
//!
//! ```yaml
//! - op: set
//!   path: /metadata/annotations/containerImage
//!   image: operator
//! - op: append
//!   path: /spec/keywords
//!   value: oadp
//! - op: delete
//!   path: /spec/replaces
//!   optional: true
//! - op: merge
//!   path: /metadata/annotations
//!   value:
//!     features.operators.openshift.io/disconnected: "true"
//! ```
//!
//! `path` is an RFC 6901 JSON pointer, the operations are carried out as RFC 6902 patches and
//! `merge` as an RFC 7396 merge patch. Values come either literally from `value` or from the
//! relatedImages mapping through `image: <name>`.

use crate::{file_utils, image_mappings::ImageMappings};
use anyhow::{bail, ensure, Context, Result};
use fn_error_context::context;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub(crate) enum PatchOp {
    Set,
    Append,
    Delete,
    Merge,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PatchOperation {
    pub(crate) op: PatchOp,
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) value: Option<Value>,
    /// Name of a relatedImages entry whose image is used as the value
    #[serde(default)]
    pub(crate) image: Option<String>,
    /// Only meaningful for delete, don't fail when there is nothing to delete
    #[serde(default)]
    pub(crate) optional: bool,
}

/// RFC 6902 operations creating the mappings missing (or null) above `path`. Stops at the first
/// ancestor whose parent isn't a mapping, the patch itself then reports the bad path.
fn create_ancestors(document: &Value, path: &str) -> Vec<Value> {
    let mut operations = vec![];
    let mut parent_is_object = document.is_object();
    let mut created = false;

    for (end, _) in path.match_indices('/').skip(1) {
        let ancestor = &path[..end];

        if created {
            operations.push(json!({"op": "add", "path": ancestor, "value": {}}));
            continue;
        }

        match document.pointer(ancestor) {
            None if parent_is_object => {
                operations.push(json!({"op": "add", "path": ancestor, "value": {}}));
                created = true;
            }
            None => break,
            Some(Value::Null) => {
                operations.push(json!({"op": "replace", "path": ancestor, "value": {}}));
                created = true;
            }
            Some(existing) => parent_is_object = existing.is_object(),
        }
    }

    operations
}

fn json_patch(document: &mut Value, operations: Vec<Value>) -> Result<()> {
    let patch: json_patch::Patch = serde_json::from_value(Value::Array(operations)).context("invalid path")?;
    json_patch::patch(document, &patch).context("applying json patch")?;
    Ok(())
}

/// Compact single-line rendering of a value for the progress log
fn display_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

impl PatchOperation {
    fn resolve_value(&self, mappings: &ImageMappings) -> Result<Value> {
        match (&self.value, &self.image) {
            (Some(value), None) => Ok(value.clone()),
            (None, Some(name)) => Ok(Value::String(
                mappings
                    .image(name)
                    .with_context(|| format!("no image named {:?} in relatedImages", name))?
                    .to_string(),
            )),
            (Some(_), Some(_)) => bail!("{} takes either value or image, not both", self.op),
            (None, None) => bail!("{} requires a value or an image", self.op),
        }
    }

    pub(crate) fn apply(&self, document: &mut Value, mappings: &ImageMappings) -> Result<()> {
        let path = self.path.as_str();

        match self.op {
            PatchOp::Set => {
                let value = self.resolve_value(mappings)?;
                log::info!("  set {} = {}", path, display_value(&value));

                let operation = if document.pointer(path).is_some() { "replace" } else { "add" };
                let mut operations = create_ancestors(document, path);
                operations.push(json!({"op": operation, "path": path, "value": value}));

                json_patch(document, operations)?;
            }
            PatchOp::Append => {
                let value = self.resolve_value(mappings)?;
                log::info!("  append {} += {}", path, display_value(&value));

                let operations = match document.pointer(path) {
                    None => {
                        let mut operations = create_ancestors(document, path);
                        operations.push(json!({"op": "add", "path": path, "value": [value]}));
                        operations
                    }
                    Some(Value::Null) => vec![json!({"op": "replace", "path": path, "value": [value]})],
                    Some(Value::Array(_)) => vec![json!({"op": "add", "path": format!("{path}/-"), "value": value})],
                    Some(_) => bail!("append target not a sequence"),
                };

                json_patch(document, operations)?;
            }
            PatchOp::Delete => {
                ensure!(
                    self.value.is_none() && self.image.is_none(),
                    "delete takes neither value nor image"
                );

                if document.pointer(path).is_none() {
                    if self.optional {
                        log::info!("  delete {} (already absent)", path);
                        return Ok(());
                    }

                    bail!("nothing to delete");
                }

                log::info!("  delete {}", path);

                json_patch(document, vec![json!({"op": "remove", "path": path})])?;
            }
            PatchOp::Merge => {
                let value = self.resolve_value(mappings)?;
                ensure!(value.is_object(), "merge value must be a mapping");
                log::info!("  merge {} <- {}", path, display_value(&value));

                match document.pointer(path) {
                    None => {
                        let mut operations = create_ancestors(document, path);
                        operations.push(json!({"op": "add", "path": path, "value": {}}));
                        json_patch(document, operations)?;
                    }
                    Some(Value::Null | Value::Object(_)) => {}
                    Some(_) => bail!("merge target not a mapping"),
                }

                // RFC 7396: nested mappings merge recursively, null removes a key
                json_patch::merge(document.pointer_mut(path).context("merge target disappeared")?, &value);
            }
        }

        Ok(())
    }
}

#[context("loading patch file {}", path.display())]
pub(crate) fn load_patch_file(path: &Path) -> Result<Vec<PatchOperation>> {
    let contents = file_utils::read_file_to_string("patch", path)?;

    if contents.trim().is_empty() {
        return Ok(vec![]);
    }

    serde_yaml::from_str(&contents).context("patch file must be a sequence of operations")
}

pub(crate) fn apply_patch_operations(document: &mut Value, operations: &[PatchOperation], mappings: &ImageMappings) -> Result<()> {
    for (index, operation) in operations.iter().enumerate() {
        operation
            .apply(document, mappings)
            .with_context(|| format!("operation #{} ({} {})", index + 1, operation.op, operation.path))?;
    }

    Ok(())
}

/// Apply the patch file at `path` to `document`. A patch file that doesn't exist is skipped,
/// returning None. Any failure is reported and then returned, the caller is expected to abort.
pub(crate) fn apply_patch_file(what: &str, document: &mut Value, path: &Path, mappings: &ImageMappings) -> Result<Option<usize>> {
    if !path.exists() {
        log::debug!("{what} patch file not found: {}, skipping patch", path.display());
        return Ok(None);
    }

    log::info!("Applying additional {what} changes from: {}", path.display());

    let result = load_patch_file(path).and_then(|operations| {
        apply_patch_operations(document, &operations, mappings)?;
        Ok(operations.len())
    });

    match result {
        Ok(count) => {
            log::info!("Successfully applied {count} {what} patch operations");
            Ok(Some(count))
        }
        Err(err) => {
            log::error!("Error applying {what} changes: {:#}", err);
            Err(err.context(format!("applying {what} patch {}", path.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_mappings::ImageMapping;
    use serde_json::json;

    fn mappings() -> ImageMappings {
        ImageMappings::from_entries(vec![ImageMapping {
            name: "operator".to_string(),
            image: "quay.io/konflux/oadp-operator@sha256:aaa".to_string(),
            env_var: None,
        }])
    }

    fn operations(yaml: &str) -> Vec<PatchOperation> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_apply_operations() -> Result<()> {
        let mut document = json!({
            "metadata": {"name": "oadp-operator.v1.5.0", "annotations": {"capabilities": "Seamless Upgrades"}},
            "spec": {"replaces": "oadp-operator.v1.4.0", "keywords": ["velero"]}
        });

        apply_patch_operations(
            &mut document,
            &operations(
                r#"
- op: set
  path: /metadata/annotations/containerImage
  image: operator
- op: append
  path: /spec/keywords
  value: oadp
- op: append
  path: /spec/maintainers
  value: {name: OADP Team, email: oadp-team@redhat.com}
- op: delete
  path: /spec/replaces
- op: delete
  path: /spec/skips
  optional: true
- op: merge
  path: /metadata/annotations
  value:
    features.operators.openshift.io/disconnected: "true"
    features.operators.openshift.io/fips-compliant: "true"
"#,
            ),
            &mappings(),
        )?;

        assert_eq!(
            document,
            json!({
                "metadata": {"name": "oadp-operator.v1.5.0", "annotations": {
                    "capabilities": "Seamless Upgrades",
                    "containerImage": "quay.io/konflux/oadp-operator@sha256:aaa",
                    "features.operators.openshift.io/disconnected": "true",
                    "features.operators.openshift.io/fips-compliant": "true"
                }},
                "spec": {
                    "keywords": ["velero", "oadp"],
                    "maintainers": [{"name": "OADP Team", "email": "oadp-team@redhat.com"}]
                }
            })
        );

        Ok(())
    }

    #[test]
    fn test_operation_errors() {
        let mut document = json!({"spec": {"keywords": "velero"}});

        for yaml in [
            "- {op: delete, path: /spec/replaces}",
            "- {op: append, path: /spec/keywords, value: oadp}",
            "- {op: set, path: /spec/icon}",
            "- {op: set, path: /spec/icon, value: x, image: operator}",
            "- {op: set, path: /spec/icon, image: velero}",
            "- {op: merge, path: /metadata, value: [not, a, mapping]}",
            "- {op: set, path: spec/icon, value: x}",
        ] {
            assert!(
                apply_patch_operations(&mut document, &operations(yaml), &mappings()).is_err(),
                "{yaml} should fail"
            );
        }
    }

    #[test]
    fn test_index_with_leading_zero_is_rejected() {
        let mut document = json!({"spec": {"keywords": ["velero", "backup"]}});

        assert!(apply_patch_operations(&mut document, &operations("- {op: delete, path: /spec/keywords/00}"), &mappings()).is_err());
        assert!(apply_patch_operations(
            &mut document,
            &operations("- {op: delete, path: /spec/keywords/00, optional: true}"),
            &mappings()
        )
        .is_ok());
        assert_eq!(document, json!({"spec": {"keywords": ["velero", "backup"]}}));
    }

    #[test]
    fn test_set_creates_missing_mappings() -> Result<()> {
        let mut document = json!({"metadata": {"name": "oadp-operator.v1.5.0", "labels": null}});

        apply_patch_operations(
            &mut document,
            &operations(
                r#"
- {op: set, path: /spec/install/spec/clusterPermissions, value: []}
- {op: set, path: /metadata/labels/operatorframework.io~1arch.amd64, value: supported}
- {op: set, path: /metadata/name, value: oadp-operator.v1.5.1}
"#,
            ),
            &mappings(),
        )?;

        assert_eq!(
            document,
            json!({
                "metadata": {"name": "oadp-operator.v1.5.1", "labels": {"operatorframework.io/arch.amd64": "supported"}},
                "spec": {"install": {"spec": {"clusterPermissions": []}}}
            })
        );

        Ok(())
    }

    #[test]
    fn test_merge_is_a_merge_patch() -> Result<()> {
        let mut document = json!({"metadata": {"annotations": {
            "capabilities": "Basic Install",
            "operators.openshift.io/infrastructure-features": "[\"disconnected\"]",
            "repository": "https://github.com/openshift/oadp-operator"
        }}});

        apply_patch_operations(
            &mut document,
            &operations(
                r#"
- op: merge
  path: /metadata/annotations
  value:
    capabilities: Seamless Upgrades
    repository: null
- op: merge
  path: /spec/customresourcedefinitions
  value:
    owned: []
"#,
            ),
            &mappings(),
        )?;

        assert_eq!(
            document,
            json!({
                "metadata": {"annotations": {
                    "capabilities": "Seamless Upgrades",
                    "operators.openshift.io/infrastructure-features": "[\"disconnected\"]"
                }},
                "spec": {"customresourcedefinitions": {"owned": []}}
            })
        );

        Ok(())
    }

    #[test]
    fn test_image_values_resolved_before_patching() -> Result<()> {
        let mut document = json!({"spec": {"relatedImages": [{"name": "velero", "image": "quay.io/konveyor/velero:latest"}]}});

        apply_patch_operations(
            &mut document,
            &operations("- {op: append, path: /spec/relatedImages, value: {name: operator, image: placeholder}}\n- {op: set, path: /spec/relatedImages/1/image, image: operator}"),
            &mappings(),
        )?;

        assert_eq!(
            document["spec"]["relatedImages"][1],
            json!({"name": "operator", "image": "quay.io/konflux/oadp-operator@sha256:aaa"})
        );

        Ok(())
    }

    #[test]
    fn test_values_logged_on_one_line() {
        assert_eq!(
            display_value(&json!({"name": "OADP Team", "email": "oadp-team@redhat.com"})),
            r#"{"name":"OADP Team","email":"oadp-team@redhat.com"}"#
        );
        assert_eq!(display_value(&json!("multi\nline")), r#""multi\nline""#);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<Vec<PatchOperation>>("- {op: set, path: /a, value: b, valeu: c}").is_err());
        assert!(serde_yaml::from_str::<Vec<PatchOperation>>("- {op: exec, path: /a}").is_err());
        assert_eq!(operations("- {op: merge, path: /a, value: {}}")[0].op.to_string(), "merge");
    }

    #[test]
    fn test_missing_patch_file_is_skipped() -> Result<()> {
        let mut document = json!({"kind": "ClusterServiceVersion"});

        let applied = apply_patch_file("CSV", &mut document, Path::new("/nonexistent/oadp-csv.patch.yaml"), &mappings())?;

        assert_eq!(applied, None);
        assert_eq!(document, json!({"kind": "ClusterServiceVersion"}));

        Ok(())
    }

    #[test]
    fn test_failing_patch_file_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("csv-patch.yaml");
        std::fs::write(&path, "- op: delete\n  path: /spec/replaces\n")?;

        let mut document = json!({"kind": "ClusterServiceVersion"});

        assert!(apply_patch_file("CSV", &mut document, &path, &mappings()).is_err());

        std::fs::write(&path, "this is not: [a patch\n")?;

        assert!(apply_patch_file("CSV", &mut document, &path, &mappings()).is_err());

        Ok(())
    }
}
