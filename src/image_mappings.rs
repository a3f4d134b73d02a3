use crate::file_utils;
use anyhow::{Context, Result};
use fn_error_context::context;
use std::{collections::HashMap, path::Path};

/// One record of relatedImages.yml, e.g.
///
/// ```yaml
/// - name: operator
///   image: quay.io/redhat-user-workloads/ocp-art-tenant/oadp-operator@sha256:...
///   env_var: RELATED_IMAGE_OPERATOR
/// ```
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct ImageMapping {
    pub(crate) name: String,
    pub(crate) image: String,
    #[serde(default)]
    pub(crate) env_var: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchKind {
    Exact,
    Normalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageMatch<'a> {
    /// The name as spelled in the mapping file
    pub(crate) name: &'a str,
    pub(crate) image: &'a str,
    pub(crate) kind: MatchKind,
}

/// Lookup tables built from relatedImages.yml
#[derive(Debug, Default)]
pub(crate) struct ImageMappings {
    // Kept in mapping file order, a repeated name keeps its first position and its last image
    images: Vec<(String, String)>,
    positions: HashMap<String, usize>,
    env_vars: HashMap<String, String>,
    normalized_names: HashMap<String, String>,
}

/// Upstream CSVs spell names with hyphens where relatedImages.yml uses underscores, e.g.
/// kubevirt-velero-plugin vs kubevirt_velero_plugin
pub(crate) fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

impl ImageMappings {
    #[context("loading image mappings from {}", path.display())]
    pub(crate) fn load(path: &Path) -> Result<Self> {
        log::debug!("Loading relatedImages from: {}", path.display());

        let contents = file_utils::read_file_to_string("relatedImages", path)?;
        let entries: Vec<ImageMapping> =
            serde_yaml::from_str(&contents).context("relatedImages must be a sequence of name/image/env_var records")?;

        let mappings = Self::from_entries(entries);

        log::debug!(
            "Loaded {} image mappings and {} env var mappings",
            mappings.len(),
            mappings.env_var_count()
        );

        Ok(mappings)
    }

    pub(crate) fn from_entries(entries: impl IntoIterator<Item = ImageMapping>) -> Self {
        let mut mappings = Self::default();

        for entry in entries {
            match mappings.positions.get(&entry.name) {
                Some(&position) => mappings.images[position].1 = entry.image.clone(),
                None => {
                    mappings.positions.insert(entry.name.clone(), mappings.images.len());
                    mappings.images.push((entry.name.clone(), entry.image.clone()));
                }
            }

            if let Some(env_var) = entry.env_var.filter(|env_var| !env_var.is_empty()) {
                mappings.env_vars.insert(env_var, entry.image);
            }

            mappings.normalized_names.insert(normalize_name(&entry.name), entry.name);
        }

        mappings
    }

    pub(crate) fn len(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn env_var_count(&self) -> usize {
        self.env_vars.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images.iter().map(|(name, image)| (name.as_str(), image.as_str()))
    }

    pub(crate) fn image(&self, name: &str) -> Option<&str> {
        self.positions.get(name).map(|&position| self.images[position].1.as_str())
    }

    /// The image of the first of `names` that has a non-empty image
    pub(crate) fn first_image(&self, names: &[&str]) -> Option<&str> {
        names.iter().filter_map(|name| self.image(name)).find(|image| !image.is_empty())
    }

    pub(crate) fn env_var_image(&self, env_var: &str) -> Option<&str> {
        self.env_vars.get(env_var).map(String::as_str)
    }

    /// Exact name first, then the hyphen/underscore normalized name. An exact match always wins,
    /// even when the normalized form of the name is itself a distinct mapping entry.
    pub(crate) fn resolve(&self, upstream_name: &str) -> Option<ImageMatch<'_>> {
        let (name, kind) = if self.positions.contains_key(upstream_name) {
            (upstream_name, MatchKind::Exact)
        } else {
            (
                self.normalized_names.get(&normalize_name(upstream_name))?.as_str(),
                MatchKind::Normalized,
            )
        };

        let position = *self.positions.get(name)?;
        let (name, image) = &self.images[position];

        if image.is_empty() {
            return None;
        }

        Some(ImageMatch {
            name: name.as_str(),
            image: image.as_str(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(name: &str, image: &str, env_var: Option<&str>) -> ImageMapping {
        ImageMapping {
            name: name.to_string(),
            image: image.to_string(),
            env_var: env_var.map(str::to_string),
        }
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("relatedImages.yml");
        std::fs::write(
            &path,
            r#"
- name: operator
  image: quay.io/konflux/oadp-operator@sha256:aaa
  env_var: RELATED_IMAGE_OPERATOR
- name: velero
  image: quay.io/konflux/velero@sha256:bbb
  env_var: RELATED_IMAGE_VELERO
- name: kubevirt_velero_plugin
  image: quay.io/konflux/kubevirt-velero-plugin@sha256:ccc
- name: mustgather
  image: quay.io/konflux/oadp-must-gather@sha256:ddd
  env_var: ""
"#,
        )?;

        let mappings = ImageMappings::load(&path)?;

        assert_eq!(mappings.len(), 4);
        assert_eq!(mappings.env_var_count(), 2);
        assert_eq!(mappings.image("velero"), Some("quay.io/konflux/velero@sha256:bbb"));
        assert_eq!(
            mappings.env_var_image("RELATED_IMAGE_OPERATOR"),
            Some("quay.io/konflux/oadp-operator@sha256:aaa")
        );
        assert_eq!(mappings.env_var_image(""), None);
        assert_eq!(
            mappings.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["operator", "velero", "kubevirt_velero_plugin", "mustgather"]
        );

        Ok(())
    }

    #[test]
    fn test_load_rejects_non_sequence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("relatedImages.yml");
        std::fs::write(&path, "operator: quay.io/konflux/oadp-operator\n")?;

        assert!(ImageMappings::load(&path).is_err());

        std::fs::write(&path, "- name: operator\n")?;

        assert!(ImageMappings::load(&path).is_err());

        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let err = ImageMappings::load(Path::new("/nonexistent/relatedImages.yml")).unwrap_err();

        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<file_utils::InputError>(),
            Some(file_utils::InputError::FileNotFound { .. })
        )));
    }

    #[test]
    fn test_last_write_wins_keeps_first_position() {
        let mappings = ImageMappings::from_entries(vec![
            mapping("operator", "img:1", None),
            mapping("velero", "velero:1", None),
            mapping("operator", "img:2", None),
        ]);

        assert_eq!(mappings.len(), 2);
        assert_eq!(
            mappings.iter().collect::<Vec<_>>(),
            vec![("operator", "img:2"), ("velero", "velero:1")]
        );
    }

    #[test]
    fn test_resolve() {
        let mappings = ImageMappings::from_entries(vec![
            mapping("velero", "velero:1", None),
            mapping("kubevirt_velero_plugin", "kubevirt:1", None),
        ]);

        assert_eq!(
            mappings.resolve("velero"),
            Some(ImageMatch {
                name: "velero",
                image: "velero:1",
                kind: MatchKind::Exact
            })
        );
        assert_eq!(
            mappings.resolve("kubevirt-velero-plugin"),
            Some(ImageMatch {
                name: "kubevirt_velero_plugin",
                image: "kubevirt:1",
                kind: MatchKind::Normalized
            })
        );
        assert_eq!(mappings.resolve("Velero"), None);
        assert_eq!(mappings.resolve("aws-plugin"), None);
    }

    #[test]
    fn test_resolve_prefers_exact_match() {
        let mappings = ImageMappings::from_entries(vec![
            mapping("hypershift-velero-plugin", "hyphen:1", None),
            mapping("hypershift_velero_plugin", "underscore:1", None),
        ]);

        assert_eq!(mappings.resolve("hypershift-velero-plugin").map(|m| m.image), Some("hyphen:1"));
        assert_eq!(mappings.resolve("hypershift_velero_plugin").map(|m| m.image), Some("underscore:1"));
    }

    #[test]
    fn test_first_image_fallback() {
        let mappings = ImageMappings::from_entries(vec![mapping("manager", "manager:1", None), mapping("operator", "", None)]);

        assert_eq!(mappings.first_image(&["operator", "manager"]), Some("manager:1"));
        assert_eq!(mappings.first_image(&["mustgather", "oadp_mustgather"]), None);
    }
}
