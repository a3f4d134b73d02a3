use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub(crate) enum InputError {
    #[error("{what} file not found: {}", .path.display())]
    FileNotFound { what: &'static str, path: PathBuf },

    #[error("{what} file must have .yaml extension: {}", .path.display())]
    BadExtension { what: &'static str, path: PathBuf },
}

pub(crate) fn ensure_exists(what: &'static str, path: &Path) -> Result<()> {
    if !path.try_exists().with_context(|| format!("checking existence of {}", path.display()))? {
        return Err(InputError::FileNotFound {
            what,
            path: path.to_path_buf(),
        }
        .into());
    }

    Ok(())
}

pub(crate) fn ensure_yaml_extension(what: &'static str, path: &Path) -> Result<()> {
    if path.extension().and_then(|extension| extension.to_str()) != Some("yaml") {
        return Err(InputError::BadExtension {
            what,
            path: path.to_path_buf(),
        }
        .into());
    }

    Ok(())
}

pub(crate) fn read_file_to_string(what: &'static str, file_path: &Path) -> Result<String> {
    ensure_exists(what, file_path)?;
    std::fs::read_to_string(file_path).with_context(|| format!("reading {}", file_path.display()))
}

/// Not transactional, a failure halfway through leaves a partially written file behind
pub(crate) fn commit_file(file_path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating directory {}", parent.display()))?;
    }

    std::fs::write(file_path, contents).with_context(|| format!("writing {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_input_error() {
        let err = read_file_to_string("relatedImages", Path::new("/nonexistent/relatedImages.yml")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::FileNotFound { what: "relatedImages", .. })
        ));
        assert_eq!(err.to_string(), "relatedImages file not found: /nonexistent/relatedImages.yml");
    }

    #[test]
    fn test_yaml_extension() {
        assert!(ensure_yaml_extension("CSV", Path::new("bundle/manifests/oadp.clusterserviceversion.yaml")).is_ok());
        assert!(ensure_yaml_extension("CSV", Path::new("upstream.yml")).is_err());
        assert!(ensure_yaml_extension("CSV", Path::new("upstream")).is_err());
    }

    #[test]
    fn test_commit_file_creates_parent_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bundle").join("manifests").join("out.yaml");

        commit_file(&path, "kind: ClusterServiceVersion\n")?;

        assert_eq!(std::fs::read_to_string(&path)?, "kind: ClusterServiceVersion\n");

        Ok(())
    }
}
