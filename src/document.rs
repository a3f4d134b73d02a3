use crate::file_utils;
use anyhow::{ensure, Context, Result};
use fn_error_context::context;
use serde_json::Value;
use std::path::Path;

use self::layout::SourceLayout;

mod emitter;
mod layout;

/// A bundle YAML file (CSV or annotations). `root` is what gets rewritten, the layout remembers
/// how the file was written so that everything left alone is written back the same way.
pub(crate) struct BundleDocument {
    pub(crate) root: Value,
    layout: SourceLayout,
}

impl BundleDocument {
    pub(crate) fn parse(what: &str, contents: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(contents).context("parsing yaml")?;

        ensure!(root.is_object(), "{what} document root must be a mapping");

        let layout = SourceLayout::scan(contents, &root).unwrap_or_else(|err| {
            log::warn!("Could not record the {what} file layout, it will be written in default style: {:#}", err);
            SourceLayout::default()
        });

        Ok(Self { root, layout })
    }

    /// Block style, keys in insertion order, long strings are never wrapped. Scalars keep their
    /// source text and quoting unless their value changed.
    pub(crate) fn serialize(&self) -> String {
        emitter::emit(&self.root, &self.layout)
    }
}

#[context("loading {what} file {}", path.display())]
pub(crate) fn load_yaml_document(what: &'static str, path: &Path) -> Result<BundleDocument> {
    file_utils::ensure_yaml_extension(what, path)?;

    let contents = file_utils::read_file_to_string(what, path)?;

    BundleDocument::parse(what, &contents)
}

#[context("saving {what} file {}", path.display())]
pub(crate) fn dump_yaml_document(what: &'static str, document: &BundleDocument, path: &Path) -> Result<()> {
    file_utils::commit_file(path, document.serialize())?;

    log::debug!("Saved updated {what} to: {}", path.display());

    Ok(())
}
