use anyhow::{ensure, Context, Result};
use clap::Parser;
use clio::ClioPath;
use itertools::Itertools;
use serde_json::{Map, Value};
use std::{env, ops::Deref, path::Path};

use self::cli::Cli;

mod cli;

pub(crate) const CONFIG_ENV_VAR: &str = "REBUNDLE_CONFIG";

/// A path given on the command line or in the config file
#[derive(Clone, Debug)]
pub(crate) struct BundlePath(ClioPath);

impl BundlePath {
    pub(crate) fn new(path: &str) -> Result<Self> {
        Ok(Self(ClioPath::new(path).with_context(|| format!("invalid path {path:?}"))?))
    }
}

impl Deref for BundlePath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.path()
    }
}

impl std::fmt::Display for BundlePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.path().display().fmt(f)
    }
}

impl serde::Serialize for BundlePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.to_string_lossy().as_ref())
    }
}

/// Where a bundle document is read from, written to, and the patch to apply in between
#[derive(serde::Serialize)]
pub(crate) struct DocumentPaths {
    pub(crate) upstream: BundlePath,
    pub(crate) output: BundlePath,
    pub(crate) patch: Option<BundlePath>,
}

impl DocumentPaths {
    /// The output defaults to overwriting the upstream file
    pub(crate) fn new(what: &str, upstream: BundlePath, output: Option<BundlePath>, patch: Option<BundlePath>) -> Self {
        let output = output.unwrap_or_else(|| {
            log::info!("No output {what} provided, using upstream {what} file: {upstream}");
            upstream.clone()
        });

        Self { upstream, output, patch }
    }
}

/// All parsed CLI arguments, coalesced into a single struct for convenience
#[derive(serde::Serialize)]
pub(crate) struct RebundleConfig {
    pub(crate) related_images: BundlePath,
    pub(crate) csv: DocumentPaths,
    pub(crate) annotations: Option<DocumentPaths>,
    pub(crate) dry_run: bool,
    pub(crate) verbose: bool,
    pub(crate) summary_file: Option<BundlePath>,

    pub(crate) config_file_raw: Option<String>,
    pub(crate) cli_raw: Option<String>,
}

fn take_path(value: &mut Map<String, Value>, key: &str) -> Result<Option<BundlePath>> {
    match value.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(path) => Ok(Some(
            BundlePath::new(path.as_str().with_context(|| format!("{key} must be a string"))?).context(key.to_string())?,
        )),
    }
}

fn take_bool(value: &mut Map<String, Value>, key: &str) -> Result<bool> {
    value
        .remove(key)
        .unwrap_or(Value::Bool(false))
        .as_bool()
        .with_context(|| format!("{key} must be a boolean"))
}

impl RebundleConfig {
    pub(crate) fn parse_from_config_file(config_bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_yaml::from_slice(config_bytes)?;

        let mut value = value.as_object().context("config file must be a YAML object")?.clone();

        let related_images = take_path(&mut value, "related_images")?.context("related_images is required")?;
        let upstream_csv = take_path(&mut value, "upstream_csv")?.context("upstream_csv is required")?;
        let output_csv = take_path(&mut value, "output_csv")?;
        let csv_patch = take_path(&mut value, "csv_patch")?;

        let upstream_annotations = take_path(&mut value, "upstream_annotations")?;
        let output_annotations = take_path(&mut value, "output_annotations")?;
        let annotations_patch = take_path(&mut value, "annotations_patch")?;

        ensure!(
            upstream_annotations.is_some() || (output_annotations.is_none() && annotations_patch.is_none()),
            "output_annotations and annotations_patch require upstream_annotations"
        );

        let dry_run = take_bool(&mut value, "dry_run")?;
        let verbose = take_bool(&mut value, "verbose")?;
        let summary_file = take_path(&mut value, "summary_file")?;

        ensure!(
            value.is_empty(),
            "unknown keys {} in config file",
            value.keys().map(|key| format!("{key:?}")).join(", ")
        );

        Ok(Self {
            related_images,
            csv: DocumentPaths::new("CSV", upstream_csv, output_csv, csv_patch),
            annotations: upstream_annotations
                .map(|upstream_annotations| DocumentPaths::new("annotations", upstream_annotations, output_annotations, annotations_patch)),
            dry_run,
            verbose,
            summary_file,

            cli_raw: None,
            config_file_raw: Some(String::from_utf8_lossy(config_bytes).to_string()),
        })
    }

    pub(crate) fn parse_from_cli(cli: Cli) -> Result<Self> {
        let annotations = cli.upstream_annotations.map(|upstream_annotations| {
            DocumentPaths::new(
                "annotations",
                BundlePath(upstream_annotations),
                cli.output_annotations.map(BundlePath),
                cli.annotations_patch.map(BundlePath),
            )
        });

        Ok(Self {
            related_images: BundlePath(cli.related_images),
            csv: DocumentPaths::new(
                "CSV",
                BundlePath(cli.upstream_csv),
                cli.output_csv.map(BundlePath),
                cli.csv_patch.map(BundlePath),
            ),
            annotations,
            dry_run: cli.dry_run,
            verbose: cli.verbose,
            summary_file: cli.summary_file.map(BundlePath),

            config_file_raw: None,
            cli_raw: Some(serde_json::to_string(&env::args().collect::<Vec<String>>())?),
        })
    }

    pub(crate) fn new() -> Result<RebundleConfig> {
        Ok(match env::var(CONFIG_ENV_VAR) {
            Ok(var) => {
                let num_args = env::args().len();

                ensure!(
                    num_args == 1,
                    "{CONFIG_ENV_VAR} is set, but there are {num_args} CLI arguments. {CONFIG_ENV_VAR} is meant to be used with no arguments."
                );

                RebundleConfig::parse_from_config_file(&std::fs::read(&var).context(format!("reading {CONFIG_ENV_VAR} file {}", var))?)
                    .context(format!("parsing {CONFIG_ENV_VAR} file {}", var))?
            }
            Err(_) => RebundleConfig::parse_from_cli(Cli::parse()).context("CLI parsing")?,
        })
    }
}
