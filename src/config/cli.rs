use clap::Parser;
use clio::ClioPath;

const EXAMPLES: &str = "\
Examples:
  # Basic usage (overwrites the upstream CSV file directly)
  rebundle --related-images relatedImages.yml --upstream-csv upstream.clusterserviceversion.yaml

  # Separate output file
  rebundle --related-images relatedImages.yml --upstream-csv upstream.clusterserviceversion.yaml \\
    --output-csv output.clusterserviceversion.yaml

  # CSV and annotations, each with a patch file
  rebundle \\
    --related-images relatedImages.yml \\
    --upstream-csv bundle/manifests/oadp-operator.clusterserviceversion.yaml \\
    --csv-patch oadp-csv.patch.yaml \\
    --upstream-annotations bundle/metadata/annotations.yaml \\
    --annotations-patch annotations.patch.yaml

  # Dry run to see what would be changed
  rebundle --related-images relatedImages.yml --upstream-csv upstream.clusterserviceversion.yaml --dry-run

All options can instead be given as a YAML file pointed to by the REBUNDLE_CONFIG environment
variable, in which case no arguments may be passed.";

/// Update an operator bundle CSV with the image references found in relatedImages.yml, so that a
/// bundle built in a hermetic environment points at the images produced by that build
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
pub(crate) struct Cli {
    /// Path to relatedImages.yml, a list of name/image/env_var records
    #[clap(long, value_parser = clap::value_parser!(ClioPath))]
    pub(crate) related_images: ClioPath,

    /// Path to the upstream CSV file to update. Must have a .yaml extension
    #[clap(long, value_parser = clap::value_parser!(ClioPath))]
    pub(crate) upstream_csv: ClioPath,

    /// Where to write the updated CSV. Defaults to --upstream-csv
    #[clap(long, value_parser = clap::value_parser!(ClioPath))]
    pub(crate) output_csv: Option<ClioPath>,

    /// Patch file with additional CSV changes, skipped if it doesn't exist
    #[clap(long, alias = "csv-config", value_parser = clap::value_parser!(ClioPath))]
    pub(crate) csv_patch: Option<ClioPath>,

    /// Path to the upstream bundle annotations file to process as well
    #[clap(long, value_parser = clap::value_parser!(ClioPath))]
    pub(crate) upstream_annotations: Option<ClioPath>,

    /// Where to write the updated annotations. Defaults to --upstream-annotations
    #[clap(long, requires = "upstream_annotations", value_parser = clap::value_parser!(ClioPath))]
    pub(crate) output_annotations: Option<ClioPath>,

    /// Patch file with additional annotations changes, skipped if it doesn't exist
    #[clap(long, alias = "annotations-config", requires = "upstream_annotations", value_parser = clap::value_parser!(ClioPath))]
    pub(crate) annotations_patch: Option<ClioPath>,

    /// Show what would be updated without making changes
    #[clap(long)]
    pub(crate) dry_run: bool,

    /// Also report entries that are already up to date, match details and patch operations
    #[clap(long, short)]
    pub(crate) verbose: bool,

    /// Write a YAML summary of the run (configuration, counts, logs) to this file
    #[clap(long, value_parser = clap::value_parser!(ClioPath))]
    pub(crate) summary_file: Option<ClioPath>,
}
