use crate::{
    config::{DocumentPaths, RebundleConfig},
    csv_rewrite::{annotations, deployment, env_vars, related_images, related_images::RelatedImagesOutcome},
    document, file_utils,
    image_mappings::ImageMappings,
    patch,
};
use anyhow::{Context, Result};
use serde_json::Value;

pub(crate) mod timing;

const BANNER_WIDTH: usize = 80;

/// What a run did, reported at the end and written to the summary file
#[derive(Debug, Default, Clone, serde::Serialize)]
pub(crate) struct RunSummary {
    pub(crate) dry_run: bool,
    pub(crate) image_mappings: usize,
    pub(crate) env_var_mappings: usize,
    pub(crate) created_at: Option<String>,
    pub(crate) related_images: RelatedImagesOutcome,
    pub(crate) environment_variables: usize,
    pub(crate) container_image_annotation: bool,
    pub(crate) deployment_container_image: bool,
    pub(crate) must_gather_annotation: bool,
    pub(crate) csv_patch_operations: Option<usize>,
    pub(crate) annotations_patch_operations: Option<usize>,
    pub(crate) written: Vec<String>,
}

/// Run a single CSV rewrite. The rewrites only touch disjoint fields, so a structural mismatch in
/// one of them is reported and the remaining ones still run.
fn rewrite_step<T: Default>(description: &str, rewrite: impl FnOnce() -> Result<T>) -> T {
    match rewrite() {
        Ok(result) => result,
        Err(err) => {
            log::warn!("Error {description}: {:#}", err);
            T::default()
        }
    }
}

pub(crate) fn run(rebundle_config: &RebundleConfig) -> Result<RunSummary> {
    file_utils::ensure_exists("relatedImages", &rebundle_config.related_images)?;
    file_utils::ensure_exists("upstream CSV", &rebundle_config.csv.upstream)?;

    let mappings = ImageMappings::load(&rebundle_config.related_images)?;
    let mut csv = document::load_yaml_document("CSV", &rebundle_config.csv.upstream)?;

    let mut summary = RunSummary {
        dry_run: rebundle_config.dry_run,
        image_mappings: mappings.len(),
        env_var_mappings: mappings.env_var_count(),
        ..Default::default()
    };

    if rebundle_config.dry_run {
        report_dry_run(rebundle_config, &mappings);
        return Ok(summary);
    }

    log::info!("{}", "=".repeat(BANNER_WIDTH));
    log::info!("UPDATING OPERATOR BUNDLE CSV FOR HERMETIC BUILD");
    log::info!("{}", "=".repeat(BANNER_WIDTH));

    rewrite_csv(&mut csv.root, &mappings, &mut summary);

    let mut step = 7;

    if let Some(csv_patch) = &rebundle_config.csv.patch {
        log::info!("{step}. Applying additional CSV configuration changes:");
        summary.csv_patch_operations = patch::apply_patch_file("CSV", &mut csv.root, csv_patch, &mappings)?;
        step += 1;
    }

    if let Some(annotations) = &rebundle_config.annotations {
        log::info!("{step}. Processing annotations file:");
        summary.annotations_patch_operations = process_annotations(annotations, &mappings, step)?;
        summary.written.push(annotations.output.to_string());
        step += 3;
    }

    log::info!("{step}. Saving updated CSV to: {}", rebundle_config.csv.output);
    document::dump_yaml_document("CSV", &csv, &rebundle_config.csv.output)?;
    summary.written.push(rebundle_config.csv.output.to_string());

    log::info!("{}", "=".repeat(BANNER_WIDTH));
    log::info!("CSV UPDATE COMPLETED SUCCESSFULLY!");
    log::info!(
        "Processed {} image mappings and {} env var mappings",
        summary.image_mappings,
        summary.env_var_mappings
    );
    log::info!("{}", "=".repeat(BANNER_WIDTH));

    Ok(summary)
}

fn report_dry_run(rebundle_config: &RebundleConfig, mappings: &ImageMappings) {
    log::info!("DRY RUN MODE - No changes will be made");
    log::info!(
        "Would process {} images and {} env vars",
        mappings.len(),
        mappings.env_var_count()
    );

    if let Some(csv_patch) = &rebundle_config.csv.patch {
        log::info!("Would apply CSV patch from: {}", csv_patch);
    }

    if let Some(annotations) = &rebundle_config.annotations {
        log::info!("Would also process annotations file: {}", annotations.upstream);
        if let Some(annotations_patch) = &annotations.patch {
            log::info!("Would apply annotations patch from: {}", annotations_patch);
        }
    }
}

/// The fixed sequence of CSV rewrites
pub(crate) fn rewrite_csv(csv: &mut Value, mappings: &ImageMappings, summary: &mut RunSummary) {
    log::info!("1. Updating createdAt timestamp:");
    summary.created_at = rewrite_step("updating createdAt timestamp", || {
        annotations::update_created_at_timestamp(csv, chrono::Utc::now()).map(Some)
    });

    log::info!("2. Updating spec.relatedImages section:");
    summary.related_images = rewrite_step("updating spec.relatedImages", || {
        related_images::update_related_images_section(csv, mappings)
    });

    log::info!("3. Updating RELATED_IMAGE_* environment variables:");
    summary.environment_variables = rewrite_step("navigating CSV structure for environment variables", || {
        env_vars::update_environment_variables(csv, mappings)
    });

    log::info!("4. Updating containerImage annotation:");
    summary.container_image_annotation = rewrite_step("updating containerImage annotation", || {
        annotations::update_container_image_annotation(csv, mappings)
    });

    log::info!("5. Updating deployment container image:");
    summary.deployment_container_image = rewrite_step("updating deployment container image", || {
        deployment::update_deployment_container_image(csv, mappings)
    });

    log::info!("6. Updating must-gather annotation:");
    summary.must_gather_annotation = rewrite_step("updating must-gather annotation", || {
        annotations::update_must_gather_annotation(csv, mappings)
    });
}

fn process_annotations(annotations: &DocumentPaths, mappings: &ImageMappings, step: usize) -> Result<Option<usize>> {
    file_utils::ensure_exists("upstream annotations", &annotations.upstream)?;

    let mut annotations_document = document::load_yaml_document("annotations", &annotations.upstream)?;

    let applied = match &annotations.patch {
        Some(annotations_patch) => {
            log::info!("{}. Applying additional annotations configuration changes:", step + 1);
            patch::apply_patch_file("annotations", &mut annotations_document.root, annotations_patch, mappings)?
        }
        None => None,
    };

    log::info!("{}. Saving updated annotations to: {}", step + 2, annotations.output);
    document::dump_yaml_document("annotations", &annotations_document, &annotations.output)
        .context("saving annotations")?;

    Ok(applied)
}
