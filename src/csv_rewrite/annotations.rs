use super::{MUST_GATHER_ANNOTATION, MUST_GATHER_IMAGE_NAMES, OPERATOR_IMAGE_NAMES};
use crate::{image_mappings::ImageMappings, json_tools};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub(crate) const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub(crate) fn update_created_at_timestamp(csv: &mut Value, now: DateTime<Utc>) -> Result<String> {
    let timestamp = now.format(CREATED_AT_FORMAT).to_string();

    let previous = json_tools::set_annotation(csv, "createdAt", &timestamp)?;

    log::info!(
        "Updated createdAt timestamp: {} -> {}",
        json_tools::display_previous(previous.as_ref()),
        timestamp
    );

    Ok(timestamp)
}

pub(crate) fn update_container_image_annotation(csv: &mut Value, mappings: &ImageMappings) -> Result<bool> {
    let Some(operator_image) = mappings.first_image(&OPERATOR_IMAGE_NAMES) else {
        log::warn!("No operator or manager image found for containerImage annotation");
        return Ok(false);
    };

    let previous = json_tools::set_annotation(csv, "containerImage", operator_image)?;

    log::info!("Updated containerImage annotation:");
    log::info!("  FROM: {}", json_tools::display_previous(previous.as_ref()));
    log::info!("  TO:   {}", operator_image);

    Ok(true)
}

pub(crate) fn update_must_gather_annotation(csv: &mut Value, mappings: &ImageMappings) -> Result<bool> {
    let Some(must_gather_image) = mappings.first_image(&MUST_GATHER_IMAGE_NAMES) else {
        log::debug!("No mustgather image found, skipping must-gather annotation update");
        return Ok(false);
    };

    let previous = json_tools::set_annotation(csv, MUST_GATHER_ANNOTATION, must_gather_image)?;

    log::info!("Updated must-gather annotation:");
    log::info!("  FROM: {}", json_tools::display_previous(previous.as_ref()));
    log::info!("  TO:   {}", must_gather_image);

    Ok(true)
}
