use super::{primary_containers, OPERATOR_IMAGE_NAMES};
use crate::{image_mappings::ImageMappings, json_tools};
use anyhow::{Context, Result};
use serde_json::Value;

pub(crate) fn update_deployment_container_image(csv: &mut Value, mappings: &ImageMappings) -> Result<bool> {
    let Some(operator_image) = mappings.first_image(&OPERATOR_IMAGE_NAMES) else {
        log::warn!("No operator or manager image found for deployment container");
        return Ok(false);
    };

    let Some(containers) = primary_containers(csv)? else {
        return Ok(false);
    };

    let container = containers
        .first_mut()
        .context("no container at index 0")?
        .as_object_mut()
        .context("container not an object")?;

    let previous = container.insert("image".to_string(), Value::String(operator_image.to_string()));

    log::info!("Updated deployment container image:");
    log::info!("  FROM: {}", json_tools::display_previous(previous.as_ref()));
    log::info!("  TO:   {}", operator_image);

    Ok(true)
}
