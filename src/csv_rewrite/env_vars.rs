use super::primary_containers;
use crate::{image_mappings::ImageMappings, json_tools};
use anyhow::{Context, Result};
use serde_json::Value;

/// Update the RELATED_IMAGE_* environment variables of the operator container (the first
/// container of the first deployment that has an env list)
pub(crate) fn update_environment_variables(csv: &mut Value, mappings: &ImageMappings) -> Result<usize> {
    let Some(containers) = primary_containers(csv)? else {
        return Ok(0);
    };

    let Some(manager_container) = containers.iter_mut().find(|container| container.get("env").is_some()) else {
        log::warn!("No container with environment variables found");
        return Ok(0);
    };

    let env = manager_container
        .get_mut("env")
        .context("env disappeared")?
        .as_array_mut()
        .context("container env not an array")?;

    let mut updated_count = 0;

    for env_var in env.iter_mut() {
        let env_name = json_tools::read_string_field(env_var, "name").unwrap_or_default();

        let Some(new_value) = mappings.env_var_image(&env_name) else {
            continue;
        };

        let old_value = json_tools::read_string_field(env_var, "value").unwrap_or_default();

        if old_value == new_value {
            log::debug!("  env var '{}' already has correct value", env_name);
            continue;
        }

        log::info!("  Updating env var '{}':", env_name);
        log::info!("    FROM: {}", old_value);
        log::info!("    TO:   {}", new_value);

        env_var
            .as_object_mut()
            .context("env var not an object")?
            .insert("value".to_string(), Value::String(new_value.to_string()));

        updated_count += 1;
    }

    log::info!("Updated {} environment variables", updated_count);

    Ok(updated_count)
}
