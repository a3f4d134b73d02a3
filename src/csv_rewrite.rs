use anyhow::{Context, Result};
use serde_json::Value;

pub(crate) mod annotations;
pub(crate) mod deployment;
pub(crate) mod env_vars;
pub(crate) mod related_images;

/// Names tried, in order, for the operator image itself
pub(crate) const OPERATOR_IMAGE_NAMES: [&str; 2] = ["operator", "manager"];

/// Names tried, in order, for the must-gather image
pub(crate) const MUST_GATHER_IMAGE_NAMES: [&str; 2] = ["mustgather", "oadp_mustgather"];

pub(crate) const MUST_GATHER_ANNOTATION: &str = "operators.openshift.io/must-gather-image";

/// Containers of the first deployment of the CSV install strategy. Missing structure is reported
/// and yields None, structure of the wrong type is an error.
pub(crate) fn primary_containers(csv: &mut Value) -> Result<Option<&mut Vec<Value>>> {
    let Some(deployments) = csv
        .pointer_mut("/spec/install/spec/deployments")
        .filter(|deployments| !deployments.is_null())
    else {
        log::warn!("No deployments found in CSV");
        return Ok(None);
    };

    let Some(deployment) = deployments
        .as_array_mut()
        .context("spec.install.spec.deployments not an array")?
        .first_mut()
    else {
        log::warn!("No deployments found in CSV");
        return Ok(None);
    };

    let Some(containers) = deployment
        .pointer_mut("/spec/template/spec/containers")
        .filter(|containers| !containers.is_null())
    else {
        log::warn!("No containers found in deployment");
        return Ok(None);
    };

    let containers = containers.as_array_mut().context("deployment containers not an array")?;

    if containers.is_empty() {
        log::warn!("No containers found in deployment");
        return Ok(None);
    }

    Ok(Some(containers))
}
