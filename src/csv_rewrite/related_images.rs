use crate::{
    image_mappings::{ImageMappings, MatchKind},
    json_tools,
};
use anyhow::{Context, Result};
use serde_json::Value;

/// A spec.relatedImages entry. Field declaration order is the serialization order, so a rewritten
/// entry always comes out as name first, image second.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct RelatedImage<'a> {
    pub(crate) name: &'a str,
    pub(crate) image: &'a str,
}

impl RelatedImage<'_> {
    fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("serializing related image")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct RelatedImagesOutcome {
    /// The section was missing and got synthesized from the mapping file
    pub(crate) created: bool,
    pub(crate) updated: usize,
    pub(crate) unchanged: usize,
    pub(crate) unmatched: usize,
}

pub(crate) fn update_related_images_section(csv: &mut Value, mappings: &ImageMappings) -> Result<RelatedImagesOutcome> {
    let spec = json_tools::ensure_object(csv.as_object_mut().context("document root not an object")?, "spec")?;

    if spec.get("relatedImages").map_or(true, Value::is_null) {
        log::warn!("No spec.relatedImages section found in CSV - creating it with relatedImages values");

        let entries = mappings
            .iter()
            .map(|(name, image)| RelatedImage { name, image }.to_value())
            .collect::<Result<Vec<_>>>()?;
        let created = entries.len();

        spec.insert("relatedImages".to_string(), Value::Array(entries));

        log::info!("Created spec.relatedImages section with {} entries", created);

        return Ok(RelatedImagesOutcome {
            created: true,
            updated: created,
            ..Default::default()
        });
    }

    let mut outcome = RelatedImagesOutcome::default();

    for item in spec
        .get_mut("relatedImages")
        .context("spec.relatedImages disappeared")?
        .as_array_mut()
        .context("spec.relatedImages not an array")?
        .iter_mut()
    {
        let upstream_name = json_tools::read_string_field(item, "name").unwrap_or_default();

        let Some(image_match) = mappings.resolve(&upstream_name) else {
            log::debug!("  No match found for relatedImage '{}'", upstream_name);
            outcome.unmatched += 1;
            continue;
        };

        match image_match.kind {
            MatchKind::Exact => log::debug!("Direct match found for '{}'", upstream_name),
            MatchKind::Normalized => log::debug!("Normalized match found: '{}' -> '{}'", upstream_name, image_match.name),
        }

        let old_image = json_tools::read_string_field(item, "image").unwrap_or_default();

        if old_image == image_match.image && upstream_name == image_match.name {
            log::debug!("  relatedImage '{}' already has correct value", upstream_name);
            outcome.unchanged += 1;
            continue;
        }

        log::info!("  Updating relatedImage '{}':", upstream_name);
        log::info!("    FROM: {}", old_image);
        log::info!("    TO:   {}", image_match.image);

        // Replace the whole entry rather than its fields so the key order is canonical
        *item = RelatedImage {
            name: image_match.name,
            image: image_match.image,
        }
        .to_value()?;

        if upstream_name != image_match.name {
            log::info!("    NAME: {} -> {} (normalized)", upstream_name, image_match.name);
        }

        outcome.updated += 1;
    }

    log::info!("Updated {} relatedImages entries", outcome.updated);

    Ok(outcome)
}
