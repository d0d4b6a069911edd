//! Catalog overlay built from the beamtime and scientific sidecars.

use std::path::Path;

use log::{debug, warn};
use serde_json::{Map, Value};

use super::{scalar_text, MergeOptions, Sidecars};
use crate::copymap::path;

/// Catalog fields copied from the first non-empty beamtime path
const CATALOG_FIELDS: &[(&str, &[&str])] = &[
    ("principalInvestigator", &["applicant.email"]),
    ("owner", &["leader.lastname", "applicant.lastname"]),
    ("contactEmail", &["pi.email", "applicant.email"]),
    ("sourceFolder", &["corePath"]),
    ("endTime", &["eventEnd"]),
    ("ownerEmail", &["leader.email", "applicant.email"]),
    ("description", &["title"]),
    ("createdAt", &["generated"]),
    ("updatedAt", &["generated"]),
];

const CREATION_LOCATION: &str = "/DESY/{facility}/{beamlineAlias}";
const INSTRUMENT_ID: &str = "/{facility}/{beamline}";
const OWNER_GROUP: &str = "{beamtimeId}-dmgt";
const ACCESS_GROUPS: &[&str] = &[
    "{beamtimeId}-dmgt",
    "{beamtimeId}-clbt",
    "{beamtimeId}-part",
    "{beamline}dmgt",
    "{beamline}staff",
];

/// Build the mapping merged over the flattened entry
pub fn catalog_overlay(sidecars: &Sidecars, options: &MergeOptions) -> Map<String, Value> {
    let mut overlay = Map::new();

    if let Some(beamtime) = &sidecars.beamtime {
        for (field, candidates) in CATALOG_FIELDS {
            insert_first(&mut overlay, field, beamtime, candidates);
        }
        let proposal: &[&str] = if options.proposal_as_proposal {
            &["proposalId"]
        } else {
            &["beamtimeId"]
        };
        insert_first(&mut overlay, "proposalId", beamtime, proposal);
        insert_templates(&mut overlay, beamtime);
    }

    if let Some(relative) = &options.relative_path {
        if let Some(Value::String(folder)) = overlay.get_mut("sourceFolder") {
            *folder = Path::new(folder.as_str())
                .join(relative)
                .to_string_lossy()
                .into_owned();
        }
    }

    if !sidecars.is_empty() {
        let mut scientific = sidecars.scientific.clone().unwrap_or_default();
        if let Some(beamtime) = &sidecars.beamtime {
            for (key, from) in [("beamtimeId", "beamtimeId"), ("DOOR_proposalId", "proposalId")] {
                if !scientific.contains_key(key) {
                    if let Some(value) = beamtime.get(from) {
                        scientific.insert(key.to_string(), value.clone());
                    }
                }
            }
        }
        overlay.insert("scientificMetadata".to_string(), Value::Object(scientific));
    }

    if let Some(pid) = &options.pid {
        overlay.insert("pid".to_string(), Value::String(pid.clone()));
    }
    if let Some(group) = options.owner_group.as_ref().filter(|g| !g.is_empty()) {
        overlay.insert("ownerGroup".to_string(), Value::String(group.clone()));
    }
    if let Some(groups) = &options.access_groups {
        overlay.insert("accessGroups".to_string(), Value::from(groups.clone()));
    }
    overlay
}

fn insert_first(
    overlay: &mut Map<String, Value>,
    field: &str,
    beamtime: &Map<String, Value>,
    candidates: &[&str],
) {
    let found = candidates
        .iter()
        .filter_map(|candidate| path::get(beamtime, candidate))
        .find(|value| !is_empty(value));
    match found {
        Some(value) => {
            overlay.insert(field.to_string(), value.clone());
        }
        None => debug!("{} cannot be found in beamtime metadata", candidates.join("|")),
    }
}

fn insert_templates(overlay: &mut Map<String, Value>, beamtime: &Map<String, Value>) {
    for (field, template) in [
        ("creationLocation", CREATION_LOCATION),
        ("instrumentId", INSTRUMENT_ID),
        ("ownerGroup", OWNER_GROUP),
    ] {
        match fill_template(template, beamtime) {
            Some(value) => {
                overlay.insert(field.to_string(), Value::String(value));
            }
            None => warn!("Cannot build {} from beamtime metadata", field),
        }
    }

    let groups: Option<Vec<String>> = ACCESS_GROUPS
        .iter()
        .map(|template| fill_template(template, beamtime))
        .collect();
    match groups {
        Some(groups) => {
            overlay.insert("accessGroups".to_string(), Value::from(groups));
        }
        None => warn!("Cannot build accessGroups from beamtime metadata"),
    }

    overlay.insert("type".to_string(), Value::String("raw".to_string()));
    overlay.insert("isPublished".to_string(), Value::Bool(false));
}

/// Substitute `{key}` placeholders with top-level beamtime values
///
/// Returns `None` when a placeholder has no value.
pub fn fill_template(template: &str, beamtime: &Map<String, Value>) -> Option<String> {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let end = start + rest[start..].find('}')?;
        filled.push_str(&placeholder(&rest[start + 1..end], beamtime)?);
        rest = &rest[end + 1..];
    }
    filled.push_str(rest);
    Some(filled)
}

fn placeholder(key: &str, beamtime: &Map<String, Value>) -> Option<String> {
    let value = beamtime.get(key).and_then(scalar_text).filter(|s| !s.is_empty());
    match key {
        "beamlineAlias" => value.or_else(|| placeholder("beamline", beamtime)),
        _ => value,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
