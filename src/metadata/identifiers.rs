//! Catalog identifier synthesis: pid, datasetName, sampleId, instrumentId
//! and techniques.

use std::path::Path;

use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::scalar_text;
use crate::controlled_vocabulary::{split_tokens, Technique, TechniqueResolver};
use crate::copymap::path;

/// Facility names replaced by their acronyms in instrument ids
const FACILITY_ACRONYMS: &[(&str, &str)] = &[("PETRA III", "petra3"), ("PETRA IV", "petra4")];

/// Fill `pid` and `datasetName` unless already present
///
/// The pid is `{beamtimeId}/{scanId}` (or `{beamtimeId}/{scanId}/{uuid}`),
/// where the scan id is derived by [`scan_id`]. No pid is made without a
/// beamtime id.
pub fn update_pid(
    record: &mut Map<String, Value>,
    source: Option<&Path>,
    beamtime_id: Option<&str>,
    with_uuid: bool,
    without_filename: bool,
) {
    if !record.contains_key("pid") {
        let beamtime_id = beamtime_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                path::get(record, "scientificMetadata.beamtimeId").and_then(scalar_text)
            })
            .unwrap_or_default();
        let stem = source
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str());
        let entry = path::get_str(record, "scientificMetadata.name");
        let scan = scan_id(stem, entry, without_filename);

        if !beamtime_id.is_empty() && !scan.is_empty() {
            let pid = if with_uuid {
                format!("{}/{}/{}", beamtime_id, scan, Uuid::new_v4())
            } else {
                format!("{}/{}", beamtime_id, scan)
            };
            debug!("Generated pid {}", pid);
            record.insert("pid".to_string(), Value::String(pid));
        }
    }

    if !record.contains_key("datasetName") {
        if let Some(pid) = record.get("pid").and_then(Value::as_str) {
            let name = pid.split('/').nth(1).unwrap_or(pid).to_string();
            record.insert("datasetName".to_string(), Value::String(name));
        }
    }
}

/// Scan identifier from the file stem and the entry name
///
/// Both names are split on `_` and the trailing number of their last part is
/// the scan number. With the file name kept, the stem is used as is when it
/// already ends in a number, otherwise the entry's scan number is appended.
pub fn scan_id(
    file_stem: Option<&str>,
    entry_name: Option<&str>,
    without_filename: bool,
) -> String {
    let stem = file_stem.unwrap_or_default();
    let file_part = last_part(stem);
    let file_number = trailing_number(file_part);
    let entry_part = entry_name.map(last_part).unwrap_or_default();
    let entry_number = trailing_number(entry_part);

    if !without_filename && !stem.is_empty() {
        return match (file_number, entry_number) {
            (None, Some(n)) => format!("{}_{}", stem, n),
            _ => stem.to_string(),
        };
    }
    match (file_number, entry_number) {
        (Some(n), _) | (None, Some(n)) => n.to_string(),
        _ if file_part.is_empty() => entry_part.to_string(),
        _ if entry_part.is_empty() || entry_part == file_part => file_part.to_string(),
        _ => format!("{}_{}", file_part, entry_part),
    }
}

fn last_part(name: &str) -> &str {
    name.rsplit('_').next().unwrap_or(name)
}

/// Trailing digits of `text` without leading zeros
fn trailing_number(text: &str) -> Option<&str> {
    let digits = &text[text.trim_end_matches(|c: char| c.is_ascii_digit()).len()..];
    if digits.is_empty() {
        return None;
    }
    match digits.trim_start_matches('0') {
        "" => Some("0"),
        number => Some(number),
    }
}

/// Fill `sampleId`
///
/// An explicit id wins. Otherwise it is taken from the sample name when
/// requested, or from the sample description, which may be a YAML mapping
/// carrying `sample_id` or `sampleId`.
pub fn update_sample_id(
    record: &mut Map<String, Value>,
    sample_id: Option<&str>,
    from_name: bool,
) {
    let found = match sample_id.filter(|id| !id.is_empty()) {
        Some(id) => Some(id.to_string()),
        None if from_name => {
            let name = path::get(record, "scientificMetadata.sample.name");
            name.and_then(|n| n.get("value").or(Some(n)))
                .and_then(scalar_text)
        }
        None => path::get_str(record, "scientificMetadata.sample.description.value")
            .map(sample_id_from_description),
    };
    if let Some(id) = found.filter(|id| !id.is_empty()) {
        record.insert("sampleId".to_string(), Value::String(id));
    }
}

fn sample_id_from_description(description: &str) -> String {
    let parsed: Option<Map<String, Value>> = serde_yaml::from_str(description).ok();
    parsed
        .as_ref()
        .and_then(|doc| doc.get("sample_id").or_else(|| doc.get("sampleId")))
        .and_then(scalar_text)
        .unwrap_or_else(|| description.to_string())
}

/// Set or normalize `instrumentId`
///
/// Facility names become acronyms and the id is lowercased unless `raw`.
pub fn update_instrument_id(
    record: &mut Map<String, Value>,
    instrument_id: Option<&str>,
    raw: bool,
) {
    if let Some(id) = instrument_id.filter(|id| !id.is_empty()) {
        record.insert("instrumentId".to_string(), Value::String(id.to_string()));
        return;
    }
    if raw {
        return;
    }
    if let Some(Value::String(id)) = record.get_mut("instrumentId") {
        *id = normalize_instrument_id(id);
    }
}

/// Replace facility names with acronyms and lowercase
pub fn normalize_instrument_id(id: &str) -> String {
    FACILITY_ACRONYMS
        .iter()
        .fold(id.to_string(), |id, (name, acronym)| id.replace(name, acronym))
        .to_lowercase()
}

/// Fill `techniques`
///
/// An explicit token list wins. Otherwise techniques are discovered from the
/// `experiment_description` (YAML with `techniques`/`technique` and
/// `techniques_pids`/`technique_pid`), falling back to the application
/// `definition` when the description names none. The key is always present
/// afterwards.
pub fn update_techniques(
    record: &mut Map<String, Value>,
    resolver: &TechniqueResolver<'_>,
    tokens: Option<&str>,
) {
    let techniques = match tokens.filter(|t| !t.trim().is_empty()) {
        Some(tokens) => Some(resolver.resolve_list(tokens)),
        None if record.contains_key("techniques") => None,
        None => Some(discover_techniques(record, resolver)),
    };
    if let Some(techniques) = techniques {
        record.insert("techniques".to_string(), techniques_value(&techniques));
    }
}

fn discover_techniques(
    record: &Map<String, Value>,
    resolver: &TechniqueResolver<'_>,
) -> Vec<Technique> {
    let from_description = path::get_str(record, "scientificMetadata.experiment_description.value")
        .map(|description| techniques_from_description(description, resolver))
        .unwrap_or_default();
    if !from_description.is_empty() {
        return from_description;
    }
    path::get_str(record, "scientificMetadata.definition.value")
        .map(|definition| resolver.resolve_list(definition))
        .unwrap_or_default()
}

fn techniques_from_description(
    description: &str,
    resolver: &TechniqueResolver<'_>,
) -> Vec<Technique> {
    let Ok(Value::Object(doc)) = serde_yaml::from_str::<Value>(description) else {
        return resolver.resolve_list(description);
    };
    let tokens = doc
        .get("techniques")
        .or_else(|| doc.get("technique"))
        .map(string_list);
    let pids = doc
        .get("techniques_pids")
        .or_else(|| doc.get("technique_pid"))
        .map(pid_list);

    match (tokens, pids) {
        (Some(tokens), pids) => resolver.resolve(&tokens, pids.as_deref()),
        (None, Some(pids)) => {
            let tokens: Vec<String> = pids.iter().flatten().cloned().collect();
            resolver.resolve(&tokens, None)
        }
        (None, None) => resolver.resolve_list(description),
    }
}

/// Scalar or list of scalars as strings
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(text) => split_tokens(text),
        other => scalar_text(other).into_iter().collect(),
    }
}

/// Positional pids; nulls keep their slot
fn pid_list(value: &Value) -> Vec<Option<String>> {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        other => vec![scalar_text(other)],
    }
}

fn techniques_value(techniques: &[Technique]) -> Value {
    Value::Array(
        techniques
            .iter()
            .map(|t| {
                let mut map = Map::new();
                map.insert("name".to_string(), Value::String(t.name.clone()));
                map.insert("pid".to_string(), Value::String(t.pid.clone()));
                Value::Object(map)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlled_vocabulary::TechniqueVocabulary;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_scan_id() {
        assert_eq!(scan_id(Some("scan"), Some("entry12345"), false), "scan_12345");
        assert_eq!(scan_id(Some("scan_00012"), Some("entry12345"), false), "scan_00012");
        assert_eq!(scan_id(Some("scan"), Some("entry"), false), "scan");
        assert_eq!(scan_id(Some("scan"), Some("entry12345"), true), "12345");
        assert_eq!(scan_id(Some("scan_00012"), Some("entry3"), true), "12");
        assert_eq!(scan_id(Some("scan"), Some("entry"), true), "scan_entry");
        assert_eq!(scan_id(Some("entry"), Some("entry"), true), "entry");
        assert_eq!(scan_id(None, Some("entry7"), false), "7");
        assert_eq!(scan_id(None, None, false), "");
        assert_eq!(scan_id(Some("scan"), Some("entry000"), false), "scan_0");
    }

    #[test]
    fn test_scan_id_long_number() {
        assert_eq!(
            scan_id(Some("scan"), Some("entry123456789012345678901"), false),
            "scan_123456789012345678901"
        );
        assert_eq!(
            scan_id(Some("scan_000123456789012345678901"), None, true),
            "123456789012345678901"
        );
    }

    #[test]
    fn test_pid_from_beamtime() {
        let mut r = record(json!({"scientificMetadata": {"name": "entry12345", "beamtimeId": "16171271"}}));
        update_pid(&mut r, Some(Path::new("/data/scan.nxs")), None, false, false);
        assert_eq!(r["pid"], json!("16171271/scan_12345"));
        assert_eq!(r["datasetName"], json!("scan_12345"));

        let mut r = record(json!({"scientificMetadata": {"name": "entry12345", "beamtimeId": "16171271"}}));
        update_pid(&mut r, Some(Path::new("/data/scan.nxs")), Some("11111111"), false, true);
        assert_eq!(r["pid"], json!("11111111/12345"));
        assert_eq!(r["datasetName"], json!("12345"));
    }

    #[test]
    fn test_pid_with_uuid() {
        let mut r = record(json!({"scientificMetadata": {"name": "entry1", "beamtimeId": "16171271"}}));
        update_pid(&mut r, Some(Path::new("scan.nxs")), None, true, false);
        let pid = r["pid"].as_str().unwrap();
        let parts: Vec<_> = pid.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[..2], ["16171271", "scan_1"]);
        assert!(Uuid::parse_str(parts[2]).is_ok());
        assert_eq!(r["datasetName"], json!("scan_1"));
    }

    #[test]
    fn test_existing_pid_kept() {
        let mut r = record(json!({"pid": "given/pid/x", "scientificMetadata": {"beamtimeId": "1"}}));
        update_pid(&mut r, Some(Path::new("scan.nxs")), None, false, false);
        assert_eq!(r["pid"], json!("given/pid/x"));
        assert_eq!(r["datasetName"], json!("pid"));
    }

    #[test]
    fn test_no_pid_without_beamtime() {
        let mut r = record(json!({"scientificMetadata": {"name": "entry1"}}));
        update_pid(&mut r, Some(Path::new("scan.nxs")), None, false, false);
        assert!(r.get("pid").is_none());
        assert!(r.get("datasetName").is_none());
    }

    #[test]
    fn test_sample_id() {
        let base = json!({"scientificMetadata": {"sample": {
            "name": {"value": "water"},
            "description": {"value": "sample_id: H2O-01\nnote: degassed"}
        }}});

        let mut r = record(base.clone());
        update_sample_id(&mut r, None, false);
        assert_eq!(r["sampleId"], json!("H2O-01"));

        let mut r = record(base.clone());
        update_sample_id(&mut r, None, true);
        assert_eq!(r["sampleId"], json!("water"));

        let mut r = record(base);
        update_sample_id(&mut r, Some("explicit"), true);
        assert_eq!(r["sampleId"], json!("explicit"));

        let mut r = record(json!({"scientificMetadata": {"sample": {"description": {"value": "plain text"}}}}));
        update_sample_id(&mut r, None, false);
        assert_eq!(r["sampleId"], json!("plain text"));
    }

    #[test]
    fn test_instrument_id() {
        let mut r = record(json!({"instrumentId": "/PETRA III/P01"}));
        update_instrument_id(&mut r, None, false);
        assert_eq!(r["instrumentId"], json!("/petra3/p01"));

        let mut r = record(json!({"instrumentId": "/PETRA III/P01"}));
        update_instrument_id(&mut r, None, true);
        assert_eq!(r["instrumentId"], json!("/PETRA III/P01"));

        let mut r = record(json!({"instrumentId": "/PETRA III/P01"}));
        update_instrument_id(&mut r, Some("/custom/ID"), false);
        assert_eq!(r["instrumentId"], json!("/custom/ID"));
    }

    #[test]
    fn test_techniques_sources() {
        let vocabulary = TechniqueVocabulary::panet();
        let resolver = TechniqueResolver::new(&vocabulary);

        let mut r = record(json!({"scientificMetadata": {"definition": {"value": "NXsaxs"}}}));
        update_techniques(&mut r, &resolver, None);
        assert_eq!(r["techniques"][0]["name"], json!("small angle x-ray scattering"));

        let mut r = record(json!({"scientificMetadata": {
            "definition": {"value": "NXsaxs"},
            "experiment_description": {"value": "techniques: [waxs, my method]\ntechniques_pids: [null, 'http://example.org/m']"}
        }}));
        update_techniques(&mut r, &resolver, None);
        assert_eq!(
            r["techniques"],
            json!([
                {"name": "wide angle x-ray scattering", "pid": "http://purl.org/pan-science/PaNET/PaNET01191"},
                {"name": "my method", "pid": "http://example.org/m"}
            ])
        );

        let mut r = record(json!({"scientificMetadata": {"definition": {"value": "NXsaxs"}}}));
        update_techniques(&mut r, &resolver, Some("xps"));
        assert_eq!(r["techniques"].as_array().unwrap().len(), 1);
        assert_eq!(r["techniques"][0]["name"], json!("x-ray photoelectron spectroscopy"));

        let mut r = record(json!({"scientificMetadata": {}}));
        update_techniques(&mut r, &resolver, None);
        assert_eq!(r["techniques"], json!([]));
    }

    #[test]
    fn test_techniques_fall_back_to_definition() {
        let vocabulary = TechniqueVocabulary::panet();
        let resolver = TechniqueResolver::new(&vocabulary);

        let mut r = record(json!({"scientificMetadata": {
            "definition": {"value": "NXsaxs"},
            "experiment_description": {"value": "Protein solution measured at 20 C"}
        }}));
        update_techniques(&mut r, &resolver, None);
        assert_eq!(r["techniques"][0]["name"], json!("small angle x-ray scattering"));

        let mut r = record(json!({"scientificMetadata": {
            "definition": {"value": "NXsaxs"},
            "experiment_description": {"value": "sample: lysozyme\ntemperature: 20"}
        }}));
        update_techniques(&mut r, &resolver, None);
        assert_eq!(r["techniques"].as_array().map(Vec::len), Some(1));
        assert_eq!(r["techniques"][0]["name"], json!("small angle x-ray scattering"));
    }
}
