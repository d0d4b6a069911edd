//! Edit script parsing.
//!
//! Every encoding converges on the same ordered list of [`CopyMapEntry`]:
//!
//! | Encoding | Example |
//! |----------|---------|
//! | JSON object | `{"dest": "src", "gone": null}` |
//! | JSON array | `[["dest", "src"], ["gone"]]` |
//! | YAML mapping | `dest: src` |
//! | YAML sequence | `- [dest, src]` |
//! | text lines | `dest src` / `gone` |
//!
//! JSON is tried first, then YAML. A document that parses to a bare scalar is
//! treated as text lines.

use serde_json::Value;

use super::{CopyMapEntry, CopyMapError, EditScript};

/// Detected encoding of an edit script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    /// JSON object mapping destination to source
    JsonObject,
    /// JSON array of `[dest, src]` pairs
    JsonArray,
    /// YAML mapping of destination to source
    YamlMapping,
    /// YAML sequence of `[dest, src]` pairs
    YamlSequence,
    /// One `dest [src]` pair per line
    Text,
}

/// Parse an edit script in any supported encoding
pub fn parse_edit_script(bytes: &[u8]) -> Result<EditScript, CopyMapError> {
    let text = std::str::from_utf8(bytes)?;
    parse_edit_script_str(text)
}

/// Parse an edit script from text
pub fn parse_edit_script_str(text: &str) -> Result<EditScript, CopyMapError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(EditScript::default());
    }
    match detect(text)? {
        (_, Value::Object(map)) => parse_mapping(map),
        (_, Value::Array(items)) => parse_sequence(items),
        _ => Ok(parse_lines(text)),
    }
}

/// Detect the encoding of a non-empty script and decode its document
pub fn detect(text: &str) -> Result<(ScriptFormat, Value), CopyMapError> {
    if let Ok(doc) = serde_json::from_str::<Value>(text) {
        let format = match doc {
            Value::Object(_) => ScriptFormat::JsonObject,
            Value::Array(_) => ScriptFormat::JsonArray,
            _ => ScriptFormat::Text,
        };
        return Ok((format, doc));
    }

    let doc: Value = match serde_yaml::from_str(text) {
        Ok(doc) => doc,
        Err(e) if looks_structured(text) => return Err(e.into()),
        Err(_) => return Ok((ScriptFormat::Text, Value::Null)),
    };
    let format = match doc {
        Value::Object(_) => ScriptFormat::YamlMapping,
        Value::Array(_) => ScriptFormat::YamlSequence,
        _ => ScriptFormat::Text,
    };
    Ok((format, doc))
}

/// Check whether unparsable text was meant as JSON or YAML structure
fn looks_structured(text: &str) -> bool {
    text.starts_with(['{', '['])
        || text.lines().map(str::trim).any(|line| {
            !line.starts_with('#')
                && (line.starts_with("- ") || line.contains(": ") || line.ends_with(':'))
        })
}

fn parse_mapping(map: serde_json::Map<String, Value>) -> Result<EditScript, CopyMapError> {
    let mut script = EditScript::default();
    for (destination, source) in map {
        let source = path_or_none(&source).map_err(|found| {
            CopyMapError::Malformed(format!("source of '{destination}' is {found}"))
        })?;
        if let Some(entry) = pair(Some(destination), source) {
            script.push(entry);
        }
    }
    Ok(script)
}

fn parse_sequence(items: Vec<Value>) -> Result<EditScript, CopyMapError> {
    let mut script = EditScript::default();
    for (index, item) in items.into_iter().enumerate() {
        let Value::Array(parts) = item else {
            return Err(CopyMapError::Malformed(format!(
                "element {index} is not a list: {item}"
            )));
        };
        let mut paths = parts.iter().take(2).map(|part| {
            path_or_none(part).map_err(|found| {
                CopyMapError::Malformed(format!("element {index} holds {found}"))
            })
        });
        let destination = paths.next().transpose()?.flatten();
        let source = paths.next().transpose()?.flatten();
        if let Some(entry) = pair(destination, source) {
            script.push(entry);
        }
    }
    Ok(script)
}

/// Parse `dest [src]` lines; blank and `#` lines are ignored
pub fn parse_lines(text: &str) -> EditScript {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut tokens = line.split_whitespace().map(str::to_string);
            pair(tokens.next(), tokens.next())
        })
        .collect()
}

/// Dotted path held by a script value; null and "" mean no path
fn path_or_none(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(format!("not a path: {other}")),
    }
}

/// Canonicalize a `(dest, src)` pair
///
/// A pair with only one path deletes that path.
fn pair(destination: Option<String>, source: Option<String>) -> Option<CopyMapEntry> {
    let destination = destination.filter(|d| !d.is_empty());
    let source = source.filter(|s| !s.is_empty());
    match (destination, source) {
        (Some(destination), Some(source)) => Some(CopyMapEntry::copy(destination, source)),
        (Some(path), None) | (None, Some(path)) => Some(CopyMapEntry::delete(path)),
        (None, None) => None,
    }
}
