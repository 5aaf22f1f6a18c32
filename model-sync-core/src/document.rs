//! Data model documents on disk.
//!
//! Documents are opaque vendor JSON. The only keys looked at here are the
//! ones needed to create a model (`folderId`, `schemaVersion`) and the
//! server-managed metadata that must not be sent on create.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Keys owned by the vendor. Stripped before create, ignored by the diff.
pub const SERVER_MANAGED_KEYS: &[&str] = &[
    "dataModelId",
    "ownerId",
    "createdBy",
    "updatedBy",
    "createdAt",
    "updatedAt",
    "documentVersion",
    "latestDocumentVersion",
    "url",
];

const MAX_STEM_LEN: usize = 50;

pub fn read_model(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| SyncError::json(path, e))
}

/// Pretty JSON, two-space indent, trailing newline.
pub fn to_canonical(doc: &Value) -> String {
    let mut text = serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string());
    text.push('\n');
    text
}

/// Overwrite `path` with the canonical rendering of `doc`.
pub fn write_model(path: &Path, doc: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
    }
    fs::write(path, to_canonical(doc)).map_err(|e| SyncError::io(path, e))?;
    debug!(path = %path.display(), "Wrote data model file");
    Ok(())
}

pub fn model_name(doc: &Value) -> Option<&str> {
    doc.get("name").and_then(Value::as_str)
}

pub fn embedded_id(doc: &Value) -> Option<&str> {
    doc.get("dataModelId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Build the document sent on create.
///
/// Drops [`SERVER_MANAGED_KEYS`], turns `schemaVersion` into an integer
/// (`"v1"` and `"1"` become `1`, absent becomes `1`) and fills `folderId` from
/// `fallback_folder` when the document has none.
pub fn prepare_for_create(doc: &Value, fallback_folder: Option<&str>, file: &str) -> Result<Value> {
    let source = doc.as_object().ok_or_else(|| {
        SyncError::Document(format!("{file}: a data model document must be a JSON object"))
    })?;

    let mut clean: Map<String, Value> = source
        .iter()
        .filter(|(k, _)| !SERVER_MANAGED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let version = match clean.get("schemaVersion") {
        None => Value::from(1),
        Some(Value::String(s)) => {
            let digits = s.trim().trim_start_matches(['v', 'V']);
            let parsed = digits.parse::<i64>().map_err(|_| {
                SyncError::Document(format!("{file}: schemaVersion {s:?} is not a version number"))
            })?;
            Value::from(parsed)
        }
        Some(other) => other.clone(),
    };
    clean.insert("schemaVersion".to_string(), version);

    let has_folder = clean
        .get("folderId")
        .and_then(Value::as_str)
        .is_some_and(|f| !f.is_empty());
    if !has_folder {
        match fallback_folder {
            Some(folder) => {
                clean.insert("folderId".to_string(), Value::from(folder));
            }
            None => {
                return Err(SyncError::MissingFolder {
                    file: file.to_string(),
                })
            }
        }
    }

    Ok(Value::Object(clean))
}

/// Turn a model name into a file stem.
pub fn sanitize_filename(name: &str) -> String {
    static DASHES: OnceLock<Regex> = OnceLock::new();
    let dashes = DASHES.get_or_init(|| Regex::new(r"-{2,}").expect("static regex"));

    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect();
    let collapsed = dashes.replace_all(&lowered, "-");
    let trimmed: String = collapsed
        .trim_matches('-')
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
