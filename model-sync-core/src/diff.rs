//! Diff report for pull requests that touch data model files.
//!
//! The report is markdown meant to be posted as a single PR comment. It knows
//! just enough of the vendor layout (`name`, `pages[].elements[].columns[]`)
//! to say what moved; everything else is reported as added/removed/changed
//! top-level keys. Output is sorted so that the same change set always renders
//! the same comment.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::contract::ModelApi;
use crate::document::{to_canonical, SERVER_MANAGED_KEYS};
use crate::error::{Result, SyncError};
use crate::git;
use crate::mapping::{resolve, ModelMapping};

pub const NO_CHANGES: &str = "No data model changes detected.";

/// One changed file with its contents before and after the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChange {
    pub file: String,
    /// `None` when the file is new.
    pub before: Option<String>,
    /// `None` when the file was removed.
    pub after: Option<String>,
    /// Set when the baseline could not be obtained at all.
    pub problem: Option<String>,
}

/// Where the "before" side of the diff comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// `git show <ref>:<file>`.
    GitRef(String),
    /// The vendor's current version of each mapped model. The ref only
    /// selects which files changed.
    Remote(String),
}

/// Changes between `base` and the working tree, with git as the baseline.
pub fn collect_git_changes(repo: &Path, base: &str, models_dir: &str) -> Result<Vec<FileChange>> {
    let files = git::changed_model_files(repo, base, models_dir)?;
    let mut changes = Vec::with_capacity(files.len());
    for file in files {
        let before = git::file_at_ref(repo, &file, base)?;
        let (after, problem) = read_working_copy(repo, &file);
        changes.push(FileChange {
            file,
            before,
            after,
            problem,
        });
    }
    Ok(changes)
}

/// Same files, but each mapped model is compared against the vendor's copy.
/// Unmapped files are treated as new models.
pub async fn collect_remote_changes<A>(
    api: &A,
    mapping: &ModelMapping,
    root: &Path,
    files: &[String],
) -> Vec<FileChange>
where
    A: ModelApi + ?Sized,
{
    let mut changes = Vec::with_capacity(files.len());
    for file in files {
        let (after, mut problem) = read_working_copy(root, file);
        let remote_id = mapping
            .entry_for_file(file)
            .and_then(|e| e.remote_id.clone());
        let before = match remote_id {
            Some(id) => match api.get_model(&id).await {
                Ok(doc) => Some(to_canonical(&doc)),
                Err(e) => {
                    warn!(file = %file, remote_id = %id, error = %e, "Could not fetch remote baseline");
                    problem.get_or_insert_with(|| format!("could not fetch remote version: {e}"));
                    None
                }
            },
            None => None,
        };
        changes.push(FileChange {
            file: file.clone(),
            before,
            after,
            problem,
        });
    }
    changes
}

fn read_working_copy(root: &Path, file: &str) -> (Option<String>, Option<String>) {
    let path = resolve(root, file);
    match std::fs::read_to_string(&path) {
        Ok(text) => (Some(text), None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, None),
        Err(e) => (None, Some(SyncError::io(&path, e).to_string())),
    }
}

/// Render the full markdown comment.
pub fn render_report(changes: &[FileChange]) -> String {
    if changes.is_empty() {
        return format!("{NO_CHANGES}\n");
    }

    let mut out = format!("**{} data model(s) changed:**\n\n", changes.len());
    for change in changes {
        out.push_str(&format!("### `{}`\n\n", change.file));
        match describe(change) {
            Ok(lines) if lines.is_empty() => out.push_str("_No structural changes detected_\n"),
            Ok(lines) => {
                for line in lines {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
            Err(reason) => {
                warn!(file = %change.file, reason = %reason, "Unable to compute diff");
                out.push_str(&format!(
                    "⚠️ Unable to compute diff for `{}`: {reason}\n",
                    change.file
                ));
            }
        }
        out.push('\n');
    }
    info!(files = changes.len(), "Rendered diff report");
    out
}

fn describe(change: &FileChange) -> std::result::Result<Vec<String>, String> {
    if let Some(problem) = &change.problem {
        return Err(problem.clone());
    }
    // An unreadable baseline counts as absent: the file is reported as new.
    let before = change.before.as_deref().and_then(|text| {
        serde_json::from_str::<Value>(text)
            .map_err(|e| warn!(file = %change.file, error = %e, "Previous version is not valid JSON"))
            .ok()
    });
    let after = match &change.after {
        Some(text) => Some(
            serde_json::from_str::<Value>(text)
                .map_err(|e| format!("could not parse JSON: {e}"))?,
        ),
        None => None,
    };
    match (before, after) {
        (_, None) => Ok(vec!["🗑️ **Data model removed**".to_string()]),
        (old, Some(new)) => Ok(analyze_changes(old.as_ref(), &new)),
    }
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn array_field<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Index a list of objects by the first present key field, falling back to position.
fn keyed<'a>(items: &'a [Value], fields: &[&str]) -> BTreeMap<String, &'a Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let key = fields
                .iter()
                .find_map(|f| str_field(item, f))
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{i}"));
            (key, item)
        })
        .collect()
}

fn ticked<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Change lines between two versions of one model. `old == None` means the
/// model is new.
pub fn analyze_changes(old: Option<&Value>, new: &Value) -> Vec<String> {
    let mut changes = Vec::new();

    let Some(old) = old else {
        changes.push("🆕 **New data model**".to_string());
        if let Some(name) = str_field(new, "name") {
            changes.push(format!("- Name: `{name}`"));
        }
        for page in array_field(new, "pages") {
            for element in array_field(page, "elements") {
                changes.push(format!(
                    "- {}: `{}` ({} columns)",
                    str_field(element, "kind").unwrap_or("unknown"),
                    str_field(element, "name").unwrap_or("Unnamed"),
                    array_field(element, "columns").len()
                ));
            }
        }
        return changes;
    };

    let old_name = str_field(old, "name");
    let new_name = str_field(new, "name");
    if old_name != new_name {
        changes.push(format!(
            "📝 Name: `{}` → `{}`",
            old_name.unwrap_or("(none)"),
            new_name.unwrap_or("(none)")
        ));
    }

    let old_pages = keyed(array_field(old, "pages"), &["id", "name"]);
    let new_pages = keyed(array_field(new, "pages"), &["id", "name"]);

    for (id, page) in &new_pages {
        if !old_pages.contains_key(id) {
            changes.push(format!(
                "➕ New page: `{}`",
                str_field(page, "name").unwrap_or("Unnamed")
            ));
        }
    }
    for (id, page) in &old_pages {
        if !new_pages.contains_key(id) {
            changes.push(format!(
                "➖ Removed page: `{}`",
                str_field(page, "name").unwrap_or("Unnamed")
            ));
        }
    }

    for (id, new_page) in &new_pages {
        let Some(old_page) = old_pages.get(id) else {
            continue;
        };
        let old_elements = keyed(array_field(old_page, "elements"), &["id", "name"]);
        let new_elements = keyed(array_field(new_page, "elements"), &["id", "name"]);

        for (eid, element) in &new_elements {
            if !old_elements.contains_key(eid) {
                changes.push(format!(
                    "➕ New {}: `{}`",
                    str_field(element, "kind").unwrap_or("element"),
                    str_field(element, "name").unwrap_or("Unnamed")
                ));
            }
        }
        for (eid, element) in &old_elements {
            if !new_elements.contains_key(eid) {
                changes.push(format!(
                    "➖ Removed {}: `{}`",
                    str_field(element, "kind").unwrap_or("element"),
                    str_field(element, "name").unwrap_or("Unnamed")
                ));
            }
        }
        for (eid, new_element) in &new_elements {
            let Some(old_element) = old_elements.get(eid) else {
                continue;
            };
            let elem_name = str_field(new_element, "name").unwrap_or("Unnamed");
            let (added, removed, modified) = compare_columns(
                array_field(old_element, "columns"),
                array_field(new_element, "columns"),
            );
            if !added.is_empty() {
                changes.push(format!("  ➕ `{elem_name}`: Added columns: {}", ticked(&added)));
            }
            if !removed.is_empty() {
                changes.push(format!("  ➖ `{elem_name}`: Removed columns: {}", ticked(&removed)));
            }
            if !modified.is_empty() {
                changes.push(format!("  📝 `{elem_name}`: Modified columns: {}", ticked(&modified)));
            }
        }
    }

    changes.extend(compare_top_level(old, new));
    changes
}

/// Added, removed and modified (formula changed) column names.
fn compare_columns(old: &[Value], new: &[Value]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let old_cols = keyed(old, &["name", "id"]);
    let new_cols = keyed(new, &["name", "id"]);

    let added = new_cols
        .keys()
        .filter(|k| !old_cols.contains_key(*k))
        .cloned()
        .collect();
    let removed = old_cols
        .keys()
        .filter(|k| !new_cols.contains_key(*k))
        .cloned()
        .collect();
    let modified = new_cols
        .iter()
        .filter(|(k, col)| {
            old_cols
                .get(*k)
                .is_some_and(|old_col| old_col.get("formula") != col.get("formula"))
        })
        .map(|(k, _)| k.clone())
        .collect();
    (added, removed, modified)
}

fn compare_top_level(old: &Value, new: &Value) -> Vec<String> {
    let (Some(old), Some(new)) = (old.as_object(), new.as_object()) else {
        return Vec::new();
    };
    let ignored = |k: &str| k == "name" || k == "pages" || SERVER_MANAGED_KEYS.contains(&k);

    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut changes = Vec::new();
    for key in keys {
        if ignored(key.as_str()) {
            continue;
        }
        match (old.get(key), new.get(key)) {
            (None, Some(_)) => changes.push(format!("➕ Added key `{key}`")),
            (Some(_), None) => changes.push(format!("➖ Removed key `{key}`")),
            (Some(a), Some(b)) if a != b => changes.push(format!("📝 Changed key `{key}`")),
            _ => {}
        }
    }
    changes
}
