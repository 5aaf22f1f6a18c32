//! Per-entry outcomes of a push or pull run and the summary printed at the end.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Created,
    Updated,
    Pulled,
    /// Nothing to do, e.g. a mapped file that does not exist locally.
    Skipped(String),
    Failed(String),
}

impl EntryStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, EntryStatus::Failed(_))
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Created => write!(f, "created"),
            EntryStatus::Updated => write!(f, "updated"),
            EntryStatus::Pulled => write!(f, "pulled"),
            EntryStatus::Skipped(why) => write!(f, "skipped ({why})"),
            EntryStatus::Failed(why) => write!(f, "failed: {why}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub file: String,
    pub remote_id: Option<String>,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<EntryOutcome>,
    /// Set when the mapping was modified and needs to be written back.
    pub mapping_changed: bool,
}

impl SyncReport {
    pub fn record(&mut self, file: &str, remote_id: Option<&str>, status: EntryStatus) {
        self.outcomes.push(EntryOutcome {
            file: file.to_string(),
            remote_id: remote_id.map(str::to_string),
            status,
        });
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failure()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    EntryStatus::Created | EntryStatus::Updated | EntryStatus::Pulled
                )
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, EntryStatus::Skipped(_)))
            .count()
    }

    /// True when no entry failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome_for(&self, file: &str) -> Option<&EntryOutcome> {
        self.outcomes.iter().find(|o| o.file == file)
    }

    /// Human-readable summary, one line per entry plus a totals line.
    pub fn summary(&self, verb: &str) -> String {
        let mut out = String::new();
        for o in &self.outcomes {
            let mark = match o.status {
                EntryStatus::Failed(_) => "✗",
                EntryStatus::Skipped(_) => "-",
                _ => "✓",
            };
            let id = o.remote_id.as_deref().unwrap_or("(no id)");
            out.push_str(&format!("{mark} {} [{id}] {}\n", o.file, o.status));
        }
        out.push_str(&format!(
            "{verb}: {}  skipped: {}  failed: {}\n",
            self.succeeded(),
            self.skipped(),
            self.failed()
        ));
        out
    }
}
