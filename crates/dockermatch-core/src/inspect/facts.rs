use crate::parser::InstructionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Normalized projection of an inspected image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFacts {
    pub id: String,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: i64,
    pub architecture: String,
    pub os: String,
    pub config: ImageConfigFacts,
    /// Layer history in build order (oldest first). Empty-layer entries are
    /// retained; they carry metadata-only instructions.
    pub history: Vec<HistoryEntry>,
    /// Root-fs diff digests, in order.
    pub rootfs_layers: Vec<String>,
}

/// The runtime configuration baked into an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfigFacts {
    pub env: BTreeMap<String, String>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub workdir: String,
    pub exposed_ports: BTreeSet<String>,
    pub volumes: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
    pub user: String,
}

/// One history entry, with both the raw `created_by` (for reporting) and
/// its cleaned form (for matching).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub created_by: String,
    pub cleaned: String,
    pub kind: InstructionKind,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: i64,
    pub empty_layer: bool,
}

/// Strip builder noise from a history `created_by` string: the `#(nop)`
/// marker, the `/bin/sh -c` prefix, and surrounding matched quotes.
pub fn clean_created_by(raw: &str) -> String {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix("#(nop)") {
        cleaned = rest.trim();
    } else if let Some(idx) = cleaned.find("/bin/sh -c #(nop)") {
        cleaned = cleaned[idx + "/bin/sh -c #(nop)".len()..].trim();
    } else if let Some(idx) = cleaned.find("/bin/sh -c") {
        cleaned = cleaned[idx + "/bin/sh -c".len()..].trim();
    }

    // BuildKit appends a marker comment to rewritten commands.
    if let Some(rest) = cleaned.strip_suffix("# buildkit") {
        cleaned = rest.trim_end();
    }

    let bytes = cleaned.as_bytes();
    if cleaned.len() >= 2
        && ((bytes[0] == b'"' && bytes[cleaned.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[cleaned.len() - 1] == b'\''))
    {
        cleaned = &cleaned[1..cleaned.len() - 1];
    }

    cleaned.trim().to_string()
}

/// Best-effort classification of a history entry.
pub fn history_kind(raw: &str, cleaned: &str) -> InstructionKind {
    // Metadata entries carry their keyword after the nop marker.
    if let Some(keyword) = cleaned.split_whitespace().next() {
        let kind = InstructionKind::from_keyword(keyword);
        if kind != InstructionKind::Other && keyword == kind.as_str() {
            return kind;
        }
    }

    if raw.contains("/bin/sh -c") || raw.contains("/bin/bash -c") || raw.contains("RUN ") {
        return InstructionKind::Run;
    }

    // Shell layers rewritten by BuildKit lose the prefix; package-manager
    // names are a strong hint that this was a RUN.
    let lower = cleaned.to_lowercase();
    const MANAGERS: [&str; 9] = [
        "apt-get", "apt", "pip", "pip3", "npm", "yarn", "yum", "dnf", "apk",
    ];
    if MANAGERS.iter().any(|m| lower.contains(m)) {
        return InstructionKind::Run;
    }

    InstructionKind::Other
}

/// Derive the base-image reference recorded in history, if any.
///
/// Build history is lossy here: classic builds keep a `FROM` entry only in
/// some toolchains, BuildKit records a marker comment instead.
pub fn base_image_hint(history: &[HistoryEntry]) -> Option<String> {
    for entry in history {
        if let Some(rest) = entry.cleaned.strip_prefix("FROM ") {
            return Some(rest.trim().to_string());
        }
        if let Some(rest) = entry.created_by.trim().strip_prefix("FROM ") {
            return Some(rest.trim().to_string());
        }
    }

    // BuildKit marker form: `# <digest> FROM-ish reference`.
    let oldest = history.first()?;
    let raw = oldest.created_by.trim();
    if raw.starts_with('#') {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.len() > 2 {
            return Some(parts[2].trim_matches('\'').trim_matches('"').to_string());
        }
    }

    None
}
