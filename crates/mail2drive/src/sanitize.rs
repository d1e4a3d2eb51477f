//! Filename derivation and helpers for keeping sensitive data out of spans.
//!
//! Span attributes only ever carry hashed identifiers; subjects and
//! addresses stay in the run ledger.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

/// Characters rejected by common filesystems and the Drive UI.
static RE_RESERVED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Maximum subject length (in characters) kept in a filename.
pub const MAX_SUBJECT_CHARS: usize = 120;

/// Name used when a subject sanitizes to nothing.
pub const FALLBACK_NAME: &str = "email";

/// Replaces reserved characters with `_`, collapses whitespace runs to a
/// single space, trims and caps the result at [`MAX_SUBJECT_CHARS`].
pub fn sanitize_subject(subject: &str) -> String {
    let replaced = RE_RESERVED.replace_all(subject, "_");
    let collapsed = RE_WHITESPACE.replace_all(&replaced, " ");
    let capped: String = collapsed.trim().chars().take(MAX_SUBJECT_CHARS).collect();
    let capped = capped.trim_end().to_string();

    if capped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        capped
    }
}

/// Destination filename for a message: `<message id>_<subject>.pdf`.
///
/// The message ID prefix keeps names unique within a folder.
pub fn pdf_filename(message_id: &str, subject: &str) -> String {
    let id = RE_RESERVED.replace_all(message_id.trim(), "_");
    format!("{}_{}.pdf", id, sanitize_subject(subject))
}

/// Short deterministic hash for correlating identifiers in traces.
pub fn hash_id(value: &str) -> String {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
