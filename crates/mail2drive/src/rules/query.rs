//! Mailbox search expression derivation.

use super::model::{non_empty, Rule};

/// Unread inbox items from the last 7 days.
pub const BASE_FILTER: &str = "in:inbox is:unread newer_than:7d";

/// Builds the derived search expression for a keyword list.
///
/// Each keyword is quoted with embedded `"` removed, so a keyword can never
/// close its own quote and inject further clauses. Keywords that are empty
/// after stripping are skipped.
pub fn build_search_expression(keywords: &[String]) -> String {
    let quoted: Vec<String> = keywords
        .iter()
        .map(|k| k.replace('"', ""))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .map(|k| format!("\"{}\"", k))
        .collect();

    if quoted.is_empty() {
        return BASE_FILTER.to_string();
    }

    format!("{} subject:({})", BASE_FILTER, quoted.join(" OR "))
}

/// The expression used for a rule: its explicit query verbatim when set,
/// otherwise the keyword-derived expression narrowed by the label filter.
pub fn effective_search_expression(rule: &Rule) -> String {
    if let Some(explicit) = non_empty(rule.gmail_query.as_deref()) {
        return explicit.to_string();
    }

    let mut expression = build_search_expression(&rule.subject_keywords);
    if let Some(label) = non_empty(rule.label_id.as_deref()) {
        // The base filter already restricts to the inbox.
        if !label.eq_ignore_ascii_case("INBOX") {
            expression.push_str(&format!(" label:\"{}\"", label.replace('"', "")));
        }
    }
    expression
}
