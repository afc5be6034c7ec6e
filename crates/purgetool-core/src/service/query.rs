//! SEARCH and sequence-set construction.

use std::collections::HashSet;

/// Senders per SEARCH command. Servers reject very long queries.
pub const BATCH_SIZE: usize = 25;

/// Quotes a string for use in a SEARCH key.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Builds a prefix-OR query matching any of the senders.
///
/// N senders produce N-1 leading `OR` tokens followed by N `FROM "<address>"`
/// keys, e.g. `OR OR FROM "a" FROM "b" FROM "c"`.
#[must_use]
pub fn or_query<S: AsRef<str>>(senders: &[S]) -> String {
    let mut clauses: Vec<String> = vec!["OR".to_string(); senders.len().saturating_sub(1)];
    clauses.extend(
        senders
            .iter()
            .map(|sender| format!("FROM {}", quote(sender.as_ref()))),
    );
    clauses.join(" ")
}

/// Splits senders into batches of at most `size`, each rendered as one query.
#[must_use]
pub fn batched_queries<S: AsRef<str>>(senders: &[S], size: usize) -> Vec<String> {
    senders.chunks(size.max(1)).map(or_query).collect()
}

/// Renders message numbers as a comma-separated sequence set, ascending.
#[must_use]
pub fn sequence_set(ids: &HashSet<u32>) -> String {
    let mut ids: Vec<u32> = ids.iter().copied().collect();
    ids.sort_unstable();
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
