//! Sender extraction from `From` headers.

/// Returns the value of the first header called `name` in a raw header block.
///
/// Folded continuation lines are joined onto the header they continue.
#[must_use]
pub fn header_value(headers: &str, name: &str) -> Option<String> {
    let mut lines = headers.lines();
    while let Some(line) = lines.next() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        if line.starts_with([' ', '\t']) || !field.trim().eq_ignore_ascii_case(name) {
            continue;
        }

        let mut value = value.trim().to_string();
        for continuation in lines.by_ref() {
            if !continuation.starts_with([' ', '\t']) {
                break;
            }
            value.push(' ');
            value.push_str(continuation.trim());
        }
        return Some(value);
    }
    None
}

/// Reduces a `From` value to a bare address.
///
/// `Jane Doe <jane@example.com>` becomes `jane@example.com`. A value without a
/// complete `<...>` suffix is returned verbatim.
#[must_use]
pub fn address_from_header(value: &str) -> String {
    let value = value.trim();
    value
        .find('<')
        .and_then(|start| value[start + 1..].strip_suffix('>'))
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .unwrap_or(value)
        .to_string()
}

/// Sorts senders for display, ignoring case.
#[must_use]
pub fn sorted_for_display<'a, I>(senders: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut sorted: Vec<String> = senders.into_iter().cloned().collect();
    sorted.sort_by_cached_key(|sender| (sender.to_lowercase(), sender.clone()));
    sorted
}
