//! LIST response parsing.

/// One parsed LIST line: `(<flags>) "<delimiter>" <name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Raw flag list, without parentheses.
    pub flags: String,
    /// Hierarchy delimiter; `None` for `NIL`.
    pub delimiter: Option<String>,
    /// Folder name with outer quoting removed.
    pub name: String,
}

impl Listing {
    /// Parses a LIST line. Returns `None` if it does not follow the grammar.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix('(')?;
        let (flags, rest) = rest.split_once(')')?;
        let rest = rest.trim_start();

        let (delimiter, rest) = if let Some(rest) = rest.strip_prefix('"') {
            let (delimiter, rest) = split_quoted(rest)?;
            (Some(delimiter), rest)
        } else {
            (None, rest.strip_prefix("NIL")?)
        };

        let name = rest.trim();
        if name.is_empty() {
            return None;
        }
        let name = match name.strip_prefix('"') {
            Some(quoted) => split_quoted(quoted)?.0,
            None => name.to_string(),
        };

        Some(Self {
            flags: flags.to_string(),
            delimiter,
            name,
        })
    }
}

/// Reads a quoted string body up to its closing quote, unescaping `\"` and `\\`.
fn split_quoted(input: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?.1),
            '"' => return Some((value, &input[i + 1..])),
            _ => value.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_name() {
        let listing = Listing::parse(r#"(\HasNoChildren \Junk) "/" "Junk""#).unwrap();
        assert_eq!(listing.flags, r"\HasNoChildren \Junk");
        assert_eq!(listing.delimiter.as_deref(), Some("/"));
        assert_eq!(listing.name, "Junk");
    }

    #[test]
    fn test_parse_atom_name_and_nil_delimiter() {
        let listing = Listing::parse(r"() NIL INBOX").unwrap();
        assert_eq!(listing.delimiter, None);
        assert_eq!(listing.name, "INBOX");
    }

    #[test]
    fn test_parse_escaped_delimiter() {
        let listing = Listing::parse(r#"(\HasChildren) "\\" "[Gmail]\\Spam""#).unwrap();
        assert_eq!(listing.delimiter.as_deref(), Some("\\"));
        assert_eq!(listing.name, r"[Gmail]\Spam");
    }

    #[test]
    fn test_parse_name_with_spaces() {
        let listing = Listing::parse(r#"(\HasNoChildren) "." "Old Junk""#).unwrap();
        assert_eq!(listing.name, "Old Junk");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Listing::parse("INBOX").is_none());
        assert!(Listing::parse(r#"(\Noselect) "/""#).is_none());
        assert!(Listing::parse(r#"(\Noselect) "/" "unterminated"#).is_none());
    }
}
