// SPDX-License-Identifier: MIT OR Apache-2.0
//! Localizable text and its string form.
//!
//! Keyed text is written as `NSLOCTEXT("Namespace", "Key", "Source")`, text
//! without a key as `INVTEXT("Source")`. Reading also accepts `LOCTEXT` and
//! bare literals.

/// A localizable text value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Text {
    /// Localization namespace
    pub namespace: String,
    /// Localization key
    pub key: String,
    /// Source string
    pub source: String,
    /// Whether the text is culture invariant
    pub culture_invariant: bool,
}

impl Text {
    /// Culture invariant text from a plain string
    pub fn from_string(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            culture_invariant: true,
            ..Self::default()
        }
    }

    /// Keyed, localizable text
    pub fn localized(
        namespace: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            source: source.into(),
            culture_invariant: false,
        }
    }

    /// Whether the source string is empty
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Equality used by the comparator: empty texts are always identical
    pub fn identical(&self, other: &Self) -> bool {
        if self.is_empty() && other.is_empty() {
            return true;
        }
        self.namespace == other.namespace && self.key == other.key && self.source == other.source
    }

    /// Write the text in its round-trippable string form
    pub fn to_buffer_string(&self) -> String {
        if self.key.is_empty() {
            format!("INVTEXT({})", quote(&self.source))
        } else {
            format!(
                "NSLOCTEXT({}, {}, {})",
                quote(&self.namespace),
                quote(&self.key),
                quote(&self.source)
            )
        }
    }

    /// Parse the string form; anything unrecognized becomes a literal
    pub fn parse_buffer(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(args) = macro_args(trimmed, "NSLOCTEXT") {
            if let [namespace, key, source] = args.as_slice() {
                return Self::localized(namespace.as_str(), key.as_str(), source.as_str());
            }
        }
        if let Some(args) = macro_args(trimmed, "LOCTEXT") {
            if let [key, source] = args.as_slice() {
                return Self::localized("", key.as_str(), source.as_str());
            }
        }
        if let Some(args) = macro_args(trimmed, "INVTEXT") {
            if let [source] = args.as_slice() {
                return Self::from_string(source.as_str());
            }
        }
        if let Some((literal, rest)) = read_quoted(trimmed) {
            if rest.trim().is_empty() {
                return Self::from_string(literal);
            }
        }
        Self::from_string(input)
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Read one quoted string; returns the unescaped content and the remainder
fn read_quoted(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &body[i + 1..])),
            '\\' => match chars.next()?.1 {
                'n' => out.push('\n'),
                other => out.push(other),
            },
            _ => out.push(c),
        }
    }
    None
}

/// Arguments of `NAME("a", "b", ...)`
fn macro_args(input: &str, name: &str) -> Option<Vec<String>> {
    let mut rest = input.strip_prefix(name)?.trim_start().strip_prefix('(')?;
    let mut args = Vec::new();
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix(')') {
            return after.trim().is_empty().then_some(args);
        }
        let (arg, after) = read_quoted(rest)?;
        args.push(arg);
        rest = after.trim_start();
        if let Some(after) = rest.strip_prefix(',') {
            rest = after;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_round_trip() {
        let text = Text::localized("Materials", "BaseColor", "Base \"Color\"");
        let buffer = text.to_buffer_string();
        assert_eq!(buffer, r#"NSLOCTEXT("Materials", "BaseColor", "Base \"Color\"")"#);
        assert_eq!(Text::parse_buffer(&buffer), text);
    }

    #[test]
    fn test_invariant_and_literals() {
        assert_eq!(Text::parse_buffer(r#"INVTEXT("Hello")"#), Text::from_string("Hello"));
        assert_eq!(Text::parse_buffer(r#""quoted""#), Text::from_string("quoted"));
        assert_eq!(Text::parse_buffer("plain words"), Text::from_string("plain words"));
        assert_eq!(
            Text::parse_buffer(r#"LOCTEXT("Key", "Value")"#),
            Text::localized("", "Key", "Value")
        );
    }

    #[test]
    fn test_empty_texts_identical() {
        let a = Text::localized("A", "1", "");
        let b = Text::localized("B", "2", "");
        assert!(a.identical(&b));
        assert!(!Text::from_string("x").identical(&Text::from_string("y")));
    }
}
