//! Identifier casing helpers shared by language profiles and templates.

use convert_case::{Case, Casing};

/// Convert a string to snake_case
pub fn to_snake_case(s: &str) -> String {
    s.to_case(Case::Snake)
}

/// Convert a string to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.to_case(Case::Pascal)
}

/// Convert a string to camelCase
pub fn to_camel_case(s: &str) -> String {
    s.to_case(Case::Camel)
}

/// Lower-case the first character, leaving the rest untouched
pub fn untitle(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// True if `s` is already lower snake case (`a-z`, `0-9`, `_`)
pub fn is_lower_snake(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "gen", "macro", "override",
    "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Prefix Rust keywords with `r#` so they can be used as identifiers
pub fn escape_rust_keyword(ident: &str) -> String {
    match ident {
        // These cannot be raw identifiers
        "self" | "Self" | "super" | "crate" => format!("{}_", ident),
        _ if RUST_KEYWORDS.contains(&ident) => format!("r#{}", ident),
        _ => ident.to_string(),
    }
}

/// Escape a string for use in Rust string literals
pub fn escape_rust_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_snake_case("HelloWorld"), "hello_world");
        assert_eq!(to_pascal_case("hello_world"), "HelloWorld");
        assert_eq!(to_pascal_case("create_at"), "CreateAt");
        assert_eq!(to_camel_case("hello_world"), "helloWorld");
        assert_eq!(untitle("UserName"), "userName");
        assert_eq!(untitle(""), "");
    }

    #[test]
    fn test_is_lower_snake() {
        assert!(is_lower_snake("address2"));
        assert!(is_lower_snake("user_id"));
        assert!(!is_lower_snake("userId"));
        assert!(!is_lower_snake(""));
    }

    #[test]
    fn test_escape_rust_keyword() {
        assert_eq!(escape_rust_keyword("type"), "r#type");
        assert_eq!(escape_rust_keyword("self"), "self_");
        assert_eq!(escape_rust_keyword("name"), "name");
    }

    #[test]
    fn test_escape_rust_string() {
        assert_eq!(escape_rust_string("hello\nworld"), "hello\\nworld");
        assert_eq!(escape_rust_string("say \"hello\""), "say \\\"hello\\\"");
    }
}
