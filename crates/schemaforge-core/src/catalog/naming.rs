//! Name derivation helpers shared by the catalog and the resolver.

use convert_case::{Case, Casing};

/// Lower-case the first character.
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-case the first character.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// UpperCamel form of a snake, kebab or space separated identifier.
///
/// Identifiers that are already camel-cased keep their inner capitals.
pub fn upper_camel(s: &str) -> String {
    if s.contains(['_', '-', ' ']) {
        s.to_case(Case::UpperCamel)
    } else {
        upper_first(s)
    }
}

/// lowerCamel form of a relationship token such as `OWNS` or `HAS_ITEM`.
pub fn lower_camel_token(token: &str) -> String {
    token.to_lowercase().to_case(Case::Camel)
}

/// English plural of a single word.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();

    if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// English singular of a single word.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();

    if lower.len() > 3 && lower.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if ["ses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|s| lower.ends_with(s))
        && !lower.ends_with("sses")
    {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with("sses") {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") && lower.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn ends_with_vowel_y(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    bytes.len() >= 2 && matches!(bytes[bytes.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("order"), "orders");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("orders"), "order");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("class"), "class");
        assert_eq!(singularize("order"), "order");
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(lower_first("Customer"), "customer");
        assert_eq!(upper_first("orders"), "Orders");
        assert_eq!(upper_camel("order_item"), "OrderItem");
        assert_eq!(upper_camel("orderItem"), "OrderItem");
        assert_eq!(lower_camel_token("OWNS"), "owns");
        assert_eq!(lower_camel_token("HAS_ITEM"), "hasItem");
    }
}
