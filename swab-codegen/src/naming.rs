// Name conversion utilities for codegen.

/// Convert a camelCase, PascalCase or UPPER_CASE name to snake_case.
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 8);
    let chars: Vec<char> = name.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                // "addI64" -> "add_i64", "HTTPServer" -> "http_server".
                if prev.is_ascii_lowercase() || prev.is_ascii_digit() {
                    result.push('_');
                } else if prev.is_ascii_uppercase()
                    && i + 1 < chars.len()
                    && chars[i + 1].is_ascii_lowercase()
                {
                    result.push('_');
                }
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Convert a snake_case or camelCase name to UpperCamelCase.
pub fn to_upper_camel(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            result.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    if result.is_empty() || result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, 'T');
    }
    result
}

const RESERVED_WORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
    "trait", "true", "type", "unsafe", "use", "where", "while", "async",
    "await", "dyn", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "typeof", "unsized", "virtual", "yield", "try", "gen",
];

/// Check if a name is a Rust reserved word.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Escape Rust reserved words by prepending `r#`.
pub fn escape_reserved(name: &str) -> String {
    match name {
        // Raw identifiers cannot spell these.
        "self" | "Self" | "super" | "crate" => format!("{name}_"),
        _ if is_reserved(name) => format!("r#{name}"),
        _ => name.to_string(),
    }
}

/// Rust function name for a C function or field name.
pub fn to_fn_name(name: &str) -> String {
    escape_reserved(&to_snake_case(name))
}

/// Rust enum variant name for a C enumerator.
pub fn to_variant_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    // Enumerators are conventionally SHOUTING_CASE; camel-case the words.
    let source = if name.chars().any(|c| c.is_ascii_lowercase()) {
        name
    } else {
        lower.as_str()
    };
    let camel = to_upper_camel(source);
    if camel == "Self" { "Self_".to_string() } else { camel }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("addI64"), "add_i64");
        assert_eq!(to_snake_case("make_version_info"), "make_version_info");
        assert_eq!(to_snake_case("stringStuff"), "string_stuff");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("URL"), "url");
        assert_eq!(to_snake_case("stbi_load"), "stbi_load");
    }

    #[test]
    fn test_to_upper_camel() {
        assert_eq!(to_upper_camel("version_info"), "VersionInfo");
        assert_eq!(to_upper_camel("options"), "Options");
        assert_eq!(to_upper_camel("BrotliDecoderResult"), "BrotliDecoderResult");
        assert_eq!(to_upper_camel("3d"), "T3d");
    }

    #[test]
    fn test_escape_reserved() {
        assert_eq!(escape_reserved("type"), "r#type");
        assert_eq!(escape_reserved("move"), "r#move");
        assert_eq!(escape_reserved("self"), "self_");
        assert_eq!(escape_reserved("size"), "size");
    }

    #[test]
    fn test_to_variant_name() {
        assert_eq!(to_variant_name("RED"), "Red");
        assert_eq!(to_variant_name("BROTLI_DECODER_RESULT_ERROR"), "BrotliDecoderResultError");
        assert_eq!(to_variant_name("Green"), "Green");
        assert_eq!(to_variant_name("blue_ish"), "BlueIsh");
    }

    proptest::proptest! {
        #[test]
        fn prop_fn_names_are_lowercase_and_unreserved(name in "[A-Za-z_][A-Za-z0-9_]{0,16}") {
            let ident = to_fn_name(&name);
            proptest::prop_assert!(!ident.chars().any(|c| c.is_ascii_uppercase()));
            proptest::prop_assert!(!is_reserved(&ident));
        }
    }
}
