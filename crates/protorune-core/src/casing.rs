//! Field-name spellings.
//!
//! Output uses one spelling chosen by [`Casing`]; input accepts any of the
//! spellings produced here.

/// Key spelling used when printing JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Casing {
    /// `lowerCamelCase`, or the field's explicit JSON name
    #[default]
    Camel,
    /// The declared field name, normally `snake_case`
    Snake,
    /// `UpperCamelCase`
    Pascal,
}

impl Casing {
    /// Spell a declared field name in this casing.
    pub fn apply(&self, name: &str, json_name: &str) -> String {
        match self {
            Casing::Camel => json_name.to_string(),
            Casing::Snake => name.to_string(),
            Casing::Pascal => to_upper_camel_case(name),
        }
    }
}

/// Convert a snake_case name to lowerCamelCase
pub fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert a snake_case name to UpperCamelCase
pub fn to_upper_camel_case(s: &str) -> String {
    let camel = to_lower_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => camel,
    }
}

/// Convert a camelCase, PascalCase or kebab-case name to snake_case
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);

    for (i, c) in s.chars().enumerate() {
        if c == '-' {
            result.push('_');
        } else if c.is_ascii_uppercase() {
            if i > 0 && !result.ends_with('_') {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert a snake_case name to kebab-case
pub fn to_kebab_case(s: &str) -> String {
    s.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("hello_world"), "helloWorld");
        assert_eq!(to_lower_camel_case("my_field_name"), "myFieldName");
        assert_eq!(to_lower_camel_case("simple"), "simple");
    }

    #[test]
    fn test_to_upper_camel_case() {
        assert_eq!(to_upper_camel_case("pascal_case"), "PascalCase");
        assert_eq!(to_upper_camel_case(""), "");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("PascalCase"), "pascal_case");
        assert_eq!(to_snake_case("camelCase"), "camel_case");
        assert_eq!(to_snake_case("kabob-case"), "kabob_case");
        assert_eq!(to_snake_case("snake_case"), "snake_case");
    }

    #[test]
    fn test_casing_apply() {
        assert_eq!(Casing::Camel.apply("some_int", "someInt"), "someInt");
        assert_eq!(Casing::Snake.apply("some_int", "someInt"), "some_int");
        assert_eq!(Casing::Pascal.apply("some_int", "someInt"), "SomeInt");
    }
}
