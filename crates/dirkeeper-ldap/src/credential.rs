//! Initial password derivation.
//!
//! The initial password is a fixed rearrangement of the identifier with a
//! constant suffix. It is fully determined by public name data and must be
//! changed by the user at first login.

const SUFFIX: &str = "*987";
const SHORT_SUFFIX: &str = "$*987";
const TINY_SUFFIX: &str = "x4$*987";
const SHORT_FILLER: &str = "x3";

fn slice(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    chars[start..end].iter().collect()
}

/// Whether a single name counts as short.
pub fn is_short_name(name: &str) -> bool {
    name.trim().chars().count() <= 3
}

/// Whether a name is short enough to require the short-name variant.
pub fn needs_short_variant(given_name: &str, surname: &str) -> bool {
    is_short_name(given_name) || is_short_name(surname)
}

/// Derive the initial password for an identifier.
///
/// `short_name` selects the variant used when the given name or surname
/// has three characters or fewer.
pub fn derive_password(identifier: &str, short_name: bool) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let len = chars.len();

    if len < 5 {
        return format!("{identifier}{TINY_SUFFIX}");
    }

    let first = slice(&chars, 0, 3);
    let second = if len == 5 {
        slice(&chars, 3, len)
    } else {
        slice(&chars, 3, 6)
    };

    if short_name {
        let head: String = first.chars().take(2).collect();
        format!("{}{SHORT_SUFFIX}", format!("{second}{SHORT_FILLER}{head}").to_lowercase())
    } else {
        format!("{}{SUFFIX}", format!("{second}{first}").to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_normal() {
        assert_eq!(derive_password("JEADUP", false), "dupjea*987");
        assert_eq!(derive_password("JEADU", false), "dujea*987");
        assert_eq!(derive_password("JEADUPO", false), "dupjea*987");
    }

    #[test]
    fn test_derive_short_name() {
        assert_eq!(derive_password("JEADUP", true), "dupx3je$*987");
        assert_eq!(derive_password("ALLIX", true), "ixx3al$*987");
    }

    #[test]
    fn test_derive_tiny_identifier() {
        assert_eq!(derive_password("ALLI", false), "ALLIx4$*987");
        assert_eq!(derive_password("ALLI", true), "ALLIx4$*987");
    }

    #[test]
    fn test_variants_differ_from_five_chars() {
        for id in ["JEADU", "JEADUP", "MARROY", "ABCDEFGH"] {
            assert_ne!(derive_password(id, true), derive_password(id, false));
        }
    }

    #[test]
    fn test_output_is_lowercase_before_suffix() {
        let password = derive_password("JEADUP", false);
        let body = password.trim_end_matches(SUFFIX);
        assert_eq!(body, body.to_lowercase());
    }

    #[test]
    fn test_needs_short_variant() {
        assert!(needs_short_variant("Al", "Dupont"));
        assert!(needs_short_variant("Jean", "Li"));
        assert!(needs_short_variant("Jean", "Roy"));
        assert!(!needs_short_variant("Jean", "Dupont"));
    }
}
