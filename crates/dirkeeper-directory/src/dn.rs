//! Distinguished name helpers.
//!
//! DNs are handled as strings. Components are split on unescaped commas and
//! compared case-insensitively with surrounding whitespace ignored.

/// Split a DN into its RDN components, honouring backslash escapes.
pub fn components(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in dn.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(dn[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = dn[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// The leading RDN, e.g. `cn=JEADUP` for `cn=JEADUP,ou=users,o=org`.
pub fn rdn(dn: &str) -> &str {
    components(dn).first().copied().unwrap_or("")
}

/// The value of the leading RDN, e.g. `JEADUP`.
pub fn rdn_value(dn: &str) -> &str {
    let rdn = rdn(dn);
    rdn.split_once('=').map(|(_, v)| v.trim()).unwrap_or(rdn)
}

/// The parent DN, or `None` for a single-component DN.
pub fn parent(dn: &str) -> Option<String> {
    let parts = components(dn);
    if parts.len() < 2 {
        return None;
    }
    Some(parts[1..].join(","))
}

/// Build a DN from an RDN and a parent DN.
pub fn join(rdn: &str, parent: &str) -> String {
    if parent.is_empty() {
        rdn.to_string()
    } else {
        format!("{rdn},{parent}")
    }
}

/// Canonical form used for comparisons.
pub fn normalize(dn: &str) -> String {
    components(dn)
        .iter()
        .map(|c| match c.split_once('=') {
            Some((attr, value)) => format!(
                "{}={}",
                attr.trim().to_lowercase(),
                value.trim().to_lowercase()
            ),
            None => c.to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Check if two DNs name the same entry.
pub fn same(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Check if `dn` sits strictly below `base`.
pub fn is_descendant_of(dn: &str, base: &str) -> bool {
    let dn = normalize(dn);
    let base = normalize(base);
    if base.is_empty() {
        return !dn.is_empty();
    }
    dn.len() > base.len() && dn.ends_with(&format!(",{base}"))
}

/// Check if `dn` is `base` or sits below it.
pub fn is_within(dn: &str, base: &str) -> bool {
    same(dn, base) || is_descendant_of(dn, base)
}

/// Escape special characters in DN attribute values (RFC 4514).
///
/// Characters that must be escaped:
/// - Leading or trailing SPACE (escaped as \20)
/// - Leading # (escaped as \23)
/// - Characters: , + " \ < > ; = (escaped with backslash prefix)
/// - NUL character (escaped as \00)
pub fn escape_dn_value(value: &str) -> String {
    let count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}

/// Reverse RFC 4514 escaping: `\,` style pairs and `\2C` style hex pairs.
pub fn unescape_dn_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
            .and_then(|pair| std::str::from_utf8(pair).ok())
            .and_then(|pair| u8::from_str_radix(pair, 16).ok());
        match hex {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i + 1]);
                i += 2;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_and_rdn() {
        let dn = "cn=JEADUP, ou=users,o=org";
        assert_eq!(components(dn), vec!["cn=JEADUP", "ou=users", "o=org"]);
        assert_eq!(rdn(dn), "cn=JEADUP");
        assert_eq!(rdn_value(dn), "JEADUP");
        assert_eq!(parent(dn).as_deref(), Some("ou=users,o=org"));
        assert_eq!(parent("o=org"), None);
    }

    #[test]
    fn test_components_with_escaped_comma() {
        let dn = "cn=Dupont\\, Jean,ou=users,o=org";
        assert_eq!(rdn(dn), "cn=Dupont\\, Jean");
        assert_eq!(parent(dn).as_deref(), Some("ou=users,o=org"));
    }

    #[test]
    fn test_descendant_checks() {
        assert!(is_descendant_of("cn=a,ou=Users,o=Org", "ou=users, o=org"));
        assert!(!is_descendant_of("ou=users,o=org", "ou=users,o=org"));
        assert!(is_within("ou=users,o=org", "OU=Users,O=Org"));
        assert!(!is_descendant_of("cn=a,ou=xusers,o=org", "ou=users,o=org"));
        assert!(!is_descendant_of("cn=a,ou=inactive,o=org", "ou=users,o=org"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("cn=a", "ou=users,o=org"), "cn=a,ou=users,o=org");
        assert_eq!(join("o=org", ""), "o=org");
    }

    #[test]
    fn test_unescape_dn_value() {
        assert_eq!(unescape_dn_value("JEADUP"), "JEADUP");
        assert_eq!(unescape_dn_value("a\\,b"), "a,b");
        assert_eq!(unescape_dn_value("\\20lead"), " lead");
        assert_eq!(unescape_dn_value("JEADU\\50"), "JEADUP");
        assert_eq!(unescape_dn_value("H\\C3\\A9L"), "HéL");
        for raw in ["a,b", " lead", "#tag", "x+y=z", "+5", "back\\slash"] {
            assert_eq!(unescape_dn_value(&escape_dn_value(raw)), raw);
        }
    }

    #[test]
    fn test_escape_dn_value() {
        assert_eq!(escape_dn_value("JEADUP"), "JEADUP");
        assert_eq!(escape_dn_value("a,b"), "a\\,b");
        assert_eq!(escape_dn_value(" lead"), "\\20lead");
        assert_eq!(escape_dn_value("trail "), "trail\\20");
        assert_eq!(escape_dn_value("#hash"), "\\23hash");
        assert_eq!(
            escape_dn_value("admin,dc=evil"),
            "admin\\,dc\\=evil"
        );
        assert_eq!(escape_dn_value(""), "");
    }

    #[test]
    fn test_escape_dn_value_multibyte_trailing_space() {
        assert_eq!(escape_dn_value("Hélène "), "Hélène\\20");
    }
}
