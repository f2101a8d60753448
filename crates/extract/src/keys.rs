/// Case- and whitespace-insensitive key: trims, collapses inner whitespace,
/// lowercases.
pub fn normalize_label(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lowercase slug with runs of non-alphanumeric characters folded into a
/// single `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Breast   Cancer "), "breast cancer");
        assert_eq!(normalize_label("BRCA1"), "brca1");
        assert_eq!(normalize_label("   "), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Alice Smith"), "alice_smith");
        assert_eq!(slugify("  Acme, Inc.  "), "acme_inc");
        assert_eq!(slugify("alice_smith"), "alice_smith");
        assert_eq!(slugify("Hololive-EN"), "hololive_en");
        assert_eq!(slugify("!!!"), "");
    }
}
