/// URL-safe slug from a display name: lowercase alphanumerics with single
/// hyphens, no leading/trailing hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Coffee & Tea"), "coffee-tea");
        assert_eq!(slugify("  Gift Cards  "), "gift-cards");
        assert_eq!(slugify("Déjà vu"), "d-j-vu");
        assert_eq!(slugify("---"), "");
    }
}
