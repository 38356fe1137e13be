/// Derive a filesystem-safe slug from a human-readable label.
///
/// Lower-cases the label and collapses every run of non-alphanumeric
/// characters into a single hyphen. May return an empty string for labels
/// with no alphanumeric content; callers treat that as an invalid slug.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_hyphen = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("PDF Generator"), "pdf-generator");
        assert_eq!(slugify("Writer"), "writer");
    }

    #[test]
    fn collapses_symbol_runs() {
        assert_eq!(slugify("Data -> Sheet!"), "data-sheet");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
    }

    #[test]
    fn empty_for_symbol_only_labels() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }
}
