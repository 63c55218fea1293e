/// Lowercase the title and collapse every run of non-alphanumeric characters
/// into a single `-`, trimming separators at both ends.
///
/// `"Senior Rust / Go Intern (Remote)"` becomes `"senior-rust-go-intern-remote"`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("internship");
    }
    slug
}

/// The n-th candidate for a slug: the base itself first, then `base-2`, `base-3`, ...
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}
