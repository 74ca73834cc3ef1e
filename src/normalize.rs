use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Folds a header or label to its comparable form: lower-case, canonically
/// decomposed, with combining marks removed.
///
/// Idempotent, so already-normalized headers pass through unchanged.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}
