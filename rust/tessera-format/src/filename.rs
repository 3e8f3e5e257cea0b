//! Derivation of artifact file names from segment identity.

/// `<segment>.<ext>`
pub fn file_name(segment: &str, ext: &str) -> String {
    format!("{segment}.{ext}")
}

/// `<segment>.<version>.<ext>`
pub fn versioned_file_name(segment: &str, version: u64, ext: &str) -> String {
    format!("{segment}.{version}.{ext}")
}

/// `<prefix><generation>`
pub fn generation_file_name(prefix: &str, generation: u64) -> String {
    format!("{prefix}{generation}")
}

/// Parses the generation out of `<prefix><generation>`.
pub fn parse_generation(name: &str, prefix: &str) -> Option<u64> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
