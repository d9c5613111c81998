//! Tool version parsing.

/// Parse a version string into semver::Version, handling incomplete versions.
///
/// Handles versions like "2.4.8", "6.10.0.dev1", or versions with only major.minor parts.
pub fn parse_version_flexible(version_str: &str) -> Option<semver::Version> {
    // Remove any suffix after the first non-version character
    let trimmed = version_str.trim();
    let clean_version = trimmed
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches('.');

    if let Ok(v) = clean_version.parse() {
        return Some(v);
    }

    // Handle versions with less or more than 3 parts
    let parts: Vec<&str> = clean_version.split('.').collect();
    let major = parts.first().and_then(|s| s.parse().ok())?;
    let minor = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    Some(semver::Version::new(major, minor, patch))
}
