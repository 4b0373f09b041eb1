//! Composite region codes ("DZ-07") used by checkout forms.

/// Build the composite code for a region: prefix, dash, id padded to two digits.
pub fn region_code(prefix: &str, id: u32) -> String {
    format!("{}-{:02}", prefix, id)
}

/// Parse a region identifier: either a composite code ("DZ-07") or a bare
/// number ("07"). Returns None for anything that does not yield a positive id.
pub fn parse_identifier(raw: &str) -> Option<u32> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let numeric = match value.as_bytes() {
        [a, b, b'-', ..] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => &value[3..],
        _ => value,
    };

    let digits = numeric.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    u32::try_from(super::normalizer::leading_int(digits))
        .ok()
        .filter(|&id| id > 0)
}
