//! Variant selection against a client preference list.

use warehouse_state::VariantRecord;

/// Parse a comma-separated `accepted_variants` value.
///
/// Entries are trimmed and empty entries dropped. Returns `None` when no
/// preference remains, which callers treat as "no preference".
pub fn parse_accepted_variants(raw: Option<&str>) -> Option<Vec<String>> {
    let preferences: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|variant| !variant.is_empty())
        .map(str::to_string)
        .collect();

    if preferences.is_empty() {
        None
    } else {
        Some(preferences)
    }
}

/// First variant of `preferences` present in `available`.
pub fn resolve_variant<'a>(
    preferences: &[String],
    available: &'a [VariantRecord],
) -> Option<&'a VariantRecord> {
    preferences
        .iter()
        .find_map(|wanted| available.iter().find(|v| &v.variant == wanted))
}

/// Narrow `available` by an optional preference list.
///
/// No preference (absent or empty) keeps every variant. A preference list
/// keeps at most its best match, or nothing when none match.
pub fn select_variants(
    preferences: Option<&[String]>,
    available: Vec<VariantRecord>,
) -> Vec<VariantRecord> {
    match preferences {
        None => available,
        Some([]) => available,
        Some(preferences) => resolve_variant(preferences, &available)
            .cloned()
            .into_iter()
            .collect(),
    }
}
