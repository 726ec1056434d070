/// Maps a free-form house or campus cell onto its canonical spelling.
///
/// Tries a case-insensitive match, then a match on alphanumerics only,
/// then a unique prefix match in either direction on the cleaned text.
/// Returns `None` when nothing matches or a prefix is ambiguous.
pub fn canonicalize<'a>(raw: &str, canonical: &'a [String]) -> Option<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(hit) = canonical
        .iter()
        .find(|value| value.trim().eq_ignore_ascii_case(trimmed))
    {
        return Some(hit.as_str());
    }

    let cleaned = clean(trimmed);
    if cleaned.is_empty() {
        return None;
    }

    if let Some(hit) = canonical.iter().find(|value| clean(value) == cleaned) {
        return Some(hit.as_str());
    }

    let mut prefix_hits = canonical.iter().filter(|value| {
        let target = clean(value);
        !target.is_empty() && (target.starts_with(&cleaned) || cleaned.starts_with(&target))
    });
    match (prefix_hits.next(), prefix_hits.next()) {
        (Some(hit), None) => Some(hit.as_str()),
        _ => None,
    }
}

/// Canonical value when one matches, otherwise the raw input unchanged.
pub fn normalize_value(raw: &str, canonical: &[String]) -> String {
    canonicalize(raw, canonical)
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

fn clean(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
