//! Fuzzy manufacturer-key suggestions, surfaced alongside
//! [`rebrand_hints`](super::rebrand_hints) on
//! [`crate::error::Error::ManufacturerPatternNotFound`] when an operator's
//! key is simply misspelled or miscased in a way normalization doesn't
//! catch (e.g. `"richo"` for `"ricoh"`), rather than a genuine unknown
//! manufacturer.

const MIN_SIMILARITY: f64 = 0.75;
const MAX_SUGGESTIONS: usize = 3;

/// Up to [`MAX_SUGGESTIONS`] registered keys whose Jaro-Winkler similarity
/// to `manufacturer_key` is at least [`MIN_SIMILARITY`], most similar
/// first. `registered_keys` is typically
/// [`super::PatternRegistry::list_manufacturers`]'s output.
#[must_use]
pub fn fuzzy_suggestions(manufacturer_key: &str, registered_keys: &std::collections::HashSet<String>) -> Vec<String> {
    let needle = manufacturer_key.trim().to_lowercase();
    let mut scored: Vec<(f64, &str)> = registered_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(&needle, key), key.as_str()))
        .filter(|(score, _)| *score >= MIN_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(MAX_SUGGESTIONS).map(|(_, key)| key.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn keys(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn misspelled_key_suggests_the_close_match() {
        let registered = keys(&["ricoh", "kyocera", "konica_minolta"]);
        let suggestions = fuzzy_suggestions("richo", &registered);
        assert_eq!(suggestions, vec!["ricoh".to_string()]);
    }

    #[test]
    fn unrelated_key_suggests_nothing() {
        let registered = keys(&["ricoh", "kyocera", "konica_minolta"]);
        assert!(fuzzy_suggestions("acme-corp", &registered).is_empty());
    }

    #[test]
    fn suggestions_are_capped_and_ordered() {
        let registered = keys(&["sharp", "sharpx", "sharpy", "sharpz"]);
        let suggestions = fuzzy_suggestions("sharp", &registered);
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        assert_eq!(suggestions[0], "sharp");
    }
}
