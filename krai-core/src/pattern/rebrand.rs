//! Known manufacturer rebrands, surfaced as hints on
//! [`crate::error::Error::ManufacturerPatternNotFound`] so an operator
//! creating a new pattern set knows which existing set to copy from
//! (spec §4.1, scenario S2: "UTAX" should hint at "Kyocera").
//!
//! This is a small, hand-maintained list, not a learned mapping — the
//! engine does not attempt online learning of extraction patterns
//! (spec §1 Non-goals).

const REBRANDS: &[(&str, &str)] = &[
    ("utax", "kyocera"),
    ("triumph-adler", "kyocera"),
    ("triumph adler", "kyocera"),
    ("olivetti", "kyocera"),
    ("develop", "konica_minolta"),
    ("ineo", "konica_minolta"),
    ("nashuatec", "ricoh"),
    ("rex-rotary", "ricoh"),
    ("gestetner", "ricoh"),
    ("lanier", "ricoh"),
    ("savin", "ricoh"),
    ("infotec", "ricoh"),
];

/// Rebrand hints for a manufacturer key that has no registered patterns.
/// Matches case-insensitively against the well-known rebrand's own name;
/// returns readable `"X -> Y"` strings for direct inclusion in the
/// rendered error message.
#[must_use]
pub fn rebrand_hints(manufacturer_key: &str) -> Vec<String> {
    let needle = manufacturer_key.trim().to_lowercase();
    REBRANDS
        .iter()
        .filter(|(from, _)| *from == needle)
        .map(|(from, to)| format!("{from} -> {to}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utax_hints_kyocera() {
        let hints = rebrand_hints("UTAX");
        assert_eq!(hints, vec!["utax -> kyocera".to_string()]);
    }

    #[test]
    fn unknown_manufacturer_has_no_hints() {
        assert!(rebrand_hints("acme-corp").is_empty());
    }
}
