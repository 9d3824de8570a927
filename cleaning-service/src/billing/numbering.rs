//! Invoice revision numbering.

/// Derive the revision number for a regenerated invoice from the number
/// of the invoice it supersedes.
///
/// The chain stays tied to the original, canonical identifier: an
/// existing `-R<N>` suffix is incremented, otherwise `-R1` is appended.
pub fn revision_number(old_number: &str) -> String {
    if let Some(idx) = old_number.rfind("-R") {
        let (head, tail) = old_number.split_at(idx);
        if let Ok(revision) = tail[2..].parse::<u32>() {
            return format!("{}-R{}", head, revision + 1);
        }
    }
    format!("{}-R1", old_number)
}

#[cfg(test)]
mod tests {
    use super::revision_number;

    #[test]
    fn first_regeneration_appends_r1() {
        assert_eq!(revision_number("INV-001"), "INV-001-R1");
    }

    #[test]
    fn subsequent_regenerations_increment_the_suffix() {
        assert_eq!(revision_number("INV-001-R1"), "INV-001-R2");
        assert_eq!(revision_number("INV-001-R9"), "INV-001-R10");
    }

    #[test]
    fn non_numeric_suffix_is_not_mistaken_for_a_revision() {
        assert_eq!(revision_number("INV-RUSH"), "INV-RUSH-R1");
    }
}
