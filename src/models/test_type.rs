/// Test types offered as suggestions by the entry form.
pub const SUGGESTED_TEST_TYPES: &[&str] = &[
    "Blood Test",
    "Complete Blood Count (CBC)",
    "Metabolic Panel",
    "Lipid Panel",
    "Thyroid Function",
    "X-Ray",
    "MRI Scan",
    "CT Scan",
    "PET Scan",
    "Ultrasound",
    "ECG/EKG",
    "Endoscopy",
    "Colonoscopy",
    "Biopsy",
    "Urinalysis",
    "Genetic Testing",
    "Allergy Testing",
    "Pathology",
    "Stress Test",
    "Mammogram",
    OTHER_TEST_TYPE,
];

/// Placeholder selection whose real value is supplied as a custom type.
pub const OTHER_TEST_TYPE: &str = "Other";

/// Resolve the stored test type from a selection and an optional custom value.
///
/// Returns `None` when "Other" is selected without a usable custom value.
pub fn resolve_test_type(selected: &str, custom: Option<&str>) -> Option<String> {
    if selected != OTHER_TEST_TYPE {
        return Some(selected.to_string());
    }
    custom
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_end_with_other() {
        assert_eq!(SUGGESTED_TEST_TYPES.first(), Some(&"Blood Test"));
        assert_eq!(SUGGESTED_TEST_TYPES.last(), Some(&OTHER_TEST_TYPE));
        assert_eq!(SUGGESTED_TEST_TYPES.len(), 21);
    }

    #[test]
    fn regular_selection_is_kept() {
        assert_eq!(
            resolve_test_type("MRI Scan", Some("ignored")),
            Some("MRI Scan".into())
        );
    }

    #[test]
    fn other_maps_to_custom_value() {
        assert_eq!(
            resolve_test_type("Other", Some("  Sweat chloride ")),
            Some("Sweat chloride".into())
        );
        assert_eq!(resolve_test_type("Other", Some("   ")), None);
        assert_eq!(resolve_test_type("Other", None), None);
    }
}
