#[cfg(test)]
mod tests {
    use dtspec::identifier::{
        AttributeSpec, CaseId, IdentifierError, IdentifierRef, IdentifierRegistry,
    };
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn registry(seed: u64) -> IdentifierRegistry {
        let mut registry = IdentifierRegistry::new(Some(seed));
        registry
            .register(
                "student",
                &[
                    AttributeSpec::new("id", "unique_integer"),
                    AttributeSpec::new("uuid", "uuid"),
                    AttributeSpec::new("external_id", "unique_string").with_arg("prefix", "S"),
                ],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_generate_is_idempotent() {
        let mut registry = registry(1);
        let student = registry.get_mut("student").unwrap();
        let case = CaseId::new("C1");

        let first = student.generate(&case, Some("s1")).cloned().unwrap();
        let second = student.generate(&case, Some("s1")).cloned().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first["external_id"].starts_with('S'));
    }

    #[test]
    fn test_same_named_id_differs_between_cases() {
        let mut registry = registry(2);
        let reference = IdentifierRef::new("student", "id");
        let c1 = registry.value(&reference, &CaseId::new("C1"), Some("s1")).unwrap();
        let c2 = registry.value(&reference, &CaseId::new("C2"), Some("s1")).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_find_round_trip() {
        let mut registry = registry(3);
        let reference = IdentifierRef::new("student", "uuid");
        let case = CaseId::new("C1");
        let value = registry.value(&reference, &case, Some("s1")).unwrap().unwrap();

        let owner = registry.find(&reference, &value).unwrap();
        assert_eq!(owner.named_id, "s1");
        assert_eq!(owner.case, case);
    }

    #[test]
    fn test_find_unknown_value() {
        let registry = registry(4);
        let err = registry
            .find(&IdentifierRef::new("student", "id"), "482913")
            .unwrap_err();
        assert!(matches!(err, IdentifierError::NotFound { .. }));
        let message = err.to_string();
        assert!(message.contains("student"));
        assert!(message.contains("482913"));
    }

    #[test]
    fn test_ten_thousand_values_are_unique() {
        let mut registry = registry(5);
        let student = registry.get_mut("student").unwrap();
        let mut ids = HashSet::new();
        let mut uuids = HashSet::new();

        for case in 0..100 {
            let case = CaseId::new(format!("case {}", case));
            for named in 0..100 {
                let values = student
                    .generate(&case, Some(format!("s{}", named).as_str()))
                    .cloned()
                    .unwrap();
                assert!(ids.insert(values["id"].clone()));
                assert!(uuids.insert(values["uuid"].clone()));
            }
        }
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_unknown_generator_at_registration() {
        let mut registry = IdentifierRegistry::new(None);
        let err = registry
            .register("school", &[AttributeSpec::new("id", "sequential")])
            .unwrap_err();
        assert!(matches!(err, IdentifierError::UnknownGenerator { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_distinct_pairs_get_distinct_values(
            seed in any::<u64>(),
            pairs in prop::collection::hash_set((0u8..8, "[a-z]{1,3}"), 1..200),
        ) {
            let mut registry = registry(seed);
            let student = registry.get_mut("student").unwrap();
            let mut seen = HashSet::new();
            for (case, named) in &pairs {
                let case = CaseId::new(format!("C{}", case));
                let values = student.generate(&case, Some(named.as_str())).cloned().unwrap();
                prop_assert!(seen.insert(values["id"].clone()));
            }
        }

        #[test]
        fn prop_generate_then_find_returns_owner(
            seed in any::<u64>(),
            named in "[a-z][a-z0-9]{0,5}",
            case in "[A-Z][a-z]{0,5}",
        ) {
            let mut registry = registry(seed);
            let case = CaseId::new(case);
            let reference = IdentifierRef::new("student", "external_id");
            let value = registry.value(&reference, &case, Some(named.as_str())).unwrap().unwrap();
            let again = registry.value(&reference, &case, Some(named.as_str())).unwrap().unwrap();
            prop_assert_eq!(&value, &again);

            let owner = registry.find(&reference, &value).unwrap();
            prop_assert_eq!(&owner.named_id, &named);
            prop_assert_eq!(&owner.case, &case);
        }
    }
}
