#[cfg(test)]
mod tests {
    use dtspec::identifier::{AttributeSpec, CaseId, IdentifierMap, IdentifierRef, IdentifierRegistry};
    use dtspec::source::{ColumnValue, ColumnValues, Source, SourceError};
    use dtspec::table::Table;
    use std::collections::HashSet;

    fn registry() -> IdentifierRegistry {
        let mut registry = IdentifierRegistry::new(Some(42));
        registry
            .register("student", &[AttributeSpec::new("id", "unique_integer")])
            .unwrap();
        registry
            .register("school", &[AttributeSpec::new("id", "unique_string").with_arg("prefix", "SCH")])
            .unwrap();
        registry
    }

    fn students() -> Source {
        Source::new("raw_students").with_identifier_map(
            IdentifierMap::new()
                .with("id", IdentifierRef::new("student", "id"))
                .with("school_id", IdentifierRef::new("school", "id")),
        )
    }

    fn fragment() -> Table {
        "
        | id   | school_id | name   |
        | -    | -         | -      |
        | stu1 | sch1      | Buffy  |
        | stu2 | sch1      | Willow |
        | stu3 | sch2      | Xander |
        "
        .parse()
        .unwrap()
    }

    #[test]
    fn test_stacking_accumulates_rows_for_every_case() {
        let mut registry = registry();
        let mut source = students();
        let cases: Vec<CaseId> = (1..=4).map(|i| CaseId::new(format!("C{}", i))).collect();

        for case in &cases {
            source.stack(&mut registry, case, &fragment(), None).unwrap();
        }

        let data = source.data();
        assert_eq!(data.len(), 12);

        let ids: HashSet<_> = data.column("id").unwrap().into_iter().cloned().collect();
        assert_eq!(ids.len(), 12);

        for case in &cases {
            let expected = registry
                .value(&IdentifierRef::new("student", "id"), case, Some("stu1"))
                .unwrap();
            assert!(ids.contains(&expected));
        }
    }

    #[test]
    fn test_shared_named_ids_translate_consistently_within_a_case() {
        let mut registry = registry();
        let mut source = students();
        source
            .stack(&mut registry, &CaseId::new("C1"), &fragment(), None)
            .unwrap();

        let schools = source.data().column("school_id").unwrap();
        assert_eq!(schools[0], schools[1]);
        assert_ne!(schools[0], schools[2]);
        assert!(schools[0].as_deref().unwrap().starts_with("SCH"));
        assert_eq!(
            source.data().cell(0, "name"),
            Some(&Some("Buffy".to_string()))
        );
    }

    #[test]
    fn test_serialize_exports_concrete_values() {
        let mut registry = registry();
        let mut source = students();
        let case = CaseId::new("C1");
        source.stack(&mut registry, &case, &fragment(), None).unwrap();

        let records = source.serialize();
        assert_eq!(records.len(), 3);
        let id = registry
            .value(&IdentifierRef::new("student", "id"), &case, Some("stu2"))
            .unwrap()
            .unwrap();
        assert_eq!(records[1]["id"], serde_json::Value::String(id));
        assert_eq!(records[1]["name"], "Willow");
    }

    #[test]
    fn test_static_source_converges_on_identical_fragments() {
        let mut registry = registry();
        let mut source = Source::new("houses");
        let houses: Table = "| house |\n| - |\n| Summers |\n| Rosenberg |".parse().unwrap();

        source.stack(&mut registry, &CaseId::new("C1"), &houses, None).unwrap();
        source.stack(&mut registry, &CaseId::new("C2"), &houses, None).unwrap();

        assert!(source.is_static());
        assert_eq!(source.data().len(), 2);
    }

    #[test]
    fn test_static_source_rejects_different_fragments() {
        let mut registry = registry();
        let mut source = Source::new("houses");
        let first: Table = "| house |\n| - |\n| Summers |".parse().unwrap();
        let second: Table = "| house |\n| - |\n| Harris |".parse().unwrap();

        source.stack(&mut registry, &CaseId::new("C1"), &first, None).unwrap();
        let err = source
            .stack(&mut registry, &CaseId::new("C2"), &second, None)
            .unwrap_err();

        assert!(matches!(err, SourceError::CannotStackStaticSource { .. }));
        let message = err.to_string();
        assert!(message.contains("houses"));
        assert!(message.contains("Harris"));
        assert_eq!(source.data().cell(0, "house"), Some(&Some("Summers".to_string())));
    }

    #[test]
    fn test_identifier_default_for_mapped_column_is_fresh_per_row() {
        let mut registry = registry();
        let mut source = students().with_defaults(
            ColumnValues::new()
                .with("school_id", ColumnValue::Identifier(IdentifierRef::new("school", "id")))
                .with("active", ColumnValue::literal("true")),
        );
        let fragment: Table = "| id | name |\n| - | - |\n| stu1 | Buffy |\n| stu2 | Willow |"
            .parse()
            .unwrap();

        source
            .stack(&mut registry, &CaseId::new("C1"), &fragment, None)
            .unwrap();

        let schools = source.data().column("school_id").unwrap();
        assert!(schools.iter().all(|s| s.as_deref().is_some_and(|s| s.starts_with("SCH"))));
        assert_ne!(schools[0], schools[1]);
        assert_eq!(source.data().cell(1, "active"), Some(&Some("true".to_string())));
    }

    #[test]
    fn test_embedded_identifiers_resolve_in_free_text() {
        let mut registry = registry();
        let mut source = students();
        let case = CaseId::new("C1");
        let fragment: Table = "
            | id   | school_id | note                         |
            | -    | -         | -                            |
            | stu1 | sch1      | friend of {student.id[stu2]} |
            "
        .parse()
        .unwrap();

        source.stack(&mut registry, &case, &fragment, None).unwrap();

        let friend = registry
            .value(&IdentifierRef::new("student", "id"), &case, Some("stu2"))
            .unwrap()
            .unwrap();
        assert_eq!(
            source.data().cell(0, "note"),
            Some(&Some(format!("friend of {}", friend)))
        );
    }
}
