#[cfg(test)]
mod tests {
    use dtspec::factory::{Factory, FactoryData, FactoryError};
    use dtspec::identifier::{AttributeSpec, CaseId, IdentifierMap, IdentifierRef, IdentifierRegistry};
    use dtspec::source::{ColumnValue, ColumnValues, Source};
    use std::collections::BTreeMap;

    const STUDENTS: &str = "
        | id   | name   |
        | -    | -      |
        | stu1 | Buffy  |
        | stu2 | Willow |
    ";

    const SCHOOLS: &str = "
        | id   | name      |
        | -    | -         |
        | sch1 | Sunnydale |
    ";

    fn registry() -> IdentifierRegistry {
        let mut registry = IdentifierRegistry::new(Some(9));
        registry
            .register("student", &[AttributeSpec::new("id", "unique_integer")])
            .unwrap();
        registry
            .register("school", &[AttributeSpec::new("id", "unique_integer")])
            .unwrap();
        registry
    }

    fn sources() -> BTreeMap<String, Source> {
        let students = Source::new("students")
            .with_identifier_map(IdentifierMap::new().with("id", IdentifierRef::new("student", "id")))
            .with_defaults(ColumnValues::new().with("grade", ColumnValue::literal("9")));
        let schools = Source::new("schools")
            .with_identifier_map(IdentifierMap::new().with("id", IdentifierRef::new("school", "id")));
        BTreeMap::from([
            ("students".to_string(), students),
            ("schools".to_string(), schools),
        ])
    }

    fn literal(column: &str, value: &str) -> ColumnValues {
        ColumnValues::new().with(column, ColumnValue::literal(value))
    }

    #[test]
    fn test_generate_stacks_every_source() {
        let mut registry = registry();
        let mut sources = sources();
        let factory = Factory::from_tables(
            "SomeStudents",
            [
                ("students", Some(STUDENTS), ColumnValues::new()),
                ("schools", Some(SCHOOLS), ColumnValues::new()),
            ],
        )
        .unwrap();

        factory
            .generate(&mut registry, &CaseId::new("C1"), &mut sources)
            .unwrap();

        assert_eq!(sources["students"].data().len(), 2);
        assert_eq!(sources["schools"].data().len(), 1);
        assert_eq!(
            sources["students"].data().cell(0, "grade"),
            Some(&Some("9".to_string()))
        );
    }

    #[test]
    fn test_values_override_source_defaults() {
        let mut registry = registry();
        let mut sources = sources();
        let factory = Factory::from_tables(
            "Seniors",
            [("students", Some(STUDENTS), literal("grade", "12"))],
        )
        .unwrap();

        factory
            .generate(&mut registry, &CaseId::new("C1"), &mut sources)
            .unwrap();

        let grades = sources["students"].data().column("grade").unwrap();
        assert!(grades.iter().all(|g| g.as_deref() == Some("12")));
    }

    #[test]
    fn test_fragment_columns_beat_values() {
        let mut registry = registry();
        let mut sources = sources();
        let factory = Factory::from_tables(
            "Graded",
            [(
                "students",
                Some("| id | grade |\n| - | - |\n| stu1 | 10 |"),
                literal("grade", "12"),
            )],
        )
        .unwrap();

        factory
            .generate(&mut registry, &CaseId::new("C1"), &mut sources)
            .unwrap();
        assert_eq!(
            sources["students"].data().cell(0, "grade"),
            Some(&Some("10".to_string()))
        );
    }

    #[test]
    fn test_child_table_replaces_parent_table() {
        let parent = Factory::from_tables(
            "Parent",
            [
                ("students", Some(STUDENTS), literal("grade", "9")),
                ("schools", Some(SCHOOLS), ColumnValues::new()),
            ],
        )
        .unwrap();
        let own = FactoryData::from_tables(
            "Child",
            [("students", Some("| id |\n| - |\n| stu9 |"), literal("house", "Summers"))],
        )
        .unwrap();

        let child = Factory::inherit("Child", &[&parent], own);
        let students = child.data().get("students").unwrap();

        assert_eq!(students.table.as_ref().unwrap().len(), 1);
        assert!(students.values.contains("grade"));
        assert!(students.values.contains("house"));
        assert!(child.data().get("schools").is_some());
        let order: Vec<_> = child.data().sources().collect();
        assert_eq!(order, vec!["students", "schools"]);
    }

    #[test]
    fn test_later_parent_wins() {
        let first = Factory::from_tables("First", [("students", Some(STUDENTS), literal("grade", "9"))])
            .unwrap();
        let second = Factory::from_tables("Second", [("students", None, literal("grade", "11"))]).unwrap();

        let child = Factory::inherit("Child", &[&first, &second], FactoryData::new());
        let students = child.data().get("students").unwrap();

        assert_eq!(students.table, first.data().get("students").unwrap().table);
        assert_eq!(students.values.get("grade"), Some(&ColumnValue::literal("11")));
    }

    #[test]
    fn test_unknown_source() {
        let mut registry = registry();
        let mut sources = sources();
        let factory =
            Factory::from_tables("Typo", [("studnets", Some(STUDENTS), ColumnValues::new())]).unwrap();

        let err = factory
            .generate(&mut registry, &CaseId::new("C1"), &mut sources)
            .unwrap_err();
        assert!(matches!(err, FactoryError::UnknownSource { .. }));
        assert!(err.to_string().contains("studnets"));
    }

    #[test]
    fn test_source_errors_pass_through() {
        let mut registry = registry();
        let mut sources = sources();
        sources.insert("houses".to_string(), Source::new("houses"));

        let first = Factory::from_tables("A", [("houses", Some("| h |\n| - |\n| x |"), ColumnValues::new())])
            .unwrap();
        let second = Factory::from_tables("B", [("houses", Some("| h |\n| - |\n| y |"), ColumnValues::new())])
            .unwrap();

        first.generate(&mut registry, &CaseId::new("C1"), &mut sources).unwrap();
        let err = second
            .generate(&mut registry, &CaseId::new("C2"), &mut sources)
            .unwrap_err();
        assert!(matches!(err, FactoryError::Stack(_)));
        assert!(err.to_string().contains("without identifiers"));
    }
}
