#[cfg(test)]
mod tests {
    use dtspec::expectation::{DataExpectation, ExpectationError, ExpectationOptions};
    use dtspec::factory::Factory;
    use dtspec::identifier::{AttributeSpec, CaseId, IdentifierMap, IdentifierRef, IdentifierRegistry};
    use dtspec::scenario::{Case, Scenario, ScenarioError};
    use dtspec::source::{ColumnValues, Source};
    use dtspec::target::Target;
    use std::collections::BTreeMap;

    const STUDENTS: &str = "
        | id   | name   |
        | -    | -      |
        | stu1 | Buffy  |
        | stu2 | Willow |
    ";

    fn registry() -> IdentifierRegistry {
        let mut registry = IdentifierRegistry::new(Some(31));
        registry
            .register("student", &[AttributeSpec::new("id", "unique_integer")])
            .unwrap();
        registry
    }

    fn identifier_map() -> IdentifierMap {
        IdentifierMap::new().with("id", IdentifierRef::new("student", "id"))
    }

    fn sources() -> BTreeMap<String, Source> {
        BTreeMap::from([(
            "raw_students".to_string(),
            Source::new("raw_students").with_identifier_map(identifier_map()),
        )])
    }

    fn case(scenario: &str, name: &str, expected: &str) -> Case {
        let factory = Factory::from_tables(
            format!("{} factory", name),
            [("raw_students", Some(STUDENTS), ColumnValues::new())],
        )
        .unwrap();
        let expectation =
            DataExpectation::new("student_names", expected, ExpectationOptions::default()).unwrap();
        Case::new(scenario, name, factory).with_expectation(expectation)
    }

    /// Plays the transformation: copies the stacked source rows into the target.
    fn run_transform(
        registry: &IdentifierRegistry,
        sources: &BTreeMap<String, Source>,
    ) -> BTreeMap<String, Target> {
        let mut target = Target::new("student_names").with_identifier_map(identifier_map());
        target
            .load_actual(registry, &sources["raw_students"].serialize(), None)
            .unwrap();
        BTreeMap::from([("student_names".to_string(), target)])
    }

    #[test]
    fn test_cases_generate_and_assert_independently() {
        let mut registry = registry();
        let mut sources = sources();
        let mut scenario = Scenario::new("Names");
        scenario.add_case(case("Names", "first", STUDENTS)).unwrap();
        scenario.add_case(case("Names", "second", STUDENTS)).unwrap();

        scenario.generate(&mut registry, &mut sources).unwrap();
        assert_eq!(sources["raw_students"].data().len(), 4);

        let targets = run_transform(&registry, &sources);
        for case in scenario.cases() {
            assert_eq!(targets["student_names"].case_data(case.id()).len(), 2);
            case.assert_expectations(&mut registry, &targets).unwrap();
        }
    }

    #[test]
    fn test_failing_case_reports_mismatch() {
        let mut registry = registry();
        let mut sources = sources();
        let failing = case(
            "Names",
            "wrong",
            "| id | name |\n| - | - |\n| stu1 | Buffy |\n| stu2 | Tara |",
        );
        failing.generate(&mut registry, &mut sources).unwrap();

        let targets = run_transform(&registry, &sources);
        let err = failing.assert_expectations(&mut registry, &targets).unwrap_err();
        assert!(matches!(err, ScenarioError::Expectation(ExpectationError::Assertion(_))));
        assert!(err.to_string().contains("actual Willow, expected Tara"));
    }

    #[test]
    fn test_unknown_target() {
        let mut registry = registry();
        let case = case("Names", "orphan", STUDENTS);
        let err = case
            .assert_expectations(&mut registry, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownTarget { ref case, .. } if *case == CaseId::new("Names: orphan")));
    }
}
