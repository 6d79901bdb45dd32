#[cfg(test)]
mod tests {
    use dtspec::api::{Api, ApiOptions};
    use dtspec::spec::{ActualsDocument, SpecDocument, TargetActuals};
    use dtspec::table::Record;
    use serde_json::Value;

    const SPEC: &str = r#"{
        "version": "0.1",
        "description": "Student names",
        "identifiers": [
            {"identifier": "student", "attributes": [
                {"field": "id", "generator": "unique_integer"},
                {"field": "external_id", "generator": "unique_string", "prefix": "S"}
            ]},
            {"identifier": "school", "attributes": [{"field": "id", "generator": "unique_integer"}]}
        ],
        "sources": [
            {"source": "raw_students",
             "defaults": [{"column": "clique", "value": "None"}],
             "identifier_map": [
                {"column": "id", "identifier": {"name": "student", "attribute": "id"}},
                {"column": "school_id", "identifier": {"name": "school", "attribute": "id"}}
             ]},
            {"source": "raw_schools",
             "identifier_map": [{"column": "id", "identifier": {"name": "school", "attribute": "id"}}]}
        ],
        "targets": [
            {"target": "student_schools",
             "identifier_map": [
                {"column": "student_id", "identifier": {"name": "student", "attribute": "id"}},
                {"column": "school_id", "identifier": {"name": "school", "attribute": "id"}}
             ]}
        ],
        "factories": [
            {"factory": "SomeSchools", "data": [
                {"source": "raw_schools", "table": "| id | name |\n| - | - |\n| sch1 | Sunnydale |\n| sch2 | Hogwarts |"}
            ]},
            {"factory": "SomeStudents", "parents": ["SomeSchools"], "data": [
                {"source": "raw_students", "table": "| id | school_id | name |\n| - | - | - |\n| stu1 | sch1 | Buffy |\n| stu2 | sch2 | Harry |"}
            ]}
        ],
        "scenarios": [
            {"scenario": "Schools",
             "factory": {"parents": ["SomeStudents"]},
             "cases": [
                {"case": "BasicJoin",
                 "expected": {"data": [
                    {"target": "student_schools", "table": "| student_id | school_id | school_name | name |\n| - | - | - | - |\n| stu1 | sch1 | Sunnydale | Buffy |\n| stu2 | sch2 | Hogwarts | Harry |"}
                 ]}},
                {"case": "Cliques",
                 "factory": {"data": [{"source": "raw_students", "values": [{"column": "clique", "value": "Scoobies"}]}]},
                 "expected": {"data": [
                    {"target": "student_schools",
                     "table": "| student_id | name |\n| - | - |\n| stu2 | Harry |\n| stu1 | Buffy |",
                     "values": [{"column": "clique", "value": "Scoobies"}],
                     "by": ["student_id"]}
                 ]}}
             ]}
        ]
    }"#;

    fn text(record: &Record, column: &str) -> Value {
        record.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Joins students to schools, like the transformation under test would.
    fn transform(api: &Api) -> ActualsDocument {
        let data = api.source_data();
        let schools = &data["raw_schools"];
        let records: Vec<Record> = data["raw_students"]
            .iter()
            .map(|student| {
                let school_name = schools
                    .iter()
                    .find(|school| school["id"] == student["school_id"])
                    .map(|school| text(school, "name"))
                    .unwrap_or(Value::Null);
                let mut record = Record::new();
                record.insert("student_id".to_string(), text(student, "id"));
                record.insert("school_id".to_string(), text(student, "school_id"));
                record.insert("school_name".to_string(), school_name);
                record.insert("name".to_string(), text(student, "name"));
                record.insert("clique".to_string(), text(student, "clique"));
                record
            })
            .collect();

        ActualsDocument::from([(
            "student_schools".to_string(),
            TargetActuals {
                records,
                columns: None,
            },
        )])
    }

    fn api(seed: u64) -> Api {
        let options = ApiOptions {
            seed: Some(seed),
            ..Default::default()
        };
        Api::new(SpecDocument::from_json_str(SPEC).unwrap(), options).unwrap()
    }

    #[test]
    fn test_generate_transform_assert() {
        let mut api = api(2024);
        api.generate_sources().unwrap();

        let data = api.source_data();
        assert_eq!(data["raw_students"].len(), 4);
        // Both cases stack the same schools, each with their own identities.
        assert_eq!(data["raw_schools"].len(), 4);

        let actuals = transform(&api);
        api.load_actuals(&actuals).unwrap();

        let report = api.assert_expectations();
        assert!(report.is_success(), "{}", report);
        assert_eq!(report.passed(), 2);
        assert!(report.to_string().ends_with("2 passed, 0 failed"));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let mut first = api(7);
        let mut second = api(7);
        first.generate_sources().unwrap();
        second.generate_sources().unwrap();
        assert_eq!(first.source_data(), second.source_data());
    }

    #[test]
    fn test_broken_transform_fails_only_affected_case() {
        let mut api = api(99);
        api.generate_sources().unwrap();

        let mut actuals = transform(&api);
        let records = &mut actuals.get_mut("student_schools").unwrap().records;
        for record in records.iter_mut() {
            if record["clique"] == "Scoobies" && record["name"] == "Harry" {
                record.insert("name".to_string(), Value::from("Draco"));
            }
        }
        api.load_actuals(&actuals).unwrap();

        let report = api.assert_expectations();
        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().map(|o| o.case.to_string()).collect();
        assert_eq!(failures, vec!["Schools: Cliques"]);

        let rendered = report.to_string();
        assert!(rendered.contains("Asserting Schools: BasicJoin PASSED"));
        assert!(rendered.contains("Asserting Schools: Cliques FAILED"));
        assert!(rendered.contains("actual Draco, expected Harry"));
    }

    #[test]
    fn test_unknown_actual_value_is_an_error() {
        let mut api = api(5);
        api.generate_sources().unwrap();

        let actuals: ActualsDocument = serde_json::from_str(
            r#"{"student_schools": {"records": [{"student_id": "-1", "school_id": null}]}}"#,
        )
        .unwrap();
        assert!(api.load_actuals(&actuals).is_err());
    }
}
