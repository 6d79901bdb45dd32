#[cfg(test)]
mod tests {
    use dtspec::table::{parse_markdown, TableError};
    use insta::assert_snapshot;

    #[test]
    fn test_parse_simple_table() {
        let table = parse_markdown(
            "
            | id | name   |
            | -  | -      |
            | s1 | Buffy  |
            | s2 | Willow |
            ",
        )
        .unwrap();

        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "name"), Some(&Some("Willow".to_string())));
    }

    #[test]
    fn test_trailing_comments_are_dropped() {
        let table = parse_markdown(
            "
            | id | name  |  # header comment
            | -  | -     |
            | s1 | Buffy |  # the slayer
            ",
        )
        .unwrap();

        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.cell(0, "name"), Some(&Some("Buffy".to_string())));
    }

    #[test]
    fn test_octothorpe_inside_cell_is_content() {
        let table = parse_markdown(
            "
            | id | note     |
            | -  | -        |
            | s1 | #1 pick  |
            ",
        )
        .unwrap();

        assert_eq!(table.cell(0, "note"), Some(&Some("#1 pick".to_string())));
    }

    #[test]
    fn test_null_token_is_kept_for_callers() {
        let table = parse_markdown("| a |\n| - |\n| {NULL} |").unwrap();
        assert_eq!(table.cell(0, "a"), Some(&Some("{NULL}".to_string())));
        assert_eq!(table.replace_null_tokens().cell(0, "a"), Some(&None));
    }

    #[test]
    fn test_missing_separator() {
        let err = parse_markdown("| id |\n| s1 |").unwrap_err();
        assert!(matches!(err, TableError::BadTableFormat { .. }));
        assert!(err.to_string().contains("Bad header separator"));
    }

    #[test]
    fn test_header_without_rows_or_separator() {
        let err = parse_markdown("| id |").unwrap_err();
        assert!(err.to_string().contains("missing header separator"));
    }

    #[test]
    fn test_empty_text() {
        let err = parse_markdown("  \n   \n").unwrap_err();
        assert!(err.to_string().contains("table is empty"));
    }

    #[test]
    fn test_wrong_cell_count() {
        let err = parse_markdown("| a | b |\n| - | - |\n| 1 |").unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 cells, header has 2"));
    }

    #[test]
    fn test_duplicate_column() {
        let err = parse_markdown("| a | a |\n| - | - |").unwrap_err();
        assert!(err.to_string().contains("duplicate column name: a"));
    }

    #[test]
    fn test_display_renders_parseable_table() {
        let table = parse_markdown(
            "
            | id | name   |
            | -  | -      |
            | s1 | Buffy  |
            | s2 | {NULL} |
            ",
        )
        .unwrap()
        .replace_null_tokens();

        let rendered = table.to_string();
        assert_snapshot!(rendered, @r"
        | id | name   |
        | -- | ------ |
        | s1 | Buffy  |
        | s2 | {NULL} |
        ");

        let reparsed = parse_markdown(&rendered).unwrap().replace_null_tokens();
        assert_eq!(reparsed, table);
    }
}
