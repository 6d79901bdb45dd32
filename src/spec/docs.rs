//! Markdown documentation of a spec document.

use std::fmt::Write;

use super::{ColumnValueSpec, FactoryDataSpec, SpecDocument};

/// Render the spec as human readable markdown.
pub fn render_markdown(spec: &SpecDocument) -> String {
    let mut doc = String::new();
    // Writing to a String cannot fail.
    let _ = write_document(&mut doc, spec);
    doc.trim_end().to_string()
}

fn write_document(doc: &mut String, spec: &SpecDocument) -> std::fmt::Result {
    writeln!(doc, "# Data Transform Spec\n")?;
    if let Some(description) = &spec.description {
        writeln!(doc, "{}\n", description)?;
    }

    writeln!(doc, "Data sources:\n")?;
    for source in &spec.sources {
        writeln!(doc, "* {}{}", source.source, dash(source.description.as_deref()))?;
    }
    writeln!(doc)?;

    writeln!(doc, "Data targets:\n")?;
    for target in &spec.targets {
        writeln!(doc, "* {}{}", target.target, dash(target.description.as_deref()))?;
    }
    writeln!(doc)?;

    if !spec.factories.is_empty() {
        writeln!(doc, "## Factories common to all scenarios\n")?;
        for factory in &spec.factories {
            writeln!(doc, "### Factory: {}\n", factory.factory)?;
            if let Some(description) = &factory.description {
                writeln!(doc, "{}\n", description)?;
            }
            write_parents(doc, &factory.parents, 0)?;
            write_factory_data(doc, &factory.data, 0)?;
        }
    }

    for scenario in &spec.scenarios {
        writeln!(doc, "# Scenario: {}\n", scenario.scenario)?;
        if let Some(description) = &scenario.description {
            writeln!(doc, "Description: {}\n", description)?;
        }

        if let Some(factory) = &scenario.factory {
            writeln!(doc, "### Factory common to all cases in this scenario\n")?;
            write_parents(doc, &factory.parents, 0)?;
            write_factory_data(doc, &factory.data, 0)?;
        }

        for case in &scenario.cases {
            writeln!(doc, "## Case: {}\n", case.case)?;
            if let Some(description) = &case.description {
                writeln!(doc, "Description: {}\n", description)?;
            }

            if let Some(factory) = &case.factory {
                writeln!(doc, "* Given the source data\n")?;
                write_factory_data(doc, &factory.data, 2)?;
            }

            writeln!(doc, "* Expected target data\n")?;
            for expected in &case.expected.data {
                writeln!(doc, "{}\n", indent(2, &format!("**{}**:", expected.target)))?;
                writeln!(doc, "{}\n", indent(2, expected.table.trim()))?;
                if !expected.values.is_empty() {
                    writeln!(doc, "{}\n", indent(2, "Expected constant values:"))?;
                    write_values(doc, &expected.values, 4)?;
                }
            }
        }
    }
    Ok(())
}

fn write_parents(doc: &mut String, parents: &[String], depth: usize) -> std::fmt::Result {
    if parents.is_empty() {
        return Ok(());
    }
    writeln!(doc, "{}\n", indent(depth, "Parents:"))?;
    for parent in parents {
        writeln!(doc, "{}", indent(depth, &format!("* {}", parent)))?;
    }
    writeln!(doc)
}

fn write_factory_data(doc: &mut String, data: &[FactoryDataSpec], depth: usize) -> std::fmt::Result {
    for entry in data {
        writeln!(doc, "{}\n", indent(depth, &format!("**{}**:", entry.source)))?;
        if let Some(table) = &entry.table {
            writeln!(doc, "{}\n", indent(depth, table.trim()))?;
        }
        if !entry.values.is_empty() {
            write_values(doc, &entry.values, depth + 2)?;
        }
    }
    Ok(())
}

fn write_values(doc: &mut String, values: &[ColumnValueSpec], depth: usize) -> std::fmt::Result {
    for value in values {
        let rendered = match (&value.value, &value.identifier) {
            (_, Some(identifier)) => format!("{}.{}", identifier.identifier, identifier.attribute),
            (Some(literal), None) => literal.clone(),
            (None, None) => crate::table::NULL_TOKEN.to_string(),
        };
        writeln!(doc, "{}", indent(depth, &format!("* **{}**: {}", value.column, rendered)))?;
    }
    writeln!(doc)
}

fn dash(description: Option<&str>) -> String {
    description.map(|d| format!(" - {}", d)).unwrap_or_default()
}

fn indent(depth: usize, text: &str) -> String {
    let pad = " ".repeat(depth);
    text.lines()
        .map(|line| format!("{}{}", pad, line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
