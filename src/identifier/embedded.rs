//! Inline identifier references inside table cells.
//!
//! A cell may mention the concrete value of a named id directly, e.g.
//! `"{student.external_id[s1]}"` or `"ext-{student.id[s1]}"`. References are
//! resolved against the registry for one case and replaced in place.

use std::sync::LazyLock;

use regex::Regex;

use super::{CaseId, IdentifierRegistry, IdentifierResult};
use crate::table::{Cell, Table};

static EMBEDDED_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}\[\].]+)\.([^{}\[\].]+)\[([^{}\[\]]+)\]\}")
        .expect("valid embedded reference pattern")
});

/// Replace every embedded reference in every cell of `table`.
pub fn translate_embedded(
    table: &Table,
    case: &CaseId,
    registry: &mut IdentifierRegistry,
) -> IdentifierResult<Table> {
    table.try_map_cells(|cell| translate_cell(cell, case, registry))
}

fn translate_cell(
    cell: &Cell,
    case: &CaseId,
    registry: &mut IdentifierRegistry,
) -> IdentifierResult<Cell> {
    let Some(text) = cell else {
        return Ok(None);
    };
    if !EMBEDDED_REFERENCE.is_match(text) {
        return Ok(cell.clone());
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in EMBEDDED_REFERENCE.captures_iter(text) {
        let whole = captures.get(0).map_or(0..0, |m| m.range());
        let identifier = captures[1].trim();
        let attribute = captures[2].trim();
        let named_id = captures[3].trim();

        let value = registry
            .get_mut(identifier)?
            .value(case, Some(named_id), attribute)?
            .unwrap_or_default();

        out.push_str(&text[last..whole.start]);
        out.push_str(&value);
        last = whole.end;
    }
    out.push_str(&text[last..]);
    Ok(Some(out))
}
