use crate::sheet::Table;

/// Filters a table by a whitespace-separated list of search terms.
///
/// Each term keeps only the rows where at least one cell contains it as a
/// case-insensitive substring; successive terms narrow the result further.
/// Relative row order is preserved and an empty query returns the table
/// unchanged. Substring semantics are intentional: a term may match
/// punctuation or the middle of a word.
pub fn search_table(table: &Table, query: &str) -> Table {
    let mut rows = table.rows.clone();
    for term in query.split_whitespace() {
        let needle = term.to_lowercase();
        rows.retain(|row| row.iter().any(|cell| cell.to_lowercase().contains(&needle)));
    }
    Table {
        columns: table.columns.clone(),
        rows,
    }
}

/// Keeps only the rows whose `column` cell equals `value` exactly. An unknown
/// column yields an empty result.
pub fn filter_by_column(table: &Table, column: &str, value: &str) -> Table {
    let rows = match table.column_index(column) {
        Some(idx) => table
            .rows
            .iter()
            .filter(|row| row.get(idx).map(String::as_str) == Some(value))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Table {
        columns: table.columns.clone(),
        rows,
    }
}

/// Distinct values of one column in order of first appearance, for building
/// the optional column filter.
pub fn unique_values(table: &Table, column: &str) -> Vec<String> {
    let mut seen = Vec::new();
    if let Some(idx) = table.column_index(column) {
        for row in &table.rows {
            if let Some(cell) = row.get(idx) {
                if !seen.contains(cell) {
                    seen.push(cell.clone());
                }
            }
        }
    }
    seen
}
