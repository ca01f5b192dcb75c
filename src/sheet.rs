use serde_json::json;
use std::fs;
use std::path::PathBuf;

use crate::error::AppError;

/// One record, cell values ordered by the sheet's header row.
pub type Row = Vec<String>;

/// Sheet row number of the first data row (row 1 is the header), so the
/// sheet row of an in-memory table index is always `index + DATA_START_ROW`.
pub const DATA_START_ROW: usize = 2;

/// In-memory snapshot of a worksheet.
///
/// A table mirrors the sheet's row order and is never refreshed behind the
/// caller's back: after a remote mutation the caller reloads to observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// An empty table that still knows its column set.
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value addressed by in-memory row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Rows as an array of JSON objects keyed by column name, for injecting
    /// into page templates.
    pub fn to_json(&self) -> serde_json::Value {
        let records: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (i, column) in self.columns.iter().enumerate() {
                    let cell = row.get(i).map(String::as_str).unwrap_or("");
                    object.insert(column.clone(), json!(cell));
                }
                serde_json::Value::Object(object)
            })
            .collect();
        json!(records)
    }
}

/// The remote-sheet boundary.
///
/// Row indices are 1-based sheet rows; row 1 is the header and is never a
/// valid target for `update_row`/`delete_row`. Implementations surface
/// failures as [`AppError`] and never retry on their own.
pub trait Worksheet {
    /// Every row of the sheet, header included, in sheet order.
    fn all_values(&self) -> Result<Vec<Row>, AppError>;

    /// The header row alone.
    fn header_row(&self) -> Result<Row, AppError>;

    /// Append `values` as the new last row.
    fn append_row(&mut self, values: Row) -> Result<(), AppError>;

    /// Overwrite the full row range. The value count must match the sheet's
    /// column count exactly or the call is rejected with [`AppError::Api`].
    fn update_row(&mut self, row_index: usize, values: Row) -> Result<(), AppError>;

    /// Remove the row; all later rows shift up by one, so any previously
    /// computed indices for them are stale and must be re-resolved.
    fn delete_row(&mut self, row_index: usize) -> Result<(), AppError>;
}

/// Loads the whole sheet into a [`Table`]. A sheet with a header but no data
/// rows yields an empty table that still carries the columns.
pub fn load_table(ws: &dyn Worksheet) -> Result<Table, AppError> {
    let values = ws.all_values()?;
    match values.split_first() {
        Some((header, data)) => Ok(Table {
            columns: header.clone(),
            rows: data.to_vec(),
        }),
        None => Ok(Table::new(ws.header_row()?)),
    }
}

/// Finds the first data row with any cell exactly equal to `value` and
/// returns its 1-based sheet row. Duplicate identity values resolve to the
/// first match.
pub fn find_row_index(ws: &dyn Worksheet, value: &str) -> Result<Option<usize>, AppError> {
    let values = ws.all_values()?;
    for (i, row) in values.iter().enumerate().skip(1) {
        if row.iter().any(|cell| cell == value) {
            return Ok(Some(i + 1));
        }
    }
    Ok(None)
}

/// Spreadsheet-style letter of the last column for a given width (A, B, ... Z).
fn last_column_letter(width: usize) -> char {
    (b'A' + (width.clamp(1, 26) - 1) as u8) as char
}

/// Worksheet stored as a JSON array-of-rows on disk, row 0 being the header.
///
/// The file is read and rewritten whole on every operation, matching the
/// request-per-render lifecycle: nothing is cached between calls.
pub struct FileSheet {
    path: PathBuf,
}

impl FileSheet {
    /// Opens an existing sheet file. The file is not touched until the first
    /// operation, so a missing file surfaces as `NotFound` on use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        FileSheet { path: path.into() }
    }

    /// Creates a new sheet file containing only the header row.
    pub fn create(path: impl Into<PathBuf>, header: Row) -> Result<Self, AppError> {
        let sheet = FileSheet { path: path.into() };
        sheet.write(&[header])?;
        Ok(sheet)
    }

    fn read(&self) -> Result<Vec<Row>, AppError> {
        let data = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("sheet {} does not exist", self.path.display()))
            }
            _ => AppError::Network(e.to_string()),
        })?;
        serde_json::from_str(&data)
            .map_err(|e| AppError::Api(format!("malformed sheet data: {e}")))
    }

    fn write(&self, rows: &[Row]) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(rows).map_err(|e| AppError::Api(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| AppError::Network(e.to_string()))
    }
}

impl Worksheet for FileSheet {
    fn all_values(&self) -> Result<Vec<Row>, AppError> {
        self.read()
    }

    fn header_row(&self) -> Result<Row, AppError> {
        self.read()?
            .first()
            .cloned()
            .ok_or_else(|| AppError::Api("sheet has no header row".to_string()))
    }

    fn append_row(&mut self, values: Row) -> Result<(), AppError> {
        let mut rows = self.read()?;
        rows.push(values);
        self.write(&rows)
    }

    fn update_row(&mut self, row_index: usize, values: Row) -> Result<(), AppError> {
        let mut rows = self.read()?;
        if row_index < DATA_START_ROW || row_index > rows.len() {
            return Err(AppError::NotFound(format!("row {row_index} is out of range")));
        }
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if values.len() != width {
            return Err(AppError::Api(format!(
                "range A{row_index}:{col}{row_index} holds {width} cells, got {}",
                values.len(),
                col = last_column_letter(width),
            )));
        }
        rows[row_index - 1] = values;
        self.write(&rows)
    }

    fn delete_row(&mut self, row_index: usize) -> Result<(), AppError> {
        let mut rows = self.read()?;
        if row_index < DATA_START_ROW || row_index > rows.len() {
            return Err(AppError::NotFound(format!("row {row_index} is out of range")));
        }
        rows.remove(row_index - 1);
        self.write(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(values: &[&str]) -> Row {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_sheet(dir: &tempfile::TempDir) -> FileSheet {
        let mut ws = FileSheet::create(
            dir.path().join("recipes.json"),
            row(&["name", "category", "diet"]),
        )
        .unwrap();
        ws.append_row(row(&["Pasta", "Dinner", "vegan"])).unwrap();
        ws.append_row(row(&["Toast", "Breakfast", "other"])).unwrap();
        ws
    }

    #[test]
    fn load_header_only_sheet_yields_empty_table_with_columns() {
        let dir = tempdir().unwrap();
        let ws = FileSheet::create(dir.path().join("empty.json"), row(&["a", "b"])).unwrap();

        let table = load_table(&ws).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["a", "b"]);
    }

    #[test]
    fn missing_sheet_file_is_not_found() {
        let dir = tempdir().unwrap();
        let ws = FileSheet::open(dir.path().join("nope.json"));

        assert!(matches!(load_table(&ws), Err(AppError::NotFound(_))));
    }

    #[test]
    fn sheet_row_is_memory_index_plus_two() {
        let dir = tempdir().unwrap();
        let ws = sample_sheet(&dir);

        assert_eq!(find_row_index(&ws, "Pasta").unwrap(), Some(2));
        assert_eq!(find_row_index(&ws, "Toast").unwrap(), Some(3));
        assert_eq!(find_row_index(&ws, "Sushi").unwrap(), None);
    }

    #[test]
    fn find_matches_any_cell() {
        let dir = tempdir().unwrap();
        let ws = sample_sheet(&dir);

        assert_eq!(find_row_index(&ws, "Breakfast").unwrap(), Some(3));
    }

    #[test]
    fn update_rejects_column_count_mismatch() {
        let dir = tempdir().unwrap();
        let mut ws = sample_sheet(&dir);

        let err = ws.update_row(2, row(&["Pasta", "Dinner"])).unwrap_err();
        assert!(matches!(err, AppError::Api(_)));

        // The rejected call must not have written anything.
        let table = load_table(&ws).unwrap();
        assert_eq!(table.rows[0], row(&["Pasta", "Dinner", "vegan"]));
    }

    #[test]
    fn update_overwrites_full_row() {
        let dir = tempdir().unwrap();
        let mut ws = sample_sheet(&dir);

        ws.update_row(2, row(&["Pasta", "Lunch", "vegetarian"])).unwrap();
        let table = load_table(&ws).unwrap();
        assert_eq!(table.rows[0], row(&["Pasta", "Lunch", "vegetarian"]));
    }

    #[test]
    fn delete_shifts_later_rows_up() {
        let dir = tempdir().unwrap();
        let mut ws = sample_sheet(&dir);

        ws.delete_row(2).unwrap();
        // Toast moved from sheet row 3 to sheet row 2.
        assert_eq!(find_row_index(&ws, "Toast").unwrap(), Some(2));
    }

    #[test]
    fn header_row_is_never_deletable() {
        let dir = tempdir().unwrap();
        let mut ws = sample_sheet(&dir);

        assert!(matches!(ws.delete_row(1), Err(AppError::NotFound(_))));
        assert!(matches!(ws.delete_row(99), Err(AppError::NotFound(_))));
    }

    #[test]
    fn table_value_by_column_name() {
        let dir = tempdir().unwrap();
        let ws = sample_sheet(&dir);

        let table = load_table(&ws).unwrap();
        assert_eq!(table.value(0, "diet"), Some("vegan"));
        assert_eq!(table.value(1, "name"), Some("Toast"));
        assert_eq!(table.value(0, "missing"), None);
    }
}
