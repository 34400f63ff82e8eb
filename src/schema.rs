use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an uploaded report file.
///
/// A record is created as `Processing` and moves exactly once per parse run to
/// `Completed` or `Failed`. A later re-parse may move `Failed` to `Completed`
/// (or back), but a record never returns to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Completed,
    Failed,
}

/// Metadata for one uploaded report artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub user_id: i64,
    pub file_name: String,
    /// Key under which the raw bytes live in the blob store.
    pub file_key: String,
    /// URL resolvable through the blob store; re-parse reads this.
    pub file_url: String,
    pub file_size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    /// Cached worksheet names, in workbook order.
    pub sheet_names: Vec<String>,
    /// Total data rows across all sheets.
    pub row_count: usize,
    /// Widest column count observed across all sheets.
    pub column_count: usize,
}

/// A single spreadsheet cell.
///
/// Numeric vs. textual typing is preserved where the source format
/// distinguishes it (xlsx/xls); CSV cells are always `Text`. Missing cells
/// are `Empty` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Display-string coercion used for grouping labels and header cells.
    /// Empty cells become `""`; whole numbers render without a decimal point.
    pub fn as_label(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(v) => format_number(*v),
            CellValue::Bool(v) => v.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Numeric coercion used for summed values. Non-numeric and missing
    /// cells coerce to 0.0 rather than erroring.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Empty => 0.0,
            CellValue::Number(v) => *v,
            CellValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// One worksheet as produced by the parser, before it is bound to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ParsedSheet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Widest extent observed across the header row and every data row.
    /// Ragged input is expected; short rows are not padded.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.headers.len())
    }
}

/// One stored worksheet belonging to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub file_id: i64,
    pub sheet_name: String,
    /// 0-based position of the worksheet in the workbook.
    pub sheet_index: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl SheetData {
    pub fn new(file_id: i64, sheet_index: usize, parsed: ParsedSheet) -> Self {
        let row_count = parsed.row_count();
        let column_count = parsed.column_count();
        Self {
            file_id,
            sheet_name: parsed.name,
            sheet_index,
            headers: parsed.headers,
            rows: parsed.rows,
            row_count,
            column_count,
        }
    }
}

/// A sheet's position and name, as listed to clients picking an axis source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetOverview {
    pub sheet_index: usize,
    pub sheet_name: String,
}

/// One grouped-and-summed point of a chart series. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Aggregation result together with the sheet context clients display
/// alongside the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAnalysis {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub total_rows: usize,
    pub series: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the per-file conversation with the AI assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_serialization() {
        let row = vec![
            CellValue::Text("Cash".to_string()),
            CellValue::Number(1250.5),
            CellValue::Bool(true),
            CellValue::Empty,
        ];

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["Cash",1250.5,true,null]"#);

        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_label_coercion() {
        assert_eq!(CellValue::Number(4.0).as_label(), "4");
        assert_eq!(CellValue::Number(4.5).as_label(), "4.5");
        assert_eq!(CellValue::Number(-12.0).as_label(), "-12");
        assert_eq!(CellValue::Text("Revenue".to_string()).as_label(), "Revenue");
        assert_eq!(CellValue::Bool(false).as_label(), "false");
        assert_eq!(CellValue::Empty.as_label(), "");
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(CellValue::Number(3.25).as_number(), 3.25);
        assert_eq!(CellValue::Text(" 42 ".to_string()).as_number(), 42.0);
        assert_eq!(CellValue::Text("n/a".to_string()).as_number(), 0.0);
        assert_eq!(CellValue::Text(String::new()).as_number(), 0.0);
        assert_eq!(CellValue::Bool(true).as_number(), 1.0);
        assert_eq!(CellValue::Empty.as_number(), 0.0);
    }

    #[test]
    fn test_column_count_covers_ragged_rows() {
        let parsed = ParsedSheet {
            name: "Summary".to_string(),
            headers: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            rows: vec![
                vec![CellValue::Number(1.0); 5],
                vec![CellValue::Number(2.0); 2],
            ],
        };

        assert_eq!(parsed.column_count(), 5);
        assert_eq!(parsed.row_count(), 2);

        let sheet = SheetData::new(7, 0, parsed);
        assert_eq!(sheet.file_id, 7);
        assert_eq!(sheet.column_count, 5);
        assert_eq!(sheet.row_count, 2);
    }
}
