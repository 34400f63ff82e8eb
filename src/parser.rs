//! Spreadsheet decoding: raw upload bytes into [`ParsedSheet`] grids.
//!
//! Supports `.xlsx` and legacy `.xls` workbooks via calamine and `.csv` via
//! the csv crate. Row 0 of every worksheet is the header row; everything
//! after it is data. The transform is pure: no side effects, no storage.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xls, Xlsx};
use log::debug;

use crate::error::{ReportError, Result};
use crate::schema::{CellValue, ParsedSheet};

const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectedFormat {
    Xlsx,
    Xls,
    Csv,
}

/// Decode `bytes` into one [`ParsedSheet`] per worksheet, in workbook order.
///
/// The container is detected from magic bytes first (ZIP for xlsx, OLE2 for
/// legacy xls); the MIME type and file extension only decide the CSV case.
/// A buffer that matches none of the three is an [`ReportError::UnrecognizedFormat`].
pub fn parse(bytes: &[u8], file_name: &str, mime_type: &str) -> Result<Vec<ParsedSheet>> {
    let format = detect_format(bytes, file_name, mime_type)?;
    debug!(
        "Parsing {} ({} bytes) as {:?}",
        file_name,
        bytes.len(),
        format
    );

    match format {
        DetectedFormat::Xlsx => {
            let mut workbook = Xlsx::new(Cursor::new(bytes))?;
            collect_sheets(&mut workbook)
        }
        DetectedFormat::Xls => {
            let mut workbook = Xls::new(Cursor::new(bytes))?;
            collect_sheets(&mut workbook)
        }
        DetectedFormat::Csv => parse_csv(bytes, file_name),
    }
}

fn detect_format(bytes: &[u8], file_name: &str, mime_type: &str) -> Result<DetectedFormat> {
    if bytes.starts_with(b"PK") {
        return Ok(DetectedFormat::Xlsx);
    }
    if bytes.starts_with(&OLE2_MAGIC) {
        return Ok(DetectedFormat::Xls);
    }

    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if mime_type.eq_ignore_ascii_case("text/csv") || extension == "csv" {
        return Ok(DetectedFormat::Csv);
    }

    Err(ReportError::UnrecognizedFormat(format!(
        "{} is not a recognizable xlsx/xls/csv payload",
        file_name
    )))
}

fn collect_sheets<RS, R>(workbook: &mut R) -> Result<Vec<ParsedSheet>>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    ReportError: From<R::Error>,
{
    let sheet_names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in sheet_names {
        let range = workbook.worksheet_range(&name)?;
        let mut rows_iter = range.rows();

        let headers = rows_iter
            .next()
            .map(|row| trim_row(row).iter().map(|c| convert_cell(c).as_label()).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<CellValue>> = rows_iter
            .map(|row| trim_row(row).iter().map(convert_cell).collect())
            .collect();

        debug!("Worksheet \"{}\": {} data rows", name, rows.len());
        sheets.push(ParsedSheet {
            name,
            headers,
            rows,
        });
    }

    Ok(sheets)
}

/// Strip trailing empty cells so ragged storage reflects actual content.
/// calamine pads every row to the used-range width.
fn trim_row(row: &[Data]) -> &[Data] {
    let end = row
        .iter()
        .rposition(|c| !matches!(c, Data::Empty))
        .map_or(0, |i| i + 1);
    &row[..end]
}

fn convert_cell(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::Bool(v) => CellValue::Bool(*v),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(v) => CellValue::Number(v.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(error_text(e).to_string()),
    }
}

fn error_text(err: &calamine::CellErrorType) -> &'static str {
    use calamine::CellErrorType;

    match err {
        CellErrorType::Div0 => "#DIV/0!",
        CellErrorType::NA => "#N/A",
        CellErrorType::Name => "#NAME?",
        CellErrorType::Null => "#NULL!",
        CellErrorType::Num => "#NUM!",
        CellErrorType::Ref => "#REF!",
        CellErrorType::Value => "#VALUE!",
        CellErrorType::GettingData => "#GETTING_DATA",
    }
}

/// CSV has no workbook container: the whole file becomes one sheet named
/// after the file stem. CSV cannot distinguish numbers from text, so every
/// non-empty field is stored as `Text` and coerced at aggregation time.
fn parse_csv(bytes: &[u8], file_name: &str) -> Result<Vec<ParsedSheet>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(bytes);

    let mut records = reader.records();

    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|f| f.to_string()).collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let mut row: Vec<CellValue> = record
            .iter()
            .map(|f| {
                if f.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(f.to_string())
                }
            })
            .collect();
        while matches!(row.last(), Some(CellValue::Empty)) {
            row.pop();
        }
        rows.push(row);
    }

    let name = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Sheet1".to_string());

    Ok(vec![ParsedSheet {
        name,
        headers,
        rows,
    }])
}
