//! Chart-series derivation: a single-pass grouped reduction over one sheet.
//!
//! Spreadsheet data arriving here is routinely ragged and only partially
//! numeric, so the coercion rules are deliberately forgiving: a missing or
//! empty category cell groups under the `""` label, and anything that does
//! not read as a number contributes 0.0. Out-of-range column indices are
//! accepted, not rejected.

use std::collections::HashMap;

use crate::schema::{CellValue, ChartAnalysis, ChartPoint, SheetData};

/// Group the sheet's data rows by the display string of `x_col` and sum the
/// numeric coercion of `y_col` per group. Labels keep first-seen order, so
/// the result is a pure function of the stored rows and the two indices.
pub fn aggregate(sheet: &SheetData, x_col: usize, y_col: usize) -> Vec<ChartPoint> {
    let mut series: Vec<ChartPoint> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in &sheet.rows {
        let label = row
            .get(x_col)
            .map(CellValue::as_label)
            .unwrap_or_default();
        let value = row.get(y_col).map(CellValue::as_number).unwrap_or(0.0);

        match positions.get(&label) {
            Some(&at) => series[at].value += value,
            None => {
                positions.insert(label.clone(), series.len());
                series.push(ChartPoint { label, value });
            }
        }
    }

    series
}

/// [`aggregate`] plus the sheet context clients show next to the chart.
pub fn analyze(sheet: &SheetData, x_col: usize, y_col: usize) -> ChartAnalysis {
    ChartAnalysis {
        sheet_name: sheet.sheet_name.clone(),
        headers: sheet.headers.clone(),
        total_rows: sheet.row_count,
        series: aggregate(sheet, x_col, y_col),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParsedSheet;

    fn sheet_of(rows: Vec<Vec<CellValue>>) -> SheetData {
        SheetData::new(
            1,
            0,
            ParsedSheet {
                name: "Budget".to_string(),
                headers: vec!["Category".to_string(), "Amount".to_string()],
                rows,
            },
        )
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_grouped_sum_keeps_first_seen_order() {
        let sheet = sheet_of(vec![
            vec![text("A"), CellValue::Number(1.0)],
            vec![text("B"), CellValue::Number(2.0)],
            vec![text("A"), CellValue::Number(3.0)],
        ]);

        let series = aggregate(&sheet, 0, 1);
        assert_eq!(
            series,
            vec![
                ChartPoint {
                    label: "A".to_string(),
                    value: 4.0
                },
                ChartPoint {
                    label: "B".to_string(),
                    value: 2.0
                },
            ]
        );
    }

    #[test]
    fn test_short_rows_contribute_zero() {
        let sheet = sheet_of(vec![
            vec![text("A"), CellValue::Number(5.0)],
            vec![text("B")],
        ]);

        let series = aggregate(&sheet, 0, 1);
        assert_eq!(
            series,
            vec![
                ChartPoint {
                    label: "A".to_string(),
                    value: 5.0
                },
                ChartPoint {
                    label: "B".to_string(),
                    value: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_missing_category_groups_under_empty_label() {
        let sheet = sheet_of(vec![
            vec![CellValue::Empty, CellValue::Number(2.0)],
            vec![text("A"), CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::Number(3.0)],
        ]);

        let series = aggregate(&sheet, 0, 1);
        assert_eq!(series[0].label, "");
        assert_eq!(series[0].value, 5.0);
        assert_eq!(series[1].label, "A");
    }

    #[test]
    fn test_textual_numbers_and_garbage_values() {
        let sheet = sheet_of(vec![
            vec![text("A"), text("10.5")],
            vec![text("A"), text("n/a")],
            vec![text("A"), CellValue::Empty],
        ]);

        let series = aggregate(&sheet, 0, 1);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 10.5);
    }

    #[test]
    fn test_columns_beyond_sheet_width_are_tolerated() {
        let sheet = sheet_of(vec![
            vec![text("A"), CellValue::Number(1.0)],
            vec![text("B"), CellValue::Number(2.0)],
        ]);

        let series = aggregate(&sheet, 9, 12);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "");
        assert_eq!(series[0].value, 0.0);
    }

    #[test]
    fn test_numeric_labels_render_as_display_strings() {
        let sheet = sheet_of(vec![
            vec![CellValue::Number(2023.0), CellValue::Number(7.0)],
            vec![CellValue::Number(2023.0), CellValue::Number(5.0)],
            vec![CellValue::Number(2024.0), CellValue::Number(1.0)],
        ]);

        let series = aggregate(&sheet, 0, 1);
        assert_eq!(series[0].label, "2023");
        assert_eq!(series[0].value, 12.0);
        assert_eq!(series[1].label, "2024");
    }

    #[test]
    fn test_determinism() {
        let sheet = sheet_of(vec![
            vec![text("X"), CellValue::Number(1.25)],
            vec![text("Y"), CellValue::Number(2.5)],
            vec![text("X"), CellValue::Number(0.75)],
        ]);

        let first = aggregate(&sheet, 0, 1);
        let second = aggregate(&sheet, 0, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_analyze_carries_sheet_context() {
        let sheet = sheet_of(vec![vec![text("A"), CellValue::Number(1.0)]]);
        let analysis = analyze(&sheet, 0, 1);

        assert_eq!(analysis.sheet_name, "Budget");
        assert_eq!(analysis.headers, vec!["Category", "Amount"]);
        assert_eq!(analysis.total_rows, 1);
        assert_eq!(analysis.series.len(), 1);
    }
}
