//! Prompt assembly: a stored report rendered as conversation context.

use crate::llm::types::Content;
use crate::schema::{CellValue, ChatMessage, ChatRole, FileRecord, SheetData};

/// Data rows per sheet included in the prompt; the rest is summarized.
pub const MAX_CONTEXT_ROWS: usize = 50;

pub const SYSTEM_PROMPT: &str = "You are a financial report analyst. Answer questions about the \
uploaded report using only the sheet data provided in this conversation. Reply in Markdown, \
reference sheet names and column headers when citing figures, and say plainly when the data \
cannot answer the question. Do not invent numbers.";

/// Render a report's sheets as plain text tables, capped at
/// [`MAX_CONTEXT_ROWS`] rows per sheet with an omission note.
pub fn sheet_context(record: &FileRecord, sheets: &[SheetData]) -> String {
    let mut out = format!(
        "Report file: {} ({} sheets, {} data rows)\n",
        record.file_name,
        sheets.len(),
        record.row_count
    );

    for sheet in sheets {
        out.push_str(&format!(
            "\n## Sheet {}: {}\n{}\n",
            sheet.sheet_index,
            sheet.sheet_name,
            sheet.headers.join(" | ")
        ));
        for row in sheet.rows.iter().take(MAX_CONTEXT_ROWS) {
            let cells: Vec<String> = row.iter().map(CellValue::as_label).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if sheet.rows.len() > MAX_CONTEXT_ROWS {
            out.push_str(&format!(
                "({} more rows omitted)\n",
                sheet.rows.len() - MAX_CONTEXT_ROWS
            ));
        }
    }

    out
}

/// Prior chat turns mapped onto Gemini conversation roles.
pub fn history_contents(history: &[ChatMessage]) -> Vec<Content> {
    history
        .iter()
        .map(|message| match message.role {
            ChatRole::User => Content::user(message.content.clone()),
            ChatRole::Assistant => Content::model(message.content.clone()),
        })
        .collect()
}

/// Build the full conversation: report context first, then the prior chat
/// turns, then the new question.
pub fn conversation_contents(
    record: &FileRecord,
    sheets: &[SheetData],
    history: &[ChatMessage],
    question: &str,
) -> Vec<Content> {
    let mut contents = vec![Content::user(format!(
        "Here is the report data to analyze:\n\n{}",
        sheet_context(record, sheets)
    ))];
    contents.extend(history_contents(history));
    contents.push(Content::user(question.to_string()));
    contents
}
