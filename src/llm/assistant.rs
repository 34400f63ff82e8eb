use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use schemars::schema_for;

use crate::error::{ReportError, Result};
use crate::llm::client::GeminiClient;
use crate::llm::prompts::{conversation_contents, history_contents, SYSTEM_PROMPT};
use crate::llm::types::{Content, MarkdownResponse};
use crate::schema::{ChatMessage, FileRecord, SheetData};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Request counters surfaced on the admin AI-status screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total_requests: u64,
    pub failed_requests: u64,
}

#[derive(Debug, Clone)]
pub struct AssistantError {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Default)]
struct UsageLog {
    stats: UsageStats,
    errors: Vec<AssistantError>,
}

/// Chat interface over a stored report's sheet data.
pub struct ReportAssistant {
    client: GeminiClient,
    model: String,
    log: Mutex<UsageLog>,
}

impl ReportAssistant {
    pub fn new(client: GeminiClient) -> Self {
        Self::with_model(client, DEFAULT_MODEL)
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            log: Mutex::new(UsageLog::default()),
        }
    }

    /// Ask a question about one stored report.
    ///
    /// The sheets and prior chat turns become the conversation context; the
    /// reply is constrained to the [`MarkdownResponse`] schema and unwrapped
    /// to its Markdown body.
    pub async fn ask(
        &self,
        record: &FileRecord,
        sheets: &[SheetData],
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String> {
        debug!(
            "Assistant question for file {} ({} prior turns)",
            record.id,
            history.len()
        );

        let contents = conversation_contents(record, sheets, history, question);
        self.complete(contents).await
    }

    /// Attach the original uploaded blob to the conversation instead of the
    /// rendered sheet context. Useful when a report is wide or long enough
    /// that the text rendering would truncate too much.
    pub async fn ask_with_document(
        &self,
        record: &FileRecord,
        bytes: Vec<u8>,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String> {
        let document = self
            .client
            .upload_bytes(bytes, &record.file_name, &record.mime_type)
            .await?;

        let mut contents = vec![Content::user_with_file(
            "Here is the original report file to analyze.",
            &document,
        )];
        contents.extend(history_contents(history));
        contents.push(Content::user(question.to_string()));

        self.complete(contents).await
    }

    async fn complete(&self, contents: Vec<Content>) -> Result<String> {
        let schema = serde_json::to_value(schema_for!(MarkdownResponse))?;

        let raw = match self
            .client
            .generate_content(&self.model, SYSTEM_PROMPT, contents, Some(schema))
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                self.record_failure(&err);
                return Err(err);
            }
        };

        match serde_json::from_str::<MarkdownResponse>(clean_json_output(&raw)) {
            Ok(reply) => {
                self.record_success();
                Ok(reply.markdown)
            }
            Err(err) => {
                let err = ReportError::Assistant(format!("Model returned invalid JSON: {}", err));
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn usage(&self) -> UsageStats {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).stats
    }

    pub fn error_log(&self) -> Vec<AssistantError> {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .errors
            .clone()
    }

    fn record_success(&self) {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.stats.total_requests += 1;
    }

    fn record_failure(&self, err: &ReportError) {
        warn!("Assistant request failed: {}", err);
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.stats.total_requests += 1;
        log.stats.failed_requests += 1;
        log.errors.push(AssistantError {
            at: Utc::now(),
            message: err.to_string(),
        });
    }
}

/// Models occasionally wrap JSON in code fences or prose; keep the outermost
/// object.
fn clean_json_output(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &raw[start..=end],
        _ => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_output_strips_fences() {
        let raw = "```json\n{\"markdown\": \"hi\"}\n```";
        assert_eq!(clean_json_output(raw), "{\"markdown\": \"hi\"}");

        let bare = "{\"markdown\": \"hi\"}";
        assert_eq!(clean_json_output(bare), bare);

        assert_eq!(clean_json_output("  no json  "), "no json");
    }

    #[test]
    fn test_markdown_response_schema_mentions_field() {
        let schema = serde_json::to_value(schema_for!(MarkdownResponse)).unwrap();
        assert!(schema.to_string().contains("markdown"));
    }
}
