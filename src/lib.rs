//! # Financial Report Analyzer
//!
//! A library for ingesting spreadsheet-based financial reports (Excel/CSV),
//! storing their per-sheet tabular data, and deriving chart-ready aggregates
//! on demand.
//!
//! ## Core Concepts
//!
//! - **FileRecord**: metadata for one uploaded artifact and its processing
//!   status (`processing` → `completed`/`failed`)
//! - **SheetData**: one stored worksheet, a header row plus raw data rows,
//!   ragged input tolerated
//! - **ChartAnalysis**: a grouped-and-summed series over two user-chosen
//!   column indices; derived on every request, never persisted
//! - **Ingestion**: validate → store blob → parse → replace the file's sheet
//!   set atomically → finalize the record
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use financial_report_analyzer::{MemoryBlobStore, ReportManager};
//!
//! let manager = ReportManager::new(Arc::new(MemoryBlobStore::new()));
//!
//! let csv = b"Category,Amount\nRent,300\nPayroll,900\nRent,150\n";
//! let record = manager.upload(1, "q1.csv", "text/csv", csv).unwrap();
//!
//! // Group column 0, sum column 1: Rent=450, Payroll=900.
//! let analysis = manager.analyze(record.id, 0, 0, 1).unwrap();
//! assert_eq!(analysis.series.len(), 2);
//! ```
//!
//! With the `gemini` feature enabled, [`llm::ReportAssistant`] answers
//! questions about a stored report's contents over the same sheet data.

pub mod aggregate;
pub mod blob;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod store;

#[cfg(feature = "gemini")]
pub mod llm;

pub use aggregate::{aggregate, analyze};
pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use error::{ReportError, Result};
pub use pipeline::{validate_upload, IngestionPipeline, MAX_FILE_NAME_CHARS, MAX_UPLOAD_BYTES};
pub use schema::*;
pub use store::ReportStore;

use std::sync::Arc;

/// Facade binding the store and pipeline into the operations the web layer
/// exposes: upload, re-parse, sheet listing, chart analysis, and the chat
/// history the AI assistant builds on.
pub struct ReportManager {
    store: Arc<ReportStore>,
    pipeline: IngestionPipeline,
}

impl ReportManager {
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        let store = Arc::new(ReportStore::new());
        let pipeline = IngestionPipeline::new(Arc::clone(&store), blob);
        Self { store, pipeline }
    }

    /// Direct access to the underlying store, shared with the pipeline.
    pub fn store(&self) -> &Arc<ReportStore> {
        &self.store
    }

    /// Ingest one validated upload. See [`IngestionPipeline::ingest`].
    pub fn upload(
        &self,
        user_id: i64,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<FileRecord> {
        self.pipeline.ingest(user_id, file_name, mime_type, bytes)
    }

    /// Ingest a browser upload delivered as a base64 data URL.
    pub fn upload_base64(
        &self,
        user_id: i64,
        file_name: &str,
        mime_type: &str,
        data_url: &str,
    ) -> Result<FileRecord> {
        self.pipeline
            .ingest_base64(user_id, file_name, mime_type, data_url)
    }

    /// Re-run the parser against a file's stored blob.
    pub fn reparse(&self, file_id: i64) -> Result<FileRecord> {
        self.pipeline.reparse(file_id)
    }

    pub fn delete_file(&self, file_id: i64) -> Result<()> {
        self.pipeline.delete_file(file_id)
    }

    pub fn list_files(&self) -> Vec<FileRecord> {
        self.store.list_files()
    }

    pub fn file(&self, file_id: i64) -> Result<FileRecord> {
        self.store.file(file_id)
    }

    /// Ordered `{sheet_index, sheet_name}` pairs for axis pickers.
    pub fn sheets(&self, file_id: i64) -> Result<Vec<SheetOverview>> {
        self.store.list_sheet_names(file_id)
    }

    pub fn sheet(&self, file_id: i64, sheet_index: usize) -> Result<SheetData> {
        self.store.get_sheet(file_id, sheet_index)
    }

    /// Aggregate one sheet into a chart series, grouping by `x_col` and
    /// summing `y_col`. Works on a consistent snapshot, so a concurrent
    /// re-parse can never be observed half-applied.
    pub fn analyze(
        &self,
        file_id: i64,
        sheet_index: usize,
        x_col: usize,
        y_col: usize,
    ) -> Result<ChartAnalysis> {
        let snapshot = self.store.sheets_snapshot(file_id)?;
        let sheet = snapshot
            .get(sheet_index)
            .ok_or(ReportError::SheetNotFound {
                file_id,
                sheet_index,
            })?;
        Ok(aggregate::analyze(sheet, x_col, y_col))
    }

    pub fn chat_history(&self, file_id: i64) -> Result<Vec<ChatMessage>> {
        self.store.chat_history(file_id)
    }

    /// Persist one question/answer pair of the per-file conversation.
    pub fn record_chat_exchange(
        &self,
        file_id: i64,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        self.store.append_chat(file_id, ChatRole::User, question)?;
        self.store
            .append_chat(file_id, ChatRole::Assistant, answer)?;
        Ok(())
    }
}
