//! Upload ingestion: validation, blob storage, parsing, and the file-record
//! status transitions. Mirrors the lifecycle the admin upload screen drives:
//! a record is born `Processing`, and a parse run moves it to `Completed` or
//! `Failed`. Re-parse re-reads the stored blob and replaces the sheet set
//! wholesale, so running it twice on an unchanged blob is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use log::{info, warn};

use crate::blob::BlobStore;
use crate::error::{ReportError, Result};
use crate::parser;
use crate::schema::{FileRecord, FileStatus, SheetData};
use crate::store::ReportStore;

/// Upload ceiling enforced before anything is stored.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Longest accepted file name, in characters.
pub const MAX_FILE_NAME_CHARS: usize = 200;

const ALLOWED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];
const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
];

/// Reject an upload before it touches the blob store. A file passes when
/// either its MIME type or its extension is an accepted spreadsheet kind.
pub fn validate_upload(file_name: &str, mime_type: &str, size: u64) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(ReportError::Validation("file name is empty".to_string()));
    }
    if file_name.chars().count() > MAX_FILE_NAME_CHARS {
        return Err(ReportError::Validation(format!(
            "file name exceeds {} characters",
            MAX_FILE_NAME_CHARS
        )));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ReportError::Validation(format!(
            "file size {} exceeds the {} byte limit",
            size, MAX_UPLOAD_BYTES
        )));
    }

    let extension = file_name
        .rsplit('.')
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let mime_ok = ALLOWED_MIME_TYPES
        .iter()
        .any(|m| mime_type.eq_ignore_ascii_case(m));
    let extension_ok = ALLOWED_EXTENSIONS.contains(&extension.as_str());

    if !mime_ok && !extension_ok {
        return Err(ReportError::Validation(format!(
            "{} is not an Excel (.xlsx, .xls) or CSV file",
            file_name
        )));
    }

    Ok(())
}

pub struct IngestionPipeline {
    store: Arc<ReportStore>,
    blob: Arc<dyn BlobStore>,
    upload_seq: AtomicU64,
}

impl IngestionPipeline {
    pub fn new(store: Arc<ReportStore>, blob: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blob,
            upload_seq: AtomicU64::new(0),
        }
    }

    /// Run the full ingestion flow for one upload.
    ///
    /// A blob-store failure aborts before any record exists. A parse failure
    /// is not an `Err`: the record comes back with `FileStatus::Failed` and
    /// no sheet rows, which is the result the caller surfaces.
    pub fn ingest(
        &self,
        user_id: i64,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<FileRecord> {
        validate_upload(file_name, mime_type, bytes.len() as u64)?;

        let mime = resolve_mime(file_name, mime_type);
        let key = self.next_key(file_name);
        let url = self.blob.put(&key, bytes)?;

        let record = self.store.create_file(
            user_id,
            file_name,
            &key,
            &url,
            bytes.len() as u64,
            &mime,
        );
        info!("Ingesting {} as file {}", file_name, record.id);

        self.parse_into(record, bytes)
    }

    /// Accept the `data:<mime>;base64,` payload a browser upload produces.
    pub fn ingest_base64(
        &self,
        user_id: i64,
        file_name: &str,
        mime_type: &str,
        data_url: &str,
    ) -> Result<FileRecord> {
        let encoded = match data_url.find("base64,") {
            Some(at) => &data_url[at + "base64,".len()..],
            None => data_url,
        };
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ReportError::Validation(format!("invalid base64 payload: {}", e)))?;

        self.ingest(user_id, file_name, mime_type, &bytes)
    }

    /// Re-run the parser against the stored blob and replace the sheet set.
    ///
    /// If the blob cannot be read the record moves to `Failed` and the error
    /// propagates; if the blob reads but no longer parses, the record moves
    /// to `Failed` and the previously stored sheets stay untouched.
    pub fn reparse(&self, file_id: i64) -> Result<FileRecord> {
        let record = self.store.file(file_id)?;
        info!("Re-parsing file {} from {}", file_id, record.file_url);

        let bytes = match self.blob.get(&record.file_url) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.store
                    .update_file(file_id, |r| r.status = FileStatus::Failed)?;
                return Err(err);
            }
        };

        self.parse_into(record, &bytes)
    }

    /// Remove the record, its sheets, its chat history, and the stored blob.
    pub fn delete_file(&self, file_id: i64) -> Result<()> {
        let record = self.store.delete_file(file_id)?;
        if let Err(err) = self.blob.delete(&record.file_key) {
            // Rows are already gone; an orphaned blob is the lesser evil.
            warn!("Blob delete failed for {}: {}", record.file_key, err);
        }
        info!("Deleted file {} ({})", file_id, record.file_name);
        Ok(())
    }

    fn parse_into(&self, record: FileRecord, bytes: &[u8]) -> Result<FileRecord> {
        match self.run_parse(&record, bytes) {
            Ok(updated) => {
                info!(
                    "File {} completed: {} sheets, {} rows",
                    updated.id,
                    updated.sheet_names.len(),
                    updated.row_count
                );
                Ok(updated)
            }
            Err(err) if err.is_parse_failure() => {
                warn!("Parse failed for file {}: {}", record.id, err);
                self.store
                    .update_file(record.id, |r| r.status = FileStatus::Failed)
            }
            Err(err) => Err(err),
        }
    }

    fn run_parse(&self, record: &FileRecord, bytes: &[u8]) -> Result<FileRecord> {
        let parsed = parser::parse(bytes, &record.file_name, &record.mime_type)?;

        let sheets: Vec<SheetData> = parsed
            .into_iter()
            .enumerate()
            .map(|(index, sheet)| SheetData::new(record.id, index, sheet))
            .collect();

        let sheet_names: Vec<String> = sheets.iter().map(|s| s.sheet_name.clone()).collect();
        let total_rows: usize = sheets.iter().map(|s| s.row_count).sum();
        let max_columns = sheets.iter().map(|s| s.column_count).max().unwrap_or(0);

        self.store.replace_all(record.id, sheets)?;
        self.store.update_file(record.id, |r| {
            r.status = FileStatus::Completed;
            r.sheet_names = sheet_names;
            r.row_count = total_rows;
            r.column_count = max_columns;
        })
    }

    fn next_key(&self, file_name: &str) -> String {
        let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
        let safe_name: String = file_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        format!(
            "reports/{}-{}-{}",
            Utc::now().timestamp_millis(),
            seq,
            safe_name
        )
    }
}

fn resolve_mime(file_name: &str, mime_type: &str) -> String {
    if !mime_type.is_empty() {
        return mime_type.to_string();
    }
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
