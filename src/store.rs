//! In-process persistence for file records, sheet data, and chat history.
//!
//! Sheet sets are replaced wholesale on every (re-)parse: the new vector is
//! built outside the lock and swapped in as a single `Arc`, so a reader that
//! races a re-parse observes either the fully-old or fully-new sheet set,
//! never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::{ReportError, Result};
use crate::schema::{
    ChatMessage, ChatRole, FileRecord, FileStatus, SheetData, SheetOverview,
};

#[derive(Default)]
pub struct ReportStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    next_file_id: i64,
    files: HashMap<i64, FileEntry>,
}

struct FileEntry {
    record: FileRecord,
    sheets: Arc<Vec<SheetData>>,
    chat: Vec<ChatMessage>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a new file record with the next id and status `Processing`.
    pub fn create_file(
        &self,
        user_id: i64,
        file_name: impl Into<String>,
        file_key: impl Into<String>,
        file_url: impl Into<String>,
        file_size: u64,
        mime_type: impl Into<String>,
    ) -> FileRecord {
        let mut inner = self.write();
        inner.next_file_id += 1;

        let record = FileRecord {
            id: inner.next_file_id,
            user_id,
            file_name: file_name.into(),
            file_key: file_key.into(),
            file_url: file_url.into(),
            file_size,
            mime_type: mime_type.into(),
            uploaded_at: Utc::now(),
            status: FileStatus::Processing,
            sheet_names: Vec::new(),
            row_count: 0,
            column_count: 0,
        };

        inner.files.insert(
            record.id,
            FileEntry {
                record: record.clone(),
                sheets: Arc::new(Vec::new()),
                chat: Vec::new(),
            },
        );

        record
    }

    pub fn file(&self, file_id: i64) -> Result<FileRecord> {
        self.read()
            .files
            .get(&file_id)
            .map(|entry| entry.record.clone())
            .ok_or(ReportError::FileNotFound(file_id))
    }

    /// All file records, most recently uploaded first.
    pub fn list_files(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self
            .read()
            .files
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        records
    }

    /// Apply `f` to the stored record and return the updated copy.
    pub fn update_file(
        &self,
        file_id: i64,
        f: impl FnOnce(&mut FileRecord),
    ) -> Result<FileRecord> {
        let mut inner = self.write();
        let entry = inner
            .files
            .get_mut(&file_id)
            .ok_or(ReportError::FileNotFound(file_id))?;
        f(&mut entry.record);
        Ok(entry.record.clone())
    }

    /// Swap in a complete new sheet set for `file_id`.
    ///
    /// Each sheet is re-bound to the file and renumbered to its position in
    /// the input sequence. Readers holding an earlier snapshot keep the old
    /// set alive until they drop it.
    pub fn replace_all(&self, file_id: i64, mut sheets: Vec<SheetData>) -> Result<()> {
        for (index, sheet) in sheets.iter_mut().enumerate() {
            sheet.file_id = file_id;
            sheet.sheet_index = index;
        }
        let sheets = Arc::new(sheets);

        let mut inner = self.write();
        let entry = inner
            .files
            .get_mut(&file_id)
            .ok_or(ReportError::FileNotFound(file_id))?;
        entry.sheets = sheets;
        Ok(())
    }

    pub fn get_sheet(&self, file_id: i64, sheet_index: usize) -> Result<SheetData> {
        let inner = self.read();
        let entry = inner
            .files
            .get(&file_id)
            .ok_or(ReportError::FileNotFound(file_id))?;
        entry
            .sheets
            .get(sheet_index)
            .cloned()
            .ok_or(ReportError::SheetNotFound {
                file_id,
                sheet_index,
            })
    }

    /// Consistent point-in-time view of a file's sheets, without copying rows.
    pub fn sheets_snapshot(&self, file_id: i64) -> Result<Arc<Vec<SheetData>>> {
        self.read()
            .files
            .get(&file_id)
            .map(|entry| Arc::clone(&entry.sheets))
            .ok_or(ReportError::FileNotFound(file_id))
    }

    pub fn list_sheet_names(&self, file_id: i64) -> Result<Vec<SheetOverview>> {
        let snapshot = self.sheets_snapshot(file_id)?;
        Ok(snapshot
            .iter()
            .map(|sheet| SheetOverview {
                sheet_index: sheet.sheet_index,
                sheet_name: sheet.sheet_name.clone(),
            })
            .collect())
    }

    /// Drop a file's sheet rows, keeping the record itself.
    pub fn delete_all_sheets(&self, file_id: i64) -> Result<()> {
        let mut inner = self.write();
        let entry = inner
            .files
            .get_mut(&file_id)
            .ok_or(ReportError::FileNotFound(file_id))?;
        entry.sheets = Arc::new(Vec::new());
        Ok(())
    }

    /// Remove the record, its sheets, and its chat history. Returns the
    /// removed record so the caller can clean up the stored blob.
    pub fn delete_file(&self, file_id: i64) -> Result<FileRecord> {
        self.write()
            .files
            .remove(&file_id)
            .map(|entry| entry.record)
            .ok_or(ReportError::FileNotFound(file_id))
    }

    pub fn append_chat(
        &self,
        file_id: i64,
        role: ChatRole,
        content: impl Into<String>,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            role,
            content: content.into(),
            at: Utc::now(),
        };

        let mut inner = self.write();
        let entry = inner
            .files
            .get_mut(&file_id)
            .ok_or(ReportError::FileNotFound(file_id))?;
        entry.chat.push(message.clone());
        Ok(message)
    }

    pub fn chat_history(&self, file_id: i64) -> Result<Vec<ChatMessage>> {
        self.read()
            .files
            .get(&file_id)
            .map(|entry| entry.chat.clone())
            .ok_or(ReportError::FileNotFound(file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CellValue, ParsedSheet};

    fn sheet(name: &str, rows: usize) -> SheetData {
        SheetData::new(
            0,
            0,
            ParsedSheet {
                name: name.to_string(),
                headers: vec!["A".to_string()],
                rows: vec![vec![CellValue::Number(1.0)]; rows],
            },
        )
    }

    #[test]
    fn test_create_and_fetch_file() {
        let store = ReportStore::new();
        let record = store.create_file(1, "q1.xlsx", "reports/q1", "memory://reports/q1", 512, "");

        assert_eq!(record.id, 1);
        assert_eq!(record.status, FileStatus::Processing);

        let fetched = store.file(record.id).unwrap();
        assert_eq!(fetched.file_name, "q1.xlsx");

        assert!(matches!(
            store.file(99),
            Err(ReportError::FileNotFound(99))
        ));
    }

    #[test]
    fn test_replace_all_renumbers_sheets() {
        let store = ReportStore::new();
        let record = store.create_file(1, "wb.xlsx", "k", "u", 0, "");

        let mut first = sheet("one", 2);
        first.sheet_index = 7; // deliberately wrong; replace_all owns numbering
        store
            .replace_all(record.id, vec![first, sheet("two", 3)])
            .unwrap();

        let names = store.list_sheet_names(record.id).unwrap();
        assert_eq!(
            names,
            vec![
                SheetOverview {
                    sheet_index: 0,
                    sheet_name: "one".to_string()
                },
                SheetOverview {
                    sheet_index: 1,
                    sheet_name: "two".to_string()
                },
            ]
        );

        let second = store.get_sheet(record.id, 1).unwrap();
        assert_eq!(second.file_id, record.id);
        assert_eq!(second.row_count, 3);

        assert!(matches!(
            store.get_sheet(record.id, 2),
            Err(ReportError::SheetNotFound { sheet_index: 2, .. })
        ));
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let store = ReportStore::new();
        let record = store.create_file(1, "wb.xlsx", "k", "u", 0, "");
        store.replace_all(record.id, vec![sheet("old", 1)]).unwrap();

        let before = store.sheets_snapshot(record.id).unwrap();
        store
            .replace_all(record.id, vec![sheet("new-a", 1), sheet("new-b", 1)])
            .unwrap();

        // The old snapshot is still the complete old set.
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].sheet_name, "old");

        let after = store.sheets_snapshot(record.id).unwrap();
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_delete_all_sheets_keeps_record() {
        let store = ReportStore::new();
        let record = store.create_file(1, "wb.xlsx", "k", "u", 0, "");
        store
            .replace_all(record.id, vec![sheet("a", 1), sheet("b", 1)])
            .unwrap();

        store.delete_all_sheets(record.id).unwrap();
        assert!(store.sheets_snapshot(record.id).unwrap().is_empty());
        assert!(store.file(record.id).is_ok());
    }

    #[test]
    fn test_delete_cascades() {
        let store = ReportStore::new();
        let record = store.create_file(1, "wb.xlsx", "k", "u", 0, "");
        store.replace_all(record.id, vec![sheet("s", 1)]).unwrap();
        store
            .append_chat(record.id, ChatRole::User, "what is this?")
            .unwrap();

        let removed = store.delete_file(record.id).unwrap();
        assert_eq!(removed.file_key, "k");

        assert!(store.file(record.id).is_err());
        assert!(store.sheets_snapshot(record.id).is_err());
        assert!(store.chat_history(record.id).is_err());
    }

    #[test]
    fn test_chat_history_preserves_order() {
        let store = ReportStore::new();
        let record = store.create_file(1, "wb.xlsx", "k", "u", 0, "");

        store
            .append_chat(record.id, ChatRole::User, "total expenses?")
            .unwrap();
        store
            .append_chat(record.id, ChatRole::Assistant, "Expenses sum to 420.")
            .unwrap();

        let history = store.chat_history(record.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[test]
    fn test_list_files_newest_first() {
        let store = ReportStore::new();
        let a = store.create_file(1, "a.csv", "ka", "ua", 0, "text/csv");
        let b = store.create_file(1, "b.csv", "kb", "ub", 0, "text/csv");

        let listed = store.list_files();
        assert_eq!(listed.len(), 2);
        // Same-instant uploads fall back to id order, newest id first.
        assert_eq!(listed[0].id.max(listed[1].id), listed[0].id);
        assert!(listed.iter().any(|r| r.id == a.id));
        assert!(listed.iter().any(|r| r.id == b.id));
    }
}
