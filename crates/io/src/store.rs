// Record store backed by a single SQLite file
//
// The table layout is shared with databases written by earlier PSCXL releases:
// one row per (workbook_name, sheet_name, value), quantity and stacked as integers.

use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use pscxl_engine::record::{Record, RecordEdit, RecordKey, SheetGroup};

use crate::error::StorageError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS workbooks (
    workbook_name TEXT,
    sheet_name TEXT,
    value TEXT,
    quantity INTEGER,
    stacked INTEGER,               -- 0 = plain, 1 = stacked label
    PRIMARY KEY (workbook_name, sheet_name, value)
);
"#;

/// Outcome of a bulk write for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Records removed before inserting (replace only).
    pub cleared: usize,
    pub inserted: usize,
    /// Values that already had a record and were left untouched.
    pub skipped: usize,
}

pub struct RecordStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Open (or create) the store at `path`, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened record store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path: None })
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the record unless one already exists for the key.
    /// Returns `false` when the key was taken; the existing record is not modified.
    pub fn insert_if_absent(
        &self,
        source: &str,
        sheet: &str,
        value: &str,
        quantity: u32,
        stacked: bool,
    ) -> Result<bool, StorageError> {
        check_quantity(quantity)?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO workbooks (workbook_name, sheet_name, value, quantity, stacked)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![source, sheet, value, quantity as i64, stacked as i32],
        )?;
        debug!(source, sheet, value, quantity, stacked, inserted = changed == 1, "insert_if_absent");
        Ok(changed == 1)
    }

    /// Remove every record of `source`. Returns how many were removed.
    pub fn clear_source(&self, source: &str) -> Result<usize, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM workbooks WHERE workbook_name = ?1", params![source])?;
        debug!(source, removed, "cleared source");
        Ok(removed)
    }

    /// Replace value, quantity and stacked flag of the record at `key`.
    ///
    /// Fails with `NotFound` when no record matches. Renaming onto a value that already
    /// has a record violates the primary key and fails without changing anything.
    pub fn update(&self, key: &RecordKey, new: &Record) -> Result<(), StorageError> {
        check_quantity(new.quantity)?;
        let changed = self.conn.execute(
            "UPDATE workbooks SET value = ?1, quantity = ?2, stacked = ?3
             WHERE workbook_name = ?4 AND sheet_name = ?5 AND value = ?6",
            params![
                new.value,
                new.quantity as i64,
                new.stacked as i32,
                key.source,
                key.sheet,
                key.value
            ],
        )?;
        if changed == 0 {
            return Err(not_found(key));
        }
        debug!(source = %key.source, sheet = %key.sheet, from = %key.value, to = %new.value, "updated record");
        Ok(())
    }

    /// Apply a partial edit to the record at `key` and return the stored result.
    pub fn edit(&self, key: &RecordKey, edit: &RecordEdit) -> Result<Record, StorageError> {
        let current = self.get(key)?.ok_or_else(|| not_found(key))?;
        let updated = edit.apply(&current);
        self.update(key, &updated)?;
        Ok(updated)
    }

    /// Remove the record at `key`. Returns `false` when there was none.
    pub fn delete(&self, key: &RecordKey) -> Result<bool, StorageError> {
        let removed = self.conn.execute(
            "DELETE FROM workbooks WHERE workbook_name = ?1 AND sheet_name = ?2 AND value = ?3",
            params![key.source, key.sheet, key.value],
        )?;
        debug!(source = %key.source, sheet = %key.sheet, value = %key.value, removed, "delete");
        Ok(removed > 0)
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<Record>, StorageError> {
        let record = self
            .conn
            .query_row(
                "SELECT value, quantity, stacked FROM workbooks
                 WHERE workbook_name = ?1 AND sheet_name = ?2 AND value = ?3",
                params![key.source, key.sheet, key.value],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Distinct source names, sorted.
    pub fn list_sources(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT workbook_name FROM workbooks ORDER BY workbook_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Distinct sheet names of one source, sorted.
    pub fn list_sheets(&self, source: &str) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT sheet_name FROM workbooks WHERE workbook_name = ?1 ORDER BY sheet_name",
        )?;
        let names = stmt
            .query_map(params![source], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Records of one source sheet, sorted by value.
    pub fn list_records(&self, source: &str, sheet: &str) -> Result<Vec<Record>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT value, quantity, stacked FROM workbooks
             WHERE workbook_name = ?1 AND sheet_name = ?2 ORDER BY value",
        )?;
        let records = stmt
            .query_map(params![source, sheet], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Every record grouped by (source, sheet), read in one query.
    pub fn snapshot(&self) -> Result<Vec<SheetGroup>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT workbook_name, sheet_name, value, quantity, stacked FROM workbooks
             ORDER BY workbook_name, sheet_name, value",
        )?;
        let rows = stmt.query_map([], |row| {
            let source: String = row.get(0)?;
            let sheet: String = row.get(1)?;
            let quantity: i64 = row.get(3)?;
            let stacked: i64 = row.get(4)?;
            Ok((
                source,
                sheet,
                Record {
                    value: row.get(2)?,
                    quantity: quantity_from_db(quantity),
                    stacked: stacked != 0,
                },
            ))
        })?;

        let mut groups: Vec<SheetGroup> = Vec::new();
        for row in rows {
            let (source, sheet, record) = row?;
            match groups.last_mut() {
                Some(last) if last.source == source && last.sheet == sheet => last.records.push(record),
                _ => groups.push(SheetGroup {
                    source,
                    sheet,
                    records: vec![record],
                }),
            }
        }
        Ok(groups)
    }

    /// Clear `source` and store `sheets` in a single transaction.
    pub fn replace_source(
        &mut self,
        source: &str,
        sheets: &[(String, Vec<Record>)],
    ) -> Result<BulkOutcome, StorageError> {
        self.write_bulk(source, sheets, true)
    }

    /// Insert-if-absent every record of `sheets` in a single transaction.
    pub fn insert_all(
        &mut self,
        source: &str,
        sheets: &[(String, Vec<Record>)],
    ) -> Result<BulkOutcome, StorageError> {
        self.write_bulk(source, sheets, false)
    }

    fn write_bulk(
        &mut self,
        source: &str,
        sheets: &[(String, Vec<Record>)],
        clear_first: bool,
    ) -> Result<BulkOutcome, StorageError> {
        for (_, records) in sheets {
            for record in records {
                check_quantity(record.quantity)?;
            }
        }

        let mut outcome = BulkOutcome::default();
        let tx = self.conn.transaction()?;
        if clear_first {
            outcome.cleared =
                tx.execute("DELETE FROM workbooks WHERE workbook_name = ?1", params![source])?;
        }
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO workbooks (workbook_name, sheet_name, value, quantity, stacked)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (sheet, records) in sheets {
                for record in records {
                    let changed = stmt.execute(params![
                        source,
                        sheet,
                        record.value,
                        record.quantity as i64,
                        record.stacked as i32
                    ])?;
                    if changed == 1 {
                        outcome.inserted += 1;
                    } else {
                        outcome.skipped += 1;
                    }
                }
            }
        }
        tx.commit()?;

        debug!(
            source,
            cleared = outcome.cleared,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "bulk write committed"
        );
        Ok(outcome)
    }

    /// Print every table of the database: its name, column names and all rows.
    pub fn dump(&self, out: &mut impl Write) -> Result<(), StorageError> {
        let tables: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            names
        };

        for table in tables {
            let quoted = format!("\"{}\"", table.replace('"', "\"\""));
            writeln!(out, "Table: {}", table)?;

            let columns: Vec<String> = {
                let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<Vec<_>, _>>()?;
                names
            };
            writeln!(out, "Columns: {}", columns.join(", "))?;

            let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", quoted))?;
            let width = stmt.column_count();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut fields = Vec::with_capacity(width);
                for i in 0..width {
                    fields.push(format_sql_value(row.get_ref(i)?));
                }
                writeln!(out, "({})", fields.join(", "))?;
            }

            writeln!(out, "{}", "-".repeat(40))?;
        }
        Ok(())
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let quantity: i64 = row.get(1)?;
    let stacked: i64 = row.get(2)?;
    Ok(Record {
        value: row.get(0)?,
        quantity: quantity_from_db(quantity),
        stacked: stacked != 0,
    })
}

// Rows written by older releases may carry a zero quantity
fn quantity_from_db(quantity: i64) -> u32 {
    u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)
}

fn check_quantity(quantity: u32) -> Result<(), StorageError> {
    if quantity == 0 {
        return Err(StorageError::InvalidQuantity(quantity));
    }
    Ok(())
}

fn not_found(key: &RecordKey) -> StorageError {
    StorageError::NotFound {
        source_name: key.source.clone(),
        sheet: key.sheet.clone(),
        value: key.value.clone(),
    }
}

fn format_sql_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(source: &str, sheet: &str, value: &str) -> RecordKey {
        RecordKey::new(source, sheet, value)
    }

    fn record_count(store: &RecordStore) -> usize {
        store.snapshot().unwrap().iter().map(|g| g.records.len()).sum()
    }

    fn seeded() -> RecordStore {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_if_absent("wb1", "Front", "A B", 2, true).unwrap();
        store.insert_if_absent("wb1", "Front", "X", 1, false).unwrap();
        store.insert_if_absent("wb1", "Back", "Y", 4, false).unwrap();
        store.insert_if_absent("wb2", "Front", "Z", 3, false).unwrap();
        store
    }

    #[test]
    fn test_insert_if_absent_keeps_first_quantity() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(store.insert_if_absent("wb", "S", "A", 2, false).unwrap());
        assert!(!store.insert_if_absent("wb", "S", "A", 9, true).unwrap());

        let records = store.list_records("wb", "S").unwrap();
        assert_eq!(records, vec![Record::new("A", 2, false)]);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let store = RecordStore::open_in_memory().unwrap();
        let err = store.insert_if_absent("wb", "S", "A", 0, false).unwrap_err();
        assert!(matches!(err, StorageError::InvalidQuantity(0)));
        assert_eq!(record_count(&store), 0);
    }

    #[test]
    fn test_listing() {
        let store = seeded();
        assert_eq!(store.list_sources().unwrap(), vec!["wb1", "wb2"]);
        assert_eq!(store.list_sheets("wb1").unwrap(), vec!["Back", "Front"]);
        assert!(store.list_sheets("missing").unwrap().is_empty());
        assert_eq!(
            store.list_records("wb1", "Front").unwrap(),
            vec![Record::new("A B", 2, true), Record::new("X", 1, false)]
        );
    }

    #[test]
    fn test_update_missing_reports_not_found() {
        let store = seeded();
        let before = store.list_records("wb1", "Front").unwrap();

        let err = store
            .update(&key("wb1", "Front", "nope"), &Record::new("new", 5, false))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert_eq!(store.list_records("wb1", "Front").unwrap(), before);
    }

    #[test]
    fn test_update_replaces_fields() {
        let store = seeded();
        store
            .update(&key("wb1", "Front", "X"), &Record::new("X Y", 7, true))
            .unwrap();
        assert_eq!(
            store.list_records("wb1", "Front").unwrap(),
            vec![Record::new("A B", 2, true), Record::new("X Y", 7, true)]
        );
    }

    #[test]
    fn test_update_onto_existing_value_is_storage_fault() {
        let store = seeded();
        let before = store.list_records("wb1", "Front").unwrap();
        let err = store
            .update(&key("wb1", "Front", "X"), &Record::new("A B", 1, false))
            .unwrap_err();
        assert!(matches!(err, StorageError::Sqlite(_)));
        assert_eq!(store.list_records("wb1", "Front").unwrap(), before);
    }

    #[test]
    fn test_edit_partial() {
        let store = seeded();
        let edit = RecordEdit {
            stacked: Some(false),
            ..Default::default()
        };
        let updated = store.edit(&key("wb1", "Front", "A B"), &edit).unwrap();
        assert_eq!(updated, Record::new("A B", 2, false));
        assert_eq!(store.get(&key("wb1", "Front", "A B")).unwrap(), Some(updated));

        let err = store.edit(&key("wb1", "Front", "nope"), &edit).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let store = seeded();
        assert!(store.delete(&key("wb1", "Front", "A B")).unwrap());
        assert_eq!(
            store.list_records("wb1", "Front").unwrap(),
            vec![Record::new("X", 1, false)]
        );
        assert_eq!(store.list_records("wb1", "Back").unwrap(), vec![Record::new("Y", 4, false)]);
        assert_eq!(store.list_records("wb2", "Front").unwrap(), vec![Record::new("Z", 3, false)]);

        // Absent key is a no-op
        assert!(!store.delete(&key("wb1", "Front", "A B")).unwrap());
        assert_eq!(record_count(&store), 3);
    }

    #[test]
    fn test_clear_source_only_touches_that_source() {
        let store = seeded();
        assert_eq!(store.clear_source("wb1").unwrap(), 3);
        assert_eq!(store.list_sources().unwrap(), vec!["wb2"]);
        assert_eq!(store.list_records("wb2", "Front").unwrap(), vec![Record::new("Z", 3, false)]);
        assert_eq!(store.clear_source("wb1").unwrap(), 0);
    }

    #[test]
    fn test_snapshot_groups_by_source_and_sheet() {
        let store = seeded();
        let groups = store.snapshot().unwrap();
        let keys: Vec<(&str, &str, usize)> = groups
            .iter()
            .map(|g| (g.source.as_str(), g.sheet.as_str(), g.records.len()))
            .collect();
        assert_eq!(keys, vec![("wb1", "Back", 1), ("wb1", "Front", 2), ("wb2", "Front", 1)]);
    }

    #[test]
    fn test_replace_source_and_insert_all() {
        let mut store = seeded();
        let fresh = vec![("Front".to_string(), vec![Record::new("X", 5, false), Record::new("N", 1, false)])];

        let outcome = store.insert_all("wb1", &fresh).unwrap();
        assert_eq!(outcome, BulkOutcome { cleared: 0, inserted: 1, skipped: 1 });
        assert_eq!(store.get(&key("wb1", "Front", "X")).unwrap().unwrap().quantity, 1);

        let outcome = store.replace_source("wb1", &fresh).unwrap();
        assert_eq!(outcome, BulkOutcome { cleared: 4, inserted: 2, skipped: 0 });
        assert_eq!(store.get(&key("wb1", "Front", "X")).unwrap().unwrap().quantity, 5);
        assert_eq!(store.list_sheets("wb1").unwrap(), vec!["Front"]);
        assert_eq!(store.list_sources().unwrap(), vec!["wb1", "wb2"]);
    }

    #[test]
    fn test_bulk_write_rejects_zero_quantity_without_clearing() {
        let mut store = seeded();
        let bad = vec![("Front".to_string(), vec![Record::new("X", 0, false)])];
        assert!(store.replace_source("wb1", &bad).is_err());
        assert_eq!(record_count(&store), 4);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("pscxl.db");
        {
            let store = RecordStore::open(&path).unwrap();
            store.insert_if_absent("wb", "S", "A", 3, false).unwrap();
        }
        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.list_records("wb", "S").unwrap(), vec![Record::new("A", 3, false)]);
    }

    #[test]
    fn test_dump_lists_tables_columns_rows() {
        let store = RecordStore::open_in_memory().unwrap();
        store.insert_if_absent("wb", "S", "A B", 2, true).unwrap();

        let mut out = Vec::new();
        store.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Table: workbooks"));
        assert!(text.contains("Columns: workbook_name, sheet_name, value, quantity, stacked"));
        assert!(text.contains("('wb', 'S', 'A B', 2, 1)"));
        assert!(text.contains(&"-".repeat(40)));
    }
}
