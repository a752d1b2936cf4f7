// Stored label records and the normalisation applied before storage

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::CountMap;
use crate::cell::CellValue;

/// Run of spaces a stacked value is expanded to on export.
pub const DEFAULT_STACK_SPACING: usize = 10;

/// Identity of a record: at most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub source: String,
    pub sheet: String,
    pub value: String,
}

impl RecordKey {
    pub fn new(source: impl Into<String>, sheet: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sheet: sheet.into(),
            value: value.into(),
        }
    }
}

/// A counted label value within one source sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub value: String,
    pub quantity: u32,
    pub stacked: bool,
}

impl Record {
    pub fn new(value: impl Into<String>, quantity: u32, stacked: bool) -> Self {
        Self {
            value: value.into(),
            quantity,
            stacked,
        }
    }
}

/// Requested changes to an existing record. `None` keeps the current field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdit {
    pub value: Option<String>,
    pub quantity: Option<u32>,
    pub stacked: Option<bool>,
}

impl RecordEdit {
    pub fn is_noop(&self) -> bool {
        self.value.is_none() && self.quantity.is_none() && self.stacked.is_none()
    }

    pub fn apply(&self, current: &Record) -> Record {
        Record {
            value: self.value.clone().unwrap_or_else(|| current.value.clone()),
            quantity: self.quantity.unwrap_or(current.quantity),
            stacked: self.stacked.unwrap_or(current.stacked),
        }
    }
}

/// All records of one (source, sheet) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetGroup {
    pub source: String,
    pub sheet: String,
    pub records: Vec<Record>,
}

/// What to do with records already stored for a source that is ingested again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReingestPolicy {
    /// Clear every record of the source, then store the fresh counts.
    #[default]
    Replace,
    /// Only add values not stored yet; existing records keep their quantity.
    KeepExisting,
}

/// Heuristic stacked-label detection: text whose trimmed form still contains a space.
/// Numbers are never stacked.
pub fn is_stacked(value: &CellValue) -> bool {
    match value {
        CellValue::Text(s) => s.trim().contains(' '),
        _ => false,
    }
}

/// Same heuristic for a value already stored as text.
pub fn is_stacked_text(value: &str) -> bool {
    value.trim().contains(' ')
}

/// Turn one sheet's counts into storable records.
///
/// Text is trimmed and numbers rendered through `Display`. Values that collapse to the
/// same stored text (`" A B"` and `"A B"`, or `5` and `"5"`) are merged: quantities add
/// up and the record is stacked if any contributor was. Blank values are dropped.
/// Output is sorted by value.
pub fn normalize(counts: &CountMap) -> Vec<Record> {
    let mut merged: BTreeMap<String, (u32, bool)> = BTreeMap::new();

    for (value, &count) in counts {
        let text = match value {
            CellValue::Empty => continue,
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(_) => value.to_string(),
        };
        if text.is_empty() {
            continue;
        }
        let entry = merged.entry(text).or_insert((0, false));
        entry.0 = entry.0.saturating_add(count);
        entry.1 |= is_stacked(value);
    }

    merged
        .into_iter()
        .map(|(value, (quantity, stacked))| Record { value, quantity, stacked })
        .collect()
}

/// Collapse each run of ten spaces to a single space for display.
pub fn display_value(value: &str) -> String {
    value.replace(&" ".repeat(DEFAULT_STACK_SPACING), " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    #[test]
    fn stacked_heuristic() {
        assert!(is_stacked(&CellValue::text("A B")));
        assert!(is_stacked(&CellValue::text("  A B  ")));
        assert!(!is_stacked(&CellValue::text("  AB  ")));
        assert!(!is_stacked(&CellValue::text(" ")));
        assert!(!is_stacked(&CellValue::number(12.0)));
        assert!(is_stacked_text("L1 L2"));
    }

    #[test]
    fn normalize_trims_and_flags() {
        let rows = vec![vec![
            CellValue::text("A B"),
            CellValue::text("A B"),
            CellValue::text("X"),
        ]];
        let records = normalize(&aggregate(&rows));
        assert_eq!(
            records,
            vec![Record::new("A B", 2, true), Record::new("X", 1, false)]
        );
    }

    #[test]
    fn normalize_merges_collapsing_values() {
        let rows = vec![
            vec![CellValue::text(" A B"), CellValue::text("A B ")],
            vec![CellValue::number(5.0), CellValue::text("5"), CellValue::text("5 ")],
        ];
        let records = normalize(&aggregate(&rows));
        assert_eq!(
            records,
            vec![Record::new("5", 3, false), Record::new("A B", 2, true)]
        );
    }

    #[test]
    fn normalize_drops_blank_text() {
        let rows = vec![vec![CellValue::text("   "), CellValue::text("")]];
        assert!(normalize(&aggregate(&rows)).is_empty());
    }

    #[test]
    fn edit_applies_only_given_fields() {
        let current = Record::new("A B", 2, true);
        let edit = RecordEdit {
            quantity: Some(7),
            ..Default::default()
        };
        assert_eq!(edit.apply(&current), Record::new("A B", 7, true));
        assert!(!edit.is_noop());
        assert!(RecordEdit::default().is_noop());
    }

    #[test]
    fn display_collapses_spacing() {
        assert_eq!(display_value("A          B"), "A B");
        assert_eq!(display_value("A B"), "A B");
        // Twenty spaces collapse to two
        assert_eq!(display_value(&format!("A{}B", " ".repeat(20))), "A  B");
    }
}
