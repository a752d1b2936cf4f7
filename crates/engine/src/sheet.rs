use crate::cell::CellValue;

/// One named grid read from a source, rows in row-major order from the first row.
/// Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Drop the first `n` rows (header rows). Dropping more rows than exist leaves an empty sheet.
    pub fn without_header(mut self, n: usize) -> Self {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
        self
    }
}

/// A whole ingested file: its source name and every sheet in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceData {
    pub name: String,
    pub sheets: Vec<SheetData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SheetData {
        SheetData::new(
            "Labels",
            vec![
                vec![CellValue::text("Value")],
                vec![CellValue::text("A"), CellValue::Empty, CellValue::number(1.0)],
                vec![],
            ],
        )
    }

    #[test]
    fn test_without_header() {
        let s = sheet().without_header(1);
        assert_eq!(s.rows.len(), 2);
        assert_eq!(s.rows[0][0], CellValue::text("A"));

        let s = sheet().without_header(10);
        assert!(s.rows.is_empty());
    }
}
