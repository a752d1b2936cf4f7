use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A raw spreadsheet cell as read from a source sheet.
///
/// Values are type-sensitive: `Number(5.0)` and `Text("5")` are different keys
/// when counting duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(OrderedFloat<f64>),
    Text(String),
}

impl CellValue {
    pub fn number(n: f64) -> Self {
        CellValue::Number(OrderedFloat(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Parse a field from a delimited text source. Empty fields become `Empty`.
    /// A field becomes a number only when the number displays exactly as the field
    /// does, so codes like `007` or `0005E2` stay text. Everything else is kept
    /// verbatim as text.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            return CellValue::Empty;
        }
        let trimmed = field.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && CellValue::number(n).to_string() == trimmed => {
                CellValue::number(n)
            }
            _ => CellValue::Text(field.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => {
                let n = n.into_inner();
                // Integers without decimals
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}
