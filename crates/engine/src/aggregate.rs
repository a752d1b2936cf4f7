// Duplicate counting over sheet cells

use rustc_hash::FxHashMap;

use crate::cell::CellValue;

/// Occurrence count per distinct non-empty cell value.
pub type CountMap = FxHashMap<CellValue, u32>;

/// Count every non-empty cell across all rows, keyed by the raw cell value.
///
/// Empty cells contribute nothing. Traversal order does not affect the result.
pub fn aggregate<'a, R, C>(rows: R) -> CountMap
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = &'a CellValue>,
{
    let mut counts = CountMap::default();
    for row in rows {
        for cell in row {
            if cell.is_empty() {
                continue;
            }
            *counts.entry(cell.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Keep only values seen at least `min_count` times.
pub fn duplicates(counts: &CountMap, min_count: u32) -> CountMap {
    counts
        .iter()
        .filter(|&(_, &count)| count >= min_count)
        .map(|(value, &count)| (value.clone(), count))
        .collect()
}

/// Counts ordered for presentation: highest count first, ties by value.
pub fn sorted_counts(counts: &CountMap) -> Vec<(&CellValue, u32)> {
    let mut entries: Vec<(&CellValue, u32)> = counts.iter().map(|(v, &c)| (v, c)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}
