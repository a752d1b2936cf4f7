// Export planning: re-expand stored records into output sheets
//
// The plan is pure data. Writing it to a workbook is the io crate's job.

use std::collections::HashSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::record::{Record, SheetGroup, DEFAULT_STACK_SPACING};

/// Header row written at the top of every output sheet.
pub const HEADER: [&str; 2] = ["Value", "Quantity"];

/// Longest worksheet name Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Data rows that fit in one worksheet below the header row.
pub const MAX_DATA_ROWS: u64 = 1_048_575;

const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// How output sheets are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetNaming {
    /// Sheet name only, qualified by source when two sources share a sheet name.
    #[default]
    Auto,
    /// Sheet name only. Sources sharing a sheet name overwrite each other, last one wins.
    Sheet,
    /// Always `"{source} - {sheet}"`.
    Qualified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub naming: SheetNaming,
    pub stack_spacing: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            naming: SheetNaming::default(),
            stack_spacing: DEFAULT_STACK_SPACING,
        }
    }
}

/// One worksheet to write: the header followed by `rows`, one value per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSheet {
    pub name: String,
    pub source: String,
    pub sheet: String,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPlan {
    pub sheets: Vec<OutputSheet>,
    /// (source sheet name, output sheet name) for sheets written under a different name.
    pub renamed: Vec<(String, String)>,
    /// Output sheet names whose earlier content was replaced by a later source.
    pub overwritten: Vec<String>,
}

impl ExportPlan {
    /// Plan every group. Groups are processed in (source, sheet) order so the
    /// outcome does not depend on the order the store returned them in.
    pub fn build(groups: &[SheetGroup], options: &PlanOptions) -> Self {
        let mut ordered: Vec<&SheetGroup> = groups.iter().collect();
        ordered.sort_by(|a, b| (&a.source, &a.sheet).cmp(&(&b.source, &b.sheet)));

        // How many sources use each sheet name (worksheet names are case-insensitive)
        let mut sheet_uses: FxHashMap<String, usize> = FxHashMap::default();
        for group in &ordered {
            *sheet_uses
                .entry(sanitize_sheet_name(&group.sheet).to_lowercase())
                .or_insert(0) += 1;
        }

        let mut plan = ExportPlan::default();
        let mut taken: HashSet<String> = HashSet::new();

        for group in ordered {
            let qualify = match options.naming {
                SheetNaming::Sheet => false,
                SheetNaming::Qualified => true,
                SheetNaming::Auto => {
                    sheet_uses
                        .get(&sanitize_sheet_name(&group.sheet).to_lowercase())
                        .copied()
                        .unwrap_or(0)
                        > 1
                }
            };
            let base = if qualify {
                sanitize_sheet_name(&format!("{} - {}", group.source, group.sheet))
            } else {
                sanitize_sheet_name(&group.sheet)
            };

            let rows = expand_records(&group.records, options.stack_spacing);

            let key = base.to_lowercase();
            if options.naming == SheetNaming::Sheet && taken.contains(&key) {
                if let Some(existing) = plan.sheets.iter_mut().find(|s| s.name.to_lowercase() == key) {
                    existing.source = group.source.clone();
                    existing.sheet = group.sheet.clone();
                    existing.rows = rows;
                    plan.overwritten.push(existing.name.clone());
                }
                continue;
            }

            let name = unique_sheet_name(&base, &taken);
            taken.insert(name.to_lowercase());
            if name != group.sheet {
                plan.renamed.push((group.sheet.clone(), name.clone()));
            }
            plan.sheets.push(OutputSheet {
                name,
                source: group.source.clone(),
                sheet: group.sheet.clone(),
                rows,
            });
        }

        plan
    }

    /// Data rows across every sheet, headers excluded.
    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|s| s.rows.len()).sum()
    }
}

/// Number of rows `records` expand to, computed without expanding them.
pub fn planned_rows(records: &[Record]) -> u64 {
    records.iter().map(|r| u64::from(r.quantity)).sum()
}

/// Replace every single space with a run of `width` spaces.
pub fn expand_stacked(value: &str, width: usize) -> String {
    value.replace(' ', &" ".repeat(width))
}

/// Each record becomes `quantity` rows of its value. Stacked values are expanded
/// once and the expanded text is reused for every repetition.
pub fn expand_records(records: &[Record], stack_spacing: usize) -> Vec<String> {
    let total: usize = records.iter().map(|r| r.quantity as usize).sum();
    let mut rows = Vec::with_capacity(total);
    for record in records {
        let value = if record.stacked {
            expand_stacked(&record.value, stack_spacing)
        } else {
            record.value.clone()
        };
        rows.extend(std::iter::repeat(value).take(record.quantity as usize));
    }
    rows
}

/// Make `name` usable as a worksheet name: forbidden characters become `_`,
/// the result is cut to 31 characters, then leading/trailing apostrophes are replaced.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect();

    let mut cleaned = replace_edge_apostrophes(cleaned);
    if cleaned.trim().is_empty() {
        cleaned = "Sheet".to_string();
    }
    // Reserved by Excel
    if cleaned.eq_ignore_ascii_case("history") {
        cleaned.push('_');
    }
    cleaned
}

// Apostrophes are one byte, so the edges can be replaced in place
fn replace_edge_apostrophes(mut name: String) -> String {
    if name.starts_with('\'') {
        name.replace_range(..1, "_");
    }
    if name.ends_with('\'') {
        let last = name.len() - 1;
        name.replace_range(last.., "_");
    }
    name
}

fn unique_sheet_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let candidate =
            replace_edge_apostrophes(base.chars().take(keep).chain(suffix.chars()).collect());
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
