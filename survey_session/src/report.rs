//! Per-question summaries of the committed responses.
//!
//! A column in which every non-blank value is a number (the scale questions) gets a mean
//! and a histogram. Every other column gets frequency counts of the exact values.

use std::collections::HashMap;

use log::{debug, warn};

use crate::config::{SCALE_MAX, SCALE_MIN};

/// Labels longer than this are cut for display.
pub const DEFAULT_LABEL_WIDTH: usize = 40;
/// How many entries are shown before the rest is folded away.
pub const DEFAULT_TOP_RESPONSES: usize = 5;
/// Above this number of distinct values, a column is considered free text.
pub const FREE_TEXT_THRESHOLD: usize = 10;

const NUM_BUCKETS: usize = (SCALE_MAX - SCALE_MIN + 1) as usize;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SortOrder {
    /// Highest count first.
    MostPopular,
    /// Lowest count first.
    LeastPopular,
    Alphabetical,
}

impl SortOrder {
    pub fn from_name(name: &str) -> Option<SortOrder> {
        match name {
            "most" | "mostPopular" => Some(SortOrder::MostPopular),
            "least" | "leastPopular" => Some(SortOrder::LeastPopular),
            "alpha" | "alphabetical" => Some(SortOrder::Alphabetical),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SortOrder::MostPopular => "most",
            SortOrder::LeastPopular => "least",
            SortOrder::Alphabetical => "alpha",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct FrequencyEntry {
    /// The full value, used for grouping.
    pub value: String,
    pub count: u64,
    /// Share of all the responses, between 0 and 100.
    pub percentage: f64,
}

impl FrequencyEntry {
    /// The value cut to `width` characters, with `...` appended when it was cut.
    pub fn label(&self, width: usize) -> String {
        if self.value.chars().count() > width {
            let s: String = self.value.chars().take(width).collect();
            format!("{}...", s)
        } else {
            self.value.clone()
        }
    }

    pub fn is_truncated(&self, width: usize) -> bool {
        self.value.chars().count() > width
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct FrequencyReport {
    /// Number of responses, blank ones included.
    pub total: u64,
    pub blank: u64,
    pub entries: Vec<FrequencyEntry>,
}

impl FrequencyReport {
    pub fn sort(&mut self, order: SortOrder) {
        match order {
            SortOrder::MostPopular => self
                .entries
                .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value))),
            SortOrder::LeastPopular => self
                .entries
                .sort_by(|a, b| a.count.cmp(&b.count).then_with(|| a.value.cmp(&b.value))),
            SortOrder::Alphabetical => self.entries.sort_by(|a, b| a.value.cmp(&b.value)),
        }
    }

    /// The first `n` entries in the current order.
    pub fn top(&self, n: usize) -> &[FrequencyEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    /// Too many distinct values for a chart to be useful.
    pub fn is_free_text(&self) -> bool {
        self.distinct() > FREE_TEXT_THRESHOLD
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct NumericReport {
    pub mean: f64,
    /// Counts for the values 1 to 5. Values outside are put in the closest bucket.
    pub histogram: [u64; NUM_BUCKETS],
    /// The values in response order, blanks skipped.
    pub values: Vec<f64>,
    pub blank: u64,
}

#[derive(PartialEq, Debug, Clone)]
pub enum ColumnSummary {
    Frequencies(FrequencyReport),
    Numeric(NumericReport),
}

#[derive(PartialEq, Debug, Clone)]
pub struct ColumnReport {
    pub column: String,
    pub summary: ColumnSummary,
}

/// Summarizes every column of the ledger.
///
/// Arguments:
/// * `header` the column names
/// * `rows` the values, aligned with the header. Missing cells are treated as blank.
/// * `order` the order of the frequency entries
pub fn summarize(header: &[String], rows: &[Vec<String>], order: SortOrder) -> Vec<ColumnReport> {
    debug!(
        "summarize: {} columns, {} rows, order {:?}",
        header.len(),
        rows.len(),
        order
    );
    for (idx, row) in rows.iter().enumerate() {
        if row.len() > header.len() {
            warn!(
                "summarize: row {} has {} cells for {} columns, extra cells ignored",
                idx + 1,
                row.len(),
                header.len()
            );
        }
    }
    header
        .iter()
        .enumerate()
        .map(|(col_idx, column)| {
            let values: Vec<&str> = rows
                .iter()
                .map(|r| r.get(col_idx).map(|s| s.as_str()).unwrap_or(""))
                .collect();
            ColumnReport {
                column: column.clone(),
                summary: summarize_column(&values, order),
            }
        })
        .collect()
}

pub fn summarize_column(values: &[&str], order: SortOrder) -> ColumnSummary {
    let filled: Vec<&str> = values
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let blank = (values.len() - filled.len()) as u64;
    let numbers: Vec<f64> = filled.iter().filter_map(|s| parse_number(s)).collect();
    if !filled.is_empty() && numbers.len() == filled.len() {
        ColumnSummary::Numeric(numeric_report(numbers, blank))
    } else {
        let mut r = frequency_report(values, blank);
        r.sort(order);
        ColumnSummary::Frequencies(r)
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn numeric_report(values: Vec<f64>, blank: u64) -> NumericReport {
    let mut histogram = [0u64; NUM_BUCKETS];
    for v in values.iter() {
        let clamped = v.round().clamp(SCALE_MIN as f64, SCALE_MAX as f64);
        histogram[clamped as usize - SCALE_MIN as usize] += 1;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    NumericReport {
        mean,
        histogram,
        values,
        blank,
    }
}

fn frequency_report(values: &[&str], blank: u64) -> FrequencyReport {
    let total = values.len() as u64;
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for v in values.iter().filter(|s| !s.trim().is_empty()) {
        *counts.entry(*v).or_insert(0) += 1;
    }
    let entries = counts
        .into_iter()
        .map(|(value, count)| FrequencyEntry {
            value: value.to_string(),
            count,
            percentage: 100.0 * count as f64 / total as f64,
        })
        .collect();
    FrequencyReport {
        total,
        blank,
        entries,
    }
}
