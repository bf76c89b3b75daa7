//! Per-column descriptive statistics / 列统计摘要
//!
//! Missing cells are counted separately and never enter numeric stats.
//! Text cells inside a numeric column are counted but not averaged.

use serde::Serialize;
use std::collections::HashMap;

use crate::dataset::{ColumnKind, PreviewDataset, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    /// Non-missing cells / 非缺失值数量
    pub count: usize,
    pub missing: usize,
    pub distinct: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Sample standard deviation / 样本标准差
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p75: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Most frequent value (text columns) / 出现最多的值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
}

impl SummaryReport {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Summarize every column / 统计所有列
pub fn summarize(dataset: &PreviewDataset) -> SummaryReport {
    let columns = dataset
        .columns()
        .iter()
        .zip(dataset.kinds())
        .enumerate()
        .map(|(idx, (name, kind))| summarize_column(dataset, idx, name, *kind))
        .collect();

    SummaryReport {
        row_count: dataset.row_count(),
        columns,
    }
}

fn summarize_column(dataset: &PreviewDataset, idx: usize, name: &str, kind: ColumnKind) -> ColumnSummary {
    let cells: Vec<&Value> = dataset.rows().iter().map(|row| &row[idx]).collect();
    let missing = cells.iter().filter(|v| v.is_missing()).count();

    // 按首次出现顺序计数，频次相同时取先出现的值
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in cells.iter().filter(|v| !v.is_missing()) {
        let key = value.display();
        let entry = counts.entry(key.clone()).or_insert(0);
        if *entry == 0 {
            order.push(key);
        }
        *entry += 1;
    }

    let mut summary = ColumnSummary {
        name: name.to_string(),
        kind,
        count: cells.len() - missing,
        missing,
        distinct: order.len(),
        mean: None,
        std: None,
        min: None,
        p25: None,
        median: None,
        p75: None,
        max: None,
        top: None,
        freq: None,
    };

    match kind {
        ColumnKind::Number => {
            let mut values: Vec<f64> = cells.iter().filter_map(|v| v.as_number()).collect();
            if values.is_empty() {
                return summary;
            }
            values.sort_by(|a, b| a.total_cmp(b));
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            summary.mean = Some(mean);
            if values.len() > 1 {
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                summary.std = Some(var.sqrt());
            }
            summary.min = values.first().copied();
            summary.p25 = Some(quantile(&values, 0.25));
            summary.median = Some(quantile(&values, 0.5));
            summary.p75 = Some(quantile(&values, 0.75));
            summary.max = values.last().copied();
        }
        ColumnKind::Text => {
            let mut best: Option<(&String, usize)> = None;
            for key in &order {
                let count = counts[key];
                if best.map_or(true, |(_, c)| count > c) {
                    best = Some((key, count));
                }
            }
            if let Some((top, freq)) = best {
                summary.top = Some(top.clone());
                summary.freq = Some(freq);
            }
        }
    }

    summary
}

/// Linear interpolation between closest ranks, `sorted` must be non-empty
/// 线性插值分位数
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PreviewDataset {
        PreviewDataset::read_csv(
            "id,name,amount,note\n1,Alice,10,\n2,Bob,,x\n3,Alice,20,\n4,Carl,n/a,\n5,Bob,30,y\n".as_bytes(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_column() {
        let report = summarize(&sample());
        assert_eq!(report.row_count, 5);

        let amount = report.column("amount").unwrap();
        assert_eq!(amount.kind, ColumnKind::Number);
        assert_eq!(amount.count, 4);
        assert_eq!(amount.missing, 1);
        assert_eq!(amount.distinct, 4);
        assert_eq!(amount.mean, Some(20.0));
        assert_eq!(amount.std, Some(10.0));
        assert_eq!(amount.min, Some(10.0));
        assert_eq!(amount.p25, Some(15.0));
        assert_eq!(amount.median, Some(20.0));
        assert_eq!(amount.p75, Some(25.0));
        assert_eq!(amount.max, Some(30.0));
        assert_eq!(amount.top, None);

        let id = report.column("id").unwrap();
        assert_eq!(id.mean, Some(3.0));
        assert_eq!(id.median, Some(3.0));
    }

    #[test]
    fn test_text_column() {
        let report = summarize(&sample());
        let name = report.column("name").unwrap();
        assert_eq!(name.kind, ColumnKind::Text);
        assert_eq!(name.count, 5);
        assert_eq!(name.distinct, 3);
        assert_eq!(name.top.as_deref(), Some("Alice"));
        assert_eq!(name.freq, Some(2));
        assert_eq!(name.mean, None);

        let note = report.column("note").unwrap();
        assert_eq!(note.count, 2);
        assert_eq!(note.missing, 3);
    }

    #[test]
    fn test_all_missing_and_empty() {
        let ds = PreviewDataset::read_csv("a,b\n,\n,\n".as_bytes(), None).unwrap();
        let report = summarize(&ds);
        let a = report.column("a").unwrap();
        assert_eq!(a.count, 0);
        assert_eq!(a.missing, 2);
        assert_eq!(a.top, None);

        let empty = PreviewDataset::read_csv("a,b\n".as_bytes(), None).unwrap();
        let report = summarize(&empty);
        assert_eq!(report.row_count, 0);
        assert_eq!(report.columns.len(), 2);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let ds = PreviewDataset::read_csv("x\n4\n".as_bytes(), None).unwrap();
        let x = summarize(&ds).columns.remove(0);
        assert_eq!(x.mean, Some(4.0));
        assert_eq!(x.std, None);
        assert_eq!(x.p75, Some(4.0));
    }
}
