//! Row filters / 行过滤
//!
//! Cells are compared through their display string, so numbers match the
//! way they are exported. An empty keyword or an empty selection means
//! "no filter": the dataset comes back unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::dataset::PreviewDataset;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Case-insensitive substring / 不区分大小写的子串匹配
    Contains(String),
    /// Value is one of the selected values / 值属于所选集合
    OneOf(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    pub column: String,
    pub predicate: Predicate,
}

impl FilterSpec {
    pub fn contains(column: &str, keyword: &str) -> Self {
        Self {
            column: column.to_string(),
            predicate: Predicate::Contains(keyword.to_string()),
        }
    }

    pub fn one_of<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.to_string(),
            predicate: Predicate::OneOf(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// Keep rows whose `column` contains `keyword` (case-insensitive) / 保留包含关键字的行
pub fn filter_by_substring(
    dataset: &PreviewDataset,
    column: &str,
    keyword: &str,
) -> Result<PreviewDataset> {
    let idx = dataset.column_index(column)?;
    if keyword.is_empty() {
        return Ok(dataset.clone());
    }
    let needle = keyword.to_lowercase();
    let rows = dataset
        .rows()
        .iter()
        .filter(|row| row[idx].display().to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Ok(dataset.with_rows(rows))
}

/// Keep rows whose `column` value is in `allowed` / 保留值在集合中的行
pub fn filter_by_membership(
    dataset: &PreviewDataset,
    column: &str,
    allowed: &BTreeSet<String>,
) -> Result<PreviewDataset> {
    let idx = dataset.column_index(column)?;
    if allowed.is_empty() {
        return Ok(dataset.clone());
    }
    let rows = dataset
        .rows()
        .iter()
        .filter(|row| allowed.contains(&row[idx].display()))
        .cloned()
        .collect();
    Ok(dataset.with_rows(rows))
}

/// Apply filters left to right / 依次应用过滤条件
pub fn apply_filters(dataset: &PreviewDataset, filters: &[FilterSpec]) -> Result<PreviewDataset> {
    let mut current = dataset.clone();
    for spec in filters {
        current = match &spec.predicate {
            Predicate::Contains(keyword) => filter_by_substring(&current, &spec.column, keyword)?,
            Predicate::OneOf(values) => filter_by_membership(&current, &spec.column, values)?,
        };
    }
    Ok(current)
}

/// Sorted distinct non-missing values of a column, for building a selection list
/// 列的去重取值（排序），用于多选框
pub fn distinct_values(dataset: &PreviewDataset, column: &str) -> Result<Vec<String>> {
    let idx = dataset.column_index(column)?;
    let values: BTreeSet<String> = dataset
        .rows()
        .iter()
        .filter(|row| !row[idx].is_missing())
        .map(|row| row[idx].display())
        .collect();
    Ok(values.into_iter().collect())
}
