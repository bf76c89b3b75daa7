//! In-memory query layer over a fetched preview / 预览数据的内存查询层
//!
//! Everything here is pure: no I/O, inputs are never modified.

pub mod filter;
pub mod summary;

pub use filter::{
    apply_filters, distinct_values, filter_by_membership, filter_by_substring, FilterSpec,
    Predicate,
};
pub use summary::{summarize, ColumnSummary, SummaryReport};

use crate::dataset::PreviewDataset;
use crate::error::Result;

/// MIME type of exported previews / 导出文件的MIME类型
pub const CSV_MIME: &str = "text/csv; charset=utf-8";

/// Serialize a (possibly filtered) preview for download / 序列化预览用于下载
pub fn serialize(dataset: &PreviewDataset) -> Result<Vec<u8>> {
    dataset.to_csv()
}
