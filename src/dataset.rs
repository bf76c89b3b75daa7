//! Preview dataset / 预览数据集
//!
//! Column typing policy / 列类型推断规则:
//! - a cell that is empty after trimming is `Missing`
//! - a cell that parses as a finite number is numeric, anything else is text
//! - a column is `Number` when it has at least one numeric cell and more
//!   numeric cells than text cells, otherwise `Text`
//! - in a `Number` column the minority text cells stay `Text`; in a `Text`
//!   column every non-empty cell keeps its raw string

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::io::Read;

use crate::error::{PreviewError, Result};

/// Largest integer an f64 holds exactly (2^53) / f64 可精确表示的最大整数
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single cell / 单元格值
///
/// Numeric cells keep their source text; `value` is only used for statistics.
/// 数值单元格保留原始文本，数值仅用于统计
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number { value: f64, raw: String },
    Text(String),
    Missing,
}

impl Value {
    pub fn number(value: f64, raw: impl Into<String>) -> Self {
        Value::Number {
            value,
            raw: raw.into(),
        }
    }

    /// String form used for filtering and export / 用于过滤和导出的字符串形式
    pub fn display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number { raw, .. } => raw.clone(),
            Value::Missing => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// Integer literal whose digits an f64 would change / f64 无法精确表示的整数
fn is_lossy_integer(value: f64, raw: &str) -> bool {
    let digits = raw.trim().trim_start_matches(['+', '-']);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) && value.abs() > MAX_EXACT_INTEGER
}

// JSON numbers for ordinary values, the source text for integers beyond 2^53
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Number { value, raw } if is_lossy_integer(*value, raw) => serializer.serialize_str(raw),
            Value::Number { value, .. } => serializer.serialize_f64(*value),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Missing => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Text,
}

/// In-memory table holding at most `row_limit` rows / 最多包含 row_limit 行的内存表
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewDataset {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    rows: Vec<Vec<Value>>,
    row_limit: Option<usize>,
}

impl PreviewDataset {
    /// Build from raw string cells, inferring column kinds / 从原始字符串构建并推断列类型
    /// Short rows are padded with missing cells, long rows are cut. / 行长度对齐到列数
    pub fn from_raw(columns: Vec<String>, raw_rows: Vec<Vec<String>>, row_limit: Option<usize>) -> Self {
        let columns = dedupe_columns(columns);
        let width = columns.len();

        let mut numeric = vec![0usize; width];
        let mut textual = vec![0usize; width];
        for row in &raw_rows {
            for (idx, cell) in row.iter().take(width).enumerate() {
                match classify(cell) {
                    Cell::Number(_) => numeric[idx] += 1,
                    Cell::Text => textual[idx] += 1,
                    Cell::Missing => {}
                }
            }
        }
        let kinds: Vec<ColumnKind> = (0..width)
            .map(|idx| {
                if numeric[idx] > 0 && numeric[idx] > textual[idx] {
                    ColumnKind::Number
                } else {
                    ColumnKind::Text
                }
            })
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                kinds
                    .iter()
                    .map(|kind| match cells.next() {
                        Some(raw) => convert(raw, *kind),
                        None => Value::Missing,
                    })
                    .collect()
            })
            .collect();

        Self {
            columns,
            kinds,
            rows,
            row_limit,
        }
    }

    /// Same shape, different rows / 相同结构、不同行
    pub(crate) fn with_rows(&self, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: self.columns.clone(),
            kinds: self.kinds.clone(),
            rows,
            row_limit: self.row_limit,
        }
    }

    /// Parse CSV (header row + data rows), stopping after `row_limit` rows
    /// 解析CSV，读满 row_limit 行后立即停止
    pub fn read_csv<R: Read>(reader: R, row_limit: Option<usize>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let mut raw_rows = Vec::new();
        let mut record = csv::StringRecord::new();
        while row_limit.map_or(true, |limit| raw_rows.len() < limit) {
            if !rdr.read_record(&mut record)? {
                break;
            }
            raw_rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(Self::from_raw(headers, raw_rows, row_limit))
    }

    /// Render as CSV bytes (header + rows) / 导出为CSV字节
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        if self.columns.is_empty() {
            return Ok(Vec::new());
        }
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.display()))?;
        }
        writer.into_inner().map_err(|e| PreviewError::MalformedData {
            row: None,
            byte: None,
            message: e.to_string(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.row_limit
    }

    /// Whether the fetch stopped because the limit was reached / 是否因达到行数上限而停止
    pub fn limit_reached(&self) -> bool {
        self.row_limit.map_or(false, |limit| self.rows.len() >= limit)
    }

    /// Index of a column or `UnknownColumn` / 获取列索引
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PreviewError::UnknownColumn(column.to_string()))
    }

    /// Cell by row index and column name / 按行号和列名取值
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

enum Cell {
    Number(f64),
    Text,
    Missing,
}

fn classify(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text,
    }
}

fn convert(raw: String, kind: ColumnKind) -> Value {
    match (classify(&raw), kind) {
        (Cell::Missing, _) => Value::Missing,
        (Cell::Number(n), ColumnKind::Number) => Value::Number { value: n, raw },
        _ => Value::Text(raw),
    }
}

/// Duplicate header names become `name.1`, `name.2` / 重复列名追加序号
fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    columns
        .into_iter()
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let mut n = 1;
            loop {
                let candidate = format!("{}.{}", name, n);
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "id,name,amount\n1,Alice,10.5\n2,Bob,\n3,Carl,7\n";

    #[test]
    fn test_read_csv_limit() {
        let ds = PreviewDataset::read_csv(SAMPLE.as_bytes(), Some(2)).unwrap();
        assert_eq!(ds.columns(), &["id", "name", "amount"]);
        assert_eq!(ds.row_count(), 2);
        assert!(ds.limit_reached());
        assert_eq!(ds.get(0, "name"), Some(&Value::Text("Alice".into())));
        assert_eq!(ds.get(1, "name"), Some(&Value::Text("Bob".into())));
    }

    #[test]
    fn test_inference() {
        let ds = PreviewDataset::read_csv(SAMPLE.as_bytes(), None).unwrap();
        assert_eq!(
            ds.kinds(),
            &[ColumnKind::Number, ColumnKind::Text, ColumnKind::Number]
        );
        assert_eq!(ds.get(0, "amount"), Some(&Value::number(10.5, "10.5")));
        assert_eq!(ds.get(1, "amount"), Some(&Value::Missing));
        assert!(!ds.limit_reached());

        // 多数为文本的列保持文本
        let ds = PreviewDataset::read_csv("code\nA1\n42\nB7\n".as_bytes(), None).unwrap();
        assert_eq!(ds.kinds(), &[ColumnKind::Text]);
        assert_eq!(ds.get(1, "code"), Some(&Value::Text("42".into())));

        // 多数为数字的列中少数文本保留原值
        let ds = PreviewDataset::read_csv("n\n1\n2\nn/a\n".as_bytes(), None).unwrap();
        assert_eq!(ds.kinds(), &[ColumnKind::Number]);
        assert_eq!(ds.get(2, "n"), Some(&Value::Text("n/a".into())));
    }

    #[test]
    fn test_nan_and_inf_are_text() {
        let ds = PreviewDataset::read_csv("x\nNaN\ninf\n".as_bytes(), None).unwrap();
        assert_eq!(ds.kinds(), &[ColumnKind::Text]);
    }

    #[test]
    fn test_unequal_lengths_is_malformed() {
        let err = PreviewDataset::read_csv("a,b\n1,2\n3\n".as_bytes(), None).unwrap_err();
        match err {
            PreviewError::MalformedData { row, .. } => assert_eq!(row, Some(3)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let data: &[u8] = b"a,b\n\xff\xfe,1\n";
        assert!(matches!(
            PreviewDataset::read_csv(data, None),
            Err(PreviewError::MalformedData { .. })
        ));
    }

    #[test]
    fn test_duplicate_headers() {
        let ds = PreviewDataset::read_csv("a,a,b,a\n1,2,3,4\n".as_bytes(), None).unwrap();
        assert_eq!(ds.columns(), &["a", "a.1", "b", "a.2"]);
        assert_eq!(ds.get(0, "a.2"), Some(&Value::number(4.0, "4")));
    }

    #[test]
    fn test_empty_object() {
        let ds = PreviewDataset::read_csv("".as_bytes(), Some(10)).unwrap();
        assert!(ds.columns().is_empty());
        assert_eq!(ds.row_count(), 0);
        assert!(ds.to_csv().unwrap().is_empty());
    }

    #[test]
    fn test_to_csv_round_trip() {
        let input = "id,name,note,amount\n1,\"Smith, J\",\"said \"\"hi\"\"\",3.25\n2,Ann,,-4\n3, padded ,x,1e3\n";
        let ds = PreviewDataset::read_csv(input.as_bytes(), None).unwrap();
        let bytes = ds.to_csv().unwrap();
        let back = PreviewDataset::read_csv(&bytes[..], None).unwrap();

        assert_eq!(back.columns(), ds.columns());
        assert_eq!(back.row_count(), ds.row_count());
        assert_eq!(back.rows(), ds.rows());
        assert_eq!(back.get(0, "name"), Some(&Value::Text("Smith, J".into())));
        assert_eq!(back.get(1, "name"), Some(&Value::Text("Ann".into())));
        assert_eq!(back.get(2, "name"), Some(&Value::Text(" padded ".into())));

        // 输出稳定
        assert_eq!(ds.to_csv().unwrap(), bytes);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "id,name,note,amount\n1,\"Smith, J\",\"said \"\"hi\"\"\",3.25\n2,Ann,,-4\n3, padded ,x,1e3\n"
        );
    }

    #[test]
    fn test_large_integers_keep_their_digits() {
        let input = "id,amount
9007199254740993,1
12345678901234567891,2
";
        let ds = PreviewDataset::read_csv(input.as_bytes(), None).unwrap();
        assert_eq!(ds.kinds()[0], ColumnKind::Number);
        assert_eq!(ds.get(0, "id").unwrap().display(), "9007199254740993");
        assert_eq!(ds.get(1, "id").unwrap().display(), "12345678901234567891");
        assert_eq!(ds.to_csv().unwrap(), input.as_bytes());

        // JSON keeps the digits as a string, small numbers stay numbers
        let json = serde_json::to_value(ds.rows()).unwrap();
        assert_eq!(json, serde_json::json!([["9007199254740993", 1.0], ["12345678901234567891", 2.0]]));
    }
}
