//! 历史查询结果模型
//!
//! 序列化形状与查询面一致：原始行带全部字段，聚合行只有
//! `timestamp / vlt / outdoor / tank`，对比结果为 `{current, previous}`，
//! 前一周期的行额外带 `original_ts`。

use domain::Reading;
use serde::Serialize;

/// 聚合行：桶内最小时间戳与各字段算术平均
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    pub timestamp: i64,
    pub vlt: f64,
    pub outdoor: f64,
    pub tank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoryRow {
    Raw(Reading),
    Bucket(BucketRow),
}

impl HistoryRow {
    pub fn timestamp(&self) -> i64 {
        match self {
            HistoryRow::Raw(reading) => reading.timestamp,
            HistoryRow::Bucket(bucket) => bucket.timestamp,
        }
    }

    pub(crate) fn with_timestamp(mut self, timestamp: i64) -> Self {
        match &mut self {
            HistoryRow::Raw(reading) => reading.timestamp = timestamp,
            HistoryRow::Bucket(bucket) => bucket.timestamp = timestamp,
        }
        self
    }
}

/// 平移到当前周期的前一周期行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftedRow {
    #[serde(flatten)]
    pub row: HistoryRow,
    pub original_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HistoryResult {
    Rows(Vec<HistoryRow>),
    Comparison {
        current: Vec<HistoryRow>,
        previous: Vec<ShiftedRow>,
    },
}
