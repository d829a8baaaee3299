//! 历史查询与聚合
//!
//! 查询模式解析为 [`HistoryQuery`]：原始窗口、分桶聚合或两周期对比。
//! 窗口边界按本地日历计算（午夜、月初、年初），区间为 `[from, to)`。
//!
//! 夏令时切换日的桶与平移会有一小时偏差，这是已知限制：
//! 不存在的本地时刻顺延一小时，重复的本地时刻取较早的一个。

use crate::error::StorageError;
use crate::models::{BucketRow, HistoryResult, HistoryRow, ShiftedRow};
use crate::traits::ReadingStore;
use chrono::{
    DateTime, Datelike, Days, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use domain::Reading;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// 历史查询模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Last24h,
    Today,
    Yesterday,
    Month,
    LastMonth,
    Year,
    LastYear,
    CompareDays,
    CompareMonths,
}

impl HistoryMode {
    pub const ALL: [HistoryMode; 9] = [
        HistoryMode::Last24h,
        HistoryMode::Today,
        HistoryMode::Yesterday,
        HistoryMode::Month,
        HistoryMode::LastMonth,
        HistoryMode::Year,
        HistoryMode::LastYear,
        HistoryMode::CompareDays,
        HistoryMode::CompareMonths,
    ];

    /// 解析查询参数；未知模式回退为 `24h`。
    pub fn parse(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value.trim())
            .unwrap_or(HistoryMode::Last24h)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryMode::Last24h => "24h",
            HistoryMode::Today => "today",
            HistoryMode::Yesterday => "yesterday",
            HistoryMode::Month => "month",
            HistoryMode::LastMonth => "last_month",
            HistoryMode::Year => "year",
            HistoryMode::LastYear => "last_year",
            HistoryMode::CompareDays => "compare_days",
            HistoryMode::CompareMonths => "compare_months",
        }
    }
}

/// 半开时间窗口 `[from, to)`，毫秒
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: i64,
    pub to: Option<i64>,
}

/// 分桶键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// 本地 日-小时（月窗口）
    DayHour,
    /// 本地 月-日（年窗口）
    MonthDay,
}

/// 前一周期平移量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Day,
    Month,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryQuery {
    Raw(Window),
    Bucketed(Window, Grouping),
    Comparison {
        current: Box<HistoryQuery>,
        previous: Box<HistoryQuery>,
        shift: Shift,
    },
}

impl HistoryQuery {
    /// 以本地时区 `tz` 和当前时刻 `now` 解析查询窗口
    pub fn resolve<Tz: TimeZone>(mode: HistoryMode, tz: &Tz, now: DateTime<Utc>) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let midnight = |date: NaiveDate| local_midnight(tz, date);
        let month_start = today.with_day(1).unwrap_or(today);
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

        match mode {
            HistoryMode::Last24h => HistoryQuery::Raw(Window {
                from: now.timestamp_millis() - DAY_MS,
                to: None,
            }),
            HistoryMode::Today => HistoryQuery::Raw(Window {
                from: midnight(today),
                to: None,
            }),
            HistoryMode::Yesterday => HistoryQuery::Raw(Window {
                from: midnight(today - Days::new(1)),
                to: Some(midnight(today)),
            }),
            HistoryMode::Month => HistoryQuery::Bucketed(
                Window {
                    from: midnight(month_start),
                    to: None,
                },
                Grouping::DayHour,
            ),
            HistoryMode::LastMonth => HistoryQuery::Bucketed(
                Window {
                    from: midnight(month_start - Months::new(1)),
                    to: Some(midnight(month_start)),
                },
                Grouping::DayHour,
            ),
            HistoryMode::Year => HistoryQuery::Bucketed(
                Window {
                    from: midnight(year_start),
                    to: None,
                },
                Grouping::MonthDay,
            ),
            HistoryMode::LastYear => HistoryQuery::Bucketed(
                Window {
                    from: midnight(year_start - Months::new(12)),
                    to: Some(midnight(year_start)),
                },
                Grouping::MonthDay,
            ),
            HistoryMode::CompareDays => HistoryQuery::Comparison {
                current: Box::new(Self::resolve(HistoryMode::Today, tz, now)),
                previous: Box::new(Self::resolve(HistoryMode::Yesterday, tz, now)),
                shift: Shift::Day,
            },
            HistoryMode::CompareMonths => HistoryQuery::Comparison {
                current: Box::new(Self::resolve(HistoryMode::Month, tz, now)),
                previous: Box::new(Self::resolve(HistoryMode::LastMonth, tz, now)),
                shift: Shift::Month,
            },
        }
    }

    fn empty_result(&self) -> HistoryResult {
        match self {
            HistoryQuery::Comparison { .. } => HistoryResult::Comparison {
                current: Vec::new(),
                previous: Vec::new(),
            },
            _ => HistoryResult::Rows(Vec::new()),
        }
    }
}

/// 历史聚合引擎
pub struct HistoryEngine<Tz: TimeZone = Local> {
    readings: Arc<dyn ReadingStore>,
    tz: Tz,
}

impl HistoryEngine<Local> {
    pub fn new(readings: Arc<dyn ReadingStore>) -> Self {
        Self::with_timezone(readings, Local)
    }
}

impl<Tz> HistoryEngine<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    pub fn with_timezone(readings: Arc<dyn ReadingStore>, tz: Tz) -> Self {
        Self { readings, tz }
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    pub async fn query(&self, mode: HistoryMode) -> HistoryResult {
        self.query_at(mode, Utc::now()).await
    }

    /// 以指定时刻执行查询；存储失败记录日志并返回空结果。
    pub async fn query_at(&self, mode: HistoryMode, now: DateTime<Utc>) -> HistoryResult {
        let query = HistoryQuery::resolve(mode, &self.tz, now);
        match self.run(&query).await {
            Ok(result) => result,
            Err(err) => {
                bridge_telemetry::record_storage_failure();
                warn!(
                    target: "bridge.storage",
                    mode = mode.as_str(),
                    error = %err,
                    "history_query_failed"
                );
                query.empty_result()
            }
        }
    }

    pub async fn run(&self, query: &HistoryQuery) -> Result<HistoryResult, StorageError> {
        match query {
            HistoryQuery::Comparison {
                current,
                previous,
                shift,
            } => {
                let current = self.rows(current).await?;
                let previous = self
                    .rows(previous)
                    .await?
                    .into_iter()
                    .map(|row| {
                        let original_ts = row.timestamp();
                        let shifted = shift_forward(&self.tz, original_ts, *shift);
                        ShiftedRow {
                            row: row.with_timestamp(shifted),
                            original_ts,
                        }
                    })
                    .collect();
                Ok(HistoryResult::Comparison { current, previous })
            }
            other => Ok(HistoryResult::Rows(self.rows(other).await?)),
        }
    }

    async fn rows(&self, query: &HistoryQuery) -> Result<Vec<HistoryRow>, StorageError> {
        match query {
            HistoryQuery::Raw(window) => Ok(self
                .readings
                .query_range(window.from, window.to)
                .await?
                .into_iter()
                .map(HistoryRow::Raw)
                .collect()),
            HistoryQuery::Bucketed(window, grouping) => {
                let readings = self.readings.query_range(window.from, window.to).await?;
                Ok(bucket(&self.tz, &readings, *grouping)
                    .into_iter()
                    .map(HistoryRow::Bucket)
                    .collect())
            }
            // 对比查询不嵌套
            HistoryQuery::Comparison { .. } => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
struct Accumulator {
    first: Option<i64>,
    count: u32,
    vlt: f64,
    outdoor: f64,
    tank: f64,
}

/// 按本地时间分桶，输出按桶内最小时间戳升序
pub fn bucket<Tz: TimeZone>(tz: &Tz, readings: &[Reading], grouping: Grouping) -> Vec<BucketRow> {
    let mut buckets: HashMap<(u32, u32), Accumulator> = HashMap::new();
    for reading in readings {
        let Some(local) = tz.timestamp_millis_opt(reading.timestamp).single() else {
            continue;
        };
        let key = match grouping {
            Grouping::DayHour => (local.day(), local.hour()),
            Grouping::MonthDay => (local.month(), local.day()),
        };
        let acc = buckets.entry(key).or_default();
        acc.first = Some(
            acc.first
                .map_or(reading.timestamp, |first| first.min(reading.timestamp)),
        );
        acc.count += 1;
        acc.vlt += reading.vlt;
        acc.outdoor += reading.outdoor;
        acc.tank += reading.tank;
    }

    let mut rows: Vec<BucketRow> = buckets
        .into_values()
        .filter_map(|acc| {
            let count = f64::from(acc.count);
            Some(BucketRow {
                timestamp: acc.first?,
                vlt: acc.vlt / count,
                outdoor: acc.outdoor / count,
                tank: acc.tank / count,
            })
        })
        .collect();
    rows.sort_by_key(|row| row.timestamp);
    rows
}

/// 在本地日历上前移一天或一个月（月末按目标月最后一天截断）
pub fn shift_forward<Tz: TimeZone>(tz: &Tz, timestamp: i64, shift: Shift) -> i64 {
    let Some(local) = tz.timestamp_millis_opt(timestamp).single() else {
        return timestamp;
    };
    let naive = local.naive_local();
    let shifted = match shift {
        Shift::Day => naive.checked_add_days(Days::new(1)),
        Shift::Month => naive.checked_add_months(Months::new(1)),
    };
    shifted.map_or(timestamp, |naive| local_millis(tz, naive))
}

/// 本地日期 `date` 的全天窗口 `[00:00, 次日 00:00)`
pub fn day_window<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Window {
    Window {
        from: local_midnight(tz, date),
        to: Some(local_midnight(tz, date + Days::new(1))),
    }
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    local_millis(tz, date.and_time(NaiveTime::default()))
}

fn local_millis<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> i64 {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .map_or_else(
            || naive.and_utc().timestamp_millis(),
            |local| local.timestamp_millis(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).expect("offset")
    }

    fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("local time")
            .with_timezone(&Utc)
    }

    #[test]
    fn unknown_mode_falls_back_to_24h() {
        assert_eq!(HistoryMode::parse("decade"), HistoryMode::Last24h);
        assert_eq!(HistoryMode::parse(""), HistoryMode::Last24h);
        for mode in HistoryMode::ALL {
            assert_eq!(HistoryMode::parse(mode.as_str()), mode);
        }
    }

    #[test]
    fn yesterday_is_previous_local_calendar_day() {
        let tz = tz();
        let now = at(&tz, 2024, 3, 10, 8, 30);
        let query = HistoryQuery::resolve(HistoryMode::Yesterday, &tz, now);
        assert_eq!(
            query,
            HistoryQuery::Raw(Window {
                from: at(&tz, 2024, 3, 9, 0, 0).timestamp_millis(),
                to: Some(at(&tz, 2024, 3, 10, 0, 0).timestamp_millis()),
            })
        );
    }

    #[test]
    fn last_month_spans_previous_calendar_month() {
        let tz = tz();
        let now = at(&tz, 2024, 1, 15, 12, 0);
        let query = HistoryQuery::resolve(HistoryMode::LastMonth, &tz, now);
        assert_eq!(
            query,
            HistoryQuery::Bucketed(
                Window {
                    from: at(&tz, 2023, 12, 1, 0, 0).timestamp_millis(),
                    to: Some(at(&tz, 2024, 1, 1, 0, 0).timestamp_millis()),
                },
                Grouping::DayHour,
            )
        );
    }

    #[test]
    fn month_shift_clamps_to_month_end() {
        let tz = tz();
        let source = at(&tz, 2024, 1, 31, 10, 0).timestamp_millis();
        let shifted = shift_forward(&tz, source, Shift::Month);
        assert_eq!(shifted, at(&tz, 2024, 2, 29, 10, 0).timestamp_millis());
    }

    #[test]
    fn day_window_covers_local_day() {
        let tz = tz();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).expect("date");
        let window = day_window(&tz, date);
        assert_eq!(window.from, at(&tz, 2024, 5, 1, 0, 0).timestamp_millis());
        assert_eq!(window.to, Some(at(&tz, 2024, 5, 2, 0, 0).timestamp_millis()));
    }
}
