use bridge_storage::{
    HistoryEngine, HistoryMode, HistoryResult, HistoryRow, InMemoryReadingStore, ReadingStore,
};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use domain::Reading;
use std::sync::Arc;

fn tz() -> FixedOffset {
    FixedOffset::east_opt(2 * 3600).expect("offset")
}

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    tz().with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("local time")
        .with_timezone(&Utc)
}

fn reading(timestamp: i64, vlt: f64, outdoor: f64, tank: f64) -> Reading {
    Reading {
        timestamp,
        vlt,
        outdoor,
        indoor: 21.0,
        tank,
        target: 30.0,
    }
}

async fn engine(readings: Vec<Reading>) -> HistoryEngine<FixedOffset> {
    let store = Arc::new(InMemoryReadingStore::new());
    for r in &readings {
        store.append(r).await.expect("append");
    }
    HistoryEngine::with_timezone(store, tz())
}

#[tokio::test]
async fn raw_window_returns_all_rows_ascending() {
    let now = local(2024, 6, 15, 12, 0);
    let base = now.timestamp_millis() - 3 * 3600 * 1000;
    let readings: Vec<Reading> = (0..5)
        .rev()
        .map(|i| reading(base + i * 60_000, 30.0 + i as f64, 5.0, 45.0))
        .collect();
    let engine = engine(readings.clone()).await;

    let HistoryResult::Rows(rows) = engine.query_at(HistoryMode::Last24h, now).await else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 5);
    let mut expected = readings;
    expected.sort_by_key(|r| r.timestamp);
    let raw: Vec<Reading> = rows
        .into_iter()
        .map(|row| match row {
            HistoryRow::Raw(reading) => reading,
            HistoryRow::Bucket(_) => panic!("unexpected bucket"),
        })
        .collect();
    assert_eq!(raw, expected);
}

#[tokio::test]
async fn month_buckets_collapse_equal_day_hour() {
    let now = local(2024, 6, 15, 12, 0);
    let a = local(2024, 6, 3, 10, 5).timestamp_millis();
    let b = local(2024, 6, 3, 10, 40).timestamp_millis();
    let c = local(2024, 6, 3, 11, 0).timestamp_millis();
    let before_month = local(2024, 5, 31, 23, 0).timestamp_millis();
    let engine = engine(vec![
        reading(b, 34.0, 4.0, 50.0),
        reading(a, 30.0, 2.0, 40.0),
        reading(c, 20.0, 1.0, 30.0),
        reading(before_month, 99.0, 99.0, 99.0),
    ])
    .await;

    let HistoryResult::Rows(rows) = engine.query_at(HistoryMode::Month, now).await else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);
    let HistoryRow::Bucket(first) = &rows[0] else {
        panic!("expected bucket");
    };
    assert_eq!(first.timestamp, a);
    assert_eq!(first.vlt, 32.0);
    assert_eq!(first.outdoor, 3.0);
    assert_eq!(first.tank, 45.0);
    assert_eq!(rows[1].timestamp(), c);
}

#[tokio::test]
async fn compare_days_shifts_previous_day_forward() {
    let now = local(2024, 6, 15, 12, 0);
    let yesterday = local(2024, 6, 14, 1, 0).timestamp_millis();
    let today = local(2024, 6, 15, 1, 0).timestamp_millis();
    let engine = engine(vec![
        reading(yesterday, 31.0, 3.0, 44.0),
        reading(today, 33.0, 4.0, 46.0),
    ])
    .await;

    let HistoryResult::Comparison { current, previous } =
        engine.query_at(HistoryMode::CompareDays, now).await
    else {
        panic!("expected comparison");
    };
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].timestamp(), today);
    assert_eq!(previous.len(), 1);
    assert_eq!(previous[0].row.timestamp(), today);
    assert_eq!(previous[0].original_ts, yesterday);

    let json = serde_json::to_value(&previous[0]).expect("json");
    assert_eq!(json["timestamp"], serde_json::json!(today));
    assert_eq!(json["original_ts"], serde_json::json!(yesterday));
    assert_eq!(json["vlt"], serde_json::json!(31.0));
}

#[tokio::test]
async fn yesterday_excludes_today_midnight() {
    let now = local(2024, 6, 15, 12, 0);
    let midnight = local(2024, 6, 15, 0, 0).timestamp_millis();
    let late = local(2024, 6, 14, 23, 59).timestamp_millis();
    let engine = engine(vec![reading(late, 1.0, 1.0, 1.0), reading(midnight, 2.0, 2.0, 2.0)]).await;

    let HistoryResult::Rows(rows) = engine.query_at(HistoryMode::Yesterday, now).await else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp(), late);
}

fn bucket_row(row: &HistoryRow) -> &bridge_storage::BucketRow {
    match row {
        HistoryRow::Bucket(bucket) => bucket,
        HistoryRow::Raw(_) => panic!("expected bucket"),
    }
}

fn year_readings() -> Vec<Reading> {
    vec![
        reading(local(2024, 3, 10, 20, 0).timestamp_millis(), 34.0, 6.0, 50.0),
        reading(local(2024, 3, 10, 8, 0).timestamp_millis(), 30.0, 2.0, 40.0),
        reading(local(2024, 3, 11, 9, 0).timestamp_millis(), 20.0, 1.0, 30.0),
        reading(local(2023, 3, 10, 8, 0).timestamp_millis(), 40.0, 8.0, 55.0),
        reading(local(2023, 12, 31, 23, 0).timestamp_millis(), 38.0, -2.0, 52.0),
        reading(local(2024, 1, 1, 0, 0).timestamp_millis(), 36.0, -1.0, 51.0),
    ]
}

#[tokio::test]
async fn year_buckets_collapse_equal_month_day() {
    let now = local(2024, 6, 15, 12, 0);
    let engine = engine(year_readings()).await;

    let HistoryResult::Rows(rows) = engine.query_at(HistoryMode::Year, now).await else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].timestamp(), local(2024, 1, 1, 0, 0).timestamp_millis());

    let march_tenth = bucket_row(&rows[1]);
    assert_eq!(march_tenth.timestamp, local(2024, 3, 10, 8, 0).timestamp_millis());
    assert_eq!(march_tenth.vlt, 32.0);
    assert_eq!(march_tenth.outdoor, 4.0);
    assert_eq!(march_tenth.tank, 45.0);

    let march_eleventh = bucket_row(&rows[2]);
    assert_eq!(march_eleventh.timestamp, local(2024, 3, 11, 9, 0).timestamp_millis());
    assert_eq!(march_eleventh.vlt, 20.0);
}

#[tokio::test]
async fn last_year_stops_before_new_year_midnight() {
    let now = local(2024, 6, 15, 12, 0);
    let engine = engine(year_readings()).await;

    let HistoryResult::Rows(rows) = engine.query_at(HistoryMode::LastYear, now).await else {
        panic!("expected rows");
    };
    let timestamps: Vec<i64> = rows.iter().map(HistoryRow::timestamp).collect();
    assert_eq!(
        timestamps,
        vec![
            local(2023, 3, 10, 8, 0).timestamp_millis(),
            local(2023, 12, 31, 23, 0).timestamp_millis(),
        ]
    );
    assert_eq!(bucket_row(&rows[0]).vlt, 40.0);
}

#[tokio::test]
async fn compare_months_shifts_previous_buckets_one_calendar_month() {
    let now = local(2024, 2, 10, 12, 0);
    let month_end_first = local(2024, 1, 31, 18, 0).timestamp_millis();
    let early_january = local(2024, 1, 5, 6, 0).timestamp_millis();
    let engine = engine(vec![
        reading(local(2024, 1, 31, 18, 30).timestamp_millis(), 34.0, 3.0, 48.0),
        reading(month_end_first, 30.0, 1.0, 44.0),
        reading(early_january, 20.0, -3.0, 40.0),
        reading(local(2023, 12, 31, 23, 0).timestamp_millis(), 99.0, 99.0, 99.0),
        reading(local(2024, 2, 1, 9, 0).timestamp_millis(), 25.0, 2.0, 42.0),
    ])
    .await;

    let HistoryResult::Comparison { current, previous } =
        engine.query_at(HistoryMode::CompareMonths, now).await
    else {
        panic!("expected comparison");
    };
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].timestamp(), local(2024, 2, 1, 9, 0).timestamp_millis());

    assert_eq!(previous.len(), 2);
    assert_eq!(previous[0].original_ts, early_january);
    assert_eq!(
        previous[0].row.timestamp(),
        local(2024, 2, 5, 6, 0).timestamp_millis()
    );

    // 1 月 31 日截断到 2 月最后一天
    assert_eq!(previous[1].original_ts, month_end_first);
    assert_eq!(
        previous[1].row.timestamp(),
        local(2024, 2, 29, 18, 0).timestamp_millis()
    );
    assert_eq!(bucket_row(&previous[1].row).vlt, 32.0);

    let json = serde_json::to_value(&previous[1]).expect("json");
    assert_eq!(json["original_ts"], serde_json::json!(month_end_first));
    assert_eq!(json["tank"], serde_json::json!(46.0));
    assert!(json.get("indoor").is_none());
}
