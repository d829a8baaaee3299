use bridge_storage::{InMemoryLogStore, InMemoryReadingStore, LogStore, ReadingStore};
use domain::{LogEntry, LogLevel, Reading};

fn entry(timestamp: i64, message: &str) -> LogEntry {
    LogEntry {
        timestamp,
        level: LogLevel::Info,
        message: message.to_string(),
    }
}

#[tokio::test]
async fn reading_range_is_half_open() {
    let store = InMemoryReadingStore::new();
    for ts in [100_i64, 200, 300] {
        store
            .append(&Reading {
                timestamp: ts,
                vlt: 1.0,
                outdoor: 2.0,
                indoor: 3.0,
                tank: 4.0,
                target: 5.0,
            })
            .await
            .expect("append");
    }
    assert_eq!(store.len(), 3);

    let rows = store.query_range(100, Some(300)).await.expect("query");
    assert_eq!(rows.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![100, 200]);
}

#[tokio::test]
async fn log_latest_is_ascending_tail() {
    let store = InMemoryLogStore::new();
    store.append(&entry(30, "c")).await.expect("append");
    store.append(&entry(10, "a")).await.expect("append");
    store.append(&entry(20, "b")).await.expect("append");

    let latest = store.latest(2).await.expect("latest");
    assert_eq!(
        latest.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
        vec!["b", "c"]
    );
    assert_eq!(store.latest(10).await.expect("latest").len(), 3);

    assert_eq!(store.prune_before(20).await.expect("prune"), 1);
    let day = store.list_range(0, Some(25)).await.expect("list");
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].message, "b");
}
