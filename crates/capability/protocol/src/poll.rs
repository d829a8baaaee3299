//! 轮询调度：固定资源列表，按索引错开发送。

use crate::connection::ConnectionHandle;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info};

/// 默认轮询周期。
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// 默认错开间隔（第 i 个请求在批次开始后 i × 200ms 发出）。
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(200);

/// 被跟踪的资源路径（`/la` = 最新内容实例）。
pub const POLL_PATHS: [&str; 17] = [
    "/[0]/MNAE/1/Sensor/IndoorTemperature/la",
    "/[0]/MNAE/1/Sensor/OutdoorTemperature/la",
    "/[0]/MNAE/2/Sensor/TankTemperature/la",
    "/[0]/MNAE/1/Sensor/LeavingWaterTemperatureCurrent/la",
    "/[0]/MNAE/1/Operation/Power/la",
    "/[0]/MNAE/1/Operation/OperationMode/la",
    "/[0]/MNAE/1/Operation/LeavingWaterTemperatureOffsetHeating/la",
    "/[0]/MNAE/1/Operation/LeavingWaterTemperatureOffsetCooling/la",
    "/[0]/MNAE/1/Operation/LeavingWaterTemperatureHeating/la",
    "/[0]/MNAE/1/Operation/LeavingWaterTemperatureCooling/la",
    "/[0]/MNAE/2/Operation/Power/la",
    "/[0]/MNAE/2/Operation/TargetTemperature/la",
    "/[0]/MNAE/2/Operation/Powerful/la",
    "/[0]/MNAE/2/UnitStatus/ReheatState/la",
    "/[0]/MNAE/1/UnitStatus/ErrorState/la",
    "/[0]/MNAE/1/UnitStatus/WarningState/la",
    "/[0]/MNAE/1/UnitStatus/EmergencyState/la",
];

pub fn default_poll_paths() -> Vec<String> {
    POLL_PATHS.iter().map(|path| path.to_string()).collect()
}

/// 轮询批次调度器。
///
/// 同一时刻最多一个批次在运行；新批次开始前中止旧批次（连同其未完成的请求）。
pub struct PollScheduler {
    paths: Vec<String>,
    stagger: Duration,
    request_timeout: Duration,
    batch: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(paths: Vec<String>, stagger: Duration, request_timeout: Duration) -> Self {
        Self {
            paths,
            stagger,
            request_timeout,
            batch: None,
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// 批次内各请求相对批次开始的发送偏移。
    pub fn schedule(&self) -> Vec<(Duration, &str)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(index, path)| (self.stagger * index as u32, path.as_str()))
            .collect()
    }

    /// 是否有批次仍在运行。
    pub fn is_running(&self) -> bool {
        self.batch.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// 启动一个新批次。
    pub fn dispatch(&mut self, link: ConnectionHandle, forced: bool) {
        self.cancel();
        bridge_telemetry::record_poll_batch();
        info!(
            target: "bridge.protocol",
            paths = self.paths.len(),
            forced,
            "poll_batch_started"
        );

        let plan: Vec<(Duration, String)> = self
            .schedule()
            .into_iter()
            .map(|(offset, path)| (offset, path.to_string()))
            .collect();
        let timeout = self.request_timeout;

        self.batch = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut requests = JoinSet::new();
            for (offset, path) in plan {
                tokio::time::sleep_until(started + offset).await;
                let link = link.clone();
                requests.spawn(async move { link.request(&path, timeout).await.is_some() });
            }

            let mut answered = 0usize;
            let mut missing = 0usize;
            while let Some(result) = requests.join_next().await {
                match result {
                    Ok(true) => answered += 1,
                    _ => missing += 1,
                }
            }
            debug!(
                target: "bridge.protocol",
                answered,
                missing,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "poll_batch_finished"
            );
        }));
    }

    /// 中止正在运行的批次。
    pub fn cancel(&mut self) {
        if let Some(task) = self.batch.take() {
            task.abort();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_staggers_in_list_order() {
        let scheduler = PollScheduler::new(
            default_poll_paths(),
            DEFAULT_STAGGER,
            Duration::from_millis(500),
        );
        let plan = scheduler.schedule();

        assert_eq!(plan.len(), 17);
        assert_eq!(plan[0], (Duration::ZERO, POLL_PATHS[0]));
        assert_eq!(plan[1].0, Duration::from_millis(200));
        assert_eq!(plan[16], (Duration::from_millis(3200), POLL_PATHS[16]));
    }

    #[test]
    fn every_path_reads_latest_instance() {
        assert!(POLL_PATHS.iter().all(|path| path.ends_with("/la")));
    }
}
