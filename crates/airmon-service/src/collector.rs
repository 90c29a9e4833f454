//! Background data collector.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{debug, error, info, warn};

use airmon_store::Store;
use airmon_types::{Baseline, Reading};

use crate::config::SensorConfig;
use crate::sensor::{GasSensor, SensorError};

/// Polls a sensor on a schedule and feeds the store.
///
/// Every poll pushes one reading and saves the store. The sensor's
/// calibration baseline is read back on its own, slower schedule and kept in
/// the store so it survives restarts.
pub struct Collector {
    store: Arc<Store>,
    sensor: Arc<dyn GasSensor>,
    poll_period: Duration,
    baseline_period: Option<Duration>,
    stop_tx: watch::Sender<bool>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(store: Arc<Store>, sensor: Arc<dyn GasSensor>, config: &SensorConfig) -> Self {
        Self::with_periods(store, sensor, config.poll_period(), config.baseline_period())
    }

    /// Create a collector with explicit periods.
    pub fn with_periods(
        store: Arc<Store>,
        sensor: Arc<dyn GasSensor>,
        poll_period: Duration,
        baseline_period: Option<Duration>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            store,
            sensor,
            poll_period,
            baseline_period,
            stop_tx,
        }
    }

    /// Signal [`Collector::run`] to return.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Run until [`Collector::stop`] is called.
    ///
    /// The stored baseline, if any, is written to the sensor first. The first
    /// poll happens immediately; the first baseline readback after one
    /// baseline period.
    pub async fn run(&self) {
        let mut stop_rx = self.stop_tx.subscribe();

        match self.restore_baseline().await {
            Ok(Some(baseline)) => info!("Restored sensor baseline {}", baseline),
            Ok(None) => info!("No stored baseline, sensor will self-calibrate"),
            Err(e) => warn!("Failed to restore sensor baseline: {}", e),
        }

        info!(
            "Starting collector (poll: {}s, baseline: {})",
            self.poll_period.as_secs_f64(),
            self.baseline_period
                .map(|p| format!("{}s", p.as_secs_f64()))
                .unwrap_or_else(|| "off".to_string())
        );

        let mut poll_timer = interval(self.poll_period);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut baseline_timer = self.baseline_period.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        let mut poll_failures = FailureTracker::new("poll sensor");
        let mut baseline_failures = FailureTracker::new("read sensor baseline");

        while !*stop_rx.borrow() {
            tokio::select! {
                _ = poll_timer.tick() => match self.poll_once().await {
                    Ok(reading) => {
                        poll_failures.success();
                        debug!("Collected reading {}", reading);
                    }
                    Err(e) => poll_failures.failure(&e),
                },
                _ = tick(&mut baseline_timer) => match self.sync_baseline().await {
                    Ok(baseline) => {
                        baseline_failures.success();
                        debug!("Stored sensor baseline {}", baseline);
                    }
                    Err(e) => baseline_failures.failure(&e),
                },
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Collector stopped");
    }

    /// Take one measurement, push it and save the store.
    pub async fn poll_once(&self) -> Result<Reading, CollectorError> {
        let measurement = self
            .sensor
            .measure()
            .await
            .map_err(CollectorError::Sensor)?;
        let reading = Reading::now(f64::from(measurement.eco2));

        self.with_store(move |store| {
            store.push(reading)?;
            store.save()
        })
        .await?;

        Ok(reading)
    }

    /// Read the sensor's baseline and keep it in the store.
    ///
    /// An uncalibrated (zero) baseline from the sensor is not stored.
    pub async fn sync_baseline(&self) -> Result<Baseline, CollectorError> {
        let baseline = self
            .sensor
            .read_baseline()
            .await
            .map_err(CollectorError::Sensor)?;

        if baseline.is_set() {
            self.with_store(move |store| store.set_baseline(baseline.eco2, baseline.tvoc))
                .await?;
        }
        Ok(baseline)
    }

    /// Write the stored baseline to the sensor, if one is stored.
    pub async fn restore_baseline(&self) -> Result<Option<Baseline>, CollectorError> {
        let baseline = match self.with_store(|store| store.baseline()).await {
            Ok(baseline) => baseline,
            Err(CollectorError::Store(airmon_store::Error::BaselineNotSet(_))) => return Ok(None),
            Err(e) => return Err(e),
        };

        self.sensor
            .write_baseline(baseline)
            .await
            .map_err(CollectorError::Sensor)?;
        Ok(Some(baseline))
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, CollectorError>
    where
        F: FnOnce(&Store) -> airmon_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| CollectorError::Task(e.to_string()))?
            .map_err(CollectorError::Store)
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Logs the first few consecutive failures, then goes quiet until a success.
struct FailureTracker {
    action: &'static str,
    consecutive: u32,
}

impl FailureTracker {
    fn new(action: &'static str) -> Self {
        Self {
            action,
            consecutive: 0,
        }
    }

    fn success(&mut self) {
        if self.consecutive > 3 {
            info!("Able to {} again after {} failures", self.action, self.consecutive);
        }
        self.consecutive = 0;
    }

    fn failure(&mut self, err: &CollectorError) {
        self.consecutive += 1;
        if self.consecutive <= 3 {
            warn!(
                "Failed to {}: {} (attempt {})",
                self.action, err, self.consecutive
            );
        } else if self.consecutive == 4 {
            error!(
                "Failed to {} after {} attempts, will continue trying silently",
                self.action, self.consecutive
            );
        }
    }
}

/// Collector errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Failed to store: {0}")]
    Store(airmon_store::Error),
    #[error("Store task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Measurement, SimulatedSensor};
    use airmon_store::StoreConfig;

    fn setup(dir: &std::path::Path) -> (Arc<Store>, Arc<SimulatedSensor>) {
        let store = Arc::new(Store::new(StoreConfig::new(dir).capacity(16)));
        (store, Arc::new(SimulatedSensor::new()))
    }

    fn collector(store: &Arc<Store>, sensor: &Arc<SimulatedSensor>) -> Collector {
        Collector::with_periods(
            Arc::clone(store),
            Arc::clone(sensor) as Arc<dyn GasSensor>,
            Duration::from_millis(10),
            Some(Duration::from_millis(25)),
        )
    }

    #[tokio::test]
    async fn test_poll_once_pushes_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        sensor
            .set_fixed(Some(Measurement { eco2: 612, tvoc: 5 }))
            .await;

        let reading = collector(&store, &sensor).poll_once().await.unwrap();
        assert_eq!(reading.concentration, 612.0);
        assert_eq!(store.latest(), Some(reading));
        assert!(store.points_path().is_file());
        assert!(store.config_path().is_file());
    }

    #[tokio::test]
    async fn test_poll_once_sensor_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        sensor.set_should_fail(true);

        let result = collector(&store, &sensor).poll_once().await;
        assert!(matches!(result, Err(CollectorError::Sensor(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_poll_once_save_failure_keeps_reading() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        std::fs::create_dir_all(store.points_path()).unwrap();

        let result = collector(&store, &sensor).poll_once().await;
        assert!(matches!(
            result,
            Err(CollectorError::Store(airmon_store::Error::Save(_)))
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        sensor.write_baseline(Baseline::new(100, 200)).await.unwrap();

        let baseline = collector(&store, &sensor).sync_baseline().await.unwrap();
        assert_eq!(baseline, Baseline::new(100, 200));
        assert_eq!(store.baseline().unwrap(), Baseline::new(100, 200));
    }

    #[tokio::test]
    async fn test_restore_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        let collector = collector(&store, &sensor);

        assert_eq!(collector.restore_baseline().await.unwrap(), None);
        assert_eq!(sensor.read_baseline().await.unwrap(), Baseline::new(12, 34));

        store.set_baseline(0x8A2C, 0x8F10).unwrap();
        assert_eq!(
            collector.restore_baseline().await.unwrap(),
            Some(Baseline::new(0x8A2C, 0x8F10))
        );
        assert_eq!(
            sensor.read_baseline().await.unwrap(),
            Baseline::new(0x8A2C, 0x8F10)
        );
    }

    #[tokio::test]
    async fn test_run_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        let collector = Arc::new(collector(&store, &sensor));

        let task = tokio::spawn({
            let collector = Arc::clone(&collector);
            async move { collector.run().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        collector.stop();
        task.await.unwrap();

        assert!(!store.is_empty());
        assert!(sensor.measure_count() >= 1);
        assert_eq!(store.baseline().unwrap(), Baseline::new(12, 34));
    }

    #[tokio::test]
    async fn test_run_survives_sensor_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        sensor.set_transient_failures(5);
        let collector = Arc::new(collector(&store, &sensor));

        let task = tokio::spawn({
            let collector = Arc::clone(&collector);
            async move { collector.run().await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        collector.stop();
        task.await.unwrap();

        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sensor) = setup(dir.path());
        let collector = collector(&store, &sensor);

        collector.stop();
        collector.run().await;
        assert!(store.is_empty());
    }

    #[test]
    fn test_failure_tracker_resets() {
        let mut tracker = FailureTracker::new("poll sensor");
        let err = CollectorError::Task("boom".to_string());
        for _ in 0..5 {
            tracker.failure(&err);
        }
        assert_eq!(tracker.consecutive, 5);
        tracker.success();
        assert_eq!(tracker.consecutive, 0);
    }
}
