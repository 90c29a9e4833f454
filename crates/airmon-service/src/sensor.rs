//! Gas sensor abstraction.
//!
//! The [`GasSensor`] trait covers the three operations the collector needs
//! from an eCO2/TVOC sensor. [`SimulatedSensor`] implements it without
//! hardware, for development and for tests.
//!
//! # Simulation
//!
//! Each measurement moves the previous value by a random step of at most
//! `variance * (max - min)` in either direction, clamped to `[min, max]`.
//! Both eCO2 and TVOC report the same value.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use airmon_types::Baseline;

/// Sensor errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor not responding: {0}")]
    NotResponding(String),
    #[error("Invalid sensor data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// One measurement from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Equivalent CO2 in ppm.
    pub eco2: u16,
    /// Total volatile organic compounds in ppb.
    pub tvoc: u16,
}

/// Trait abstracting eCO2/TVOC sensor operations.
///
/// # Example
///
/// ```
/// use airmon_service::{GasSensor, SimulatedSensor};
///
/// #[tokio::main]
/// async fn main() {
///     let sensor = SimulatedSensor::new();
///     let m = sensor.measure().await.unwrap();
///     assert!((1..=1000).contains(&m.eco2));
/// }
/// ```
#[async_trait]
pub trait GasSensor: Send + Sync {
    /// Take a measurement.
    async fn measure(&self) -> Result<Measurement>;

    /// Read the calibration baseline the sensor is currently using.
    async fn read_baseline(&self) -> Result<Baseline>;

    /// Restore a previously saved calibration baseline.
    async fn write_baseline(&self, baseline: Baseline) -> Result<()>;
}

/// A sensor that produces a bounded random walk.
pub struct SimulatedSensor {
    min: u16,
    max: u16,
    variance: f64,
    last: RwLock<f64>,
    fixed: RwLock<Option<Measurement>>,
    baseline: RwLock<Baseline>,
    should_fail: AtomicBool,
    /// Number of operations left to fail before succeeding again.
    remaining_failures: AtomicU32,
    measure_count: AtomicU32,
}

impl std::fmt::Debug for SimulatedSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSensor")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("variance", &self.variance)
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    /// A sensor walking within `[1, 1000]` with 10% variance.
    pub fn new() -> Self {
        Self::with_range(1, 1000, 0.1)
    }

    /// A sensor walking within `[min, max]`, starting at the midpoint.
    pub fn with_range(min: u16, max: u16, variance: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let start = f64::from(min) + f64::from(max - min) / 2.0;

        Self {
            min,
            max,
            variance,
            last: RwLock::new(start),
            fixed: RwLock::new(None),
            baseline: RwLock::new(Baseline::new(12, 34)),
            should_fail: AtomicBool::new(false),
            remaining_failures: AtomicU32::new(0),
            measure_count: AtomicU32::new(0),
        }
    }

    /// Always report `measurement` instead of walking.
    pub async fn set_fixed(&self, measurement: Option<Measurement>) {
        *self.fixed.write().await = measurement;
    }

    /// Make every operation fail until cleared.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` operations, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Number of successful measurements.
    pub fn measure_count(&self) -> u32 {
        self.measure_count.load(Ordering::Relaxed)
    }

    fn check_should_fail(&self) -> Result<()> {
        if self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SensorError::NotResponding("transient failure".to_string()));
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(SensorError::NotResponding("simulated failure".to_string()));
        }
        Ok(())
    }

    fn step(&self, last: f64) -> f64 {
        let span = f64::from(self.max - self.min);
        let delta = (rand::random::<f64>() * 2.0 - 1.0) * span * self.variance;
        (last + delta).clamp(f64::from(self.min), f64::from(self.max))
    }
}

#[async_trait]
impl GasSensor for SimulatedSensor {
    async fn measure(&self) -> Result<Measurement> {
        self.check_should_fail()?;

        let measurement = match *self.fixed.read().await {
            Some(fixed) => fixed,
            None => {
                let mut last = self.last.write().await;
                *last = self.step(*last);
                let value = *last as u16;
                Measurement {
                    eco2: value,
                    tvoc: value,
                }
            }
        };

        self.measure_count.fetch_add(1, Ordering::Relaxed);
        Ok(measurement)
    }

    async fn read_baseline(&self) -> Result<Baseline> {
        self.check_should_fail()?;
        Ok(*self.baseline.read().await)
    }

    async fn write_baseline(&self, baseline: Baseline) -> Result<()> {
        self.check_should_fail()?;
        if !baseline.is_set() {
            return Err(SensorError::InvalidData(format!(
                "refusing to load unset baseline {}",
                baseline
            )));
        }
        *self.baseline.write().await = baseline;
        Ok(())
    }
}
