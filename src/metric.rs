//! The metric sample model and the per-cycle readout.
//!
//! Lovell does not compute statistics. Counters, gauges, meters and timers
//! live in the host application's instrumentation; what arrives here each
//! cycle is a `Readout`, an immutable snapshot of their current values. The
//! adapters in `adapter` consume these samples and never mutate them.

use std::collections::BTreeMap;

/// The value carried by a gauge at sample time.
///
/// Gauges are the one heterogeneous metric kind: applications hang all sorts
/// of values off them. Only numeric gauges are publishable; text gauges are
/// skipped without error.
#[derive(Clone, Debug, PartialEq)]
pub enum GaugeValue {
    /// A publishable numeric reading.
    Numeric(f64),
    /// A non-numeric reading. Carried for completeness, never published.
    Text(String),
}

impl GaugeValue {
    /// The numeric reading, if there is one.
    pub fn as_numeric(&self) -> Option<f64> {
        match *self {
            GaugeValue::Numeric(v) => Some(v),
            GaugeValue::Text(_) => None,
        }
    }
}

/// The rate aspect of a meter, or of a timer's throughput.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metered {
    /// Total observations since the metric was registered.
    pub count: u64,
    /// Exponentially-weighted rate over the last minute.
    pub one_minute_rate: f64,
    /// Exponentially-weighted rate over the last five minutes.
    pub five_minute_rate: f64,
    /// Exponentially-weighted rate over the last fifteen minutes.
    pub fifteen_minute_rate: f64,
    /// Mean rate over the metric's whole lifetime.
    pub mean_rate: f64,
}

/// The statistical summary a timer produces at sample time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 98th percentile.
    pub p98: f64,
    /// 99th percentile.
    pub p99: f64,
    /// 99.9th percentile.
    pub p999: f64,
    /// Smallest observation in the sample window.
    pub min: f64,
    /// Largest observation in the sample window.
    pub max: f64,
    /// Arithmetic mean of the sample window.
    pub mean: f64,
    /// Median of the sample window.
    pub median: f64,
    /// Standard deviation of the sample window.
    pub std_dev: f64,
}

/// Both aspects of a timer: throughput rates plus the duration summary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// The meter-like throughput aspect.
    pub rates: Metered,
    /// The duration distribution aspect.
    pub summary: Summary,
}

/// One metric's current value, tagged by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricSample {
    /// A monotonic-ish counter reading. May go negative if the application
    /// decrements.
    Counter(i64),
    /// A point-in-time gauge reading.
    Gauge(GaugeValue),
    /// A meter's rate readings.
    Meter(Metered),
    /// A timer's rate and distribution readings.
    Timer(Timing),
}

/// An immutable snapshot of the metrics registry, one per reporting cycle.
///
/// Names sort within each category, which makes cycle output reproducible
/// and keeps the tests honest.
///
/// # Examples
///
/// ```
/// use lovell::metric::{MetricSample, Readout};
///
/// let mut readout = Readout::default();
/// readout.add("requests", MetricSample::Counter(5));
/// assert_eq!(1, readout.counters().len());
/// assert!(readout.gauges().is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Readout {
    counters: BTreeMap<String, i64>,
    gauges: BTreeMap<String, GaugeValue>,
    meters: BTreeMap<String, Metered>,
    timers: BTreeMap<String, Timing>,
}

impl Readout {
    /// Create an empty readout.
    pub fn new() -> Readout {
        Readout::default()
    }

    /// File a sample under its category. A repeated name within one category
    /// replaces the earlier sample; the registry being snapshotted holds one
    /// value per name, so a replacement only ever happens on caller error.
    pub fn add<S>(&mut self, name: S, sample: MetricSample)
    where
        S: Into<String>,
    {
        let name = name.into();
        match sample {
            MetricSample::Counter(count) => {
                self.counters.insert(name, count);
            }
            MetricSample::Gauge(value) => {
                self.gauges.insert(name, value);
            }
            MetricSample::Meter(rates) => {
                self.meters.insert(name, rates);
            }
            MetricSample::Timer(timing) => {
                self.timers.insert(name, timing);
            }
        }
    }

    /// Counter samples, sorted by name.
    pub fn counters(&self) -> &BTreeMap<String, i64> {
        &self.counters
    }

    /// Gauge samples, sorted by name.
    pub fn gauges(&self) -> &BTreeMap<String, GaugeValue> {
        &self.gauges
    }

    /// Meter samples, sorted by name.
    pub fn meters(&self) -> &BTreeMap<String, Metered> {
        &self.meters
    }

    /// Timer samples, sorted by name.
    pub fn timers(&self) -> &BTreeMap<String, Timing> {
        &self.timers
    }

    /// Total samples across all categories.
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.meters.len() + self.timers.len()
    }

    /// True if no category holds a sample.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Supplier of the per-cycle snapshot.
///
/// The reporter pulls one `Readout` per tick through this seam, which keeps
/// the cycle free of any dependency on how the host instruments itself.
pub trait Sampler {
    /// Produce the readout for the cycle about to run.
    fn sample(&mut self) -> Readout;
}

/// Control events consumed by the reporter loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// A scheduler tick, carrying its sequence number.
    Tick(u64),
    /// Orderly shutdown: drain nothing further, return after the current
    /// cycle.
    Shutdown,
}
