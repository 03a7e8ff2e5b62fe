//! Pure adapters from metric samples to channel points and chart groupings.
//!
//! Every adapter is a plain function over one sample: no clocks, no network,
//! no registry access. Channel names derive deterministically from the kind
//! prefix, the metric name and a sub-series suffix, which is the property
//! that lets `registry` treat the name as a stable cache key.

use metric::{GaugeValue, Metered, Summary};

/// Channel-name prefix applied to meters.
pub const METER_PREFIX: &'static str = "meter_";

/// Channel-name prefix applied to timers, both aspects.
pub const TIMER_PREFIX: &'static str = "timer_";

/// A chart directive: the chart's name plus its member channels in display
/// order. Membership is honored only at first creation; see
/// `registry::ChartRegistry`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    /// The chart's stable name.
    pub name: String,
    /// Member channel names, in the order the chart displays them.
    pub channels: Vec<String>,
}

/// One adapter's output for one metric: the points to append and the charts
/// to ensure.
#[derive(Clone, Debug, PartialEq)]
pub struct Emission {
    /// (channel name, value) pairs, in emission order.
    pub points: Vec<(String, f64)>,
    /// Chart groupings over the channels named in `points`.
    pub charts: Vec<ChartSpec>,
}

#[inline]
fn concat(prefix: &str, name: &str) -> String {
    let mut s = String::with_capacity(prefix.len() + name.len());
    s.push_str(prefix);
    s.push_str(name);
    s
}

/// Adapt a counter sample.
///
/// One channel named `counter_<name>` and one chart of the same name holding
/// exactly that channel.
///
/// # Examples
///
/// ```
/// use lovell::adapter;
///
/// let emission = adapter::counter("requests", 5);
/// assert_eq!("counter_requests", emission.points[0].0);
/// assert_eq!(5.0, emission.points[0].1);
/// ```
pub fn counter(name: &str, count: i64) -> Emission {
    let channel = concat("counter_", name);
    Emission {
        points: vec![(channel.clone(), count as f64)],
        charts: vec![
            ChartSpec {
                name: channel.clone(),
                channels: vec![channel],
            },
        ],
    }
}

/// Adapt a gauge sample. Text gauges yield `None`: they are expected in a
/// heterogeneous registry and are not an error.
pub fn gauge(name: &str, value: &GaugeValue) -> Option<Emission> {
    value.as_numeric().map(|v| {
        let channel = concat("gauge_", name);
        Emission {
            points: vec![(channel.clone(), v)],
            charts: vec![
                ChartSpec {
                    name: channel.clone(),
                    channels: vec![channel],
                },
            ],
        }
    })
}

/// Adapt the rate aspect of a meter or timer.
///
/// Five channels -- `_count`, `_15M`, `_5M`, `_1M`, `_mean` -- under
/// `<prefix><name>`, plus a `_count` chart holding the count alone and a
/// `_rates` chart holding the four rates together. `_1M` carries the
/// one-minute rate.
pub fn meter(prefix: &str, name: &str, rates: &Metered) -> Emission {
    let base = concat(prefix, name);
    let count_channel = concat(&base, "_count");
    let fifteen_channel = concat(&base, "_15M");
    let five_channel = concat(&base, "_5M");
    let one_channel = concat(&base, "_1M");
    let mean_channel = concat(&base, "_mean");

    Emission {
        points: vec![
            (count_channel.clone(), rates.count as f64),
            (fifteen_channel.clone(), rates.fifteen_minute_rate),
            (five_channel.clone(), rates.five_minute_rate),
            (one_channel.clone(), rates.one_minute_rate),
            (mean_channel.clone(), rates.mean_rate),
        ],
        charts: vec![
            ChartSpec {
                name: count_channel.clone(),
                channels: vec![count_channel],
            },
            ChartSpec {
                name: concat(&base, "_rates"),
                channels: vec![fifteen_channel, five_channel, one_channel, mean_channel],
            },
        ],
    }
}

/// Adapt the distribution aspect of a timer.
///
/// Ten channels under `<prefix><name>` and one `_distribution` chart holding
/// all ten. The 99.9th percentile suffix is literally `_p999`.
pub fn summary(prefix: &str, name: &str, summary: &Summary) -> Emission {
    let base = concat(prefix, name);
    let points = vec![
        (concat(&base, "_p75"), summary.p75),
        (concat(&base, "_p95"), summary.p95),
        (concat(&base, "_p98"), summary.p98),
        (concat(&base, "_p99"), summary.p99),
        (concat(&base, "_p999"), summary.p999),
        (concat(&base, "_max"), summary.max),
        (concat(&base, "_min"), summary.min),
        (concat(&base, "_mean"), summary.mean),
        (concat(&base, "_median"), summary.median),
        (concat(&base, "_stdDev"), summary.std_dev),
    ];
    let members: Vec<String> = points.iter().map(|&(ref name, _)| name.clone()).collect();
    Emission {
        points: points,
        charts: vec![
            ChartSpec {
                name: concat(&base, "_distribution"),
                channels: members,
            },
        ],
    }
}
