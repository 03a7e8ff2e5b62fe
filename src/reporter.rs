//! The reporting cycle: one snapshot in, channel points and charts out.
//!
//! A `Reporter` owns the remote job handle and both registries for the life
//! of a session. The external scheduler only ever sees `run`, which consumes
//! ticks off an mpsc channel and serializes cycles; a slow remote call makes
//! queued ticks coalesce rather than stack.

use adapter;
use adapter::Emission;
use metric::{Event, Readout, Sampler};
use registry::{ChannelId, ChannelRegistry, ChartRegistry, Job};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::sleep;
use std::time::Duration;
use time::Stamp;
use tracker;

/// Aggregate outcome of one reporting cycle.
///
/// A cycle never aborts on a remote failure; it abandons the offending
/// metric, counts the failure here and moves on. Callers that care can log
/// or alert on `failures`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleReport {
    /// Points appended across all channels.
    pub points: usize,
    /// Charts created this cycle. Zero once the metric set stabilizes.
    pub charts: usize,
    /// Gauges skipped for carrying non-numeric values. Not failures.
    pub skipped_gauges: usize,
    /// Remote channel or chart creations that failed.
    pub creation_failures: usize,
    /// Point appends to existing channels that failed.
    pub append_failures: usize,
}

impl CycleReport {
    /// Remote failures of either class this cycle.
    pub fn failures(&self) -> usize {
        self.creation_failures + self.append_failures
    }

    /// True if every adapted value made it to the remote side.
    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }
}

enum Failure {
    Creation(tracker::Error),
    Append(tracker::Error),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Idle,
    Reporting,
}

/// Drives one reporting cycle per scheduler tick.
pub struct Reporter<J> {
    job: J,
    channels: ChannelRegistry,
    charts: ChartRegistry,
    stamp: Stamp,
    state: State,
    cycle: u64,
}

impl<J> Reporter<J>
where
    J: Job,
{
    /// Create a reporter over `job` with fresh, empty registries.
    pub fn new(job: J) -> Reporter<J> {
        Reporter {
            job: job,
            channels: ChannelRegistry::new(),
            charts: ChartRegistry::new(),
            stamp: Stamp::new(),
            state: State::Idle,
            cycle: 0,
        }
    }

    /// The remote job handle. Mostly useful to tests inspecting a mock.
    pub fn job(&self) -> &J {
        &self.job
    }

    /// Channels created so far this session.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Charts created so far this session.
    pub fn chart_count(&self) -> usize {
        self.charts.len()
    }

    /// Cycles completed so far this session.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Run one cycle over `readout`.
    ///
    /// Category order is fixed -- counters, gauges, meters, timers with the
    /// timer's rate aspect ahead of its distribution -- and every point in
    /// the cycle shares one stamp.
    pub fn report(&mut self, readout: &Readout) -> CycleReport {
        debug_assert_eq!(State::Idle, self.state);
        self.state = State::Reporting;
        let now = self.stamp.next();
        let mut tally = CycleReport::default();

        for (name, count) in readout.counters() {
            self.publish(adapter::counter(name, *count), now, &mut tally);
        }
        for (name, value) in readout.gauges() {
            match adapter::gauge(name, value) {
                Some(emission) => self.publish(emission, now, &mut tally),
                None => {
                    trace!("gauge {} is non-numeric, skipping", name);
                    tally.skipped_gauges += 1;
                }
            }
        }
        for (name, rates) in readout.meters() {
            self.publish(adapter::meter(adapter::METER_PREFIX, name, rates), now, &mut tally);
        }
        for (name, timing) in readout.timers() {
            self.publish(
                adapter::meter(adapter::TIMER_PREFIX, name, &timing.rates),
                now,
                &mut tally,
            );
            self.publish(
                adapter::summary(adapter::TIMER_PREFIX, name, &timing.summary),
                now,
                &mut tally,
            );
        }

        self.cycle += 1;
        self.state = State::Idle;
        tally
    }

    /// Consume ticks until shutdown, pulling a fresh readout per cycle.
    ///
    /// Ticks that queued up behind a slow cycle are coalesced into the next
    /// one, so cycles never overlap and never stack.
    pub fn run<S>(&mut self, ticks: Receiver<Event>, sampler: &mut S)
    where
        S: Sampler,
    {
        while let Ok(event) = ticks.recv() {
            let mut idx = match event {
                Event::Shutdown => return,
                Event::Tick(idx) => idx,
            };
            // A tick that has been received is owed its cycle, even if a
            // shutdown is already queued behind it.
            let mut shutdown = false;
            loop {
                match ticks.try_recv() {
                    Ok(Event::Tick(next)) => idx = next,
                    Ok(Event::Shutdown) => {
                        shutdown = true;
                        break;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            let readout = sampler.sample();
            let tally = self.report(&readout);
            if tally.is_clean() {
                debug!("cycle {} published {} points", idx, tally.points);
            } else {
                warn!(
                    "cycle {} published {} points with {} failures",
                    idx,
                    tally.points,
                    tally.failures()
                );
            }
            if shutdown {
                return;
            }
        }
    }

    fn publish(&mut self, emission: Emission, now: f64, tally: &mut CycleReport) {
        match self.publish_inner(&emission, now, tally) {
            Ok(()) => {}
            Err(Failure::Creation(e)) => {
                tally.creation_failures += 1;
                warn!("remote creation failed, abandoning metric: {}", e);
            }
            Err(Failure::Append(e)) => {
                tally.append_failures += 1;
                warn!("point append failed, abandoning metric: {}", e);
            }
        }
    }

    fn publish_inner(
        &mut self,
        emission: &Emission,
        now: f64,
        tally: &mut CycleReport,
    ) -> Result<(), Failure> {
        for &(ref name, value) in &emission.points {
            let id = self.channels
                .get_or_create(&mut self.job, name)
                .map_err(Failure::Creation)?;
            self.job
                .send_point(id, now, value)
                .map_err(Failure::Append)?;
            tally.points += 1;
        }
        for spec in &emission.charts {
            let mut members: Vec<ChannelId> = Vec::with_capacity(spec.channels.len());
            for name in &spec.channels {
                let id = self.channels
                    .get_or_create(&mut self.job, name)
                    .map_err(Failure::Creation)?;
                members.push(id);
            }
            let before = self.charts.len();
            self.charts
                .get_or_create(&mut self.job, &spec.name, &members)
                .map_err(Failure::Creation)?;
            if self.charts.len() > before {
                tally.charts += 1;
            }
        }
        Ok(())
    }
}

/// The source of reporting ticks: one `Event::Tick` per interval, forever.
///
/// Runs on its own thread; the reporter thread owns the receiving half.
pub struct FlushTimer {
    send: Sender<Event>,
    interval: u64,
}

impl FlushTimer {
    /// Create a timer ticking every `interval` seconds into `send`.
    pub fn new(send: Sender<Event>, interval: u64) -> FlushTimer {
        FlushTimer {
            send: send,
            interval: interval,
        }
    }

    /// Tick until the receiving side hangs up.
    pub fn run(&mut self) {
        let period = Duration::new(self.interval, 0);
        let mut idx: u64 = 0;
        loop {
            idx += 1;
            sleep(period);
            if self.send.send(Event::Tick(idx)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use metric::{GaugeValue, MetricSample, Readout};
    use registry::{ChannelId, ChartId};
    use std::collections::{HashMap, HashSet};
    use std::sync::mpsc;
    use tracker::Error;
    use uuid::Uuid;

    struct MemoryJob {
        channels: HashMap<String, ChannelId>,
        channel_creations: usize,
        chart_creations: usize,
        points: Vec<(ChannelId, f64, f64)>,
        refuse: HashSet<String>,
    }

    impl MemoryJob {
        fn new() -> MemoryJob {
            MemoryJob {
                channels: HashMap::new(),
                channel_creations: 0,
                chart_creations: 0,
                points: Vec::new(),
                refuse: HashSet::new(),
            }
        }
    }

    impl Job for MemoryJob {
        fn create_channel(&mut self, name: &str) -> Result<ChannelId, Error> {
            if self.refuse.contains(name) {
                return Err(Error::BadReply("refused".to_string()));
            }
            self.channel_creations += 1;
            let id = ChannelId::from(Uuid::new_v4());
            self.channels.insert(name.to_string(), id);
            Ok(id)
        }

        fn create_chart(&mut self, _: &str, _: &[ChannelId]) -> Result<ChartId, Error> {
            self.chart_creations += 1;
            Ok(ChartId::from(Uuid::new_v4()))
        }

        fn send_point(&mut self, channel: ChannelId, x: f64, y: f64) -> Result<(), Error> {
            self.points.push((channel, x, y));
            Ok(())
        }
    }

    struct FixedSampler {
        calls: usize,
    }

    impl Sampler for FixedSampler {
        fn sample(&mut self) -> Readout {
            self.calls += 1;
            let mut readout = Readout::new();
            readout.add("ticks", MetricSample::Counter(self.calls as i64));
            readout
        }
    }

    #[test]
    fn repeated_cycles_reuse_channels_and_charts() {
        let mut reporter = Reporter::new(MemoryJob::new());

        let mut readout = Readout::new();
        readout.add("requests", MetricSample::Counter(5));

        let first = reporter.report(&readout);
        assert_eq!(1, first.points);
        assert_eq!(1, first.charts);

        readout.add("requests", MetricSample::Counter(9));
        let second = reporter.report(&readout);
        assert_eq!(1, second.points);
        assert_eq!(0, second.charts);

        assert_eq!(1, reporter.job().channel_creations);
        assert_eq!(1, reporter.job().chart_creations);

        let points = &reporter.job().points;
        assert_eq!(2, points.len());
        assert_eq!(5.0, points[0].2);
        assert_eq!(9.0, points[1].2);
        assert!(points[0].1 < points[1].1);
    }

    #[test]
    fn creation_failure_abandons_only_that_metric() {
        let mut job = MemoryJob::new();
        job.refuse.insert("counter_bad".to_string());
        let mut reporter = Reporter::new(job);

        let mut readout = Readout::new();
        readout.add("bad", MetricSample::Counter(1));
        readout.add("good", MetricSample::Counter(2));

        let tally = reporter.report(&readout);

        assert_eq!(1, tally.creation_failures);
        assert_eq!(0, tally.append_failures);
        assert_eq!(1, tally.points);
        assert_eq!(1, tally.charts);
        assert!(reporter.job().channels.contains_key("counter_good"));
        assert!(!reporter.job().channels.contains_key("counter_bad"));
    }

    #[test]
    fn text_gauges_are_counted_not_failed() {
        let mut reporter = Reporter::new(MemoryJob::new());

        let mut readout = Readout::new();
        readout.add(
            "build",
            MetricSample::Gauge(GaugeValue::Text("a1b2c3".to_string())),
        );

        let tally = reporter.report(&readout);

        assert_eq!(1, tally.skipped_gauges);
        assert!(tally.is_clean());
        assert_eq!(0, tally.points);
        assert_eq!(0, reporter.channel_count());
        assert_eq!(0, reporter.chart_count());
    }

    #[test]
    fn queued_ticks_coalesce_into_one_cycle() {
        let (send, recv) = mpsc::channel();
        send.send(Event::Tick(1)).unwrap();
        send.send(Event::Tick(2)).unwrap();
        send.send(Event::Tick(3)).unwrap();
        send.send(Event::Shutdown).unwrap();

        let mut reporter = Reporter::new(MemoryJob::new());
        let mut sampler = FixedSampler { calls: 0 };
        reporter.run(recv, &mut sampler);

        assert_eq!(1, sampler.calls);
        assert_eq!(1, reporter.job().points.len());
    }

    #[test]
    fn timer_reports_both_aspects() {
        use metric::{Metered, Summary, Timing};

        let mut reporter = Reporter::new(MemoryJob::new());
        let mut readout = Readout::new();
        readout.add(
            "latency",
            MetricSample::Timer(Timing {
                rates: Metered {
                    count: 3,
                    one_minute_rate: 1.0,
                    five_minute_rate: 2.0,
                    fifteen_minute_rate: 3.0,
                    mean_rate: 4.0,
                },
                summary: Summary {
                    p75: 1.0,
                    p95: 2.0,
                    p98: 3.0,
                    p99: 4.0,
                    p999: 5.0,
                    min: 0.5,
                    max: 6.0,
                    mean: 2.0,
                    median: 1.5,
                    std_dev: 0.7,
                },
            }),
        );

        let tally = reporter.report(&readout);

        // five rate channels plus ten distribution channels
        assert_eq!(15, tally.points);
        // _count, _rates, _distribution
        assert_eq!(3, tally.charts);
        assert!(reporter.job().channels.contains_key("timer_latency_1M"));
        assert!(reporter.job().channels.contains_key("timer_latency_p999"));
        // the distribution is a chart, never a channel
        assert!(!reporter.job().channels.contains_key("timer_latency_distribution"));
        assert_eq!(1, reporter.cycles());
    }
}
