#![allow(unknown_lints)]

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate lovell;

#[macro_use]
extern crate log;

use chrono::Utc;
use lovell::config;
use lovell::metric::{Event, GaugeValue, MetricSample, Readout, Sampler};
use lovell::reporter::{FlushTimer, Reporter};
use lovell::tracker::{RemoteJob, Tracker};
use std::process;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Reports the process's own vital signs: enough to keep a session visibly
/// alive in the tracker and to smoke-test a deployment end to end.
struct SelfSampler {
    started: Instant,
    cycles: i64,
}

impl SelfSampler {
    fn new() -> SelfSampler {
        SelfSampler {
            started: Instant::now(),
            cycles: 0,
        }
    }
}

impl Sampler for SelfSampler {
    fn sample(&mut self) -> Readout {
        self.cycles += 1;
        let mut readout = Readout::new();
        readout.add("reporter_cycles", MetricSample::Counter(self.cycles));
        readout.add(
            "uptime_seconds",
            MetricSample::Gauge(GaugeValue::Numeric(self.started.elapsed().as_secs() as f64)),
        );
        readout
    }
}

fn connect(args: &config::Args) -> Tracker {
    match Tracker::new(&args.host, &args.username, &args.password) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!("invalid tracker configuration: {}", e);
            process::exit(1);
        }
    }
}

fn main() {
    // chan_signal insists on being set up before any thread spawns.
    let signal =
        chan_signal::notify(&[chan_signal::Signal::INT, chan_signal::Signal::TERM]);

    let args = config::parse_args();

    let level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                record.target(),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("could not set up logging");

    info!("lovell - {}", args.version);

    if args.host.is_empty() || args.username.is_empty() || args.password.is_empty() {
        error!("host, username and password must all be set; see LOVELL_HOST, LOVELL_USER, LOVELL_PASSWORD");
        process::exit(1);
    }

    let tracker = connect(&args);
    let job_id = match tracker.create_experiment(&args.experiment, &args.experiment, &args.project)
    {
        Ok(id) => id,
        Err(e) => {
            error!("could not create experiment: {}", e);
            process::exit(1);
        }
    };
    info!("created experiment, job {}", job_id);

    if let Err(e) = tracker.mark_executing(&job_id) {
        error!("could not mark job executing: {}", e);
        process::exit(1);
    }

    let ping_tracker = connect(&args);
    let ping_interval = args.ping_interval;
    thread::spawn(move || loop {
        thread::sleep(Duration::new(ping_interval, 0));
        if let Err(e) = ping_tracker.ping(&job_id) {
            warn!("keepalive ping failed: {}", e);
        }
    });

    let (send, recv) = mpsc::channel();

    let flush_send = send.clone();
    let flush_interval = args.flush_interval;
    thread::spawn(move || {
        FlushTimer::new(flush_send, flush_interval).run();
    });

    let job = RemoteJob::new(connect(&args), job_id);
    let reporter_worker = thread::spawn(move || {
        let mut sampler = SelfSampler::new();
        let mut reporter = Reporter::new(job);
        reporter.run(recv, &mut sampler);
        info!(
            "reporter stopped after creating {} channels and {} charts",
            reporter.channel_count(),
            reporter.chart_count()
        );
    });

    signal.recv().unwrap();
    info!("shutdown signal received");

    send.send(Event::Shutdown).expect("reporter hung up early");
    reporter_worker.join().expect("failed to join reporter");

    if let Err(e) = tracker.mark_completed(&job_id) {
        error!("could not mark job completed: {}", e);
        process::exit(1);
    }
    info!("job {} marked completed", job_id);
}
