//! Configuration assembly: CLI flags, a TOML file, environment fallbacks.
//!
//! Most deployments set nothing but the three `LOVELL_*` variables and let
//! everything else default. A config file is the same `Args` shape in TOML;
//! environment variables win over the file so credentials stay out of it.

use clap::{App, Arg};
use std::env;
use std::fs::File;
use std::io::Read;
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn default_version() -> String {
    VERSION.unwrap_or("unknown").to_string()
}

fn default_experiment() -> String {
    "lovell".to_string()
}

fn default_project() -> String {
    "default".to_string()
}

fn default_flush_interval() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

/// Runtime configuration for the lovell executable.
#[derive(Clone, Debug, Deserialize)]
pub struct Args {
    /// Tracking service host, with or without a scheme prefix.
    #[serde(default)]
    pub host: String,
    /// Basic-auth username for the tracking service.
    #[serde(default)]
    pub username: String,
    /// Basic-auth password for the tracking service.
    #[serde(default)]
    pub password: String,
    /// Experiment name, doubling as its description.
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Project the experiment files under.
    #[serde(default = "default_project")]
    pub project: String,
    /// Seconds between reporting cycles.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,
    /// Seconds between keepalive pings.
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Verbosity, counted off repeated `-v` flags. CLI only.
    #[serde(skip_deserializing)]
    pub verbose: u64,
    /// Lovell version string. Set automatically.
    #[serde(skip_deserializing, default = "default_version")]
    pub version: String,
}

impl Default for Args {
    fn default() -> Args {
        Args {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            experiment: default_experiment(),
            project: default_project(),
            flush_interval: default_flush_interval(),
            ping_interval: default_ping_interval(),
            verbose: 0,
            version: default_version(),
        }
    }
}

/// Parse a TOML document into `Args`. Missing keys default.
pub fn parse_config(buf: &str) -> Result<Args, toml::de::Error> {
    toml::from_str(buf)
}

/// Parse the lovell configuration.
///
/// Precedence, lowest to highest: defaults, the `--config` file, the
/// `LOVELL_HOST` / `LOVELL_USER` / `LOVELL_PASSWORD` environment variables.
pub fn parse_args() -> Args {
    let matches = App::new("lovell")
        .version(VERSION.unwrap_or("unknown"))
        .about("ships in-process metrics to an experiment tracker")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("path")
                .help("The config file to feed in.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
        .get_matches();

    let mut args = match matches.value_of("config-file") {
        Some(path) => {
            let mut buf = String::new();
            File::open(path)
                .expect("could not open config file")
                .read_to_string(&mut buf)
                .expect("could not read config file");
            parse_config(&buf).expect("could not parse config file")
        }
        None => Args::default(),
    };
    args.verbose = matches.occurrences_of("verbose");
    args.version = default_version();

    if let Ok(host) = env::var("LOVELL_HOST") {
        args.host = host;
    }
    if let Ok(username) = env::var("LOVELL_USER") {
        args.username = username;
    }
    if let Ok(password) = env::var("LOVELL_PASSWORD") {
        args.password = password;
    }

    args
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let args = parse_config("").unwrap();

        assert_eq!("", args.host);
        assert_eq!("lovell", args.experiment);
        assert_eq!("default", args.project);
        assert_eq!(10, args.flush_interval);
        assert_eq!(30, args.ping_interval);
        assert_eq!(0, args.verbose);
    }

    #[test]
    fn document_overrides_defaults() {
        let config = "host = \"track.example.com\"\n\
                      username = \"mlops\"\n\
                      experiment = \"resnet-sweep\"\n\
                      project = \"vision\"\n\
                      flush_interval = 5\n";
        let args = parse_config(config).unwrap();

        assert_eq!("track.example.com", args.host);
        assert_eq!("mlops", args.username);
        assert_eq!("", args.password);
        assert_eq!("resnet-sweep", args.experiment);
        assert_eq!("vision", args.project);
        assert_eq!(5, args.flush_interval);
        assert_eq!(30, args.ping_interval);
    }

    #[test]
    fn unknown_keys_are_rejected_gently() {
        // serde tolerates unknown keys unless told otherwise; a typo'd key
        // silently defaults. Assert it so a change here is a conscious one.
        let args = parse_config("flsh_interval = 5\n").unwrap();
        assert_eq!(10, args.flush_interval);
    }
}
