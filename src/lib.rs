//! Lovell is a metrics reporter for experiment-tracking services. It samples
//! an in-process registry of counters, gauges, meters and timers on a fixed
//! interval and publishes every value as a named numeric time series -- a
//! "channel" -- on the remote side, grouping derived series into composite
//! "charts". Lovell is intended to sit inside long-running training or batch
//! jobs and make their vital signs visible in the tracking UI without any
//! hand-rolled plumbing.
//!
//! Why you might choose to use lovell:
//!
//!  * You already instrument with counters, gauges, meters and timers and
//!    want those series in your experiment tracker, not a second system.
//!  * You want channel and chart creation to happen lazily, exactly once per
//!    name, no matter how many reporting cycles run.
//!  * You want a failed publish to cost you one metric for one cycle, never
//!    the whole cycle.
//!
//! The layering is strict: `metric` holds the sample model, `adapter` turns
//! samples into named values and chart groupings, `registry` memoizes remote
//! handles, `reporter` drives one cycle per scheduler tick and `tracker`
//! speaks HTTP to the backend.
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate clap;
extern crate hyper;
extern crate serde;
extern crate serde_json;
extern crate toml;
extern crate url;
extern crate uuid;

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;

pub mod adapter;
pub mod config;
pub mod metric;
pub mod registry;
pub mod reporter;
pub mod time;
pub mod tracker;
