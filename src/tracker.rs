//! Thin HTTP client for the experiment-tracking service.
//!
//! Everything here is deliberately dumb CRUD over basic auth: create an
//! experiment, flip its lifecycle states, make channels and charts, append
//! points. No retries, no batching, no state beyond the session's base URL
//! and credentials. The interesting behavior -- at-most-once creation --
//! lives in `registry`, not here.

use hyper;
use hyper::Client;
use hyper::header::{Authorization, Basic, Connection, ContentType};
use hyper::status::StatusCode;
use registry::{ChannelId, ChartId, Job};
use serde::Serialize;
use serde_json;
use std::fmt;
use std::io;
use std::io::Read;
use url;
use url::Url;
use uuid;
use uuid::Uuid;

const UNSUPPORTED: &'static str = "unsupported";

/// Failures raised by the tracking service or the transport under it.
#[derive(Debug)]
pub enum Error {
    /// The HTTP request itself failed: connect, DNS, broken pipe.
    Http(hyper::Error),
    /// The service answered with a non-success status.
    Status(StatusCode),
    /// A payload could not be encoded or a reply could not be decoded.
    Json(serde_json::Error),
    /// The configured host or a derived endpoint is not a valid URL.
    Url(url::ParseError),
    /// Reading a reply body failed mid-stream.
    Io(io::Error),
    /// An id in a reply did not parse as a UUID.
    Id(uuid::ParseError),
    /// The service replied with something structurally unexpected.
    BadReply(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Http(ref e) => write!(f, "http failure: {}", e),
            Error::Status(status) => write!(f, "unexpected status: {}", status),
            Error::Json(ref e) => write!(f, "payload failure: {}", e),
            Error::Url(ref e) => write!(f, "bad url: {}", e),
            Error::Io(ref e) => write!(f, "reply read failure: {}", e),
            Error::Id(ref e) => write!(f, "bad id in reply: {}", e),
            Error::BadReply(ref detail) => write!(f, "bad reply: {}", detail),
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Error {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Error {
        Error::Url(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<uuid::ParseError> for Error {
    fn from(e: uuid::ParseError) -> Error {
        Error::Id(e)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueuedExperiment<'a> {
    name: &'a str,
    description: &'a str,
    project: &'a str,
    tags: Vec<String>,
    parameters: Vec<String>,
    parameter_values: Vec<String>,
    properties: Vec<String>,
    requirements: Vec<String>,
    dump_dir_location: &'static str,
    dump_dir_root: &'static str,
    source_code_location: &'static str,
    docker_image: &'static str,
    enqueue_command: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutingJob {
    dump_dir_location: &'static str,
    source_code_location: &'static str,
    stdout_log_location: &'static str,
    stderr_log_location: &'static str,
    run_command: &'static str,
    docker_image: &'static str,
    parameter_values: Vec<String>,
}

#[derive(Serialize)]
struct CompletedJob {
    state: &'static str,
    traceback: &'static str,
}

#[derive(Serialize)]
struct NewChannel<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    channel_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartSeries {
    channel_id: String,
}

#[derive(Serialize)]
struct NewChart<'a> {
    name: &'a str,
    series: Vec<ChartSeries>,
}

#[derive(Serialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedExperiment {
    best_job: Option<JobRef>,
}

#[derive(Deserialize)]
struct JobRef {
    id: String,
}

#[derive(Deserialize)]
struct IdReply {
    id: String,
}

fn scrub_host(host: &str) -> &str {
    if host.starts_with("https://") {
        &host["https://".len()..]
    } else if host.starts_with("http://") {
        &host["http://".len()..]
    } else {
        host
    }
}

/// A basic-auth session against one tracking service.
pub struct Tracker {
    base: Url,
    username: String,
    password: String,
    client: Client,
}

impl Tracker {
    /// Build a session against `host`. Any scheme prefix on `host` is
    /// scrubbed; the service speaks https.
    pub fn new(host: &str, username: &str, password: &str) -> Result<Tracker, Error> {
        let base = Url::parse(&format!("https://{}", scrub_host(host)))?;
        Ok(Tracker {
            base: base,
            username: username.to_string(),
            password: password.to_string(),
            client: Client::new(),
        })
    }

    fn post<T>(&self, path: &str, body: Option<&T>) -> Result<String, Error>
    where
        T: Serialize,
    {
        let url = self.base.join(path)?;
        let payload = match body {
            Some(body) => serde_json::to_string(body)?,
            None => String::new(),
        };
        let mut res = self.client
            .post(url)
            .header(ContentType::json())
            .header(Authorization(Basic {
                username: self.username.clone(),
                password: Some(self.password.clone()),
            }))
            .header(Connection::keep_alive())
            .body(payload.as_str())
            .send()?;
        if !res.status.is_success() {
            return Err(Error::Status(res.status));
        }
        let mut buf = String::new();
        res.read_to_string(&mut buf)?;
        Ok(buf)
    }

    /// Queue a new experiment and return the id of the job backing it.
    pub fn create_experiment(
        &self,
        name: &str,
        description: &str,
        project: &str,
    ) -> Result<Uuid, Error> {
        let params = QueuedExperiment {
            name: name,
            description: description,
            project: project,
            tags: Vec::new(),
            parameters: Vec::new(),
            parameter_values: Vec::new(),
            properties: Vec::new(),
            requirements: vec![format!("run-key-{}", Uuid::new_v4())],
            dump_dir_location: UNSUPPORTED,
            dump_dir_root: UNSUPPORTED,
            source_code_location: UNSUPPORTED,
            docker_image: UNSUPPORTED,
            enqueue_command: UNSUPPORTED,
        };
        let reply = self.post("experiments", Some(&params))?;
        let created: CreatedExperiment = serde_json::from_str(&reply)?;
        match created.best_job {
            Some(job) => Ok(Uuid::parse_str(&job.id)?),
            None => Err(Error::BadReply("experiment has no job".to_string())),
        }
    }

    /// Flip the job into its executing state.
    pub fn mark_executing(&self, job: &Uuid) -> Result<(), Error> {
        let params = ExecutingJob {
            dump_dir_location: UNSUPPORTED,
            source_code_location: UNSUPPORTED,
            stdout_log_location: UNSUPPORTED,
            stderr_log_location: UNSUPPORTED,
            run_command: UNSUPPORTED,
            docker_image: UNSUPPORTED,
            parameter_values: Vec::new(),
        };
        self.post(&format!("jobs/{}/markExecuting", job), Some(&params))?;
        Ok(())
    }

    /// Flip the job into its completed state, succeeded.
    pub fn mark_completed(&self, job: &Uuid) -> Result<(), Error> {
        let params = CompletedJob {
            state: "SUCCEEDED",
            traceback: "",
        };
        self.post(&format!("jobs/{}/markCompleted", job), Some(&params))?;
        Ok(())
    }

    /// Keepalive. The service reaps jobs that go quiet for too long.
    pub fn ping(&self, job: &Uuid) -> Result<(), Error> {
        self.post::<Point>(&format!("jobs/{}/ping", job), None)?;
        Ok(())
    }
}

/// A `Job` implementation bound to one created experiment.
pub struct RemoteJob {
    tracker: Tracker,
    job: Uuid,
}

impl RemoteJob {
    /// Bind `tracker` to the job `id` produced by `create_experiment`.
    pub fn new(tracker: Tracker, id: Uuid) -> RemoteJob {
        RemoteJob {
            tracker: tracker,
            job: id,
        }
    }

    /// The id of the backing job.
    pub fn job_id(&self) -> &Uuid {
        &self.job
    }
}

impl Job for RemoteJob {
    fn create_channel(&mut self, name: &str) -> Result<ChannelId, Error> {
        let body = NewChannel {
            name: name,
            channel_type: "numeric",
        };
        let reply = self.tracker
            .post(&format!("jobs/{}/channels", self.job), Some(&body))?;
        let created: IdReply = serde_json::from_str(&reply)?;
        Ok(ChannelId::from(Uuid::parse_str(&created.id)?))
    }

    fn create_chart(&mut self, name: &str, channels: &[ChannelId]) -> Result<ChartId, Error> {
        let body = NewChart {
            name: name,
            series: channels
                .iter()
                .map(|id| {
                    ChartSeries {
                        channel_id: id.to_string(),
                    }
                })
                .collect(),
        };
        let reply = self.tracker
            .post(&format!("jobs/{}/charts", self.job), Some(&body))?;
        let created: IdReply = serde_json::from_str(&reply)?;
        Ok(ChartId::from(Uuid::parse_str(&created.id)?))
    }

    fn send_point(&mut self, channel: ChannelId, x: f64, y: f64) -> Result<(), Error> {
        let body = Point { x: x, y: y };
        self.tracker.post(
            &format!("jobs/{}/channels/{}/values", self.job, channel),
            Some(&body),
        )?;
        Ok(())
    }
}
