//! Get-or-create caches over remote channel and chart handles.
//!
//! Channel and chart creation are remote calls; the registries here make
//! sure each happens at most once per name for the life of a reporting
//! session. Exclusive access is structural -- both registries hand out
//! nothing but values and take `&mut self` -- so a single-threaded reporter
//! needs no locking and a multi-threaded caller is forced to bring its own.

use std::collections::HashMap;
use std::fmt;
use tracker::Error;
use uuid::Uuid;

/// Opaque handle to a remote numeric time series.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChannelId(Uuid);

impl From<Uuid> for ChannelId {
    fn from(id: Uuid) -> ChannelId {
        ChannelId(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to a remote composite chart.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChartId(Uuid);

impl From<Uuid> for ChartId {
    fn from(id: Uuid) -> ChartId {
        ChartId(id)
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The remote collaborator behind a reporting session.
///
/// Implementations do not deduplicate: calling `create_channel` twice with
/// one name makes two remote channels. Idempotence is the registries' job.
pub trait Job {
    /// Create a remote numeric channel under `name`.
    fn create_channel(&mut self, name: &str) -> Result<ChannelId, Error>;
    /// Create a remote chart under `name` grouping `channels`, in order.
    fn create_chart(&mut self, name: &str, channels: &[ChannelId]) -> Result<ChartId, Error>;
    /// Append one (x, y) point to an existing channel.
    fn send_point(&mut self, channel: ChannelId, x: f64, y: f64) -> Result<(), Error>;
}

/// Name-keyed cache of channel handles.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    inner: HashMap<String, ChannelId>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> ChannelRegistry {
        ChannelRegistry {
            inner: HashMap::new(),
        }
    }

    /// Resolve `name` to its channel handle, creating the remote channel on
    /// first sight. A creation failure is propagated and leaves no cache
    /// entry behind, so a later cycle is free to try again.
    pub fn get_or_create<J>(&mut self, job: &mut J, name: &str) -> Result<ChannelId, Error>
    where
        J: Job,
    {
        if let Some(id) = self.inner.get(name) {
            return Ok(*id);
        }
        let id = job.create_channel(name)?;
        debug!("created channel {} as {}", name, id);
        self.inner.insert(name.to_string(), id);
        Ok(id)
    }

    /// Number of channels created so far this session.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if no channel has been created yet.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Name-keyed cache of chart handles.
///
/// Membership is fixed at first creation: on a cache hit the `channels`
/// argument is ignored, even if it differs from the set that created the
/// entry. Changing a metric's grouping after its first report is therefore a
/// no-op for the life of the session.
#[derive(Debug, Default)]
pub struct ChartRegistry {
    inner: HashMap<String, ChartId>,
}

impl ChartRegistry {
    /// Create an empty registry.
    pub fn new() -> ChartRegistry {
        ChartRegistry {
            inner: HashMap::new(),
        }
    }

    /// Resolve `name` to its chart handle, creating the remote chart over
    /// `channels` on first sight only.
    pub fn get_or_create<J>(
        &mut self,
        job: &mut J,
        name: &str,
        channels: &[ChannelId],
    ) -> Result<ChartId, Error>
    where
        J: Job,
    {
        if let Some(id) = self.inner.get(name) {
            return Ok(*id);
        }
        let id = job.create_chart(name, channels)?;
        debug!("created chart {} as {}", name, id);
        self.inner.insert(name.to_string(), id);
        Ok(id)
    }

    /// Number of charts created so far this session.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if no chart has been created yet.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tracker::Error;
    use uuid::Uuid;

    struct CountingJob {
        channel_creations: usize,
        chart_creations: usize,
        chart_members: Vec<ChannelId>,
        refuse_channels: bool,
    }

    impl CountingJob {
        fn new() -> CountingJob {
            CountingJob {
                channel_creations: 0,
                chart_creations: 0,
                chart_members: Vec::new(),
                refuse_channels: false,
            }
        }
    }

    impl Job for CountingJob {
        fn create_channel(&mut self, _: &str) -> Result<ChannelId, Error> {
            if self.refuse_channels {
                return Err(Error::BadReply("refused".to_string()));
            }
            self.channel_creations += 1;
            Ok(ChannelId::from(Uuid::new_v4()))
        }

        fn create_chart(&mut self, _: &str, channels: &[ChannelId]) -> Result<ChartId, Error> {
            self.chart_creations += 1;
            self.chart_members = channels.to_vec();
            Ok(ChartId::from(Uuid::new_v4()))
        }

        fn send_point(&mut self, _: ChannelId, _: f64, _: f64) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn channel_get_or_create_is_idempotent() {
        let mut job = CountingJob::new();
        let mut registry = ChannelRegistry::new();

        let first = registry.get_or_create(&mut job, "x").unwrap();
        let second = registry.get_or_create(&mut job, "x").unwrap();

        assert_eq!(first, second);
        assert_eq!(1, job.channel_creations);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn distinct_names_create_distinct_channels() {
        let mut job = CountingJob::new();
        let mut registry = ChannelRegistry::new();

        let a = registry.get_or_create(&mut job, "a").unwrap();
        let b = registry.get_or_create(&mut job, "b").unwrap();

        assert!(a != b);
        assert_eq!(2, job.channel_creations);
    }

    #[test]
    fn failed_channel_creation_is_not_cached() {
        let mut job = CountingJob::new();
        job.refuse_channels = true;
        let mut registry = ChannelRegistry::new();

        assert!(registry.get_or_create(&mut job, "x").is_err());
        assert!(registry.is_empty());

        job.refuse_channels = false;
        assert!(registry.get_or_create(&mut job, "x").is_ok());
        assert_eq!(1, job.channel_creations);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn chart_membership_is_fixed_at_first_creation() {
        let mut job = CountingJob::new();
        let mut registry = ChartRegistry::new();
        let a = ChannelId::from(Uuid::new_v4());
        let b = ChannelId::from(Uuid::new_v4());
        let z = ChannelId::from(Uuid::new_v4());

        let first = registry.get_or_create(&mut job, "c", &[a, b]).unwrap();
        let second = registry.get_or_create(&mut job, "c", &[a, b, z]).unwrap();

        assert_eq!(first, second);
        assert_eq!(1, job.chart_creations);
        assert_eq!(vec![a, b], job.chart_members);
    }
}
