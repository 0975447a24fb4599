//! Polling change detector for the storage root.
//!
//! Every tick the set of immediate child directory names is compared with
//! the previous tick. Additions are reported as `new` events and removals
//! as `del` events, each group in lexicographic order. Folders present when
//! the detector starts are never reported.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

use crate::{
    channel::EventSender,
    error::{Error, Result},
    event::ChangeEvent,
    walker,
};

/// Cooperative stop signal shared between the detector and its owner.
///
/// Cloning yields another handle to the same signal. Waiting on the handle
/// returns as soon as [`StopHandle::stop`] is called, so shutdown does not
/// wait out the poll interval.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`. Returns `true` if the stop signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Compute the events that turn `previous` into `current`.
///
/// All `new` events come first, then all `del` events, each sorted by name.
pub fn diff(
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
) -> Vec<ChangeEvent> {
    let added = current.difference(previous).map(ChangeEvent::new_folder);
    let removed = previous.difference(current).map(ChangeEvent::deleted_folder);
    added.chain(removed).collect()
}

#[derive(Debug, Clone)]
pub struct Detector {
    root: PathBuf,
    poll_interval: Duration,
    include_hidden: bool,
}

impl Detector {
    /// Negative and NaN intervals clamp to zero.
    pub fn new(
        root: impl Into<PathBuf>,
        poll_interval_secs: f64,
        include_hidden: bool,
    ) -> Self {
        Self {
            root: root.into(),
            poll_interval: clamp_interval(poll_interval_secs),
            include_hidden,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Seed a poller with the current listing. Fails if the root is absent.
    pub fn start(&self) -> Result<Poller> {
        if !self.root.exists() {
            return Err(Error::RootNotFound(self.root.clone()));
        }
        let previous =
            walker::list_child_folders(&self.root, self.include_hidden);
        tracing::debug!(
            root = %self.root.display(),
            folders = previous.len(),
            "seeded change detector"
        );
        Ok(Poller {
            detector: self.clone(),
            previous,
        })
    }

    /// Poll until `stop` is set, sending every change to `sender`.
    ///
    /// Blocks the calling thread. Fails with [`Error::RootNotFound`] only if
    /// the root is missing at call time; later scan failures count as an
    /// empty listing for that tick. Events the channel refuses are lost.
    pub fn run(
        &self,
        sender: &EventSender,
        stop: Option<&StopHandle>,
    ) -> Result<()> {
        self.start()?.run(sender, stop);
        Ok(())
    }
}

/// Holds the previous listing between ticks.
#[derive(Debug)]
pub struct Poller {
    detector: Detector,
    previous: BTreeSet<String>,
}

impl Poller {
    /// Run one tick: rescan the root and return what changed.
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        let current = walker::list_child_folders(
            &self.detector.root,
            self.detector.include_hidden,
        );
        let events = diff(&self.previous, &current);
        self.previous = current;
        events
    }

    pub fn known(&self) -> &BTreeSet<String> {
        &self.previous
    }

    /// Tick until `stop` is set. Without a stop handle this never returns.
    pub fn run(mut self, sender: &EventSender, stop: Option<&StopHandle>) {
        let root = self.detector.root.clone();
        let interval = self.detector.poll_interval;
        let idle = StopHandle::new();
        let stop = stop.unwrap_or(&idle);

        tracing::info!(
            root = %root.display(),
            interval_ms = interval.as_millis() as u64,
            "watching for folder changes"
        );

        while !stop.is_stopped() {
            for event in self.poll() {
                tracing::debug!(
                    kind = ?event.event,
                    folder = %event.folder_name,
                    "folder change"
                );
                sender.send(event);
            }

            if stop.wait_timeout(interval) {
                break;
            }
        }

        tracing::info!(root = %root.display(), "change detector stopped");
    }
}

fn clamp_interval(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
