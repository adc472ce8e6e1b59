//! Observation stream emitted by the actors.
//!
//! Actors call [`EventRecorder::record`] and move on; a recorder never
//! reports failure back to the protocol. Ordering across actors is whatever
//! order the recorder receives calls in; per actor, timestamps are monotonic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ferry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Stable vehicle identity, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(u32);

impl VehicleId {
    /// Wrap a raw identity.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw identity.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Identities `1..=pool_size`.
    pub fn pool(pool_size: usize) -> impl Iterator<Item = Self> {
        let upper = u32::try_from(pool_size).unwrap_or(u32::MAX);
        (1..=upper).map(Self)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which kind of actor emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Ferry,
    Vehicle,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ferry => write!(f, "Ferry"),
            Self::Vehicle => write!(f, "Car"),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Ferry docked: at startup and after every crossing.
    ArrivedAtDock,
    /// Ferry departed with a full load.
    LeftDock,
    /// Vehicle counted aboard.
    Boarded,
    /// Vehicle drove off.
    Disembarked,
}

impl EventKind {
    /// Observable event text.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::ArrivedAtDock => "arrives to new dock",
            Self::LeftDock => "leaves the dock",
            Self::Boarded => "entered the ferry",
            Self::Disembarked => "left the ferry",
        }
    }
}

/// One observation.
///
/// Serialized with an extra `event_text` field carrying [`Event::text`];
/// it is ignored when reading a log back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "EventRecord")]
pub struct Event {
    /// Seconds since simulation start.
    pub elapsed_secs: f64,
    /// Emitting actor kind.
    pub actor_kind: ActorKind,
    /// Vehicle identity; `None` for the ferry.
    pub actor_id: Option<VehicleId>,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// A ferry event.
    #[must_use]
    pub const fn ferry(kind: EventKind, elapsed_secs: f64) -> Self {
        Self {
            elapsed_secs,
            actor_kind: ActorKind::Ferry,
            actor_id: None,
            kind,
        }
    }

    /// A vehicle event.
    #[must_use]
    pub const fn vehicle(id: VehicleId, kind: EventKind, elapsed_secs: f64) -> Self {
        Self {
            elapsed_secs,
            actor_kind: ActorKind::Vehicle,
            actor_id: Some(id),
            kind,
        }
    }

    /// Observable event text.
    #[must_use]
    pub const fn text(&self) -> &'static str {
        self.kind.text()
    }
}

/// Wire form of [`Event`].
#[derive(Serialize)]
struct EventRecord {
    elapsed_secs: f64,
    actor_kind: ActorKind,
    actor_id: Option<VehicleId>,
    kind: EventKind,
    event_text: &'static str,
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            event_text: event.text(),
            elapsed_secs: event.elapsed_secs,
            actor_kind: event.actor_kind,
            actor_id: event.actor_id,
            kind: event.kind,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Clock : {:.4}] {}", self.elapsed_secs, self.actor_kind)?;
        if let Some(id) = self.actor_id {
            write!(f, " {id}")?;
        }
        write!(f, " {}", self.text())
    }
}

/// Sink for actor observations.
///
/// Implementations must not block for long and must swallow their own
/// failures: actors call this from inside the occupancy critical section.
pub trait EventRecorder: Send + Sync {
    /// Record one event.
    fn record(&self, event: Event);

    /// Flush buffered output at shutdown.
    ///
    /// # Errors
    ///
    /// Returns `Error::TeardownFailed` if buffered events could not be written.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered in-memory log.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl MemoryRecorder {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in record order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Number of events recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: Event) {
        lock(&self.events).push(event);
    }
}

/// Prints the display form of each event to stdout.
///
/// Events stamped after `cutoff` are suppressed so output stops at the end of
/// the operating window even while actors are still winding down. A failed
/// write (stdout closed by the reader) is logged once and printing stops.
pub struct ConsoleRecorder {
    cutoff: Option<Duration>,
    out: Mutex<Box<dyn Write + Send>>,
    broken: AtomicBool,
}

impl ConsoleRecorder {
    /// Print every event to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::to_writer(io::stdout())
    }

    /// Print every event to `out` instead of stdout.
    #[must_use]
    pub fn to_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            cutoff: None,
            out: Mutex::new(Box::new(out)),
            broken: AtomicBool::new(false),
        }
    }

    /// Print only events stamped within `window`.
    #[must_use]
    pub fn with_cutoff(mut self, window: Duration) -> Self {
        self.cutoff = Some(window);
        self
    }

    fn admits(&self, event: &Event) -> bool {
        self.cutoff
            .is_none_or(|cutoff| event.elapsed_secs <= cutoff.as_secs_f64())
    }

    /// Whether a write has failed and output was abandoned.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Relaxed)
    }
}

impl Default for ConsoleRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConsoleRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleRecorder")
            .field("cutoff", &self.cutoff)
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

impl EventRecorder for ConsoleRecorder {
    fn record(&self, event: Event) {
        if self.is_broken() || !self.admits(&event) {
            return;
        }
        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{event}").and_then(|()| out.flush()) {
            if !self.broken.swap(true, Ordering::Relaxed) {
                warn!(error = %e, "console output failed, no further events will be printed");
            }
        }
    }
}

/// Forwards events to `tracing` as structured records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        match event.actor_id {
            Some(id) => info!(
                target: "ferry::events",
                elapsed_secs = event.elapsed_secs,
                actor = %event.actor_kind,
                vehicle = %id,
                "{}",
                event.text()
            ),
            None => info!(
                target: "ferry::events",
                elapsed_secs = event.elapsed_secs,
                actor = %event.actor_kind,
                "{}",
                event.text()
            ),
        }
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesRecorder {
    /// Create (or truncate) the output file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| {
            Error::initialization_failed(format!("event log {}", path.display()), e.to_string())
        })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventRecorder for JsonLinesRecorder {
    fn record(&self, event: Event) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize event");
                return;
            }
        };
        let mut writer = lock(&self.writer);
        if let Err(e) = writeln!(writer, "{line}") {
            warn!(path = %self.path.display(), error = %e, "failed to write event");
        }
    }

    fn flush(&self) -> Result<()> {
        lock(&self.writer).flush().map_err(|e| {
            Error::teardown_failed(format!("event log {}", self.path.display()), e.to_string())
        })
    }
}

/// Forwards every event to each inner recorder in turn.
#[derive(Default)]
pub struct FanoutRecorder {
    sinks: Vec<Arc<dyn EventRecorder>>,
}

impl FanoutRecorder {
    /// Create an empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventRecorder>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanoutRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutRecorder")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventRecorder for FanoutRecorder {
    fn record(&self, event: Event) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }

    /// Flushes every sink, returning the first failure.
    fn flush(&self) -> Result<()> {
        self.sinks
            .iter()
            .map(|sink| sink.flush())
            .fold(Ok(()), |acc, next| acc.and(next))
    }
}

/// Read a JSON-lines event log written by [`JsonLinesRecorder`].
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read and
/// `Error::EventLogInvalid` naming the first malformed line.
pub fn read_json_lines(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let reader = BufReader::new(File::open(path)?);
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                serde_json::from_str::<Event>(&line)
                    .map_err(|e| Error::event_log_invalid(index.saturating_add(1), e.to_string())),
            ),
            Err(e) => Some(Err(Error::Io(e))),
        })
        .collect()
}
