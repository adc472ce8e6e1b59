//! Ferry crossing simulation.
//!
//! A ferry of fixed capacity shuttles a fixed pool of vehicles between two
//! docks. Each cycle is a two-phase barrier: the ferry opens boarding and
//! departs only once exactly `capacity` vehicles are aboard, then opens
//! unboarding and returns to boarding only once every vehicle is off.
//!
//! The ferry and each vehicle run on their own OS thread and meet through a
//! [`Rendezvous`] of two counting gates, two single-shot latches and one
//! occupancy counter. The [`Supervisor`] starts the actors, keeps the
//! operating window open and then stops them. Every observable step is an
//! [`Event`] handed to an [`EventRecorder`]; [`audit`] replays a recorded log
//! and reports any cycle that broke the protocol.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod actors;
pub mod audit;
pub mod clock;
pub mod config;
pub mod events;
pub mod occupancy;
pub mod rendezvous;
pub mod shutdown;
pub mod signal;
pub mod supervisor;

pub use actors::{ActorContext, FerryActor, FerryStats, StopReason, VehicleActor, VehicleStats};
pub use audit::{AuditReport, Violation, audit};
pub use clock::Clock;
pub use config::{JitterRange, SimulationConfig};
pub use events::{
    ActorKind, ConsoleRecorder, Event, EventKind, EventRecorder, FanoutRecorder,
    JsonLinesRecorder, MemoryRecorder, TracingRecorder, VehicleId, read_json_lines,
};
pub use ferry_core::{Error, Result};
pub use occupancy::OccupancyCounter;
pub use rendezvous::Rendezvous;
pub use shutdown::{ShutdownCoordinator, ShutdownPhase, ShutdownSignal, ShutdownStats};
pub use signal::{Gate, Latch, WaitOutcome};
pub use supervisor::{Simulation, SimulationReport, Supervisor};
