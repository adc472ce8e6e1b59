//! Offline verification of a recorded event stream.
//!
//! Replays events in record order against the ferry's phase model and
//! collects every protocol violation it finds. A log cut off mid-cycle by
//! shutdown is not a violation; the report exposes the partial state instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::events::{ActorKind, Event, EventKind, VehicleId};

/// A broken protocol rule, with the index of the offending event.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Violation {
    #[error("event {index}: vehicle {vehicle} boarded while boarding was closed")]
    BoardedOutsideBoarding { index: usize, vehicle: VehicleId },

    #[error("event {index}: vehicle {vehicle} boarded while already aboard")]
    DoubleOccupancy { index: usize, vehicle: VehicleId },

    #[error("event {index}: vehicle {vehicle} boarded a full ferry")]
    CapacityExceeded { index: usize, vehicle: VehicleId },

    #[error("event {index}: ferry left with {occupancy} of {capacity} aboard")]
    DepartedNotFull {
        index: usize,
        occupancy: usize,
        capacity: usize,
    },

    #[error("event {index}: ferry left the dock while not boarding")]
    UnexpectedDeparture { index: usize },

    #[error("event {index}: ferry arrived without crossing")]
    UnexpectedArrival { index: usize },

    #[error("event {index}: vehicle {vehicle} disembarked before the ferry docked")]
    DisembarkedOutsideUnloading { index: usize, vehicle: VehicleId },

    #[error("event {index}: vehicle {vehicle} disembarked without being aboard")]
    NotAboard { index: usize, vehicle: VehicleId },

    #[error("event {index}: timestamp went backwards for {actor}")]
    TimeWentBackwards { index: usize, actor: String },

    #[error("event {index}: vehicle event without an identity")]
    MissingIdentity { index: usize },
}

/// Where the ferry is in its cycle, as far as the log shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No dock arrival seen yet.
    NotStarted,
    /// Boarding is open.
    Boarding,
    /// Departed, not yet arrived.
    Crossing,
    /// Docked after a crossing, vehicles driving off.
    Unboarding,
}

/// Summary of an audited log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Capacity the log was checked against.
    pub capacity: usize,
    /// Full cycles: boarded to capacity, crossed, emptied.
    pub cycles_completed: u64,
    /// Ferry departures.
    pub departures: u64,
    /// Ferry dock arrivals, including the initial one.
    pub arrivals: u64,
    /// Boarded events per vehicle.
    pub boarded: BTreeMap<VehicleId, u64>,
    /// Disembarked events per vehicle.
    pub disembarked: BTreeMap<VehicleId, u64>,
    /// Highest occupancy reached.
    pub max_occupancy: usize,
    /// Occupancy at the end of the log.
    pub final_occupancy: usize,
    /// Phase at the end of the log.
    pub final_phase: Phase,
    /// Every rule broken, in log order.
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Whether the log satisfied every rule.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Boarded events for one vehicle.
    #[must_use]
    pub fn boarded_count(&self, vehicle: VehicleId) -> u64 {
        self.boarded.get(&vehicle).copied().unwrap_or(0)
    }

    /// Disembarked events for one vehicle.
    #[must_use]
    pub fn disembarked_count(&self, vehicle: VehicleId) -> u64 {
        self.disembarked.get(&vehicle).copied().unwrap_or(0)
    }

    /// Whether the log ended part-way through a cycle.
    #[must_use]
    pub fn ended_mid_cycle(&self) -> bool {
        self.final_occupancy > 0 || matches!(self.final_phase, Phase::Crossing | Phase::Unboarding)
    }
}

struct Replay {
    capacity: usize,
    phase: Phase,
    aboard: BTreeSet<VehicleId>,
    last_stamp: HashMap<Option<VehicleId>, f64>,
    report: AuditReport,
}

impl Replay {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            phase: Phase::NotStarted,
            aboard: BTreeSet::new(),
            last_stamp: HashMap::new(),
            report: AuditReport {
                capacity,
                cycles_completed: 0,
                departures: 0,
                arrivals: 0,
                boarded: BTreeMap::new(),
                disembarked: BTreeMap::new(),
                max_occupancy: 0,
                final_occupancy: 0,
                final_phase: Phase::NotStarted,
                violations: Vec::new(),
            },
        }
    }

    fn violate(&mut self, violation: Violation) {
        self.report.violations.push(violation);
    }

    fn apply(&mut self, index: usize, event: &Event) {
        self.check_monotonic(index, event);

        match (event.actor_kind, event.kind) {
            (ActorKind::Ferry, EventKind::ArrivedAtDock) => self.arrived(index),
            (ActorKind::Ferry, EventKind::LeftDock) => self.departed(index),
            (ActorKind::Vehicle, EventKind::Boarded) => match event.actor_id {
                Some(vehicle) => self.boarded(index, vehicle),
                None => self.violate(Violation::MissingIdentity { index }),
            },
            (ActorKind::Vehicle, EventKind::Disembarked) => match event.actor_id {
                Some(vehicle) => self.disembarked(index, vehicle),
                None => self.violate(Violation::MissingIdentity { index }),
            },
            // Ferries never board and vehicles never sail; such entries carry no protocol step.
            _ => {}
        }
    }

    fn check_monotonic(&mut self, index: usize, event: &Event) {
        let key = event.actor_id;
        if let Some(previous) = self.last_stamp.insert(key, event.elapsed_secs) {
            if event.elapsed_secs < previous {
                let actor = key.map_or_else(|| "ferry".to_string(), |id| format!("vehicle {id}"));
                self.violate(Violation::TimeWentBackwards { index, actor });
            }
        }
    }

    fn arrived(&mut self, index: usize) {
        match self.phase {
            Phase::NotStarted => self.phase = Phase::Boarding,
            Phase::Crossing => self.phase = Phase::Unboarding,
            Phase::Boarding | Phase::Unboarding => {
                self.violate(Violation::UnexpectedArrival { index });
            }
        }
        self.report.arrivals = self.report.arrivals.saturating_add(1);
    }

    fn departed(&mut self, index: usize) {
        if self.phase != Phase::Boarding {
            self.violate(Violation::UnexpectedDeparture { index });
        } else if self.aboard.len() != self.capacity {
            self.violate(Violation::DepartedNotFull {
                index,
                occupancy: self.aboard.len(),
                capacity: self.capacity,
            });
        }
        self.phase = Phase::Crossing;
        self.report.departures = self.report.departures.saturating_add(1);
    }

    fn boarded(&mut self, index: usize, vehicle: VehicleId) {
        if self.phase != Phase::Boarding {
            self.violate(Violation::BoardedOutsideBoarding { index, vehicle });
        }
        if self.aboard.len() >= self.capacity {
            self.violate(Violation::CapacityExceeded { index, vehicle });
        }
        if !self.aboard.insert(vehicle) {
            self.violate(Violation::DoubleOccupancy { index, vehicle });
        }

        let count = self.report.boarded.entry(vehicle).or_insert(0);
        *count = count.saturating_add(1);
        self.report.max_occupancy = self.report.max_occupancy.max(self.aboard.len());
    }

    fn disembarked(&mut self, index: usize, vehicle: VehicleId) {
        if self.phase != Phase::Unboarding {
            self.violate(Violation::DisembarkedOutsideUnloading { index, vehicle });
        }
        if !self.aboard.remove(&vehicle) {
            self.violate(Violation::NotAboard { index, vehicle });
        }

        let count = self.report.disembarked.entry(vehicle).or_insert(0);
        *count = count.saturating_add(1);

        if self.phase == Phase::Unboarding && self.aboard.is_empty() {
            self.phase = Phase::Boarding;
            self.report.cycles_completed = self.report.cycles_completed.saturating_add(1);
        }
    }

    fn finish(mut self) -> AuditReport {
        self.report.final_occupancy = self.aboard.len();
        self.report.final_phase = self.phase;
        self.report
    }
}

/// Replay `events` in order and check them against the boarding protocol.
#[must_use]
pub fn audit(events: &[Event], capacity: usize) -> AuditReport {
    let mut replay = Replay::new(capacity);
    for (index, event) in events.iter().enumerate() {
        replay.apply(index, event);
    }
    replay.finish()
}
