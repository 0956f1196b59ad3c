//! The Hearth scheduling engine: materialises annual schedules into
//! dated, timed device actions, runs them against a virtualisable clock
//! with per-operation timeouts and preconditions, and records every
//! outcome as status entries and a structured event stream.
//!
//! The moving parts:
//! - [`spec`] / [`dates`]: compiled schedules (actions, repeats,
//!   preconditions, active-day sets);
//! - [`annual`]: day-by-day materialisation, DST-correct repeats;
//! - [`order`]: co-scheduling (`before`/`after`) adjacency;
//! - [`runtime`] / [`runner`]: per-schedule execution and the parallel
//!   fleet with cancellation;
//! - [`sim`]: multi-year replay on driven clocks;
//! - [`status`] / [`logfile`]: the status recorder and the scannable
//!   event log;
//! - [`config`]: the YAML binding;
//! - [`device`] / [`clock`]: the external seams.

pub mod annual;
pub mod clock;
pub mod config;
pub mod dates;
pub mod device;
pub mod error;
pub mod logfile;
pub mod order;
pub mod runner;
pub mod runtime;
pub mod sim;
pub mod spec;
pub mod status;
pub mod testing;

pub use annual::{Active, Scheduled};
pub use clock::{Clock, SimClock, SystemClock};
pub use config::{CompiledSystem, SystemConfig};
pub use device::{Device, DeviceRegistry, OpRequest, OutputWriter};
pub use error::{Error, Result};
pub use logfile::{Event, EventKind, EventLog, EventScanner};
pub use runner::{Runner, ScheduleJob};
pub use runtime::ScheduleRuntime;
pub use sim::Simulation;
pub use spec::{ActionSpec, AnnualSpec, Due, OrderHint, Precondition, RepeatSpec};
pub use status::{Status, StatusRecord, StatusRecorder};
