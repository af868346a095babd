//! Multilevel feedback queue scheduler simulator.
//!
//! Build an [`Mlfq`] from a list of level [`Policy`]s, submit
//! [`ProcessDescriptor`]s and call [`Mlfq::run`]. The engine records the
//! execution timeline and per-process metrics.

pub mod error;
pub mod mlfq;
pub mod process;
pub mod schedulers;
pub mod utils;

pub use error::SchedError;
pub use mlfq::{Averages, Interval, Mlfq};
pub use process::{ProcId, Process, ProcessDescriptor};
pub use schedulers::{parse_scheme, preset, valid_scheme, Policy};
