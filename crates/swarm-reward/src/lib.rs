//! Reward monitoring for a swarm node.
//!
//! [`RewardMonitor`] drives the identity → peer id → rewards pipeline on a
//! fixed cadence and hands increases found by [`DeltaTracker`] to a
//! [`swarm_notify::Notifier`].

#![forbid(unsafe_code)]

pub mod delta;
pub mod monitor;

pub use delta::{Delta, DeltaTracker};
pub use monitor::{
    CycleOutcome, MonitorCadence, MonitorError, MonitorState, Pacer, Phase, RewardMonitor,
    TokioPacer,
};
