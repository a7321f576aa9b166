#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Adaptive flow control engine (host-agnostic).
//!
//! Closed-loop, soft-real-time control of hotend temperature, pressure
//! advance, part-cooling fan, and acceleration, driven by live and
//! predicted filament flow. All host interactions go through the
//! `adaflow_traits` traits; a firmware host supplies telemetry and
//! actuation and feeds outgoing motion commands to the command tap.
//!
//! ## Architecture
//!
//! - **Command tap**: synchronous broadcast of tapped motion commands
//!   (`tap` module), feeding the lookahead buffer on the dispatch context
//! - **Flow estimation**: rolling time-windowed segment buffer with lazy
//!   eviction and window-integrated prediction (`lookahead`)
//! - **Control loop**: fixed-period tick fusing flow, load, heater duty,
//!   and Z into four outputs from one snapshot (`controller`)
//! - **Stress learner**: persistent per-height acceleration relief
//!   (`stress`)
//! - **Crash detector**: layer-scoped load-spike throttling (`crash`)
//! - **Heater governor**: sustainable-flow capping (`governor`)
//! - **Persistence**: flat key→value learned state (`persist`)

pub mod builder;
pub mod commands;
pub mod config;
pub mod controller;
pub mod crash;
pub mod error;
pub mod gcode;
pub mod governor;
pub mod learn;
pub mod lookahead;
pub mod mocks;
pub mod persist;
pub mod profile;
pub mod runner;
pub mod session_log;
pub mod status;
pub mod stress;
pub mod tap;
pub mod util;
pub mod wait;

pub use builder::{EngineBuilder, Missing, Set};
pub use commands::{Command, CommandReply};
pub use config::{
    ControlCfg, CrashCfg, EngineCfg, GovernorCfg, LearningCfg, LookaheadCfg, SafetyCfg, StressCfg,
    WaitCfg,
};
pub use controller::{Engine, FlowController};
pub use error::{BuildError, FaultKind, FlowError, Result};
pub use gcode::{GcodeCommand, MoveCmd};
pub use lookahead::{FlowEstimator, MotionSegment};
pub use profile::{MaterialProfile, ProfileOverrides};
pub use runner::Session;
pub use status::{ControllerStatus, FeatureSet, SubState, TickReport, TickStatus};
pub use tap::CommandTap;
pub use wait::TempWait;
