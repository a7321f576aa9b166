//! Type-state builder for the engine.
//!
//! Telemetry, actuator, and material are mandatory and tracked in the type
//! so `build()` only exists once all three are set; `try_build()` stays
//! available in any state and reports what is missing.

use crate::config::EngineCfg;
use crate::controller::{Engine, EngineParts, FlowController};
use crate::error::{BuildError, Result};
use crate::profile::ProfileOverrides;
use adaflow_traits::clock::MonotonicClock;
use adaflow_traits::{Actuator, Clock, LoadSensor, StateStore, Telemetry};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

// Type-state markers
pub struct Missing;
pub struct Set;

pub struct EngineBuilder<T, A, M> {
    telemetry: Option<Box<dyn Telemetry + Send>>,
    actuator: Option<Box<dyn Actuator + Send>>,
    load: Option<Box<dyn LoadSensor + Send>>,
    store: Option<Box<dyn StateStore + Send>>,
    cfg: Option<EngineCfg>,
    materials: Option<BTreeMap<String, adaflow_config::MaterialCfg>>,
    material: Option<String>,
    overrides: ProfileOverrides,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    session_log_dir: Option<PathBuf>,
    session_log_flush_every: u32,
    lookahead: bool,
    _t: PhantomData<T>,
    _a: PhantomData<A>,
    _m: PhantomData<M>,
}

impl Default for EngineBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            telemetry: None,
            actuator: None,
            load: None,
            store: None,
            cfg: None,
            materials: None,
            material: None,
            overrides: ProfileOverrides::default(),
            clock: None,
            session_log_dir: None,
            session_log_flush_every: 30,
            lookahead: true,
            _t: PhantomData,
            _a: PhantomData,
            _m: PhantomData,
        }
    }
}

impl Engine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder<Missing, Missing, Missing> {
        EngineBuilder::default()
    }
}

/// Chainable setters that do not affect type-state.
impl<T, A, M> EngineBuilder<T, A, M> {
    pub fn with_cfg(mut self, cfg: EngineCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_materials(
        mut self,
        materials: BTreeMap<String, adaflow_config::MaterialCfg>,
    ) -> Self {
        self.materials = Some(materials);
        self
    }

    pub fn with_load_sensor(mut self, load: impl LoadSensor + Send + 'static) -> Self {
        self.load = Some(Box::new(load));
        self
    }

    pub fn with_store(mut self, store: impl StateStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_overrides(mut self, overrides: ProfileOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Provide a custom clock implementation; defaults to MonotonicClock.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_session_log(mut self, dir: PathBuf, flush_every: u32) -> Self {
        self.session_log_dir = Some(dir);
        self.session_log_flush_every = flush_every.max(1);
        self
    }

    /// Disable the lookahead path (no command tap wired on this host).
    pub fn without_lookahead(mut self) -> Self {
        self.lookahead = false;
        self
    }

    /// Fallible build available in any type-state; reports missing pieces.
    pub fn try_build(self) -> Result<Engine> {
        let EngineBuilder {
            telemetry,
            actuator,
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: _,
            _a: _,
            _m: _,
        } = self;

        let telemetry = telemetry.ok_or_else(|| eyre::Report::new(BuildError::MissingTelemetry))?;
        let actuator = actuator.ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let material = material.ok_or_else(|| eyre::Report::new(BuildError::MissingProfile))?;

        let cfg = cfg.unwrap_or_default();
        let materials = materials.unwrap_or_else(|| {
            let mut m = BTreeMap::new();
            m.insert(material.clone(), adaflow_config::MaterialCfg::default());
            m
        });
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        // Validate configs (non-panicking; typed errors).
        if cfg.control.tick_hz == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "tick_hz must be > 0",
            )));
        }
        if cfg.lookahead.window_ms == 0 || cfg.lookahead.horizon_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "lookahead window and horizon must be > 0",
            )));
        }
        if cfg.lookahead.filament_diameter_mm <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filament diameter must be > 0",
            )));
        }
        if cfg.control.fan_min < 0.0
            || cfg.control.fan_max > 1.0
            || cfg.control.fan_min > cfg.control.fan_max
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "fan bounds must satisfy 0 <= min <= max <= 1",
            )));
        }
        if cfg.stress.score_decay < 0.0 || cfg.stress.score_decay >= 1.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "stress score decay must be within [0, 1)",
            )));
        }
        if cfg.stress.deactivate_score >= cfg.stress.activate_score {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "stress deactivate score must be below activate score",
            )));
        }
        if cfg.safety.runaway_strikes == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "runaway strikes must be > 0",
            )));
        }
        if cfg.learning.window == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "learning window must be > 0",
            )));
        }
        for (name, m) in &materials {
            if m.base_temp <= 0.0 || m.max_temp < m.base_temp {
                tracing::error!(material = %name, "invalid material temperatures");
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "material temperatures must satisfy 0 < base <= max",
                )));
            }
            if m.ramp_rise <= 0.0 || m.ramp_fall <= 0.0 {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "material ramps must be > 0",
                )));
            }
            if m.max_boost < 0.0 || m.default_pa < 0.0 {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "material boost and PA must be >= 0",
                )));
            }
        }

        FlowController::assemble(EngineParts {
            telemetry,
            actuator,
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead_enabled: lookahead,
        })
    }
}

// Setters that advance type-state when providing mandatory components.
impl<A, M> EngineBuilder<Missing, A, M> {
    pub fn with_telemetry(
        self,
        telemetry: impl Telemetry + Send + 'static,
    ) -> EngineBuilder<Set, A, M> {
        let EngineBuilder {
            telemetry: _,
            actuator,
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: _,
            _a: _,
            _m: _,
        } = self;
        EngineBuilder {
            telemetry: Some(Box::new(telemetry)),
            actuator,
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: PhantomData,
            _a: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<T, M> EngineBuilder<T, Missing, M> {
    pub fn with_actuator(
        self,
        actuator: impl Actuator + Send + 'static,
    ) -> EngineBuilder<T, Set, M> {
        let EngineBuilder {
            telemetry,
            actuator: _,
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: _,
            _a: _,
            _m: _,
        } = self;
        EngineBuilder {
            telemetry,
            actuator: Some(Box::new(actuator)),
            load,
            store,
            cfg,
            materials,
            material,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: PhantomData,
            _a: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<T, A> EngineBuilder<T, A, Missing> {
    pub fn with_material(self, name: impl Into<String>) -> EngineBuilder<T, A, Set> {
        let EngineBuilder {
            telemetry,
            actuator,
            load,
            store,
            cfg,
            materials,
            material: _,
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: _,
            _a: _,
            _m: _,
        } = self;
        EngineBuilder {
            telemetry,
            actuator,
            load,
            store,
            cfg,
            materials,
            material: Some(name.into()),
            overrides,
            clock,
            session_log_dir,
            session_log_flush_every,
            lookahead,
            _t: PhantomData,
            _a: PhantomData,
            _m: PhantomData,
        }
    }
}

impl EngineBuilder<Set, Set, Set> {
    /// Validate and build the engine. Only available when telemetry,
    /// actuator, and material are all set.
    pub fn build(self) -> Result<Engine> {
        self.try_build()
    }
}
