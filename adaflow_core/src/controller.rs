//! The multi-loop control engine.
//!
//! Each tick reads one telemetry snapshot and computes all four outputs
//! (temperature, pressure advance, fan, acceleration) from that snapshot
//! alone. The loops never feed each other's same-tick outputs, which keeps
//! the coupling between boost, governor, stress relief, and cooling free of
//! evaluation-order bugs.

use crate::config::EngineCfg;
use crate::crash::CrashDetector;
use crate::error::{FaultKind, Result};
use crate::governor::HeaterGovernor;
use crate::learn::GainLearner;
use crate::lookahead::FlowEstimator;
use crate::persist;
use crate::profile::{MaterialProfile, ProfileOverrides};
use crate::session_log::{SessionLog, SessionRow};
use crate::status::{ControllerStatus, FeatureSet, SubState, TickReport, TickStatus};
use crate::stress::StressLearner;
use crate::tap::CommandTap;
use crate::util::Ema;
use crate::wait::TempWait;
use adaflow_traits::{Actuator, Clock, LoadSensor, StateStore, Telemetry};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Values actually issued to the host, for per-channel dedup.
#[derive(Debug, Default, Clone, Copy)]
struct AppliedOutputs {
    temperature: Option<f32>,
    pressure_advance: Option<f32>,
    fan: Option<f32>,
    acceleration: Option<f32>,
    speed_factor: Option<f32>,
}

#[inline]
fn differs(prev: Option<f32>, next: f32) -> bool {
    prev.is_none_or(|p| (p - next).abs() > 1e-4)
}

/// Mutable per-session state; reset at session start.
#[derive(Debug, Clone)]
pub(crate) struct ControlState {
    pub enabled: bool,
    pub boost: f32,
    pub target_temp: f32,
    pub base_pa: f32,
    pub current_pa: f32,
    pub fan_target: f32,
    pub accel_override: Option<f32>,
    pub speed_factor: f32,
    pub first_layer: bool,
    pub sub_state: SubState,
    pub runaway_strikes: u32,
    pub runaway_total: u32,
    pub tick_count: u64,
    pub last_fault: Option<FaultKind>,
    pub effective_flow: f32,
    pub predicted_flow: f32,
    pub smoothed_flow: f32,
}

impl ControlState {
    fn fresh(profile: &MaterialProfile, runaway_total: u32) -> Self {
        Self {
            enabled: false,
            boost: 0.0,
            target_temp: profile.base_temp,
            base_pa: profile.base_pa,
            current_pa: profile.base_pa,
            fan_target: 0.0,
            accel_override: None,
            speed_factor: 1.0,
            first_layer: true,
            sub_state: SubState::Normal,
            runaway_strikes: 0,
            runaway_total,
            tick_count: 0,
            last_fault: None,
            effective_flow: 0.0,
            predicted_flow: 0.0,
            smoothed_flow: 0.0,
        }
    }
}

/// Unified engine for both dynamic (boxed) and static-dispatch use.
pub struct FlowController<T: Telemetry, A: Actuator> {
    telemetry: T,
    actuator: A,
    load: Option<Box<dyn LoadSensor + Send>>,
    store: Option<Box<dyn StateStore + Send>>,
    pub(crate) cfg: EngineCfg,
    pub(crate) materials: BTreeMap<String, adaflow_config::MaterialCfg>,
    pub(crate) overrides: ProfileOverrides,
    pub(crate) profile: MaterialProfile,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    estimator: Arc<FlowEstimator>,
    tap: Arc<CommandTap>,
    temp_wait: Arc<TempWait>,
    stress: StressLearner,
    crash: CrashDetector,
    governor: HeaterGovernor,
    pub(crate) learner: GainLearner,
    flow_ema: Ema,
    pub(crate) features: FeatureSet,
    pub(crate) state: ControlState,
    disable_flag: Arc<AtomicBool>,
    session_log: Option<SessionLog>,
    session_log_dir: Option<PathBuf>,
    session_log_flush_every: u32,
    last_applied: AppliedOutputs,
    last_tick_ms: Option<u64>,
    last_toolhead_speed: f32,
    layer_z: f32,
    layer_start_ms: u64,
    last_layer_duration_s: f32,
    session_start_ms: u64,
    load_warned: bool,
    telemetry_warned: bool,
    persist_warned: bool,
    filament_area: f32,
}

pub(crate) struct EngineParts<T, A> {
    pub telemetry: T,
    pub actuator: A,
    pub load: Option<Box<dyn LoadSensor + Send>>,
    pub store: Option<Box<dyn StateStore + Send>>,
    pub cfg: EngineCfg,
    pub materials: BTreeMap<String, adaflow_config::MaterialCfg>,
    pub material: String,
    pub overrides: ProfileOverrides,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub session_log_dir: Option<PathBuf>,
    pub session_log_flush_every: u32,
    pub lookahead_enabled: bool,
}

impl<T: Telemetry, A: Actuator> core::fmt::Debug for FlowController<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlowController")
            .field("material", &self.profile.name)
            .field("enabled", &self.state.enabled)
            .field("target_temp", &self.state.target_temp)
            .field("boost", &self.state.boost)
            .finish()
    }
}

impl<T: Telemetry, A: Actuator> FlowController<T, A> {
    pub(crate) fn assemble(parts: EngineParts<T, A>) -> Result<Self> {
        let EngineParts {
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
            lookahead_enabled,
        } = parts;

        let store_ref = store.as_deref().map(|s| s as &dyn StateStore);
        let profile = MaterialProfile::resolve(&material, &materials, store_ref, &overrides)
            .map_err(eyre::Report::new)?;

        let epoch = clock.now();
        let estimator = Arc::new(FlowEstimator::new(cfg.lookahead.clone()));
        let tap = Arc::new(CommandTap::new());
        if lookahead_enabled {
            // Ingestion runs on the command-dispatch context; only the
            // bounded buffer section is shared with the tick context.
            let est = estimator.clone();
            let tap_clock = clock.clone();
            tap.subscribe(move |cmd| {
                let now = tap_clock.ms_since(epoch);
                est.ingest(cmd, now);
            });
        }

        let features = FeatureSet {
            has_load_sensor: load.is_some(),
            has_lookahead: lookahead_enabled,
        };
        let filament_area = cfg.lookahead.filament_area();
        let tick_hz = cfg.control.tick_hz;
        if tick_hz == 0 {
            return Err(eyre::Report::new(crate::error::BuildError::InvalidConfig(
                "tick_hz must be > 0",
            )));
        }

        let state = ControlState::fresh(&profile, 0);
        let flow_ema = Ema::new(profile.smoothing);

        Ok(Self {
            telemetry,
            actuator,
            load,
            store,
            stress: StressLearner::new(cfg.stress.clone()),
            crash: CrashDetector::new(cfg.crash.clone()),
            governor: HeaterGovernor::new(cfg.governor.clone()),
            learner: GainLearner::new(cfg.learning.clone()),
            cfg,
            materials,
            overrides,
            profile,
            clock,
            epoch,
            estimator,
            tap,
            temp_wait: Arc::new(TempWait::new()),
            flow_ema,
            features,
            state,
            disable_flag: Arc::new(AtomicBool::new(false)),
            session_log: None,
            session_log_dir,
            session_log_flush_every,
            last_applied: AppliedOutputs::default(),
            last_tick_ms: None,
            last_toolhead_speed: 0.0,
            layer_z: 0.0,
            layer_start_ms: 0,
            last_layer_duration_s: f32::INFINITY,
            session_start_ms: 0,
            load_warned: false,
            telemetry_warned: false,
            persist_warned: false,
            filament_area,
        })
    }

    /// Start a session, optionally switching material. Resolution order:
    /// config defaults → persisted learned values → user overrides.
    pub fn start(&mut self, material: Option<&str>) -> Result<()> {
        let name = material.unwrap_or(&self.profile.name).to_string();
        let store_ref = self.store.as_deref().map(|s| s as &dyn StateStore);
        let profile = MaterialProfile::resolve(&name, &self.materials, store_ref, &self.overrides)
            .map_err(eyre::Report::new)?;

        // Resume learned state; a failing store is logged once and the
        // session starts from profile defaults.
        let mut runaway_total = 0;
        self.learner.reset();
        self.stress.clear();
        if let Some(store) = self.store.as_deref() {
            match persist::load(store, &name) {
                Ok(persisted) => {
                    self.learner.seed(persisted.gain_adjust);
                    for (bin, score) in persisted.stress_scores {
                        self.stress.seed(bin, score);
                    }
                    runaway_total = persisted.runaway_total;
                }
                Err(e) => {
                    tracing::warn!(error = %e, material = %name, "learned state unavailable; starting from profile defaults");
                }
            }
        }

        self.flow_ema = Ema::new(profile.smoothing);
        self.state = ControlState::fresh(&profile, runaway_total);
        self.state.enabled = true;
        self.profile = profile;
        self.crash.reset();
        self.last_applied = AppliedOutputs::default();
        self.last_tick_ms = None;
        self.last_toolhead_speed = 0.0;
        self.layer_z = 0.0;
        self.session_start_ms = self.clock.ms_since(self.epoch);
        self.layer_start_ms = self.session_start_ms;
        self.last_layer_duration_s = f32::INFINITY;
        self.load_warned = false;
        self.telemetry_warned = false;
        self.persist_warned = false;
        self.disable_flag.store(false, Ordering::Release);

        self.session_log = match &self.session_log_dir {
            Some(dir) => match SessionLog::create(dir, self.session_log_flush_every) {
                Ok(log) => Some(log),
                Err(e) => {
                    tracing::warn!(error = %e, "session log unavailable");
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            material = %self.profile.name,
            base_temp = self.profile.base_temp,
            base_pa = self.state.base_pa,
            "adaptive flow session started"
        );
        Ok(())
    }

    /// End the session: persist learned state, flush the session log, and
    /// return the host to unboosted values (best effort).
    pub fn stop(&mut self) {
        if !self.state.enabled {
            return;
        }
        self.state.enabled = false;
        self.persist_learned();
        if let Some(mut log) = self.session_log.take() {
            log.finish();
        }
        // Best-effort restore; failures degrade, never abort.
        if let Err(e) = self.actuator.set_temperature(self.profile.base_temp) {
            tracing::warn!(error = %e, "restore temperature failed");
        }
        if let Err(e) = self.actuator.set_speed_factor(1.0) {
            tracing::warn!(error = %e, "restore speed factor failed");
        }
        self.state.boost = 0.0;
        self.state.target_temp = self.profile.base_temp;
        self.state.speed_factor = 1.0;
        self.state.accel_override = None;
        tracing::info!(
            material = %self.profile.name,
            ticks = self.state.tick_count,
            "adaptive flow session stopped"
        );
    }

    /// One control tick. Never propagates host faults: a failing channel is
    /// logged and the loop degrades to "no adaptive behavior".
    pub fn tick(&mut self) -> Result<TickStatus> {
        if !self.state.enabled || self.disable_flag.load(Ordering::Acquire) {
            return Ok(TickStatus::Disabled);
        }

        let now = self.clock.ms_since(self.epoch);
        let timeout = Duration::from_millis(self.cfg.control.telemetry_timeout_ms);
        let sample = match self.telemetry.sample(timeout) {
            Ok(s) => s,
            Err(e) => {
                if !self.telemetry_warned {
                    self.telemetry_warned = true;
                    let mapped = crate::error::map_host_error_dyn(e.as_ref());
                    tracing::warn!(error = %mapped, "telemetry unavailable; skipping ticks until it recovers");
                }
                return Ok(TickStatus::Skipped);
            }
        };
        self.telemetry_warned = false;
        self.temp_wait.notify(sample.hotend_temp);

        let dt_s = match self.last_tick_ms.replace(now) {
            Some(prev) => ((now.saturating_sub(prev)) as f32 / 1_000.0)
                .max(crate::util::period_ms(self.cfg.control.tick_hz) as f32 / 1_000.0 * 0.1),
            None => crate::util::period_ms(self.cfg.control.tick_hz) as f32 / 1_000.0,
        };

        // Optional load reading; a dead register disables load-dependent
        // features for the session and is logged exactly once.
        let load_reading = if self.features.has_load_sensor {
            match self.load.as_mut().map(|l| l.read(timeout)) {
                Some(Ok(v)) => Some(v),
                Some(Err(e)) => {
                    if !self.load_warned {
                        self.load_warned = true;
                        let mapped = crate::error::map_host_error_dyn(e.as_ref());
                        tracing::warn!(error = %mapped, "load sensor unreadable; crash detection disabled");
                    }
                    self.features.has_load_sensor = false;
                    None
                }
                None => None,
            }
        } else {
            None
        };

        // Flow estimation: live telemetry wins for the current value when
        // the extruder is actually moving; lookahead supplies prediction.
        let live_flow = sample.extruder_velocity.max(0.0) * self.filament_area;
        let current_flow = if live_flow > 0.0 {
            live_flow
        } else if self.features.has_lookahead {
            self.estimator.current_flow(now)
        } else {
            0.0
        };
        let predicted_flow = if self.features.has_lookahead {
            self.estimator.predicted_flow(now, self.cfg.lookahead.horizon_ms)
        } else {
            0.0
        };
        let actual_flow = current_flow.max(predicted_flow);

        let gov = self.governor.assess(
            actual_flow,
            self.profile.base_temp,
            sample.fan_duty,
            sample.heater_duty,
            self.state.target_temp,
            sample.hotend_temp,
        );
        let effective_flow = gov.effective_flow;
        let smoothed_flow = self.flow_ema.update(effective_flow);

        self.state.first_layer = sample.z_height <= self.cfg.control.first_layer_z;

        // Layer bookkeeping feeds both the crash detector and smart cooling.
        if sample.z_height > self.layer_z + self.cfg.crash.min_layer_dz {
            // The jump from the starting Z is not a completed layer; only
            // boundaries after it yield a meaningful duration.
            if self.layer_z > 0.0 {
                self.last_layer_duration_s =
                    (now.saturating_sub(self.layer_start_ms)) as f32 / 1_000.0;
            }
            self.layer_start_ms = now;
            self.layer_z = sample.z_height;
            self.crash.on_layer_change();
        }
        if let Some(load) = load_reading {
            self.crash.observe(load, sample.extruder_velocity);
        }

        // Boost law: flow term + speed term + acceleration kick, gated and
        // clamped, then slew-limited (heat fast, cool slow).
        let flow_k = self.profile.flow_k + self.learner.adjustment();
        let kick = if sample.toolhead_velocity - self.last_toolhead_speed
            > self.cfg.control.accel_kick_threshold
        {
            self.cfg.control.accel_kick
        } else {
            0.0
        };
        self.last_toolhead_speed = sample.toolhead_velocity;

        let raw_boost = if self.state.first_layer {
            0.0
        } else {
            (smoothed_flow - self.profile.flow_gate).max(0.0) * flow_k
                + (sample.toolhead_velocity - self.cfg.control.speed_threshold).max(0.0)
                    * self.profile.speed_k
                + kick
        };
        let clamped = raw_boost.clamp(0.0, self.profile.max_boost);
        let prev_boost = self.state.boost;
        let mut boost = if clamped > prev_boost {
            prev_boost + (clamped - prev_boost).min(self.profile.ramp_rise * dt_s)
        } else {
            prev_boost - (prev_boost - clamped).min(self.profile.ramp_fall * dt_s)
        };
        let mut target_temp =
            (self.profile.base_temp + boost).clamp(self.profile.base_temp, self.profile.max_temp);

        // Thermal safety: runaway zeroes the boost immediately; three
        // consecutive runaway ticks force-disable the whole controller.
        let mut fault = None;
        if sample.hotend_temp > target_temp + self.cfg.safety.runaway_delta_c {
            fault = Some(FaultKind::ThermalRunaway);
            boost = 0.0;
            target_temp = self.profile.base_temp;
            self.state.runaway_strikes += 1;
            self.state.runaway_total += 1;
            tracing::warn!(
                actual = sample.hotend_temp,
                strikes = self.state.runaway_strikes,
                "thermal runaway suspected; boost reset"
            );
            if self.state.runaway_strikes >= self.cfg.safety.runaway_strikes {
                tracing::warn!("repeated thermal runaway; controller force-disabled");
                if let Err(e) = self.actuator.set_temperature(self.profile.base_temp) {
                    tracing::warn!(error = %e, "failsafe temperature restore failed");
                }
                self.state.boost = 0.0;
                self.state.target_temp = self.profile.base_temp;
                self.state.last_fault = fault;
                self.persist_learned();
                self.disable_flag.store(true, Ordering::Release);
                return Ok(TickStatus::Disabled);
            }
        } else {
            self.state.runaway_strikes = 0;
            if sample.hotend_temp < target_temp - self.cfg.safety.undertemp_delta_c && boost > 0.0 {
                fault = Some(FaultKind::ThermalUndertemp);
                boost /= 2.0;
                target_temp = (self.profile.base_temp + boost)
                    .clamp(self.profile.base_temp, self.profile.max_temp);
                tracing::warn!(
                    actual = sample.hotend_temp,
                    target = target_temp,
                    "heater lagging; boost halved"
                );
            }
        }

        let pressure_advance =
            (self.state.base_pa - boost * self.profile.pa_boost_k).max(0.0);

        let accel_override = self.stress.observe(
            sample.z_height,
            sample.toolhead_velocity,
            effective_flow,
            sample.heater_duty,
        );
        let speed_factor = self.crash.speed_factor();
        let sub_state = if self.crash.in_recovery() {
            SubState::CrashRecovery
        } else {
            SubState::Normal
        };

        // Smart cooling from effective flow and layer time, minus whatever
        // the governor asks back.
        let mut fan = self.cfg.control.fan_min + self.cfg.control.fan_flow_k * effective_flow;
        if self.last_layer_duration_s < self.cfg.control.short_layer_s {
            fan = self.cfg.control.fan_max;
        }
        let fan_target = (fan * (1.0 - gov.fan_reduction))
            .clamp(self.cfg.control.fan_min, self.cfg.control.fan_max);

        // Gain learning from the signed thermal error.
        let nudged = self.learner.record(target_temp - sample.hotend_temp);

        self.state.boost = boost;
        self.state.target_temp = target_temp;
        self.state.current_pa = pressure_advance;
        self.state.fan_target = fan_target;
        self.state.accel_override = accel_override;
        self.state.speed_factor = speed_factor;
        self.state.sub_state = sub_state;
        self.state.last_fault = fault;
        self.state.effective_flow = effective_flow;
        self.state.predicted_flow = predicted_flow;
        self.state.smoothed_flow = smoothed_flow;
        self.state.tick_count += 1;

        // A disable observed after this tick started must win: discard the
        // outputs instead of applying them.
        if self.disable_flag.load(Ordering::Acquire) {
            return Ok(TickStatus::Disabled);
        }
        self.apply_outputs();

        self.log_row(now, &sample);
        if nudged.is_some()
            || self
                .state
                .tick_count
                .is_multiple_of(self.cfg.control.persist_every_ticks.max(1))
        {
            self.persist_learned();
        }

        Ok(TickStatus::Active(TickReport {
            target_temp,
            boost,
            pressure_advance,
            fan_target,
            accel_override,
            speed_factor,
            effective_flow,
            predicted_flow,
            fault,
        }))
    }

    /// Issue changed outputs, one call per channel at most. Host failures
    /// are logged and the controller keeps running.
    fn apply_outputs(&mut self) {
        let s = &self.state;
        if differs(self.last_applied.temperature, s.target_temp) {
            match self.actuator.set_temperature(s.target_temp) {
                Ok(()) => self.last_applied.temperature = Some(s.target_temp),
                Err(e) => tracing::warn!(error = %e, "set_temperature failed"),
            }
        }
        if differs(self.last_applied.pressure_advance, s.current_pa) {
            match self.actuator.set_pressure_advance(s.current_pa) {
                Ok(()) => self.last_applied.pressure_advance = Some(s.current_pa),
                Err(e) => tracing::warn!(error = %e, "set_pressure_advance failed"),
            }
        }
        if differs(self.last_applied.fan, s.fan_target) {
            match self.actuator.set_fan(s.fan_target) {
                Ok(()) => self.last_applied.fan = Some(s.fan_target),
                Err(e) => tracing::warn!(error = %e, "set_fan failed"),
            }
        }
        match s.accel_override {
            Some(accel) => {
                if differs(self.last_applied.acceleration, accel) {
                    match self.actuator.set_acceleration(accel) {
                        Ok(()) => self.last_applied.acceleration = Some(accel),
                        Err(e) => tracing::warn!(error = %e, "set_acceleration failed"),
                    }
                }
            }
            // Override released: the planner owns acceleration again; a
            // future override must be re-issued even if numerically equal.
            None => self.last_applied.acceleration = None,
        }
        if differs(self.last_applied.speed_factor, s.speed_factor) {
            match self.actuator.set_speed_factor(s.speed_factor) {
                Ok(()) => self.last_applied.speed_factor = Some(s.speed_factor),
                Err(e) => tracing::warn!(error = %e, "set_speed_factor failed"),
            }
        }
    }

    fn log_row(&mut self, now: u64, sample: &adaflow_traits::TelemetrySample) {
        let Some(log) = self.session_log.as_mut() else {
            return;
        };
        log.record(&SessionRow {
            elapsed_s: (now.saturating_sub(self.session_start_ms)) as f32 / 1_000.0,
            temp_actual: sample.hotend_temp,
            temp_target: self.state.target_temp,
            boost: self.state.boost,
            flow: self.state.effective_flow,
            speed: sample.toolhead_velocity,
            pwm: sample.heater_duty,
            pa: self.state.current_pa,
            z_height: sample.z_height,
            predicted_flow: self.state.predicted_flow,
            dynz_active: self.state.accel_override.is_some(),
            accel: self.state.accel_override.unwrap_or(0.0),
        });
    }

    /// Write learned state through the store. Failures are non-fatal and
    /// logged once per session.
    pub(crate) fn persist_learned(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = persist::save(
            store.as_mut(),
            &self.profile.name,
            self.state.base_pa,
            self.learner.adjustment(),
            &self.stress.scores(),
            self.state.runaway_total,
        );
        if let Err(e) = result {
            if !self.persist_warned {
                self.persist_warned = true;
                tracing::warn!(error = %e, "state store unwritable; learned state not persisted");
            }
        } else {
            self.persist_warned = false;
        }
    }

    /// Read-only status snapshot; two calls with no intervening tick are
    /// identical.
    pub fn status(&self) -> ControllerStatus {
        let s = &self.state;
        ControllerStatus {
            enabled: s.enabled && !self.disable_flag.load(Ordering::Acquire),
            material: self.profile.name.clone(),
            base_temp: self.profile.base_temp,
            boost: s.boost,
            target_temp: s.target_temp,
            pressure_advance: s.current_pa,
            fan_target: s.fan_target,
            accel_override: s.accel_override,
            speed_factor: s.speed_factor,
            first_layer: s.first_layer,
            sub_state: s.sub_state,
            effective_flow: s.effective_flow,
            predicted_flow: s.predicted_flow,
            smoothed_flow: s.smoothed_flow,
            flow_gain_adjust: self.learner.adjustment(),
            runaway_strikes: s.runaway_strikes,
            runaway_total: s.runaway_total,
            last_fault: s.last_fault.map(FaultKind::name),
            has_load_sensor: self.features.has_load_sensor,
            has_lookahead: self.features.has_lookahead,
            tick_count: s.tick_count,
        }
    }

    /// Block the calling (dispatch) context until the hotend is within the
    /// configured tolerance of `target_c`. No timeout by design.
    pub fn wait_for_temperature(&self, target_c: f32) {
        self.temp_wait.wait_for(target_c, self.cfg.wait.tolerance_c);
    }

    pub fn command_tap(&self) -> Arc<CommandTap> {
        self.tap.clone()
    }

    pub fn flow_estimator(&self) -> Arc<FlowEstimator> {
        self.estimator.clone()
    }

    pub fn temp_wait(&self) -> Arc<TempWait> {
        self.temp_wait.clone()
    }

    /// Shared disable latch; setting it stops the next tick from applying
    /// outputs even if it is already in flight.
    pub fn disable_flag(&self) -> Arc<AtomicBool> {
        self.disable_flag.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        self.clock.clone()
    }

    pub fn tick_period_ms(&self) -> u64 {
        crate::util::period_ms(self.cfg.control.tick_hz)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled && !self.disable_flag.load(Ordering::Acquire)
    }

    pub(crate) fn store_mut(&mut self) -> Option<&mut (dyn StateStore + Send + 'static)> {
        self.store.as_deref_mut()
    }

    pub(crate) fn store_ref(&self) -> Option<&(dyn StateStore + Send)> {
        self.store.as_deref()
    }

    pub(crate) fn reset_stress(&mut self) {
        self.stress.clear();
    }
}

/// Boxed engine used by the session runner and the CLI.
pub type Engine =
    FlowController<Box<dyn Telemetry + Send>, Box<dyn Actuator + Send>>;
