//! Host-side adapters: a simulated printer for development and tests, a
//! simulated strain register, and a file-backed state store.
//!
//! A real firmware host (Klipper/Moonraker or similar) supplies the same
//! `Telemetry`/`Actuator` surface; everything here stands in for it so the
//! engine can be exercised end to end without a printer.

pub mod error;
pub mod store;

pub use error::HostError;
pub use store::FileStore;

use adaflow_traits::{Actuator, DynError, LoadSensor, Telemetry, TelemetrySample};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const AMBIENT_C: f32 = 25.0;

#[derive(Debug)]
struct SimState {
    target_temp: f32,
    temp: f32,
    heater_duty: f32,
    fan: f32,
    pa: f32,
    accel: f32,
    speed_factor: f32,
    extruder_velocity: f32,
    toolhead_velocity: f32,
    z_height: f32,
    last_step: Option<Instant>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            target_temp: 0.0,
            temp: AMBIENT_C,
            heater_duty: 0.0,
            fan: 0.0,
            pa: 0.0,
            accel: 5_000.0,
            speed_factor: 1.0,
            extruder_velocity: 0.0,
            toolhead_velocity: 0.0,
            z_height: 0.0,
            last_step: None,
        }
    }
}

impl SimState {
    /// Advance the first-order thermal model by the wall time since the last
    /// sample. Duty tracks the deficit plus the holding power needed against
    /// ambient loss and fan cooling.
    fn step(&mut self, now: Instant) {
        let dt = match self.last_step.replace(now) {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f32(),
            None => 0.0,
        };
        if dt <= 0.0 {
            return;
        }
        if self.target_temp <= 0.0 {
            // Heater off: decay toward ambient.
            self.heater_duty = 0.0;
            self.temp += (AMBIENT_C - self.temp) * (dt * 0.02).min(1.0);
            return;
        }
        let hold = (self.target_temp - AMBIENT_C) / 300.0 + self.fan * 0.12;
        let deficit = self.target_temp - self.temp;
        self.heater_duty = (hold + deficit * 0.06).clamp(0.0, 1.0);
        // Heating power less losses, integrated over dt.
        let heat = self.heater_duty * 4.0;
        let loss = (self.temp - AMBIENT_C) * 0.012 + self.fan * 0.5;
        self.temp += (heat - loss) * dt;
    }
}

/// Shared simulated printer. `telemetry()` and `actuator()` hand out the two
/// halves the engine consumes; `handle()` lets a driver script the motion
/// state the firmware would normally report.
#[derive(Default)]
pub struct SimulatedPrinter {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn telemetry(&self) -> SimTelemetry {
        SimTelemetry {
            state: self.state.clone(),
        }
    }

    pub fn actuator(&self) -> SimActuator {
        SimActuator {
            state: self.state.clone(),
        }
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: self.state.clone(),
        }
    }
}

/// Driver-side control of the simulated motion state.
#[derive(Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    pub fn set_motion(&self, extruder_velocity: f32, toolhead_velocity: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.extruder_velocity = extruder_velocity;
            s.toolhead_velocity = toolhead_velocity;
        }
    }

    pub fn set_z(&self, z: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.z_height = z;
        }
    }

    /// Current simulated hotend temperature.
    pub fn temperature(&self) -> f32 {
        self.state.lock().map(|s| s.temp).unwrap_or(AMBIENT_C)
    }

    /// Last speed factor the engine commanded (crash-recovery visibility).
    pub fn speed_factor(&self) -> f32 {
        self.state.lock().map(|s| s.speed_factor).unwrap_or(1.0)
    }
}

pub struct SimTelemetry {
    state: Arc<Mutex<SimState>>,
}

impl Telemetry for SimTelemetry {
    fn sample(&mut self, _timeout: std::time::Duration) -> Result<TelemetrySample, DynError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HostError::Api("sim state poisoned".into()))?;
        s.step(Instant::now());
        Ok(TelemetrySample {
            extruder_velocity: s.extruder_velocity,
            toolhead_velocity: s.toolhead_velocity,
            heater_duty: s.heater_duty,
            hotend_temp: s.temp,
            z_height: s.z_height,
            fan_duty: s.fan,
        })
    }
}

pub struct SimActuator {
    state: Arc<Mutex<SimState>>,
}

impl SimActuator {
    fn with_state(&self, f: impl FnOnce(&mut SimState)) -> Result<(), DynError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| HostError::Api("sim state poisoned".into()))?;
        f(&mut s);
        Ok(())
    }
}

impl Actuator for SimActuator {
    fn set_temperature(&mut self, celsius: f32) -> Result<(), DynError> {
        tracing::debug!(celsius, "sim: set temperature");
        self.with_state(|s| s.target_temp = celsius)
    }

    fn set_pressure_advance(&mut self, pa: f32) -> Result<(), DynError> {
        tracing::debug!(pa, "sim: set pressure advance");
        self.with_state(|s| s.pa = pa)
    }

    fn set_fan(&mut self, duty: f32) -> Result<(), DynError> {
        tracing::debug!(duty, "sim: set fan");
        self.with_state(|s| s.fan = duty.clamp(0.0, 1.0))
    }

    fn set_acceleration(&mut self, mm_s2: f32) -> Result<(), DynError> {
        tracing::debug!(mm_s2, "sim: set acceleration");
        self.with_state(|s| s.accel = mm_s2)
    }

    fn set_speed_factor(&mut self, factor: f32) -> Result<(), DynError> {
        tracing::debug!(factor, "sim: set speed factor");
        self.with_state(|s| s.speed_factor = factor)
    }
}

/// Simulated TMC strain register. Reads sit at `baseline` with the load
/// depression injected through `drop_by`; a tangle is a sustained drop.
pub struct SimulatedLoadSensor {
    baseline: i32,
    drop: Arc<Mutex<i32>>,
}

impl SimulatedLoadSensor {
    pub fn new(baseline: i32) -> Self {
        Self {
            baseline,
            drop: Arc::new(Mutex::new(0)),
        }
    }

    /// Handle for injecting load drops from a test or demo driver.
    pub fn injector(&self) -> LoadInjector {
        LoadInjector {
            drop: self.drop.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LoadInjector {
    drop: Arc<Mutex<i32>>,
}

impl LoadInjector {
    pub fn drop_by(&self, amount: i32) {
        if let Ok(mut d) = self.drop.lock() {
            *d = amount;
        }
    }

    pub fn clear(&self) {
        self.drop_by(0);
    }
}

impl LoadSensor for SimulatedLoadSensor {
    fn read(&mut self, _timeout: std::time::Duration) -> Result<i32, DynError> {
        let drop = self
            .drop
            .lock()
            .map_err(|_| HostError::RegisterUnavailable)?;
        Ok(self.baseline - *drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn thermal_model_heats_toward_target() {
        let printer = SimulatedPrinter::new();
        let mut act = printer.actuator();
        let mut tel = printer.telemetry();
        act.set_temperature(210.0).unwrap();
        // Force a large dt by back-dating the last step.
        {
            let mut s = printer.state.lock().unwrap();
            s.last_step = Some(Instant::now() - Duration::from_secs(30));
        }
        let sample = tel.sample(Duration::from_millis(10)).unwrap();
        assert!(sample.hotend_temp > AMBIENT_C);
        assert!(sample.heater_duty > 0.0);
    }

    #[test]
    fn load_sensor_reports_injected_drop() {
        let mut sensor = SimulatedLoadSensor::new(500);
        let inject = sensor.injector();
        assert_eq!(sensor.read(Duration::from_millis(1)).unwrap(), 500);
        inject.drop_by(120);
        assert_eq!(sensor.read(Duration::from_millis(1)).unwrap(), 380);
        inject.clear();
        assert_eq!(sensor.read(Duration::from_millis(1)).unwrap(), 500);
    }
}
