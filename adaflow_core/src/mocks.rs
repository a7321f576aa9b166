//! Test and helper mocks for adaflow_core.

use adaflow_traits::{Actuator, DynError, LoadSensor, StateStore, Telemetry, TelemetrySample};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Telemetry that replays scripted samples, then repeats the last one.
pub struct ScriptedTelemetry {
    queue: VecDeque<TelemetrySample>,
    last: TelemetrySample,
}

impl ScriptedTelemetry {
    pub fn new(samples: impl IntoIterator<Item = TelemetrySample>) -> Self {
        Self {
            queue: samples.into_iter().collect(),
            last: TelemetrySample::default(),
        }
    }

    /// A telemetry source stuck on one sample.
    pub fn constant(sample: TelemetrySample) -> Self {
        Self {
            queue: VecDeque::new(),
            last: sample,
        }
    }
}

impl Telemetry for ScriptedTelemetry {
    fn sample(&mut self, _timeout: Duration) -> Result<TelemetrySample, DynError> {
        if let Some(next) = self.queue.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

/// Telemetry that always fails.
pub struct FailingTelemetry;

impl Telemetry for FailingTelemetry {
    fn sample(&mut self, _timeout: Duration) -> Result<TelemetrySample, DynError> {
        Err(Box::new(std::io::Error::other("telemetry offline")))
    }
}

/// One recorded actuation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Temperature(f32),
    PressureAdvance(f32),
    Fan(f32),
    Acceleration(f32),
    SpeedFactor(f32),
}

/// Actuator that records every call for assertions.
#[derive(Default, Clone)]
pub struct SpyActuator {
    pub calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl SpyActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_temperature(&self) -> Option<f32> {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Temperature(t) => Some(*t),
                _ => None,
            })
    }

    pub fn last_speed_factor(&self) -> Option<f32> {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::SpeedFactor(f) => Some(*f),
                _ => None,
            })
    }

    pub fn last_acceleration(&self) -> Option<f32> {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Acceleration(a) => Some(*a),
                _ => None,
            })
    }

    fn push(&self, call: ActuatorCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Actuator for SpyActuator {
    fn set_temperature(&mut self, celsius: f32) -> Result<(), DynError> {
        self.push(ActuatorCall::Temperature(celsius));
        Ok(())
    }
    fn set_pressure_advance(&mut self, pa: f32) -> Result<(), DynError> {
        self.push(ActuatorCall::PressureAdvance(pa));
        Ok(())
    }
    fn set_fan(&mut self, duty: f32) -> Result<(), DynError> {
        self.push(ActuatorCall::Fan(duty));
        Ok(())
    }
    fn set_acceleration(&mut self, mm_s2: f32) -> Result<(), DynError> {
        self.push(ActuatorCall::Acceleration(mm_s2));
        Ok(())
    }
    fn set_speed_factor(&mut self, factor: f32) -> Result<(), DynError> {
        self.push(ActuatorCall::SpeedFactor(factor));
        Ok(())
    }
}

/// Load sensor that replays scripted readings, then repeats the last one.
pub struct ScriptedLoad {
    queue: VecDeque<i32>,
    last: i32,
}

impl ScriptedLoad {
    pub fn new(baseline: i32, readings: impl IntoIterator<Item = i32>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
            last: baseline,
        }
    }
}

impl LoadSensor for ScriptedLoad {
    fn read(&mut self, _timeout: Duration) -> Result<i32, DynError> {
        if let Some(next) = self.queue.pop_front() {
            self.last = next;
        }
        Ok(self.last)
    }
}

/// Load sensor that always fails (driver missing).
pub struct FailingLoad;

impl LoadSensor for FailingLoad {
    fn read(&mut self, _timeout: Duration) -> Result<i32, DynError> {
        Err(Box::new(std::io::Error::other("SG_RESULT unreadable")))
    }
}

/// In-memory state store with injectable failures.
#[derive(Default, Clone)]
pub struct MemStore {
    pub map: Arc<Mutex<BTreeMap<String, String>>>,
    pub fail_reads: Arc<Mutex<bool>>,
    pub fail_writes: Arc<Mutex<bool>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        if let Ok(mut f) = self.fail_reads.lock() {
            *f = fail;
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut f) = self.fail_writes.lock() {
            *f = fail;
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.map.lock() {
            map.insert(key.to_string(), value.to_string());
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.map.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn reads_fail(&self) -> bool {
        self.fail_reads.lock().map(|f| *f).unwrap_or(false)
    }

    fn writes_fail(&self) -> bool {
        self.fail_writes.lock().map(|f| *f).unwrap_or(false)
    }
}

impl StateStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<String>, DynError> {
        if self.reads_fail() {
            return Err(Box::new(std::io::Error::other("store read failure")));
        }
        Ok(self.map.lock().ok().and_then(|m| m.get(key).cloned()))
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), DynError> {
        if self.writes_fail() {
            return Err(Box::new(std::io::Error::other("store write failure")));
        }
        self.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), DynError> {
        if self.writes_fail() {
            return Err(Box::new(std::io::Error::other("store write failure")));
        }
        if let Ok(mut map) = self.map.lock() {
            map.remove(key);
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, DynError> {
        if self.reads_fail() {
            return Err(Box::new(std::io::Error::other("store read failure")));
        }
        Ok(self
            .map
            .lock()
            .map(|m| m.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
            .unwrap_or_default())
    }

    fn flush(&mut self) -> Result<(), DynError> {
        if self.writes_fail() {
            return Err(Box::new(std::io::Error::other("store write failure")));
        }
        Ok(())
    }
}
