pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error type used at every hardware/host seam.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// One snapshot of the printer's live state, polled once per control tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySample {
    /// Filament feed velocity at the extruder, mm/s.
    pub extruder_velocity: f32,
    /// Toolhead velocity in the XY plane, mm/s.
    pub toolhead_velocity: f32,
    /// Hotend heater duty cycle, 0.0..=1.0.
    pub heater_duty: f32,
    /// Measured hotend temperature, °C.
    pub hotend_temp: f32,
    /// Current Z position, mm.
    pub z_height: f32,
    /// Part-cooling fan duty currently applied, 0.0..=1.0.
    pub fan_duty: f32,
}

/// Live printer telemetry supplied by the firmware host.
pub trait Telemetry {
    fn sample(&mut self, timeout: std::time::Duration) -> Result<TelemetrySample, DynError>;
}

/// Actuation primitives exposed by the firmware host.
///
/// Each setter is expected to be idempotent; the engine issues at most one
/// call per channel per tick and skips unchanged values.
pub trait Actuator {
    fn set_temperature(&mut self, celsius: f32) -> Result<(), DynError>;
    fn set_pressure_advance(&mut self, pa: f32) -> Result<(), DynError>;
    fn set_fan(&mut self, duty: f32) -> Result<(), DynError>;
    fn set_acceleration(&mut self, mm_s2: f32) -> Result<(), DynError>;
    fn set_speed_factor(&mut self, factor: f32) -> Result<(), DynError>;
}

/// Stepper-driver strain register (e.g. TMC `SG_RESULT`), used as a load
/// proxy for crash/tangle detection. Optional; absence degrades gracefully.
pub trait LoadSensor {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, DynError>;
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn sample(&mut self, timeout: std::time::Duration) -> Result<TelemetrySample, DynError> {
        (**self).sample(timeout)
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_temperature(&mut self, celsius: f32) -> Result<(), DynError> {
        (**self).set_temperature(celsius)
    }
    fn set_pressure_advance(&mut self, pa: f32) -> Result<(), DynError> {
        (**self).set_pressure_advance(pa)
    }
    fn set_fan(&mut self, duty: f32) -> Result<(), DynError> {
        (**self).set_fan(duty)
    }
    fn set_acceleration(&mut self, mm_s2: f32) -> Result<(), DynError> {
        (**self).set_acceleration(mm_s2)
    }
    fn set_speed_factor(&mut self, factor: f32) -> Result<(), DynError> {
        (**self).set_speed_factor(factor)
    }
}

impl<L: LoadSensor + ?Sized> LoadSensor for Box<L> {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, DynError> {
        (**self).read(timeout)
    }
}

/// Flat string key→value persistence for learned state.
///
/// Keys are dot-separated (`pa.<material>`, `gain.<material>`,
/// `stress.<bin>`); values are decimal strings. Writes may be buffered until
/// `flush`.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<String>, DynError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), DynError>;
    fn remove(&mut self, key: &str) -> Result<(), DynError>;
    /// All stored keys beginning with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, DynError>;
    fn flush(&mut self) -> Result<(), DynError>;
}
