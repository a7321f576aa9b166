//! Per-session CSV telemetry log.
//!
//! One row per tick, in the column order the offline analyzer consumes.
//! Rows are buffered and flushed on a tick cadence and at session end, so
//! the control loop never blocks on file I/O growth. A write failure
//! disables the log with a single warning; logging is never load-bearing.

use crate::error::{FlowError, Result};
use eyre::WrapErr;
use std::fs::File;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const COLUMNS: [&str; 12] = [
    "elapsed_s",
    "temp_actual",
    "temp_target",
    "boost",
    "flow",
    "speed",
    "pwm",
    "pa",
    "z_height",
    "predicted_flow",
    "dynz_active",
    "accel",
];

#[derive(Debug, Clone, Copy)]
pub struct SessionRow {
    pub elapsed_s: f32,
    pub temp_actual: f32,
    pub temp_target: f32,
    pub boost: f32,
    pub flow: f32,
    pub speed: f32,
    pub pwm: f32,
    pub pa: f32,
    pub z_height: f32,
    pub predicted_flow: f32,
    pub dynz_active: bool,
    pub accel: f32,
}

pub struct SessionLog {
    writer: Option<csv::Writer<File>>,
    flush_every: u32,
    rows_since_flush: u32,
}

impl SessionLog {
    /// Create `adaflow_<unix-seconds>.csv` under `dir`, writing the header
    /// row immediately.
    pub fn create(dir: &Path, flush_every: u32) -> Result<Self> {
        std::fs::create_dir_all(dir).wrap_err("creating session log dir")?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = dir.join(format!("adaflow_{stamp}.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| FlowError::Persistence(format!("session log open: {e}")))?;
        writer
            .write_record(COLUMNS)
            .map_err(|e| FlowError::Persistence(format!("session log header: {e}")))?;
        tracing::info!(path = %path.display(), "session log started");
        Ok(Self {
            writer: Some(writer),
            flush_every: flush_every.max(1),
            rows_since_flush: 0,
        })
    }

    /// Append one row; flushes on the configured cadence.
    pub fn record(&mut self, row: &SessionRow) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let fields = [
            format!("{:.1}", row.elapsed_s),
            format!("{:.2}", row.temp_actual),
            format!("{:.2}", row.temp_target),
            format!("{:.2}", row.boost),
            format!("{:.3}", row.flow),
            format!("{:.1}", row.speed),
            format!("{:.3}", row.pwm),
            format!("{:.5}", row.pa),
            format!("{:.2}", row.z_height),
            format!("{:.3}", row.predicted_flow),
            if row.dynz_active { "1" } else { "0" }.to_string(),
            format!("{:.0}", row.accel),
        ];
        if let Err(e) = writer.write_record(&fields) {
            tracing::warn!(error = %e, "session log write failed; disabling log");
            self.writer = None;
            return;
        }
        self.rows_since_flush += 1;
        if self.rows_since_flush >= self.flush_every {
            self.rows_since_flush = 0;
            if let Err(e) = writer.flush() {
                tracing::warn!(error = %e, "session log flush failed; disabling log");
                self.writer = None;
            }
        }
    }

    /// Final flush at session end.
    pub fn finish(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            tracing::warn!(error = %e, "session log final flush failed");
        }
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.finish();
    }
}
