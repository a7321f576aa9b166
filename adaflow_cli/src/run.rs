//! Engine assembly and session execution against the simulated printer.

use crate::cli::Cli;
use adaflow_config::Config;
use adaflow_core::{Command, CommandReply, Engine, EngineCfg, Session};
use adaflow_host::{FileStore, SimHandle, SimulatedLoadSensor, SimulatedPrinter};
use adaflow_core::tap::CommandTap;
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Load and validate the TOML config; a missing file means defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = adaflow_config::load_toml(&content)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate().wrap_err("validating config")?;
    Ok(cfg)
}

/// Assemble an engine wired to the simulated printer and the file store.
pub fn build_engine(
    config: &Config,
    state_path: &Path,
    material: &str,
) -> Result<(Engine, SimulatedPrinter)> {
    let printer = SimulatedPrinter::new();
    let load = SimulatedLoadSensor::new(520);
    let store = FileStore::open(state_path)
        .wrap_err_with(|| format!("opening state store {}", state_path.display()))?;

    let mut builder = Engine::builder()
        .with_telemetry(printer.telemetry())
        .with_actuator(printer.actuator())
        .with_material(material)
        .with_cfg(EngineCfg::from(config))
        .with_store(store)
        .with_load_sensor(load);
    if !config.materials.is_empty() {
        builder = builder.with_materials(config.materials.clone());
    }
    if let Some(dir) = &config.session_log.dir {
        builder = builder.with_session_log(
            PathBuf::from(dir),
            config.session_log.flush_every.unwrap_or(30),
        );
    }
    let engine = builder.build()?;
    Ok((engine, printer))
}

/// Execute one store-backed command without running a session.
pub fn offline(cli: &Cli, config: &Config, material: &str, cmd: &Command) -> Result<CommandReply> {
    let (mut engine, _printer) = build_engine(config, &cli.state, material)?;
    engine.execute(cmd)
}

/// Run a full simulated session: spawn the tick thread, stream a toolpath
/// through the command tap, and report the final status.
pub fn run_session(
    cli: &Cli,
    config: &Config,
    material: &str,
    seconds: u64,
    gcode: Option<&Path>,
    rt: bool,
) -> Result<(CommandReply, CommandReply)> {
    crate::rt::setup_rt_once(rt);

    let (engine, printer) = build_engine(config, &cli.state, material)?;
    let session = Session::spawn(engine);
    let started = session.execute(Command::Start {
        material: Some(material.to_string()),
    })?;
    tracing::info!("{}", started.summary);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .wrap_err("installing signal handler")?;
    }

    let tap = session.tap();
    let handle = printer.handle();
    match gcode {
        Some(path) => stream_file(&tap, &handle, path, seconds, &interrupted)?,
        None => stream_demo(&tap, &handle, seconds, &interrupted),
    }
    if interrupted.load(Ordering::SeqCst) {
        tracing::warn!("interrupted; disabling adaptive outputs");
        session.disable_now();
    }

    let status = session.execute(Command::Status)?;
    let stopped = session.execute(Command::Stop)?;
    drop(session);
    Ok((status, stopped))
}

/// Built-in demo toolpath: back-and-forth perimeter moves with a layer
/// change every few seconds, enough to exercise boost, cooling, and the
/// lookahead buffer.
fn stream_demo(tap: &Arc<CommandTap>, handle: &SimHandle, seconds: u64, interrupted: &AtomicBool) {
    const MOVE_MS: u64 = 100;
    const SPEED_MM_S: f32 = 120.0;
    const BEAD_MM2: f32 = 0.2 * 0.45;

    let filament_area = {
        let r = 1.75_f32 / 2.0;
        std::f32::consts::PI * r * r
    };
    let dist = SPEED_MM_S * MOVE_MS as f32 / 1_000.0;
    let de = dist * BEAD_MM2 / filament_area;
    let extruder_mm_s = de / (MOVE_MS as f32 / 1_000.0);

    tap.publish_line("M83");
    tap.publish_line("G92 E0");
    let mut z = 0.2_f32;
    let mut x = 0.0_f32;
    let mut dir = 1.0_f32;
    handle.set_z(z);

    let start = Instant::now();
    let mut moves = 0u64;
    while start.elapsed().as_secs() < seconds && !interrupted.load(Ordering::SeqCst) {
        x += dir * dist;
        if !(0.0..=120.0).contains(&x) {
            dir = -dir;
            x = x.clamp(0.0, 120.0);
        }
        tap.publish_line(&format!("G1 X{x:.2} E{de:.4} F{:.0}", SPEED_MM_S * 60.0));
        handle.set_motion(extruder_mm_s, SPEED_MM_S);
        moves += 1;
        if moves.is_multiple_of(50) {
            z += 0.2;
            handle.set_z(z);
            tap.publish_line(&format!("G1 Z{z:.2} F600"));
        }
        std::thread::sleep(Duration::from_millis(MOVE_MS));
    }
    handle.set_motion(0.0, 0.0);
}

/// Stream a G-code file through the tap at a fixed line rate, mirroring
/// enough motion state into the simulator for live telemetry.
fn stream_file(
    tap: &Arc<CommandTap>,
    handle: &SimHandle,
    path: &Path,
    seconds: u64,
    interrupted: &AtomicBool,
) -> Result<()> {
    use adaflow_core::gcode::{self, GcodeCommand};

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading gcode {}", path.display()))?;
    let start = Instant::now();
    let mut pos = [0.0_f32; 3];
    let mut feed_mm_s = 0.0_f32;

    for line in content.lines() {
        if start.elapsed().as_secs() >= seconds || interrupted.load(Ordering::SeqCst) {
            break;
        }
        tap.publish_line(line);
        if let GcodeCommand::Move(mv) = gcode::parse(line) {
            if let Some(f) = mv.f {
                feed_mm_s = (f / 60.0).max(0.0);
            }
            let target = [
                mv.x.unwrap_or(pos[0]),
                mv.y.unwrap_or(pos[1]),
                mv.z.unwrap_or(pos[2]),
            ];
            let travel =
                ((target[0] - pos[0]).powi(2) + (target[1] - pos[1]).powi(2)).sqrt();
            pos = target;
            handle.set_z(pos[2]);
            if let Some(e) = mv.e
                && e > 0.0
                && travel > 0.0
                && feed_mm_s > 0.0
            {
                let duration_s = travel / feed_mm_s;
                handle.set_motion(e / duration_s, feed_mm_s);
            } else {
                handle.set_motion(0.0, feed_mm_s.min(travel * 10.0));
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    handle.set_motion(0.0, 0.0);
    Ok(())
}
