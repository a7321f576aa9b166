//! `adaflow`: operator CLI for the adaptive flow controller.

mod cli;
mod error_fmt;
mod rt;
mod run;

use clap::Parser;
use cli::{Cli, Commands};
use adaflow_core::{Command, CommandReply};
use eyre::Result;
use std::process::ExitCode;

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let args = Cli::parse();

    let config = match run::load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            report_error(&e, args.json);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&args, &config.logging);

    match dispatch(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, args.json);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: &Cli, config: &adaflow_config::Config) -> Result<()> {
    match &args.cmd {
        Commands::Run {
            material,
            seconds,
            gcode,
            rt,
        } => {
            let (status, stopped) =
                run::run_session(args, config, material, *seconds, gcode.as_deref(), *rt)?;
            print_reply(&status, args.json);
            if !args.json {
                println!("{}", stopped.summary);
            }
            Ok(())
        }
        Commands::Status { material } => {
            let reply = run::offline(args, config, material, &Command::Status)?;
            print_reply(&reply, args.json);
            Ok(())
        }
        Commands::SetPa { material, value } => {
            let reply = run::offline(
                args,
                config,
                material,
                &Command::SetPa {
                    material: material.clone(),
                    value: *value,
                },
            )?;
            print_reply(&reply, args.json);
            Ok(())
        }
        Commands::GetPa { material } => {
            let reply = run::offline(
                args,
                config,
                material,
                &Command::GetPa {
                    material: material.clone(),
                },
            )?;
            print_reply(&reply, args.json);
            Ok(())
        }
        Commands::SetGain {
            name,
            value,
            material,
        } => {
            let reply = run::offline(
                args,
                config,
                material,
                &Command::SetGain {
                    name: name.clone(),
                    value: *value,
                },
            )?;
            print_reply(&reply, args.json);
            Ok(())
        }
        Commands::SetMaxTemp { value, material } => {
            let reply = run::offline(
                args,
                config,
                material,
                &Command::SetMaxTemp { value: *value },
            )?;
            print_reply(&reply, args.json);
            Ok(())
        }
        Commands::ResetState => {
            let material = config
                .materials
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| "pla".to_string());
            let reply = run::offline(args, config, &material, &Command::ResetState)?;
            print_reply(&reply, args.json);
            Ok(())
        }
    }
}

fn print_reply(reply: &CommandReply, json: bool) {
    if json {
        let value = serde_json::json!({
            "ok": true,
            "summary": reply.summary,
            "fields": reply.fields,
        });
        println!("{value}");
    } else {
        println!("{}", reply.summary);
        for (key, value) in &reply.fields {
            println!("  {key}: {value}");
        }
    }
}

fn report_error(err: &eyre::Report, json: bool) {
    if json {
        eprintln!("{}", error_fmt::to_json(err));
    } else {
        eprintln!("{}", error_fmt::humanize(err));
    }
}

fn init_tracing(args: &Cli, logging: &adaflow_config::Logging) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "adaflow.log".to_string());
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = cli::FILE_GUARD.set(guard);
            if args.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .init();
            }
        }
        None => {
            if args.json {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .with_writer(std::io::stderr)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}
