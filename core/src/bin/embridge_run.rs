/*
 * Copyright (c) 2026 Mohamad Al-Zawahreh (dba Sovereign Systems).
 *
 * This file is part of embridge.
 *
 * LICENSE: DUAL-LICENSED (AGPLv3 or COMMERCIAL).
 *
 * 1. OPEN SOURCE: You may use this file under the terms of the GNU Affero
 * General Public License v3.0. If you link to this code, your ENTIRE
 * application must be open-sourced under AGPLv3.
 *
 * 2. COMMERCIAL: For proprietary use, you must obtain a Commercial License
 * from Sovereign Systems.
 *
 * PATENT NOTICE: Protected by US Patent App #63/935,467.
 * NO IMPLIED LICENSE to rights of Mohamad Al-Zawahreh or Sovereign Systems.
 */

use clap::Parser;
use embridge::{FatalPolicy, GuestInstance, ShimConfig, ShimError};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "embridge-run")]
#[command(about = "Run an export of an Emscripten-built wasm module.", long_about = None)]
struct Cli {
    /// Path to the `.wasm` module.
    wasm: PathBuf,

    /// Export to call.
    export: String,

    /// Integer arguments, one per export parameter.
    #[arg(allow_negative_numbers = true)]
    args: Vec<i64>,

    /// JSON shim configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail the call instead of exiting when the guest hits an unsupported import.
    #[arg(long)]
    trap: bool,
}

/// Process status for a guest `proc_exit` code. Codes the host cannot
/// report unchanged become 1, so they never read as success.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ShimConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Load Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ShimConfig::default(),
    };
    if cli.trap {
        config.fatal = FatalPolicy::Trap;
    }

    let bytes = match std::fs::read(&cli.wasm) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Load Error: {}: {}", cli.wasm.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut guest = match GuestInstance::instantiate(&bytes, config) {
        Ok(guest) => guest,
        Err(e) => {
            eprintln!("Instantiation Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Calling {} with {} arguments", cli.export, cli.args.len());

    let words: Vec<u64> = cli.args.iter().map(|&a| a as u64).collect();
    match guest.call(&cli.export, &words) {
        Ok(results) => {
            for word in results {
                println!("{}", word);
            }
            ExitCode::SUCCESS
        }
        Err(e) => match e.shim {
            Some(ShimError::GuestExit(code)) => ExitCode::from(exit_status(code)),
            _ => {
                eprintln!("Execution Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
