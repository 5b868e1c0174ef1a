// src/lib.rs
//
// MQTT <-> SocketCAN bridge driven by a JSON conversion table.

pub mod bridge;
pub mod cli;
pub mod io;
pub mod logging;
pub mod pack;
pub mod service;
pub mod settings;
#[cfg(feature = "sim")]
pub mod sim;
pub mod table;
pub mod topic;

#[cfg(test)]
pub(crate) mod test_support;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;

/// Entry point of the bridge daemon.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match settings::load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tlog!(error: "{}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut settings);

    if let Err(e) = settings.validate() {
        tlog!(error: "{}", e);
        return ExitCode::FAILURE;
    }

    if cli.print_config {
        return match settings.to_toml_string() {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tlog!(error: "{}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Some(dir) = &settings.log_dir {
        if let Err(e) = logging::init_file_logging(dir) {
            tlog!(warn: "[logging] {}; continuing with stderr only", e);
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tlog!(error: "Failed to start tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(service::run(settings));
    logging::stop_file_logging();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tlog!(error: "{}", e);
            ExitCode::FAILURE
        }
    }
}
