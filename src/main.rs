//! `aqmon`: live air-quality dashboard for the terminal.
//!
//!   aqmon             refresh every configured location and print panels
//!   aqmon <location>  diagnostic: fetch one feed, print the raw JSON and a
//!                     verification summary

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;

use aqmon_service::config::Config;
use aqmon_service::dashboard;
use aqmon_service::history::Session;
use aqmon_service::locations;
use aqmon_service::logging::{self, Component};
use aqmon_service::model::Location;
use aqmon_service::pipeline::Monitor;
use aqmon_service::verify::{self, VerificationStatus};

/// Live air-quality monitor for Turkish cities (WAQI feed)
#[derive(Parser, Debug)]
#[command(name = "aqmon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// WAQI city or station id (e.g. "antalya" or "@4018") to diagnose
    location_id: Option<String>,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config = Config::load()?;
    logging::init_logger(
        config.logging.min_level()?,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );
    let mut monitor = Monitor::from_config(config)?;

    match cli.location_id {
        Some(id) => diagnose(&mut monitor, &id),
        None => show_dashboard(&mut monitor),
    }
}

fn diagnose(monitor: &mut Monitor, location_id: &str) -> Result<ExitCode, Box<dyn Error>> {
    let credential = monitor.credential()?;
    let location = Location {
        id: location_id.to_string(),
        label: locations::label_for(location_id)
            .unwrap_or(location_id)
            .to_string(),
    };

    let fetched = monitor.source().fetch_raw(location_id, &credential);
    if let Ok(raw) = &fetched {
        println!("{}", serde_json::to_string_pretty(&raw.body)?);
    }

    let result = verify::inspect_fetch(&location, &fetched);
    let failed = result.status == VerificationStatus::Failed;
    verify::print_summary(&verify::summarize(vec![result]));

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn show_dashboard(monitor: &mut Monitor) -> Result<ExitCode, Box<dyn Error>> {
    let mut session = Session::new("cli");
    logging::debug(
        Component::Session,
        None,
        &format!("session {} started", session.id()),
    );

    let results = monitor.refresh_all(&mut session);
    let dashboard_config = monitor.config().dashboard.clone();

    let mut any_ok = false;
    for (location, result) in &results {
        match result {
            Ok(reading) => {
                any_ok = true;
                let panel = dashboard::build_panel(reading, &dashboard_config);
                println!("{}", dashboard::render_text(&panel));
            }
            Err(e) => println!("{}", dashboard::render_error(location, e)),
        }
    }

    println!(
        "Source: WAQI • data cached for {} min • history kept for this session only",
        monitor.cache().ttl().num_minutes()
    );

    Ok(if any_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
