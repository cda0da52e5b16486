#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the incident map.
//!
//! Loads the dataset described by the TOML config, runs the aggregation
//! engine with a live loading bar, applies the requested scale level and
//! filter, and prints the resulting groups.
//!
//! Uses `indicatif-log-bridge` (via [`incident_map_cli_utils::init_logger`])
//! so that log lines and the loading bar never fight for the terminal.

mod report;

use std::path::PathBuf;

use clap::Parser;
use incident_map_analytics_models::{Filter, ScaleLevel};
use incident_map_cli_utils::IndicatifProgress;
use incident_map_engine::AggregationEngine;
use incident_map_engine::observable::SubscribeOptions;
use incident_map_source::DatasetSource;
use incident_map_source::config::{DatasetConfig, resolve_config_path};
use incident_map_source::progress::LoadingProgress;
use tokio_util::sync::CancellationToken;

use crate::report::Report;

#[derive(Parser)]
#[command(name = "incident_map", about = "Aggregate geolocated incidents by administrative area")]
struct Cli {
    /// Dataset config file (overrides the `INCIDENT_MAP_CONFIG` env var)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Scale level to show: region, district, or city
    #[arg(long, default_value = "region", value_parser = parse_scale)]
    scale: ScaleLevel,
    /// Restrict to a region (ADM1) code
    #[arg(long)]
    region: Option<String>,
    /// Restrict to a district (ADM2) code
    #[arg(long)]
    district: Option<String>,
    /// Restrict to a settlement id
    #[arg(long)]
    settlement: Option<usize>,
    /// Comma-separated incident type codes to keep (e.g., "30,32")
    #[arg(long, value_delimiter = ',')]
    types: Vec<String>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn filter(&self) -> Filter {
        Filter {
            region_code: self.region.clone(),
            district_code: self.district.clone(),
            settlement_id: self.settlement,
            incident_types: self.types.clone(),
        }
    }
}

fn parse_scale(value: &str) -> Result<ScaleLevel, String> {
    value
        .parse()
        .map_err(|_| format!("unknown scale level `{value}` (expected region, district, or city)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = incident_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.clone());
    log::info!("Reading dataset config from {}", config_path.display());
    let config = DatasetConfig::load(&config_path).await?;
    let progress_interval = config.progress_interval;

    let source = DatasetSource::new(config);
    let reference = source.load_reference().await?;
    log::info!(
        "Loaded {} settlements, {} districts, {} regions",
        reference.settlements.len(),
        reference.lookup.district_count(),
        reference.lookup.region_count()
    );

    let mut engine = AggregationEngine::with_progress_interval(progress_interval);

    let bar = IndicatifProgress::loading_bar(&multi, "Loading...");
    let cancel = CancellationToken::new();
    let sink = bar.clone();
    engine.streams().loading_progress.subscribe(
        move |update: &LoadingProgress| update.report_to(sink.as_ref()),
        SubscribeOptions::default().with_cancel(cancel.clone()),
    );

    let loaded = engine.init(&source, &source, reference).await;
    cancel.cancel();
    if let Err(e) = loaded {
        bar.finish_and_clear();
        return Err(e.into());
    }

    engine.set_scale_level(cli.scale);
    engine.set_filter(cli.filter());

    let streams = engine.streams();
    let report = Report {
        scale_level: engine.scale_level(),
        effective_scale: engine.effective_scale(),
        affected_types: streams.affected_types.latest().unwrap_or_default(),
        shown_groups: streams.shown_groups.latest().unwrap_or_default(),
        individual_event_count: streams
            .individual_events
            .latest()
            .map_or(0, |events| events.len()),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }

    Ok(())
}
