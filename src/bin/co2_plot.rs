use chrono::prelude::*;
use co2_chart::co2_plot::{parse_cli, PlotArgs, SeriesSource};
use co2_chart::waste_reports::{daily_emissions, read_reports, total_emission, window_start};
use co2_chart::{ChartErr, EmissionSeries};
use flexi_logger::Logger;
use log::{debug, error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = parse_cli();
    let level = if args.verbose { "debug" } else { "info" };
    let _logger = match Logger::try_with_env_or_str(level).and_then(|l| l.start()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("could not start the logger: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match run(&args) {
        Ok(path) => {
            info!("> chart saved to {}", path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &PlotArgs) -> Result<String, ChartErr> {
    let series = match &args.source {
        SeriesSource::Csv(csvin) => {
            info!("> read series from {}", csvin.display());
            EmissionSeries::from_csv(csvin)?
        }
        SeriesSource::Reports { path, days, today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            info!(
                "> aggregate reports from {} over the {} days before {}",
                path.display(),
                days,
                today
            );
            let reports = read_reports(path)?;
            let since = window_start(today, *days);
            info!(
                "> total CO2 emission in the window: {} kg",
                total_emission(&reports, since, today, None, None)
            );
            daily_emissions(&reports, today, *days)
        }
    };
    debug!("series:\n{}", series);
    info!("> plot {} points to {}", series.len(), args.output);
    co2_chart::generate_chart(&series.dates, &series.co2, Some(args.output.as_str()))
}
