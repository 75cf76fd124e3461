use super::{DEFAULT_OUTPUT_PATH, VERSION};
use chrono::prelude::*;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Where the series to plot comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesSource {
    /// date,co2_kg rows
    Csv(PathBuf),
    /// waste report database, aggregated per day over the last `days`
    Reports {
        path: PathBuf,
        days: u32,
        today: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotArgs {
    pub source: SeriesSource,
    pub output: String,
    pub verbose: bool,
}

pub fn build_cli() -> Command {
    let arg_csvin = Arg::new("input_csvfile")
        .help("name for the csv file with date and co2 columns")
        .short('f')
        .long("csvfile")
        .num_args(1)
        .value_parser(value_parser!(PathBuf))
        .default_value("co2.csv");
    let arg_reports = Arg::new("reports")
        .help("json waste report database to aggregate per day, instead of the csv")
        .short('r')
        .long("reports")
        .num_args(1)
        .value_parser(value_parser!(PathBuf))
        .conflicts_with("input_csvfile");
    let arg_days = Arg::new("days")
        .help("number of days before today to include from the reports")
        .short('d')
        .long("days")
        .num_args(1)
        .value_parser(value_parser!(u32))
        .default_value("7");
    let arg_today = Arg::new("today")
        .help("reference date for the reports window, YYYY-MM-DD, local today if not given")
        .long("today")
        .num_args(1)
        .value_parser(|s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d"));
    let arg_output = Arg::new("output")
        .help("name of the output image, the extension sets the format")
        .short('o')
        .long("output")
        .num_args(1)
        .default_value(DEFAULT_OUTPUT_PATH);
    let arg_verbose = Arg::new("verbose")
        .help("print verbose information")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue);
    Command::new("co2_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the CO2 emission time series")
        .arg(arg_csvin)
        .arg(arg_reports)
        .arg(arg_days)
        .arg(arg_today)
        .arg(arg_output)
        .arg(arg_verbose)
}

/// Takes the CLI arguments that control the plotting of the emission series.
pub fn parse_cli() -> PlotArgs {
    args_from_matches(&build_cli().get_matches())
}

/// The arguments with a default are always Some, so it is safe to unwrap them.
pub fn args_from_matches(cli_args: &ArgMatches) -> PlotArgs {
    let source = match cli_args.get_one::<PathBuf>("reports") {
        Some(p) => SeriesSource::Reports {
            path: p.to_owned(),
            days: *cli_args.get_one::<u32>("days").unwrap(),
            today: cli_args.get_one::<NaiveDate>("today").copied(),
        },
        None => SeriesSource::Csv(
            cli_args
                .get_one::<PathBuf>("input_csvfile")
                .unwrap()
                .to_owned(),
        ),
    };
    let output = cli_args.get_one::<String>("output").unwrap().to_owned();
    let verbose = cli_args.get_flag("verbose");
    PlotArgs {
        source,
        output,
        verbose,
    }
}
