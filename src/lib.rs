use crate::utils::*;
use log::{debug, info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
pub mod co2_plot;
pub mod utils;
pub mod waste_reports;

pub use crate::utils::{ChartErr, DateLabel};

// constants
pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
pub const DEFAULT_OUTPUT_PATH: &str = "Project/Frontend/wwwroot/images/plot.png";
pub const CHART_TITLE: &str = "CO2 Emissions Over Time";
pub const X_DESC: &str = "Date";
pub const Y_DESC: &str = "CO2 Emissions (kg)";
/// 10x5 figure at 100 dpi.
pub const FIGURE_SIZE: (u32, u32) = (1000, 500);
pub const MAX_X_LABELS: usize = 12;
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const MARKER_SIZE: i32 = 4;

/// Render the emission series as a line chart with point markers
/// and write it to output_path, or to the default frontend image path.
/// The returned path is the one the chart was written to.
///
/// The image format follows the extension: svg is written as vector,
/// anything else goes through the bitmap encoder (png, jpg, bmp, ...).
pub fn generate_chart<L: DateLabel>(
    dates: &[L],
    co2_data: &[f64],
    output_path: Option<&str>,
) -> Result<String, ChartErr> {
    let output_path = output_path.unwrap_or(DEFAULT_OUTPUT_PATH);
    if dates.len() != co2_data.len() {
        return Err(ChartErr::ShapeMismatch {
            dates: dates.len(),
            values: co2_data.len(),
        });
    }
    let labels: Vec<String> = dates.iter().map(|d| d.label()).collect();
    render_chart(&labels, co2_data, Path::new(output_path))?;
    info!("chart with {} points saved to {}", labels.len(), output_path);
    Ok(output_path.to_owned())
}

/// The emission time series, dates as axis labels and CO2 in kg.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionSeries {
    pub dates: Vec<String>,
    pub co2: Vec<f64>,
}

impl EmissionSeries {
    /// Initiate a new EmissionSeries
    /// using the given capacity for the date and co2 vectors
    pub fn new(capacity: usize) -> EmissionSeries {
        EmissionSeries {
            dates: Vec::with_capacity(capacity),
            co2: Vec::with_capacity(capacity),
        }
    }

    pub fn push<L: DateLabel>(&mut self, date: L, co2: f64) {
        self.dates.push(date.label());
        self.co2.push(co2);
    }

    pub fn len(&self) -> usize {
        self.co2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.co2.is_empty()
    }

    /// Sum of the finite values.
    pub fn total(&self) -> f64 {
        self.co2.iter().filter(|x| x.is_finite()).sum()
    }

    /// Initiate an EmissionSeries from csv, date label and co2 kg per line.
    /// Set co2 to NAN in case of parsing errors and skip unreadable lines.
    /// Dates are kept as they are, in file order.
    pub fn from_csv<P>(fin: P) -> Result<EmissionSeries, ChartErr>
    where
        P: AsRef<Path>,
    {
        let file = File::open(&fin).map_err(|e| ChartErr::filesystem(&fin, e))?;
        let buf = BufReader::new(file);
        let mut series = EmissionSeries::new(1000);
        for (n, l) in buf.lines().enumerate().skip(1) {
            let l = match l {
                Ok(l) => l,
                Err(e) => {
                    warn!("could not read line {}: {}", n + 1, e);
                    continue;
                }
            };
            if l.trim().is_empty() {
                continue;
            }
            let (date, co2) = match l.split_once(',') {
                Some(fields) => fields,
                None => {
                    warn!("skipping line {} without co2 column: {}", n + 1, l);
                    continue;
                }
            };
            let co2 = match co2.trim().parse::<f64>() {
                Ok(v) => v,
                Err(e) => {
                    warn!("could not parse co2: {}, at date {}. Error: {}", co2, date, e);
                    f64::NAN
                }
            };
            series.push(date.trim(), co2);
        }
        debug!("read {} rows from {}", series.len(), fin.as_ref().display());
        Ok(series)
    }

    /// Write the date and co2 columns to a csv file at the given path.
    pub fn to_csv<P>(&self, fout: P) -> Result<(), ChartErr>
    where
        P: AsRef<Path>,
    {
        let write_all = || -> io::Result<()> {
            let file = File::create(&fout)?;
            let mut buf = BufWriter::new(file);
            buf.write_all(b"date,co2_kg\n")?;
            for (d, c) in self.dates.iter().zip(self.co2.iter()) {
                writeln!(buf, "{},{}", d, c)?;
            }
            buf.flush()
        };
        write_all().map_err(|e| ChartErr::filesystem(&fout, e))
    }

    /// Plot the series as the CO2 line chart.
    pub fn plot_chart<P>(&self, fout: P) -> Result<(), ChartErr>
    where
        P: AsRef<Path>,
    {
        if self.dates.len() != self.co2.len() {
            return Err(ChartErr::ShapeMismatch {
                dates: self.dates.len(),
                values: self.co2.len(),
            });
        }
        render_chart(&self.dates, &self.co2, fout.as_ref())
    }
}

impl fmt::Display for EmissionSeries {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "date,co2_kg")?;
        for (d, c) in self.dates.iter().zip(self.co2.iter()) {
            writeln!(f, "{},{}", d, c)?;
        }
        Ok(())
    }
}

/// Each call draws into its own in-memory backend, dropped before the file is written,
/// so a failed drawing leaves no file behind.
fn render_chart(labels: &[String], values: &[f64], fout: &Path) -> Result<(), ChartErr> {
    check_parent_dir(fout)?;
    let is_svg = fout
        .extension()
        .map(|e| e.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    debug!(
        "drawing {} points to {} ({})",
        values.len(),
        fout.display(),
        if is_svg { "svg" } else { "bitmap" }
    );
    if is_svg {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
            draw_chart(&root, labels, values)?;
            root.present().map_err(draw_err)?;
        }
        fs::write(fout, svg).map_err(|e| ChartErr::filesystem(fout, e))
    } else {
        let (w, h) = FIGURE_SIZE;
        let mut rgb = vec![0u8; (w * h * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut rgb, FIGURE_SIZE).into_drawing_area();
            draw_chart(&root, labels, values)?;
            root.present().map_err(draw_err)?;
        }
        image::save_buffer(fout, &rgb, w, h, image::ColorType::Rgb8).map_err(|e| match e {
            image::ImageError::IoError(e) => ChartErr::filesystem(fout, e),
            e => ChartErr::Encoding {
                path: fout.to_path_buf(),
                source: e,
            },
        })
    }
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    labels: &[String],
    values: &[f64],
) -> Result<(), ChartErr> {
    root.fill(&WHITE).map_err(draw_err)?;
    let mut chart = ChartBuilder::on(root)
        .caption(CHART_TITLE, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range(values.len()), y_range(values))
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(RGBColor(100, 100, 100).mix(0.3).stroke_width(1))
        .label_style(("sans-serif", 14))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .x_labels(labels.len().clamp(1, MAX_X_LABELS))
        .y_labels(10)
        .x_label_formatter(&|x: &f64| category_label(labels, *x))
        .y_label_formatter(&|y: &f64| y_tick_label(*y))
        .draw()
        .map_err(draw_err)?;
    for run in finite_runs(values) {
        chart
            .draw_series(LineSeries::new(
                run.iter().copied(),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(draw_err)?;
        chart
            .draw_series(
                run.iter()
                    .map(|p| Circle::new(*p, MARKER_SIZE, LINE_COLOR.filled())),
            )
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> ChartErr {
    ChartErr::Drawing(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::PathBuf;

    // run tests with:
    // cargo test -- --nocapture
    // to see the log lines and where the charts are saved
    fn test_out(name: &str) -> PathBuf {
        let dir = PathBuf::from("target/test_out/lib");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn is_png(path: &Path) -> bool {
        let bytes = fs::read(path).unwrap();
        bytes.starts_with(&[137, 80, 78, 71])
    }

    #[test]
    fn three_days_to_png() {
        let out = test_out("three_days.png");
        let out_str = out.to_str().unwrap();
        let dates = ["2023-01-01", "2023-01-02", "2023-01-03"];
        let returned = generate_chart(&dates, &[10.5, 11.2, 9.8], Some(out_str)).unwrap();
        assert_eq!(returned, out_str);
        assert!(is_png(&out));
    }

    #[test]
    fn empty_series_gives_axes_only_chart() {
        let out = test_out("empty.png");
        let dates: [&str; 0] = [];
        let returned = generate_chart(&dates, &[], out.to_str()).unwrap();
        assert_eq!(returned, out.to_str().unwrap());
        assert!(is_png(&out));
    }

    #[test]
    fn length_mismatch_writes_nothing() {
        let out = test_out("mismatch.png");
        let _ = fs::remove_file(&out);
        let dates = ["2023-01-01", "2023-01-02", "2023-01-03"];
        match generate_chart(&dates, &[10.5, 11.2], out.to_str()) {
            Err(ChartErr::ShapeMismatch { dates, values }) => {
                assert_eq!((dates, values), (3, 2))
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
        assert!(!out.exists());
    }

    #[test]
    fn missing_directory_writes_nothing() {
        let out = test_out("missing_dir").join("plot.png");
        match generate_chart(&["2023-01-01"], &[1.0], out.to_str()) {
            Err(ChartErr::Filesystem { path, .. }) => assert_eq!(path, out),
            other => panic!("expected filesystem error, got {:?}", other),
        }
        assert!(!out.exists());
        assert!(!out.parent().unwrap().exists());
    }

    #[test]
    fn repeated_calls_overwrite_with_the_same_chart() {
        let out = test_out("repeat.png");
        let dates = [
            NaiveDate::from_ymd_opt(2024, 11, 18).unwrap(),
            NaiveDate::from_ymd_opt(2024, 11, 19).unwrap(),
        ];
        generate_chart(&dates, &[3.0, 4.5], out.to_str()).unwrap();
        let first = fs::read(&out).unwrap();
        generate_chart(&dates, &[3.0, 4.5], out.to_str()).unwrap();
        let second = fs::read(&out).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn svg_by_extension_and_nan_gaps() {
        let out = test_out("gaps.svg");
        let dates = ["a", "b", "c", "d", "e"];
        generate_chart(&dates, &[1.0, f64::NAN, 3.0, 2.0, f64::NAN], out.to_str()).unwrap();
        let svg = fs::read_to_string(&out).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(CHART_TITLE));
        assert!(svg.contains(Y_DESC));
    }

    #[test]
    fn extreme_values_render() {
        let out = test_out("extreme.png");
        let returned = generate_chart(&["a", "b"], &[f64::MAX, -f64::MAX], out.to_str()).unwrap();
        assert_eq!(returned, out.to_str().unwrap());
        assert!(is_png(&out));
        let flat = test_out("flat_large.png");
        generate_chart(&["a", "b"], &[1e17, 1e17], flat.to_str()).unwrap();
        assert!(is_png(&flat));
    }

    #[test]
    fn write_failure_keeps_the_io_error_kind() {
        let dir_as_png = test_out("dir_as_output.png");
        fs::create_dir_all(&dir_as_png).unwrap();
        match generate_chart(&["a"], &[1.0], dir_as_png.to_str()) {
            Err(ChartErr::Filesystem { path, source }) => {
                assert_eq!(path, dir_as_png);
                assert_eq!(source.kind(), io::ErrorKind::IsADirectory);
            }
            other => panic!("expected filesystem error, got {:?}", other),
        }
        let dir_as_svg = test_out("dir_as_output.svg");
        fs::create_dir_all(&dir_as_svg).unwrap();
        match generate_chart(&["a"], &[1.0], dir_as_svg.to_str()) {
            Err(ChartErr::Filesystem { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::IsADirectory)
            }
            other => panic!("expected filesystem error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_extension_is_encoding_error() {
        let out = test_out("chart.unknown");
        let _ = fs::remove_file(&out);
        let res = generate_chart(&["a"], &[1.0], out.to_str());
        assert!(matches!(res, Err(ChartErr::Encoding { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn csv_round_trip_and_plot() {
        let csv = test_out("series.csv");
        let mut series = EmissionSeries::new(3);
        series.push("01-01-2024", 1.5);
        series.push("02-01-2024", 2.25);
        series.push(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 0.0);
        series.to_csv(&csv).unwrap();
        let read = EmissionSeries::from_csv(&csv).unwrap();
        assert_eq!(read, series);
        assert_eq!(read.total(), 3.75);
        let png = test_out("series.png");
        read.plot_chart(&png).unwrap();
        assert!(is_png(&png));
    }

    #[test]
    fn csv_bad_values_become_nan() {
        let csv = test_out("bad_values.csv");
        fs::write(&csv, "date,co2_kg\n2024-01-01,abc\nno_comma\n\n2024-01-02,4\n").unwrap();
        let read = EmissionSeries::from_csv(&csv).unwrap();
        assert_eq!(read.dates, vec!["2024-01-01", "2024-01-02"]);
        assert!(read.co2[0].is_nan());
        assert_eq!(read.co2[1], 4.0);
        assert_eq!(read.total(), 4.0);
    }

    #[test]
    fn csv_missing_file_is_filesystem_error() {
        let res = EmissionSeries::from_csv("target/test_out/lib/no_such_file.csv");
        assert!(matches!(res, Err(ChartErr::Filesystem { .. })));
    }

    #[test]
    fn plot_chart_checks_lengths() {
        let series = EmissionSeries {
            dates: vec!["a".to_string()],
            co2: vec![],
        };
        let res = series.plot_chart(test_out("unequal.png"));
        assert!(matches!(res, Err(ChartErr::ShapeMismatch { dates: 1, values: 0 })));
    }

    #[test]
    fn concurrent_charts_to_distinct_paths() {
        std::thread::scope(|s| {
            for i in 0..4 {
                s.spawn(move || {
                    let out = test_out(&format!("thread_{}.png", i));
                    let values: Vec<f64> = (0..=i).map(|v| v as f64 * 1.5).collect();
                    let dates: Vec<String> = (0..=i).map(|d| format!("day {}", d)).collect();
                    generate_chart(&dates, &values, out.to_str()).unwrap();
                    assert!(is_png(&out));
                });
            }
        });
    }
}
