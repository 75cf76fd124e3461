use chrono::prelude::*;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Errors returned while loading, aggregating, and plotting emission series.
#[derive(Debug, thiserror::Error)]
pub enum ChartErr {
    #[error("shape mismatch, got {dates} dates and {values} values")]
    ShapeMismatch { dates: usize, values: usize },
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not draw the chart: {0}")]
    Drawing(String),
    #[error("could not encode the chart as {}: {source}", .path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not parse waste reports: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ChartErr {
    pub fn filesystem<P: AsRef<Path>>(path: P, source: io::Error) -> ChartErr {
        ChartErr::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Anything that can be shown as a tick label on the date axis.
pub trait DateLabel {
    fn label(&self) -> String;
}

impl DateLabel for str {
    fn label(&self) -> String {
        self.to_owned()
    }
}

impl DateLabel for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl DateLabel for NaiveDate {
    fn label(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }
}

impl DateLabel for NaiveDateTime {
    fn label(&self) -> String {
        self.format("%Y-%m-%d %H:%M").to_string()
    }
}

impl DateLabel for DateTime<FixedOffset> {
    fn label(&self) -> String {
        self.to_rfc3339()
    }
}

impl<T: DateLabel + ?Sized> DateLabel for &T {
    fn label(&self) -> String {
        (**self).label()
    }
}

/// Minimum and maximum of the iterator, None when it is empty.
pub fn min_and_max<'a, I, T>(mut s: I) -> Option<(T, T)>
where
    I: Iterator<Item = &'a T>,
    T: 'a + std::cmp::PartialOrd + Clone,
{
    let (mut min, mut max) = match s.next() {
        Some(v) => (v, v),
        None => return None,
    };
    for es in s {
        if es > max {
            max = es
        } else if es < min {
            min = es
        }
    }
    Some((min.clone(), max.clone()))
}

/// Category axis: one slot per label, centred on the integer positions.
pub fn x_range(n: usize) -> Range<f64> {
    if n == 0 {
        0f64..1f64
    } else {
        -0.5f64..(n as f64 - 0.5)
    }
}

/// Values beyond this magnitude are drawn at the limit,
/// so the padded axis span stays finite.
pub const Y_LIMIT: f64 = f64::MAX / 4f64;

/// Pad the finite values by a tenth of their span on both sides,
/// and by at least a billionth of their magnitude.
/// A flat series gets a tenth of its magnitude (at least 1), an empty one the unit range.
pub fn y_range(values: &[f64]) -> Range<f64> {
    match min_and_max(values.iter().filter(|x| x.is_finite())) {
        None => 0f64..1f64,
        Some((ymin, ymax)) => {
            let (ymin, ymax) = (clamp_y(ymin), clamp_y(ymax));
            let magnitude = ymin.abs().max(ymax.abs());
            let pad = if ymax > ymin {
                ((ymax - ymin) / 10f64).max(magnitude * 1e-9)
            } else {
                (magnitude / 10f64).max(1f64)
            };
            (ymin - pad)..(ymax + pad)
        }
    }
}

pub fn clamp_y(v: f64) -> f64 {
    v.clamp(-Y_LIMIT, Y_LIMIT)
}

/// Label of the category at x, empty for positions between categories.
pub fn category_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0. {
        return String::new();
    }
    match labels.get(rounded as usize) {
        Some(l) => l.clone(),
        None => String::new(),
    }
}

/// One decimal for everyday values, scientific notation for large ones.
pub fn y_tick_label(y: f64) -> String {
    if y.abs() >= 1e7 {
        format!("{:.2e}", y)
    } else {
        format!("{:.1}", y)
    }
}

/// Split the series at non-finite values into runs of drawable points,
/// keeping the category position of every point.
pub fn finite_runs(values: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut runs: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if v.is_finite() {
            current.push((i as f64, clamp_y(*v)));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Check that the file can be created in its directory, without creating anything.
/// An empty parent means the current directory.
pub fn check_parent_dir(path: &Path) -> Result<(), ChartErr> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };
    if parent.is_dir() {
        return Ok(());
    }
    let source = if parent.exists() {
        io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", parent.display()),
        )
    } else {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("directory {} does not exist", parent.display()),
        )
    };
    Err(ChartErr::filesystem(path, source))
}
