use super::EmissionSeries;
use crate::utils::ChartErr;
use chrono::prelude::*;
use chrono::Days;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Labels of the daily series, day first.
pub const DAILY_LABEL_FMT: &str = "%d-%m-%Y";

/// One entry of the waste report database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteReport {
    pub id: i64,
    #[serde(default)]
    pub waste_type: String,
    #[serde(default)]
    pub waste_processing_facility: String,
    #[serde(default)]
    pub waste_amount: f64,
    #[serde(deserialize_with = "deserialize_waste_date")]
    pub waste_date: NaiveDateTime,
    #[serde(default)]
    pub waste_collector_id: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub co2_emission: Option<f64>,
}

fn default_active() -> bool {
    true
}

/// Accept the plain ISO 8601 local datetime and RFC 3339 with an offset,
/// keeping the wall-clock time of the latter.
fn deserialize_waste_date<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_waste_date(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid wasteDate {}", s)))
}

pub fn parse_waste_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Read the JSON array of waste reports; an empty file is an empty database.
pub fn read_reports<P>(fin: P) -> Result<Vec<WasteReport>, ChartErr>
where
    P: AsRef<Path>,
{
    let content = fs::read_to_string(&fin).map_err(|e| ChartErr::filesystem(&fin, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let reports: Vec<WasteReport> = serde_json::from_str(&content)?;
    debug!("read {} waste reports from {}", reports.len(), fin.as_ref().display());
    Ok(reports)
}

/// First day of the look-back window, saturating at the earliest representable date.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Daily CO2 totals of the reports dated from `today - days` on,
/// in ascending date order. Missing emissions count as zero.
pub fn daily_emissions(reports: &[WasteReport], today: NaiveDate, days: u32) -> EmissionSeries {
    let since = window_start(today, days);
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in reports.iter().filter(|r| r.waste_date.date() >= since) {
        *per_day.entry(r.waste_date.date()).or_insert(0.) += r.co2_emission.unwrap_or(0.);
    }
    let mut series = EmissionSeries::new(per_day.len());
    for (date, co2) in per_day {
        series.push(date.format(DAILY_LABEL_FMT).to_string(), co2);
    }
    series
}

/// Total CO2 of the reports dated within [start, end],
/// optionally restricted to one collector and one waste type.
pub fn total_emission(
    reports: &[WasteReport],
    start: NaiveDate,
    end: NaiveDate,
    collector_id: Option<i64>,
    waste_type: Option<&str>,
) -> f64 {
    reports
        .iter()
        .filter(|r| {
            let d = r.waste_date.date();
            d >= start && d <= end
        })
        .filter(|r| collector_id.map_or(true, |id| r.waste_collector_id == Some(id)))
        .filter(|r| waste_type.map_or(true, |t| r.waste_type == t))
        .map(|r| r.co2_emission.unwrap_or(0.))
        .sum()
}
