#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use trip_metrics::models::*;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// `n` consecutive days from `from`, each with one distance label.
pub fn distance_days(from: &str, n: usize, label: &str, metres: f64) -> Vec<DayRecord> {
    date(from)
        .iter_days()
        .take(n)
        .map(|d| DayRecord::new(d).with_value(MetricName::Distance, "mode_confirm", label, metres))
        .collect()
}

/// Log output collected by a test subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Run `f` with WARN and above written here instead of the terminal.
    pub fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(self.0.clone())
    }
}

pub fn write_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, content)?;
    Ok(path)
}

/// JSON Lines of trips: one walk and one unlabeled car trip per day.
pub fn trips_jsonl(from: &str, n: usize) -> String {
    date(from)
        .iter_days()
        .take(n)
        .enumerate()
        .flat_map(|(i, d)| {
            let walk = json!({
                "id": format!("walk-{}", i),
                "start_ts": d.and_hms_opt(8, 0, 0).unwrap().and_utc().timestamp(),
                "date": d.to_string(),
                "distance": 1000.0,
                "duration": 900.0,
                "user_input": {"mode_confirm": "WALKING"},
                "survey_responded": true
            });
            let car = json!({
                "id": format!("car-{}", i),
                "start_ts": d.and_hms_opt(17, 0, 0).unwrap().and_utc().timestamp(),
                "date": d.to_string(),
                "distance": 5000.0,
                "duration": 600.0
            });
            [walk.to_string(), car.to_string()]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Aggregate metrics in the server's wire format.
pub fn aggregate_json(from: &str, n: usize) -> String {
    let days: Vec<serde_json::Value> = date(from)
        .iter_days()
        .take(n)
        .map(|d| {
            json!({
                "date": d.to_string(),
                "nUsers": 12,
                "mode_confirm_BUS": 20000,
                "mode_confirm_Unlabeled": 4000
            })
        })
        .collect();
    json!({ "distance": days }).to_string()
}
