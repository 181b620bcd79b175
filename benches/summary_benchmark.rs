//! Benchmarks for the summary pipeline
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trip_metrics::footprint::{EmissionFactors, FootprintRange};
use trip_metrics::models::*;
use trip_metrics::summary::{generate_summaries, SummaryOptions};
use trip_metrics::timeline::{days_from_trips, TripRecord};
use trip_metrics::weeks::summarize_weeks;

const MODES: &[&str] = &["WALKING", "BICYCLING", "BUS", "CAR", "TRAIN"];

/// `num_days` days with `trips_per_day` trips each; every fifth trip unlabeled.
fn generate_trips(num_days: usize, trips_per_day: usize) -> Vec<TripRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    start
        .iter_days()
        .take(num_days)
        .flat_map(|date| {
            (0..trips_per_day).map(move |i| TripRecord {
                id: format!("{}-{}", date, i),
                start_ts: date.and_hms_opt(8, 0, 0).unwrap().and_utc().timestamp() + i as i64 * 600,
                date,
                distance: 500.0 + (i * 250) as f64,
                duration: 300.0 + (i * 60) as f64,
                user_input: if i % 5 == 4 {
                    Default::default()
                } else {
                    [("mode_confirm".to_string(), MODES[i % MODES.len()].to_string())]
                        .into_iter()
                        .collect()
                },
                survey_responded: Some(i % 2 == 0),
            })
        })
        .collect()
}

fn benchmark_generate_summaries(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_summaries");
    let metric_list = default_metric_list();

    for num_days in [14, 90, 365].iter() {
        let days = days_from_trips(&generate_trips(*num_days, 8), &metric_list);
        group.bench_with_input(BenchmarkId::from_parameter(num_days), &days, |b, days| {
            b.iter(|| {
                generate_summaries(
                    black_box(&metric_list),
                    black_box(days),
                    &SummaryOptions::default(),
                    None,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn benchmark_weekly_footprint(c: &mut Criterion) {
    let metric_list = default_metric_list();
    let days = days_from_trips(&generate_trips(14, 8), &metric_list);
    let data = generate_summaries(&metric_list, &days, &SummaryOptions::default(), None).unwrap();
    let distance = data.days(MetricName::Distance).unwrap().to_vec();
    let range = DateRange::new(distance[0].date, distance.last().unwrap().date).unwrap();
    let factors = EmissionFactors::default();

    c.bench_function("weekly_footprint", |b| {
        b.iter(|| {
            let weekly = summarize_weeks(black_box(&distance), &range, "mode_confirm")
                .unwrap()
                .unwrap();
            FootprintRange::for_summary(&weekly.this_week.summary, &factors)
        })
    });
}

fn benchmark_days_from_trips(c: &mut Criterion) {
    let trips = generate_trips(90, 8);
    let mut metric_list = default_metric_list();
    metric_list.insert(MetricName::ResponseCount, vec!["mode_confirm".to_string()]);

    c.bench_function("days_from_trips_90d", |b| {
        b.iter(|| days_from_trips(black_box(&trips), &metric_list))
    });
}

criterion_group!(
    benches,
    benchmark_generate_summaries,
    benchmark_weekly_footprint,
    benchmark_days_from_trips
);
criterion_main!(benches);
