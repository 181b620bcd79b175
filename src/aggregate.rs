//! Aggregate (all participants) metrics from the study server.
//!
//! The query is always available so callers can inspect or log it; the HTTP
//! client needs the `remote` feature.

use crate::models::{DateRange, MetricList};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const AGGREGATE_METRICS_PATH: &str = "result/metrics/yyyy_mm_dd";

/// Survey configuration forwarded to the server with every aggregate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyInfo {
    pub trip_labels: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub surveys: BTreeMap<String, Value>,
}

impl Default for SurveyInfo {
    fn default() -> Self {
        Self {
            trip_labels: "MULTILABEL".to_string(),
            surveys: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateAppConfig {
    pub survey_info: SurveyInfo,
}

/// Body of the aggregate metrics request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub freq: String,
    pub start_time: String,
    pub end_time: String,
    pub metric_list: MetricList,
    pub is_return_aggregate: bool,
    pub app_config: AggregateAppConfig,
}

impl AggregateQuery {
    /// Daily aggregates for `range`, both ends as ISO dates.
    pub fn new(metric_list: &MetricList, range: &DateRange, survey_info: &SurveyInfo) -> Self {
        Self {
            freq: "D".to_string(),
            start_time: range.start().to_string(),
            end_time: range.end().to_string(),
            metric_list: metric_list.clone(),
            is_return_aggregate: true,
            app_config: AggregateAppConfig {
                survey_info: survey_info.clone(),
            },
        }
    }
}

#[cfg(feature = "remote")]
mod client {
    use super::*;
    use crate::error::{ErrorSink, MetricsError};
    use crate::models::MetricsData;
    use std::time::Duration;
    use tracing::{debug, info};

    #[derive(Debug, Clone)]
    pub struct AggregateClient {
        http: reqwest::Client,
        connect_url: String,
    }

    impl AggregateClient {
        pub fn new(connect_url: &str, timeout: Duration) -> Result<Self, MetricsError> {
            let http = reqwest::Client::builder().timeout(timeout).build()?;
            Ok(Self {
                http,
                connect_url: connect_url.trim_end_matches('/').to_string(),
            })
        }

        pub fn endpoint(&self) -> String {
            format!("{}/{}", self.connect_url, AGGREGATE_METRICS_PATH)
        }

        pub async fn get_aggregate_data(
            &self,
            query: &AggregateQuery,
        ) -> Result<MetricsData, MetricsError> {
            let url = self.endpoint();
            info!(
                url = %url,
                start = %query.start_time,
                end = %query.end_time,
                "Fetching aggregate metrics"
            );

            let data: MetricsData = self
                .http
                .post(&url)
                .json(query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            debug!(metrics = data.iter().count(), "Received aggregate metrics");
            Ok(data)
        }
    }

    /// Aggregate metrics for `range`, or `None` after reporting the failure to `sink`.
    ///
    /// A missing server is reported like any other failure.
    pub async fn fetch_agg_metrics(
        client: Option<&AggregateClient>,
        metric_list: &MetricList,
        range: &DateRange,
        survey_info: &SurveyInfo,
        sink: &dyn ErrorSink,
    ) -> Option<MetricsData> {
        debug!(range = %range, "Fetching aggregate metrics for date range");
        let result = match client {
            Some(client) => {
                let query = AggregateQuery::new(metric_list, range, survey_info);
                client.get_aggregate_data(&query).await
            }
            None => Err(MetricsError::NoServer),
        };
        match result {
            Ok(data) => Some(data),
            Err(e) => {
                sink.display_error("Error fetching aggregate metrics", &e);
                None
            }
        }
    }
}

#[cfg(feature = "remote")]
pub use client::{fetch_agg_metrics, AggregateClient};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_metric_list;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_query_shape() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 14).unwrap(),
        )
        .unwrap();
        let query = AggregateQuery::new(&default_metric_list(), &range, &SurveyInfo::default());

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            json!({
                "freq": "D",
                "start_time": "2024-05-01",
                "end_time": "2024-05-14",
                "metric_list": {
                    "count": ["mode_confirm"],
                    "distance": ["mode_confirm"],
                    "duration": ["mode_confirm"]
                },
                "is_return_aggregate": true,
                "app_config": {"survey_info": {"trip_labels": "MULTILABEL"}}
            })
        );
    }

    #[cfg(feature = "remote")]
    #[tokio::test]
    async fn test_missing_server_is_reported() {
        use crate::error::test_support::RecordingSink;

        let range = DateRange::ending_at(NaiveDate::from_ymd_opt(2024, 5, 14).unwrap(), 14);
        let sink = RecordingSink::default();
        let data = fetch_agg_metrics(
            None,
            &default_metric_list(),
            &range,
            &SurveyInfo::default(),
            &sink,
        )
        .await;
        assert!(data.is_none());
        assert_eq!(sink.reported.borrow().len(), 1);
        assert!(sink.reported.borrow()[0].starts_with("Error fetching aggregate metrics"));
    }
}
