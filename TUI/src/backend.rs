// Analysis API communication over HTTP/JSON

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::QueryError;

const FALLBACK_ERROR_MESSAGE: &str = "Unknown error from backend.";

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub text: &'a str,
}

/// Status line and body of an HTTP exchange, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    #[serde(default)]
    query_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChartDataset {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<Option<f64>>,
    #[serde(default, rename = "borderColor")]
    pub border_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChartData {
    #[serde(default, deserialize_with = "labels_as_text")]
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Analysis {
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub growth_rate: Option<f64>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub trend_direction: Option<String>,
    #[serde(default)]
    pub chart_data: Option<ChartData>,
    #[serde(default)]
    pub summary_chart_data: Option<ChartData>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PayloadData {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    narrative: Option<String>,
    #[serde(default)]
    analysis: Option<Analysis>,
}

/// Successful result, destructured out of `result.data`.
#[derive(Debug, Clone)]
pub struct AnalysisPayload {
    pub query_id: Option<String>,
    pub source: Option<String>,
    pub narrative: String,
    pub analysis: Analysis,
}

/// Chart labels arrive as strings ("2015") or bare numbers (2015).
fn labels_as_text<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect())
}

fn error_text<'a>(result: &'a Value, key: &str) -> Option<&'a str> {
    result.get(key).and_then(Value::as_str).filter(|m| !m.is_empty())
}

/// Interpret a response body: JSON parse, error-envelope detection, payload
/// extraction. Every failure maps onto one of the three `QueryError` kinds.
pub fn decode_response(body: &str) -> Result<AnalysisPayload, QueryError> {
    let envelope: Envelope = serde_json::from_str(body)?;

    let result_type = envelope
        .result
        .as_ref()
        .and_then(|r| r.get("type"))
        .and_then(Value::as_str);

    if envelope.status.as_deref() == Some("error") || result_type == Some("error") {
        let message = envelope
            .result
            .as_ref()
            .and_then(|r| error_text(r, "message").or_else(|| error_text(r, "error")))
            .unwrap_or(FALLBACK_ERROR_MESSAGE);
        return Err(QueryError::Backend(message.to_string()));
    }

    let data = envelope
        .result
        .and_then(|mut r| r.get_mut("data").map(Value::take))
        .filter(|d| !d.is_null())
        .ok_or_else(|| QueryError::Malformed("response has no result data".to_string()))?;

    let payload: PayloadData = serde_json::from_value(data)?;
    let analysis = payload
        .analysis
        .ok_or_else(|| QueryError::Malformed("result data has no analysis".to_string()))?;
    let narrative = payload
        .narrative
        .ok_or_else(|| QueryError::Malformed("result data has no narrative".to_string()))?;

    Ok(AnalysisPayload {
        query_id: envelope.query_id,
        source: payload.source,
        narrative,
        analysis,
    })
}

/// The remote analysis service, as seen by the console.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn post_query(&self, text: &str) -> Result<RawResponse, QueryError>;

    fn endpoint(&self) -> &str;
}

pub struct HttpAnalysisClient {
    http: reqwest::Client,
    url: String,
}

impl HttpAnalysisClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, QueryError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("query-console/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn post_query(&self, text: &str) -> Result<RawResponse, QueryError> {
        // .json() sets Content-Type: application/json
        let response = self
            .http
            .post(&self.url)
            .json(&QueryRequest { text })
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            tracing::warn!(status, url = %self.url, "analysis API returned non-success status");
        }
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Client that answers every query with the same canned outcome.
    pub struct StaticClient {
        reply: Result<String, QueryError>,
        calls: AtomicUsize,
    }

    impl StaticClient {
        pub fn replying(body: impl Into<String>) -> Self {
            Self {
                reply: Ok(body.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(err: QueryError) -> Self {
            Self {
                reply: Err(err),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisClient for StaticClient {
        async fn post_query(&self, _text: &str) -> Result<RawResponse, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map(RawResponse::ok)
        }

        fn endpoint(&self) -> &str {
            "static://analysis"
        }
    }

    pub fn success_body(analysis: Value) -> String {
        serde_json::json!({
            "query_id": "abc",
            "status": "success",
            "result": {
                "type": "success",
                "data": {
                    "source": "World Bank",
                    "narrative": "## Findings\nGDP rose.",
                    "analysis": analysis
                }
            }
        })
        .to_string()
    }
}
