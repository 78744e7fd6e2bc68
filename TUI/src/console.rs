//! The query console: submission lifecycle, result rendering and the
//! idle/loading/result/error state machine.
//!
//! Network I/O lives elsewhere. The console hands out a [`Ticket`] when a
//! query starts and is later given the raw outcome for that ticket; only the
//! most recent ticket is allowed to touch the view.

use chrono::{DateTime, Local};
use tracing::{debug, error, info};

use crate::backend::{self, Analysis, AnalysisClient, AnalysisPayload, RawResponse};
use crate::chart::{ChartKind, ChartSlot, ChartSurface};
use crate::error::QueryError;

pub const LOADING_STATUS: &str = "Planner Agent: Dispatching Analysis Tasks...";
const MISSING_METRIC: &str = "N/A";
const UNKNOWN_SOURCE: &str = "Unknown source";
const DEFAULT_DATASET_LABEL: &str = "Data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Result,
    Error,
}

/// Which of the three panels are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regions {
    pub loading: bool,
    pub result: bool,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Rendered,
    Failed(QueryError),
    /// A newer submission superseded this one.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metrics {
    pub average: String,
    pub growth: String,
    pub min: String,
    pub max: String,
    pub trend: Option<String>,
}

/// Shortest decimal form: 5.0 -> "5", 2.5 -> "2.5", -0.0 -> "0".
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

pub fn format_metric(value: Option<f64>) -> String {
    value
        .map(format_number)
        .unwrap_or_else(|| MISSING_METRIC.to_string())
}

/// Net change with an explicit "+" for growth; missing means zero.
pub fn format_growth(value: Option<f64>) -> String {
    let growth = value.unwrap_or(0.0);
    let sign = if growth > 0.0 { "+" } else { "" };
    format!("{}{}", sign, format_number(growth))
}

impl Metrics {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        Self {
            average: format_metric(analysis.average),
            growth: format_growth(analysis.growth_rate),
            min: format_metric(analysis.min_value),
            max: format_metric(analysis.max_value),
            trend: analysis.trend_direction.clone(),
        }
    }
}

/// "<source> [<first dataset label>]"
pub fn citation_badge(source: Option<&str>, analysis: &Analysis) -> String {
    let label = analysis
        .chart_data
        .as_ref()
        .and_then(|c| c.datasets.first())
        .map(|ds| ds.label.as_str())
        .unwrap_or(DEFAULT_DATASET_LABEL);
    format!("{} [{}]", source.unwrap_or(UNKNOWN_SOURCE), label)
}

pub struct QueryConsole<S: ChartSurface> {
    state: ViewState,
    status_text: String,
    query: String,
    metrics: Metrics,
    badge: String,
    narrative: String,
    error_text: String,
    last_error: Option<QueryError>,
    query_id: Option<String>,
    completed_at: Option<DateTime<Local>>,
    line_chart: ChartSlot<S>,
    bar_chart: ChartSlot<S>,
    latest: Ticket,
    submissions: u64,
}

impl<S: ChartSurface> QueryConsole<S> {
    pub fn new(line_surface: S, bar_surface: S) -> Self {
        Self {
            state: ViewState::Idle,
            status_text: String::new(),
            query: String::new(),
            metrics: Metrics::default(),
            badge: String::new(),
            narrative: String::new(),
            error_text: String::new(),
            last_error: None,
            query_id: None,
            completed_at: None,
            line_chart: ChartSlot::new(ChartKind::Line, line_surface),
            bar_chart: ChartSlot::new(ChartKind::Bar, bar_surface),
            latest: Ticket(0),
            submissions: 0,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn regions(&self) -> Regions {
        Regions {
            loading: self.state == ViewState::Loading,
            result: self.state == ViewState::Result,
            error: self.state == ViewState::Error,
        }
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn badge(&self) -> &str {
        &self.badge
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    pub fn last_error(&self) -> Option<&QueryError> {
        self.last_error.as_ref()
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    pub fn line_chart(&self) -> &ChartSlot<S> {
        &self.line_chart
    }

    pub fn bar_chart(&self) -> &ChartSlot<S> {
        &self.bar_chart
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Start a submission. Blank input is ignored without touching the view.
    pub fn begin(&mut self, query: &str) -> Option<Ticket> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        self.latest = Ticket(self.latest.0 + 1);
        self.submissions += 1;
        self.state = ViewState::Loading;
        self.status_text = LOADING_STATUS.to_string();
        self.error_text.clear();
        self.last_error = None;
        self.query = query.to_string();

        info!(ticket = self.latest.0, query, "submitting query");
        Some(self.latest)
    }

    /// Apply the outcome of the request identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<RawResponse, QueryError>,
    ) -> Completion {
        if ticket != self.latest || self.state != ViewState::Loading {
            debug!(ticket = ticket.0, latest = self.latest.0, "discarding stale response");
            return Completion::Discarded;
        }

        let rendered = outcome.and_then(|raw| {
            debug!(status = raw.status, bytes = raw.body.len(), "response received");
            let payload = backend::decode_response(&raw.body)?;
            self.render(payload)
        });

        match rendered {
            Ok(()) => {
                self.state = ViewState::Result;
                self.completed_at = Some(Local::now());
                info!(ticket = ticket.0, badge = %self.badge, "result rendered");
                Completion::Rendered
            }
            Err(err) => {
                self.fail(err.clone());
                Completion::Failed(err)
            }
        }
    }

    /// Submit and wait, for callers that own the client directly.
    pub async fn submit<C>(&mut self, client: &C, query: &str) -> Option<Completion>
    where
        C: AnalysisClient + ?Sized,
    {
        let ticket = self.begin(query)?;
        let outcome = client.post_query(&self.query).await;
        Some(self.complete(ticket, outcome))
    }

    /// Back to idle: clears the view and orphans any request in flight.
    pub fn reset(&mut self) {
        self.latest = Ticket(self.latest.0 + 1);
        self.state = ViewState::Idle;
        self.status_text.clear();
        self.metrics = Metrics::default();
        self.badge.clear();
        self.narrative.clear();
        self.error_text.clear();
        self.last_error = None;
        self.query_id = None;
        self.completed_at = None;
        self.line_chart.dispose();
        self.bar_chart.dispose();
    }

    // Each step writes one target; a failure part way leaves the earlier
    // targets written, but the result panel is only shown on full success.
    fn render(&mut self, payload: AnalysisPayload) -> Result<(), QueryError> {
        let AnalysisPayload {
            query_id,
            source,
            narrative,
            analysis,
        } = payload;

        self.query_id = query_id;
        self.metrics = Metrics::from_analysis(&analysis);
        self.badge = citation_badge(source.as_deref(), &analysis);
        self.narrative = narrative;
        self.line_chart.render(analysis.chart_data.as_ref())?;
        self.bar_chart.render(analysis.summary_chart_data.as_ref())?;
        Ok(())
    }

    fn fail(&mut self, err: QueryError) {
        error!(kind = err.kind(), error = %err, query = %self.query, "query failed");
        self.state = ViewState::Error;
        self.error_text = err.user_message();
        self.last_error = Some(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{success_body, StaticClient};
    use crate::chart::testing::{RecordingSurface, SurfaceEvent};

    fn console() -> (QueryConsole<RecordingSurface>, RecordingSurface, RecordingSurface) {
        let line = RecordingSurface::default();
        let bar = RecordingSurface::default();
        (QueryConsole::new(line.clone(), bar.clone()), line, bar)
    }

    fn full_analysis() -> serde_json::Value {
        serde_json::json!({
            "average": 6.25,
            "growth_rate": 5,
            "min_value": 3.1,
            "max_value": 8,
            "trend_direction": "increasing",
            "chart_data": {
                "labels": ["2019", "2020", "2021"],
                "datasets": [
                    {"label": "India", "data": [3.1, 8.0, 7.6]},
                    {"label": "China", "data": [6.0, 2.2, 8.4]}
                ]
            },
            "summary_chart_data": {
                "labels": ["India", "China"],
                "datasets": [{"label": "avg", "data": [6.2, 5.5]}]
            }
        })
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_metric(Some(5.0)), "5");
        assert_eq!(format_metric(Some(2.5)), "2.5");
        assert_eq!(format_metric(None), "N/A");
        assert_eq!(format_growth(Some(5.0)), "+5");
        assert_eq!(format_growth(Some(-3.0)), "-3");
        assert_eq!(format_growth(Some(0.75)), "+0.75");
        assert_eq!(format_growth(None), "0");
        assert_eq!(format_growth(Some(-0.0)), "0");
    }

    #[test]
    fn test_badge_falls_back_to_data_label() {
        let analysis = Analysis::default();
        assert_eq!(citation_badge(Some("OECD"), &analysis), "OECD [Data]");
        assert_eq!(citation_badge(None, &analysis), "Unknown source [Data]");
    }

    #[tokio::test]
    async fn test_empty_query_is_noop() {
        let (mut console, line, _) = console();
        let client = StaticClient::replying(success_body(full_analysis()));

        assert!(console.submit(&client, "").await.is_none());
        assert!(console.submit(&client, "   ").await.is_none());

        assert_eq!(client.calls(), 0);
        assert_eq!(console.state(), ViewState::Idle);
        assert_eq!(console.submissions(), 0);
        assert!(console.status_text().is_empty());
        assert!(line.events.borrow().is_empty());
    }

    #[test]
    fn test_begin_shows_loading_only() {
        let (mut console, _, _) = console();
        console.begin("GDP growth in India").unwrap();

        assert_eq!(
            console.regions(),
            Regions { loading: true, result: false, error: false }
        );
        assert_eq!(console.status_text(), LOADING_STATUS);
        assert_eq!(console.query(), "GDP growth in India");
    }

    #[tokio::test]
    async fn test_success_renders_everything() {
        let (mut console, line, bar) = console();
        let client = StaticClient::replying(success_body(full_analysis()));

        let completion = console.submit(&client, "India vs China GDP").await;
        assert_eq!(completion, Some(Completion::Rendered));

        assert_eq!(
            console.regions(),
            Regions { loading: false, result: true, error: false }
        );
        let metrics = console.metrics();
        assert_eq!(metrics.average, "6.25");
        assert_eq!(metrics.growth, "+5");
        assert_eq!(metrics.min, "3.1");
        assert_eq!(metrics.max, "8");
        assert_eq!(metrics.trend.as_deref(), Some("increasing"));
        assert_eq!(console.badge(), "World Bank [India]");
        assert_eq!(console.narrative(), "## Findings\nGDP rose.");
        assert_eq!(console.query_id(), Some("abc"));
        assert!(console.completed_at().is_some());

        assert_eq!(line.live_count(), 1);
        assert_eq!(bar.live_count(), 1);
        assert_eq!(line.configs.borrow()[0].series.len(), 2);
        assert_eq!(bar.configs.borrow()[0].series.len(), 1);
    }

    #[tokio::test]
    async fn test_null_metrics_show_na() {
        let (mut console, _, _) = console();
        let analysis = serde_json::json!({
            "average": null,
            "growth_rate": -3,
            "trend_direction": "decreasing"
        });
        let client = StaticClient::replying(success_body(analysis));

        console.submit(&client, "exports").await;

        let metrics = console.metrics();
        assert_eq!(metrics.average, "N/A");
        assert_eq!(metrics.min, "N/A");
        assert_eq!(metrics.max, "N/A");
        assert_eq!(metrics.growth, "-3");
        assert_eq!(console.badge(), "World Bank [Data]");
    }

    #[tokio::test]
    async fn test_backend_error_shows_error_panel() {
        let (mut console, _, _) = console();
        let body = r#"{"status": "success", "result": {"type": "error", "message": "bad range"}}"#;
        let client = StaticClient::replying(body.to_string());

        let completion = console.submit(&client, "GDP 1800-1700").await;

        assert_eq!(
            completion,
            Some(Completion::Failed(QueryError::Backend("bad range".into())))
        );
        assert_eq!(
            console.regions(),
            Regions { loading: false, result: false, error: true }
        );
        assert!(console.error_text().contains("bad range"));
    }

    #[tokio::test]
    async fn test_network_failure_uses_same_panel() {
        let (mut console, _, _) = console();
        let client = StaticClient::failing(QueryError::Network("connection refused".into()));

        console.submit(&client, "GDP").await;

        assert_eq!(console.state(), ViewState::Error);
        assert!(matches!(console.last_error(), Some(QueryError::Network(_))));
        assert_eq!(
            console.error_text(),
            "System Error: network request failed: connection refused"
        );
    }

    #[tokio::test]
    async fn test_malformed_response_uses_same_panel() {
        let (mut console, _, _) = console();
        let client = StaticClient::replying("Internal Server Error".to_string());

        console.submit(&client, "GDP").await;

        assert_eq!(console.state(), ViewState::Error);
        assert!(matches!(console.last_error(), Some(QueryError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_partial_render_keeps_earlier_targets() {
        let (mut console, line, bar) = console();
        let mut analysis = full_analysis();
        analysis["summary_chart_data"] = serde_json::json!({"labels": ["India"], "datasets": []});
        let client = StaticClient::replying(success_body(analysis));

        let completion = console.submit(&client, "GDP").await;

        assert!(matches!(completion, Some(Completion::Failed(QueryError::Malformed(_)))));
        assert_eq!(console.state(), ViewState::Error);
        // Metrics, badge and line chart were written before the bar chart failed
        assert_eq!(console.metrics().growth, "+5");
        assert_eq!(console.badge(), "World Bank [India]");
        assert_eq!(line.live_count(), 1);
        assert_eq!(bar.live_count(), 0);
    }

    #[tokio::test]
    async fn test_success_after_failure_clears_error() {
        let (mut console, _, _) = console();

        let failing = StaticClient::failing(QueryError::Network("down".into()));
        console.submit(&failing, "GDP").await;
        assert_eq!(console.state(), ViewState::Error);

        let ok = StaticClient::replying(success_body(full_analysis()));
        console.submit(&ok, "GDP").await;

        assert_eq!(
            console.regions(),
            Regions { loading: false, result: true, error: false }
        );
        assert!(console.error_text().is_empty());
        assert!(console.last_error().is_none());
    }

    #[tokio::test]
    async fn test_resubmission_replaces_charts() {
        let (mut console, line, _) = console();
        let client = StaticClient::replying(success_body(full_analysis()));

        console.submit(&client, "first").await;
        console.submit(&client, "second").await;

        assert_eq!(
            *line.events.borrow(),
            vec![
                SurfaceEvent::Constructed(0),
                SurfaceEvent::Destroyed(0),
                SurfaceEvent::Constructed(1),
            ]
        );
        assert_eq!(line.live_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_chart_data_clears_old_chart() {
        let (mut console, line, bar) = console();
        console
            .submit(&StaticClient::replying(success_body(full_analysis())), "first")
            .await;
        assert_eq!(bar.live_count(), 1);

        let sparse = serde_json::json!({"average": 1.0});
        console
            .submit(&StaticClient::replying(success_body(sparse)), "second")
            .await;

        assert_eq!(console.state(), ViewState::Result);
        assert!(console.line_chart().is_empty());
        assert!(console.bar_chart().is_empty());
        assert_eq!(line.live_count(), 0);
        assert_eq!(bar.live_count(), 0);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let (mut console, _, _) = console();
        let first = console.begin("first").unwrap();
        let second = console.begin("second").unwrap();

        let stale = console.complete(first, Ok(RawResponse::ok(success_body(full_analysis()))));
        assert_eq!(stale, Completion::Discarded);
        assert_eq!(console.state(), ViewState::Loading);

        let body = r#"{"status": "error", "result": {"type": "error", "message": "no data"}}"#;
        let latest = console.complete(second, Ok(RawResponse::ok(body)));
        assert!(matches!(latest, Completion::Failed(_)));
        assert!(console.error_text().contains("no data"));
    }

    #[test]
    fn test_late_stale_response_does_not_overwrite_result() {
        let (mut console, _, _) = console();
        let first = console.begin("first").unwrap();
        let second = console.begin("second").unwrap();

        console.complete(second, Ok(RawResponse::ok(success_body(full_analysis()))));
        let late = console.complete(first, Err(QueryError::Network("timeout".into())));

        assert_eq!(late, Completion::Discarded);
        assert_eq!(console.state(), ViewState::Result);
        assert!(console.error_text().is_empty());
    }

    #[test]
    fn test_reset_orphans_in_flight_request() {
        let (mut console, _, bar) = console();
        let ticket = console.begin("GDP").unwrap();
        console.reset();

        assert_eq!(
            console.complete(ticket, Ok(RawResponse::ok(success_body(full_analysis())))),
            Completion::Discarded
        );
        assert_eq!(console.state(), ViewState::Idle);
        assert_eq!(bar.live_count(), 0);
    }
}
