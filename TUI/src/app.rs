use std::sync::Arc;

use arboard::Clipboard;
use ratatui::text::Line;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::action::Action;
use crate::backend::{AnalysisClient, RawResponse};
use crate::chart::TerminalCanvas;
use crate::command::CommandParser;
use crate::config::{Config, COMMANDS};
use crate::console::{Completion, QueryConsole, Ticket};
use crate::error::QueryError;
use crate::ui_state::{Focus, NarrativeCache, Screen, UIState};

type Outcome = (Ticket, Result<RawResponse, QueryError>);

pub struct App {
    pub ui: UIState,
    pub config: Config,
    pub console: QueryConsole<TerminalCanvas>,
    pub animation_frame: usize,
    pub animation_tick: u64,
    pub show_help: bool,
    pub should_quit: bool,
    status_set_at: u64,
    client: Arc<dyn AnalysisClient>,
    runtime: Handle,
    outcomes_tx: UnboundedSender<Outcome>,
    outcomes_rx: UnboundedReceiver<Outcome>,
}

impl App {
    pub fn new(config: Config, client: Arc<dyn AnalysisClient>, runtime: Handle) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        Self {
            ui: UIState::new(),
            config,
            console: QueryConsole::new(TerminalCanvas, TerminalCanvas),
            animation_frame: 0,
            animation_tick: 0,
            show_help: false,
            should_quit: false,
            status_set_at: 0,
            client,
            runtime,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn enter_console(&mut self) {
        self.ui.screen = Screen::Console;
        info!(endpoint = self.endpoint(), "console opened");
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.ui.status_message = Some(message.into());
        self.status_set_at = self.animation_tick;
    }

    /// Check if command popup should be shown
    pub fn showing_command_popup(&self) -> bool {
        self.ui.input.starts_with('/') && !self.ui.input.contains(' ')
    }

    /// Get filtered commands based on current input
    pub fn get_filtered_commands(&self) -> Vec<(&'static str, &'static str)> {
        let Some(filter) = self.ui.input.strip_prefix('/') else {
            return vec![];
        };
        COMMANDS
            .iter()
            .filter(|(cmd, _)| cmd[1..].starts_with(filter))
            .copied()
            .collect()
    }

    /// Move selection up in command popup
    pub fn command_select_up(&mut self) {
        let count = self.get_filtered_commands().len();
        if count == 0 {
            return;
        }

        // Cycle: None -> last command -> ... -> 0 -> None
        self.ui.command_selection = match self.ui.command_selection {
            None => Some(count - 1),
            Some(0) => None,
            Some(n) => Some(n - 1),
        };
    }

    /// Move selection down in command popup
    pub fn command_select_down(&mut self) {
        let count = self.get_filtered_commands().len();
        if count == 0 {
            return;
        }

        // Cycle: None -> 0 -> 1 -> ... -> last -> None
        self.ui.command_selection = match self.ui.command_selection {
            None => Some(0),
            Some(n) if n >= count - 1 => None,
            Some(n) => Some(n + 1),
        };
    }

    /// Apply selected command to input
    pub fn apply_command_selection(&mut self) {
        if let Some(idx) = self.ui.command_selection {
            if let Some((cmd, _)) = self.get_filtered_commands().get(idx) {
                self.ui.input = cmd.to_string();
            }
        }
        self.ui.command_selection = None;
    }

    /// Reset command selection when input changes
    pub fn reset_command_selection(&mut self) {
        self.ui.command_selection = None;
    }

    pub fn insert_text(&mut self, text: &str) {
        // Single-line input: newlines become spaces
        let filtered: String = text
            .chars()
            .filter(|c| *c != '\r')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        self.ui.input.push_str(&filtered);
        self.reset_command_selection();
    }

    pub fn tick(&mut self) {
        self.animation_tick += 1;
        self.animation_frame = (self.animation_frame + 1) % self.config.animation_frame_mod;

        if self.ui.status_message.is_some()
            && self.animation_tick - self.status_set_at >= self.config.status_timeout_ticks
        {
            self.ui.status_message = None;
        }
    }

    /// Enter in the input box: run a slash command or submit the query.
    pub fn submit(&mut self) {
        let input = self.ui.input.trim().to_string();
        if input.starts_with('/') {
            self.ui.input.clear();
            match CommandParser::parse(&input) {
                Ok(action) => self.perform(action),
                Err(message) => self.set_status(message),
            }
            return;
        }

        // Blank input never reaches the console's state machine
        let Some(ticket) = self.console.begin(&input) else {
            return;
        };
        self.ui.narrative_scroll = 0;

        let client = Arc::clone(&self.client);
        let tx = self.outcomes_tx.clone();
        let query = self.console.query().to_string();
        self.runtime.spawn(async move {
            let outcome = client.post_query(&query).await;
            // Receiver gone means the app is shutting down
            let _ = tx.send((ticket, outcome));
        });
    }

    /// Drain finished requests into the console.
    pub fn poll_outcomes(&mut self) {
        while let Ok((ticket, outcome)) = self.outcomes_rx.try_recv() {
            match self.console.complete(ticket, outcome) {
                Completion::Rendered => self.ui.narrative_scroll = 0,
                Completion::Failed(err) => warn!(kind = err.kind(), "submission failed"),
                Completion::Discarded => {}
            }
        }
    }

    pub fn perform(&mut self, action: Action) {
        match action {
            Action::Help => self.show_help = true,
            Action::Clear => {
                self.console.reset();
                self.ui.narrative_scroll = 0;
                self.set_status("Console cleared");
            }
            Action::ToggleRawMarkdown => self.toggle_markdown_mode(),
            Action::CopyNarrative => self.copy_narrative(),
            Action::ShowEndpoint => {
                let message = format!("Endpoint: {}", self.endpoint());
                self.set_status(message);
            }
            Action::Quit => self.should_quit = true,
        }
    }

    fn copy_narrative(&mut self) {
        if self.console.narrative().is_empty() {
            self.set_status("Nothing to copy yet");
            return;
        }
        let text = self.console.narrative().to_string();
        let copied = Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        match copied {
            Ok(()) => self.set_status("Narrative copied to clipboard"),
            Err(e) => {
                warn!(error = %e, "clipboard unavailable");
                self.set_status(format!("Clipboard error: {}", e));
            }
        }
    }

    pub fn toggle_markdown_mode(&mut self) {
        self.ui.show_raw_markdown = !self.ui.show_raw_markdown;
        self.ui.narrative_scroll = 0;
    }

    pub fn toggle_charts(&mut self) {
        self.ui.show_charts = !self.ui.show_charts;
        if !self.ui.show_charts && self.ui.focus == Focus::Charts {
            self.ui.focus = Focus::Input;
        }
    }

    pub fn cycle_focus(&mut self) {
        self.ui.focus = self.ui.focus.next();
        if self.ui.focus == Focus::Charts && !self.ui.show_charts {
            self.ui.focus = self.ui.focus.next();
        }
    }

    /// Narrative lines for `width`, rebuilt only when the text, width or
    /// raw/rendered mode changed since the last frame.
    pub fn narrative_view(
        &self,
        width: usize,
        build: impl FnOnce(&str) -> Vec<Line<'static>>,
    ) -> Vec<Line<'static>> {
        let text = self.console.narrative();
        let raw = self.ui.show_raw_markdown;
        let mut cache = self.ui.narrative_cache.borrow_mut();

        let lines = match cache.as_ref() {
            Some(c) if c.width == width && c.raw == raw && c.source == text => c.lines.clone(),
            _ => {
                let lines = build(text);
                *cache = Some(NarrativeCache {
                    source: text.to_string(),
                    width,
                    raw,
                    lines: lines.clone(),
                });
                lines
            }
        };
        self.ui.narrative_lines.set(lines.len());
        lines
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.ui.narrative_scroll = self.ui.narrative_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max = self.ui.narrative_lines.get().saturating_sub(1);
        self.ui.narrative_scroll = (self.ui.narrative_scroll + lines).min(max);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::testing::{success_body, StaticClient};
    use crate::console::ViewState;

    fn app_with(client: StaticClient) -> (App, Arc<StaticClient>) {
        let client = Arc::new(client);
        let app = App::new(Config::default(), client.clone(), Handle::current());
        (app, client)
    }

    async fn settle(app: &mut App) {
        for _ in 0..200 {
            app.poll_outcomes();
            if app.console.state() != ViewState::Loading {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("request never completed");
    }

    #[tokio::test]
    async fn test_blank_submit_does_nothing() {
        let (mut app, client) = app_with(StaticClient::replying("{}"));
        app.ui.input = "   ".to_string();

        app.submit();
        tokio::time::sleep(Duration::from_millis(20)).await;
        app.poll_outcomes();

        assert_eq!(client.calls(), 0);
        assert_eq!(app.console.state(), ViewState::Idle);
    }

    #[tokio::test]
    async fn test_submit_runs_in_background_and_renders() {
        let body = success_body(serde_json::json!({"average": 3.5, "growth_rate": 1.2}));
        let (mut app, client) = app_with(StaticClient::replying(body));
        app.ui.input = "GDP growth in Brazil".to_string();

        app.submit();
        assert_eq!(app.console.state(), ViewState::Loading);
        // Input stays so the question can be edited and resent
        assert_eq!(app.ui.input, "GDP growth in Brazil");

        settle(&mut app).await;

        assert_eq!(client.calls(), 1);
        assert_eq!(app.console.state(), ViewState::Result);
        assert_eq!(app.console.metrics().growth, "+1.2");
    }

    #[tokio::test]
    async fn test_failure_lands_in_error_state() {
        let (mut app, _) = app_with(StaticClient::failing(QueryError::Network("refused".into())));
        app.ui.input = "GDP".to_string();

        app.submit();
        settle(&mut app).await;

        assert_eq!(app.console.state(), ViewState::Error);
        assert!(app.console.error_text().contains("refused"));
    }

    #[tokio::test]
    async fn test_clear_command_orphans_request() {
        let body = success_body(serde_json::json!({}));
        let (mut app, _) = app_with(StaticClient::replying(body));
        app.ui.input = "GDP".to_string();
        app.submit();

        app.ui.input = "/clear".to_string();
        app.submit();
        assert!(app.ui.input.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        app.poll_outcomes();

        assert_eq!(app.console.state(), ViewState::Idle);
        assert_eq!(app.ui.status_message.as_deref(), Some("Console cleared"));
    }

    #[tokio::test]
    async fn test_commands() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));

        app.ui.input = "/endpoint".to_string();
        app.submit();
        assert_eq!(app.ui.status_message.as_deref(), Some("Endpoint: static://analysis"));

        app.ui.input = "/raw".to_string();
        app.submit();
        assert!(app.ui.show_raw_markdown);

        app.ui.input = "/copy".to_string();
        app.submit();
        assert_eq!(app.ui.status_message.as_deref(), Some("Nothing to copy yet"));

        app.ui.input = "/help".to_string();
        app.submit();
        assert!(app.show_help);

        app.ui.input = "/bogus".to_string();
        app.submit();
        assert!(app.ui.status_message.as_deref().unwrap().contains("Unknown command"));

        app.ui.input = "/quit".to_string();
        app.submit();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_command_popup_selection() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));
        app.ui.input = "/c".to_string();

        assert!(app.showing_command_popup());
        let filtered = app.get_filtered_commands();
        assert_eq!(filtered.len(), 2); // /clear, /copy

        app.command_select_down();
        app.command_select_down();
        app.apply_command_selection();
        assert_eq!(app.ui.input, "/copy");

        app.ui.input = "/c".to_string();
        app.command_select_up();
        assert_eq!(app.ui.command_selection, Some(1));
        app.command_select_up();
        app.command_select_up();
        assert_eq!(app.ui.command_selection, None);
    }

    #[tokio::test]
    async fn test_paste_flattens_newlines() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));
        app.insert_text("GDP\r\nof India");
        assert_eq!(app.ui.input, "GDP of India");
    }

    #[tokio::test]
    async fn test_status_message_expires() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));
        app.set_status("hello");
        for _ in 0..app.config.status_timeout_ticks - 1 {
            app.tick();
        }
        assert!(app.ui.status_message.is_some());
        app.tick();
        assert!(app.ui.status_message.is_none());
    }

    #[tokio::test]
    async fn test_scroll_is_bounded() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));
        app.ui.narrative_lines.set(10);

        app.scroll_down(50);
        assert_eq!(app.ui.narrative_scroll, 9);
        app.scroll_up(4);
        assert_eq!(app.ui.narrative_scroll, 5);
        app.scroll_up(50);
        assert_eq!(app.ui.narrative_scroll, 0);
    }

    #[tokio::test]
    async fn test_narrative_view_rebuilds_only_on_change() {
        let body = success_body(serde_json::json!({}));
        let (mut app, _) = app_with(StaticClient::replying(body));
        app.ui.input = "GDP".to_string();
        app.submit();
        settle(&mut app).await;

        let builds = std::cell::Cell::new(0);
        let build = |text: &str| {
            builds.set(builds.get() + 1);
            crate::narrative::render_narrative(text, 40)
        };

        let first = app.narrative_view(40, build);
        let second = app.narrative_view(40, build);
        assert_eq!(builds.get(), 1);
        assert_eq!(first, second);
        assert_eq!(app.ui.narrative_lines.get(), first.len());

        app.narrative_view(60, build);
        assert_eq!(builds.get(), 2);

        app.toggle_markdown_mode();
        app.narrative_view(60, build);
        assert_eq!(builds.get(), 3);

        app.perform(Action::Clear);
        app.narrative_view(60, build);
        assert_eq!(builds.get(), 4);
    }

    #[tokio::test]
    async fn test_focus_skips_hidden_charts() {
        let (mut app, _) = app_with(StaticClient::replying("{}"));
        app.toggle_charts();
        assert!(!app.ui.show_charts);

        app.cycle_focus();
        assert_eq!(app.ui.focus, Focus::Narrative);
        app.cycle_focus();
        assert_eq!(app.ui.focus, Focus::Input);
    }
}
