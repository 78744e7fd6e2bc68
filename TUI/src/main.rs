mod action;
mod app;
mod backend;
mod chart;
mod command;
mod config;
mod console;
mod error;
mod narrative;
mod ui;
mod ui_state;

use std::env;
use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use arboard::Clipboard;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use backend::HttpAnalysisClient;
use config::{Config, USAGE};
use ui::draw;
use ui_state::Screen;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            std::process::exit(2);
        }
    };

    // The terminal belongs to the UI, so logs go to a file
    let log_file = File::create(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("query_console=info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), api_url = %config.api_url, "query console starting");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let client = HttpAnalysisClient::new(config.api_url.clone(), config.request_timeout())?;
    let mut app = App::new(config, Arc::new(client), runtime.handle().clone());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
    terminal.show_cursor()?;

    info!(queries = app.console.submissions(), "query console exiting");
    // In-flight requests are abandoned
    runtime.shutdown_background();

    result.context("terminal error")
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(app.config.tick_rate_ms);

    while !app.should_quit {
        app.tick();
        app.poll_outcomes();

        terminal.draw(|frame| draw(frame, app))?;

        if !event::poll(tick_rate)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if app.ui.screen == Screen::Home {
                    // Any key enters the console; Esc leaves
                    if key.code == KeyCode::Esc {
                        return Ok(());
                    }
                    app.enter_console();
                    continue;
                }

                if app.show_help {
                    app.show_help = false;
                    continue;
                }

                let page = app.config.scroll_step * 5;
                match key.code {
                    KeyCode::Esc => {
                        if app.showing_command_popup() {
                            app.reset_command_selection();
                            app.ui.input.clear();
                        } else if app.ui.input.is_empty() {
                            return Ok(());
                        } else {
                            app.ui.input.clear();
                        }
                    }
                    KeyCode::Enter => {
                        if app.showing_command_popup() && app.ui.command_selection.is_some() {
                            app.apply_command_selection();
                        } else {
                            app.submit();
                        }
                    }
                    KeyCode::Tab => {
                        if app.showing_command_popup() && app.ui.command_selection.is_some() {
                            app.apply_command_selection();
                        } else {
                            app.toggle_charts();
                        }
                    }
                    KeyCode::BackTab => app.cycle_focus(),
                    KeyCode::Backspace => {
                        app.ui.input.pop();
                        app.reset_command_selection();
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(());
                    }
                    KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        if let Ok(text) = Clipboard::new().and_then(|mut c| c.get_text()) {
                            app.insert_text(&text);
                        }
                    }
                    KeyCode::Char(c) => {
                        app.ui.input.push(c);
                        app.reset_command_selection();
                    }
                    KeyCode::Up => {
                        if app.showing_command_popup() {
                            app.command_select_up();
                        } else {
                            app.scroll_up(app.config.scroll_step);
                        }
                    }
                    KeyCode::Down => {
                        if app.showing_command_popup() {
                            app.command_select_down();
                        } else {
                            app.scroll_down(app.config.scroll_step);
                        }
                    }
                    KeyCode::PageUp => app.scroll_up(page),
                    KeyCode::PageDown => app.scroll_down(page),
                    KeyCode::F(2) => app.toggle_markdown_mode(),
                    _ => {}
                }
            }
            Event::Paste(text) => {
                if app.ui.screen == Screen::Console {
                    app.insert_text(&text);
                }
            }
            _ => {}
        }
    }

    Ok(())
}
