use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, BorderType, Borders, Chart, Clear, Dataset,
        GraphType, LegendPosition, Paragraph, Wrap,
    },
    Frame,
};

use crate::app::App;
use crate::chart::PlottedChart;
use crate::config::{COMMANDS, EXAMPLE_QUERIES};
use crate::console::{format_number, ViewState};
use crate::narrative;
use crate::ui_state::{Focus, Screen};

// Copper Sapphire Morning color palette
const BG_DARK: Color = Color::Rgb(12, 12, 16);           // Deep background
const BG_PANEL: Color = Color::Rgb(18, 18, 24);          // Slightly lighter for panels

// Sapphire blues
const SAPPHIRE: Color = Color::Rgb(101, 150, 243);       // #6596F3 - Primary accent
const CYAN_LIGHT: Color = Color::Rgb(178, 220, 226);     // #B2DCE2 - Light cyan

// Copper/warm tones
const COPPER: Color = Color::Rgb(138, 72, 38);           // #8A4826 - Copper
const TAN: Color = Color::Rgb(216, 180, 169);            // #D8B4A9 - Tan/beige
const PALE_YELLOW: Color = Color::Rgb(234, 208, 148);    // #EAD094 - Pale yellow

// Accent colors
const BURGUNDY: Color = Color::Rgb(204, 92, 68);         // #CC5C44 - Warnings/errors
const OLIVE: Color = Color::Rgb(131, 179, 102);          // #83B366 - Success/green
const LAVENDER: Color = Color::Rgb(211, 164, 234);       // #D3A4EA - Purple accent

// Text colors
const TEXT_PRIMARY: Color = Color::Rgb(240, 240, 245);   // Near white
const TEXT_SECONDARY: Color = Color::Rgb(180, 180, 190); // Light gray
const TEXT_MUTED: Color = Color::Rgb(105, 116, 133);     // #697485 - Medium gray

// Border colors (subtle)
const BORDER_DIM: Color = Color::Rgb(45, 50, 60);        // Dim border
const BORDER_ACCENT: Color = Color::Rgb(70, 85, 110);    // Accent border

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(frame: &mut Frame, app: &App) {
    // Fill entire background
    let bg = Block::default().style(Style::default().bg(BG_DARK));
    frame.render_widget(bg, frame.area());

    match app.ui.screen {
        Screen::Home => draw_home(frame, app),
        Screen::Console => draw_console(frame, app),
    }
}

fn draw_home(frame: &mut Frame, app: &App) {
    let area = frame.area();

    draw_background_pattern(frame, area, app.animation_frame);

    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Length(10),  // Logo container
            Constraint::Length(3),   // Subtitle
            Constraint::Length(3),   // Hint
            Constraint::Min(0),
        ])
        .split(area);

    let logo_width = 60;
    let h_padding = (area.width.saturating_sub(logo_width)) / 2;
    let logo_area = Rect {
        x: area.x + h_padding,
        y: v_chunks[1].y,
        width: logo_width.min(area.width),
        height: v_chunks[1].height,
    };

    draw_glass_border(frame, logo_area, app.animation_frame);

    let inner = Rect {
        x: logo_area.x + 2,
        y: logo_area.y + 1,
        width: logo_area.width.saturating_sub(4),
        height: logo_area.height.saturating_sub(2),
    };
    draw_animated_logo(frame, inner, app.animation_frame);

    // Subtitle with typing animation
    let subtitle_text = "Ask a question, get metrics, a narrative and charts";
    let visible_chars = ((app.animation_frame as f64 / 120.0 * subtitle_text.len() as f64) as usize)
        .min(subtitle_text.len());
    let subtitle = if app.animation_frame < 120 {
        format!("{}|", &subtitle_text[..visible_chars])
    } else {
        subtitle_text.to_string()
    };
    let subtitle_widget = Paragraph::new(subtitle)
        .alignment(Alignment::Center)
        .style(Style::default().fg(TEXT_SECONDARY));
    frame.render_widget(subtitle_widget, v_chunks[2]);

    // Press any key hint with copper glow
    let glow = (app.animation_frame as f64 / 45.0).sin().abs() * 0.5 + 0.5;
    let r = (138.0 + (216.0 - 138.0) * glow) as u8;
    let g = (72.0 + (180.0 - 72.0) * glow) as u8;
    let b = (38.0 + (169.0 - 38.0) * glow) as u8;
    let hint = Paragraph::new("[ Press any key to start ]")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Rgb(r, g, b)));
    frame.render_widget(hint, v_chunks[3]);

    let version_area = Rect {
        x: area.x,
        y: area.height.saturating_sub(2),
        width: area.width,
        height: 1,
    };
    let version = Paragraph::new(format!("v{}  ·  {}", env!("CARGO_PKG_VERSION"), app.endpoint()))
        .alignment(Alignment::Center)
        .style(Style::default().fg(TEXT_MUTED));
    frame.render_widget(version, version_area);
}

fn draw_background_pattern(frame: &mut Frame, area: Rect, anim_frame: usize) {
    let pattern_offset = (anim_frame / 30) % 4;

    // Twinkling starfield
    let mut lines: Vec<Line> = Vec::new();
    for y in 0..area.height as usize {
        let mut spans: Vec<Span> = Vec::new();
        for x in 0..area.width as usize {
            let show_star = ((x + pattern_offset) % 12 == 0) && ((y + pattern_offset) % 6 == 0);
            if show_star {
                let brightness = 25 + ((anim_frame as f64 / 60.0 + (x as f64 / 12.0)).sin().abs() * 15.0) as u8;
                let color = Color::Rgb(brightness, brightness + 2, brightness + 5);
                spans.push(Span::styled(".", Style::default().fg(color)));
            } else {
                spans.push(Span::raw(" "));
            }
        }
        lines.push(Line::from(spans));
    }

    let pattern = Paragraph::new(lines).style(Style::default().bg(BG_DARK));
    frame.render_widget(pattern, area);
}

fn draw_glass_border(frame: &mut Frame, area: Rect, anim_frame: usize) {
    // Cycles between sapphire and copper
    let t = (anim_frame as f64 / 120.0).sin() * 0.5 + 0.5;
    let r = (84.0 + (138.0 - 84.0) * t) as u8;
    let g = (112.0 + (72.0 - 112.0) * t) as u8;
    let b = (156.0 + (38.0 - 156.0) * t) as u8;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(r, g, b)));
    frame.render_widget(block, area);
}

fn draw_animated_logo(frame: &mut Frame, area: Rect, anim_frame: usize) {
    let logo_lines = [
        "",
        " ██████╗ ██╗   ██╗███████╗██████╗ ██╗   ██╗",
        "██╔═══██╗██║   ██║██╔════╝██╔══██╗╚██╗ ██╔╝",
        "██║   ██║██║   ██║█████╗  ██████╔╝ ╚████╔╝ ",
        "██║▄▄ ██║██║   ██║██╔══╝  ██╔══██╗  ╚██╔╝  ",
        "╚██████╔╝╚██████╔╝███████╗██║  ██║   ██║   ",
        " ╚══▀▀═╝  ╚═════╝ ╚══════╝╚═╝  ╚═╝   ╚═╝   ",
        "            [ C O N S O L E ]              ",
    ];

    let mut lines: Vec<Line> = Vec::new();
    for (line_idx, logo_line) in logo_lines.iter().enumerate() {
        let mut spans: Vec<Span> = Vec::new();
        for (char_idx, ch) in logo_line.chars().enumerate() {
            // Wave between sapphire and cyan
            let wave_offset = (anim_frame as f64 / 25.0) + (char_idx as f64 / 6.0) - (line_idx as f64 / 2.0);
            let t = wave_offset.sin() * 0.5 + 0.5;
            let r = (101.0 + (178.0 - 101.0) * t) as u8;
            let g = (150.0 + (220.0 - 150.0) * t) as u8;
            let b = (243.0 + (226.0 - 243.0) * t) as u8;
            spans.push(Span::styled(ch.to_string(), Style::default().fg(Color::Rgb(r, g, b))));
        }
        lines.push(Line::from(spans));
    }

    let logo = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(logo, area);
}

fn draw_console(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let padded = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(app.config.sidebar_width),
            Constraint::Length(1),   // Gap
            Constraint::Min(40),     // Console area
        ])
        .split(padded);

    draw_sidebar(frame, app, main_chunks[0]);
    draw_console_area(frame, app, main_chunks[2]);

    if app.showing_command_popup() {
        draw_command_popup(frame, app, main_chunks[2]);
    }

    if app.show_help {
        draw_help_overlay(frame, area);
    }
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),   // Session info
            Constraint::Length(1),   // Gap
            Constraint::Min(4),      // Last query
            Constraint::Length(5),   // Keyboard hints
        ])
        .split(area);

    draw_session_info(frame, app, chunks[0]);
    draw_last_query(frame, app, chunks[2]);
    draw_keyboard_hints(frame, chunks[3]);
}

fn draw_session_info(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" Session ", Style::default().fg(COPPER).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_DIM));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (state_label, state_color) = match app.console.state() {
        ViewState::Idle => ("Idle", TEXT_MUTED),
        ViewState::Loading => ("Working", SAPPHIRE),
        ViewState::Result => ("Result", OLIVE),
        ViewState::Error => ("Error", BURGUNDY),
    };

    let endpoint_width = inner.width.saturating_sub(3) as usize;
    let endpoint = truncate(app.endpoint(), endpoint_width);

    let session_text = vec![
        Line::from(vec![
            Span::styled(" * ", Style::default().fg(state_color)),
            Span::styled(state_label, Style::default().fg(state_color)),
        ]),
        Line::from(vec![
            Span::styled(" > ", Style::default().fg(SAPPHIRE)),
            Span::styled(format!("{} queries", app.console.submissions()), Style::default().fg(TEXT_PRIMARY)),
        ]),
        Line::from(vec![
            Span::styled(" @ ", Style::default().fg(CYAN_LIGHT)),
            Span::styled(endpoint, Style::default().fg(TEXT_MUTED)),
        ]),
    ];

    frame.render_widget(Paragraph::new(session_text), inner);
}

fn draw_last_query(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" Query ", Style::default().fg(TEXT_MUTED)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_DIM));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = Vec::new();
    if app.console.query().is_empty() {
        lines.push(Line::from(Span::styled("nothing asked yet", Style::default().fg(TEXT_MUTED))));
    } else {
        lines.push(Line::from(Span::styled(
            app.console.query().to_string(),
            Style::default().fg(TEXT_SECONDARY),
        )));
    }
    if let Some(at) = app.console.completed_at() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("done {}", at.format("%H:%M:%S")),
            Style::default().fg(TEXT_MUTED),
        )));
    }
    if let Some(id) = app.console.query_id() {
        lines.push(Line::from(Span::styled(format!("id {}", id), Style::default().fg(TEXT_MUTED))));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_keyboard_hints(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_DIM));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let hints = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("ESC", Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD)),
            Span::styled(" quit  ", Style::default().fg(TEXT_MUTED)),
            Span::styled("/", Style::default().fg(COPPER).add_modifier(Modifier::BOLD)),
            Span::styled(" cmds", Style::default().fg(TEXT_MUTED)),
        ]),
        Line::from(vec![
            Span::styled("F2", Style::default().fg(LAVENDER).add_modifier(Modifier::BOLD)),
            Span::styled(" md  ", Style::default().fg(TEXT_MUTED)),
            Span::styled("TAB", Style::default().fg(CYAN_LIGHT).add_modifier(Modifier::BOLD)),
            Span::styled(" charts", Style::default().fg(TEXT_MUTED)),
        ]),
        Line::from(vec![
            Span::styled("PgUp/PgDn", Style::default().fg(TAN).add_modifier(Modifier::BOLD)),
            Span::styled(" scroll", Style::default().fg(TEXT_MUTED)),
        ]),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(hints, inner);
}

fn draw_console_area(frame: &mut Frame, app: &App, area: Rect) {
    // Input grows with content (min 3, max 6)
    let input_width = area.width.saturating_sub(6) as usize;
    let input_lines = if input_width > 0 {
        (app.ui.input.len() / input_width) + 1
    } else {
        1
    };
    let input_height = (input_lines as u16 + 2).clamp(3, 6);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),               // Region
            Constraint::Length(1),            // Gap
            Constraint::Length(input_height), // Input
        ])
        .split(area);

    // Exactly one region is visible at a time
    let regions = app.console.regions();
    if regions.loading {
        draw_loading(frame, app, chunks[0]);
    } else if regions.error {
        draw_error(frame, app, chunks[0]);
    } else if regions.result {
        draw_result(frame, app, chunks[0]);
    } else {
        draw_idle(frame, chunks[0]);
    }

    draw_input(frame, app, chunks[2]);
}

fn panel(title: &str, border: Color) -> Block<'_> {
    Block::default()
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
}

fn draw_idle(frame: &mut Frame, area: Rect) {
    let block = panel("Console", BORDER_DIM);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("◆ ", Style::default().fg(COPPER)),
            Span::styled("Q U E R Y   C O N S O L E", Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD)),
            Span::styled(" ◆", Style::default().fg(COPPER)),
        ]),
        Line::from(""),
        Line::from(Span::styled("Try asking:", Style::default().fg(TEXT_MUTED))),
        Line::from(""),
    ];
    for example in EXAMPLE_QUERIES {
        lines.push(Line::from(Span::styled(
            format!("\"{}\"", example),
            Style::default().fg(CYAN_LIGHT).add_modifier(Modifier::ITALIC),
        )));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn draw_loading(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Working", SAPPHIRE);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let spinner = SPINNER_FRAMES[(app.animation_frame / 6) % SPINNER_FRAMES.len()];

    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(vec![
            Span::styled(format!("{} ", spinner), Style::default().fg(SAPPHIRE)),
            Span::styled(app.console.status_text().to_string(), Style::default().fg(TEXT_PRIMARY)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            app.console.query().to_string(),
            Style::default().fg(TEXT_MUTED).add_modifier(Modifier::ITALIC),
        )),
    ];

    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }),
        inner,
    );
}

fn draw_error(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Error", BURGUNDY);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let padded = Rect {
        x: inner.x + 1,
        y: inner.y + 1,
        width: inner.width.saturating_sub(2),
        height: inner.height.saturating_sub(2),
    };

    let lines = vec![
        Line::from(Span::styled(
            app.console.error_text().to_string(),
            Style::default().fg(BURGUNDY).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to try again, or edit the question first.",
            Style::default().fg(TEXT_MUTED),
        )),
    ];

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), padded);
}

fn draw_result(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Metrics grid
            Constraint::Length(1), // Badge
            Constraint::Min(5),    // Narrative + charts
        ])
        .split(area);

    draw_metrics(frame, app, chunks[0]);
    draw_badge(frame, app, chunks[1]);

    if app.ui.show_charts {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Length(1),
                Constraint::Percentage(50),
            ])
            .split(chunks[2]);
        draw_narrative(frame, app, body[0]);
        draw_charts(frame, app, body[2]);
    } else {
        draw_narrative(frame, app, chunks[2]);
    }
}

fn draw_metrics(frame: &mut Frame, app: &App, area: Rect) {
    let metrics = app.console.metrics();

    let growth_color = if metrics.growth.starts_with('+') {
        OLIVE
    } else if metrics.growth.starts_with('-') {
        BURGUNDY
    } else {
        TEXT_PRIMARY
    };
    let trend = match metrics.trend.as_deref() {
        Some("increasing") => " ▲",
        Some("decreasing") => " ▼",
        Some("stable") => " ■",
        _ => "",
    };

    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    let grid = [
        ("Average", metrics.average.clone(), TEXT_PRIMARY),
        ("Growth", format!("{}{}", metrics.growth, trend), growth_color),
        ("Min", metrics.min.clone(), CYAN_LIGHT),
        ("Max", metrics.max.clone(), PALE_YELLOW),
    ];

    for ((label, value, color), cell) in grid.into_iter().zip(cells.iter()) {
        let block = Block::default()
            .title(Span::styled(format!(" {} ", label), Style::default().fg(TEXT_MUTED)))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BORDER_DIM));
        let value = Paragraph::new(Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(value, *cell);
    }
}

fn draw_badge(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" ◆ ", Style::default().fg(COPPER)),
        Span::styled(app.console.badge().to_string(), Style::default().fg(TAN)),
    ];
    if let Some(at) = app.console.completed_at() {
        spans.push(Span::styled(
            format!("  ·  {}", at.format("%Y-%m-%d %H:%M:%S")),
            Style::default().fg(TEXT_MUTED),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_narrative(frame: &mut Frame, app: &App, area: Rect) {
    let border = if app.ui.focus == Focus::Narrative { SAPPHIRE } else { BORDER_DIM };
    let title = if app.ui.show_raw_markdown { "Narrative (raw)" } else { "Narrative" };
    let block = panel(title, border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let padded = Rect {
        x: inner.x + 1,
        y: inner.y,
        width: inner.width.saturating_sub(2),
        height: inner.height,
    };

    let width = padded.width as usize;
    let raw = app.ui.show_raw_markdown;
    let lines = app.narrative_view(width, |text| {
        if raw {
            narrative::raw_lines(text)
        } else {
            narrative::render_narrative(text, width)
        }
    });

    let scroll = app.ui.narrative_scroll.min(lines.len().saturating_sub(1)) as u16;
    let mut paragraph = Paragraph::new(lines).scroll((scroll, 0));
    if raw {
        paragraph = paragraph.wrap(Wrap { trim: false });
    }
    frame.render_widget(paragraph, padded);
}

fn draw_charts(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let border = if app.ui.focus == Focus::Charts { SAPPHIRE } else { BORDER_DIM };

    let line_block = panel("Trend", border);
    let line_inner = line_block.inner(chunks[0]);
    frame.render_widget(line_block, chunks[0]);
    match app.console.line_chart().live() {
        Some(chart) => draw_line_chart(frame, chart, line_inner),
        None => draw_no_chart(frame, line_inner),
    }

    let bar_block = panel("Period Average", border);
    let bar_inner = bar_block.inner(chunks[1]);
    frame.render_widget(bar_block, chunks[1]);
    match app.console.bar_chart().live() {
        Some(chart) => draw_bar_chart(frame, chart, bar_inner),
        None => draw_no_chart(frame, bar_inner),
    }
}

fn draw_no_chart(frame: &mut Frame, area: Rect) {
    let empty = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("No chart data", Style::default().fg(TEXT_MUTED))),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(empty, area);
}

fn draw_line_chart(frame: &mut Frame, chart: &PlottedChart, area: Rect) {
    let style = chart.config.style;

    let datasets: Vec<Dataset> = chart
        .config
        .series
        .iter()
        .zip(chart.points.iter())
        .map(|(series, points)| {
            let color = series.colors.first().copied().unwrap_or(SAPPHIRE);
            Dataset::default()
                .name(series.label.clone())
                .marker(style.marker)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(points)
        })
        .collect();

    let x_labels = edge_labels(&chart.config.labels);
    let y_labels = vec![
        Span::styled(format_number(round2(chart.y_bounds[0])), Style::default().fg(TEXT_MUTED)),
        Span::styled(format_number(round2(chart.y_bounds[1])), Style::default().fg(TEXT_MUTED)),
    ];

    let legend = style.show_legend.then_some(LegendPosition::TopLeft);

    let widget = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(BORDER_ACCENT))
                .bounds(chart.x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(BORDER_ACCENT))
                .bounds(chart.y_bounds)
                .labels(y_labels),
        )
        .legend_position(legend)
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));

    frame.render_widget(widget, area);
}

fn draw_bar_chart(frame: &mut Frame, chart: &PlottedChart, area: Rect) {
    let Some(series) = chart.config.series.first() else {
        return draw_no_chart(frame, area);
    };

    let bars: Vec<Bar> = series
        .values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let color = series.colors.get(i).copied().unwrap_or(SAPPHIRE);
            let label = chart.config.labels.get(i).cloned().unwrap_or_default();
            let text = value.map(format_number).unwrap_or_default();
            let (height, negative) = bar_height(*value);
            // Negative bars stand as tall as their magnitude; the value cell marks the sign
            let value_style = if negative {
                Style::default().fg(TEXT_PRIMARY).bg(BURGUNDY)
            } else {
                Style::default().fg(BG_DARK).bg(color)
            };
            Bar::default()
                .value(height)
                .text_value(text)
                .label(Line::from(label))
                .style(Style::default().fg(color))
                .value_style(value_style)
        })
        .collect();

    let tallest = series.values.iter().map(|v| bar_height(*v).0).max().unwrap_or(0);
    let widget = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(chart.config.style.bar_width)
        .bar_gap(1)
        .max(tallest.max(1));

    frame.render_widget(widget, area);
}

/// Bar height in hundredths, and whether the value is negative.
fn bar_height(value: Option<f64>) -> (u64, bool) {
    match value {
        Some(v) if v.is_finite() => ((v.abs() * 100.0).round() as u64, v < 0.0),
        _ => (0, false),
    }
}

fn edge_labels(labels: &[String]) -> Vec<Span<'static>> {
    let style = Style::default().fg(TEXT_MUTED);
    match labels {
        [] => vec![],
        [only] => vec![Span::styled(only.clone(), style)],
        [first, .., last] => vec![
            Span::styled(first.clone(), style),
            Span::styled(last.clone(), style),
        ],
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    // Pulse when focused
    let border_color = if app.ui.focus == Focus::Input {
        let glow = (app.animation_frame as f64 / 90.0).sin() * 0.3 + 0.7;
        Color::Rgb((101.0 * glow) as u8, (150.0 * glow) as u8, (243.0 * glow) as u8)
    } else {
        BORDER_DIM
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));

    if let Some(message) = &app.ui.status_message {
        block = block.title_bottom(Span::styled(
            format!(" {} ", message),
            Style::default().fg(PALE_YELLOW),
        ));
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let cursor = if app.animation_frame % 30 < 15 { "|" } else { " " };
    let input_text = format!(" > {}{}", app.ui.input, cursor);

    let input = Paragraph::new(input_text)
        .style(Style::default().fg(TEXT_PRIMARY))
        .wrap(Wrap { trim: false });
    frame.render_widget(input, inner);
}

fn draw_command_popup(frame: &mut Frame, app: &App, console_area: Rect) {
    let filtered = app.get_filtered_commands();
    if filtered.is_empty() {
        return;
    }

    // +1 for the "your input" option, +2 for borders
    let popup_height = (filtered.len() + 3) as u16;
    let popup_width = 44.min(console_area.width.saturating_sub(4));
    let popup_area = Rect {
        x: console_area.x + 2,
        y: console_area.y + console_area.height.saturating_sub(popup_height + 4),
        width: popup_width,
        height: popup_height,
    };

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(" Commands ", Style::default().fg(COPPER).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(COPPER))
        .style(Style::default().bg(BG_PANEL));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines: Vec<Line> = Vec::new();

    // First option: current typed input (selected when command_selection is None)
    let input_selected = app.ui.command_selection.is_none();
    let input_style = if input_selected {
        Style::default().fg(CYAN_LIGHT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT_SECONDARY)
    };
    let indicator = if input_selected { ">" } else { " " };
    lines.push(Line::from(vec![
        Span::styled(format!("{} {} ", indicator, &app.ui.input), input_style),
        Span::styled("(your input)", Style::default().fg(TEXT_MUTED).add_modifier(Modifier::ITALIC)),
    ]));

    for (i, (cmd, desc)) in filtered.iter().enumerate() {
        let is_selected = app.ui.command_selection == Some(i);
        let style = if is_selected {
            Style::default().fg(CYAN_LIGHT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(TEXT_SECONDARY)
        };
        let indicator = if is_selected { ">" } else { " " };

        lines.push(Line::from(vec![
            Span::styled(format!("{} {} ", indicator, cmd), style),
            Span::styled(format!("- {}", desc), Style::default().fg(TEXT_MUTED)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let keys: [(&str, &str); 7] = [
        ("Enter", "Submit question"),
        ("Esc", "Clear input / quit"),
        ("Up/Down", "Scroll narrative"),
        ("PgUp/PgDn", "Scroll a page"),
        ("F2", "Raw / rendered narrative"),
        ("Tab", "Show or hide charts"),
        ("Shift+Tab", "Cycle focus"),
    ];

    let height = (COMMANDS.len() + keys.len() + 5) as u16;
    let width = 52.min(area.width.saturating_sub(4));
    let overlay = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height: height.min(area.height),
    };

    frame.render_widget(Clear, overlay);

    let block = Block::default()
        .title(Span::styled(" Help ", Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD)))
        .title_bottom(Span::styled(" any key to close ", Style::default().fg(TEXT_MUTED)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_ACCENT))
        .style(Style::default().bg(BG_PANEL));

    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let mut lines = vec![Line::from(Span::styled(
        "Commands",
        Style::default().fg(COPPER).add_modifier(Modifier::BOLD),
    ))];
    for (cmd, desc) in COMMANDS {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<11}", cmd), Style::default().fg(CYAN_LIGHT)),
            Span::styled(*desc, Style::default().fg(TEXT_SECONDARY)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Keys",
        Style::default().fg(COPPER).add_modifier(Modifier::BOLD),
    )));
    for (key, desc) in keys {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<11}", key), Style::default().fg(LAVENDER)),
            Span::styled(desc, Style::default().fg(TEXT_SECONDARY)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}
