use std::cell::{Cell, RefCell};

use ratatui::text::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Home,
    Console,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Narrative,
    Charts,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Input => Focus::Narrative,
            Focus::Narrative => Focus::Charts,
            Focus::Charts => Focus::Input,
        }
    }
}

/// Narrative lines as last drawn, keyed by what produced them.
#[derive(Debug)]
pub struct NarrativeCache {
    pub source: String,
    pub width: usize,
    pub raw: bool,
    pub lines: Vec<Line<'static>>,
}

#[derive(Debug, Default)]
pub struct UIState {
    pub screen: Screen,
    pub input: String,
    pub status_message: Option<String>,

    // Command popup state
    pub command_selection: Option<usize>,

    // Lines scrolled from the top of the narrative
    pub narrative_scroll: usize,

    // Rendered narrative height, written by the draw pass
    pub narrative_lines: Cell<usize>,
    pub narrative_cache: RefCell<Option<NarrativeCache>>,

    // Which panel is focused
    pub focus: Focus,

    // Chart panel visibility
    pub show_charts: bool,

    // Markdown rendering toggle
    pub show_raw_markdown: bool,
}

impl UIState {
    pub fn new() -> Self {
        Self {
            show_charts: true,
            ..Self::default()
        }
    }
}
