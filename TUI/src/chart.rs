//! Chart slots and the terminal chart surface.
//!
//! A slot owns at most one live chart instance. Every render tears the old
//! instance down before the new one is constructed, and rendering with no data
//! leaves the slot empty instead of showing the previous query's chart.

use ratatui::{style::Color, symbols::Marker};
use tracing::debug;

use crate::backend::ChartData;
use crate::error::QueryError;

/// Bar colours, assigned by position and repeated past the sixth bar.
pub const BAR_PALETTE: [Color; 6] = [
    Color::Rgb(99, 102, 241),  // #6366f1
    Color::Rgb(16, 185, 129),  // #10b981
    Color::Rgb(245, 158, 11),  // #f59e0b
    Color::Rgb(239, 68, 68),   // #ef4444
    Color::Rgb(139, 92, 246),  // #8b5cf6
    Color::Rgb(6, 182, 212),   // #06b6d4
];

/// Line colours for datasets that do not bring a usable `borderColor`.
const LINE_PALETTE: [Color; 4] = [
    Color::Rgb(99, 102, 241),
    Color::Rgb(178, 220, 226),
    Color::Rgb(234, 208, 148),
    Color::Rgb(211, 164, 234),
];

const BAR_SERIES_LABEL: &str = "Period Average";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartStyle {
    pub show_legend: bool,
    pub begin_at_zero: bool,
    pub marker: Marker,
    pub bar_width: u16,
}

impl ChartStyle {
    pub fn line() -> Self {
        Self {
            show_legend: true,
            begin_at_zero: false,
            marker: Marker::Braille,
            bar_width: 0,
        }
    }

    pub fn bar() -> Self {
        Self {
            show_legend: false,
            begin_at_zero: true,
            marker: Marker::Block,
            bar_width: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
    /// One colour for a line; one colour per value for bars.
    pub colors: Vec<Color>,
}

/// Everything a surface needs to build one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
    pub style: ChartStyle,
}

impl ChartConfig {
    pub fn line(data: &ChartData) -> Self {
        let series = data
            .datasets
            .iter()
            .enumerate()
            .map(|(i, ds)| Series {
                label: ds.label.clone(),
                values: ds.data.clone(),
                colors: vec![ds
                    .border_color
                    .as_deref()
                    .and_then(parse_hex_color)
                    .unwrap_or(LINE_PALETTE[i % LINE_PALETTE.len()])],
            })
            .collect();

        Self {
            kind: ChartKind::Line,
            labels: data.labels.clone(),
            series,
            style: ChartStyle::line(),
        }
    }

    /// Only the first dataset is plotted; the rest are ignored.
    pub fn bar(data: &ChartData) -> Result<Self, QueryError> {
        let first = data
            .datasets
            .first()
            .ok_or_else(|| QueryError::Malformed("bar chart data has no datasets".to_string()))?;

        let colors = (0..first.data.len())
            .map(|i| BAR_PALETTE[i % BAR_PALETTE.len()])
            .collect();

        Ok(Self {
            kind: ChartKind::Bar,
            labels: data.labels.clone(),
            series: vec![Series {
                label: BAR_SERIES_LABEL.to_string(),
                values: first.data.clone(),
                colors,
            }],
            style: ChartStyle::bar(),
        })
    }
}

/// Parse `#rrggbb` into a terminal colour.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// A constructed, drawable chart.
pub trait ChartInstance {
    fn destroy(&mut self);
}

/// The drawing collaborator: turns a config into a live instance.
pub trait ChartSurface {
    type Instance: ChartInstance;

    fn construct(&mut self, config: ChartConfig) -> Self::Instance;
}

pub struct ChartSlot<S: ChartSurface> {
    kind: ChartKind,
    surface: S,
    live: Option<S::Instance>,
}

impl<S: ChartSurface> ChartSlot<S> {
    pub fn new(kind: ChartKind, surface: S) -> Self {
        Self {
            kind,
            surface,
            live: None,
        }
    }

    /// Replace whatever is in the slot with a chart of `data`.
    ///
    /// The previous instance is always destroyed first, including when `data`
    /// is absent or turns out to be malformed.
    pub fn render(&mut self, data: Option<&ChartData>) -> Result<(), QueryError> {
        self.dispose();

        let Some(data) = data else {
            debug!(kind = ?self.kind, "no chart data, slot left empty");
            return Ok(());
        };

        let config = match self.kind {
            ChartKind::Line => ChartConfig::line(data),
            ChartKind::Bar => ChartConfig::bar(data)?,
        };
        debug!(kind = ?self.kind, points = config.labels.len(), "constructing chart");
        self.live = Some(self.surface.construct(config));
        Ok(())
    }

    pub fn dispose(&mut self) {
        if let Some(mut instance) = self.live.take() {
            debug!(kind = ?self.kind, "destroying chart");
            instance.destroy();
        }
    }

    pub fn live(&self) -> Option<&S::Instance> {
        self.live.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_none()
    }
}

impl<S: ChartSurface> Drop for ChartSlot<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Chart surface backed by ratatui widgets.
#[derive(Debug, Default)]
pub struct TerminalCanvas;

/// Precomputed plot data for one chart, drawn every frame by the UI.
#[derive(Debug, Clone)]
pub struct PlottedChart {
    pub config: ChartConfig,
    /// Per series, `(label index, value)` with gaps skipped.
    pub points: Vec<Vec<(f64, f64)>>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl PlottedChart {
    fn from_config(config: ChartConfig) -> Self {
        let points: Vec<Vec<(f64, f64)>> = config
            .series
            .iter()
            .map(|s| {
                s.values
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                    .collect()
            })
            .collect();

        let count = config
            .series
            .iter()
            .map(|s| s.values.len())
            .chain(std::iter::once(config.labels.len()))
            .max()
            .unwrap_or(0);
        let x_bounds = [0.0, count.saturating_sub(1).max(1) as f64];

        let (min, max) = points
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
                (lo.min(y), hi.max(y))
            });
        let y_bounds = if min.is_finite() && max.is_finite() {
            let padding = (max - min).abs().max(1.0) * 0.1;
            let lower = if config.style.begin_at_zero {
                min.min(0.0)
            } else {
                min - padding
            };
            [lower, max + padding]
        } else {
            [0.0, 1.0]
        };

        Self {
            config,
            points,
            x_bounds,
            y_bounds,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.points.is_empty() && self.config.series.is_empty()
    }
}

impl ChartInstance for PlottedChart {
    fn destroy(&mut self) {
        self.points.clear();
        self.config.series.clear();
        self.config.labels.clear();
    }
}

impl ChartSurface for TerminalCanvas {
    type Instance = PlottedChart;

    fn construct(&mut self, config: ChartConfig) -> PlottedChart {
        PlottedChart::from_config(config)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceEvent {
        Constructed(usize),
        Destroyed(usize),
    }

    /// Surface that records the lifecycle of every instance it hands out.
    #[derive(Default, Clone)]
    pub struct RecordingSurface {
        pub events: Rc<RefCell<Vec<SurfaceEvent>>>,
        pub configs: Rc<RefCell<Vec<ChartConfig>>>,
        next_id: usize,
    }

    pub struct RecordedChart {
        id: usize,
        events: Rc<RefCell<Vec<SurfaceEvent>>>,
    }

    impl ChartInstance for RecordedChart {
        fn destroy(&mut self) {
            self.events.borrow_mut().push(SurfaceEvent::Destroyed(self.id));
        }
    }

    impl ChartSurface for RecordingSurface {
        type Instance = RecordedChart;

        fn construct(&mut self, config: ChartConfig) -> RecordedChart {
            let id = self.next_id;
            self.next_id += 1;
            self.events.borrow_mut().push(SurfaceEvent::Constructed(id));
            self.configs.borrow_mut().push(config);
            RecordedChart {
                id,
                events: Rc::clone(&self.events),
            }
        }
    }

    impl RecordingSurface {
        pub fn live_count(&self) -> usize {
            let events = self.events.borrow();
            let built = events
                .iter()
                .filter(|e| matches!(e, SurfaceEvent::Constructed(_)))
                .count();
            built - (events.len() - built)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingSurface, SurfaceEvent};
    use super::*;
    use crate::backend::ChartDataset;

    fn sample(values: &[f64]) -> ChartData {
        ChartData {
            labels: (0..values.len()).map(|i| format!("{}", 2015 + i)).collect(),
            datasets: vec![ChartDataset {
                label: "GDP".to_string(),
                data: values.iter().copied().map(Some).collect(),
                border_color: None,
            }],
        }
    }

    #[test]
    fn test_render_twice_destroys_before_second_construct() {
        let surface = RecordingSurface::default();
        let events = surface.events.clone();
        let mut slot = ChartSlot::new(ChartKind::Line, surface.clone());

        slot.render(Some(&sample(&[1.0, 2.0]))).unwrap();
        slot.render(Some(&sample(&[3.0, 4.0]))).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                SurfaceEvent::Constructed(0),
                SurfaceEvent::Destroyed(0),
                SurfaceEvent::Constructed(1),
            ]
        );
        assert_eq!(surface.live_count(), 1);
    }

    #[test]
    fn test_absent_data_clears_slot() {
        let surface = RecordingSurface::default();
        let mut slot = ChartSlot::new(ChartKind::Bar, surface.clone());

        slot.render(Some(&sample(&[1.0]))).unwrap();
        assert!(!slot.is_empty());

        slot.render(None).unwrap();
        assert!(slot.is_empty());
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_bar_without_datasets_fails_after_clearing() {
        let surface = RecordingSurface::default();
        let mut slot = ChartSlot::new(ChartKind::Bar, surface.clone());
        slot.render(Some(&sample(&[1.0]))).unwrap();

        let empty = ChartData {
            labels: vec!["India".to_string()],
            datasets: vec![],
        };
        assert!(matches!(slot.render(Some(&empty)), Err(QueryError::Malformed(_))));
        assert!(slot.is_empty());
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_bar_uses_first_dataset_and_cycles_palette() {
        let mut data = sample(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        data.datasets.push(ChartDataset {
            label: "ignored".to_string(),
            data: vec![Some(99.0)],
            border_color: None,
        });

        let config = ChartConfig::bar(&data).unwrap();
        assert_eq!(config.series.len(), 1);
        assert_eq!(config.series[0].label, "Period Average");
        assert_eq!(config.series[0].colors.len(), 8);
        assert_eq!(config.series[0].colors[6], BAR_PALETTE[0]);
        assert_eq!(config.series[0].colors[7], BAR_PALETTE[1]);
        assert!(config.style.begin_at_zero);
        assert!(!config.style.show_legend);
    }

    #[test]
    fn test_line_keeps_all_datasets_and_border_color() {
        let mut data = sample(&[1.0, 2.0]);
        data.datasets[0].border_color = Some("#4F46E5".to_string());
        data.datasets.push(ChartDataset {
            label: "China".to_string(),
            data: vec![Some(2.0), Some(3.0)],
            border_color: Some("not-a-color".to_string()),
        });

        let config = ChartConfig::line(&data);
        assert_eq!(config.series.len(), 2);
        assert_eq!(config.series[0].colors, vec![Color::Rgb(0x4F, 0x46, 0xE5)]);
        assert_eq!(config.series[1].colors, vec![LINE_PALETTE[1]]);
        assert!(config.style.show_legend);
        assert!(!config.style.begin_at_zero);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff0080"), Some(Color::Rgb(255, 0, 128)));
        assert_eq!(parse_hex_color("ff0080"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn test_plotted_chart_skips_gaps_and_pads_bounds() {
        let data = ChartData {
            labels: vec!["a".into(), "b".into(), "c".into()],
            datasets: vec![ChartDataset {
                label: "x".into(),
                data: vec![Some(10.0), None, Some(20.0)],
                border_color: None,
            }],
        };
        let mut canvas = TerminalCanvas;

        let line = canvas.construct(ChartConfig::line(&data));
        assert_eq!(line.points[0], vec![(0.0, 10.0), (2.0, 20.0)]);
        assert_eq!(line.x_bounds, [0.0, 2.0]);
        assert!(line.y_bounds[0] < 10.0 && line.y_bounds[1] > 20.0);

        let bar = canvas.construct(ChartConfig::bar(&data).unwrap());
        assert_eq!(bar.y_bounds[0], 0.0);
    }

    #[test]
    fn test_plotted_chart_destroy() {
        let mut chart = TerminalCanvas.construct(ChartConfig::line(&sample(&[1.0])));
        assert!(!chart.is_destroyed());
        chart.destroy();
        assert!(chart.is_destroyed());
    }
}
