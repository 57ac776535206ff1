//! Ratatui-based terminal UI.
//!
//! The TUI runs the same pipeline as `corecpi run`/`demo` and renders the three
//! measures with a settings panel. Settings changes re-run the estimators on
//! the loaded observations; `r` reseeds the synthetic basket.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{LoadedInput, RunOutput, load_input, run_pipeline};
use crate::cli::TuiArgs;
use crate::domain::{
    CoreSeries, DEFAULT_PRECISION, DistributionMethod, EstimatorConfig, InputSource, JoinPolicy, MeasureKind,
    SampleConfig, TrimPreset, TrimWindow,
};
use crate::error::AppError;
use crate::io::clock::SystemClock;

mod plotters_chart;

use plotters_chart::{CorePlottersChart, MeasureLine, measure_color};

const FIELDS: usize = 4;

/// Start the TUI.
pub fn run(args: TuiArgs) -> Result<(), AppError> {
    let estimator = crate::app::estimator_config_from_args(&args.estimator)?;
    let source = match args.input {
        Some(levels) => {
            let input = load_input(&InputSource::Csv {
                levels,
                weights: args.weights,
            })?;
            Source::Csv(input)
        }
        None => {
            let sample = crate::app::sample_config_from_args(&args.sample);
            let input = load_input(&InputSource::Synthetic(sample.clone()))?;
            Source::Synthetic { sample, input }
        }
    };
    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(source, estimator);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

enum Source {
    Csv(LoadedInput),
    Synthetic { sample: SampleConfig, input: LoadedInput },
}

impl Source {
    fn input(&self) -> &LoadedInput {
        match self {
            Source::Csv(input) | Source::Synthetic { input, .. } => input,
        }
    }

    fn label(&self) -> String {
        match self {
            Source::Csv(input) => format!("csv ({} rows)", input.levels.len()),
            Source::Synthetic { sample, .. } => format!(
                "synthetic (seed {}, {} components, {} months)",
                sample.seed, sample.components, sample.months
            ),
        }
    }
}

/// Trim window shown in the settings panel: a named preset, or the cuts
/// given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TrimChoice {
    Preset(TrimPreset),
    Custom(TrimWindow),
}

impl TrimChoice {
    fn for_window(window: TrimWindow) -> Self {
        [TrimPreset::Reference, TrimPreset::Boc]
            .into_iter()
            .find(|p| p.window() == window)
            .map_or(TrimChoice::Custom(window), TrimChoice::Preset)
    }

    fn window(self) -> TrimWindow {
        match self {
            TrimChoice::Preset(p) => p.window(),
            TrimChoice::Custom(w) => w,
        }
    }

    fn label(self) -> String {
        match self {
            TrimChoice::Preset(p) => format!("{p:?}"),
            TrimChoice::Custom(_) => "Custom".to_string(),
        }
    }
}

struct App {
    source: Source,
    config: EstimatorConfig,
    trim: TrimChoice,
    /// Cuts from the command line that match no preset; cycling returns to them.
    custom: Option<TrimWindow>,
    selected_field: usize,
    status: String,
    run: Option<RunOutput>,
}

impl App {
    fn new(source: Source, config: EstimatorConfig) -> Self {
        let trim = TrimChoice::for_window(config.trim);
        let custom = match trim {
            TrimChoice::Custom(w) => Some(w),
            TrimChoice::Preset(_) => None,
        };
        let mut app = Self {
            source,
            config,
            trim,
            custom,
            selected_field: 0,
            status: String::new(),
            run: None,
        };
        app.recompute();
        app
    }

    /// Re-run the pipeline; failures land in the status line.
    fn recompute(&mut self) {
        match run_pipeline(self.source.input(), &self.config) {
            Ok(run) => {
                self.status = match &run.common {
                    Ok(_) => format!("{} rows", run.core.len()),
                    Err(err) => format!("{} rows | common unavailable: {err}", run.core.len()),
                };
                self.run = Some(run);
            }
            Err(err) => {
                self.status = err.to_string();
                self.run = None;
            }
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected_field = self.selected_field.saturating_sub(1),
            KeyCode::Down => self.selected_field = (self.selected_field + 1).min(FIELDS - 1),
            KeyCode::Left | KeyCode::Right | KeyCode::Enter => self.adjust_field(self.selected_field),
            KeyCode::Char('t') => self.adjust_field(0),
            KeyCode::Char('m') => self.adjust_field(1),
            KeyCode::Char('j') => self.adjust_field(2),
            KeyCode::Char('r') => self.adjust_field(3),
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
        false
    }

    fn adjust_field(&mut self, field: usize) {
        match field {
            0 => {
                self.trim = next_trim(self.trim, self.custom);
                self.config.trim = self.trim.window();
            }
            1 => self.config.method = next_method(self.config.method),
            2 => self.config.join = next_join(self.config.join),
            3 => {
                let Source::Synthetic { sample, input } = &mut self.source else {
                    self.status = "Reseeding only applies to synthetic input.".to_string();
                    return;
                };
                sample.seed = sample.seed.wrapping_add(1);
                match load_input(&InputSource::Synthetic(sample.clone())) {
                    Ok(fresh) => *input = fresh,
                    Err(err) => {
                        self.status = err.to_string();
                        return;
                    }
                }
            }
            _ => return,
        }
        self.recompute();
    }

    fn export(&mut self) {
        let Some(run) = &self.run else {
            self.status = "Nothing to export.".to_string();
            return;
        };
        self.status = match crate::io::export::export_core_csv(&PathBuf::from("."), &run.core, &SystemClock) {
            Ok(path) => format!("Wrote {}", path.display()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(8), Constraint::Length(3)])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[2]);
        self.draw_settings(frame, bottom[0]);
        self.draw_latest(frame, bottom[1]);

        self.draw_footer(frame, chunks[3]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = vec![Line::from(vec![
            Span::styled("corecpi", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | {}", self.source.label())),
        ])];
        if let Some(run) = &self.run {
            let factor = match &run.common {
                Ok(c) => format!(
                    "factor: {} components, {:.1}% explained",
                    c.factor.components.len(),
                    c.factor.explained_variance * 100.0
                ),
                Err(_) => "factor: unavailable".to_string(),
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "dates={} components={} skipped={} | {factor}",
                    run.table.stats.dates,
                    run.table.stats.components,
                    run.trim_median.skipped.len()
                ),
                Style::default().fg(Color::Gray),
            )));
        }
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let legend: Vec<Span> = MeasureKind::ALL
            .iter()
            .map(|k| {
                let c = measure_color(*k);
                Span::styled(format!(" {} ", k.display_name()), Style::default().fg(Color::Rgb(c.0, c.1, c.2)))
            })
            .collect();
        let block = Block::default().title(Line::from(legend)).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(data) = self.run.as_ref().and_then(|r| chart_data(&r.core)) else {
            let msg = Paragraph::new("No rows to chart (try `j` for an outer join).")
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let widget = CorePlottersChart {
            lines: &data.lines,
            x_bounds: data.x_bounds,
            y_bounds: data.y_bounds,
            fmt_x: fmt_axis_month,
            fmt_y: fmt_axis_pp,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let method = match self.config.method {
            DistributionMethod::Exact => "exact".to_string(),
            DistributionMethod::Replicated { precision } => format!("replicated (M={precision})"),
        };
        let seed = match &self.source {
            Source::Synthetic { sample, .. } => sample.seed.to_string(),
            Source::Csv(_) => "-".to_string(),
        };
        let items = vec![
            ListItem::new(format!(
                "Trim: {} ({:.0}/{:.0})",
                self.trim.label(),
                self.config.trim.lower * 100.0,
                self.config.trim.upper * 100.0
            )),
            ListItem::new(format!("Method: {method}")),
            ListItem::new(format!("Join: {:?}", self.config.join)),
            ListItem::new(format!("Seed: {seed}")),
        ];

        let list = List::new(items)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_latest(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = area.height.saturating_sub(3) as usize;
        let text = self
            .run
            .as_ref()
            .map(|r| crate::report::format_core_table(&r.core, rows))
            .unwrap_or_default();
        let p = Paragraph::new(text).block(Block::default().title("Latest").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ change  t trim  m method  j join  r reseed  e export  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn next_trim(cur: TrimChoice, custom: Option<TrimWindow>) -> TrimChoice {
    match cur {
        TrimChoice::Preset(TrimPreset::Reference) => TrimChoice::Preset(TrimPreset::Boc),
        TrimChoice::Preset(TrimPreset::Boc) => custom.map_or(TrimChoice::Preset(TrimPreset::Reference), TrimChoice::Custom),
        TrimChoice::Custom(_) => TrimChoice::Preset(TrimPreset::Reference),
    }
}

fn next_method(cur: DistributionMethod) -> DistributionMethod {
    match cur {
        DistributionMethod::Exact => DistributionMethod::Replicated {
            precision: DEFAULT_PRECISION,
        },
        DistributionMethod::Replicated { .. } => DistributionMethod::Exact,
    }
}

fn next_join(cur: JoinPolicy) -> JoinPolicy {
    match cur {
        JoinPolicy::Inner => JoinPolicy::Outer,
        JoinPolicy::Outer => JoinPolicy::Inner,
    }
}

struct ChartData {
    lines: Vec<MeasureLine>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn year_fraction(date: NaiveDate) -> f64 {
    f64::from(date.year()) + f64::from(date.month0()) / 12.0
}

/// Build chart lines (split at missing values) and padded bounds.
fn chart_data(series: &CoreSeries) -> Option<ChartData> {
    let first = series.rows.first()?;
    let last = series.rows.last()?;

    let mut lines = Vec::with_capacity(MeasureKind::ALL.len());
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for kind in MeasureKind::ALL {
        let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
        let mut current = Vec::new();
        for row in &series.rows {
            match row.get(kind) {
                Some(v) => {
                    y_min = y_min.min(v);
                    y_max = y_max.max(v);
                    current.push((year_fraction(row.date), v));
                }
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        lines.push(MeasureLine { kind, segments });
    }

    if !(y_min.is_finite() && y_max.is_finite()) {
        return None;
    }
    if y_max <= y_min {
        y_min -= 0.5;
        y_max += 0.5;
    }
    let pad = (y_max - y_min) * 0.05;

    let x0 = year_fraction(first.date);
    let x1 = year_fraction(last.date).max(x0 + 1.0 / 12.0);

    Some(ChartData {
        lines,
        x_bounds: [x0, x1],
        y_bounds: [y_min - pad, y_max + pad],
    })
}

fn fmt_axis_month(v: f64) -> String {
    let months = (v * 12.0).round() as i64;
    format!("{}-{:02}", months.div_euclid(12), months.rem_euclid(12) + 1)
}

fn fmt_axis_pp(v: f64) -> String {
    format!("{v:.1}")
}
