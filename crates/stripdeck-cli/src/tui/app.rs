//! TUI application state and event loop.
//!
//! Design: the coordinator runs on a small background runtime and publishes a
//! `View` after every change. The draw loop copies the latest view once per
//! frame and never waits on the network; keys become coordinator calls.
//! Mutation keys are ignored while a command is outstanding.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use stripdeck_core::{
    Category, ColorClass, CoordinatorHandle, EngineConfig, HttpGateway, Notification,
    NotificationLog, TokioClock, View, Window, spawn, stack_layers,
};

/// Shortest interval `[` will set.
const MIN_INTERVAL_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Stacked series
// ---------------------------------------------------------------------------

/// Upper edge of one field's band in a 100%-stacked chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    /// Color of the band in the newest sample it appears in.
    pub color: ColorClass,
    /// `(sample index, cumulative percent)`.
    pub points: Vec<(f64, f64)>,
}

/// Expand every sample of `window` to 100% and return one series per field,
/// in first-seen order. Samples whose charted values sum to zero are skipped.
pub fn stacked_series(window: &Window, category: Category, idle: Option<&str>) -> Vec<Series> {
    let mut series: Vec<Series> = window
        .field_names()
        .into_iter()
        .map(|name| Series {
            name: name.to_string(),
            color: ColorClass::Idle,
            points: Vec::new(),
        })
        .collect();

    for (x, sample) in window.iter().enumerate() {
        let layers = stack_layers(sample, category, idle);
        let total: f64 = layers.iter().map(|l| l.value).sum();
        if total <= 0.0 {
            continue;
        }
        let mut top = 0.0;
        for layer in layers {
            top += layer.value / total * 100.0;
            if let Some(s) = series.iter_mut().find(|s| s.name == layer.name) {
                s.points.push((x as f64, top));
                s.color = layer.color;
            }
        }
    }
    series.retain(|s| !s.points.is_empty());
    series
}

/// Next interval for `]` (grow) or `[` (shrink).
pub fn next_interval(current: u64, grow: bool) -> u64 {
    if grow {
        current.saturating_mul(2).max(MIN_INTERVAL_MS)
    } else {
        (current / 2).max(MIN_INTERVAL_MS)
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    handle: CoordinatorHandle,
    notifications: Arc<NotificationLog>,
    base_url: String,
    view: View,
    cursor: usize,
    chart: usize,
    open: bool,
    running: bool,
    // Declared last so it is dropped after the handle.
    _runtime: tokio::runtime::Runtime,
}

impl App {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let gateway = HttpGateway::new(&config.base_url, &config.base_path, config.request_timeout())
            .map_err(io::Error::other)?;
        let notifications = Arc::new(NotificationLog::new(16));
        let base_url = format!("{}{}", config.base_url, config.base_path);

        let handle = {
            let _guard = runtime.enter();
            let (handle, _task) = spawn(
                gateway,
                notifications.clone(),
                Arc::new(TokioClock::new()),
                config,
            );
            handle
        };
        handle.open(true);

        Ok(Self {
            view: handle.view(),
            handle,
            notifications,
            base_url,
            cursor: 0,
            chart: 0,
            open: true,
            running: true,
            _runtime: runtime,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Restore the terminal before a panic message is printed.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        self.handle.shutdown();
        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.view = self.handle.view();
            self.clamp_cursor();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    fn clamp_cursor(&mut self) {
        let count = self.effect_count();
        if count > 0 && self.cursor >= count {
            self.cursor = count - 1;
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.effect_count() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char('r') => self.handle.reload(),
            KeyCode::Char('o') => {
                self.open = !self.open;
                self.handle.open(self.open);
            }
            KeyCode::Char('c') | KeyCode::Tab => {
                let n = self.view.charts.len().max(1);
                self.chart = (self.chart + 1) % n;
            }
            KeyCode::Enter => {
                let index = self.cursor;
                self.mutate(|h| h.navigate_to(index));
            }
            KeyCode::Char(' ') => {
                let index = self.cursor;
                if let Some(enabled) = self.effect_enabled(index) {
                    self.mutate(|h| h.set_enabled(index, !enabled));
                }
            }
            KeyCode::Char('n') | KeyCode::Right => self.mutate(|h| h.step(true)),
            KeyCode::Char('p') | KeyCode::Left => self.mutate(|h| h.step(false)),
            KeyCode::Char(']') | KeyCode::Char('[') => {
                if let Some(current) = self.view.snapshot.as_ref().map(|s| s.effect_interval) {
                    let interval = next_interval(current, key == KeyCode::Char(']'));
                    self.mutate(|h| h.update_interval(interval));
                }
            }
            _ => {}
        }
    }

    /// Issue a mutation unless one is already outstanding.
    fn mutate(&self, f: impl FnOnce(&CoordinatorHandle)) {
        if self.handle.is_busy() {
            log::debug!("busy, ignoring key");
            return;
        }
        f(&self.handle);
    }

    fn effect_enabled(&self, index: usize) -> Option<bool> {
        self.view
            .snapshot
            .as_ref()
            .and_then(|s| s.effects.get(index))
            .map(|e| e.enabled)
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn effect_count(&self) -> usize {
        self.view.snapshot.as_ref().map_or(0, |s| s.effects.len())
    }

    pub fn chart_index(&self) -> usize {
        self.chart
    }

    pub fn last_notification(&self) -> Option<Notification> {
        self.notifications.recent().pop()
    }

    pub fn notification_count(&self) -> u64 {
        self.notifications.total()
    }
}
