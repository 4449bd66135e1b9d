//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────┐
//! │  🎛 stripdeck  http://10.0.0.4   loaded  12.3s   │
//! ├──────────────────────┬───────────────────────────┤
//! │  Effects             │  CPU (stacked %)          │
//! │  ▸ 0 Rainbow  ●  on  │  ⣿⣿⣿⣶⣶⣶⣤⣤⣤⣀⣀⣀              │
//! │    1 Fire        on  │                           │
//! │    2 Comet       off ├───────────────────────────┤
//! │    ...               │  IDLE0   180   45.00%     │
//! │                      │  CORE0   120   30.00%     │
//! ├──────────────────────┴───────────────────────────┤
//! │  [Error] Designer / navigateTo: HTTP 500         │
//! ├──────────────────────────────────────────────────┤
//! │  ↑↓ move  enter: show  space: on/off  q: quit    │
//! └──────────────────────────────────────────────────┘

use super::app::{App, Series, stacked_series};
use crate::commands::format_ms;
use ratatui::{prelude::*, widgets::*};
use stripdeck_core::{ColorClass, NotificationKind, SessionState, tooltip};

const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::Red,
    Color::LightCyan,
    Color::LightGreen,
];

const MEMORY_PALETTE: [Color; 4] = [
    Color::LightRed,
    Color::LightMagenta,
    Color::LightYellow,
    Color::LightBlue,
];

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // main
            Constraint::Length(3), // notifications
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_main(f, rows[1], app);
    draw_notifications(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn class_color(class: ColorClass) -> Color {
    match class {
        ColorClass::Idle => Color::DarkGray,
        ColorClass::Step {
            memory: true,
            step,
        } => MEMORY_PALETTE[step % MEMORY_PALETTE.len()],
        ColorClass::Step {
            memory: false,
            step,
        } => PALETTE[step % PALETTE.len()],
    }
}

fn state_color(state: SessionState) -> Color {
    match state {
        SessionState::Closed => Color::DarkGray,
        SessionState::Opening => Color::Yellow,
        SessionState::Loaded => Color::Green,
        SessionState::Refreshing => Color::Cyan,
    }
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let countdown = match view.countdown {
        Some(ms) => format!("next change in {}", format_ms(ms)),
        None => "no countdown".to_string(),
    };
    let busy = if view.busy { " ⟳" } else { "" };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" 🎛 stripdeck ", Style::default().bold().fg(Color::Cyan)),
            Span::raw(format!(" {} ", app.base_url())),
            Span::styled(
                format!(" {} ", view.state),
                Style::default().bold().fg(state_color(view.state)),
            ),
            Span::styled(
                format!(" {countdown}{busy} "),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    f.render_widget(block, area);
}

fn draw_main(f: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    draw_effect_list(f, cols[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(cols[1]);

    draw_chart(f, right[0], app);
    draw_tooltip(f, right[1], app);
}

fn draw_effect_list(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let Some(snapshot) = view.snapshot.as_ref() else {
        let message = if app.is_open() {
            "Waiting for the device..."
        } else {
            "Closed. Press o to open."
        };
        let p = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Effects "));
        f.render_widget(p, area);
        return;
    };

    let items: Vec<Row> = snapshot
        .effects
        .iter()
        .enumerate()
        .map(|(i, effect)| {
            let is_cursor = i == app.cursor();
            let is_current = i == snapshot.current_effect_index;

            let pointer = if is_cursor { "▸" } else { " " };
            let marker = if is_current { "●" } else { " " };
            let enabled = if effect.enabled { "on" } else { "off" };

            let style = if is_cursor {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if is_current {
                Style::default().fg(Color::Yellow).bold()
            } else if effect.enabled {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            Row::new(vec![
                pointer.to_string(),
                i.to_string(),
                effect.label(i),
                marker.to_string(),
                enabled.to_string(),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        items,
        [
            Constraint::Length(2),  // pointer
            Constraint::Length(3),  // index
            Constraint::Length(22), // name
            Constraint::Length(2),  // current marker
            Constraint::Length(4),  // enabled
        ],
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Effects  {}/{} on  every {} ",
        snapshot.enabled_effects(),
        snapshot.effects.len(),
        format_ms(snapshot.effect_interval)
    )));

    f.render_widget(table, area);
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let Some(chart) = view.charts.get(app.chart_index()) else {
        let p = Paragraph::new("No charts configured")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Chart "));
        f.render_widget(p, area);
        return;
    };

    let window = chart.window();
    let title = format!(
        " {} ({} samples, c: next chart) ",
        chart.spec.name,
        window.len()
    );
    let series: Vec<Series> =
        stacked_series(window, chart.spec.category, chart.spec.idle_field.as_deref());

    if series.is_empty() {
        let p = Paragraph::new("No samples yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(p, area);
        return;
    }

    // Highest band first so lower bands paint over it.
    let datasets: Vec<Dataset> = series
        .iter()
        .rev()
        .map(|s| {
            Dataset::default()
                .name(s.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(class_color(s.color)))
                .data(&s.points)
        })
        .collect();

    let x_max = ((window.len().max(1) - 1) as f64).max(1.0);
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(Axis::default().bounds([0.0, x_max]).labels(vec![
            Line::from("0"),
            Line::from(format!("{}", window.len())),
        ]))
        .y_axis(
            Axis::default()
                .bounds([0.0, 100.0])
                .labels(vec![Line::from("0%"), Line::from("100%")]),
        );

    f.render_widget(chart, area);
}

fn draw_tooltip(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let chart = view.charts.get(app.chart_index());
    let latest = chart.and_then(|c| c.window().latest().map(|s| (c, s)));

    let block = Block::default().borders(Borders::ALL).title(" Latest ");
    let Some((chart, sample)) = latest else {
        f.render_widget(block, area);
        return;
    };

    let rows: Vec<Row> = tooltip(sample, chart.spec.idle_field.as_deref())
        .into_iter()
        .map(|row| {
            let share = row
                .share
                .map(|s| format!("{s:.2}%"))
                .unwrap_or_default();
            Row::new(vec![row.name, row.value, share])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18), // field
            Constraint::Length(10), // value
            Constraint::Length(8),  // share
        ],
    )
    .block(block);
    f.render_widget(table, area);
}

fn draw_notifications(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Notifications ({}) ", app.notification_count()));
    let (text, color) = match app.last_notification() {
        Some(n) => {
            let color = match n.kind {
                NotificationKind::Error => Color::Red,
                NotificationKind::Warning => Color::Yellow,
                NotificationKind::Info => Color::White,
            };
            (n.to_string(), color)
        }
        None => ("none".to_string(), Color::DarkGray),
    };
    let p = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(block);
    f.render_widget(p, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " ↑↓ move  enter: show  space: on/off  ←→ prev/next  [ ]: interval  r: reload  o: open/close  c: chart  q: quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
