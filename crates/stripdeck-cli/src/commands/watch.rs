use std::sync::Arc;
use std::time::Instant;

use stripdeck_core::{
    EngineConfig, Notification, NotificationSink, SessionState, Snapshot, TokioClock, View, spawn,
};

use super::format_ms;

/// Prints notifications to stderr as they arrive.
struct PrintSink {
    started: Instant,
}

impl NotificationSink for PrintSink {
    fn notify(&self, n: Notification) {
        eprintln!("[{:>8.1}s] ⚠ {n}", self.started.elapsed().as_secs_f64());
    }
}

pub fn run(config: EngineConfig) {
    let gateway = super::make_gateway(&config);
    let rt = super::runtime();
    let started = Instant::now();

    println!(
        "Watching {}{} (Ctrl-C to stop)",
        config.base_url, config.base_path
    );

    rt.block_on(async move {
        let (handle, task) = spawn(
            gateway,
            PrintSink { started },
            Arc::new(TokioClock::new()),
            config,
        );
        let mut views = handle.subscribe();
        handle.open(true);

        let mut last: Option<View> = None;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    for line in describe_change(last.as_ref(), &view) {
                        println!("[{:>8.1}s] {line}", started.elapsed().as_secs_f64());
                    }
                    last = Some(view);
                }
            }
        }

        handle.shutdown();
        let _ = task.await;
    });
}

fn effect_line(snapshot: &Snapshot) -> String {
    let name = snapshot
        .current_effect()
        .map(|e| e.label(snapshot.current_effect_index))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "effect #{} {name}  next change in {}  {}/{} enabled",
        snapshot.current_effect_index,
        format_ms(snapshot.milliseconds_remaining),
        snapshot.enabled_effects(),
        snapshot.effects.len(),
    )
}

/// Lines worth printing for the step from `prev` to `next`.
fn describe_change(prev: Option<&View>, next: &View) -> Vec<String> {
    let mut lines = Vec::new();
    let prev_state = prev.map_or(SessionState::Closed, |v| v.state);
    if next.state != prev_state && next.state != SessionState::Loaded {
        lines.push(format!("session {}", next.state));
    }

    let prev_snapshot = prev.and_then(|v| v.snapshot.as_ref());
    if let Some(snapshot) = &next.snapshot {
        let fresh = prev_snapshot.is_none_or(|p| !Arc::ptr_eq(p, snapshot));
        if fresh {
            lines.push(effect_line(snapshot));
        }
    }

    let was_running = prev.and_then(|v| v.countdown).is_some();
    if was_running && next.countdown.is_none() {
        lines.push("countdown stopped".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripdeck_core::Effect;

    fn snapshot(current: usize) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            effects: vec![
                Effect {
                    name: Some("Rainbow".into()),
                    enabled: true,
                    stats: Default::default(),
                },
                Effect {
                    name: Some("Fire".into()),
                    enabled: false,
                    stats: Default::default(),
                },
            ],
            current_effect_index: current,
            effect_interval: 30_000,
            milliseconds_remaining: 12_000,
            enabled_count: None,
        })
    }

    #[test]
    fn new_snapshot_prints_effect_line() {
        let view = View {
            state: SessionState::Loaded,
            snapshot: Some(snapshot(1)),
            ..View::default()
        };
        let lines = describe_change(None, &view);
        assert_eq!(
            lines,
            vec!["effect #1 Fire  next change in 12.0s  1/2 enabled"]
        );
    }

    #[test]
    fn same_snapshot_prints_nothing() {
        let view = View {
            state: SessionState::Loaded,
            snapshot: Some(snapshot(0)),
            countdown: Some(500),
            ..View::default()
        };
        let mut next = view.clone();
        next.countdown = Some(450);
        assert!(describe_change(Some(&view), &next).is_empty());
    }

    #[test]
    fn refreshing_state_is_reported() {
        let prev = View {
            state: SessionState::Loaded,
            ..View::default()
        };
        let next = View {
            state: SessionState::Refreshing,
            ..View::default()
        };
        assert_eq!(describe_change(Some(&prev), &next), vec!["session refreshing"]);
    }
}
