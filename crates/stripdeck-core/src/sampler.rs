//! Bounded time-series windows for stacked charts.
//!
//! Design: one [`TimeSeriesSampler`] per chart owns its [`Window`]; it is the
//! only writer. Everything else in this module is a pure projection over a
//! single [`Sample`] and is recomputed on every render pass:
//!
//! - [`stack_order`]: the order fields are stacked in (idle field on top,
//!   everything else ascending by value, undefined values left out),
//! - [`color_class`] / [`stack_layers`]: a reproducible color per field,
//! - [`tooltip`]: formatted values and percentage shares.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, Millis};
use crate::model::{StatFields, StatValue};

// ---------------------------------------------------------------------------
// Sample / Window
// ---------------------------------------------------------------------------

/// One charted data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: Millis,
    pub fields: StatFields,
}

impl Sample {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(StatValue::as_f64)
    }
}

/// Chronologically ordered, bounded run of samples. Oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    samples: VecDeque<Sample>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Names seen anywhere in the window, in first-seen order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for sample in &self.samples {
            for name in sample.fields.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

// ---------------------------------------------------------------------------
// TimeSeriesSampler
// ---------------------------------------------------------------------------

/// Turns a stream of stat readings into a bounded [`Window`].
#[derive(Clone)]
pub struct TimeSeriesSampler {
    window: Window,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TimeSeriesSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSeriesSampler")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl TimeSeriesSampler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Window::default(),
            clock,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Append a sample built from `fields` minus `ignored`, stamped with the
    /// clock, then evict from the front until at most `max_samples` remain.
    ///
    /// Timestamps never go backwards: a clock that steps back is clamped to
    /// the newest timestamp already in the window.
    pub fn ingest(&mut self, fields: &StatFields, ignored: &[String], max_samples: usize) {
        let now = self.clock.now();
        let timestamp = self
            .window
            .latest()
            .map_or(now, |last| now.max(last.timestamp));
        self.window.samples.push_back(Sample {
            timestamp,
            fields: fields.without(ignored),
        });
        while self.window.samples.len() > max_samples {
            self.window.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.window.samples.clear();
    }
}

// ---------------------------------------------------------------------------
// Stack order and colors
// ---------------------------------------------------------------------------

/// Palette family a chart draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cpu,
    Memory,
    #[default]
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Memory => write!(f, "Memory"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Visual color slot of one stacked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorClass {
    /// Dedicated color of the idle field.
    Idle,
    /// `step` is the 0-based rank among non-idle fields.
    Step { memory: bool, step: usize },
}

impl fmt::Display for ColorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idleColor"),
            Self::Step { memory: true, step } => write!(f, "bcolor{}", step + 1),
            Self::Step { memory: false, step } => write!(f, "color{}", step + 1),
        }
    }
}

pub fn color_class(category: Category, step: usize, is_idle: bool) -> ColorClass {
    if is_idle {
        return ColorClass::Idle;
    }
    ColorClass::Step {
        memory: category == Category::Memory,
        step,
    }
}

/// Charted fields of `sample` in stacking order (bottom first).
///
/// Stable: equal values keep their field order. Fields without a numeric
/// value are left out rather than drawn as zero.
pub fn stack_order<'a>(sample: &'a Sample, idle_field: Option<&str>) -> Vec<(&'a str, f64)> {
    let mut entries: Vec<(&str, f64)> = sample
        .fields
        .iter()
        .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
        .collect();
    entries.sort_by(|a, b| {
        let a_idle = Some(a.0) == idle_field;
        let b_idle = Some(b.0) == idle_field;
        match (a_idle, b_idle) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => a.1.total_cmp(&b.1),
        }
    });
    entries
}

/// One stacked field with its resolved color.
#[derive(Debug, Clone, PartialEq)]
pub struct StackLayer<'a> {
    pub name: &'a str,
    pub value: f64,
    pub color: ColorClass,
}

pub fn stack_layers<'a>(
    sample: &'a Sample,
    category: Category,
    idle_field: Option<&str>,
) -> Vec<StackLayer<'a>> {
    let mut step = 0;
    stack_order(sample, idle_field)
        .into_iter()
        .map(|(name, value)| {
            let is_idle = Some(name) == idle_field;
            let color = color_class(category, step, is_idle);
            if !is_idle {
                step += 1;
            }
            StackLayer { name, value, color }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tooltip projection
// ---------------------------------------------------------------------------

/// One line of the per-sample tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipRow {
    pub name: String,
    pub value: String,
    /// Percentage of the sample total, rounded to two decimals.
    pub share: Option<f64>,
}

/// Whole numbers as-is, other numbers to two decimals, text untouched.
pub fn format_value(value: &StatValue) -> String {
    match value {
        StatValue::Number(v) if v.fract() == 0.0 && v.is_finite() => format!("{v}"),
        StatValue::Number(v) => format!("{v:.2}"),
        StatValue::Text(s) => s.clone(),
        StatValue::Flag(b) => b.to_string(),
        StatValue::Missing => String::new(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Tooltip rows for `sample`, top of the stack first.
///
/// Shares are `value / sum(values) * 100`. When the numeric fields sum to
/// zero there is no meaningful share and every share is `None`.
pub fn tooltip(sample: &Sample, idle_field: Option<&str>) -> Vec<TooltipRow> {
    let order = stack_order(sample, idle_field);
    let total: f64 = order.iter().map(|(_, v)| v).sum();

    let mut rows: Vec<TooltipRow> = order
        .iter()
        .rev()
        .map(|(name, value)| TooltipRow {
            name: (*name).to_string(),
            value: format_value(&StatValue::Number(*value)),
            share: (total != 0.0).then(|| round2(value / total * 100.0)),
        })
        .collect();

    // Non-numeric fields are listed below the charted ones without a share.
    rows.extend(
        sample
            .fields
            .iter()
            .filter(|(_, v)| v.as_f64().is_none() && **v != StatValue::Missing)
            .map(|(name, value)| TooltipRow {
                name: name.to_string(),
                value: format_value(value),
                share: None,
            }),
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn fields(pairs: &[(&str, f64)]) -> StatFields {
        pairs.iter().map(|(n, v)| (n.to_string(), StatValue::Number(*v))).collect()
    }

    fn sample(pairs: &[(&str, f64)]) -> Sample {
        Sample {
            timestamp: 0,
            fields: fields(pairs),
        }
    }

    // -----------------------------------------------------------------------
    // Window bounds
    // -----------------------------------------------------------------------

    #[test]
    fn keeps_last_max_samples() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sampler = TimeSeriesSampler::new(clock.clone());
        for (i, ts) in [0u64, 10, 20, 30, 40].iter().enumerate() {
            clock.set(*ts);
            sampler.ingest(&fields(&[("a", (i + 1) as f64)]), &[], 3);
        }
        let got: Vec<(u64, Option<f64>)> = sampler
            .window()
            .iter()
            .map(|s| (s.timestamp, s.value("a")))
            .collect();
        assert_eq!(got, vec![(20, Some(3.0)), (30, Some(4.0)), (40, Some(5.0))]);
    }

    #[test]
    fn length_is_min_of_count_and_bound() {
        let clock = Arc::new(ManualClock::new(0));
        for max in [1usize, 4, 10] {
            let mut sampler = TimeSeriesSampler::new(clock.clone());
            for n in 1..=8 {
                clock.advance(5);
                sampler.ingest(&fields(&[("a", 1.0)]), &[], max);
                assert_eq!(sampler.window().len(), n.min(max));
            }
        }
    }

    #[test]
    fn timestamps_never_decrease() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut sampler = TimeSeriesSampler::new(clock.clone());
        sampler.ingest(&fields(&[("a", 1.0)]), &[], 10);
        clock.set(400);
        sampler.ingest(&fields(&[("a", 2.0)]), &[], 10);
        clock.set(1_500);
        sampler.ingest(&fields(&[("a", 3.0)]), &[], 10);
        let ts: Vec<u64> = sampler.window().iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![1_000, 1_000, 1_500]);
    }

    #[test]
    fn ignored_fields_are_dropped() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sampler = TimeSeriesSampler::new(clock);
        sampler.ingest(
            &fields(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]),
            &["b".to_string()],
            5,
        );
        let latest = sampler.window().latest().unwrap();
        assert_eq!(latest.fields.names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(sampler.window().field_names(), vec!["a", "c"]);
    }

    #[test]
    fn earlier_samples_are_not_rewritten() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sampler = TimeSeriesSampler::new(clock.clone());
        let mut live = fields(&[("a", 1.0)]);
        sampler.ingest(&live, &[], 5);
        live.insert("a", 9.0);
        clock.advance(10);
        sampler.ingest(&live, &[], 5);
        assert_eq!(sampler.window().get(0).unwrap().value("a"), Some(1.0));
        assert_eq!(sampler.window().get(1).unwrap().value("a"), Some(9.0));
    }

    // -----------------------------------------------------------------------
    // Stack order
    // -----------------------------------------------------------------------

    #[test]
    fn idle_field_sorts_last() {
        let s = sample(&[("idle", 1.0), ("b", 50.0), ("a", 20.0)]);
        let order: Vec<&str> = stack_order(&s, Some("idle")).iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["a", "b", "idle"]);
    }

    #[test]
    fn non_idle_fields_ascend_stably() {
        let s = sample(&[("x", 5.0), ("y", 1.0), ("z", 5.0), ("w", 3.0)]);
        let order: Vec<&str> = stack_order(&s, None).iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn undefined_values_are_excluded() {
        let mut f = fields(&[("a", 2.0)]);
        f.insert("gone", StatValue::Missing);
        f.insert("model", "ESP32");
        let s = Sample {
            timestamp: 0,
            fields: f,
        };
        let order: Vec<&str> = stack_order(&s, None).iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["a"]);
    }

    #[test]
    fn absent_idle_field_changes_nothing() {
        let s = sample(&[("b", 2.0), ("a", 1.0)]);
        assert_eq!(stack_order(&s, Some("idle")), stack_order(&s, None));
    }

    // -----------------------------------------------------------------------
    // Colors
    // -----------------------------------------------------------------------

    #[test]
    fn color_class_is_pure() {
        assert_eq!(color_class(Category::Cpu, 2, false), color_class(Category::Cpu, 2, false));
        assert_eq!(color_class(Category::Cpu, 0, false).to_string(), "color1");
        assert_eq!(color_class(Category::Memory, 1, false).to_string(), "bcolor2");
        assert_eq!(color_class(Category::Memory, 7, true), ColorClass::Idle);
        assert_eq!(ColorClass::Idle.to_string(), "idleColor");
    }

    #[test]
    fn idle_never_consumes_a_step() {
        // idle is the smallest value but still goes last and keeps its own color
        let s = sample(&[("idle", 0.5), ("a", 10.0), ("b", 20.0)]);
        let layers = stack_layers(&s, Category::Cpu, Some("idle"));
        let got: Vec<(&str, ColorClass)> = layers.iter().map(|l| (l.name, l.color)).collect();
        assert_eq!(
            got,
            vec![
                ("a", ColorClass::Step { memory: false, step: 0 }),
                ("b", ColorClass::Step { memory: false, step: 1 }),
                ("idle", ColorClass::Idle),
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Tooltip
    // -----------------------------------------------------------------------

    #[test]
    fn format_value_rules() {
        assert_eq!(format_value(&StatValue::Number(42.0)), "42");
        assert_eq!(format_value(&StatValue::Number(3.14159)), "3.14");
        assert_eq!(format_value(&StatValue::Number(-0.5)), "-0.50");
        assert_eq!(format_value(&StatValue::Text("ESP32".into())), "ESP32");
    }

    #[test]
    fn shares_sum_to_one_hundred() {
        let cases: [&[(&str, f64)]; 4] = [
            &[("a", 1.0), ("b", 1.0), ("c", 1.0)],
            &[("a", 0.333), ("b", 12.5), ("c", 7.0), ("d", 99.9)],
            &[("only", 5.0)],
            &[("a", 1e-3), ("b", 2e6)],
        ];
        for pairs in cases {
            let rows = tooltip(&sample(pairs), None);
            let total: f64 = rows.iter().filter_map(|r| r.share).sum();
            assert!((total - 100.0).abs() <= 0.1, "{pairs:?} summed to {total}");
        }
    }

    #[test]
    fn tooltip_lists_top_of_stack_first() {
        let s = sample(&[("idle", 50.0), ("a", 10.0), ("b", 40.0)]);
        let rows = tooltip(&s, Some("idle"));
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["idle", "b", "a"]);
        assert_eq!(rows[0].share, Some(50.0));
        assert_eq!(rows[2].value, "10");
    }

    #[test]
    fn tooltip_keeps_text_fields_without_share() {
        let mut f = fields(&[("a", 2.5)]);
        f.insert("model", "ESP32");
        let rows = tooltip(
            &Sample {
                timestamp: 0,
                fields: f,
            },
            None,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, "2.50");
        assert_eq!(rows[0].share, Some(100.0));
        assert_eq!(rows[1].value, "ESP32");
        assert_eq!(rows[1].share, None);
    }

    #[test]
    fn zero_total_has_no_shares() {
        let rows = tooltip(&sample(&[("a", 0.0), ("b", 0.0)]), None);
        assert!(rows.iter().all(|r| r.share.is_none()));
    }

    #[test]
    fn tooltip_does_not_mutate_sample() {
        let s = sample(&[("a", 1.234), ("b", 2.0)]);
        let before = s.clone();
        let _ = tooltip(&s, None);
        assert_eq!(s, before);
    }
}
