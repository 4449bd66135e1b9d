//! Session lifecycle as a pure state machine.
//!
//! [`Session`] performs no I/O. Each transition returns the [`Action`]s the
//! driver must carry out (start or cancel a fetch, arm or disarm a timer),
//! so every ordering rule can be tested without a runtime.
//!
//! ```text
//! Closed ──open──▶ Opening ──snapshot──▶ Loaded ◀──snapshot── Refreshing
//!    ▲                                     │                      ▲
//!    └────────────── close (any) ──────────┴──── refresh/reload ──┘
//! ```
//!
//! Every fetch is tagged with a [`Generation`]. Only the live generation may
//! settle the session; results carrying any other generation are stale and
//! are dropped.

use std::fmt;

/// Identifier of one snapshot fetch. Strictly increasing per session owner.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Closed,
    /// Open, no snapshot applied yet.
    Opening,
    Loaded,
    /// Open with data on screen and a fetch in flight.
    Refreshing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Loaded => "loaded",
            Self::Refreshing => "refreshing",
        };
        f.write_str(s)
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartFetch(Generation),
    CancelFetch(Generation),
    /// Arm (or re-arm) the safety timer for this generation.
    ArmSafetyTimer(Generation),
    DisarmSafetyTimer,
    ArmDebounce,
    DisarmDebounce,
}

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    generation: Generation,
    live: Option<Generation>,
    debounce_pending: bool,
    has_data: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    /// Generation of the fetch currently in flight.
    pub fn live(&self) -> Option<Generation> {
        self.live
    }

    pub fn debounce_pending(&self) -> bool {
        self.debounce_pending
    }

    /// Activate or deactivate the session.
    ///
    /// Activating a closed session fetches immediately; activating an open one
    /// changes nothing. Deactivating cancels the live fetch and every timer.
    pub fn open(&mut self, active: bool) -> Vec<Action> {
        match (active, self.is_open()) {
            (true, false) => {
                self.has_data = false;
                self.begin_fetch()
            }
            (false, true) => {
                let mut actions = Vec::new();
                if let Some(g) = self.live.take() {
                    actions.push(Action::CancelFetch(g));
                }
                actions.push(Action::DisarmSafetyTimer);
                if std::mem::take(&mut self.debounce_pending) {
                    actions.push(Action::DisarmDebounce);
                }
                self.state = SessionState::Closed;
                self.has_data = false;
                actions
            }
            _ => Vec::new(),
        }
    }

    /// Record a refresh intent.
    ///
    /// An intent that arrives while a fetch is live is satisfied by that
    /// fetch. Otherwise the debounce window is armed once; further intents
    /// inside the window collapse into the same fetch.
    pub fn request_refresh(&mut self) -> Vec<Action> {
        if !self.is_open() || self.live.is_some() || self.debounce_pending {
            return Vec::new();
        }
        self.debounce_pending = true;
        vec![Action::ArmDebounce]
    }

    pub fn debounce_elapsed(&mut self) -> Vec<Action> {
        if !std::mem::take(&mut self.debounce_pending) {
            return Vec::new();
        }
        if !self.is_open() || self.live.is_some() {
            return Vec::new();
        }
        self.begin_fetch()
    }

    /// Fetch now, superseding any live fetch.
    pub fn reload(&mut self) -> Vec<Action> {
        if !self.is_open() {
            return Vec::new();
        }
        self.begin_fetch()
    }

    /// The safety timer for `generation` fired before its fetch settled.
    pub fn safety_elapsed(&mut self, generation: Generation) -> Vec<Action> {
        if self.live != Some(generation) {
            return Vec::new();
        }
        self.begin_fetch()
    }

    /// Returns `None` when `generation` is stale and the result must be
    /// discarded, otherwise the actions to run before applying it.
    pub fn snapshot_received(&mut self, generation: Generation) -> Option<Vec<Action>> {
        self.settle(generation)?;
        self.state = SessionState::Loaded;
        self.has_data = true;
        Some(vec![Action::DisarmSafetyTimer])
    }

    /// Same contract as [`Session::snapshot_received`]. Data already on
    /// screen stays there.
    pub fn fetch_failed(&mut self, generation: Generation) -> Option<Vec<Action>> {
        self.settle(generation)?;
        self.state = if self.has_data {
            SessionState::Loaded
        } else {
            SessionState::Opening
        };
        Some(vec![Action::DisarmSafetyTimer])
    }

    fn settle(&mut self, generation: Generation) -> Option<()> {
        if self.live != Some(generation) {
            return None;
        }
        self.live = None;
        Some(())
    }

    fn begin_fetch(&mut self) -> Vec<Action> {
        let mut actions = Vec::with_capacity(4);
        if let Some(old) = self.live.take() {
            actions.push(Action::CancelFetch(old));
        }
        if std::mem::take(&mut self.debounce_pending) {
            actions.push(Action::DisarmDebounce);
        }
        self.generation += 1;
        let g = self.generation;
        self.live = Some(g);
        self.state = if self.has_data {
            SessionState::Refreshing
        } else {
            SessionState::Opening
        };
        actions.push(Action::StartFetch(g));
        actions.push(Action::ArmSafetyTimer(g));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> (Session, Generation) {
        let mut s = Session::new();
        s.open(true);
        let g = s.live().unwrap();
        s.snapshot_received(g).unwrap();
        (s, g)
    }

    // -----------------------------------------------------------------------
    // open / close
    // -----------------------------------------------------------------------

    #[test]
    fn open_fetches_immediately() {
        let mut s = Session::new();
        let actions = s.open(true);
        assert_eq!(
            actions,
            vec![Action::StartFetch(1), Action::ArmSafetyTimer(1)]
        );
        assert_eq!(s.state(), SessionState::Opening);
        assert_eq!(s.live(), Some(1));
    }

    #[test]
    fn open_twice_is_a_no_op() {
        let mut s = Session::new();
        s.open(true);
        assert!(s.open(true).is_empty());
        assert_eq!(s.live(), Some(1));
    }

    #[test]
    fn close_cancels_live_fetch_and_timers() {
        let mut s = Session::new();
        s.open(true);
        let actions = s.open(false);
        assert_eq!(
            actions,
            vec![Action::CancelFetch(1), Action::DisarmSafetyTimer]
        );
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.live(), None);
    }

    #[test]
    fn close_disarms_pending_debounce() {
        let (mut s, _) = loaded();
        s.request_refresh();
        let actions = s.open(false);
        assert!(actions.contains(&Action::DisarmDebounce));
        assert!(!s.debounce_pending());
    }

    #[test]
    fn reopen_uses_a_new_generation() {
        let mut s = Session::new();
        s.open(true);
        s.open(false);
        s.open(true);
        assert_eq!(s.live(), Some(2));
        assert_eq!(s.state(), SessionState::Opening);
        assert!(s.snapshot_received(1).is_none(), "old generation must be stale");
    }

    #[test]
    fn result_after_close_is_discarded() {
        let mut s = Session::new();
        s.open(true);
        s.open(false);
        assert!(s.snapshot_received(1).is_none());
        assert!(s.fetch_failed(1).is_none());
        assert_eq!(s.state(), SessionState::Closed);
    }

    // -----------------------------------------------------------------------
    // refresh intents
    // -----------------------------------------------------------------------

    #[test]
    fn intents_coalesce_into_one_fetch() {
        let (mut s, _) = loaded();
        assert_eq!(s.request_refresh(), vec![Action::ArmDebounce]);
        assert!(s.request_refresh().is_empty());
        assert!(s.request_refresh().is_empty());
        assert_eq!(
            s.debounce_elapsed(),
            vec![Action::StartFetch(2), Action::ArmSafetyTimer(2)]
        );
        assert_eq!(s.state(), SessionState::Refreshing);
        assert!(s.debounce_elapsed().is_empty());
    }

    #[test]
    fn intent_during_fetch_is_absorbed() {
        let mut s = Session::new();
        s.open(true);
        assert!(s.request_refresh().is_empty());
        assert!(!s.debounce_pending());
    }

    #[test]
    fn intent_while_closed_is_ignored() {
        let mut s = Session::new();
        assert!(s.request_refresh().is_empty());
        assert!(s.reload().is_empty());
    }

    #[test]
    fn reload_supersedes_live_fetch() {
        let mut s = Session::new();
        s.open(true);
        let actions = s.reload();
        assert_eq!(
            actions,
            vec![
                Action::CancelFetch(1),
                Action::StartFetch(2),
                Action::ArmSafetyTimer(2)
            ]
        );
        assert!(s.snapshot_received(1).is_none());
        assert!(s.snapshot_received(2).is_some());
    }

    #[test]
    fn reload_consumes_pending_debounce() {
        let (mut s, _) = loaded();
        s.request_refresh();
        let actions = s.reload();
        assert!(actions.contains(&Action::DisarmDebounce));
        assert!(s.debounce_elapsed().is_empty());
    }

    // -----------------------------------------------------------------------
    // settlement and safety timer
    // -----------------------------------------------------------------------

    #[test]
    fn settlement_disarms_safety_timer() {
        let mut s = Session::new();
        s.open(true);
        assert_eq!(
            s.snapshot_received(1),
            Some(vec![Action::DisarmSafetyTimer])
        );
        assert_eq!(s.state(), SessionState::Loaded);
    }

    #[test]
    fn failure_before_first_snapshot_stays_opening() {
        let mut s = Session::new();
        s.open(true);
        assert!(s.fetch_failed(1).is_some());
        assert_eq!(s.state(), SessionState::Opening);
        assert_eq!(s.live(), None);
    }

    #[test]
    fn failed_refresh_keeps_loaded_data() {
        let (mut s, _) = loaded();
        s.reload();
        assert_eq!(s.state(), SessionState::Refreshing);
        s.fetch_failed(2).unwrap();
        assert_eq!(s.state(), SessionState::Loaded);
    }

    #[test]
    fn safety_timer_restarts_a_stuck_fetch() {
        let mut s = Session::new();
        s.open(true);
        let actions = s.safety_elapsed(1);
        assert_eq!(
            actions,
            vec![
                Action::CancelFetch(1),
                Action::StartFetch(2),
                Action::ArmSafetyTimer(2)
            ]
        );
    }

    #[test]
    fn stale_safety_timer_is_ignored() {
        let (mut s, g) = loaded();
        assert!(s.safety_elapsed(g).is_empty());
        assert_eq!(s.state(), SessionState::Loaded);
    }

    #[test]
    fn generations_strictly_increase() {
        let mut s = Session::new();
        let mut seen = Vec::new();
        s.open(true);
        seen.push(s.live().unwrap());
        for _ in 0..5 {
            s.reload();
            seen.push(s.live().unwrap());
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "got {seen:?}");
    }
}
