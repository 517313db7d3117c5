//! Modifier-State Tracker (spec §4.1).
//!
//! The hook thread keeps a single event-driven bitmask (`MODIFIER_STATE` in
//! `hook.rs`, updated from `WM_KEYDOWN`/`WM_KEYUP`), the same pattern the
//! teacher uses. This module is the pure, OS-call-free half: turning that
//! bitmask into a [`ModifierSnapshot`] and the specific predicates the
//! gesture state machine and the shell-suppression injector need.

pub const MOD_ALT: u32 = 1;
pub const MOD_CTRL: u32 = 2;
pub const MOD_SHIFT: u32 = 4;
pub const MOD_WIN: u32 = 8;

/// The logical down/up state of the four modifier keys at one instant.
///
/// Derived, never stored long-term (spec §3) — re-sampled on every hook
/// event, since a key-up only updates the OS's async key state *after* the
/// hook callback that reported it has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierSnapshot {
    pub win: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl ModifierSnapshot {
    pub fn from_mask(mask: u32) -> Self {
        Self {
            win: mask & MOD_WIN != 0,
            shift: mask & MOD_SHIFT != 0,
            ctrl: mask & MOD_CTRL != 0,
            alt: mask & MOD_ALT != 0,
        }
    }

    pub fn to_mask(self) -> u32 {
        let mut m = 0;
        if self.win {
            m |= MOD_WIN;
        }
        if self.shift {
            m |= MOD_SHIFT;
        }
        if self.ctrl {
            m |= MOD_CTRL;
        }
        if self.alt {
            m |= MOD_ALT;
        }
        m
    }

    /// Win held, nothing else — the combination that would otherwise open
    /// the shell menu on release.
    pub fn win_solo(self) -> bool {
        self.win && !self.shift && !self.ctrl && !self.alt
    }

    /// Win+Shift held, no Ctrl/Alt — the "bring to front" chord.
    pub fn win_shift_only(self) -> bool {
        self.win && self.shift && !self.ctrl && !self.alt
    }
}

/// Tracks the Win-hold lifecycle needed to decide whether a bare Win
/// press-release should be left alone (shell menu opens normally) or has
/// already been poisoned by a consumed gesture.
#[derive(Debug, Default)]
pub struct ModifierTracker {
    /// True from the first Win-down until Win goes back up; used to detect
    /// "did anything else transition during this hold" for diagnostics.
    win_held_since: Option<ModifierSnapshot>,
}

impl ModifierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call on every modifier-affecting hook event with the snapshot taken
    /// immediately after applying the event. Returns `true` exactly once,
    /// on the transition where Win goes from held to released.
    pub fn note_transition(&mut self, snapshot: ModifierSnapshot) -> bool {
        let was_held = self.win_held_since.is_some();
        if snapshot.win {
            self.win_held_since.get_or_insert(snapshot);
            false
        } else {
            self.win_held_since = None;
            was_held
        }
    }

    /// "Desync check" (spec §4.1 failure modes): a higher-integrity window
    /// may have eaten the key without forwarding it to our hook, leaving our
    /// view of Win stale. Call this with a freshly polled snapshot (e.g. on
    /// session-unlock) to re-anchor.
    pub fn resync(&mut self, polled: ModifierSnapshot) {
        self.win_held_since = if polled.win { Some(polled) } else { None };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_solo_excludes_any_other_modifier() {
        assert!(ModifierSnapshot {
            win: true,
            ..Default::default()
        }
        .win_solo());
        assert!(!ModifierSnapshot {
            win: true,
            shift: true,
            ..Default::default()
        }
        .win_solo());
    }

    #[test]
    fn win_shift_only_requires_exactly_those_two() {
        let snap = ModifierSnapshot {
            win: true,
            shift: true,
            ..Default::default()
        };
        assert!(snap.win_shift_only());
        assert!(!ModifierSnapshot {
            win: true,
            shift: true,
            ctrl: true,
            ..Default::default()
        }
        .win_shift_only());
    }

    #[test]
    fn tracker_fires_once_on_win_release() {
        let mut t = ModifierTracker::new();
        let held = ModifierSnapshot {
            win: true,
            ..Default::default()
        };
        assert!(!t.note_transition(held));
        assert!(!t.note_transition(held));
        let released = ModifierSnapshot::default();
        assert!(t.note_transition(released));
        // Second release notification without an intervening press is a no-op.
        assert!(!t.note_transition(released));
    }

    #[test]
    fn mask_round_trip() {
        let snap = ModifierSnapshot {
            win: true,
            shift: false,
            ctrl: true,
            alt: false,
        };
        assert_eq!(ModifierSnapshot::from_mask(snap.to_mask()), snap);
    }
}
