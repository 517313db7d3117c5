//! Window-Command Executor (spec §4.5): the worker-thread consumer that
//! turns queued [`WindowCommand`]s into real `WindowOpsExec` calls, with the
//! rate limiting, anti-slide correction, and elevated-window denial handling
//! the hook thread itself must stay free of.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::transport::{WindowCommand, ZOrder};
use crate::window_manager::{WindowId, WindowOpsExec};

/// Floor between size-changing commands applied to the same window —
/// roughly a 60-100Hz ceiling, matched to what DWM can actually redraw
/// without visibly lagging the cursor (spec §4.5 "rate limiting").
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(10);

/// Fed back to the hook thread so the live [`crate::gesture::DragState`]
/// stops asking for sizes the window has already proven it will refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedMinimum {
    pub target: WindowId,
    pub min_w: i32,
    pub min_h: i32,
}

/// Per-call outcome the worker loop uses to drive the overlay and the
/// feedback channel back to the hook thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorOutcome {
    pub learned_minimum: Option<LearnedMinimum>,
    pub overlay_metrics: Option<OverlayMetrics>,
    pub denied: bool,
}

/// What the resize-metrics overlay needs to draw: current rect plus the
/// size the drag started from, so it can show a size delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayMetrics {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub start_w: i32,
    pub start_h: i32,
}

/// Per-call knobs the worker reads off the live config — kept out of
/// `Executor::new` since they can change mid-run via the settings UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    pub rate_limit_moves: bool,
    pub log_rate: bool,
}

pub struct Executor<O: WindowOpsExec> {
    ops: O,
    last_applied: HashMap<WindowId, Instant>,
    /// Size this target's resize drag started at — cleared when the target
    /// changes so a later unrelated drag doesn't inherit a stale baseline.
    drag_start_size: HashMap<WindowId, (i32, i32)>,
    learned_min: HashMap<WindowId, (i32, i32)>,
    denial_notified: HashSet<WindowId>,
}

impl<O: WindowOpsExec> Executor<O> {
    pub fn new(ops: O) -> Self {
        Self {
            ops,
            last_applied: HashMap::new(),
            drag_start_size: HashMap::new(),
            learned_min: HashMap::new(),
            denial_notified: HashSet::new(),
        }
    }

    pub fn learned_minimum_for(&self, w: WindowId) -> Option<(i32, i32)> {
        self.learned_min.get(&w).copied()
    }

    /// Clears per-drag bookkeeping for `w` — called by the worker when a
    /// gesture ends, so the next drag on the same window starts fresh
    /// (spec §4.5: learned minimums are a property of the *window*, not the
    /// drag, so this intentionally keeps `learned_min` and only drops the
    /// drag-start baseline and denial flag).
    pub fn end_drag(&mut self, w: WindowId) {
        self.drag_start_size.remove(&w);
        self.denial_notified.remove(&w);
    }

    pub fn apply(&mut self, cmd: WindowCommand, opts: ExecOptions) -> ExecutorOutcome {
        match cmd.z {
            ZOrder::ToTop => {
                self.ops.bring_to_top(cmd.target);
                return ExecutorOutcome::default();
            }
            ZOrder::ToBottom => {
                self.ops.send_to_bottom(cmd.target);
                return ExecutorOutcome::default();
            }
            ZOrder::None => {}
        }

        if cmd.has_size_change() {
            self.apply_resize(cmd, opts)
        } else {
            self.apply_move(cmd, opts)
        }
    }

    fn apply_move(&mut self, cmd: WindowCommand, opts: ExecOptions) -> ExecutorOutcome {
        if opts.rate_limit_moves && self.rate_limited(cmd.target) {
            if opts.log_rate {
                log::trace!("move for window {:?} paced by rate limit", cmd.target);
            }
            return ExecutorOutcome::default();
        }
        self.ops.move_window(cmd.target, cmd.x, cmd.y);
        if opts.rate_limit_moves {
            self.last_applied.insert(cmd.target, now());
        }

        if self.ops.last_call_was_access_denied() {
            let first_time = self.denial_notified.insert(cmd.target);
            return ExecutorOutcome {
                denied: true,
                ..ExecutorOutcome::default()
            }
            .tap_log_denied(first_time, cmd.target, "move");
        }

        ExecutorOutcome::default()
    }

    fn apply_resize(&mut self, cmd: WindowCommand, opts: ExecOptions) -> ExecutorOutcome {
        if self.rate_limited(cmd.target) {
            if opts.log_rate {
                log::trace!("resize for window {:?} paced by rate limit", cmd.target);
            }
            return ExecutorOutcome::default();
        }

        let start = *self
            .drag_start_size
            .entry(cmd.target)
            .or_insert((cmd.w, cmd.h));

        self.ops.resize_window(cmd.target, cmd.x, cmd.y, cmd.w, cmd.h);
        self.last_applied.insert(cmd.target, now());

        if self.ops.last_call_was_access_denied() {
            let first_time = self.denial_notified.insert(cmd.target);
            return ExecutorOutcome {
                denied: true,
                overlay_metrics: None,
                learned_minimum: None,
            }
            .tap_log_denied(first_time, cmd.target, "resize");
        }

        let actual = self.ops.get_window_rect(cmd.target);
        let learned_minimum = actual.and_then(|r| {
            let (actual_w, actual_h) = (r.width(), r.height());
            if actual_w != cmd.w || actual_h != cmd.h {
                // The OS clamped us to the window's real minimum — learn it
                // so the next frame of this drag asks for the right size
                // instead of sliding the anchor by re-requesting the same
                // too-small size every tick.
                let prev = self.learned_min.get(&cmd.target).copied();
                if prev != Some((actual_w, actual_h)) {
                    self.learned_min.insert(cmd.target, (actual_w, actual_h));
                    log::debug!(
                        "learned minimum size for window {:?}: {}x{}",
                        cmd.target,
                        actual_w,
                        actual_h
                    );
                }
                Some(LearnedMinimum {
                    target: cmd.target,
                    min_w: actual_w,
                    min_h: actual_h,
                })
            } else {
                None
            }
        });

        ExecutorOutcome {
            learned_minimum,
            overlay_metrics: Some(OverlayMetrics {
                x: cmd.x,
                y: cmd.y,
                w: cmd.w,
                h: cmd.h,
                start_w: start.0,
                start_h: start.1,
            }),
            denied: false,
        }
    }

    fn rate_limited(&self, target: WindowId) -> bool {
        self.last_applied
            .get(&target)
            .is_some_and(|last| now().duration_since(*last) < RATE_LIMIT_FLOOR)
    }
}

impl ExecutorOutcome {
    fn tap_log_denied(self, first_time: bool, target: WindowId, op: &str) -> Self {
        if first_time {
            log::warn!("{} denied for window {:?} (elevated target?)", op, target);
        }
        self
    }
}

fn now() -> Instant {
    Instant::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::window_manager::fake::FakeOps;

    #[test]
    fn resize_clamped_by_os_is_learned_and_reported() {
        let ops = FakeOps::default().with_window(WindowId(1), Rect::new(0, 0, 400, 300));
        *ops.clamp_to.borrow_mut() = Some((350, 250));
        let mut exec = Executor::new(ops);

        let outcome = exec.apply(WindowCommand::resize(WindowId(1), 0, 0, 300, 200), ExecOptions::default());
        assert_eq!(
            outcome.learned_minimum,
            Some(LearnedMinimum {
                target: WindowId(1),
                min_w: 350,
                min_h: 250
            })
        );
        assert_eq!(exec.learned_minimum_for(WindowId(1)), Some((350, 250)));
    }

    #[test]
    fn exact_resize_reports_no_learned_minimum() {
        let ops = FakeOps::default().with_window(WindowId(2), Rect::new(0, 0, 400, 300));
        let mut exec = Executor::new(ops);
        let outcome = exec.apply(WindowCommand::resize(WindowId(2), 0, 0, 300, 200), ExecOptions::default());
        assert_eq!(outcome.learned_minimum, None);
        assert!(outcome.overlay_metrics.is_some());
    }

    #[test]
    fn denied_resize_is_reported_and_not_retried_silently() {
        let ops = FakeOps::default().with_window(WindowId(3), Rect::new(0, 0, 400, 300));
        *ops.deny_access.borrow_mut() = true;
        let mut exec = Executor::new(ops);
        let outcome = exec.apply(WindowCommand::resize(WindowId(3), 0, 0, 300, 200), ExecOptions::default());
        assert!(outcome.denied);
        assert!(outcome.overlay_metrics.is_none());
    }

    #[test]
    fn move_command_does_not_touch_resize_bookkeeping() {
        let ops = FakeOps::default().with_window(WindowId(4), Rect::new(0, 0, 100, 100));
        let mut exec = Executor::new(ops);
        let outcome = exec.apply(WindowCommand::mv(WindowId(4), 10, 10), ExecOptions::default());
        assert_eq!(outcome, ExecutorOutcome::default());
    }

    #[test]
    fn denied_move_is_reported_like_a_denied_resize() {
        let ops = FakeOps::default().with_window(WindowId(6), Rect::new(0, 0, 100, 100));
        *ops.deny_access.borrow_mut() = true;
        let mut exec = Executor::new(ops);
        let outcome = exec.apply(WindowCommand::mv(WindowId(6), 10, 10), ExecOptions::default());
        assert!(outcome.denied);
    }

    #[test]
    fn z_order_commands_delegate_to_bring_to_top_and_send_to_bottom() {
        let ops = FakeOps::default().with_window(WindowId(5), Rect::new(0, 0, 100, 100));
        let mut exec = Executor::new(ops);
        exec.apply(WindowCommand::z_order(WindowId(5), ZOrder::ToTop), ExecOptions::default());
        exec.apply(WindowCommand::z_order(WindowId(5), ZOrder::ToBottom), ExecOptions::default());
        assert_eq!(
            exec.ops.z_changes.borrow().as_slice(),
            &[(WindowId(5), "top"), (WindowId(5), "bottom")]
        );
    }
}
