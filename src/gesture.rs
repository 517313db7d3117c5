//! Gesture State Machine (spec §4.3): turns raw mouse/modifier events into
//! window commands. Pure logic — no Win32 calls — so it is driven in tests
//! through the `WindowOps`/`WindowOpsExec` trait seam via `FakeOps`, and in
//! production through `Win32Ops` from the hook thread.

use crate::geometry::{compute_resize_rect, Point, Rect, ResizeZone};
use crate::modifier::ModifierSnapshot;
use crate::transport::{WindowCommand, ZOrder};
use crate::window_manager::{WindowId, WindowOps};

/// Mouse button a hook event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    Idle,
    Moving,
    Resizing,
}

/// Everything a live drag needs, captured once at grab time and updated only
/// by cumulative cursor delta — never re-read from the OS rect mid-drag, so
/// an OS-driven resize clamp cannot make the drag "slide" (spec §4.3 failure
/// mode: "anchor must not drift").
#[derive(Debug, Clone, Copy)]
pub struct DragState {
    pub target: WindowId,
    pub origin: Rect,
    pub start_cursor: Point,
    pub zone: ResizeZone,
    pub min_w: i32,
    pub min_h: i32,
    pub aspect_lock: bool,
    pub aspect: f64,
}

/// Bookkeeping that spans a single Win-hold, independent of which gesture (if
/// any) ran during it.
#[derive(Debug, Default, Clone, Copy)]
pub struct GestureFlags {
    /// Set the instant any gesture actually moves/resizes/reorders a window
    /// during this Win-hold. Guards `mark_gesture_used` so the solo-keystroke
    /// poison fires exactly once per hold, at the gesture that earns it
    /// (spec §4.1/§4.2) — not again for later gestures in the same hold.
    pub win_gesture_used: bool,
    /// Set when a move/resize grab landed on a window that was not already
    /// foreground, and a focus request has been queued but not yet
    /// acknowledged in a command.
    pub focus_pending: bool,
}

/// Side effects the hook thread must carry out. None of these touch the OS
/// directly inside this module — they're instructions for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    EnqueueCommand(WindowCommand),
    RequestFocus(WindowId),
    PoisonSoloModifier,
    /// Consume the event: do not forward it to the next hook in the chain.
    Swallow,
    /// Let the event continue to the next hook / the target application.
    PassThrough,
}

#[derive(Debug, Default)]
pub struct GestureMachine {
    mode: GestureMode,
    drag: Option<DragState>,
    flags: GestureFlags,
}

impl Default for GestureMode {
    fn default() -> Self {
        GestureMode::Idle
    }
}

impl GestureMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    /// Mouse button press while Win (or Win+Shift) is held. `cursor` is in
    /// screen coordinates.
    pub fn on_mouse_down(
        &mut self,
        button: Button,
        cursor: Point,
        mods: ModifierSnapshot,
        ops: &impl WindowOps,
    ) -> Vec<Effect> {
        if button == Button::Middle && mods.win && !mods.ctrl && !mods.alt {
            return self.start_z_order_gesture(mods.shift, cursor, ops);
        }
        if mods.win_solo() {
            if matches!(self.mode, GestureMode::Idle) {
                return match button {
                    Button::Left => self.start_move(cursor, ops),
                    Button::Right => self.start_resize(cursor, ops),
                    Button::Middle => vec![Effect::PassThrough],
                };
            }
            if self.is_continuation(cursor, ops) {
                return vec![Effect::Swallow];
            }
        }
        vec![Effect::PassThrough]
    }

    /// Win+MMB sends the window under the cursor to the bottom of the
    /// z-order; Win+Shift+MMB brings the current foreground window to the
    /// top — the target differs between the two branches by design.
    fn start_z_order_gesture(
        &mut self,
        shift_held: bool,
        cursor: Point,
        ops: &impl WindowOps,
    ) -> Vec<Effect> {
        let (target, z) = if shift_held {
            let Some(target) = ops.get_foreground_window() else {
                return vec![Effect::PassThrough];
            };
            (target, ZOrder::ToTop)
        } else {
            let Some(target) = ops.window_from_point(cursor) else {
                return vec![Effect::PassThrough];
            };
            (target, ZOrder::ToBottom)
        };
        if !ops.is_valid_target(target) {
            return vec![Effect::PassThrough];
        }
        let mut effects = vec![Effect::EnqueueCommand(WindowCommand::z_order(target, z))];
        self.mark_gesture_used(&mut effects);
        effects.push(Effect::Swallow);
        effects
    }

    fn start_move(&mut self, cursor: Point, ops: &impl WindowOps) -> Vec<Effect> {
        let Some(target) = ops.window_from_point(cursor) else {
            return vec![Effect::PassThrough];
        };
        if !ops.is_valid_target(target) {
            return vec![Effect::PassThrough];
        }
        let Some(origin) = ops.get_window_rect(target) else {
            return vec![Effect::PassThrough];
        };
        if ops.is_maximized(target) {
            ops.restore_window(target);
        }

        self.mode = GestureMode::Moving;
        self.drag = Some(DragState {
            target,
            origin,
            start_cursor: cursor,
            zone: ResizeZone::Center,
            min_w: 1,
            min_h: 1,
            aspect_lock: false,
            aspect: 1.0,
        });
        self.check_invariant();

        let mut effects = vec![Effect::Swallow];
        self.mark_gesture_used(&mut effects);
        if ops.get_foreground_window() != Some(target) {
            self.flags.focus_pending = true;
            effects.push(Effect::RequestFocus(target));
        }
        effects
    }

    fn start_resize(&mut self, cursor: Point, ops: &impl WindowOps) -> Vec<Effect> {
        let Some(target) = ops.window_from_point(cursor) else {
            return vec![Effect::PassThrough];
        };
        if !ops.is_valid_target(target) {
            return vec![Effect::PassThrough];
        }
        let Some(origin) = ops.get_window_rect(target) else {
            return vec![Effect::PassThrough];
        };

        let zone = ResizeZone::from_cursor(cursor, origin);
        let aspect = if origin.height() != 0 {
            origin.width() as f64 / origin.height() as f64
        } else {
            1.0
        };

        self.mode = GestureMode::Resizing;
        self.drag = Some(DragState {
            target,
            origin,
            start_cursor: cursor,
            zone,
            min_w: 1,
            min_h: 1,
            aspect_lock: zone == ResizeZone::Center,
            aspect,
        });
        self.check_invariant();

        let mut effects = vec![Effect::Swallow];
        self.mark_gesture_used(&mut effects);
        if ops.get_foreground_window() != Some(target) {
            self.flags.focus_pending = true;
            effects.push(Effect::RequestFocus(target));
        }
        effects
    }

    /// Feed the learned minimum size back into an active resize, so the next
    /// computed rect already respects it (executor anti-slide feedback,
    /// spec §4.5).
    pub fn apply_learned_minimum(&mut self, min_w: i32, min_h: i32) {
        if let Some(drag) = &mut self.drag {
            drag.min_w = drag.min_w.max(min_w);
            drag.min_h = drag.min_h.max(min_h);
        }
    }

    pub fn on_mouse_move(&mut self, cursor: Point) -> Vec<Effect> {
        let Some(drag) = self.drag else {
            return vec![Effect::PassThrough];
        };
        match self.mode {
            GestureMode::Moving => {
                let (dx, dy) = cursor.delta(drag.start_cursor);
                let moved = drag.origin.translated(dx, dy);
                vec![Effect::EnqueueCommand(WindowCommand::mv(
                    drag.target,
                    moved.left,
                    moved.top,
                ))]
            }
            GestureMode::Resizing => {
                let (dx, dy) = cursor.delta(drag.start_cursor);
                let r = compute_resize_rect(
                    drag.zone,
                    drag.origin,
                    dx,
                    dy,
                    drag.min_w,
                    drag.min_h,
                    drag.aspect_lock,
                    drag.aspect,
                );
                vec![Effect::EnqueueCommand(WindowCommand::resize(
                    drag.target,
                    r.left,
                    r.top,
                    r.width(),
                    r.height(),
                ))]
            }
            GestureMode::Idle => vec![Effect::PassThrough],
        }
    }

    /// Button release ends the active drag. Z-order gestures complete on
    /// mouse-down and have nothing to do here.
    pub fn on_mouse_up(&mut self, _button: Button) -> Vec<Effect> {
        if self.drag.is_none() {
            return vec![Effect::PassThrough];
        }
        self.soft_reset();
        vec![Effect::Swallow]
    }

    /// Same-window, same-gesture mouse-down while already dragging: a no-op
    /// continuation rather than a new grab (spec §4.3 "re-press mid-drag").
    pub fn is_continuation(&self, cursor: Point, ops: &impl WindowOps) -> bool {
        match (self.mode, self.drag) {
            (GestureMode::Moving, Some(d)) | (GestureMode::Resizing, Some(d)) => {
                ops.window_from_point(cursor) == Some(d.target)
            }
            _ => false,
        }
    }

    /// Win released: ends any live drag and resets the hold's bookkeeping.
    /// The solo-modifier poison, if any, was already emitted eagerly when the
    /// gesture started (spec §4.2: the poison must reach the shell before the
    /// genuine Win-up does, so it cannot wait for this handler) — there is
    /// nothing left to do here but clean up.
    pub fn on_win_released(&mut self) -> Vec<Effect> {
        self.hard_reset();
        Vec::new()
    }

    /// Ends any drag without touching `win_gesture_used`: used when a grab
    /// target changes mid-hold (spec §4.3 "different window under cursor"),
    /// so the *next* grab can still poison on release.
    pub fn soft_reset(&mut self) {
        self.mode = GestureMode::Idle;
        self.drag = None;
        self.flags.focus_pending = false;
        self.check_invariant();
    }

    /// Clears everything, including the poison flag. Used on Win release and
    /// on any hard boundary (new Win press cycle).
    pub fn hard_reset(&mut self) {
        self.soft_reset();
        self.flags = GestureFlags::default();
    }

    /// Unconditional reset with no side effects returned: used by the
    /// session-lock/unlock handler and the watchdog recovery path, where the
    /// state must go to a known-good Idle regardless of what was mid-flight
    /// (spec §4.1 "session lock forces a hard reset").
    pub fn panic_reset(&mut self) {
        self.hard_reset();
    }

    pub fn drag_state(&self) -> Option<DragState> {
        self.drag
    }

    /// The first time any gesture actually fires within a Win-hold, the solo
    /// Win tap must be poisoned before the hold's Win-up can reach the shell
    /// (spec §4.2 ordering guarantee). Poisoning here — at gesture start,
    /// eagerly — rather than at Win-release gives `SendInput` the time it
    /// needs to land first; a later poison attempt races the shell's own
    /// Win-up handling and can lose.
    fn mark_gesture_used(&mut self, effects: &mut Vec<Effect>) {
        if !self.flags.win_gesture_used {
            self.flags.win_gesture_used = true;
            effects.insert(0, Effect::PoisonSoloModifier);
        }
    }

    /// Mode and drag state must agree: Idle has no drag, Moving/Resizing
    /// always has one. A debug build panics on the impossible state (spec
    /// §7 "Protocol-violation"); a release build just repairs it, since
    /// every caller already treats a missing drag as "nothing to do".
    fn check_invariant(&mut self) {
        let consistent = matches!(
            (self.mode, self.drag.is_some()),
            (GestureMode::Idle, false) | (GestureMode::Moving, true) | (GestureMode::Resizing, true)
        );
        if !consistent {
            let violation = crate::error::CoreError::ProtocolViolation(format!(
                "mode={:?} drag_present={}",
                self.mode,
                self.drag.is_some()
            ));
            debug_assert!(consistent, "{}", violation);
            log::error!("{}", violation);
            self.hard_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_manager::fake::FakeOps;
    use crate::window_manager::WindowOpsExec;

    fn win_mods() -> ModifierSnapshot {
        ModifierSnapshot {
            win: true,
            ..Default::default()
        }
    }

    fn setup_window(ops: &FakeOps, id: WindowId, rect: Rect) {
        ops.rects.borrow_mut().insert(id, rect);
        ops.valid.borrow_mut().insert(id, true);
    }

    #[test]
    fn plain_move_tracks_cumulative_delta() {
        let ops = FakeOps::default();
        let w = WindowId(1);
        setup_window(&ops, w, Rect::new(100, 100, 400, 300));
        *ops.foreground.borrow_mut() = Some(w);

        let mut gm = GestureMachine::new();
        let effects = gm.on_mouse_down(Button::Left, Point::new(150, 150), win_mods(), &ops);
        assert!(effects.contains(&Effect::Swallow));
        assert_eq!(gm.mode(), GestureMode::Moving);

        let effects = gm.on_mouse_move(Point::new(170, 160));
        assert_eq!(
            effects,
            vec![Effect::EnqueueCommand(WindowCommand::mv(w, 120, 110))]
        );
    }

    #[test]
    fn win_shift_middle_click_brings_foreground_window_to_top() {
        let ops = FakeOps::default();
        let w = WindowId(2);
        setup_window(&ops, w, Rect::new(0, 0, 200, 200));
        *ops.foreground.borrow_mut() = Some(w);

        let mods = ModifierSnapshot {
            win: true,
            shift: true,
            ..Default::default()
        };
        let mut gm = GestureMachine::new();
        // Cursor is nowhere near w — bring-to-front targets the foreground
        // window, not whatever is under the cursor.
        let effects = gm.on_mouse_down(Button::Middle, Point::new(900, 900), mods, &ops);
        assert_eq!(
            effects,
            vec![
                Effect::PoisonSoloModifier,
                Effect::EnqueueCommand(WindowCommand::z_order(w, ZOrder::ToTop)),
                Effect::Swallow,
            ]
        );
        // Z-order gestures don't enter a drag mode.
        assert_eq!(gm.mode(), GestureMode::Idle);
    }

    #[test]
    fn win_middle_click_sends_window_under_cursor_to_bottom() {
        let ops = FakeOps::default();
        let w = WindowId(3);
        setup_window(&ops, w, Rect::new(0, 0, 200, 200));

        let mods = ModifierSnapshot {
            win: true,
            ..Default::default()
        };
        let mut gm = GestureMachine::new();
        let effects = gm.on_mouse_down(Button::Middle, Point::new(10, 10), mods, &ops);
        assert!(effects.contains(&Effect::EnqueueCommand(WindowCommand::z_order(
            w,
            ZOrder::ToBottom
        ))));
    }

    #[test]
    fn resize_corner_drag_respects_learned_minimum() {
        let ops = FakeOps::default();
        let w = WindowId(4);
        setup_window(&ops, w, Rect::new(0, 0, 400, 300));

        let mut gm = GestureMachine::new();
        // Bottom-right corner.
        gm.on_mouse_down(Button::Right, Point::new(390, 290), win_mods(), &ops);
        assert_eq!(gm.mode(), GestureMode::Resizing);

        // Learn a minimum larger than the naive drag would allow.
        gm.apply_learned_minimum(350, 250);
        let effects = gm.on_mouse_move(Point::new(0, 0));
        let cmd = match effects.as_slice() {
            [Effect::EnqueueCommand(cmd)] => *cmd,
            other => panic!("unexpected effects: {other:?}"),
        };
        assert_eq!(cmd.w, 350);
        assert_eq!(cmd.h, 250);
        // Anchor (top-left) must not have moved.
        assert_eq!(cmd.x, 0);
        assert_eq!(cmd.y, 0);
    }

    #[test]
    fn elevated_window_grab_is_declined() {
        let ops = FakeOps::default();
        let w = WindowId(5);
        ops.valid.borrow_mut().insert(w, false);
        ops.rects.borrow_mut().insert(w, Rect::new(0, 0, 100, 100));

        let mut gm = GestureMachine::new();
        let effects = gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        assert_eq!(effects, vec![Effect::PassThrough]);
        assert_eq!(gm.mode(), GestureMode::Idle);
    }

    #[test]
    fn different_window_mid_hold_soft_resets_then_restarts() {
        let ops = FakeOps::default();
        let a = WindowId(6);
        let b = WindowId(7);
        setup_window(&ops, a, Rect::new(0, 0, 200, 200));
        setup_window(&ops, b, Rect::new(300, 300, 500, 500));
        *ops.foreground.borrow_mut() = Some(a);

        let mut gm = GestureMachine::new();
        gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        assert!(gm.is_continuation(Point::new(20, 20), &ops));
        assert!(!gm.is_continuation(Point::new(310, 310), &ops));

        gm.on_mouse_up(Button::Left);
        assert_eq!(gm.mode(), GestureMode::Idle);
        // win_gesture_used survives the soft reset so the eventual Win
        // release still poisons the solo tap.
        gm.on_mouse_down(Button::Left, Point::new(310, 310), win_mods(), &ops);
        assert_eq!(gm.mode(), GestureMode::Moving);
    }

    #[test]
    fn repress_over_same_window_mid_drag_is_a_swallowed_no_op() {
        let ops = FakeOps::default();
        let a = WindowId(60);
        setup_window(&ops, a, Rect::new(0, 0, 200, 200));
        *ops.foreground.borrow_mut() = Some(a);

        let mut gm = GestureMachine::new();
        gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        assert_eq!(gm.mode(), GestureMode::Moving);

        let effects = gm.on_mouse_down(Button::Left, Point::new(20, 20), win_mods(), &ops);
        assert_eq!(effects, vec![Effect::Swallow]);
        assert_eq!(gm.mode(), GestureMode::Moving);
    }

    #[test]
    fn gesture_start_poisons_solo_modifier_eagerly() {
        let ops = FakeOps::default();
        let w = WindowId(8);
        setup_window(&ops, w, Rect::new(0, 0, 100, 100));
        *ops.foreground.borrow_mut() = Some(w);

        let mut gm = GestureMachine::new();
        let effects = gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        // Poisoned at grab time, not at Win-up — the shell's Win-up handling
        // must not win the race against a poison sent only on release.
        assert_eq!(effects.first(), Some(&Effect::PoisonSoloModifier));

        gm.on_mouse_up(Button::Left);
        // Nothing left to poison by the time Win is actually released.
        assert!(gm.on_win_released().is_empty());
    }

    #[test]
    fn second_gesture_in_same_hold_does_not_repoison() {
        let ops = FakeOps::default();
        let a = WindowId(11);
        let b = WindowId(12);
        setup_window(&ops, a, Rect::new(0, 0, 100, 100));
        setup_window(&ops, b, Rect::new(300, 300, 400, 400));
        *ops.foreground.borrow_mut() = Some(a);

        let mut gm = GestureMachine::new();
        let first = gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        assert!(first.contains(&Effect::PoisonSoloModifier));
        gm.on_mouse_up(Button::Left);

        let second = gm.on_mouse_down(Button::Left, Point::new(310, 310), win_mods(), &ops);
        assert!(!second.contains(&Effect::PoisonSoloModifier));
    }

    #[test]
    fn win_release_with_no_gesture_does_not_poison() {
        let mut gm = GestureMachine::new();
        let effects = gm.on_win_released();
        assert!(effects.is_empty());
    }

    #[test]
    fn panic_reset_clears_mid_drag_state() {
        let ops = FakeOps::default();
        let w = WindowId(9);
        setup_window(&ops, w, Rect::new(0, 0, 100, 100));
        let mut gm = GestureMachine::new();
        gm.on_mouse_down(Button::Right, Point::new(90, 90), win_mods(), &ops);
        assert_eq!(gm.mode(), GestureMode::Resizing);
        gm.panic_reset();
        assert_eq!(gm.mode(), GestureMode::Idle);
        assert!(gm.drag_state().is_none());
        // A held gesture flag does not leak across the panic boundary either.
        assert!(gm.on_win_released().is_empty());
    }

    #[test]
    fn move_grab_on_background_window_requests_focus() {
        let ops = FakeOps::default();
        let w = WindowId(10);
        setup_window(&ops, w, Rect::new(0, 0, 100, 100));
        *ops.foreground.borrow_mut() = Some(WindowId(999));

        let mut gm = GestureMachine::new();
        let effects = gm.on_mouse_down(Button::Left, Point::new(10, 10), win_mods(), &ops);
        assert!(effects.contains(&Effect::RequestFocus(w)));
        let _ = ops.last_call_was_access_denied();
    }
}
