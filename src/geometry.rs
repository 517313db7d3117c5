//! Plain (non-FFI) point/rect types and the resize-zone math.
//!
//! Kept independent of `windows::Win32::Foundation::{POINT, RECT}` so the
//! gesture state machine and its tests never need a live Win32 session.
//! Conversions to/from the OS types live at the hook/window-manager boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn delta(self, other: Point) -> (i32, i32) {
        (self.x - other.x, self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width() / 2, self.top + self.height() / 2)
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }
}

/// The 3x3 resize-zone model (spec: "zones 1..9").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeZone {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ResizeZone {
    /// Splits `rect` into an even 3x3 grid and returns the cell containing `cursor`.
    pub fn from_cursor(cursor: Point, rect: Rect) -> ResizeZone {
        let w = rect.width().max(1);
        let h = rect.height().max(1);
        let col = ((cursor.x - rect.left) * 3 / w).clamp(0, 2);
        let row = ((cursor.y - rect.top) * 3 / h).clamp(0, 2);
        match (row, col) {
            (0, 0) => ResizeZone::TopLeft,
            (0, 1) => ResizeZone::Top,
            (0, 2) => ResizeZone::TopRight,
            (1, 0) => ResizeZone::Left,
            (1, 1) => ResizeZone::Center,
            (1, 2) => ResizeZone::Right,
            (2, 0) => ResizeZone::BottomLeft,
            (2, 1) => ResizeZone::Bottom,
            (2, 2) => ResizeZone::BottomRight,
            _ => ResizeZone::Center,
        }
    }

    fn moves_left(self) -> bool {
        matches!(
            self,
            ResizeZone::TopLeft | ResizeZone::Left | ResizeZone::BottomLeft
        )
    }

    fn moves_right(self) -> bool {
        matches!(
            self,
            ResizeZone::TopRight | ResizeZone::Right | ResizeZone::BottomRight
        )
    }

    fn moves_top(self) -> bool {
        matches!(
            self,
            ResizeZone::TopLeft | ResizeZone::Top | ResizeZone::TopRight
        )
    }

    fn moves_bottom(self) -> bool {
        matches!(
            self,
            ResizeZone::BottomLeft | ResizeZone::Bottom | ResizeZone::BottomRight
        )
    }
}

/// Compute the dragged rect for `zone`, given the cumulative cursor delta
/// `(dx, dy)` since grab start, the learned minimum size, and whether the
/// center zone should preserve the captured aspect ratio.
///
/// Corner/edge zones move only the edges implied by the zone, clamped against
/// the learned minimum so the opposite (anchor) edge never moves here — any
/// slide introduced by the OS clamping the actual size is corrected
/// separately by the executor's anti-slide pass.
pub fn compute_resize_rect(
    zone: ResizeZone,
    origin: Rect,
    dx: i32,
    dy: i32,
    min_w: i32,
    min_h: i32,
    aspect_lock: bool,
    aspect: f64,
) -> Rect {
    if zone == ResizeZone::Center {
        let (mut dw, mut dh) = if aspect_lock {
            if aspect >= 1.0 {
                let dw = 2 * dx;
                (dw, (dw as f64 / aspect).round() as i32)
            } else {
                let dh = 2 * dy;
                (((dh as f64) * aspect).round() as i32, dh)
            }
        } else {
            (2 * dx, 2 * dy)
        };

        let mut w = origin.width() + dw;
        let mut h = origin.height() + dh;
        if w < min_w {
            w = min_w;
            if aspect_lock {
                h = if aspect >= 1.0 {
                    (w as f64 / aspect).round() as i32
                } else {
                    h
                };
            }
        }
        if h < min_h {
            h = min_h;
            if aspect_lock {
                w = if aspect < 1.0 {
                    (h as f64 * aspect).round() as i32
                } else {
                    w
                };
            }
        }
        dw = w - origin.width();
        dh = h - origin.height();
        let half_dw = dw / 2;
        let half_dh = dh / 2;
        return Rect::new(
            origin.left - half_dw,
            origin.top - half_dh,
            origin.left - half_dw + w,
            origin.top - half_dh + h,
        );
    }

    let mut r = origin;
    if zone.moves_left() {
        r.left += dx;
    }
    if zone.moves_right() {
        r.right += dx;
    }
    if zone.moves_top() {
        r.top += dy;
    }
    if zone.moves_bottom() {
        r.bottom += dy;
    }

    if r.width() < min_w {
        if zone.moves_left() {
            r.left = r.right - min_w;
        } else {
            r.right = r.left + min_w;
        }
    }
    if r.height() < min_h {
        if zone.moves_top() {
            r.top = r.bottom - min_h;
        } else {
            r.bottom = r.top + min_h;
        }
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_detection_splits_evenly() {
        let rect = Rect::new(0, 0, 300, 300);
        assert_eq!(ResizeZone::from_cursor(Point::new(10, 10), rect), ResizeZone::TopLeft);
        assert_eq!(ResizeZone::from_cursor(Point::new(150, 10), rect), ResizeZone::Top);
        assert_eq!(ResizeZone::from_cursor(Point::new(290, 10), rect), ResizeZone::TopRight);
        assert_eq!(ResizeZone::from_cursor(Point::new(150, 150), rect), ResizeZone::Center);
        assert_eq!(ResizeZone::from_cursor(Point::new(290, 290), rect), ResizeZone::BottomRight);
    }

    #[test]
    fn bottom_right_corner_drag_keeps_top_left_anchor() {
        let origin = Rect::new(0, 0, 400, 300);
        let r = compute_resize_rect(ResizeZone::BottomRight, origin, -100, -150, 300, 300, false, 1.0);
        // true min 350x200 enforced elsewhere (executor learns it); here the
        // floor passed in is the current learned minimum.
        assert_eq!(r.left, 0);
        assert_eq!(r.top, 0);
        assert_eq!(r.right, 300);
        assert_eq!(r.bottom, 300);
    }

    #[test]
    fn top_left_corner_drag_moves_left_and_top_edges_only() {
        let origin = Rect::new(100, 100, 500, 400);
        let r = compute_resize_rect(ResizeZone::TopLeft, origin, 20, -10, 100, 100, false, 1.0);
        assert_eq!(r.left, 120);
        assert_eq!(r.top, 90);
        assert_eq!(r.right, 500);
        assert_eq!(r.bottom, 400);
    }

    #[test]
    fn min_size_clamp_preserves_anchor_edge() {
        // Dragging the right edge far enough left that width would go
        // below the minimum must clamp without moving the left (anchor) edge.
        let origin = Rect::new(0, 0, 400, 300);
        let r = compute_resize_rect(ResizeZone::Right, origin, -350, 0, 350, 200, false, 1.0);
        assert_eq!(r.left, 0);
        assert_eq!(r.right, 350);
    }

    #[test]
    fn center_zone_resizes_uniformly_around_center() {
        let origin = Rect::new(100, 100, 300, 300); // 200x200, center (200,200)
        let r = compute_resize_rect(ResizeZone::Center, origin, 50, 50, 50, 50, false, 1.0);
        assert_eq!(r.width(), 300);
        assert_eq!(r.height(), 300);
        assert_eq!(r.center(), Point::new(200, 200));
    }

    #[test]
    fn center_zone_aspect_lock_drives_from_larger_axis() {
        let origin = Rect::new(0, 0, 400, 200); // aspect 2.0
        let r = compute_resize_rect(ResizeZone::Center, origin, 50, 0, 50, 50, true, 2.0);
        // dw = 2*50 = 100, dh = dw/aspect = 50
        assert_eq!(r.width(), 500);
        assert_eq!(r.height(), 250);
    }
}
