//! Resize handles and the transforms they produce.

use kurbo::{Affine, Point, Rect};

const DEGENERATE_EPSILON: f64 = 1e-6;

/// The eight resize handles of a selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Side {
    pub const ALL: [Side; 8] = [
        Side::TopLeft,
        Side::Top,
        Side::TopRight,
        Side::Right,
        Side::BottomRight,
        Side::Bottom,
        Side::BottomLeft,
        Side::Left,
    ];

    /// Which axes this handle drags: (x, y).
    fn axes(self) -> (bool, bool) {
        match self {
            Side::Left | Side::Right => (true, false),
            Side::Top | Side::Bottom => (false, true),
            _ => (true, true),
        }
    }

    /// Sign of the handle on each axis: -1 for left/top, +1 for
    /// right/bottom, 0 for a non-participating axis.
    fn signs(self) -> (f64, f64) {
        let sx = match self {
            Side::TopLeft | Side::Left | Side::BottomLeft => -1.0,
            Side::TopRight | Side::Right | Side::BottomRight => 1.0,
            _ => 0.0,
        };
        let sy = match self {
            Side::TopLeft | Side::Top | Side::TopRight => -1.0,
            Side::BottomLeft | Side::Bottom | Side::BottomRight => 1.0,
            _ => 0.0,
        };
        (sx, sy)
    }
}

/// The world position of a handle on a selection box.
pub fn rect_side(rect: Rect, side: Side) -> Point {
    let center = rect.center();
    match side {
        Side::TopLeft => Point::new(rect.x0, rect.y0),
        Side::Top => Point::new(center.x, rect.y0),
        Side::TopRight => Point::new(rect.x1, rect.y0),
        Side::Right => Point::new(rect.x1, center.y),
        Side::BottomRight => Point::new(rect.x1, rect.y1),
        Side::Bottom => Point::new(center.x, rect.y1),
        Side::BottomLeft => Point::new(rect.x0, rect.y1),
        Side::Left => Point::new(rect.x0, center.y),
    }
}

/// The transform that resizes `rect` by dragging `side` by `(dx, dy)`.
///
/// The opposite side stays anchored, or the center does when `from_center`
/// is set (the dragged extent then grows symmetrically). `proportional`
/// applies the dominant axis scale to both axes. Returns `None` when the
/// result would collapse the box to (nearly) nothing; callers keep their
/// previous preview in that case.
pub fn resize_transform(
    rect: Rect,
    side: Side,
    dx: f64,
    dy: f64,
    proportional: bool,
    from_center: bool,
) -> Option<Affine> {
    let width = rect.width();
    let height = rect.height();
    if width.abs() < DEGENERATE_EPSILON || height.abs() < DEGENERATE_EPSILON {
        return None;
    }
    let (use_x, use_y) = side.axes();
    let (sign_x, sign_y) = side.signs();
    let factor = if from_center { 2.0 } else { 1.0 };

    let mut sx = if use_x {
        (width + sign_x * dx * factor) / width
    } else {
        1.0
    };
    let mut sy = if use_y {
        (height + sign_y * dy * factor) / height
    } else {
        1.0
    };
    if proportional {
        let dominant = if (sx - 1.0).abs() >= (sy - 1.0).abs() {
            sx
        } else {
            sy
        };
        sx = dominant;
        sy = dominant;
    }
    if !sx.is_finite()
        || !sy.is_finite()
        || (sx * width).abs() < DEGENERATE_EPSILON
        || (sy * height).abs() < DEGENERATE_EPSILON
    {
        return None;
    }

    let anchor = if from_center {
        rect.center()
    } else {
        // The point opposite the dragged handle.
        Point::new(
            if sign_x > 0.0 { rect.x0 } else { rect.x1 },
            if sign_y > 0.0 { rect.y0 } else { rect.y1 },
        )
    };
    Some(
        Affine::translate(anchor.to_vec2())
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate(-anchor.to_vec2()),
    )
}
