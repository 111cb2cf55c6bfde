use serde::{Deserialize, Serialize};

/// Bounding box in the corner format (left, top, right, bottom)
///
/// The corner form is the canonical carrier across the pipeline; center/width/height views are
/// derived on demand. Invariants: `right > left`, `bottom > top`.
///
#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        assert!(right > left, "Right must be greater than left");
        assert!(bottom > top, "Bottom must be greater than top");
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Constructs the box from a center/width/height view.
    ///
    pub fn from_cxcywh(xc: f32, yc: f32, width: f32, height: f32) -> Self {
        Self::new(
            xc - width / 2.0,
            yc - height / 2.0,
            xc + width / 2.0,
            yc + height / 2.0,
        )
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// The box as a Kalman measurement vector (center_x, center_y, width, height).
    ///
    pub fn as_measurement(&self) -> [f32; 4] {
        let (xc, yc) = self.center();
        [xc, yc, self.width(), self.height()]
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }

    /// Euclidean distance between the centers of two boxes.
    ///
    pub fn center_distance(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let (lx, ly) = l.center();
        let (rx, ry) = r.center();
        ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt()
    }

    /// Clamps the box to frame dimensions. Returns `None` when nothing of the box remains.
    ///
    pub fn clamp(&self, frame_width: f32, frame_height: f32) -> Option<BoundingBox> {
        let left = self.left.max(0.0);
        let top = self.top.max(0.0);
        let right = self.right.min(frame_width);
        let bottom = self.bottom.min(frame_height);
        if right > left && bottom > top {
            Some(BoundingBox {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    pub fn intersection(l: &BoundingBox, r: &BoundingBox) -> f64 {
        let (x1, y1) = (l.left.max(r.left), l.top.max(r.top));
        let (x2, y2) = (l.right.min(r.right), l.bottom.min(r.bottom));

        let int_width = x2 - x1;
        let int_height = y2 - y1;

        if int_width > 0.0 && int_height > 0.0 {
            (int_width * int_height) as f64
        } else {
            0.0_f64
        }
    }

    /// Intersection over union. A zero union yields `0.0`.
    ///
    pub fn iou(l: &BoundingBox, r: &BoundingBox) -> f32 {
        let intersection = Self::intersection(l, r);
        let union = l.area() as f64 + r.area() as f64 - intersection;
        if union > 0.0 {
            (intersection / union) as f32
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::bbox::BoundingBox;
    use crate::EPS;

    #[test]
    fn corner_invariants() {
        let bb = BoundingBox::new(100.0, 100.0, 200.0, 300.0);
        assert_eq!(bb.width(), 100.0);
        assert_eq!(bb.height(), 200.0);
        assert_eq!(bb.area(), 20000.0);
        assert_eq!(bb.center(), (150.0, 200.0));
    }

    #[test]
    fn cxcywh_roundtrip() {
        let bb = BoundingBox::new(10.0, 20.0, 50.0, 100.0);
        let [xc, yc, w, h] = bb.as_measurement();
        let back = BoundingBox::from_cxcywh(xc, yc, w, h);
        assert!((back.left - bb.left).abs() < EPS);
        assert!((back.bottom - bb.bottom).abs() < EPS);
    }

    #[test]
    fn iou_bounds() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(100.0, 100.0, 110.0, 110.0);

        assert!((BoundingBox::iou(&a, &a) - 1.0).abs() < EPS);
        let ab = BoundingBox::iou(&a, &b);
        assert!(ab > 0.0 && ab < 1.0);
        assert_eq!(BoundingBox::iou(&a, &c), 0.0);
        assert_eq!(BoundingBox::iou(&a, &b), BoundingBox::iou(&b, &a));
    }

    #[test]
    fn clamp_to_frame() {
        let bb = BoundingBox::new(-20.0, -10.0, 50.0, 90.0);
        let clamped = bb.clamp(40.0, 80.0).unwrap();
        assert_eq!(clamped, BoundingBox::new(0.0, 0.0, 40.0, 80.0));

        let outside = BoundingBox::new(100.0, 100.0, 120.0, 120.0);
        assert!(outside.clamp(40.0, 80.0).is_none());
    }

    #[test]
    fn containment() {
        let bb = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bb.contains_point(5.0, 5.0));
        assert!(bb.contains_point(0.0, 10.0));
        assert!(!bb.contains_point(10.1, 5.0));
    }
}
