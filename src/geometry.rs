/// Bounding rectangle in client coordinates, as reported by the host's
/// layout for a node or a scroll root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientRect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl ClientRect {
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Full-width rectangle spanning `top..bottom`.
    pub fn vertical(top: f64, bottom: f64) -> Self {
        Self::new(top, 0.0, 0.0, (bottom - top).max(0.0))
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn translate_y(&self, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            ..*self
        }
    }

    /// Length of the vertical overlap with `other`, zero when disjoint.
    pub fn vertical_overlap(&self, other: &ClientRect) -> f64 {
        let top = self.top.max(other.top);
        let bottom = self.bottom().min(other.bottom());
        (bottom - top).max(0.0)
    }

    /// Edge-adjacent rectangles count as intersecting, matching how hosts
    /// treat zero-area intersections.
    pub fn intersects_vertically(&self, other: &ClientRect) -> bool {
        self.top <= other.bottom() && other.top <= self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_clamped() {
        let root = ClientRect::vertical(20.0, 100.0);
        assert_eq!(ClientRect::vertical(0.0, 30.0).vertical_overlap(&root), 10.0);
        assert_eq!(ClientRect::vertical(150.0, 160.0).vertical_overlap(&root), 0.0);
        assert_eq!(ClientRect::vertical(40.0, 60.0).vertical_overlap(&root), 20.0);
    }

    #[test]
    fn touching_edges_intersect() {
        let root = ClientRect::vertical(20.0, 100.0);
        assert!(ClientRect::vertical(0.0, 20.0).intersects_vertically(&root));
        assert!(!ClientRect::vertical(0.0, 19.0).intersects_vertically(&root));
    }
}
