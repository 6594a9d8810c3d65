/// Closed range `[min, max]`: a ray's valid `t` span or one axis of a box.
///
/// `min > max` means empty, so folding points into [`Interval::EMPTY`] with
/// [`Interval::include`] yields their bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// Open test. Hits exactly at `min` are self-intersections and are
    /// rejected this way.
    pub fn surrounds(&self, x: f32) -> bool {
        self.min < x && x < self.max
    }

    pub fn include(&self, x: f32) -> Interval {
        Interval::new(self.min.min(x), self.max.max(x))
    }

    /// Smallest interval covering both.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_closed_for_contains_only() {
        let span = Interval::new(1e-4, 10.0);

        assert!(span.contains(1e-4));
        assert!(!span.surrounds(1e-4));
        assert!(span.surrounds(5.0));
        assert!(!span.contains(10.5));
    }

    #[test]
    fn test_folding_points_from_empty() {
        assert!(Interval::EMPTY.is_empty());
        assert!(!Interval::EMPTY.contains(0.0));

        let bounds = [3.0, -1.0, 2.0]
            .into_iter()
            .fold(Interval::EMPTY, |acc, x| acc.include(x));
        assert_eq!(bounds, Interval::new(-1.0, 3.0));
        assert_eq!(
            Interval::surrounding(&bounds, &Interval::new(2.0, 7.0)),
            Interval::new(-1.0, 7.0)
        );
    }
}
