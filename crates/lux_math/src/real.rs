//! Numeric lane types a plugin can be instantiated over.

use std::fmt::Debug;

use crate::Vec4;

/// Scalar or packet floating point representation.
///
/// Plugins store their parameters as `Real` values so that a single plugin
/// source serves every numeric back-end. Scene descriptions always carry
/// `f64`, which is broadcast to every lane.
pub trait Real: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Number of lanes evaluated together.
    const LANES: usize;

    /// Broadcast a description value to every lane.
    fn splat(value: f64) -> Self;

    /// Read back one lane in double precision.
    fn lane(self, index: usize) -> f64;
}

impl Real for f32 {
    const LANES: usize = 1;

    fn splat(value: f64) -> Self {
        value as f32
    }

    fn lane(self, _index: usize) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    const LANES: usize = 1;

    fn splat(value: f64) -> Self {
        value
    }

    fn lane(self, _index: usize) -> f64 {
        self
    }
}

impl Real for Vec4 {
    const LANES: usize = 4;

    fn splat(value: f64) -> Self {
        Vec4::splat(value as f32)
    }

    fn lane(self, index: usize) -> f64 {
        self[index.min(3)] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splat_broadcasts_to_all_lanes() {
        let packet = <Vec4 as Real>::splat(2.5);
        for i in 0..<Vec4 as Real>::LANES {
            assert_eq!(packet.lane(i), 2.5);
        }
        assert_eq!(<f32 as Real>::splat(0.5).lane(0), 0.5);
        assert_eq!(<f64 as Real>::splat(0.1), 0.1);
    }
}
