//! The 2x2 ray-transfer (ABCD) matrix.

use nalgebra::Matrix2;
use num_complex::Complex64;
use std::fmt;
use std::ops::Mul;

/// A 2x2 ray-transfer matrix describing an optical element's effect on a
/// paraxial ray in one transverse plane.
///
/// Composition order follows matrix algebra: for a ray passing element 1 and
/// then element 2, the combined matrix is `m2 * m1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayMatrix {
    m: Matrix2<f64>,
}

impl RayMatrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            m: Matrix2::new(a, b, c, d),
        }
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix2::identity(),
        }
    }

    /// Overwrite all four components at once.
    pub fn assign(&mut self, a: f64, b: f64, c: f64, d: f64) {
        self.m = Matrix2::new(a, b, c, d);
    }

    pub fn a(&self) -> f64 {
        self.m[(0, 0)]
    }

    pub fn b(&self) -> f64 {
        self.m[(0, 1)]
    }

    pub fn c(&self) -> f64 {
        self.m[(1, 0)]
    }

    pub fn d(&self) -> f64 {
        self.m[(1, 1)]
    }

    pub fn det(&self) -> f64 {
        self.m.determinant()
    }

    /// The inverse matrix, or `None` when the determinant vanishes.
    pub fn inverted(&self) -> Option<RayMatrix> {
        self.m.try_inverse().map(|m| RayMatrix { m })
    }

    /// Apply this matrix to a complex beam parameter:
    /// `q' = (A*q + B) / (C*q + D)`.
    ///
    /// Returns `None` when the denominator vanishes.
    pub fn apply_q(&self, q: Complex64) -> Option<Complex64> {
        let denom = self.c() * q + self.d();
        if denom.norm_sqr() == 0.0 {
            return None;
        }
        Some((self.a() * q + self.b()) / denom)
    }
}

impl Default for RayMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for RayMatrix {
    type Output = RayMatrix;

    fn mul(self, rhs: RayMatrix) -> RayMatrix {
        RayMatrix { m: self.m * rhs.m }
    }
}

impl Mul for &RayMatrix {
    type Output = RayMatrix;

    fn mul(self, rhs: &RayMatrix) -> RayMatrix {
        RayMatrix { m: self.m * rhs.m }
    }
}

impl fmt::Display for RayMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}; {}, {}]",
            self.a(),
            self.b(),
            self.c(),
            self.d()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let m = RayMatrix::identity();
        assert_eq!(m.a(), 1.0);
        assert_eq!(m.b(), 0.0);
        assert_eq!(m.c(), 0.0);
        assert_eq!(m.d(), 1.0);
        assert_eq!(m, RayMatrix::default());
    }

    #[test]
    fn test_multiply() {
        // Free space L then thin lens F
        let space = RayMatrix::new(1.0, 0.5, 0.0, 1.0);
        let lens = RayMatrix::new(1.0, 0.0, -1.0 / 0.1, 1.0);
        let m = lens * space;
        assert_relative_eq!(m.a(), 1.0);
        assert_relative_eq!(m.b(), 0.5);
        assert_relative_eq!(m.c(), -10.0);
        assert_relative_eq!(m.d(), -4.0);
    }

    #[test]
    fn test_det_and_inverse() {
        let m = RayMatrix::new(1.0, 0.25, -2.0, 0.5);
        assert_relative_eq!(m.det(), 1.0);

        let inv = m.inverted().unwrap();
        let product = inv * m;
        assert_relative_eq!(product.a(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(product.b(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(product.c(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(product.d(), 1.0, epsilon = 1e-12);

        let singular = RayMatrix::new(1.0, 2.0, 2.0, 4.0);
        assert!(singular.inverted().is_none());
    }

    #[test]
    fn test_apply_q() {
        // Free-space propagation shifts q by the distance
        let m = RayMatrix::new(1.0, 0.7, 0.0, 1.0);
        let q = Complex64::new(0.0, 1.3);
        let q2 = m.apply_q(q).unwrap();
        assert_relative_eq!(q2.re, 0.7);
        assert_relative_eq!(q2.im, 1.3);

        // Vanishing denominator
        let lens = RayMatrix::new(1.0, 0.0, -1.0, 1.0);
        assert!(lens.apply_q(Complex64::new(1.0, 0.0)).is_none());
    }
}
