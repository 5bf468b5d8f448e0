//! Miscellaneous numerical utilities.

use crate::math::{Real, Vector};

/// Computes two vectors which, combined with the unit vector `n`, form an
/// orthonormal basis.
///
/// This is the robust branchless construction from Pixar's
/// "Building an Orthonormal Basis, Revisited" paper.
pub fn orthonormal_basis(n: &Vector) -> [Vector; 2] {
    let sign = n.z.signum();
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    [
        Vector::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vector::new(b, sign + n.y * n.y * a, -n.y),
    ]
}

/// `sin(x)/x`, stable near zero.
#[inline]
pub(crate) fn sinc(x: Real) -> Real {
    // The quadratic approximation is accurate to one ulp below this cutoff.
    if x.abs() < 1.0e-4 {
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orthonormal_basis_is_orthonormal() {
        for n in [
            Vector::new(0.0, 0.0, 1.0),
            Vector::new(0.0, 0.0, -1.0),
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(1.0, -2.0, 3.0).normalize(),
            Vector::new(-0.3, 0.1, -0.94).normalize(),
        ] {
            let [p, q] = orthonormal_basis(&n);
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1.0e-12);
            assert_relative_eq!(q.norm(), 1.0, epsilon = 1.0e-12);
            assert_relative_eq!(p.dot(&n), 0.0, epsilon = 1.0e-12);
            assert_relative_eq!(q.dot(&n), 0.0, epsilon = 1.0e-12);
            assert_relative_eq!(p.dot(&q), 0.0, epsilon = 1.0e-12);
            // Right-handed: p × q = n.
            assert_relative_eq!(p.cross(&q), n, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn sinc_continuity() {
        assert_relative_eq!(sinc(0.0), 1.0);
        assert_relative_eq!(sinc(1.0e-4), sinc(1.001e-4), epsilon = 1.0e-10);
        assert_relative_eq!(sinc(0.5), 0.5f64.sin() / 0.5);
    }
}
