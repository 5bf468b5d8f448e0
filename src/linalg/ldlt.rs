//! LDLᵀ factorization of dense symmetric matrices, with the incremental
//! update and removal kernels needed to maintain a factorization while
//! variables enter and leave the active set of the LCP solver.
//!
//! All matrices are row-major slices with an explicit leading dimension
//! (`skip`), so a factorization can live inside a larger scratch buffer and
//! sub-views can be taken by slicing. `L` is unit lower triangular (the
//! diagonal is implicit and never stored); `d` stores the *reciprocals* of
//! the diagonal of `D`. Only the strictly lower triangle of `L` is ever read
//! or written.

use crate::math::Real;

/// Factors `A = L·D·Lᵀ` in place.
///
/// On entry the strictly lower triangle of `l` must hold the strictly lower
/// triangle of `A` and `d` must hold the diagonal of `A`. On exit `l` holds
/// the unit lower factor and `d` the reciprocal diagonal of `D`.
pub fn factor_ldlt(l: &mut [Real], d: &mut [Real], n: usize, skip: usize) {
    for i in 0..n {
        for j in 0..i {
            let mut sum = l[i * skip + j];
            for k in 0..j {
                sum -= l[i * skip + k] * l[j * skip + k] / d[k];
            }
            l[i * skip + j] = sum * d[j];
        }
        let mut diag = d[i];
        for k in 0..i {
            let v = l[i * skip + k];
            diag -= v * v / d[k];
        }
        d[i] = 1.0 / diag;
    }
}

/// Solves `L·x = b` in place, where `L` is unit lower triangular.
pub fn solve_l1(l: &[Real], b: &mut [Real], n: usize, skip: usize) {
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * skip + k] * b[k];
        }
        b[i] = sum;
    }
}

/// Solves `Lᵀ·x = b` in place, where `L` is unit lower triangular.
pub fn solve_l1t(l: &[Real], b: &mut [Real], n: usize, skip: usize) {
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in i + 1..n {
            sum -= l[k * skip + i] * b[k];
        }
        b[i] = sum;
    }
}

/// Solves `L·D·Lᵀ·x = b` in place given a factorization from [`factor_ldlt`].
pub fn solve_ldlt(l: &[Real], d: &[Real], b: &mut [Real], n: usize, skip: usize) {
    solve_l1(l, b, n, skip);
    for i in 0..n {
        b[i] *= d[i];
    }
    solve_l1t(l, b, n, skip);
}

/// Updates an `n`-sized factorization `L·D·Lᵀ = A` to account for the
/// symmetric "top-left border" modification
///
/// ```text
///          [ a[0]  aᵀ ]
///   A  +=  [ a     0  ]        with a = a[1..n]
/// ```
///
/// expressed as the pair of rank-1 updates `w₁w₁ᵀ - w₂w₂ᵀ` with
/// `w₁ = (a[0]/2 + 1, a[1..]) / √2` and `w₂ = (a[0]/2 - 1, a[1..]) / √2`.
/// The left column of `L` and `d[0]` are *not* updated; callers remove that
/// row/column immediately afterwards (see [`ldlt_remove`]).
pub fn ldlt_add_tl(l: &mut [Real], d: &mut [Real], a: &[Real], n: usize, skip: usize) {
    if n < 2 {
        return;
    }

    let sqrt_half = std::f64::consts::FRAC_1_SQRT_2;
    let mut w1 = vec![0.0; n];
    let mut w2 = vec![0.0; n];
    for j in 1..n {
        w1[j] = a[j] * sqrt_half;
        w2[j] = a[j] * sqrt_half;
    }
    let w11 = (0.5 * a[0] + 1.0) * sqrt_half;
    let w21 = (0.5 * a[0] - 1.0) * sqrt_half;

    let mut alpha1 = 1.0;
    let mut alpha2 = 1.0;

    // Process the virtual first column: only the w workspaces are updated,
    // since column 0 of L is about to be removed anyway.
    let mut dee = d[0];
    let mut alphanew = alpha1 + (w11 * w11) * dee;
    dee /= alphanew;
    let gamma1 = w11 * dee;
    dee *= alpha1;
    alpha1 = alphanew;
    alphanew = alpha2 - (w21 * w21) * dee;
    dee /= alphanew;
    let gamma2 = w21 * dee;
    alpha2 = alphanew;
    let k1 = 1.0 - w21 * gamma1;
    let k2 = w21 * gamma1 * w11 - w21;
    for p in 1..n {
        let wp = w1[p];
        let ell = l[p * skip];
        w1[p] = wp - w11 * ell;
        w2[p] = k1 * wp + k2 * ell;
    }

    for j in 1..n {
        let mut dee = d[j];
        let mut alphanew = alpha1 + (w1[j] * w1[j]) * dee;
        dee /= alphanew;
        let gamma1 = w1[j] * dee;
        dee *= alpha1;
        alpha1 = alphanew;
        alphanew = alpha2 - (w2[j] * w2[j]) * dee;
        dee /= alphanew;
        let gamma2 = w2[j] * dee;
        dee *= alpha2;
        d[j] = dee;
        alpha2 = alphanew;

        for p in j + 1..n {
            let mut ell = l[p * skip + j];
            let wp1 = w1[p] - w1[j] * ell;
            ell += gamma1 * wp1;
            w1[p] = wp1;
            let wp2 = w2[p] - w2[j] * ell;
            ell -= gamma2 * wp2;
            w2[p] = wp2;
            l[p * skip + j] = ell;
        }
    }
}

/// Shifts the rows below and the columns right of row/column `r` up and left
/// by one, erasing row/column `r` from an `n`-sized lower-triangular
/// factorization stored with leading dimension `skip`.
pub fn remove_row_col(l: &mut [Real], n: usize, skip: usize, r: usize) {
    if r >= n - 1 {
        return;
    }
    for i in r + 1..n {
        // Row i moves up to i-1: columns < r stay put, columns > r shift left.
        let (src, dst) = (i * skip, (i - 1) * skip);
        for j in 0..r {
            l[dst + j] = l[src + j];
        }
        for j in r + 1..i.min(n) {
            l[dst + j - 1] = l[src + j];
        }
    }
}

/// Removes the variable at factorization position `r` from an `n2`-sized
/// `L·D·Lᵀ` factorization of the symmetric matrix selected by
/// `a[order[i] * a_skip + order[j]]`.
///
/// `order` maps factorization positions to rows/columns of `a`; the caller
/// is responsible for updating it afterwards. This is the downdate half of
/// the solver's incremental factorization maintenance: the row/column is
/// first neutralized with a border update ([`ldlt_add_tl`]) and then snipped
/// out of the triangle.
pub fn ldlt_remove(
    a: &[Real],
    a_skip: usize,
    order: &[usize],
    l: &mut [Real],
    d: &mut [Real],
    n2: usize,
    skip: usize,
    r: usize,
) {
    debug_assert!(r < n2);
    if r == n2 - 1 {
        return; // deleting the last row/col is easy
    }

    let geta = |i: usize, j: usize| a[order[i] * a_skip + order[j]];

    if r == 0 {
        let mut row = vec![0.0; n2];
        for i in 0..n2 {
            row[i] = -geta(i, 0);
        }
        row[0] += 1.0;
        ldlt_add_tl(l, d, &row, n2, skip);
    } else {
        let mut t = vec![0.0; r];
        for i in 0..r {
            t[i] = l[r * skip + i] / d[i];
        }
        let mut row = vec![0.0; n2 - r];
        for i in 0..n2 - r {
            let mut dot = 0.0;
            for k in 0..r {
                dot += l[(r + i) * skip + k] * t[k];
            }
            row[i] = dot - geta(r + i, r);
        }
        row[0] += 1.0;
        ldlt_add_tl(&mut l[r * skip + r..], &mut d[r..], &row, n2 - r, skip);
    }

    remove_row_col(l, n2, skip, r);
    if r < n2 - 1 {
        d.copy_within(r + 1..n2, r);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    // A random symmetric positive definite matrix (M·Mᵀ + n·I), row-major.
    fn random_spd(rng: &mut Pcg64, n: usize) -> Vec<Real> {
        let m: Vec<Real> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut a = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                let mut sum = if i == j { n as Real } else { 0.0 };
                for k in 0..n {
                    sum += m[i * n + k] * m[j * n + k];
                }
                a[i * n + j] = sum;
            }
        }
        a
    }

    fn factor_of(a: &[Real], n: usize) -> (Vec<Real>, Vec<Real>) {
        let mut l = vec![0.0; n * n];
        let mut d = vec![0.0; n];
        for i in 0..n {
            for j in 0..i {
                l[i * n + j] = a[i * n + j];
            }
            d[i] = a[i * n + i];
        }
        factor_ldlt(&mut l, &mut d, n, n);
        (l, d)
    }

    // Reconstruct L·D·Lᵀ.
    fn reconstruct(l: &[Real], d: &[Real], n: usize, skip: usize) -> Vec<Real> {
        let mut a = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for k in 0..n {
                    let lik = if k < i {
                        l[i * skip + k]
                    } else if k == i {
                        1.0
                    } else {
                        0.0
                    };
                    let ljk = if k < j {
                        l[j * skip + k]
                    } else if k == j {
                        1.0
                    } else {
                        0.0
                    };
                    sum += lik * ljk / d[k];
                }
                a[i * n + j] = sum;
            }
        }
        a
    }

    #[test]
    fn factor_and_solve() {
        let mut rng = Pcg64::seed_from_u64(7);
        for n in [1, 2, 3, 5, 12] {
            let a = random_spd(&mut rng, n);
            let (l, d) = factor_of(&a, n);

            let recon = reconstruct(&l, &d, n, n);
            for i in 0..n * n {
                assert_relative_eq!(recon[i], a[i], max_relative = 1.0e-9, epsilon = 1.0e-9);
            }

            let b: Vec<Real> = (0..n).map(|i| (i as Real) - 1.5).collect();
            let mut x = b.clone();
            solve_ldlt(&l, &d, &mut x, n, n);
            for i in 0..n {
                let mut ax = 0.0;
                for j in 0..n {
                    ax += a[i * n + j] * x[j];
                }
                assert_relative_eq!(ax, b[i], max_relative = 1.0e-8, epsilon = 1.0e-8);
            }
        }
    }

    #[test]
    fn remove_matches_fresh_factorization() {
        let mut rng = Pcg64::seed_from_u64(11);
        for n in [3usize, 6, 10] {
            for r in [0usize, 1, n / 2, n - 2] {
                let a = random_spd(&mut rng, n);
                let (mut l, mut d) = factor_of(&a, n);

                let order: Vec<usize> = (0..n).collect();
                ldlt_remove(&a, n, &order, &mut l, &mut d, n, n, r);

                // Fresh factorization of A with row/column r deleted.
                let m = n - 1;
                let mut sub = vec![0.0; m * m];
                let keep: Vec<usize> = (0..n).filter(|&i| i != r).collect();
                for i in 0..m {
                    for j in 0..m {
                        sub[i * m + j] = a[keep[i] * n + keep[j]];
                    }
                }
                let (l2, d2) = factor_of(&sub, m);

                for i in 0..m {
                    assert_relative_eq!(
                        1.0 / d[i],
                        1.0 / d2[i],
                        max_relative = 1.0e-7,
                        epsilon = 1.0e-9
                    );
                    for j in 0..i {
                        assert_relative_eq!(
                            l[i * n + j],
                            l2[i * m + j],
                            max_relative = 1.0e-7,
                            epsilon = 1.0e-9
                        );
                    }
                }
            }
        }
    }
}
