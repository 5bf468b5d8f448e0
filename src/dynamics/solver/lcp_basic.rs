//! Reference implementation of the Dantzig LCP solver.
//!
//! Same contract and same pivoting rule as [`solve_lcp`](super::solve_lcp),
//! but with the simplest possible bookkeeping: the index sets are plain
//! lists of the caller's row numbers, nothing is permuted, and the active
//! submatrix is re-factored from scratch for every search direction. It is
//! quadratically slower per operation and exists as the correctness oracle
//! the optimized solver is cross-checked against.

use crate::linalg::{factor_ldlt, solve_ldlt};
use crate::math::Real;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NState {
    Low,
    High,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    DrivenToZero,
    HitLow,
    HitHigh,
    NToC(usize),
    CToLow(usize),
    CToHigh(usize),
}

/// Computes `delta_x[C] = -dir·A[C,C]⁻¹·A[C,i]` by gathering and factoring
/// the active submatrix afresh.
fn solve1(
    n: usize,
    a: &[Real],
    c_set: &[usize],
    i: usize,
    dir: Real,
    delta_x: &mut [Real],
) {
    let nc = c_set.len();
    if nc == 0 {
        return;
    }
    let mut l = vec![0.0; nc * nc];
    let mut d = vec![0.0; nc];
    for (r, &cr) in c_set.iter().enumerate() {
        for (s, &cs) in c_set.iter().enumerate().take(r) {
            l[r * nc + s] = a[cr * n + cs];
        }
        d[r] = a[cr * n + cr];
    }
    factor_ldlt(&mut l, &mut d, nc, nc);

    let mut rhs: Vec<Real> = c_set.iter().map(|&c| a[c * n + i]).collect();
    solve_ldlt(&l, &d, &mut rhs, nc, nc);

    for (r, &c) in c_set.iter().enumerate() {
        delta_x[c] = -dir * rhs[r];
    }
}

/// Solves the box-constrained LCP `A·x = b + w`; see
/// [`solve_lcp`](super::solve_lcp) for the contract. Slow reference version.
pub fn solve_lcp_basic(
    n: usize,
    a: &mut [Real],
    x: &mut [Real],
    b: &mut [Real],
    w: &mut [Real],
    nub: usize,
    lo: &mut [Real],
    hi: &mut [Real],
    findex: &mut [Option<usize>],
) {
    assert!(nub <= n, "nub cannot exceed the problem size");
    if n == 0 {
        return;
    }

    x[..n].fill(0.0);
    w[..n].fill(0.0);

    let mut c_set: Vec<usize> = Vec::with_capacity(n);
    let mut n_set: Vec<usize> = Vec::with_capacity(n);
    let mut state = vec![NState::Low; n];
    let mut delta_x = vec![0.0; n];
    let mut delta_w = vec![0.0; n];

    // The unbounded prefix is solved directly.
    if nub > 0 {
        let mut l = vec![0.0; nub * nub];
        let mut d = vec![0.0; nub];
        for i in 0..nub {
            for j in 0..i {
                l[i * nub + j] = a[i * n + j];
            }
            d[i] = a[i * n + i];
        }
        factor_ldlt(&mut l, &mut d, nub, nub);
        let mut rhs = b[..nub].to_vec();
        solve_ldlt(&l, &d, &mut rhs, nub, nub);
        x[..nub].copy_from_slice(&rhs);
        c_set.extend(0..nub);
    }
    if nub >= n {
        return;
    }

    // Friction-coupled rows are processed after everything else.
    let order: Vec<usize> = (nub..n)
        .filter(|&i| findex[i].is_none())
        .chain((nub..n).filter(|&i| findex[i].is_some()))
        .collect();

    let mut breakdown = false;
    for &i in &order {
        if breakdown {
            x[i] = 0.0;
            w[i] = 0.0;
            continue;
        }

        if let Some(target) = findex[i] {
            let target_force = x[target];
            if target_force == 0.0 {
                hi[i] = 0.0;
                lo[i] = 0.0;
            } else {
                hi[i] = (hi[i] * target_force).abs();
                lo[i] = -hi[i];
            }
        }

        w[i] = (0..n).map(|j| a[i * n + j] * x[j]).sum::<Real>() - b[i];

        if lo[i] == 0.0 && w[i] >= 0.0 {
            state[i] = NState::Low;
            n_set.push(i);
            continue;
        }
        if hi[i] == 0.0 && w[i] <= 0.0 {
            state[i] = NState::High;
            n_set.push(i);
            continue;
        }
        if w[i] == 0.0 {
            c_set.push(i);
            continue;
        }

        loop {
            let dirf: Real = if w[i] <= 0.0 { 1.0 } else { -1.0 };

            solve1(n, a, &c_set, i, dirf, &mut delta_x);

            for &j in &n_set {
                delta_w[j] = c_set
                    .iter()
                    .map(|&c| a[j * n + c] * delta_x[c])
                    .sum::<Real>()
                    + dirf * a[j * n + i];
            }
            delta_w[i] = c_set
                .iter()
                .map(|&c| a[i * n + c] * delta_x[c])
                .sum::<Real>()
                + dirf * a[i * n + i];

            let mut cmd = Step::DrivenToZero;
            let mut s = -w[i] / delta_w[i];
            if dirf > 0.0 {
                if hi[i] < Real::INFINITY {
                    let s2 = hi[i] - x[i];
                    if s2 < s {
                        s = s2;
                        cmd = Step::HitHigh;
                    }
                }
            } else if lo[i] > -Real::INFINITY {
                let s2 = x[i] - lo[i];
                if s2 < s {
                    s = s2;
                    cmd = Step::HitLow;
                }
            }
            for &j in &n_set {
                let leaving = match state[j] {
                    NState::Low => delta_w[j] < 0.0,
                    NState::High => delta_w[j] > 0.0,
                };
                if leaving && !(lo[j] == 0.0 && hi[j] == 0.0) {
                    let s2 = -w[j] / delta_w[j];
                    if s2 < s {
                        s = s2;
                        cmd = Step::NToC(j);
                    }
                }
            }
            for &j in &c_set[nub.min(c_set.len())..] {
                if delta_x[j] < 0.0 && lo[j] > -Real::INFINITY {
                    let s2 = (lo[j] - x[j]) / delta_x[j];
                    if s2 < s {
                        s = s2;
                        cmd = Step::CToLow(j);
                    }
                } else if delta_x[j] > 0.0 && hi[j] < Real::INFINITY {
                    let s2 = (hi[j] - x[j]) / delta_x[j];
                    if s2 < s {
                        s = s2;
                        cmd = Step::CToHigh(j);
                    }
                }
            }

            if s <= 0.0 {
                log::warn!("LCP (reference) internal error, s <= 0 (s={:.4e})", s);
                x[i] = 0.0;
                w[i] = 0.0;
                breakdown = true;
                break;
            }

            for &c in &c_set {
                x[c] += s * delta_x[c];
            }
            x[i] += s * dirf;
            for &j in &n_set {
                w[j] += s * delta_w[j];
            }
            w[i] += s * delta_w[i];

            match cmd {
                Step::DrivenToZero => {
                    w[i] = 0.0;
                    c_set.push(i);
                    break;
                }
                Step::HitLow => {
                    x[i] = lo[i];
                    state[i] = NState::Low;
                    n_set.push(i);
                    break;
                }
                Step::HitHigh => {
                    x[i] = hi[i];
                    state[i] = NState::High;
                    n_set.push(i);
                    break;
                }
                Step::NToC(j) => {
                    w[j] = 0.0;
                    n_set.retain(|&k| k != j);
                    c_set.push(j);
                }
                Step::CToLow(j) => {
                    x[j] = lo[j];
                    state[j] = NState::Low;
                    c_set.retain(|&k| k != j);
                    n_set.push(j);
                }
                Step::CToHigh(j) => {
                    x[j] = hi[j];
                    state[j] = NState::High;
                    c_set.retain(|&k| k != j);
                    n_set.push(j);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_dimensional_cases() {
        // Unconstrained: x = b / a.
        let solve = |lo0: Real, hi0: Real, b0: Real| {
            let mut a = vec![2.0];
            let mut b = vec![b0];
            let mut lo = vec![lo0];
            let mut hi = vec![hi0];
            let mut fi = vec![None];
            let mut x = vec![0.0];
            let mut w = vec![0.0];
            solve_lcp_basic(
                1, &mut a, &mut x, &mut b, &mut w, 0, &mut lo, &mut hi, &mut fi,
            );
            (x[0], w[0])
        };

        let (x, w) = solve(-Real::INFINITY, Real::INFINITY, 3.0);
        assert_relative_eq!(x, 1.5);
        assert_relative_eq!(w, 0.0, epsilon = 1.0e-12);

        // Clamped at the high bound; residual must push further (w < 0).
        let (x, w) = solve(-1.0, 1.0, 3.0);
        assert_relative_eq!(x, 1.0);
        assert!(w < 0.0);

        // Contact-style: negative b keeps x at zero with w >= 0.
        let (x, w) = solve(0.0, Real::INFINITY, -3.0);
        assert_relative_eq!(x, 0.0);
        assert!(w >= 0.0);
    }

    #[test]
    fn two_blocks_decouple() {
        // Block-diagonal A: each variable behaves like the 1D case.
        let mut a = vec![2.0, 0.0, 0.0, 4.0];
        let mut b = vec![3.0, -2.0];
        let mut lo = vec![0.0, 0.0];
        let mut hi = vec![Real::INFINITY, Real::INFINITY];
        let mut fi = vec![None, None];
        let mut x = vec![0.0; 2];
        let mut w = vec![0.0; 2];
        solve_lcp_basic(
            2, &mut a, &mut x, &mut b, &mut w, 0, &mut lo, &mut hi, &mut fi,
        );
        assert_relative_eq!(x[0], 1.5);
        assert_relative_eq!(x[1], 0.0);
        assert_relative_eq!(w[1], 2.0, epsilon = 1.0e-12);
    }
}
