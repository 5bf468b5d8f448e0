//! A direct solver for box-constrained Linear Complementarity Problems,
//! using Dantzig's pivoting rule.
//!
//! Given a symmetric positive semi-definite `A`, solve
//!
//! ```text
//!   A·x = b + w
//! ```
//!
//! such that for every index `i` one of the following holds:
//!
//! * `x[i] = lo[i]` and `w[i] >= 0`,
//! * `x[i] = hi[i]` and `w[i] <= 0`,
//! * `lo[i] < x[i] < hi[i]` and `w[i] = 0`.
//!
//! The first `nub` variables must satisfy `lo = -∞`, `hi = +∞`; they are
//! folded into the active set by a direct factor-and-solve before pivoting
//! starts.
//!
//! An entry `findex[i] = Some(k)` makes the bounds of row `i` a *ratio* of
//! the solved value of row `k` (`lo/hi` are rescaled to `∓|hi[i]·x[k]|`
//! when row `i` is reached), which is how contact friction bounds follow
//! the still-unknown normal force. Such rows are deferred until last.
//!
//! The variables are kept partitioned as `[ C | N | not yet seen ]` by
//! physically swapping rows and columns of `A` (and all companion arrays),
//! with the mapping back to the caller's numbering kept in an explicit
//! permutation vector. `A[C,C]` carries a running LDLᵀ factorization:
//! entering `C` appends a factor row; leaving it applies a symmetric
//! downdate ([`ldlt_remove`]).

use crate::linalg::{factor_ldlt, ldlt_remove, solve_l1, solve_l1t, solve_ldlt};
use crate::math::Real;

/// Which bound a variable in set `N` rests on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NState {
    Low,
    High,
}

/// What bounded the largest feasible step of one pivoting iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    /// `w[i]` reached zero: the driving variable joins `C`.
    DrivenToZero,
    /// `x[i]` reached its low bound: the driving variable joins `N`.
    HitLow,
    /// `x[i]` reached its high bound: the driving variable joins `N`.
    HitHigh,
    /// `w` of the member of `N` given by the payload reached zero.
    NToC(usize),
    /// `x` of the member of `C` given by the payload reached its low bound.
    CToLow(usize),
    /// `x` of the member of `C` given by the payload reached its high bound.
    CToHigh(usize),
}

struct Lcp<'a> {
    n: usize,
    nub: usize,
    a: &'a mut [Real],
    x: &'a mut [Real],
    b: &'a mut [Real],
    w: &'a mut [Real],
    lo: &'a mut [Real],
    hi: &'a mut [Real],
    findex: &'a mut [Option<usize>],
    state: Vec<NState>,
    /// `p[current position] = caller's index`.
    p: Vec<usize>,
    /// `corder[k]` = current position of the variable backing factor row
    /// `k`. Identical to `k` until removals shuffle it.
    corder: Vec<usize>,
    l: Vec<Real>,
    d: Vec<Real>,
    // Workspaces reused across iterations; `dell`/`ell` persist between a
    // `solve1` and the `transfer_i_to_c` that may follow so the computed
    // factor row can be appended without being recomputed.
    dell: Vec<Real>,
    ell: Vec<Real>,
    scratch: Vec<Real>,
    n_c: usize,
    n_n: usize,
}

impl<'a> Lcp<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        n: usize,
        nub: usize,
        a: &'a mut [Real],
        x: &'a mut [Real],
        b: &'a mut [Real],
        w: &'a mut [Real],
        lo: &'a mut [Real],
        hi: &'a mut [Real],
        findex: &'a mut [Option<usize>],
    ) -> Self {
        let mut lcp = Self {
            n,
            nub,
            a,
            x,
            b,
            w,
            lo,
            hi,
            findex,
            state: vec![NState::Low; n],
            p: (0..n).collect(),
            corder: Vec::with_capacity(n),
            l: vec![0.0; n * n],
            d: vec![0.0; n],
            dell: vec![0.0; n],
            ell: vec![0.0; n],
            scratch: vec![0.0; n],
            n_c: 0,
            n_n: 0,
        };

        // The unbounded prefix goes straight into C with a direct
        // factor-and-solve.
        if nub > 0 {
            for i in 0..nub {
                for j in 0..i {
                    lcp.l[i * n + j] = lcp.a[i * n + j];
                }
                lcp.d[i] = lcp.a[i * n + i];
            }
            factor_ldlt(&mut lcp.l, &mut lcp.d, nub, n);
            lcp.x[..nub].copy_from_slice(&lcp.b[..nub]);
            solve_ldlt(&lcp.l, &lcp.d, &mut lcp.x[..nub], nub, n);
            for i in 0..nub {
                lcp.w[i] = 0.0;
                lcp.corder.push(i);
            }
            lcp.n_c = nub;
        }

        // Defer friction-coupled rows to the very end so the rows they
        // depend on are solved by the time they are reached.
        let mut at_end = 0;
        let mut k = n;
        while k > nub {
            k -= 1;
            if k < n - at_end && lcp.findex[k].is_some() {
                lcp.swap_problem(k, n - 1 - at_end);
                at_end += 1;
            }
        }

        lcp
    }

    /// Swaps the variables at current positions `i1` and `i2`.
    fn swap_problem(&mut self, i1: usize, i2: usize) {
        if i1 == i2 {
            return;
        }
        let n = self.n;
        for k in 0..n {
            self.a.swap(i1 * n + k, i2 * n + k);
        }
        for k in 0..n {
            self.a.swap(k * n + i1, k * n + i2);
        }
        self.x.swap(i1, i2);
        self.b.swap(i1, i2);
        self.w.swap(i1, i2);
        self.lo.swap(i1, i2);
        self.hi.swap(i1, i2);
        self.state.swap(i1, i2);
        self.findex.swap(i1, i2);
        self.p.swap(i1, i2);
    }

    #[inline]
    fn aii(&self, i: usize) -> Real {
        self.a[i * self.n + i]
    }

    /// `A[i, C]·q[C]` (over current positions).
    fn ai_c_times_q(&self, i: usize, q: &[Real]) -> Real {
        let row = &self.a[i * self.n..i * self.n + self.n_c];
        row.iter().zip(&q[..self.n_c]).map(|(a, q)| a * q).sum()
    }

    /// `A[i, N]·q[N]`.
    fn ai_n_times_q(&self, i: usize, q: &[Real]) -> Real {
        let (start, end) = (self.n_c, self.n_c + self.n_n);
        let row = &self.a[i * self.n + start..i * self.n + end];
        row.iter().zip(&q[start..end]).map(|(a, q)| a * q).sum()
    }

    /// For every `j` in `N`: `out[j] = A[j, C]·q[C]`.
    fn n_equals_a_nc_times_q(&self, out: &mut [Real], q: &[Real]) {
        for j in self.n_c..self.n_c + self.n_n {
            out[j] = self.ai_c_times_q(j, q);
        }
    }

    /// For every `j` in `N`: `out[j] += sign·A[j, i]`.
    fn n_plus_equals_a_ni(&self, out: &mut [Real], i: usize, sign: Real) {
        for j in self.n_c..self.n_c + self.n_n {
            // A is kept symmetric through the swaps, so read along row i.
            out[j] += sign * self.a[i * self.n + j];
        }
    }

    /// Computes the search direction for driving variable `i`:
    /// `delta_x[C] = -dir·A[C,C]⁻¹·A[C,i]`, leaving the intermediate
    /// substitutions in `dell`/`ell` for a subsequent factor-row append.
    fn solve1(&mut self, delta_x: &mut [Real], i: usize, dir: Real, only_transfer: bool) {
        if self.n_c == 0 {
            return;
        }
        for (k, &cpos) in self.corder.iter().enumerate() {
            self.dell[k] = self.a[i * self.n + cpos];
        }
        solve_l1(&self.l, &mut self.dell, self.n_c, self.n);
        for k in 0..self.n_c {
            self.ell[k] = self.dell[k] * self.d[k];
        }

        if !only_transfer {
            self.scratch[..self.n_c].copy_from_slice(&self.ell[..self.n_c]);
            solve_l1t(&self.l, &mut self.scratch, self.n_c, self.n);
            for (k, &cpos) in self.corder.iter().enumerate() {
                delta_x[cpos] = -dir * self.scratch[k];
            }
        }
    }

    /// Moves the driving variable at position `i` into `C`, appending a row
    /// to the factorization from the `dell`/`ell` left by `solve1`.
    fn transfer_i_to_c(&mut self, i: usize) {
        if self.n_c > 0 {
            let nc = self.n_c;
            let dot: Real = (0..nc).map(|k| self.ell[k] * self.dell[k]).sum();
            self.l[nc * self.n..nc * self.n + nc].copy_from_slice(&self.ell[..nc]);
            self.d[nc] = 1.0 / (self.aii(i) - dot);
        } else {
            self.d[0] = 1.0 / self.aii(i);
        }
        self.swap_problem(i, self.n_c);
        self.corder.push(self.n_c);
        self.n_c += 1;
    }

    /// Moves the driving variable at position `i` into `N`.
    fn transfer_i_to_n(&mut self, i: usize) {
        self.swap_problem(i, self.n_c + self.n_n);
        self.n_n += 1;
    }

    /// Moves the variable at position `i` (a member of `N`) into `C`.
    fn transfer_i_from_n_to_c(&mut self, i: usize) {
        if self.n_c > 0 {
            let nc = self.n_c;
            for (k, &cpos) in self.corder.iter().enumerate() {
                self.dell[k] = self.a[i * self.n + cpos];
            }
            solve_l1(&self.l, &mut self.dell, nc, self.n);
            let mut dot = 0.0;
            for k in 0..nc {
                self.ell[k] = self.dell[k] * self.d[k];
                dot += self.ell[k] * self.dell[k];
            }
            self.l[nc * self.n..nc * self.n + nc].copy_from_slice(&self.ell[..nc]);
            self.d[nc] = 1.0 / (self.aii(i) - dot);
        } else {
            self.d[0] = 1.0 / self.aii(i);
        }
        self.swap_problem(i, self.n_c);
        self.corder.push(self.n_c);
        self.n_c += 1;
        self.n_n -= 1;
    }

    /// Moves the variable at position `i` (a member of `C`) into `N`,
    /// downdating the factorization.
    fn transfer_i_from_c_to_n(&mut self, i: usize) {
        let k = self
            .corder
            .iter()
            .position(|&c| c == i)
            .expect("variable to remove is not in C");

        ldlt_remove(
            self.a,
            self.n,
            &self.corder,
            &mut self.l,
            &mut self.d,
            self.n_c,
            self.n,
            k,
        );

        // The variable at the last C position is about to move into the
        // removed one's slot; rename its factor entry accordingly.
        let last = self.n_c - 1;
        for c in self.corder.iter_mut() {
            if *c == last {
                *c = i;
                break;
            }
        }
        self.corder.remove(k);

        self.swap_problem(i, last);
        self.n_c -= 1;
        self.n_n += 1;
    }
}

/// Solves the box-constrained LCP `A·x = b + w` (see the module docs).
///
/// `a` is an `n×n` row-major matrix. All inputs except `n` are used as
/// scratch and destroyed, apart from `x` and `w` which receive the solution
/// in the caller's original row order.
///
/// If the pivoting breaks down (a non-positive step on a badly conditioned
/// problem), a warning is logged, the remaining unknowns are zero-filled and
/// the partial solution is returned rather than looping forever.
pub fn solve_lcp(
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
    assert!(a.len() >= n * n);
    assert!(
        x.len() >= n
            && b.len() >= n
            && w.len() >= n
            && lo.len() >= n
            && hi.len() >= n
            && findex.len() >= n
    );
    if n == 0 {
        return;
    }

    x[..n].fill(0.0);
    w[..n].fill(0.0);

    // If every variable is unbounded the problem is a plain linear solve.
    if nub >= n {
        let mut l = vec![0.0; n * n];
        let mut d = vec![0.0; n];
        for i in 0..n {
            for j in 0..i {
                l[i * n + j] = a[i * n + j];
            }
            d[i] = a[i * n + i];
        }
        factor_ldlt(&mut l, &mut d, n, n);
        x[..n].copy_from_slice(&b[..n]);
        solve_ldlt(&l, &d, &mut x[..n], n, n);
        return;
    }

    let mut lcp = Lcp::new(n, nub, a, x, b, w, lo, hi, findex);
    let mut delta_x = vec![0.0; n];
    let mut delta_w = vec![0.0; n];

    for i in nub..n {
        // Positions before `i` are all in C or N; `i` is the driving index
        // and everything beyond it has not been looked at yet.
        debug_assert_eq!(lcp.n_c + lcp.n_n, i);

        // A friction-coupled row's bounds become a ratio of its target
        // row's already-solved value, looked up through the permutation.
        if let Some(target) = lcp.findex[i] {
            for j in 0..n {
                lcp.scratch[lcp.p[j]] = lcp.x[j];
            }
            let target_force = lcp.scratch[target];
            if target_force == 0.0 {
                lcp.hi[i] = 0.0;
                lcp.lo[i] = 0.0;
            } else {
                lcp.hi[i] = (lcp.hi[i] * target_force).abs();
                lcp.lo[i] = -lcp.hi[i];
            }
        }

        // w has not been maintained for indices past the frontier.
        lcp.w[i] = lcp.ai_c_times_q(i, lcp.x) + lcp.ai_n_times_q(i, lcp.x) - lcp.b[i];

        // Already on a valid complementarity line?
        if lcp.lo[i] == 0.0 && lcp.w[i] >= 0.0 {
            lcp.state[i] = NState::Low;
            lcp.transfer_i_to_n(i);
            continue;
        }
        if lcp.hi[i] == 0.0 && lcp.w[i] <= 0.0 {
            lcp.state[i] = NState::High;
            lcp.transfer_i_to_n(i);
            continue;
        }
        if lcp.w[i] == 0.0 {
            // Degenerate but valid: x is strictly inside its (non-empty)
            // bounds with zero residual. The factor row still has to be
            // computed before the transfer.
            lcp.solve1(&mut delta_x, i, 0.0, true);
            lcp.transfer_i_to_c(i);
            continue;
        }

        // Push x[i] and w[i] towards the feasible line, carrying the rest
        // of the active set along, until index i itself lands on it.
        loop {
            let dirf: Real = if lcp.w[i] <= 0.0 { 1.0 } else { -1.0 };

            lcp.solve1(&mut delta_x, i, dirf, false);
            lcp.n_equals_a_nc_times_q(&mut delta_w, &delta_x);
            lcp.n_plus_equals_a_ni(&mut delta_w, i, dirf);
            delta_w[i] = lcp.ai_c_times_q(i, &delta_x) + lcp.aii(i) * dirf;

            // Largest feasible step: the driving variable reaching its own
            // line, or any other variable reaching the edge of its set.
            let mut cmd = Step::DrivenToZero;
            let mut s = -lcp.w[i] / delta_w[i];
            if dirf > 0.0 {
                if lcp.hi[i] < Real::INFINITY {
                    let s2 = lcp.hi[i] - lcp.x[i];
                    if s2 < s {
                        s = s2;
                        cmd = Step::HitHigh;
                    }
                }
            } else if lcp.lo[i] > -Real::INFINITY {
                let s2 = lcp.x[i] - lcp.lo[i];
                if s2 < s {
                    s = s2;
                    cmd = Step::HitLow;
                }
            }
            for k in lcp.n_c..lcp.n_c + lcp.n_n {
                let leaving = match lcp.state[k] {
                    NState::Low => delta_w[k] < 0.0,
                    NState::High => delta_w[k] > 0.0,
                };
                if leaving {
                    // A pinned row (lo = hi = 0) can never re-enter C.
                    if lcp.lo[k] == 0.0 && lcp.hi[k] == 0.0 {
                        continue;
                    }
                    let s2 = -lcp.w[k] / delta_w[k];
                    if s2 < s {
                        s = s2;
                        cmd = Step::NToC(k);
                    }
                }
            }
            for k in lcp.nub..lcp.n_c {
                if delta_x[k] < 0.0 && lcp.lo[k] > -Real::INFINITY {
                    let s2 = (lcp.lo[k] - lcp.x[k]) / delta_x[k];
                    if s2 < s {
                        s = s2;
                        cmd = Step::CToLow(k);
                    }
                } else if delta_x[k] > 0.0 && lcp.hi[k] < Real::INFINITY {
                    let s2 = (lcp.hi[k] - lcp.x[k]) / delta_x[k];
                    if s2 < s {
                        s = s2;
                        cmd = Step::CToHigh(k);
                    }
                }
            }

            if s <= 0.0 {
                // Solver breakdown; should not happen on a well-posed
                // problem. Truncate instead of spinning forever.
                log::warn!("LCP internal error, s <= 0 (s={:.4e})", s);
                for j in i..n {
                    lcp.x[j] = 0.0;
                    lcp.w[j] = 0.0;
                }
                unpermute(&mut lcp);
                return;
            }

            // Take the step.
            for j in 0..lcp.n_c {
                lcp.x[j] += s * delta_x[j];
            }
            lcp.x[i] += s * dirf;
            for j in lcp.n_c..lcp.n_c + lcp.n_n {
                lcp.w[j] += s * delta_w[j];
            }
            lcp.w[i] += s * delta_w[i];

            match cmd {
                Step::DrivenToZero => {
                    lcp.w[i] = 0.0;
                    lcp.transfer_i_to_c(i);
                    break;
                }
                Step::HitLow => {
                    lcp.x[i] = lcp.lo[i];
                    lcp.state[i] = NState::Low;
                    lcp.transfer_i_to_n(i);
                    break;
                }
                Step::HitHigh => {
                    lcp.x[i] = lcp.hi[i];
                    lcp.state[i] = NState::High;
                    lcp.transfer_i_to_n(i);
                    break;
                }
                Step::NToC(si) => {
                    lcp.w[si] = 0.0;
                    lcp.transfer_i_from_n_to_c(si);
                }
                Step::CToLow(si) => {
                    lcp.x[si] = lcp.lo[si];
                    lcp.state[si] = NState::Low;
                    lcp.transfer_i_from_c_to_n(si);
                }
                Step::CToHigh(si) => {
                    lcp.x[si] = lcp.hi[si];
                    lcp.state[si] = NState::High;
                    lcp.transfer_i_from_c_to_n(si);
                }
            }
        }
    }

    unpermute(&mut lcp);
}

/// Restores `x` and `w` to the caller's original row order.
fn unpermute(lcp: &mut Lcp<'_>) {
    let n = lcp.n;
    for j in 0..n {
        lcp.scratch[lcp.p[j]] = lcp.x[j];
    }
    lcp.x[..n].copy_from_slice(&lcp.scratch[..n]);
    for j in 0..n {
        lcp.scratch[lcp.p[j]] = lcp.w[j];
    }
    lcp.w[..n].copy_from_slice(&lcp.scratch[..n]);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::solver::lcp_basic::solve_lcp_basic;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    pub(crate) fn random_spd(rng: &mut Pcg64, n: usize) -> Vec<Real> {
        let m: Vec<Real> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut a = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                let mut sum = if i == j { 0.5 } else { 0.0 };
                for k in 0..n {
                    sum += m[i * n + k] * m[j * n + k];
                }
                a[i * n + j] = sum;
            }
        }
        a
    }

    fn check_solution(
        n: usize,
        a: &[Real],
        b: &[Real],
        lo: &[Real],
        hi: &[Real],
        x: &[Real],
        w: &[Real],
    ) {
        let tol: Real = 1.0e-7;
        for i in 0..n {
            // Residual definition: w = A·x - b.
            let mut ax = 0.0;
            for j in 0..n {
                ax += a[i * n + j] * x[j];
            }
            assert_relative_eq!(ax - b[i], w[i], max_relative = 1.0e-6, epsilon = 1.0e-6);

            // Complementarity: each variable sits on a valid part of its
            // line (friction rows are checked against rescaled bounds by
            // the cross-validation test instead).
            let on_lo = (x[i] - lo[i]).abs() <= tol.max(lo[i].abs() * tol);
            let on_hi = (x[i] - hi[i]).abs() <= tol.max(hi[i].abs() * tol);
            let interior = x[i] > lo[i] - tol && x[i] < hi[i] + tol;
            if on_lo {
                assert!(w[i] >= -1.0e-6, "w[{}] = {} must be >= 0 at lo", i, w[i]);
            } else if on_hi {
                assert!(w[i] <= 1.0e-6, "w[{}] = {} must be <= 0 at hi", i, w[i]);
            } else {
                assert!(interior, "x[{}] = {} outside [{}, {}]", i, x[i], lo[i], hi[i]);
                assert!(w[i].abs() <= 1.0e-6, "w[{}] = {} must be 0 inside", i, w[i]);
            }
        }
    }

    fn solve_fast(
        n: usize,
        a: &[Real],
        b: &[Real],
        nub: usize,
        lo: &[Real],
        hi: &[Real],
        findex: &[Option<usize>],
    ) -> (Vec<Real>, Vec<Real>) {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        let mut lo = lo.to_vec();
        let mut hi = hi.to_vec();
        let mut findex = findex.to_vec();
        let mut x = vec![0.0; n];
        let mut w = vec![0.0; n];
        solve_lcp(
            n, &mut a, &mut x, &mut b, &mut w, nub, &mut lo, &mut hi, &mut findex,
        );
        (x, w)
    }

    #[test]
    fn unbounded_problem_is_a_linear_solve() {
        let mut rng = Pcg64::seed_from_u64(1);
        let n = 8;
        let a = random_spd(&mut rng, n);
        let b: Vec<Real> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let lo = vec![-Real::INFINITY; n];
        let hi = vec![Real::INFINITY; n];
        let findex = vec![None; n];

        let (x, w) = solve_fast(n, &a, &b, n, &lo, &hi, &findex);
        check_solution(n, &a, &b, &lo, &hi, &x, &w);
        for wi in &w {
            assert_relative_eq!(*wi, 0.0, epsilon = 1.0e-7);
        }
    }

    #[test]
    fn boxed_problems_satisfy_complementarity() {
        let mut rng = Pcg64::seed_from_u64(2);
        for trial in 0..40 {
            let n = rng.gen_range(1..14);
            let nub = rng.gen_range(0..=n / 2);
            let a = random_spd(&mut rng, n);
            let b: Vec<Real> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let mut lo = vec![-Real::INFINITY; n];
            let mut hi = vec![Real::INFINITY; n];
            for i in nub..n {
                match rng.gen_range(0..3) {
                    0 => {
                        lo[i] = 0.0; // contact-style
                    }
                    1 => {
                        lo[i] = -rng.gen_range(0.1..1.0);
                        hi[i] = rng.gen_range(0.1..1.0);
                    }
                    _ => (), // unbounded but not in the nub prefix
                }
            }
            let findex = vec![None; n];

            let (x, w) = solve_fast(n, &a, &b, nub, &lo, &hi, &findex);
            check_solution(n, &a, &b, &lo, &hi, &x, &w);
            let _ = trial;
        }
    }

    #[test]
    fn friction_rows_get_force_proportional_bounds() {
        // A 3-row contact-like system: one normal row (lo = 0), two
        // friction rows whose bounds are 0.5·|normal force|.
        let mut rng = Pcg64::seed_from_u64(3);
        let n = 3;
        let a = random_spd(&mut rng, n);
        let b = vec![1.0, 0.8, -0.9];
        let lo = vec![0.0, -0.5, -0.5];
        let hi = vec![Real::INFINITY, 0.5, 0.5];
        let findex = vec![None, Some(0), Some(0)];

        let (x, w) = solve_fast(n, &a, &b, 0, &lo, &hi, &findex);

        assert!(x[0] >= -1.0e-9, "normal force must be non-negative");
        let bound = 0.5 * x[0];
        for i in 1..3 {
            assert!(
                x[i].abs() <= bound + 1.0e-7,
                "friction force {} exceeds µ·normal {}",
                x[i],
                bound
            );
            // Inside the cone the slide velocity must vanish.
            if x[i].abs() < bound - 1.0e-7 {
                assert_relative_eq!(w[i], 0.0, epsilon = 1.0e-6);
            }
        }
    }

    #[test]
    fn agrees_with_reference_implementation() {
        let mut rng = Pcg64::seed_from_u64(4);
        for _trial in 0..60 {
            let n = rng.gen_range(1..16);
            let nub = rng.gen_range(0..=n);
            let a = random_spd(&mut rng, n);
            let b: Vec<Real> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let mut lo = vec![-Real::INFINITY; n];
            let mut hi = vec![Real::INFINITY; n];
            let mut findex: Vec<Option<usize>> = vec![None; n];

            let mut normal_rows = vec![];
            for i in nub..n {
                match rng.gen_range(0..4) {
                    0 => {
                        lo[i] = 0.0;
                        normal_rows.push(i);
                    }
                    1 => {
                        lo[i] = -rng.gen_range(0.1..1.0);
                        hi[i] = rng.gen_range(0.1..1.0);
                    }
                    2 if !normal_rows.is_empty() => {
                        // Friction row coupled to a previous normal row.
                        let t = normal_rows[rng.gen_range(0..normal_rows.len())];
                        lo[i] = -0.7;
                        hi[i] = 0.7;
                        findex[i] = Some(t);
                    }
                    _ => (),
                }
            }

            let (x1, w1) = solve_fast(n, &a, &b, nub, &lo, &hi, &findex);

            let mut a2 = a.clone();
            let mut b2 = b.clone();
            let mut lo2 = lo.clone();
            let mut hi2 = hi.clone();
            let mut fi2 = findex.clone();
            let mut x2 = vec![0.0; n];
            let mut w2 = vec![0.0; n];
            solve_lcp_basic(
                n, &mut a2, &mut x2, &mut b2, &mut w2, nub, &mut lo2, &mut hi2, &mut fi2,
            );

            for i in 0..n {
                assert_relative_eq!(x1[i], x2[i], max_relative = 1.0e-7, epsilon = 1.0e-7);
                assert_relative_eq!(w1[i], w2[i], max_relative = 1.0e-7, epsilon = 1.0e-7);
            }
        }
    }
}
