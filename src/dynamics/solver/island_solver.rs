//! Per-island constraint assembly, solve and integration.
//!
//! For one island this: queries every joint's row count, orders the joints
//! so unbounded rows lead, assembles `A = J·M⁻¹·Jᵀ + cfm/h` and the
//! velocity-level right hand side, hands the system to the LCP solver,
//! converts the resulting constraint forces back onto the bodies and
//! integrates them.
//!
//! Two assembly strategies produce the same numbers: [`StepMethod::Dense`]
//! materializes the full Jacobian and inverse-mass matrices and multiplies
//! them naively, [`StepMethod::BlockSparse`] walks the per-body joint
//! adjacency and only touches the 6-wide blocks that are actually non-zero.
//! The dense path is the cross-check oracle for the sparse one.

use crate::dynamics::joint::ConstraintRow;
use crate::dynamics::solver::solve_lcp;
use crate::dynamics::{
    IntegrationParameters, JointHandle, JointSet, RigidBodyFlags, RigidBodyHandle, RigidBodySet,
};
use crate::math::{Matrix, Real, Vector, SPATIAL_DIM};
use na::{DMatrix, DVector};

/// Which assembly implementation [`step_island`] uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StepMethod {
    /// Exploit the two-bodies-per-joint sparsity.
    BlockSparse,
    /// Straightforward dense matrices; the reference implementation.
    Dense,
}

struct ActiveJoint {
    handle: JointHandle,
    m: usize,
    nub: usize,
    ofs: usize,
    body1: usize,
    body2: Option<usize>,
}

/// Advances one island by `h`.
pub(crate) fn step_island(
    bodies: &mut RigidBodySet,
    joints: &mut JointSet,
    island_bodies: &[RigidBodyHandle],
    island_joints: &[JointHandle],
    gravity: &Vector,
    params: &IntegrationParameters,
    h: Real,
    method: StepMethod,
) {
    let nb = island_bodies.len();
    let fps = 1.0 / h;

    /*
     * Per-body preparation: world-space inverse inertia, gyroscopic torque,
     * gravity.
     */
    let mut inv_mass = vec![0.0; nb];
    let mut inv_inertia = vec![Matrix::zeros(); nb];
    for (idx, &hb) in island_bodies.iter().enumerate() {
        let body = &mut bodies[hb];
        debug_assert_eq!(body.local_index, idx);
        inv_mass[idx] = body.mprops.inv_mass;
        inv_inertia[idx] = body.world_inv_inertia();

        // Gyroscopic term: the inertia tensor rotates with the body.
        let i_world = body.world_inertia();
        let gyro = body.angvel.cross(&(i_world * body.angvel));
        body.torque -= gyro;

        if !body.flags.contains(RigidBodyFlags::GRAVITY_EXEMPT) {
            body.force += gravity * body.mprops.mass;
        }
    }

    /*
     * Row counting and joint ordering: joints whose rows are all unbounded
     * first, then mixed, then fully bounded. The LCP solver folds the
     * leading unbounded rows straight into its factorization.
     */
    let mut active: Vec<ActiveJoint> = Vec::with_capacity(island_joints.len());
    for &jh in island_joints {
        let info = {
            let joint = joints.get_mut(jh).expect("island joint disappeared");
            joint.info1(bodies)
        };
        if info.m == 0 {
            continue;
        }
        let joint = &joints[jh];
        let h1 = joint.body1.expect("active joint with no body");
        active.push(ActiveJoint {
            handle: jh,
            m: info.m,
            nub: info.nub,
            ofs: 0,
            body1: bodies[h1].local_index,
            body2: joint.body2.map(|h| bodies[h].local_index),
        });
    }

    let mut ordered: Vec<ActiveJoint> = Vec::with_capacity(active.len());
    let mut mixed: Vec<ActiveJoint> = Vec::new();
    let mut bounded: Vec<ActiveJoint> = Vec::new();
    for aj in active {
        if aj.nub == aj.m {
            ordered.push(aj);
        } else if aj.nub > 0 {
            mixed.push(aj);
        } else {
            bounded.push(aj);
        }
    }
    let nub_total: usize = ordered.iter().map(|aj| aj.m).sum();
    ordered.append(&mut mixed);
    ordered.append(&mut bounded);

    let mut m_total = 0;
    for aj in &mut ordered {
        aj.ofs = m_total;
        m_total += aj.m;
    }

    let mut lambda = vec![0.0; m_total];
    let mut rows = vec![ConstraintRow::with_cfm(params.cfm); m_total];

    if m_total > 0 {
        /*
         * Row filling, with friction indices re-based from joint-local to
         * island row numbering.
         */
        for aj in &ordered {
            let joint = joints.get_mut(aj.handle).expect("island joint disappeared");
            joint.info2(h, params, bodies, &mut rows[aj.ofs..aj.ofs + aj.m]);
        }
        for aj in &ordered {
            for r in aj.ofs..aj.ofs + aj.m {
                if let Some(local) = rows[r].findex {
                    debug_assert!(local < aj.m);
                    rows[r].findex = Some(aj.ofs + local);
                }
            }
        }

        /*
         * Assemble A and the right hand side, and solve.
         */
        let (mut a, mut rhs) = match method {
            StepMethod::BlockSparse => assemble_sparse(
                &ordered, &rows, bodies, island_bodies, &inv_mass, &inv_inertia, fps,
            ),
            StepMethod::Dense => assemble_dense(
                &ordered, &rows, bodies, island_bodies, &inv_mass, &inv_inertia, fps,
            ),
        };
        for i in 0..m_total {
            a[i * m_total + i] += rows[i].cfm * fps;
        }

        let mut w = vec![0.0; m_total];
        let mut lo: Vec<Real> = rows.iter().map(|r| r.lo).collect();
        let mut hi: Vec<Real> = rows.iter().map(|r| r.hi).collect();
        let mut findex: Vec<Option<usize>> = rows.iter().map(|r| r.findex).collect();
        solve_lcp(
            m_total, &mut a, &mut lambda, &mut rhs, &mut w, nub_total, &mut lo, &mut hi,
            &mut findex,
        );
    }

    /*
     * Constraint forces back onto the bodies (J'·λ), plus joint feedback.
     */
    let mut cforce_lin = vec![Vector::zeros(); nb];
    let mut cforce_ang = vec![Vector::zeros(); nb];
    for aj in &ordered {
        let mut f1 = Vector::zeros();
        let mut t1 = Vector::zeros();
        let mut f2 = Vector::zeros();
        let mut t2 = Vector::zeros();
        for r in aj.ofs..aj.ofs + aj.m {
            let l = lambda[r];
            f1 += rows[r].j1_linear * l;
            t1 += rows[r].j1_angular * l;
            if aj.body2.is_some() {
                f2 += rows[r].j2_linear * l;
                t2 += rows[r].j2_angular * l;
            }
        }
        cforce_lin[aj.body1] += f1;
        cforce_ang[aj.body1] += t1;
        if let Some(b2) = aj.body2 {
            cforce_lin[b2] += f2;
            cforce_ang[b2] += t2;
        }

        let joint = joints.get_mut(aj.handle).expect("island joint disappeared");
        if let Some(feedback) = &mut joint.feedback {
            feedback.force1 = f1;
            feedback.torque1 = t1;
            feedback.force2 = f2;
            feedback.torque2 = t2;
        }
    }

    /*
     * Velocity update, integration, and accumulator reset.
     */
    for (idx, &hb) in island_bodies.iter().enumerate() {
        let body = &mut bodies[hb];
        let total_force = cforce_lin[idx] + body.force;
        let total_torque = cforce_ang[idx] + body.torque;
        body.linvel += total_force * (inv_mass[idx] * h);
        body.angvel += inv_inertia[idx] * total_torque * h;

        body.integrate(h);
        body.clear_forces();
    }
}

/// `A = J·M⁻¹·Jᵀ` and `rhs = c·fps - J·(M⁻¹·f_ext + v·fps)`, exploiting the
/// per-joint block structure.
fn assemble_sparse(
    ordered: &[ActiveJoint],
    rows: &[ConstraintRow],
    bodies: &RigidBodySet,
    island_bodies: &[RigidBodyHandle],
    inv_mass: &[Real],
    inv_inertia: &[Matrix],
    fps: Real,
) -> (Vec<Real>, Vec<Real>) {
    let nb = island_bodies.len();
    let m_total = rows.len();

    // J·M⁻¹, stored row-by-row in the same block layout as J itself.
    struct JInvMRow {
        lin1: Vector,
        ang1: Vector,
        lin2: Vector,
        ang2: Vector,
    }
    let mut jinvm: Vec<JInvMRow> = Vec::with_capacity(m_total);
    for aj in ordered {
        for r in aj.ofs..aj.ofs + aj.m {
            jinvm.push(JInvMRow {
                lin1: rows[r].j1_linear * inv_mass[aj.body1],
                ang1: inv_inertia[aj.body1] * rows[r].j1_angular,
                lin2: aj
                    .body2
                    .map(|b2| rows[r].j2_linear * inv_mass[b2])
                    .unwrap_or_else(Vector::zeros),
                ang2: aj
                    .body2
                    .map(|b2| inv_inertia[b2] * rows[r].j2_angular)
                    .unwrap_or_else(Vector::zeros),
            });
        }
    }

    // Which of the (at most two) Jacobian blocks of each joint touches a
    // given body.
    let mut body_joints: Vec<Vec<usize>> = vec![Vec::new(); nb];
    for (idx, aj) in ordered.iter().enumerate() {
        body_joints[aj.body1].push(idx);
        if let Some(b2) = aj.body2 {
            body_joints[b2].push(idx);
        }
    }

    let block_of = |aj: &ActiveJoint, body: usize, r: usize| -> (Vector, Vector) {
        if aj.body1 == body {
            (rows[r].j1_linear, rows[r].j1_angular)
        } else {
            (rows[r].j2_linear, rows[r].j2_angular)
        }
    };
    let jinvm_block_of = |aj: &ActiveJoint, body: usize, r: usize| -> (Vector, Vector) {
        if aj.body1 == body {
            (jinvm[r].lin1, jinvm[r].ang1)
        } else {
            (jinvm[r].lin2, jinvm[r].ang2)
        }
    };

    // A's lower triangle, block pair by block pair: two joints interact
    // once per body they share.
    let mut a = vec![0.0; m_total * m_total];
    for (i, aj_i) in ordered.iter().enumerate() {
        let sides = [Some(aj_i.body1), aj_i.body2];
        for body in sides.into_iter().flatten() {
            for &j in &body_joints[body] {
                if j > i {
                    continue;
                }
                let aj_j = &ordered[j];
                for r in aj_i.ofs..aj_i.ofs + aj_i.m {
                    let (ilin, iang) = jinvm_block_of(aj_i, body, r);
                    for c in aj_j.ofs..aj_j.ofs + aj_j.m {
                        let (jlin, jang) = block_of(aj_j, body, c);
                        a[r * m_total + c] += ilin.dot(&jlin) + iang.dot(&jang);
                    }
                }
            }
        }
    }
    // Mirror into the upper triangle (diagonal blocks are symmetric, so the
    // overwrite is harmless).
    for r in 0..m_total {
        for c in 0..r {
            a[c * m_total + r] = a[r * m_total + c];
        }
    }

    // rhs = c·fps - J·(M⁻¹·f_ext + v·fps).
    let mut tmp_lin = vec![Vector::zeros(); nb];
    let mut tmp_ang = vec![Vector::zeros(); nb];
    for (idx, &hb) in island_bodies.iter().enumerate() {
        let body = &bodies[hb];
        tmp_lin[idx] = body.force * inv_mass[idx] + body.linvel * fps;
        tmp_ang[idx] = inv_inertia[idx] * body.torque + body.angvel * fps;
    }
    let mut rhs = vec![0.0; m_total];
    for aj in ordered {
        for r in aj.ofs..aj.ofs + aj.m {
            let mut jv = rows[r].j1_linear.dot(&tmp_lin[aj.body1])
                + rows[r].j1_angular.dot(&tmp_ang[aj.body1]);
            if let Some(b2) = aj.body2 {
                jv += rows[r].j2_linear.dot(&tmp_lin[b2]) + rows[r].j2_angular.dot(&tmp_ang[b2]);
            }
            rhs[r] = rows[r].rhs * fps - jv;
        }
    }

    (a, rhs)
}

/// Same contract as [`assemble_sparse`], computed with explicit dense
/// matrices.
fn assemble_dense(
    ordered: &[ActiveJoint],
    rows: &[ConstraintRow],
    bodies: &RigidBodySet,
    island_bodies: &[RigidBodyHandle],
    inv_mass: &[Real],
    inv_inertia: &[Matrix],
    fps: Real,
) -> (Vec<Real>, Vec<Real>) {
    let nb = island_bodies.len();
    let m_total = rows.len();
    let dim = nb * SPATIAL_DIM;

    // The full constraint Jacobian.
    let mut j = DMatrix::<Real>::zeros(m_total, dim);
    for aj in ordered {
        for r in aj.ofs..aj.ofs + aj.m {
            for k in 0..3 {
                j[(r, aj.body1 * SPATIAL_DIM + k)] = rows[r].j1_linear[k];
                j[(r, aj.body1 * SPATIAL_DIM + 3 + k)] = rows[r].j1_angular[k];
            }
            if let Some(b2) = aj.body2 {
                for k in 0..3 {
                    j[(r, b2 * SPATIAL_DIM + k)] = rows[r].j2_linear[k];
                    j[(r, b2 * SPATIAL_DIM + 3 + k)] = rows[r].j2_angular[k];
                }
            }
        }
    }

    // The block-diagonal inverse mass matrix.
    let mut inv_m = DMatrix::<Real>::zeros(dim, dim);
    for idx in 0..nb {
        for k in 0..3 {
            inv_m[(idx * SPATIAL_DIM + k, idx * SPATIAL_DIM + k)] = inv_mass[idx];
        }
        for r in 0..3 {
            for c in 0..3 {
                inv_m[(idx * SPATIAL_DIM + 3 + r, idx * SPATIAL_DIM + 3 + c)] =
                    inv_inertia[idx][(r, c)];
            }
        }
    }

    let a_mat = &j * &inv_m * j.transpose();

    // v·fps + M⁻¹·f_ext, stacked.
    let mut ext = DVector::<Real>::zeros(dim);
    for (idx, &hb) in island_bodies.iter().enumerate() {
        let body = &bodies[hb];
        let lin = body.force * inv_mass[idx] + body.linvel * fps;
        let ang = inv_inertia[idx] * body.torque + body.angvel * fps;
        for k in 0..3 {
            ext[idx * SPATIAL_DIM + k] = lin[k];
            ext[idx * SPATIAL_DIM + 3 + k] = ang[k];
        }
    }
    let jv = &j * &ext;

    let mut a = vec![0.0; m_total * m_total];
    for r in 0..m_total {
        for c in 0..m_total {
            a[r * m_total + c] = a_mat[(r, c)];
        }
    }
    let rhs: Vec<Real> = (0..m_total).map(|r| rows[r].rhs * fps - jv[r]).collect();

    (a, rhs)
}
