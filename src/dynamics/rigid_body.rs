//! Rigid bodies and their mass properties.

use crate::math::{Matrix, Quaternion, Real, Rotation, Vector};
use crate::utils;

bitflags::bitflags! {
    /// Flags affecting the simulation behavior of a rigid body.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    pub struct RigidBodyFlags: u8 {
        /// The body takes no part in the simulation until re-enabled or
        /// reached by an active island.
        const DISABLED             = 0b0001;
        /// Gravity is not applied to this body.
        const GRAVITY_EXEMPT       = 0b0010;
        /// Integrate orientation with an exact finite rotation instead of
        /// the cheaper infinitesimal update.
        const FINITE_ROTATION      = 0b0100;
        /// Split the finite rotation about [`RigidBody::finite_rotation_axis`],
        /// integrating the orthogonal remainder infinitesimally.
        const FINITE_ROTATION_AXIS = 0b1000;
    }
}

/// The mass, center-aligned inertia tensor, and their inverses, expressed in
/// the body's local frame.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// The total mass.
    pub mass: Real,
    /// The inertia tensor about the center of mass, in local coordinates.
    pub local_inertia: Matrix,
    pub(crate) inv_mass: Real,
    pub(crate) local_inv_inertia: Matrix,
}

impl MassProperties {
    /// Creates mass properties from a total mass and a local-frame inertia
    /// tensor.
    ///
    /// Panics if the mass is not positive or the inertia tensor is singular;
    /// a body you cannot invert the mass of cannot be simulated.
    pub fn new(mass: Real, local_inertia: Matrix) -> Self {
        assert!(mass > 0.0, "rigid-body mass must be positive");
        let local_inv_inertia = local_inertia
            .try_inverse()
            .expect("rigid-body inertia tensor must be invertible");
        Self {
            mass,
            local_inertia,
            inv_mass: 1.0 / mass,
            local_inv_inertia,
        }
    }

    /// Mass properties of a solid ball of the given total mass and radius.
    pub fn ball(mass: Real, radius: Real) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Matrix::from_diagonal(&Vector::new(i, i, i)))
    }

    /// Mass properties of a solid cuboid of the given total mass and full
    /// extents.
    pub fn cuboid(mass: Real, extents: Vector) -> Self {
        let k = mass / 12.0;
        let (x2, y2, z2) = (
            extents.x * extents.x,
            extents.y * extents.y,
            extents.z * extents.z,
        );
        Self::new(
            mass,
            Matrix::from_diagonal(&Vector::new(k * (y2 + z2), k * (x2 + z2), k * (x2 + y2))),
        )
    }
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::new(1.0, Matrix::identity())
    }
}

/// A rigid body.
///
/// To create a new rigid body, use the [`RigidBodyBuilder`] structure.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBody {
    /// World-space position of the center of mass.
    pub(crate) position: Vector,
    /// World-space orientation.
    pub(crate) orientation: Rotation,
    /// Rotation matrix kept in sync with `orientation`.
    pub(crate) rotation: Matrix,
    pub(crate) linvel: Vector,
    pub(crate) angvel: Vector,
    /// Force accumulator, cleared at the end of every step.
    pub(crate) force: Vector,
    /// Torque accumulator, cleared at the end of every step.
    pub(crate) torque: Vector,
    pub(crate) mprops: MassProperties,
    pub(crate) flags: RigidBodyFlags,
    pub(crate) finite_rotation_axis: Vector,
    // Island bookkeeping, only meaningful while its timestamp matches the
    // island manager's.
    pub(crate) island_timestamp: u32,
    pub(crate) island_id: usize,
    pub(crate) local_index: usize,
}

impl RigidBody {
    pub(crate) fn new() -> Self {
        Self {
            position: Vector::zeros(),
            orientation: Rotation::identity(),
            rotation: Matrix::identity(),
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            force: Vector::zeros(),
            torque: Vector::zeros(),
            mprops: MassProperties::default(),
            flags: RigidBodyFlags::default(),
            finite_rotation_axis: Vector::z(),
            island_timestamp: 0,
            island_id: 0,
            local_index: 0,
        }
    }

    /// The world-space position of this body's center of mass.
    #[inline]
    pub fn position(&self) -> Vector {
        self.position
    }

    /// Sets the world-space position of this body's center of mass.
    #[inline]
    pub fn set_position(&mut self, position: Vector) {
        self.position = position;
    }

    /// The world-space orientation of this body.
    #[inline]
    pub fn orientation(&self) -> Rotation {
        self.orientation
    }

    /// Sets the world-space orientation of this body.
    pub fn set_orientation(&mut self, orientation: Rotation) {
        self.orientation = orientation;
        self.rotation = orientation.to_rotation_matrix().into_inner();
    }

    /// The rotation matrix equivalent to [`Self::orientation`].
    #[inline]
    pub fn rotation(&self) -> &Matrix {
        &self.rotation
    }

    /// Sets the orientation from a rotation matrix.
    pub fn set_rotation(&mut self, rotation: Matrix) {
        self.set_orientation(Rotation::from_matrix(&rotation));
    }

    /// The linear velocity of the center of mass.
    #[inline]
    pub fn linvel(&self) -> Vector {
        self.linvel
    }

    /// Sets the linear velocity of the center of mass.
    #[inline]
    pub fn set_linvel(&mut self, linvel: Vector) {
        self.linvel = linvel;
    }

    /// The angular velocity, in world space.
    #[inline]
    pub fn angvel(&self) -> Vector {
        self.angvel
    }

    /// Sets the angular velocity, in world space.
    #[inline]
    pub fn set_angvel(&mut self, angvel: Vector) {
        self.angvel = angvel;
    }

    /// The mass properties of this body.
    #[inline]
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mprops
    }

    /// Replaces the mass properties of this body.
    #[inline]
    pub fn set_mass_properties(&mut self, mprops: MassProperties) {
        self.mprops = mprops;
    }

    /// The behavior flags of this body.
    #[inline]
    pub fn flags(&self) -> RigidBodyFlags {
        self.flags
    }

    /// Is this body currently taking part in the simulation?
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.flags.contains(RigidBodyFlags::DISABLED)
    }

    /// Enables or disables this body.
    ///
    /// A disabled body never seeds a simulation island, but is re-enabled
    /// automatically if an active island reaches it through a joint.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(RigidBodyFlags::DISABLED, !enabled);
    }

    /// Exempts this body from gravity.
    pub fn set_gravity_exempt(&mut self, exempt: bool) {
        self.flags.set(RigidBodyFlags::GRAVITY_EXEMPT, exempt);
    }

    /// Selects finite-rotation integration for this body.
    ///
    /// Infinitesimal integration accumulates error at very large angular
    /// velocities; finite rotation is exact about a fixed axis.
    pub fn set_finite_rotation(&mut self, enabled: bool) {
        self.flags.set(RigidBodyFlags::FINITE_ROTATION, enabled);
    }

    /// Sets the axis the finite rotation is taken about. The component of
    /// the angular velocity orthogonal to this axis is integrated
    /// infinitesimally.
    ///
    /// Passing a zero vector reverts to an un-split finite rotation.
    pub fn set_finite_rotation_axis(&mut self, axis: Vector) {
        if let Some(axis) = axis.try_normalize(1.0e-12) {
            self.finite_rotation_axis = axis;
            self.flags.insert(RigidBodyFlags::FINITE_ROTATION_AXIS);
        } else {
            self.flags.remove(RigidBodyFlags::FINITE_ROTATION_AXIS);
        }
    }

    /// The current force accumulator.
    #[inline]
    pub fn force(&self) -> Vector {
        self.force
    }

    /// The current torque accumulator.
    #[inline]
    pub fn torque(&self) -> Vector {
        self.torque
    }

    /// Adds a force (in world space) through the center of mass, applied
    /// until the end of the next step.
    #[inline]
    pub fn add_force(&mut self, force: Vector) {
        self.force += force;
    }

    /// Adds a torque (in world space), applied until the end of the next
    /// step.
    #[inline]
    pub fn add_torque(&mut self, torque: Vector) {
        self.torque += torque;
    }

    /// Adds a force expressed in the body's local frame.
    pub fn add_local_force(&mut self, force: Vector) {
        self.force += self.rotation * force;
    }

    /// Adds a torque expressed in the body's local frame.
    pub fn add_local_torque(&mut self, torque: Vector) {
        self.torque += self.rotation * torque;
    }

    /// Adds a world-space force applied at a world-space point, accumulating
    /// both a force and the induced torque.
    pub fn add_force_at_point(&mut self, force: Vector, point: Vector) {
        self.force += force;
        self.torque += (point - self.position).cross(&force);
    }

    /// Adds a world-space force applied at a point given in the body's
    /// local frame.
    pub fn add_force_at_local_point(&mut self, force: Vector, local_point: Vector) {
        let point = self.point_to_world(local_point);
        self.add_force_at_point(force, point);
    }

    /// Clears the force and torque accumulators.
    pub fn clear_forces(&mut self) {
        self.force = Vector::zeros();
        self.torque = Vector::zeros();
    }

    /// Transforms a body-local point to world space.
    #[inline]
    pub fn point_to_world(&self, local: Vector) -> Vector {
        self.position + self.rotation * local
    }

    /// Transforms a world-space point to the body's local frame.
    #[inline]
    pub fn point_to_local(&self, world: Vector) -> Vector {
        self.rotation.transpose() * (world - self.position)
    }

    /// Transforms a body-local direction to world space.
    #[inline]
    pub fn vector_to_world(&self, local: Vector) -> Vector {
        self.rotation * local
    }

    /// Transforms a world-space direction to the body's local frame.
    #[inline]
    pub fn vector_to_local(&self, world: Vector) -> Vector {
        self.rotation.transpose() * world
    }

    /// The world-space inertia tensor for the current orientation.
    pub(crate) fn world_inertia(&self) -> Matrix {
        self.rotation * self.mprops.local_inertia * self.rotation.transpose()
    }

    /// The world-space inverse inertia tensor for the current orientation.
    pub(crate) fn world_inv_inertia(&self) -> Matrix {
        self.rotation * self.mprops.local_inv_inertia * self.rotation.transpose()
    }

    /// Advances position and orientation by `h` using the current
    /// velocities, then refreshes the cached rotation matrix.
    pub(crate) fn integrate(&mut self, h: Real) {
        self.position += self.linvel * h;

        if self.flags.contains(RigidBodyFlags::FINITE_ROTATION) {
            let (finite_w, infinitesimal_w) =
                if self.flags.contains(RigidBodyFlags::FINITE_ROTATION_AXIS) {
                    // Split the angular velocity into a component along the
                    // finite rotation axis and an orthogonal remainder.
                    let along = self.finite_rotation_axis * self.finite_rotation_axis.dot(&self.angvel);
                    (along, self.angvel - along)
                } else {
                    (self.angvel, Vector::zeros())
                };

            // Exact rotation by |finite_w|·h about finite_w.
            let h2 = h * 0.5;
            let theta = finite_w.norm() * h2;
            let s = utils::sinc(theta) * h2;
            let q = Quaternion::new(theta.cos(), finite_w.x * s, finite_w.y * s, finite_w.z * s);
            let mut next = q * self.orientation.into_inner();

            if infinitesimal_w != Vector::zeros() {
                next += w_to_dq(&infinitesimal_w, &next) * h;
            }
            self.orientation = Rotation::new_normalize(next);
        } else {
            let q = self.orientation.into_inner();
            self.orientation = Rotation::new_normalize(q + w_to_dq(&self.angvel, &q) * h);
        }

        self.rotation = self.orientation.to_rotation_matrix().into_inner();
    }
}

/// The quaternion derivative `dq/dt = ½·[0, ω]·q`.
fn w_to_dq(w: &Vector, q: &Quaternion) -> Quaternion {
    Quaternion::new(0.0, w.x, w.y, w.z) * q * 0.5
}

/// A builder for rigid bodies.
#[derive(Clone, Debug)]
#[must_use = "the builder does nothing unless `build` is called"]
pub struct RigidBodyBuilder {
    position: Vector,
    orientation: Rotation,
    linvel: Vector,
    angvel: Vector,
    mprops: MassProperties,
    flags: RigidBodyFlags,
}

impl RigidBodyBuilder {
    /// Starts building a rigid body at the origin with unit mass properties.
    pub fn new() -> Self {
        Self {
            position: Vector::zeros(),
            orientation: Rotation::identity(),
            linvel: Vector::zeros(),
            angvel: Vector::zeros(),
            mprops: MassProperties::default(),
            flags: RigidBodyFlags::default(),
        }
    }

    /// Sets the initial position of the center of mass.
    pub fn position(mut self, position: Vector) -> Self {
        self.position = position;
        self
    }

    /// Sets the initial orientation.
    pub fn orientation(mut self, orientation: Rotation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the initial linear velocity.
    pub fn linvel(mut self, linvel: Vector) -> Self {
        self.linvel = linvel;
        self
    }

    /// Sets the initial angular velocity.
    pub fn angvel(mut self, angvel: Vector) -> Self {
        self.angvel = angvel;
        self
    }

    /// Sets the mass properties.
    pub fn mass_properties(mut self, mprops: MassProperties) -> Self {
        self.mprops = mprops;
        self
    }

    /// Creates the body disabled.
    pub fn disabled(mut self) -> Self {
        self.flags.insert(RigidBodyFlags::DISABLED);
        self
    }

    /// Exempts the body from gravity.
    pub fn gravity_exempt(mut self) -> Self {
        self.flags.insert(RigidBodyFlags::GRAVITY_EXEMPT);
        self
    }

    /// Builds the rigid body.
    pub fn build(self) -> RigidBody {
        let mut body = RigidBody::new();
        body.set_position(self.position);
        body.set_orientation(self.orientation);
        body.linvel = self.linvel;
        body.angvel = self.angvel;
        body.mprops = self.mprops;
        body.flags = self.flags;
        body
    }
}

impl Default for RigidBodyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
