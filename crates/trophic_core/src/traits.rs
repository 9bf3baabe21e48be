use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type usable as the scalar of a dynamical system.
/// The solvers are written against this bound rather than `f64` directly so
/// that step arithmetic stays independent of the concrete float width.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// An autonomous-or-not system of ordinary differential equations.
///
/// Implementors are stateless: `apply` is a pure function of the state,
/// time, and the coefficients the implementor was constructed with. Each
/// sweep worker constructs its own instance, so no process-wide model
/// registration exists anywhere.
pub trait DynamicalSystem<T: Scalar> {
    /// Number of state variables (3 for the food chain, 10 for the web).
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer receiving dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A solver that can advance a system by one step.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt, updating `t` and `state` in place.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
