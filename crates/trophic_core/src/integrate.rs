//! Time-integration driver.
//!
//! Advances a model over `n_steps` of nominal step size `h` using the
//! embedded Tsit5 scheme with adaptive step control. The nominal step is an
//! upper bound on the internal step, so a run records at least `n_steps`
//! accepted samples; the controller inserts smaller steps wherever the
//! embedded error estimate demands them.

use crate::error::{ConfigError, EngineError};
use crate::solvers::Tsit5;
use crate::traits::DynamicalSystem;
use rand::Rng;

/// Biomass density below which a species is treated as extinct between
/// integration segments.
pub const EXTINCTION_THRESHOLD: f64 = 1e-10;

/// Ordered (time, state) samples from one integration call. State vectors
/// are stored flat, row-major.
#[derive(Debug, Clone)]
pub struct Trajectory {
    dim: usize,
    times: Vec<f64>,
    states: Vec<f64>,
}

impl Trajectory {
    fn with_capacity(dim: usize, samples: usize) -> Self {
        Self {
            dim,
            times: Vec::with_capacity(samples),
            states: Vec::with_capacity(samples * dim),
        }
    }

    fn push(&mut self, t: f64, state: &[f64]) {
        debug_assert_eq!(state.len(), self.dim);
        self.times.push(t);
        self.states.extend_from_slice(state);
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn state(&self, sample: usize) -> &[f64] {
        &self.states[sample * self.dim..(sample + 1) * self.dim]
    }

    pub fn final_state(&self) -> &[f64] {
        self.state(self.len() - 1)
    }

    pub fn final_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Extracts the time series of one state variable.
    pub fn component(&self, var: usize) -> Vec<f64> {
        self.states
            .iter()
            .skip(var)
            .step_by(self.dim)
            .copied()
            .collect()
    }

    /// Keeps the trailing `fraction` of simulated time: samples with
    /// `t >= t_end - fraction * (t_end - t_start)`. This is the long-run
    /// analysis window; everything before it is burn-in.
    pub fn tail_window(&self, fraction: f64) -> Trajectory {
        let first = *self.times.first().unwrap_or(&0.0);
        let last = *self.times.last().unwrap_or(&0.0);
        let cutoff = last - fraction * (last - first);
        let start = self.times.partition_point(|&t| t < cutoff);
        Trajectory {
            dim: self.dim,
            times: self.times[start..].to_vec(),
            states: self.states[start * self.dim..].to_vec(),
        }
    }
}

/// Weighted RMS norm of the error estimate with atol = rtol = `tolerance`.
fn error_norm(err: &[f64], previous: &[f64], proposed: &[f64], tolerance: f64) -> f64 {
    let mut accum = 0.0;
    for i in 0..err.len() {
        let scale = tolerance * (1.0 + previous[i].abs().max(proposed[i].abs()));
        let ratio = err[i] / scale;
        accum += ratio * ratio;
    }
    (accum / err.len() as f64).sqrt()
}

/// Integrates `system` from `initial` over `n_steps * h` time units,
/// recording every accepted step.
pub fn integrate(
    system: &impl DynamicalSystem<f64>,
    initial: &[f64],
    t0: f64,
    n_steps: usize,
    h: f64,
    tolerance: f64,
) -> Result<Trajectory, EngineError> {
    if n_steps == 0 {
        return Err(ConfigError::HorizonLength.into());
    }
    if !(h > 0.0 && h.is_finite()) {
        return Err(ConfigError::StepLength(h).into());
    }
    if !(tolerance > 0.0) {
        return Err(ConfigError::Tolerance(tolerance).into());
    }
    let dim = system.dimension();
    if initial.len() != dim {
        return Err(EngineError::DimensionMismatch {
            expected: dim,
            got: initial.len(),
        });
    }

    let t_end = t0 + n_steps as f64 * h;
    let mut solver = Tsit5::new(dim);
    let mut trajectory = Trajectory::with_capacity(dim, n_steps + 1);
    let mut state = initial.to_vec();
    let mut trial = vec![0.0; dim];
    let mut err = vec![0.0; dim];
    let mut t = t0;
    let mut dt = h;

    trajectory.push(t, &state);

    // The loop tolerates a sub-nanostep residue at the horizon so float
    // accumulation in t cannot force a spurious underflow on the last step.
    while t_end - t > 1e-9 * h {
        dt = dt.min(h).min(t_end - t);
        if dt < 1e-12 * t.abs().max(1.0) {
            return Err(EngineError::StepUnderflow { t, dt });
        }

        trial.copy_from_slice(&state);
        let mut t_trial = t;
        solver.step_with_error(system, &mut t_trial, &mut trial, dt, &mut err);

        let norm = error_norm(&err, &state, &trial, tolerance);
        if norm <= 1.0 {
            t = t_trial;
            state.copy_from_slice(&trial);
            trajectory.push(t, &state);
        }

        // Classic fifth-order controller, clamped so a single decision
        // never moves the step by more than a factor of five.
        let factor = (0.9 * norm.max(1e-16).powf(-0.2)).clamp(0.2, 5.0);
        dt *= factor;
    }

    Ok(trajectory)
}

/// Outcome of a segmented (resumed) integration run.
#[derive(Debug, Clone)]
pub struct SegmentedRun {
    /// Trajectory of the final segment only; earlier segments are burn-in
    /// and are not retained.
    pub last_segment: Trajectory,
    /// Final state after extinction clamping.
    pub final_state: Vec<f64>,
}

/// Builds one long effective trajectory from `segments` chained calls of
/// `steps_per_segment` steps each, carrying the final state of one segment
/// into the next. After every segment, any component that fell below
/// [`EXTINCTION_THRESHOLD`] is forced to exactly 0 and held there for all
/// later segments: an extinct species cannot spontaneously reappear.
pub fn integrate_segmented(
    system: &impl DynamicalSystem<f64>,
    initial: &[f64],
    segments: usize,
    steps_per_segment: usize,
    h: f64,
    tolerance: f64,
) -> Result<SegmentedRun, EngineError> {
    if segments == 0 {
        return Err(ConfigError::SegmentCount.into());
    }
    if steps_per_segment == 0 {
        return Err(ConfigError::SegmentLength.into());
    }

    let dim = system.dimension();
    let mut state = initial.to_vec();
    let mut extinct = vec![false; dim];
    let mut t = 0.0;

    let clamp = |state: &mut [f64], extinct: &mut [bool]| {
        for i in 0..state.len() {
            if extinct[i] {
                state[i] = 0.0;
            } else if state[i] < EXTINCTION_THRESHOLD {
                state[i] = 0.0;
                extinct[i] = true;
            }
        }
    };

    let mut last_segment = integrate(system, &state, t, steps_per_segment, h, tolerance)?;
    t = last_segment.final_time();
    state.copy_from_slice(last_segment.final_state());
    clamp(&mut state, &mut extinct);

    for _ in 1..segments {
        last_segment = integrate(system, &state, t, steps_per_segment, h, tolerance)?;
        t = last_segment.final_time();
        state.copy_from_slice(last_segment.final_state());
        clamp(&mut state, &mut extinct);
    }

    Ok(SegmentedRun {
        last_segment,
        final_state: state,
    })
}

/// Fresh initial conditions for a non-resumed run: each state variable
/// drawn independently from U(0.1, 1.0).
pub fn draw_initial_state(dim: usize, rng: &mut impl Rng) -> Vec<f64> {
    (0..dim).map(|_| rng.gen_range(0.1..1.0)).collect()
}
