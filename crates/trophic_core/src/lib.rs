pub mod dataset;
pub mod error;
pub mod extrema;
pub mod integrate;
pub mod models;
pub mod params;
pub mod solvers;
/// The `trophic_core` crate is the simulation-and-sweep engine behind the
/// Trophic CLI. It integrates two population-dynamics topologies (a
/// 3-species food chain and a 10-species food web with a generalized
/// functional response shaped by the exponent q) across a sweep of
/// q-values, extracts long-run oscillation extrema or survival counts, and
/// assembles the results into the tabular datasets consumed by external
/// plotting tools.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric abstraction), `DynamicalSystem` (ODE
///   right-hand sides), `Steppable` (solvers).
/// - **Models**: the chain and web vector fields over their fixed diet
///   topologies.
/// - **Params**: allometric inputs mapped to model coefficients, including
///   the web's per-run random body-mass draws.
/// - **Integrate**: adaptive Tsit5 driver, analysis-window trimming, and
///   segmented runs with extinction clamping.
/// - **Extrema**: local-extrema detection and reduction.
/// - **Sweep**: shuffled partitioning, parallel chunk workers, fail-fast
///   merge.
/// - **Dataset**: typed record tables and the CSV boundary format.
pub mod sweep;
pub mod traits;
