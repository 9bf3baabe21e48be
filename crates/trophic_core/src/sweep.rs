//! Sweep orchestration.
//!
//! Partitions a shuffled q-range into near-equal chunks, dispatches each
//! chunk to an independent worker (one rayon task per chunk, no shared
//! mutable state), and merges the per-worker tables behind the collect
//! barrier. The partition is disjoint by construction, which is the entire
//! concurrency-safety argument: no q-value ever crosses a chunk boundary.
//!
//! Failure policy is fail-fast: the first worker error aborts the sweep and
//! reports the failing chunk index and q-value.

use crate::dataset::{
    BifurcationRecord, DiversityRecord, Table, CHAIN_BASENAMES, WEB_BASENAME,
};
use crate::error::{ConfigError, EngineError};
use crate::extrema::{local_extrema, reduce_extrema};
use crate::integrate::{draw_initial_state, integrate, integrate_segmented};
use crate::models::{ChainModel, WebModel, CHAIN_SPECIES, WEB_SPECIES};
use crate::params::{chain_coefficients, web_coefficients, EcologicalInputs};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Adaptive-step tolerance for chain runs.
pub const CHAIN_TOLERANCE: f64 = 1e-8;

/// Adaptive-step tolerance for web runs. Tighter: the 10-dimensional
/// dynamics are much more sensitive to error accumulation over the long
/// segmented horizons.
pub const WEB_TOLERANCE: f64 = 1e-12;

/// Full configuration of one sweep invocation. Validated eagerly, before
/// any simulation work is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Sweep points for the shaping exponent q.
    pub qrange: Vec<f64>,
    /// Integration horizon of a chain run, in nominal steps.
    pub ts_length: usize,
    /// Number of chained segments of a web run.
    pub ts_runs: usize,
    /// Nominal steps per web segment.
    pub ts_run_length: usize,
    /// Nominal step size h.
    pub steplength: f64,
    /// Trailing fraction of simulated time kept as the analysis window.
    pub analyze_ts: f64,
    /// Deduplicate extrema to unique values.
    pub unique_out: bool,
    /// Cap on retained extrema per species per q-value (0 = unbounded).
    pub max_out: usize,
    /// Worker (chunk) count, `noC`.
    pub workers: usize,
    /// Master seed: drives the q-range shuffle and all per-item generators.
    pub seed: u64,
    /// Shared allometric/ecological inputs.
    pub inputs: EcologicalInputs,
    /// Per-trophic-level body-mass ratio of the chain.
    pub mass_ratio: f64,
    /// Body-mass-ratio draw range (Rmin, Rmax) of the web.
    pub mass_ratio_range: (f64, f64),
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            qrange: Vec::new(),
            ts_length: 10_000,
            ts_runs: 10,
            ts_run_length: 1_000,
            steplength: 0.5,
            analyze_ts: 0.05,
            unique_out: true,
            max_out: 200,
            workers: default_worker_count(),
            seed: 0,
            inputs: EcologicalInputs::default(),
            mass_ratio: 100.0,
            mass_ratio_range: (10.0, 100.0),
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qrange.is_empty() {
            return Err(ConfigError::EmptyQRange);
        }
        if let Some(&q) = self.qrange.iter().find(|q| !q.is_finite()) {
            return Err(ConfigError::NonFiniteQ(q));
        }
        if self.ts_length == 0 {
            return Err(ConfigError::HorizonLength);
        }
        if self.ts_runs == 0 {
            return Err(ConfigError::SegmentCount);
        }
        if self.ts_run_length == 0 {
            return Err(ConfigError::SegmentLength);
        }
        if !(self.steplength > 0.0 && self.steplength.is_finite()) {
            return Err(ConfigError::StepLength(self.steplength));
        }
        if !(self.analyze_ts > 0.0 && self.analyze_ts <= 1.0) {
            return Err(ConfigError::AnalyzeWindow(self.analyze_ts));
        }
        if self.workers == 0 {
            return Err(ConfigError::WorkerCount);
        }
        self.inputs.validate()?;
        if !(self.mass_ratio > 0.0) {
            return Err(ConfigError::BodyMassRatio(self.mass_ratio));
        }
        let (lo, hi) = self.mass_ratio_range;
        if !(lo > 0.0 && lo < hi) {
            return Err(ConfigError::BodyMassRange { min: lo, max: hi });
        }
        Ok(())
    }
}

/// Default worker count: three quarters of the available parallelism,
/// at least one.
pub fn default_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ((available as f64 * 0.75) as usize).max(1)
}

/// An ownership-disjoint slice of the shuffled q-range. Each item carries
/// its global post-shuffle index, which seeds the item's private RNG so the
/// output is independent of worker scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepChunk {
    pub index: usize,
    pub items: Vec<(usize, f64)>,
}

/// Shuffles the q-range (so expensive and cheap q-values spread evenly
/// across workers) and splits it into at most `workers` contiguous chunks
/// whose sizes differ by at most one element.
pub fn partition_qrange(qrange: &[f64], workers: usize, seed: u64) -> Vec<SweepChunk> {
    let mut shuffled = qrange.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let items: Vec<(usize, f64)> = shuffled.into_iter().enumerate().collect();
    let chunk_count = workers.min(items.len()).max(1);
    let base = items.len() / chunk_count;
    let extra = items.len() % chunk_count;

    let mut chunks = Vec::with_capacity(chunk_count);
    let mut cursor = 0;
    for index in 0..chunk_count {
        let size = base + usize::from(index < extra);
        chunks.push(SweepChunk {
            index,
            items: items[cursor..cursor + size].to_vec(),
        });
        cursor += size;
    }
    chunks
}

fn item_rng(seed: u64, item_index: usize) -> StdRng {
    // Offset by one so item generators never collide with the shuffle
    // generator seeded from `seed` itself.
    StdRng::seed_from_u64(seed.wrapping_add(1 + item_index as u64))
}

/// Merged chain sweep result: one bifurcation table per species, indexed
/// basal / intermediate / top.
#[derive(Debug, Clone, Default)]
pub struct ChainSweepOutput {
    pub species: [Table<BifurcationRecord>; CHAIN_SPECIES],
}

impl ChainSweepOutput {
    pub fn basal(&self) -> &Table<BifurcationRecord> {
        &self.species[0]
    }

    pub fn intermediate(&self) -> &Table<BifurcationRecord> {
        &self.species[1]
    }

    pub fn top(&self) -> &Table<BifurcationRecord> {
        &self.species[2]
    }

    /// Writes the three fixed-name CSV tables into `dir`.
    pub fn write(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(CHAIN_SPECIES);
        for (basename, table) in CHAIN_BASENAMES.iter().zip(&self.species) {
            let path = dir.join(basename);
            crate::dataset::write_csv(&path, table.rows())?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Merged web sweep result: one diversity table for the configured
/// interaction-strength regime.
#[derive(Debug, Clone, Default)]
pub struct WebSweepOutput {
    pub diversity: Table<DiversityRecord>,
}

impl WebSweepOutput {
    /// Writes the diversity CSV into `dir`; a regime label, when given,
    /// is inserted before the extension.
    pub fn write(&self, dir: &Path, label: Option<&str>) -> anyhow::Result<PathBuf> {
        let basename = match label {
            Some(label) => format!("web_diversity_{label}.csv"),
            None => WEB_BASENAME.to_string(),
        };
        let path = dir.join(basename);
        crate::dataset::write_csv(&path, self.diversity.rows())?;
        Ok(path)
    }
}

/// Runs the full chain sweep: for each q, derive coefficients, integrate
/// one trajectory from fresh random initial conditions, trim to the
/// analysis window, and record per-species extrema.
pub fn run_chain_sweep(config: &SweepConfig) -> Result<ChainSweepOutput, EngineError> {
    config.validate()?;
    let chunks = partition_qrange(&config.qrange, config.workers, config.seed);
    info!(
        points = config.qrange.len(),
        chunks = chunks.len(),
        "dispatching chain sweep"
    );

    let partials: Vec<[Table<BifurcationRecord>; CHAIN_SPECIES]> = chunks
        .into_par_iter()
        .map(|chunk| chain_chunk(config, &chunk))
        .collect::<Result<_, _>>()?;

    let mut output = ChainSweepOutput::default();
    for partial in partials {
        for (species, table) in partial.into_iter().enumerate() {
            output.species[species].merge(table);
        }
    }
    info!(rows = output.basal().len(), "chain sweep merged");
    Ok(output)
}

/// Runs the full web sweep: for each q, derive coefficients with a fresh
/// body-mass draw, run the segmented long trajectory with extinction
/// clamping, and record the surviving-species count.
pub fn run_web_sweep(config: &SweepConfig) -> Result<WebSweepOutput, EngineError> {
    config.validate()?;
    let chunks = partition_qrange(&config.qrange, config.workers, config.seed);
    info!(
        points = config.qrange.len(),
        chunks = chunks.len(),
        "dispatching web sweep"
    );

    let partials: Vec<Table<DiversityRecord>> = chunks
        .into_par_iter()
        .map(|chunk| web_chunk(config, &chunk))
        .collect::<Result<_, _>>()?;

    let mut output = WebSweepOutput::default();
    for partial in partials {
        output.diversity.merge(partial);
    }
    info!(rows = output.diversity.len(), "web sweep merged");
    Ok(output)
}

fn chain_chunk(
    config: &SweepConfig,
    chunk: &SweepChunk,
) -> Result<[Table<BifurcationRecord>; CHAIN_SPECIES], EngineError> {
    debug!(chunk = chunk.index, items = chunk.items.len(), "chain chunk started");
    let mut tables: [Table<BifurcationRecord>; CHAIN_SPECIES] = Default::default();
    for &(item_index, q) in &chunk.items {
        chain_item(config, item_index, q, &mut tables)
            .map_err(|err| err.in_worker(chunk.index, q))?;
    }
    debug!(chunk = chunk.index, "chain chunk finished");
    Ok(tables)
}

fn chain_item(
    config: &SweepConfig,
    item_index: usize,
    q: f64,
    tables: &mut [Table<BifurcationRecord>; CHAIN_SPECIES],
) -> Result<(), EngineError> {
    let mut rng = item_rng(config.seed, item_index);
    let coefficients = chain_coefficients(&config.inputs, q, config.mass_ratio)?;
    let model = ChainModel::new(coefficients);
    let initial = draw_initial_state(CHAIN_SPECIES, &mut rng);

    let trajectory = integrate(
        &model,
        &initial,
        0.0,
        config.ts_length,
        config.steplength,
        CHAIN_TOLERANCE,
    )?;
    let window = trajectory.tail_window(config.analyze_ts);

    for species in 0..CHAIN_SPECIES {
        let series = window.component(species);
        let mut extrema = local_extrema(&series)?;
        if extrema.is_empty() {
            // A window still drifting monotonically toward a fixed point
            // has no interior extrema; record its mean as the equilibrium
            // estimate so every q-value contributes at least one row.
            extrema.push(series.iter().sum::<f64>() / series.len() as f64);
        }
        let extrema = reduce_extrema(extrema, config.unique_out, config.max_out, &mut rng);
        tables[species].extend(
            extrema
                .into_iter()
                .map(|extremum| BifurcationRecord { q, extremum }),
        );
    }
    Ok(())
}

fn web_chunk(
    config: &SweepConfig,
    chunk: &SweepChunk,
) -> Result<Table<DiversityRecord>, EngineError> {
    debug!(chunk = chunk.index, items = chunk.items.len(), "web chunk started");
    let mut table = Table::new();
    for &(item_index, q) in &chunk.items {
        let record =
            web_item(config, item_index, q).map_err(|err| err.in_worker(chunk.index, q))?;
        table.append(record);
    }
    debug!(chunk = chunk.index, "web chunk finished");
    Ok(table)
}

fn web_item(
    config: &SweepConfig,
    item_index: usize,
    q: f64,
) -> Result<DiversityRecord, EngineError> {
    let mut rng = item_rng(config.seed, item_index);
    // Fresh body-mass draw per run; coefficients are never reused across
    // q-value iterations.
    let coefficients = web_coefficients(&config.inputs, q, config.mass_ratio_range, &mut rng)?;
    let model = WebModel::new(coefficients);
    let initial = draw_initial_state(WEB_SPECIES, &mut rng);

    let run = integrate_segmented(
        &model,
        &initial,
        config.ts_runs,
        config.ts_run_length,
        config.steplength,
        WEB_TOLERANCE,
    )?;
    let diversity = run.final_state.iter().filter(|&&b| b > 0.0).count() as u32;
    Ok(DiversityRecord { q, diversity })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<f64>) -> Vec<f64> {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values
    }

    #[test]
    fn partition_is_a_lossless_permutation() {
        let qrange: Vec<f64> = (0..17).map(|i| i as f64 * 0.05).collect();
        let chunks = partition_qrange(&qrange, 5, 9);

        let recovered: Vec<f64> = chunks
            .iter()
            .flat_map(|c| c.items.iter().map(|&(_, q)| q))
            .collect();
        assert_eq!(sorted(recovered), sorted(qrange.clone()));

        let sizes: Vec<usize> = chunks.iter().map(|c| c.items.len()).collect();
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        assert!(max - min <= 1, "chunk sizes {sizes:?} differ by more than one");

        // Global indices are disjoint and cover 0..len.
        let mut indices: Vec<usize> = chunks
            .iter()
            .flat_map(|c| c.items.iter().map(|&(i, _)| i))
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..qrange.len()).collect::<Vec<_>>());
    }

    #[test]
    fn partition_caps_chunk_count_at_range_length() {
        let qrange = [0.0, 0.1];
        let chunks = partition_qrange(&qrange, 8, 0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn partition_is_deterministic_per_seed() {
        let qrange: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(
            partition_qrange(&qrange, 3, 7),
            partition_qrange(&qrange, 3, 7)
        );
        assert_ne!(
            partition_qrange(&qrange, 3, 7),
            partition_qrange(&qrange, 3, 8)
        );
    }

    #[test]
    fn validation_rejects_bad_configurations_before_any_work() {
        let mut config = SweepConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyQRange)));

        config.qrange = vec![0.0, 0.1];
        config.analyze_ts = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AnalyzeWindow(_))
        ));

        config.analyze_ts = 0.05;
        config.mass_ratio_range = (50.0, 50.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BodyMassRange { .. })
        ));

        config.mass_ratio_range = (10.0, 100.0);
        config.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::WorkerCount)));

        config.workers = 2;
        assert!(config.validate().is_ok());
    }

    fn small_chain_config() -> SweepConfig {
        SweepConfig {
            qrange: vec![0.0, 0.1, 0.2],
            ts_length: 1_000,
            steplength: 0.5,
            analyze_ts: 0.5,
            unique_out: false,
            max_out: 0,
            workers: 2,
            seed: 42,
            ..SweepConfig::default()
        }
    }

    #[test]
    fn chain_sweep_rows_stay_inside_the_requested_range_and_bounds() {
        let config = small_chain_config();
        let output = run_chain_sweep(&config).unwrap();

        for table in &output.species {
            assert!(!table.is_empty());
            for row in table.rows() {
                assert!(
                    config.qrange.contains(&row.q),
                    "row q {} was never requested",
                    row.q
                );
                assert!(
                    row.extremum > -1e-6 && row.extremum <= 5.0,
                    "extremum {} outside plausible biomass bounds",
                    row.extremum
                );
            }
            // Every requested q contributes at least one row per species.
            for q in &config.qrange {
                assert!(table.rows().iter().any(|row| row.q == *q));
            }
        }
    }

    #[test]
    fn chain_sweep_is_reproducible_under_a_fixed_seed() {
        let config = small_chain_config();
        let a = run_chain_sweep(&config).unwrap();
        let b = run_chain_sweep(&config).unwrap();
        for (left, right) in a.species.iter().zip(&b.species) {
            assert_eq!(left.rows(), right.rows());
        }
    }

    #[test]
    fn chain_sweep_honors_the_extrema_cap() {
        let config = SweepConfig {
            max_out: 3,
            unique_out: true,
            ..small_chain_config()
        };
        let output = run_chain_sweep(&config).unwrap();
        for table in &output.species {
            for q in &config.qrange {
                let per_q = table.rows().iter().filter(|row| row.q == *q).count();
                assert!(
                    (1..=config.max_out).contains(&per_q),
                    "{per_q} rows for q = {q}"
                );
            }
        }
    }

    #[test]
    fn web_sweep_produces_one_bounded_record_per_q() {
        let config = SweepConfig {
            qrange: vec![0.0, 0.2],
            ts_runs: 2,
            ts_run_length: 150,
            steplength: 0.5,
            workers: 2,
            seed: 7,
            ..SweepConfig::default()
        };
        let output = run_web_sweep(&config).unwrap();
        assert_eq!(output.diversity.len(), config.qrange.len());
        for row in output.diversity.rows() {
            assert!(config.qrange.contains(&row.q));
            assert!(row.diversity <= WEB_SPECIES as u32);
        }
    }
}
