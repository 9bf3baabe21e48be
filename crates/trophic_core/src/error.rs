use thiserror::Error;

/// Configuration problems detected before any simulation work is dispatched.
/// Every variant names the offending parameter so the sweep can abort with a
/// specific message.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("qrange must contain at least one sweep point")]
    EmptyQRange,
    #[error("qrange contains a non-finite sweep point ({0})")]
    NonFiniteQ(f64),
    #[error("analyze_ts must lie in (0, 1], got {0}")]
    AnalyzeWindow(f64),
    #[error("steplength must be positive and finite, got {0}")]
    StepLength(f64),
    #[error("ts_length must be at least 1")]
    HorizonLength,
    #[error("ts_runs must be at least 1")]
    SegmentCount,
    #[error("ts_run_length must be at least 1")]
    SegmentLength,
    #[error("worker count noC must be at least 1")]
    WorkerCount,
    #[error("half-saturation density n0 must be strictly positive, got {0}")]
    HalfSaturation(f64),
    #[error("allometric constant a must be strictly positive, got {0}")]
    AllometricConstant(f64),
    #[error("relative max feeding rate y must be strictly positive, got {0}")]
    FeedingRatio(f64),
    #[error("assimilation efficiency e must lie in (0, 1], got {0}")]
    Assimilation(f64),
    #[error("body-mass ratio R must be strictly positive, got {0}")]
    BodyMassRatio(f64),
    #[error("body-mass ratio range requires 0 < min < max, got [{min}, {max}]")]
    BodyMassRange { min: f64, max: f64 },
    #[error("integration tolerance must be strictly positive, got {0}")]
    Tolerance(f64),
}

/// Errors raised by the simulation and sweep engine proper.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The analysis window held too few samples for extrema detection.
    /// Indicates a misconfigured integration horizon; fatal under the
    /// fail-fast sweep policy.
    #[error("series holds {len} samples; at least 3 are required for extrema detection")]
    DegenerateSeries { len: usize },
    #[error("state dimension mismatch: system expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("adaptive step size underflowed at t = {t:.6e} (dt = {dt:.6e})")]
    StepUnderflow { t: f64, dt: f64 },
    /// A chunk worker failed mid-sweep. The whole sweep aborts and this
    /// wrapper reports which chunk and q-value were responsible.
    #[error("sweep worker for chunk {chunk} failed at q = {q}")]
    Worker {
        chunk: usize,
        q: f64,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub(crate) fn in_worker(self, chunk: usize, q: f64) -> Self {
        EngineError::Worker {
            chunk,
            q,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_offending_parameter() {
        let message = format!("{}", ConfigError::AnalyzeWindow(1.5));
        assert!(message.contains("analyze_ts"));
        assert!(message.contains("1.5"));

        let message = format!("{}", ConfigError::BodyMassRange { min: 9.0, max: 3.0 });
        assert!(message.contains("min < max"));
    }

    #[test]
    fn worker_wrapper_reports_chunk_and_q() {
        let inner = EngineError::DegenerateSeries { len: 2 };
        let wrapped = inner.in_worker(4, 0.25);
        let message = format!("{wrapped}");
        assert!(message.contains("chunk 4"));
        assert!(message.contains("q = 0.25"));
    }
}
