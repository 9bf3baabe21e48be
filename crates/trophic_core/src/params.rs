//! Maps ecological/allometric inputs onto the numeric coefficients consumed
//! by the model evaluators.
//!
//! The chain mapping is deterministic. The web mapping draws a fresh random
//! body-mass ratio per consumer, so a `WebCoefficients` value is only valid
//! for the single trajectory run it was derived for; the sweep orchestrator
//! calls the mapper exactly once per run and never reuses the result.

use crate::error::ConfigError;
use crate::models::{trophic_levels, WEB_SPECIES};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Allometric and ecological inputs shared by both topologies.
///
/// Defaults follow the usual normalization of consumer-resource models with
/// the basal carrying capacity scaled to 1: metabolic rates derive from
/// body-mass ratios via `a * R^b` with a quarter-power exponent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EcologicalInputs {
    /// Allometric constant `a` of the metabolic-rate law.
    pub metabolic_constant: f64,
    /// Allometric exponent `b` (negative: heavier consumers respire slower).
    pub metabolic_exponent: f64,
    /// Assimilation efficiency `e` applied to all consumption gains.
    pub assimilation: f64,
    /// Max feeding rate relative to the consumer's metabolic rate (`y`).
    pub feeding_ratio: f64,
    /// Half-saturation density `N0` of the functional response.
    pub half_saturation: f64,
}

impl Default for EcologicalInputs {
    fn default() -> Self {
        Self {
            metabolic_constant: 0.2227,
            metabolic_exponent: -0.25,
            assimilation: 0.85,
            feeding_ratio: 8.0,
            half_saturation: 0.5,
        }
    }
}

impl EcologicalInputs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.metabolic_constant > 0.0) {
            return Err(ConfigError::AllometricConstant(self.metabolic_constant));
        }
        if !(self.half_saturation > 0.0) {
            return Err(ConfigError::HalfSaturation(self.half_saturation));
        }
        if !(self.feeding_ratio > 0.0) {
            return Err(ConfigError::FeedingRatio(self.feeding_ratio));
        }
        if !(self.assimilation > 0.0 && self.assimilation <= 1.0) {
            return Err(ConfigError::Assimilation(self.assimilation));
        }
        Ok(())
    }
}

/// Coefficients of the three-species chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainCoefficients {
    pub q: f64,
    pub assimilation: f64,
    pub half_saturation: f64,
    pub metabolic_intermediate: f64,
    pub metabolic_top: f64,
    pub max_feeding_intermediate: f64,
    pub max_feeding_top: f64,
}

/// Coefficients of the ten-species web. Basal species carry zero metabolic
/// and feeding rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebCoefficients {
    pub q: f64,
    pub assimilation: f64,
    pub half_saturation: f64,
    pub metabolic: [f64; WEB_SPECIES],
    pub max_feeding: [f64; WEB_SPECIES],
}

/// Chain mapping: `mass_ratio` is the per-trophic-level body-mass ratio, so
/// the intermediate consumer respires at `a * R^b` and the top predator at
/// `a * R^(2b)` (its ratio to the basal species compounds across two
/// levels). Max feeding rates are `y` times the respective metabolic rate.
pub fn chain_coefficients(
    inputs: &EcologicalInputs,
    q: f64,
    mass_ratio: f64,
) -> Result<ChainCoefficients, ConfigError> {
    inputs.validate()?;
    if !(mass_ratio > 0.0) {
        return Err(ConfigError::BodyMassRatio(mass_ratio));
    }

    let metabolic_intermediate =
        inputs.metabolic_constant * mass_ratio.powf(inputs.metabolic_exponent);
    let metabolic_top = inputs.metabolic_constant * mass_ratio.powf(2.0 * inputs.metabolic_exponent);

    Ok(ChainCoefficients {
        q,
        assimilation: inputs.assimilation,
        half_saturation: inputs.half_saturation,
        metabolic_intermediate,
        metabolic_top,
        max_feeding_intermediate: inputs.feeding_ratio * metabolic_intermediate,
        max_feeding_top: inputs.feeding_ratio * metabolic_top,
    })
}

/// Web mapping: each consumer draws a fresh body-mass ratio
/// `U(Rmin, Rmax)^(level - 1)` weighted by its trophic level, from which the
/// metabolic rate follows allometrically. The draw consumes the caller's
/// RNG, which keeps sweeps reproducible under an injected seeded generator.
pub fn web_coefficients(
    inputs: &EcologicalInputs,
    q: f64,
    mass_ratio_range: (f64, f64),
    rng: &mut impl Rng,
) -> Result<WebCoefficients, ConfigError> {
    inputs.validate()?;
    let (lo, hi) = mass_ratio_range;
    if !(lo > 0.0 && lo < hi) {
        return Err(ConfigError::BodyMassRange { min: lo, max: hi });
    }

    let levels = trophic_levels();
    let mut metabolic = [0.0; WEB_SPECIES];
    let mut max_feeding = [0.0; WEB_SPECIES];
    for i in 0..WEB_SPECIES {
        if levels[i] <= 1.0 {
            continue;
        }
        let ratio: f64 = rng.gen_range(lo..hi).powf(levels[i] - 1.0);
        metabolic[i] = inputs.metabolic_constant * ratio.powf(inputs.metabolic_exponent);
        max_feeding[i] = inputs.feeding_ratio * metabolic[i];
    }

    Ok(WebCoefficients {
        q,
        assimilation: inputs.assimilation,
        half_saturation: inputs.half_saturation,
        metabolic,
        max_feeding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn chain_metabolic_ratio_is_independent_of_the_constant() {
        let ratio = 42.0;
        let exponent = -0.25;
        for constant in [0.1, 0.2227, 3.5] {
            let inputs = EcologicalInputs {
                metabolic_constant: constant,
                metabolic_exponent: exponent,
                ..EcologicalInputs::default()
            };
            let c = chain_coefficients(&inputs, 0.0, ratio).unwrap();
            let observed = c.metabolic_top / c.metabolic_intermediate;
            assert!((observed - ratio.powf(exponent)).abs() < 1e-12);
        }
    }

    #[test]
    fn chain_max_feeding_scales_with_metabolic_rate() {
        let inputs = EcologicalInputs::default();
        let c = chain_coefficients(&inputs, 0.2, 100.0).unwrap();
        assert!(
            (c.max_feeding_intermediate - inputs.feeding_ratio * c.metabolic_intermediate).abs()
                < 1e-15
        );
        assert!((c.max_feeding_top - inputs.feeding_ratio * c.metabolic_top).abs() < 1e-15);
    }

    #[test]
    fn invalid_inputs_are_rejected_eagerly() {
        let mut inputs = EcologicalInputs::default();
        inputs.half_saturation = 0.0;
        assert!(matches!(
            chain_coefficients(&inputs, 0.0, 100.0),
            Err(ConfigError::HalfSaturation(_))
        ));

        let mut inputs = EcologicalInputs::default();
        inputs.metabolic_constant = -1.0;
        assert!(matches!(
            chain_coefficients(&inputs, 0.0, 100.0),
            Err(ConfigError::AllometricConstant(_))
        ));

        let inputs = EcologicalInputs::default();
        assert!(matches!(
            chain_coefficients(&inputs, 0.0, 0.0),
            Err(ConfigError::BodyMassRatio(_))
        ));
    }

    #[test]
    fn web_mapper_rejects_malformed_ratio_range() {
        let inputs = EcologicalInputs::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            web_coefficients(&inputs, 0.0, (100.0, 10.0), &mut rng),
            Err(ConfigError::BodyMassRange { .. })
        ));
        assert!(matches!(
            web_coefficients(&inputs, 0.0, (0.0, 10.0), &mut rng),
            Err(ConfigError::BodyMassRange { .. })
        ));
    }

    #[test]
    fn web_basal_species_carry_no_metabolic_cost() {
        let inputs = EcologicalInputs::default();
        let mut rng = StdRng::seed_from_u64(11);
        let c = web_coefficients(&inputs, 0.1, (10.0, 100.0), &mut rng).unwrap();
        assert_eq!(c.metabolic[0], 0.0);
        assert_eq!(c.metabolic[1], 0.0);
        for i in 2..WEB_SPECIES {
            assert!(c.metabolic[i] > 0.0, "consumer {i} has no metabolic rate");
            assert!((c.max_feeding[i] - inputs.feeding_ratio * c.metabolic[i]).abs() < 1e-15);
        }
    }

    #[test]
    fn web_draws_are_reproducible_under_a_fixed_seed() {
        let inputs = EcologicalInputs::default();
        let a = web_coefficients(&inputs, 0.1, (10.0, 100.0), &mut StdRng::seed_from_u64(99))
            .unwrap();
        let b = web_coefficients(&inputs, 0.1, (10.0, 100.0), &mut StdRng::seed_from_u64(99))
            .unwrap();
        assert_eq!(a.metabolic, b.metabolic);
    }

    #[test]
    fn web_draws_differ_across_calls_on_one_generator() {
        let inputs = EcologicalInputs::default();
        let mut rng = StdRng::seed_from_u64(3);
        let a = web_coefficients(&inputs, 0.1, (10.0, 100.0), &mut rng).unwrap();
        let b = web_coefficients(&inputs, 0.1, (10.0, 100.0), &mut rng).unwrap();
        assert_ne!(a.metabolic, b.metabolic);
    }

    #[test]
    fn web_metabolic_rates_respect_the_draw_bounds() {
        let inputs = EcologicalInputs::default();
        let mut rng = StdRng::seed_from_u64(17);
        let c = web_coefficients(&inputs, 0.0, (10.0, 100.0), &mut rng).unwrap();
        // Species 2 sits at level 2, so its ratio is a raw U(10, 100) draw
        // and b < 0 flips the bounds.
        let hi = inputs.metabolic_constant * 10.0_f64.powf(inputs.metabolic_exponent);
        let lo = inputs.metabolic_constant * 100.0_f64.powf(inputs.metabolic_exponent);
        assert!(c.metabolic[2] > lo && c.metabolic[2] < hi);
    }
}
