//! Right-hand sides of the two food-web topologies.
//!
//! Both models implement [`DynamicalSystem<f64>`] and are pure functions of
//! state, time, and the coefficient set they were constructed with. Every
//! consumption term follows the generalized (Hill-type) functional response
//! `F(N) = Fmax * N^(q+1) / (N0^(q+1) + N^(q+1))`: q = 0 is the hyperbolic
//! Type II response, q > 0 bends it into a sigmoid Type III response.

use crate::params::{ChainCoefficients, WebCoefficients};
use crate::traits::DynamicalSystem;

/// Number of state variables in the food chain.
pub const CHAIN_SPECIES: usize = 3;

/// Number of state variables in the food web.
pub const WEB_SPECIES: usize = 10;

/// Generalized functional response.
///
/// `n0` must be strictly positive (enforced at configuration time), so the
/// response is well-defined at `n = 0` where it evaluates to exactly 0.
/// Densities are clamped at zero before exponentiation: adaptive trial steps
/// can probe marginally negative states, and a fractional power of a
/// negative base is NaN.
pub fn functional_response(n: f64, fmax: f64, n0: f64, q: f64) -> f64 {
    let n = n.max(0.0);
    let hill = q + 1.0;
    let np = n.powf(hill);
    fmax * np / (n0.powf(hill) + np)
}

/// Three-species chain: basal resource, intermediate consumer, top predator.
///
/// The basal species grows logistically (r = K = 1) and is grazed by the
/// intermediate consumer; assimilated gains minus metabolic losses propagate
/// up the chain.
pub struct ChainModel {
    coefficients: ChainCoefficients,
}

impl ChainModel {
    pub fn new(coefficients: ChainCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &ChainCoefficients {
        &self.coefficients
    }
}

impl DynamicalSystem<f64> for ChainModel {
    fn dimension(&self) -> usize {
        CHAIN_SPECIES
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let c = &self.coefficients;
        let basal = x[0].max(0.0);
        let mid = x[1].max(0.0);
        let top = x[2].max(0.0);

        let graze = functional_response(basal, c.max_feeding_intermediate, c.half_saturation, c.q);
        let hunt = functional_response(mid, c.max_feeding_top, c.half_saturation, c.q);

        out[0] = basal * (1.0 - basal) - graze * mid;
        out[1] = c.assimilation * graze * mid - c.metabolic_intermediate * mid - hunt * top;
        out[2] = c.assimilation * hunt * top - c.metabolic_top * top;
    }
}

/// Diet table of the ten-species web: for each species, the resources it
/// feeds on with fractional diet weights (weights sum to 1 per consumer).
/// Species 0 and 1 are basal; consumers 2 and 3 split both basal resources
/// 50/50; the higher consumers take topology-specific combinations.
/// The table is immutable for the life of the topology.
pub const WEB_DIETS: [&[(usize, f64)]; WEB_SPECIES] = [
    &[],
    &[],
    &[(0, 0.5), (1, 0.5)],
    &[(0, 0.5), (1, 0.5)],
    &[(2, 0.5), (3, 0.5)],
    &[(2, 0.5), (3, 0.5)],
    &[(4, 0.5), (5, 0.5)],
    &[(2, 0.25), (3, 0.25), (4, 0.25), (5, 0.25)],
    &[(6, 0.5), (7, 0.5)],
    &[(6, 0.3), (7, 0.3), (8, 0.4)],
];

/// Trophic level per species: basal species sit at level 1, each consumer
/// at 1 plus the diet-weighted mean of its resources' levels. Diets only
/// reference lower species indices, so one forward pass suffices.
pub fn trophic_levels() -> [f64; WEB_SPECIES] {
    let mut levels = [1.0; WEB_SPECIES];
    for (species, diet) in WEB_DIETS.iter().enumerate() {
        if diet.is_empty() {
            continue;
        }
        let weighted: f64 = diet.iter().map(|&(prey, w)| w * levels[prey]).sum();
        levels[species] = 1.0 + weighted;
    }
    levels
}

/// Ten-species food web over the fixed [`WEB_DIETS`] topology.
pub struct WebModel {
    coefficients: WebCoefficients,
}

impl WebModel {
    pub fn new(coefficients: WebCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &WebCoefficients {
        &self.coefficients
    }
}

impl DynamicalSystem<f64> for WebModel {
    fn dimension(&self) -> usize {
        WEB_SPECIES
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let c = &self.coefficients;
        let mut biomass = [0.0; WEB_SPECIES];
        for i in 0..WEB_SPECIES {
            biomass[i] = x[i].max(0.0);
        }

        // Basal growth and consumer metabolic losses first; consumption
        // terms are accumulated on top.
        out[0] = biomass[0] * (1.0 - biomass[0]);
        out[1] = biomass[1] * (1.0 - biomass[1]);
        for i in 2..WEB_SPECIES {
            out[i] = -c.metabolic[i] * biomass[i];
        }

        for (pred, diet) in WEB_DIETS.iter().enumerate() {
            for &(prey, weight) in diet.iter() {
                let feeding = weight
                    * functional_response(biomass[prey], c.max_feeding[pred], c.half_saturation, c.q);
                out[pred] += c.assimilation * feeding * biomass[pred];
                out[prey] -= feeding * biomass[pred];
            }
        }
    }
}
