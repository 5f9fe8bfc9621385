//! Beam-dependent (dynamic) element matrices
//!
//! A dynamic element cannot compute its matrix from its own parameters
//! alone: it needs the matrices accumulated from the schema start up to
//! itself and a beam model. The owning sequence drives the left-to-right
//! pass and hands each dynamic element a [`DynamicContext`]; the element's
//! contract is the per-element step only.

use crate::elements::descriptor::ElementType;
use crate::elements::element::Element;
use crate::matrix::RayMatrix;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Beam parameters at a point along the schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamState {
    /// Beam radius in meters.
    pub beam_radius: f64,

    /// Radius of curvature of the wavefront in meters. Infinite for a
    /// collimated beam.
    pub front_radius: f64,

    /// Far-field half divergence angle in radians.
    pub half_angle: f64,
}

impl BeamState {
    /// The state reported when a beam cannot be propagated (degenerate
    /// matrix or unphysical seed).
    pub fn degenerate() -> Self {
        Self {
            beam_radius: 0.0,
            front_radius: f64::INFINITY,
            half_angle: 0.0,
        }
    }
}

/// A propagating-beam calculator: encapsulates the input beam and computes
/// output beam parameters from a ray matrix. Supplied per call, one per
/// transverse plane; the element does not own it.
pub trait BeamCalculator {
    fn calc(&self, matrix: &RayMatrix, wavelen_si: f64) -> BeamState;
}

/// Gaussian beam calculator built on the complex q-parameter.
#[derive(Debug, Clone, Copy)]
pub struct GaussCalculator {
    waist_si: f64,
    distance_si: f64,
}

impl GaussCalculator {
    /// Seed a beam by its waist radius and the distance from the waist to
    /// the schema start (positive when the waist lies before the start).
    pub fn new(waist_si: f64, distance_si: f64) -> Self {
        Self {
            waist_si,
            distance_si,
        }
    }
}

impl BeamCalculator for GaussCalculator {
    fn calc(&self, matrix: &RayMatrix, wavelen_si: f64) -> BeamState {
        if self.waist_si <= 0.0 || wavelen_si <= 0.0 {
            return BeamState::degenerate();
        }
        let rayleigh = PI * self.waist_si * self.waist_si / wavelen_si;
        let q_in = Complex64::new(self.distance_si, rayleigh);

        let Some(q) = matrix.apply_q(q_in) else {
            return BeamState::degenerate();
        };
        if q.norm_sqr() == 0.0 {
            return BeamState::degenerate();
        }

        let inv_q = q.inv();
        // Im(1/q) = -wavelen / (pi w^2) < 0 for a physical beam
        if inv_q.im >= 0.0 {
            return BeamState::degenerate();
        }
        let beam_radius = (-wavelen_si / (PI * inv_q.im)).sqrt();
        let front_radius = if inv_q.re == 0.0 {
            f64::INFINITY
        } else {
            1.0 / inv_q.re
        };

        // q = (z - z_waist) + i z_R locates the transformed waist
        let half_angle = if q.im > 0.0 {
            let waist = (wavelen_si * q.im / PI).sqrt();
            wavelen_si / (PI * waist)
        } else {
            0.0
        };

        BeamState {
            beam_radius,
            front_radius,
            half_angle,
        }
    }
}

/// Context for [`Element::calc_dynamic_matrix`]: everything a dynamic
/// element needs beyond its own parameters.
pub struct DynamicContext<'a> {
    /// Tangential matrix accumulated from the schema start up to (but not
    /// including) this element.
    pub mt: &'a RayMatrix,

    /// Sagittal matrix accumulated the same way.
    pub ms: &'a RayMatrix,

    pub calc_t: &'a dyn BeamCalculator,
    pub calc_s: &'a dyn BeamCalculator,

    /// Schema wavelength in meters.
    pub schema_wavelen_si: f64,

    /// Wavelength effective at the immediately preceding element. Differs
    /// from the schema wavelength inside medium-filled ranges. A mismatch
    /// with this element's own medium is not reconciled here; that is the
    /// caller's policy.
    pub prev_wavelen_si: f64,
}

/// Real unit-determinant matrix reproducing the action of a Gaussian
/// aperture (optionally with a focusing term) on one specific incident
/// beam: `[[w'/w, 0], [C, w/w']]`, where the aperture combines as
/// `1/w'^2 = 1/w^2 + 1/a^2` and the C entry moves the wavefront curvature
/// from `1/R` to `1/R - 1/F`.
fn equivalent_matrix(beam: &BeamState, aperture_si: f64, focal_si: f64) -> RayMatrix {
    let w = beam.beam_radius;
    if aperture_si <= 0.0 || w <= 0.0 {
        return RayMatrix::identity();
    }

    let inv_w2_out = 1.0 / (w * w) + 1.0 / (aperture_si * aperture_si);
    let w_out = inv_w2_out.sqrt().recip();

    let a = w_out / w;
    let u = (w / w_out) * (w / w_out);

    let inv_r = if beam.front_radius.is_finite() && beam.front_radius != 0.0 {
        1.0 / beam.front_radius
    } else {
        0.0
    };
    let inv_f = if focal_si != 0.0 { 1.0 / focal_si } else { 0.0 };
    let inv_r_out = inv_r - inv_f;

    let c = a * (inv_r_out - u * inv_r);
    RayMatrix::new(a, 0.0, c, 1.0 / a)
}

impl Element {
    /// Compute the dynamic matrix pair from the accumulated upstream
    /// matrices and the supplied beam calculators. No-op for non-dynamic
    /// elements.
    ///
    /// The incident beam is evaluated at the previous element's wavelength;
    /// the schema wavelength travels in the context for element types that
    /// need the absolute scale.
    pub fn calc_dynamic_matrix(&mut self, p: &DynamicContext<'_>) {
        if !self.kind().is_dynamic() {
            return;
        }

        let aperture = self.param_si("a");
        let focal = if self.kind() == ElementType::GaussApertureLens {
            self.param_si("F")
        } else {
            0.0
        };

        let beam_t = p.calc_t.calc(p.mt, p.prev_wavelen_si);
        let beam_s = p.calc_s.calc(p.ms, p.prev_wavelen_si);

        let mt_dyn = equivalent_matrix(&beam_t, aperture, focal);
        let ms_dyn = equivalent_matrix(&beam_s, aperture, focal);

        if let Some(state) = self.dynamic_state() {
            state.mt_dyn = mt_dyn;
            state.ms_dyn = ms_dyn;
        }
    }
}
