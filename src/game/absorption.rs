//! Collision and absorption math.
//!
//! Absorption is area-additive: the absorber keeps its own area and gains a
//! fraction of the absorbed circle's. Working in area space keeps growth
//! sublinear in radius, so an early lead does not snowball instantly.

use std::f64::consts::PI;

use crate::config::{ABSORB_AREA_GAIN, DEFAULT_CIRCLE_RADIUS};

/// Identity of an ambient circle, allocated by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

/// A drifting non-player circle. Position integration happens outside the
/// core; the engine only reads these each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ambient {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// A circle with no usable radius counts as the default size.
pub fn effective_radius(radius: f64) -> f64 {
    if radius > 0.0 {
        radius
    } else {
        DEFAULT_CIRCLE_RADIUS
    }
}

/// True iff the circles overlap: center distance strictly below the sum of
/// radii. Touching exactly is not a collision.
pub fn circles_collide(ax: f64, ay: f64, ar: f64, bx: f64, by: f64, br: f64) -> bool {
    let dx = ax - bx;
    let dy = ay - by;
    let distance = (dx * dx + dy * dy).sqrt();
    distance < effective_radius(ar) + effective_radius(br)
}

/// Radius of the absorber after consuming a circle of radius `absorbed`:
/// `sqrt((π·a² + GAIN·π·b²) / π)`.
pub fn absorbed_radius(absorber: f64, absorbed: f64) -> f64 {
    let absorber_area = PI * absorber.powi(2);
    let absorbed_area = PI * effective_radius(absorbed).powi(2);
    let new_area = absorber_area + absorbed_area * ABSORB_AREA_GAIN;
    (new_area / PI).sqrt()
}

/// Score gained for an absorption.
pub fn absorption_score(absorbed: f64) -> u32 {
    effective_radius(absorbed).floor() as u32
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn growth_formula_is_exact() {
        // sqrt(r1^2 + 0.3 * r2^2)
        let grown = absorbed_radius(20.0, 10.0);
        assert!((grown - (400.0_f64 + 0.3 * 100.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn zero_radius_falls_back_to_default() {
        assert_eq!(effective_radius(0.0), DEFAULT_CIRCLE_RADIUS);
        assert_eq!(effective_radius(-3.0), DEFAULT_CIRCLE_RADIUS);
        assert_eq!(effective_radius(7.5), 7.5);
        // collision of two "unset" circles uses 10 + 10
        assert!(circles_collide(0.0, 0.0, 0.0, 19.0, 0.0, 0.0));
        assert!(!circles_collide(0.0, 0.0, 0.0, 21.0, 0.0, 0.0));
    }

    #[test]
    fn touching_circles_do_not_collide() {
        // distance exactly r1 + r2
        assert!(!circles_collide(0.0, 0.0, 10.0, 25.0, 0.0, 15.0));
        assert!(circles_collide(0.0, 0.0, 10.0, 24.9, 0.0, 15.0));
    }

    proptest! {
        #[test]
        fn absorber_always_grows(r1 in 1.0_f64..500.0, r2 in 1.0_f64..500.0) {
            let grown = absorbed_radius(r1, r2);
            prop_assert!(grown > r1);
        }

        #[test]
        fn growth_is_less_than_full_area_merge(r1 in 1.0_f64..500.0, r2 in 1.0_f64..500.0) {
            let grown = absorbed_radius(r1, r2);
            let full_merge = (r1 * r1 + r2 * r2).sqrt();
            prop_assert!(grown < full_merge);
        }

        #[test]
        fn growth_matches_closed_form(r1 in 1.0_f64..500.0, r2 in 1.0_f64..500.0) {
            let grown = absorbed_radius(r1, r2);
            let expected = (r1 * r1 + ABSORB_AREA_GAIN * r2 * r2).sqrt();
            prop_assert!((grown - expected).abs() < 1e-9);
        }
    }
}
