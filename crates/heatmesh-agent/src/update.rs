//! Explicit-Euler update of one cell from its neighbours.
//!
//! Each tick: `value += ((Σ (neighbour_i - value)) / N * α) >> 16`.
//! The difference sum is accumulated in `i64` so four full-range
//! differences cannot overflow before the division; the division truncates
//! toward zero and the α multiply widens through [`Fix16::saturating_mul`].

use heatmesh_core::{Fix16, NUM_NEIGHBOURS};

use crate::agent::Agent;

/// One discrete-Laplacian diffusion step for a single cell.
///
/// Pure function of its inputs: stale neighbour values are used as-is.
///
/// # Examples
///
/// ```
/// use heatmesh_agent::diffuse;
/// use heatmesh_core::Fix16;
///
/// let value = Fix16::from_bits(0x0001_0000); // 1.0
/// let alpha = Fix16::from_bits(0x0000_8000); // 0.5
/// let neighbours = [Fix16::from_bits(0x0002_0000); 4]; // 2.0
/// assert_eq!(diffuse(value, &neighbours, alpha).to_bits(), 0x0001_8000);
/// ```
pub fn diffuse(value: Fix16, neighbours: &[Fix16; NUM_NEIGHBOURS], diffusivity: Fix16) -> Fix16 {
    let sum: i64 = neighbours
        .iter()
        .map(|n| i64::from(n.to_bits()) - i64::from(value.to_bits()))
        .sum();
    let mean_diff = Fix16::saturate(sum / NUM_NEIGHBOURS as i64);
    value + mean_diff * diffusivity
}

impl Agent {
    /// Run the update engine once, storing and returning the new value.
    pub fn update(&mut self) -> Fix16 {
        let next = diffuse(self.value(), self.neighbour_values(), self.diffusivity());
        self.set_value(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fx(v: f64) -> Fix16 {
        Fix16::from_f64(v)
    }

    #[test]
    fn half_step_toward_hotter_neighbours() {
        let next = diffuse(
            Fix16::from_bits(0x0001_0000),
            &[Fix16::from_bits(0x0002_0000); 4],
            Fix16::from_bits(0x0000_8000),
        );
        assert_eq!(next.to_bits(), 0x0001_8000);
    }

    #[test]
    fn cools_toward_colder_neighbours() {
        let next = diffuse(fx(10.0), &[fx(0.0); 4], fx(0.25));
        assert_eq!(next, fx(7.5));
    }

    #[test]
    fn mixed_neighbours_use_mean_difference() {
        // diffs: +4, -4, +2, 0 -> sum 2 -> mean 0.5 -> delta 0.5
        let next = diffuse(fx(4.0), &[fx(8.0), fx(0.0), fx(6.0), fx(4.0)], fx(1.0));
        assert_eq!(next, fx(4.5));
    }

    #[test]
    fn mean_truncates_toward_zero() {
        // sum of diffs = -3 ulp, /4 truncates to 0 rather than flooring to -1.
        let value = Fix16::from_bits(3);
        let neighbours = [
            Fix16::from_bits(0),
            Fix16::from_bits(3),
            Fix16::from_bits(3),
            Fix16::from_bits(3),
        ];
        assert_eq!(diffuse(value, &neighbours, Fix16::ONE), value);
    }

    #[test]
    fn extreme_differences_do_not_wrap() {
        // Wrapped i32 differences would be -1 each and push the value down.
        let next = diffuse(Fix16::MIN, &[Fix16::MAX; 4], Fix16::ONE);
        assert!(next > Fix16::MIN);
        assert_eq!(next.to_bits(), -1);
    }

    proptest! {
        #[test]
        fn equilibrium_does_not_drift(v in any::<i32>(), alpha in 0i32..=0x0001_0000) {
            let value = Fix16::from_bits(v);
            let next = diffuse(value, &[value; 4], Fix16::from_bits(alpha));
            prop_assert_eq!(next, value);
        }

        #[test]
        fn zero_diffusivity_is_noop(v in any::<i32>(), n in proptest::array::uniform4(any::<i32>())) {
            let value = Fix16::from_bits(v);
            let neighbours = n.map(Fix16::from_bits);
            prop_assert_eq!(diffuse(value, &neighbours, Fix16::ZERO), value);
        }

        #[test]
        fn stays_within_neighbour_hull(
            v in -1_000_000i32..1_000_000,
            n in proptest::array::uniform4(-1_000_000i32..1_000_000),
            alpha in 0i32..=0x0001_0000,
        ) {
            let value = Fix16::from_bits(v);
            let neighbours = n.map(Fix16::from_bits);
            let next = diffuse(value, &neighbours, Fix16::from_bits(alpha));
            let lo = neighbours.iter().copied().chain([value]).min().unwrap();
            let hi = neighbours.iter().copied().chain([value]).max().unwrap();
            prop_assert!(next >= lo && next <= hi);
        }
    }
}
