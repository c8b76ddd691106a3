//! Numeric policy for reported probabilities.

/// Reported probabilities carry this many decimals.
pub const DECIMALS: i32 = 5;
/// Smallest lower bound reported for a possible transition.
pub const P_MIN: f64 = 1e-4;

/// Round half away from zero to `precision` decimals.
pub fn round_decimal(a: f64, precision: i32) -> f64 {
    let s = 10f64.powi(precision);
    (a * s).round() / s
}

/// Round down to `precision` decimals.
///
/// Values already on the decimal grid stay put despite representation error.
pub fn floor_decimal(a: f64, precision: i32) -> f64 {
    let s = 10f64.powi(precision);
    ((a * s) + 1e-7).floor() / s
}

/// Hoeffding half-width `sqrt(ln(2/β) / (2N))`.
pub fn hoeffding_epsilon(samples: usize, confidence: f64) -> f64 {
    ((2.0 / confidence).ln() / (2.0 * samples as f64)).sqrt()
}

/// Floor both bounds to `DECIMALS`, lift the lower one to `P_MIN`, cap at 1.
///
/// The result always satisfies `0 <= lb <= ub <= 1`.
pub fn clamp_interval(lb: f64, ub: f64) -> (f64, f64) {
    let lb = floor_decimal(lb, DECIMALS).max(P_MIN).min(1.0);
    let ub = floor_decimal(ub, DECIMALS).min(1.0).max(lb);
    (lb, ub)
}

pub fn round_estimate(p: f64) -> f64 {
    round_decimal(p, DECIMALS).clamp(0.0, 1.0)
}

/// `1 − Σ estimates`, rounded; rounding residue never goes negative.
pub fn deadlock_estimate(estimates: impl IntoIterator<Item = f64>) -> f64 {
    let total: f64 = estimates.into_iter().sum();
    round_decimal(1.0 - total, DECIMALS).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_keeps_grid_values_and_drops_tails() {
        assert_eq!(floor_decimal(0.123456, 5), 0.12345);
        assert_eq!(floor_decimal(0.123459, 5), 0.12345);
        assert_eq!(floor_decimal(0.5, 5), 0.5);
        assert_eq!(floor_decimal(1.0, 5), 1.0);
    }

    #[test]
    fn hoeffding_matches_closed_form() {
        let e = hoeffding_epsilon(3200, 0.01);
        assert!((e - ((200.0f64).ln() / 6400.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn clamp_orders_bounds() {
        assert_eq!(clamp_interval(0.0, 0.0), (P_MIN, P_MIN));
        assert_eq!(clamp_interval(0.3, 1.7), (0.3, 1.0));
        let (lb, ub) = clamp_interval(0.4000049, 0.4000001);
        assert!(lb <= ub);
    }

    #[test]
    fn deadlock_estimate_never_negative() {
        assert_eq!(deadlock_estimate([0.5, 0.50001]), 0.0);
        assert_eq!(deadlock_estimate([0.25, 0.25]), 0.5);
    }
}
