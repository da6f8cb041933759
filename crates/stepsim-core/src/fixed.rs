use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for
/// milestone quantities and completeness percentages.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an integer unit count to Fixed64, saturating at `Fixed64::MAX`.
#[inline]
pub fn units_to_fixed64(units: u64) -> Fixed64 {
    Fixed64::checked_from_num(units).unwrap_or(Fixed64::MAX)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_convert_exactly() {
        assert_eq!(units_to_fixed64(9), Fixed64::from_num(9));
        assert_eq!(fixed64_to_f64(units_to_fixed64(3)), 3.0);
    }

    #[test]
    fn units_saturate_instead_of_overflowing() {
        assert_eq!(units_to_fixed64(u64::MAX), Fixed64::MAX);
    }

    #[test]
    fn fixed64_checked_div_by_zero() {
        assert!(checked_div_64(units_to_fixed64(1), Fixed64::ZERO).is_none());
    }

    #[test]
    fn fixed64_division_is_deterministic() {
        let third = checked_div_64(units_to_fixed64(1), units_to_fixed64(3));
        assert_eq!(third, checked_div_64(units_to_fixed64(1), units_to_fixed64(3)));
        assert!(third.is_some_and(|t| t > Fixed64::ZERO && t < units_to_fixed64(1)));
    }
}
