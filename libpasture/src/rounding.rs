//! Response rounding. Values are kept at full precision internally and rounded
//! half away from zero only when serialised.

use serde::Serializer;

/// Round half away from zero to `decimals` places
pub fn round_dp(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Avoid emitting "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn dp1<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_dp(*value, 1))
}

pub fn dp2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_dp(*value, 2))
}

pub fn dp4<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_dp(*value, 4))
}

pub fn dp1_pair<S: Serializer>(value: &[f64; 2], serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeTuple;
    let mut tuple = serializer.serialize_tuple(2)?;
    tuple.serialize_element(&round_dp(value[0], 1))?;
    tuple.serialize_element(&round_dp(value[1], 1))?;
    tuple.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_away_from_zero() {
        assert_eq!(round_dp(0.125, 2), 0.13);
        assert_eq!(round_dp(-0.125, 2), -0.13);
        assert_eq!(round_dp(2.5, 0), 3.0);
        assert_eq!(round_dp(-2.5, 0), -3.0);
    }

    #[test]
    fn test_no_negative_zero() {
        let v = round_dp(-0.00001, 4);
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn test_four_decimals() {
        assert_eq!(round_dp(0.568_449, 4), 0.5684);
        assert_eq!(round_dp(0.568_46, 4), 0.5685);
    }
}
