//! Conversions between decimal, fractional, American and implied-probability
//! odds. Every conversion goes through decimal odds, the canonical form.
//!
//!   fractional = decimal − 1
//!   american   = (decimal − 1)·100        if decimal ≥ 2.0
//!              = −100 / (decimal − 1)     otherwise
//!   implied    = 1 / decimal

use crate::error::{check_probability, EngineError, Result};
use crate::models::{Odds, OddsFormat};

/// Convert `value` quoted in `from` into validated decimal odds.
pub fn to_decimal(value: f64, from: OddsFormat) -> Result<Odds> {
    if !value.is_finite() {
        return Err(EngineError::InvalidOdds {
            value,
            reason: "odds must be finite",
        });
    }
    let decimal = match from {
        OddsFormat::Decimal => value,
        OddsFormat::Fractional => {
            if value <= 0.0 {
                return Err(EngineError::InvalidOdds {
                    value,
                    reason: "fractional odds must be positive",
                });
            }
            value + 1.0
        }
        OddsFormat::American => american_to_decimal(value)?,
        OddsFormat::ImpliedProbability => {
            let p = check_probability(value)?;
            1.0 / p
        }
    };
    Odds::new(decimal)
}

/// Express decimal odds in the requested format.
pub fn from_decimal(odds: Odds, to: OddsFormat) -> f64 {
    let d = odds.decimal();
    match to {
        OddsFormat::Decimal => d,
        OddsFormat::Fractional => d - 1.0,
        OddsFormat::American => {
            if d >= 2.0 {
                (d - 1.0) * 100.0
            } else {
                -100.0 / (d - 1.0)
            }
        }
        OddsFormat::ImpliedProbability => 1.0 / d,
    }
}

/// Convert an odds value between any two representations.
pub fn convert(value: f64, from: OddsFormat, to: OddsFormat) -> Result<f64> {
    let decimal = to_decimal(value, from)?;
    Ok(from_decimal(decimal, to))
}

fn american_to_decimal(american: f64) -> Result<f64> {
    if american == 0.0 {
        return Err(EngineError::InvalidOdds {
            value: american,
            reason: "american odds cannot be zero",
        });
    }
    // Between -100 and +100 there is no decimal price above evens-minus.
    if american.abs() < 100.0 {
        return Err(EngineError::InvalidOdds {
            value: american,
            reason: "american odds must be at least +100 or at most -100",
        });
    }
    if american > 0.0 {
        Ok(american / 100.0 + 1.0)
    } else {
        Ok(100.0 / american.abs() + 1.0)
    }
}

/// Parse fractional odds written as `"5/2"`, `"evs"` or a bare number.
pub fn parse_fractional(s: &str) -> Result<Odds> {
    let trimmed = s.trim();
    let invalid = |reason| EngineError::InvalidOdds {
        value: f64::NAN,
        reason,
    };
    if trimmed.eq_ignore_ascii_case("evs") || trimmed.eq_ignore_ascii_case("evens") {
        return Odds::new(2.0);
    }
    let value = match trimmed.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num
                .trim()
                .parse()
                .map_err(|_| invalid("fractional numerator is not a number"))?;
            let den: f64 = den
                .trim()
                .parse()
                .map_err(|_| invalid("fractional denominator is not a number"))?;
            if den == 0.0 {
                return Err(invalid("fractional denominator is zero"));
            }
            num / den
        }
        None => trimmed
            .parse()
            .map_err(|_| invalid("fractional odds are not a number"))?,
    };
    to_decimal(value, OddsFormat::Fractional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn decimal_to_american_favourite_and_underdog() {
        assert_relative_eq!(
            convert(2.5, OddsFormat::Decimal, OddsFormat::American).unwrap(),
            150.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(1.5, OddsFormat::Decimal, OddsFormat::American).unwrap(),
            -200.0,
            epsilon = 1e-9
        );
        // Evens sits on the positive branch
        assert_relative_eq!(
            convert(2.0, OddsFormat::Decimal, OddsFormat::American).unwrap(),
            100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn american_to_decimal_both_signs() {
        assert_relative_eq!(
            convert(150.0, OddsFormat::American, OddsFormat::Decimal).unwrap(),
            2.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(-200.0, OddsFormat::American, OddsFormat::Decimal).unwrap(),
            1.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(-100.0, OddsFormat::American, OddsFormat::Decimal).unwrap(),
            2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn american_round_trip_recovers_decimal() {
        let mut d = 1.01;
        while d < 50.0 {
            let american = convert(d, OddsFormat::Decimal, OddsFormat::American).unwrap();
            let back = convert(american, OddsFormat::American, OddsFormat::Decimal).unwrap();
            assert!((back - d).abs() < 1e-2, "round trip {} -> {} -> {}", d, american, back);
            d += 0.07;
        }
    }

    #[test]
    fn fractional_and_implied() {
        assert_relative_eq!(
            convert(3.5, OddsFormat::Decimal, OddsFormat::Fractional).unwrap(),
            2.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(2.5, OddsFormat::Fractional, OddsFormat::Decimal).unwrap(),
            3.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(4.0, OddsFormat::Decimal, OddsFormat::ImpliedProbability).unwrap(),
            0.25,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            convert(0.25, OddsFormat::ImpliedProbability, OddsFormat::Decimal).unwrap(),
            4.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(matches!(
            convert(1.0, OddsFormat::Decimal, OddsFormat::American),
            Err(EngineError::InvalidOdds { .. })
        ));
        assert!(matches!(
            convert(0.0, OddsFormat::American, OddsFormat::Decimal),
            Err(EngineError::InvalidOdds { .. })
        ));
        assert!(convert(50.0, OddsFormat::American, OddsFormat::Decimal).is_err());
        assert!(convert(f64::INFINITY, OddsFormat::Decimal, OddsFormat::Decimal).is_err());
        // Certainty has no price above 1.0
        assert!(matches!(
            convert(1.0, OddsFormat::ImpliedProbability, OddsFormat::Decimal),
            Err(EngineError::InvalidOdds { .. })
        ));
        assert!(matches!(
            convert(1.5, OddsFormat::ImpliedProbability, OddsFormat::Decimal),
            Err(EngineError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn parses_fractional_strings() {
        assert_relative_eq!(parse_fractional("5/2").unwrap().decimal(), 3.5, epsilon = 1e-9);
        assert_relative_eq!(parse_fractional(" 1/4 ").unwrap().decimal(), 1.25, epsilon = 1e-9);
        assert_relative_eq!(parse_fractional("evs").unwrap().decimal(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(parse_fractional("3").unwrap().decimal(), 4.0, epsilon = 1e-9);
        assert!(parse_fractional("5/0").is_err());
        assert!(parse_fractional("abc").is_err());
    }
}
