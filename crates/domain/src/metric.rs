use serde::{Deserialize, Serialize};
use std::fmt;

/// A ratio that may have no value because its denominator was zero.
///
/// Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Metric {
    /// The ratio has a value.
    Defined(f64),
    /// The ratio's denominator was zero.
    Undefined,
}

impl Metric {
    /// Divides `numerator` by `denominator`, undefined when the denominator
    /// is exactly zero or the result is not finite.
    #[must_use]
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return Self::Undefined;
        }
        let value = numerator / denominator;
        if value.is_finite() {
            Self::Defined(value)
        } else {
            Self::Undefined
        }
    }

    /// Returns the value if defined.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    /// Whether the metric has a value.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    /// Applies `f` to a defined value.
    #[must_use]
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Defined(v) => Self::Defined(f(v)),
            Self::Undefined => Self::Undefined,
        }
    }
}

impl From<Option<f64>> for Metric {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Undefined, Self::Defined)
    }
}

impl From<Metric> for Option<f64> {
    fn from(metric: Metric) -> Self {
        metric.value()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => match f.precision() {
                Some(p) => write!(f, "{v:.p$}"),
                None => write!(f, "{v}"),
            },
            Self::Undefined => write!(f, "n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(Metric::ratio(1.0, 4.0), Metric::Defined(0.25));
        assert_eq!(Metric::ratio(1.0, 0.0), Metric::Undefined);
        assert_eq!(Metric::ratio(0.0, 0.0), Metric::Undefined);
        assert_eq!(Metric::ratio(-3.0, 2.0).value(), Some(-1.5));
    }

    #[test]
    fn test_map_keeps_undefined() {
        assert_eq!(Metric::Undefined.map(|v| v * 2.0), Metric::Undefined);
        assert_eq!(Metric::Defined(2.0).map(|v| v * 2.0), Metric::Defined(4.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{:.2}", Metric::Defined(1.23456)), "1.23");
        assert_eq!(format!("{}", Metric::Undefined), "n/a");
    }

    #[test]
    fn test_serializes_as_nullable_number() {
        assert_eq!(serde_json::to_string(&Metric::Defined(0.5)).unwrap(), "0.5");
        assert_eq!(serde_json::to_string(&Metric::Undefined).unwrap(), "null");
        let back: Metric = serde_json::from_str("null").unwrap();
        assert_eq!(back, Metric::Undefined);
    }
}
