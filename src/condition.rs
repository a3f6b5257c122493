// src/condition.rs - Comparison operators and trigger/reset conditions
use crate::{
    error::{AlarmError, Result},
    value::Scalar,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// OPERATORS
// ============================================================================

/// Comparison operator accepted by `operator` and `resetOperator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `!=`
    Ne,
    /// `=`
    Eq,
}

impl Operator {
    /// Apply the operator to two numbers.
    ///
    /// Equality uses an epsilon comparison, like the EQ block.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Ne => (lhs - rhs).abs() >= f64::EPSILON,
            Operator::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }

    /// Literal form of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Ne => "!=",
            Operator::Eq => "=",
        }
    }
}

impl FromStr for Operator {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "!=" => Ok(Operator::Ne),
            "=" => Ok(Operator::Eq),
            other => Err(AlarmError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Evaluate a named operator against two numbers.
///
/// Unknown operators are an error rather than a `false` result.
pub fn evaluate(operator: &str, lhs: f64, rhs: f64) -> Result<bool> {
    Ok(operator.parse::<Operator>()?.apply(lhs, rhs))
}

// ============================================================================
// CONDITIONS
// ============================================================================

/// Outcome of evaluating one observation against both conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checks {
    /// The alarm condition holds
    pub alarm: bool,
    /// The reset condition holds
    pub reset: bool,
}

/// Resolved trigger/reset conditions of one alarm.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditions {
    /// Numeric thresholds with independent operators
    Numeric {
        operator: Operator,
        threshold: f64,
        reset_operator: Operator,
        reset_threshold: f64,
    },
    /// String equality mode; reset is the inverse of the alarm sense.
    ///
    /// `expected` is `stringValue` normalized the same way observations are,
    /// so `"007"` and `"true"` compare as the numbers they extract to.
    Text { operator: Operator, expected: Scalar },
}

impl Conditions {
    /// Classify an observation.
    ///
    /// In numeric mode a text observation cannot be compared and is
    /// reported as an unsupported shape. In text mode a number never equals
    /// a text, and operators other than `=`/`!=` never match.
    pub fn check(&self, value: &Scalar) -> Result<Checks> {
        match self {
            Conditions::Numeric {
                operator,
                threshold,
                reset_operator,
                reset_threshold,
            } => {
                let observed = value
                    .as_number()
                    .ok_or(AlarmError::UnsupportedShape("text observation for numeric threshold"))?;
                Ok(Checks {
                    alarm: operator.apply(observed, *threshold),
                    reset: reset_operator.apply(observed, *reset_threshold),
                })
            }
            Conditions::Text { operator, expected } => {
                let equal = match (value, expected) {
                    (Scalar::Number(observed), Scalar::Number(wanted)) => {
                        Operator::Eq.apply(*observed, *wanted)
                    }
                    (Scalar::Text(observed), Scalar::Text(wanted)) => observed == wanted,
                    _ => false,
                };
                Ok(match operator {
                    Operator::Eq => Checks { alarm: equal, reset: !equal },
                    Operator::Ne => Checks { alarm: !equal, reset: equal },
                    _ => Checks::default(),
                })
            }
        }
    }

    /// Human readable summary carried in alarm messages
    pub fn describe(&self) -> String {
        match self {
            Conditions::Numeric {
                operator,
                threshold,
                reset_operator,
                reset_threshold,
            } => format!(
                "alarm: value {} {}, reset: value {} {}",
                operator,
                Scalar::Number(*threshold),
                reset_operator,
                Scalar::Number(*reset_threshold)
            ),
            Conditions::Text { operator, expected } => {
                let reset = match operator {
                    Operator::Eq => Operator::Ne,
                    Operator::Ne => Operator::Eq,
                    other => *other,
                };
                format!(
                    "alarm: value {} \"{}\", reset: value {} \"{}\"",
                    operator, expected, reset, expected
                )
            }
        }
    }

    /// True when string-equality mode is active
    pub fn is_text(&self) -> bool {
        matches!(self, Conditions::Text { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(op: Operator, threshold: f64, reset_op: Operator, reset: f64) -> Conditions {
        Conditions::Numeric {
            operator: op,
            threshold,
            reset_operator: reset_op,
            reset_threshold: reset,
        }
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("<".parse::<Operator>().unwrap(), Operator::Lt);
        assert_eq!("<=".parse::<Operator>().unwrap(), Operator::Le);
        assert_eq!(">".parse::<Operator>().unwrap(), Operator::Gt);
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::Ge);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert!(matches!(
            "==".parse::<Operator>(),
            Err(AlarmError::UnknownOperator(op)) if op == "=="
        ));
    }

    #[test]
    fn test_evaluate() {
        assert!(evaluate(">", 150.0, 100.0).unwrap());
        assert!(!evaluate(">", 100.0, 100.0).unwrap());
        assert!(evaluate(">=", 100.0, 100.0).unwrap());
        assert!(evaluate("<", 1.0, 2.0).unwrap());
        assert!(evaluate("<=", 2.0, 2.0).unwrap());
        assert!(evaluate("=", 0.1 + 0.2, 0.3).unwrap());
        assert!(evaluate("!=", 1.0, 2.0).unwrap());
        assert!(evaluate("~", 1.0, 2.0).is_err());
    }

    #[test]
    fn test_numeric_checks() {
        let conditions = numeric(Operator::Gt, 100.0, Operator::Lt, 50.0);
        assert_eq!(
            conditions.check(&Scalar::Number(150.0)).unwrap(),
            Checks { alarm: true, reset: false }
        );
        assert_eq!(
            conditions.check(&Scalar::Number(75.0)).unwrap(),
            Checks { alarm: false, reset: false }
        );
        assert_eq!(
            conditions.check(&Scalar::Number(10.0)).unwrap(),
            Checks { alarm: false, reset: true }
        );
        assert!(conditions.check(&Scalar::Text("hot".into())).is_err());
    }

    #[test]
    fn test_text_equality_mode() {
        let conditions = Conditions::Text {
            operator: Operator::Eq,
            expected: "ERR".into(),
        };
        assert_eq!(
            conditions.check(&Scalar::Text("ERR".into())).unwrap(),
            Checks { alarm: true, reset: false }
        );
        assert_eq!(
            conditions.check(&Scalar::Text("OK".into())).unwrap(),
            Checks { alarm: false, reset: true }
        );
    }

    #[test]
    fn test_text_inequality_mode() {
        let conditions = Conditions::Text {
            operator: Operator::Ne,
            expected: "RUN".into(),
        };
        assert_eq!(
            conditions.check(&Scalar::Text("STOP".into())).unwrap(),
            Checks { alarm: true, reset: false }
        );
        assert_eq!(
            conditions.check(&Scalar::Text("RUN".into())).unwrap(),
            Checks { alarm: false, reset: true }
        );
    }

    #[test]
    fn test_text_mode_compares_canonical_scalars() {
        let conditions = Conditions::Text {
            operator: Operator::Eq,
            expected: Scalar::Number(42.0),
        };
        assert!(conditions.check(&Scalar::Number(42.0)).unwrap().alarm);
        assert!(conditions.check(&Scalar::Number(42.5)).unwrap().reset);
        assert!(conditions.check(&Scalar::Text("42x".into())).unwrap().reset);
    }

    #[test]
    fn test_text_mode_ignores_ordering_operators() {
        let conditions = Conditions::Text {
            operator: Operator::Gt,
            expected: "ERR".into(),
        };
        assert_eq!(
            conditions.check(&Scalar::Text("ERR".into())).unwrap(),
            Checks::default()
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            numeric(Operator::Gt, 100.0, Operator::Lt, 0.5).describe(),
            "alarm: value > 100, reset: value < 0.5"
        );
        let text = Conditions::Text {
            operator: Operator::Eq,
            expected: "ERR".into(),
        };
        assert_eq!(
            text.describe(),
            "alarm: value = \"ERR\", reset: value != \"ERR\""
        );
    }
}
