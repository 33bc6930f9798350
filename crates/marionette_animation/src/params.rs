//! Controller parameters and transition predicates.

use std::fmt;

/// Tolerance used by float comparisons in transition conditions.
pub const PREDICATE_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int,
    Float,
    Bool,
}

impl ParamType {
    /// Case-insensitive; unknown strings fall back to `Float`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("int") {
            Self::Int
        } else if s.eq_ignore_ascii_case("bool") {
            Self::Bool
        } else {
            Self::Float
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl Default for ParamValue {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

impl ParamValue {
    #[must_use]
    pub fn param_type(self) -> ParamType {
        match self {
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::Bool(_) => ParamType::Bool,
        }
    }

    #[must_use]
    pub fn as_float(self) -> f32 {
        match self {
            Self::Int(i) => i as f32,
            Self::Float(f) => f,
            Self::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    #[must_use]
    pub fn as_int(self) -> i32 {
        match self {
            Self::Int(i) => i,
            Self::Float(f) => f as i32,
            Self::Bool(b) => i32::from(b),
        }
    }

    #[must_use]
    pub fn as_bool(self) -> bool {
        match self {
            Self::Int(i) => i != 0,
            Self::Float(f) => f != 0.0,
            Self::Bool(b) => b,
        }
    }

    /// Converts to `ty`, keeping the value as close as the target allows.
    #[must_use]
    pub fn coerce(self, ty: ParamType) -> Self {
        match ty {
            ParamType::Int => Self::Int(self.as_int()),
            ParamType::Float => Self::Float(self.as_float()),
            ParamType::Bool => Self::Bool(self.as_bool()),
        }
    }

    /// `self <pred> operand`, compared in `self`'s type.
    ///
    /// Floats use [`PREDICATE_EPSILON`] for equality and strict ordering.
    /// Bools support only equality and inequality; ordering predicates
    /// behave as equality.
    #[must_use]
    pub fn test(self, predicate: Predicate, operand: Self) -> bool {
        match self {
            Self::Float(v) => predicate.test_float(v, operand.as_float()),
            Self::Int(v) => predicate.test_int(v, operand.as_int()),
            Self::Bool(v) => {
                let eq = v == operand.as_bool();
                match predicate {
                    Predicate::Unknown => false,
                    Predicate::NotEqual => !eq,
                    _ => eq,
                }
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i} (int)"),
            Self::Float(v) => write!(f, "{v:.3} (float)"),
            Self::Bool(b) => write!(f, "{b} (bool)"),
        }
    }
}

/// Comparison operator of a transition condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Predicate {
    Equal,
    NotEqual,
    Greater,
    Less,
    /// Never satisfied.
    #[default]
    Unknown,
}

impl Predicate {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::Greater,
            "<" => Self::Less,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Unknown => "",
        }
    }

    #[must_use]
    pub fn test_float(self, a: f32, b: f32) -> bool {
        let eq = (a - b).abs() < PREDICATE_EPSILON;
        match self {
            Self::Equal => eq,
            Self::NotEqual => !eq,
            Self::Greater => a > b + PREDICATE_EPSILON,
            Self::Less => a < b - PREDICATE_EPSILON,
            Self::Unknown => false,
        }
    }

    #[must_use]
    pub fn test_int(self, a: i32, b: i32) -> bool {
        match self {
            Self::Equal => a == b,
            Self::NotEqual => a != b,
            Self::Greater => a > b,
            Self::Less => a < b,
            Self::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_predicates_use_epsilon() {
        assert!(Predicate::Equal.test_float(1.0, 1.0 + 1e-6));
        assert!(!Predicate::NotEqual.test_float(1.0, 1.0 + 1e-6));
        assert!(!Predicate::Greater.test_float(1.0 + 1e-6, 1.0));
        assert!(Predicate::Greater.test_float(0.5, 0.1));
        assert!(Predicate::Less.test_float(0.0, 0.1));
        assert!(!Predicate::Less.test_float(0.1, 0.1));
        assert!(!Predicate::Unknown.test_float(0.0, 0.0));
    }

    #[test]
    fn int_predicates_are_exact() {
        assert!(Predicate::Greater.test_int(2, 1));
        assert!(!Predicate::Greater.test_int(1, 1));
        assert!(Predicate::Less.test_int(0, 1));
        assert!(Predicate::NotEqual.test_int(0, 1));
    }

    #[test]
    fn bool_predicates() {
        let t = ParamValue::Bool(true);
        assert!(t.test(Predicate::Equal, ParamValue::Bool(true)));
        assert!(t.test(Predicate::NotEqual, ParamValue::Bool(false)));
        assert!(!t.test(Predicate::Unknown, ParamValue::Bool(true)));
    }

    #[test]
    fn parse_is_tolerant() {
        assert_eq!(ParamType::parse("INT"), ParamType::Int);
        assert_eq!(ParamType::parse("Bool"), ParamType::Bool);
        assert_eq!(ParamType::parse("whatever"), ParamType::Float);
        assert_eq!(Predicate::parse(">"), Predicate::Greater);
        assert_eq!(Predicate::parse(">="), Predicate::Unknown);
    }

    #[test]
    fn coerce_between_types() {
        assert_eq!(ParamValue::Float(2.7).coerce(ParamType::Int), ParamValue::Int(2));
        assert_eq!(ParamValue::Int(0).coerce(ParamType::Bool), ParamValue::Bool(false));
        assert_eq!(ParamValue::Bool(true).coerce(ParamType::Float), ParamValue::Float(1.0));
    }
}
