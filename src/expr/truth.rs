use std::{fmt, ops};

use crate::expr::Value;

/// Value of a lifted `Bool?` under three-valued logic. `Unknown` is the null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// `false` dominates, then `Unknown`.
    pub fn and(self, other: Self) -> Self {
        use Truth::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Unknown,
        }
    }

    /// `true` dominates, then `Unknown`.
    pub fn or(self, other: Self) -> Self {
        use Truth::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, False) => False,
            _ => Unknown,
        }
    }

    /// Lifted `==`: unknown if either side is.
    pub fn lifted_eq(self, other: Self) -> Self {
        if self.is_unknown() || other.is_unknown() { Truth::Unknown } else { Truth::from(self == other) }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Truth::Unknown)
    }

    /// `None` for values that are neither null nor boolean.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Truth::Unknown),
            Value::Bool(b) => Some(Truth::from(*b)),
            _ => None,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            Truth::Unknown => Value::Null,
            known => Value::Bool(known == Truth::True),
        }
    }
}

impl ops::Not for Truth {
    type Output = Truth;

    fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Truth::True => "true",
            Truth::False => "false",
            Truth::Unknown => "null",
        };
        f.write_str(text)
    }
}
