use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperatorKind {
    Or,
    And,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// Enum flag test.
    Has,
}

impl BinaryOperatorKind {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperatorKind::GreaterThan
                | BinaryOperatorKind::GreaterThanOrEqual
                | BinaryOperatorKind::LessThan
                | BinaryOperatorKind::LessThanOrEqual
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOperatorKind::Equal | BinaryOperatorKind::NotEqual)
    }

    pub fn is_comparison(&self) -> bool {
        self.is_relational() || self.is_equality()
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperatorKind::Or | BinaryOperatorKind::And)
    }
}

impl fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperatorKind::Or => write!(f, "or"),
            BinaryOperatorKind::And => write!(f, "and"),
            BinaryOperatorKind::Equal => write!(f, "eq"),
            BinaryOperatorKind::NotEqual => write!(f, "ne"),
            BinaryOperatorKind::GreaterThan => write!(f, "gt"),
            BinaryOperatorKind::GreaterThanOrEqual => write!(f, "ge"),
            BinaryOperatorKind::LessThan => write!(f, "lt"),
            BinaryOperatorKind::LessThanOrEqual => write!(f, "le"),
            BinaryOperatorKind::Add => write!(f, "add"),
            BinaryOperatorKind::Subtract => write!(f, "sub"),
            BinaryOperatorKind::Multiply => write!(f, "mul"),
            BinaryOperatorKind::Divide => write!(f, "div"),
            BinaryOperatorKind::Modulo => write!(f, "mod"),
            BinaryOperatorKind::Has => write!(f, "has"),
        }
    }
}

impl fmt::Debug for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryOperatorKind({})", self)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperatorKind {
    Not,
    Negate,
}

impl fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperatorKind::Not => write!(f, "not"),
            UnaryOperatorKind::Negate => write!(f, "-"),
        }
    }
}

impl fmt::Debug for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnaryOperatorKind({})", self)
    }
}
