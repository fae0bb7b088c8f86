use std::fmt;

use crate::expr::{Expression, Lambda, UnaryOp};

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameters.as_slice() {
            [single] => write!(f, "{} => {}", single.name, self.body),
            many => {
                let names: Vec<_> = many.iter().map(|p| p.name.as_str()).collect();
                write!(f, "({}) => {}", names.join(", "), self.body)
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expression]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant { value, .. } => write!(f, "{value}"),
            Expression::Captured { name, .. } => write!(f, "@{name}"),
            Expression::Parameter(p) => write!(f, "{}", p.name),
            Expression::Member { source, member } => write!(f, "{source}.{}", member.name),
            Expression::Index { source, key } => write!(f, "{source}[{key}]"),
            Expression::Binary { op, left, right, .. } => write!(f, "({left} {} {right})", op.symbol()),
            Expression::Unary { op: UnaryOp::Not, operand, .. } => write!(f, "!{operand}"),
            Expression::Unary { op: UnaryOp::Negate, operand, .. } => write!(f, "-{operand}"),
            Expression::Convert { operand, ty } => write!(f, "Convert({operand}, {ty})"),
            Expression::TypeIs { operand, target } => write!(f, "({operand} is {target})"),
            Expression::TypeAs { operand, ty } => write!(f, "({operand} as {ty})"),
            Expression::Conditional { test, if_true, if_false, .. } => {
                write!(f, "IIF({test}, {if_true}, {if_false})")
            }
            Expression::Call { method, args, .. } => match args.split_first() {
                Some((source, rest)) if method.is_collection_operator() => {
                    write!(f, "{source}.{method}(")?;
                    write_args(f, rest)?;
                    write!(f, ")")
                }
                _ => {
                    write!(f, "{method}(")?;
                    write_args(f, args)?;
                    write!(f, ")")
                }
            },
            Expression::Lambda(l) => write!(f, "{l}"),
            Expression::Container(c) => write!(f, "{c}"),
            Expression::Wrapper(w) => write!(f, "{w}"),
            Expression::Slot { container, name, .. } => write!(f, "{container}[{name}]"),
        }
    }
}
