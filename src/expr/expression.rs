use crate::{
    container::{ContainerSlot, Wrapper},
    expr::{Lambda, Method, Parameter, Value},
    model::{HostMember, HostType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_relational(&self) -> bool {
        self.is_comparison() && !matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Node of the produced expression graph.
///
/// Nodes are immutable once built and always built bottom-up; every node
/// carries (or derives) its static host type.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant { value: Value, ty: HostType },
    /// A value captured by reference instead of being inlined: parameterized
    /// literals and the opaque model handle.
    Captured { name: String, value: Value, ty: HostType },
    Parameter(Parameter),
    Member { source: Box<Expression>, member: HostMember },
    /// Dictionary lookup by key.
    Index { source: Box<Expression>, key: Box<Expression> },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        /// Lifted comparison producing `Bool?` (null when an operand is null)
        /// instead of `Bool`.
        lifted_to_null: bool,
        ty: HostType,
    },
    Unary { op: UnaryOp, operand: Box<Expression>, ty: HostType },
    Convert { operand: Box<Expression>, ty: HostType },
    TypeIs { operand: Box<Expression>, target: HostType },
    TypeAs { operand: Box<Expression>, ty: HostType },
    Conditional { test: Box<Expression>, if_true: Box<Expression>, if_false: Box<Expression>, ty: HostType },
    Call { method: Method, args: Vec<Expression>, ty: HostType },
    Lambda(Lambda),
    Container(Box<ContainerSlot<Expression>>),
    Wrapper(Box<Wrapper<Expression>>),
    /// Read one named slot of a container chain.
    Slot { container: Box<Expression>, name: String, ty: HostType },
}

impl Expression {
    pub fn ty(&self) -> HostType {
        match self {
            Expression::Constant { ty, .. }
            | Expression::Captured { ty, .. }
            | Expression::Binary { ty, .. }
            | Expression::Unary { ty, .. }
            | Expression::Convert { ty, .. }
            | Expression::TypeAs { ty, .. }
            | Expression::Conditional { ty, .. }
            | Expression::Call { ty, .. }
            | Expression::Slot { ty, .. } => ty.clone(),
            Expression::Parameter(p) => p.ty.clone(),
            Expression::Member { member, .. } => member.ty.clone(),
            Expression::Index { .. } => HostType::Object,
            Expression::TypeIs { .. } => HostType::Bool,
            Expression::Lambda(l) => l.return_type(),
            Expression::Container(_) => HostType::Container,
            Expression::Wrapper(w) => HostType::Wrapper(w.kind),
        }
    }

    pub fn constant(value: Value) -> Self {
        let ty = value.host_type().unwrap_or(HostType::Object);
        Expression::Constant { value, ty }
    }

    pub fn typed_constant(value: Value, ty: HostType) -> Self {
        Expression::Constant { value, ty }
    }

    /// Null constant of (the nullable form of) `ty`.
    pub fn null(ty: &HostType) -> Self {
        Expression::Constant { value: Value::Null, ty: ty.to_nullable() }
    }

    pub fn bool(b: bool) -> Self {
        Expression::Constant { value: Value::Bool(b), ty: HostType::Bool }
    }

    pub fn captured(name: &str, value: Value, ty: HostType) -> Self {
        Expression::Captured { name: name.to_string(), value, ty }
    }

    pub fn parameter(p: &Parameter) -> Self {
        Expression::Parameter(p.clone())
    }

    pub fn member(source: Expression, member: HostMember) -> Self {
        Expression::Member { source: Box::new(source), member }
    }

    pub fn index(source: Expression, key: Expression) -> Self {
        Expression::Index { source: Box::new(source), key: Box::new(key) }
    }

    /// Binary node; the result type follows the operator family and the
    /// nullability of the operands.
    pub fn binary(op: BinaryOp, left: Expression, right: Expression, lifted_to_null: bool) -> Self {
        let (lt, rt) = (left.ty(), right.ty());
        let ty = if op.is_comparison() {
            if lifted_to_null { HostType::Bool.to_nullable() } else { HostType::Bool }
        } else if op.is_logical() {
            if lt.is_nullable_value_type() || rt.is_nullable_value_type() {
                HostType::Bool.to_nullable()
            } else {
                HostType::Bool
            }
        } else if lt.is_nullable_value_type() || rt.is_nullable_value_type() {
            lt.non_nullable().to_nullable()
        } else {
            lt
        };
        Expression::Binary { op, left: Box::new(left), right: Box::new(right), lifted_to_null, ty }
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOp::Equal, left, right, false)
    }

    pub fn not_equal(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOp::NotEqual, left, right, false)
    }

    pub fn and_also(left: Expression, right: Expression) -> Self {
        Expression::binary(BinaryOp::AndAlso, left, right, false)
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        let ty = operand.ty();
        Expression::Unary { op, operand: Box::new(operand), ty }
    }

    pub fn convert(operand: Expression, ty: HostType) -> Self {
        Expression::Convert { operand: Box::new(operand), ty }
    }

    /// Convert unless `operand` already has type `ty`.
    pub fn convert_if_needed(operand: Expression, ty: &HostType) -> Self {
        if operand.ty() == *ty { operand } else { Expression::convert(operand, ty.clone()) }
    }

    pub fn type_is(operand: Expression, target: HostType) -> Self {
        Expression::TypeIs { operand: Box::new(operand), target }
    }

    pub fn type_as(operand: Expression, ty: HostType) -> Self {
        Expression::TypeAs { operand: Box::new(operand), ty: ty.to_nullable() }
    }

    pub fn conditional(test: Expression, if_true: Expression, if_false: Expression) -> Self {
        let ty = if if_true.is_null_constant() { if_false.ty().to_nullable() } else { if_true.ty() };
        Expression::Conditional { test: Box::new(test), if_true: Box::new(if_true), if_false: Box::new(if_false), ty }
    }

    pub fn call(method: Method, args: Vec<Expression>) -> Self {
        let ty = method.result_type(&args);
        Expression::Call { method, args, ty }
    }

    pub fn lambda(lambda: Lambda) -> Self {
        Expression::Lambda(lambda)
    }

    pub fn container(slot: ContainerSlot<Expression>) -> Self {
        Expression::Container(Box::new(slot))
    }

    pub fn wrapper(wrapper: Wrapper<Expression>) -> Self {
        Expression::Wrapper(Box::new(wrapper))
    }

    pub fn slot(container: Expression, name: &str, ty: HostType) -> Self {
        Expression::Slot { container: Box::new(container), name: name.to_string(), ty }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expression::Constant { value: Value::Null, .. })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_types_depend_on_lifting() {
        let l = Expression::null(&HostType::Int32);
        let r = Expression::constant(Value::Int32(1));
        assert_eq!(Expression::binary(BinaryOp::Equal, l.clone(), r.clone(), false).ty(), HostType::Bool);
        assert_eq!(
            Expression::binary(BinaryOp::LessThan, l.clone(), r.clone(), true).ty(),
            HostType::Bool.to_nullable()
        );
        assert_eq!(Expression::binary(BinaryOp::Add, r.clone(), l, false).ty(), HostType::Int32.to_nullable());
        assert_eq!(Expression::binary(BinaryOp::Add, r.clone(), r, false).ty(), HostType::Int32);
    }

    #[test]
    fn conditional_with_null_branch_is_nullable() {
        let e = Expression::conditional(
            Expression::bool(true),
            Expression::null(&HostType::Int32),
            Expression::constant(Value::Int32(1)),
        );
        assert_eq!(e.ty(), HostType::Int32.to_nullable());
    }

    #[test]
    fn call_types_follow_method() {
        let items = Parameter::new("items", HostType::collection_of(HostType::Int32));
        let x = Parameter::new("x", HostType::Int32);
        let selector = Expression::lambda(Lambda::new(
            x.clone(),
            Expression::convert(Expression::parameter(&x), HostType::Int64),
        ));
        let select = Expression::call(Method::Select, vec![Expression::parameter(&items), selector.clone()]);
        assert_eq!(select.ty(), HostType::collection_of(HostType::Int64));

        let avg = Expression::call(Method::Average, vec![Expression::parameter(&items), selector]);
        assert_eq!(avg.ty(), HostType::Double);

        let count = Expression::call(Method::LongCount, vec![Expression::parameter(&items)]);
        assert_eq!(count.ty(), HostType::Int64);
    }
}
