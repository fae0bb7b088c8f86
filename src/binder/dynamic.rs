use tracing::trace;

use crate::{
    ast::QueryNode,
    binder::{BinderContext, NullPropagation, PropertyBinder, QueryBinder},
    error::{BinderError, Result},
    expr::{Expression, Method, Value},
    model::HostType,
};

/// Access to undeclared properties of open types and to properties of
/// dynamically typed values.
pub struct DynamicPropertyBinder;

impl DynamicPropertyBinder {
    pub fn bind_open_property(source: &QueryNode, name: &str, ctx: &mut BinderContext) -> Result<Expression> {
        if matches!(source, QueryNode::RangeVariable(_)) {
            if let Some(computed) = ctx.computed_properties.get(name).cloned() {
                trace!(name, "binding computed property");
                return QueryBinder::bind(&computed.expression, ctx);
            }
        }

        let source = QueryBinder::bind(source, ctx)?;
        match source.ty() {
            HostType::Object => Ok(Self::nested_access(source, name, ctx)),
            HostType::Record(type_name) => Self::dictionary_access(source, &type_name, name, ctx),
            other => Err(BinderError::PropertyNotFound { type_name: other.to_string(), property: name.to_string() }),
        }
    }

    /// Guarded lookup in the open-property dictionary of `source`.
    fn dictionary_access(source: Expression, type_name: &str, name: &str, ctx: &BinderContext) -> Result<Expression> {
        if ctx.model.resolve_member(type_name, name).is_some() {
            return PropertyBinder::member_access(source, name, ctx);
        }
        let not_found = || BinderError::PropertyNotFound { type_name: type_name.to_string(), property: name.to_string() };
        if !ctx.model.is_open_type(type_name) {
            return Err(not_found());
        }
        let bag = ctx.model.dynamic_property_member(type_name).ok_or_else(not_found)?;

        let dictionary = Expression::member(source.clone(), bag);
        let key = Expression::constant(Value::string(name));
        let contains = Expression::call(Method::ContainsKey, vec![dictionary.clone(), key.clone()]);
        let test = if ctx.settings.null_propagation {
            Expression::and_also(Expression::not_equal(dictionary.clone(), Expression::null(&HostType::Dictionary)), contains)
        } else {
            contains
        };
        let lookup = Expression::conditional(test, Expression::index(dictionary, key), Expression::null(&HostType::Object));
        Ok(NullPropagation::guard_if_needed(&source, lookup, ctx))
    }

    /// Property of a dynamic value. Its run-time shape decides: a declared
    /// member of its record type wins, the open-property dictionary is the
    /// fallback.
    fn nested_access(parent: Expression, name: &str, ctx: &BinderContext) -> Expression {
        let model = ctx.model_expression();
        let key = Expression::constant(Value::string(name));
        Expression::conditional(
            Expression::call(Method::HasDeclaredProperty, vec![model.clone(), parent.clone(), key.clone()]),
            Expression::call(Method::DeclaredProperty, vec![parent.clone(), key.clone()]),
            Expression::call(Method::DynamicProperty, vec![model, parent, key]),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{BinaryOperatorKind, ComputeExpression, QueryNode},
        binder::{
            _tests::{context_for, customer, customer_context, customer_type, customers, int, it, run, schema},
            BinderSettings,
        },
        expr::{Interpreter, Lambda, Record},
        model::EdmTypeRef,
    };
    use indexmap::IndexMap;

    use super::*;

    fn open(path: &str) -> QueryNode {
        path.split('/').fold(it(customer_type()), |node, segment| QueryNode::open_property(node, segment))
    }

    fn bind(node: &QueryNode, ctx: &mut BinderContext) -> Lambda {
        let body = QueryBinder::bind(node, ctx).unwrap();
        Lambda::new(ctx.current().clone(), body)
    }

    #[test]
    fn open_property_on_null_dictionary_is_null() {
        let mut ctx = customer_context();
        let nickname = bind(&open("Nickname"), &mut ctx);
        assert_eq!(nickname.return_type(), HostType::Object);
        assert_eq!(run(&nickname, &customers()), vec![Value::string("Sammy"), Value::Null, Value::Int32(5)]);
    }

    #[test]
    fn contains_key_alone_without_null_propagation() {
        let mut ctx = context_for(&customer_type(), BinderSettings::without_null_propagation());
        let nickname = bind(&open("Nickname"), &mut ctx);
        assert!(!nickname.to_string().contains("!= null"));
        let on_null_bag = Interpreter::invoke(&nickname, customers()[1].clone());
        assert!(on_null_bag.is_err());
    }

    #[test]
    fn declared_name_under_open_node_reads_the_member() {
        let mut ctx = customer_context();
        let name = bind(&open("Name"), &mut ctx);
        assert_eq!(name.return_type(), HostType::String);
        assert_eq!(run(&name, &customers())[0], Value::string("Sam"));
    }

    #[test]
    fn undeclared_name_on_closed_type_is_not_found() {
        let order = EdmTypeRef::entity("NS.Order");
        let mut ctx = context_for(&order, BinderSettings::new());
        let note = QueryBinder::bind(&QueryNode::open_property(it(order), "Note"), &mut ctx);
        assert_eq!(
            note,
            Err(BinderError::PropertyNotFound { type_name: "NS.Order".into(), property: "Note".into() })
        );
    }

    #[test]
    fn nested_dynamic_access_falls_back_to_dictionary() {
        let mut ctx = customer_context();
        let level = bind(&open("Meta/Level"), &mut ctx);
        assert!(level.to_string().contains("HasDeclaredProperty(@model"));
        assert_eq!(run(&level, &customers()), vec![Value::Int32(3), Value::Null, Value::Null]);
    }

    #[test]
    fn nested_dynamic_access_prefers_declared_member() {
        let mut ctx = customer_context();
        let city = bind(&open("Home/City"), &mut ctx);

        let address = schema()
            .record_from_json("NS.Address", &serde_json::json!({"City": "Oslo", "Zip": "0150"}))
            .unwrap();
        let mut bag = IndexMap::new();
        bag.insert("Home".to_string(), address);
        let ghost = Value::record(Record::new("NS.Ghost"));
        bag.insert("Ghost".to_string(), ghost);
        let customer = Value::record(Record::new("NS.Customer").with("DynamicProperties", Value::dictionary(bag)));

        assert_eq!(Interpreter::invoke(&city, customer.clone()), Ok(Value::string("Oslo")));

        let ghost_name = bind(&open("Ghost/Name"), &mut ctx);
        assert_eq!(
            Interpreter::invoke(&ghost_name, customer),
            Err(BinderError::ResourceTypeNotInModel("NS.Ghost".into()))
        );
    }

    #[test]
    fn computed_aliases_bind_their_definition() {
        let mut ctx = customer_context();
        let doubled = QueryNode::binary(BinaryOperatorKind::Multiply, customer("Rank"), int(2));
        ctx.computed_properties.insert("Doubled".into(), ComputeExpression::new(doubled, "Doubled"));
        let lambda = bind(&open("Doubled"), &mut ctx);
        assert_eq!(run(&lambda, &customers()), vec![Value::Int64(6), Value::Int64(2), Value::Int64(4)]);
    }
}
