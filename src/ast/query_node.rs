use crate::{
    ast::{BinaryOperatorKind, FilterClause, Literal, UnaryOperatorKind},
    model::EdmTypeRef,
};

/// Name of the implicit range variable of the clause's current record.
pub const THIS: &str = "$this";
/// Name of the implicit range variable of the clause's root record.
pub const IT: &str = "$it";

/// A named binding introduced by a clause (`$it`, `$this`) or a lambda (`x` in `any(x: ...)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeVariable {
    pub name: String,
    pub ty: EdmTypeRef,
}

impl RangeVariable {
    pub fn new(name: &str, ty: EdmTypeRef) -> Self {
        Self { name: name.to_string(), ty }
    }

    pub fn it(ty: EdmTypeRef) -> Self {
        Self::new(IT, ty)
    }

    pub fn this(ty: EdmTypeRef) -> Self {
        Self::new(THIS, ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    SingleValue,
    Complex,
    Collection,
    CollectionComplex,
    Navigation,
    CollectionNavigation,
}

impl PropertyKind {
    pub fn is_navigation(&self) -> bool {
        matches!(self, PropertyKind::Navigation | PropertyKind::CollectionNavigation)
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            PropertyKind::Collection | PropertyKind::CollectionComplex | PropertyKind::CollectionNavigation
        )
    }
}

/// The parsed, already-validated query AST. The binders never mutate it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// `ty` overrides the literal's own type (e.g. a null typed by context).
    Constant { value: Literal, ty: Option<EdmTypeRef> },
    RangeVariable(RangeVariable),
    Property { source: Box<QueryNode>, name: String, kind: PropertyKind },
    /// Undeclared property of an open type, or a property of a dynamic value.
    OpenProperty { source: Box<QueryNode>, name: String },
    CollectionOpenProperty { source: Box<QueryNode>, name: String },
    BinaryOperator { op: BinaryOperatorKind, left: Box<QueryNode>, right: Box<QueryNode> },
    UnaryOperator { op: UnaryOperatorKind, operand: Box<QueryNode> },
    Convert { source: Box<QueryNode>, ty: EdmTypeRef },
    FunctionCall { name: String, args: Vec<QueryNode> },
    /// Function returning a structured value (`cast(Address, NS.Derived)`).
    ResourceFunctionCall { name: String, args: Vec<QueryNode> },
    Any { source: Box<QueryNode>, range_variable: RangeVariable, body: Option<Box<QueryNode>> },
    All { source: Box<QueryNode>, range_variable: RangeVariable, body: Box<QueryNode> },
    In { left: Box<QueryNode>, right: Box<QueryNode> },
    /// `$count` segment, optionally with its own `$filter`.
    Count { source: Box<QueryNode>, filter: Option<Box<FilterClause>> },
    CollectionCast { source: Box<QueryNode>, ty: EdmTypeRef },
    ResourceCast { source: Box<QueryNode>, ty: EdmTypeRef },
    CollectionConstant { values: Vec<Literal>, element_ty: EdmTypeRef },
    // shapes without a translation rule
    NamedFunctionParameter(String),
    ParameterAlias(String),
    EntitySet(String),
    KeyLookup { source: Box<QueryNode>, keys: Vec<(String, Literal)> },
    SearchTerm(String),
}

impl QueryNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryNode::Constant { .. } => "Constant",
            QueryNode::RangeVariable(_) => "RangeVariable",
            QueryNode::Property { .. } => "Property",
            QueryNode::OpenProperty { .. } => "OpenProperty",
            QueryNode::CollectionOpenProperty { .. } => "CollectionOpenProperty",
            QueryNode::BinaryOperator { .. } => "BinaryOperator",
            QueryNode::UnaryOperator { .. } => "UnaryOperator",
            QueryNode::Convert { .. } => "Convert",
            QueryNode::FunctionCall { .. } => "FunctionCall",
            QueryNode::ResourceFunctionCall { .. } => "ResourceFunctionCall",
            QueryNode::Any { .. } => "Any",
            QueryNode::All { .. } => "All",
            QueryNode::In { .. } => "In",
            QueryNode::Count { .. } => "Count",
            QueryNode::CollectionCast { .. } => "CollectionCast",
            QueryNode::ResourceCast { .. } => "ResourceCast",
            QueryNode::CollectionConstant { .. } => "CollectionConstant",
            QueryNode::NamedFunctionParameter(_) => "NamedFunctionParameter",
            QueryNode::ParameterAlias(_) => "ParameterAlias",
            QueryNode::EntitySet(_) => "EntitySet",
            QueryNode::KeyLookup { .. } => "KeyLookup",
            QueryNode::SearchTerm(_) => "SearchTerm",
        }
    }

    pub fn constant(value: Literal) -> Self {
        QueryNode::Constant { value, ty: None }
    }

    pub fn null(ty: Option<EdmTypeRef>) -> Self {
        QueryNode::Constant { value: Literal::Null, ty }
    }

    pub fn range_variable(variable: &RangeVariable) -> Self {
        QueryNode::RangeVariable(variable.clone())
    }

    pub fn property(source: QueryNode, name: &str) -> Self {
        QueryNode::Property { source: Box::new(source), name: name.to_string(), kind: PropertyKind::SingleValue }
    }

    pub fn navigation(source: QueryNode, name: &str) -> Self {
        QueryNode::Property { source: Box::new(source), name: name.to_string(), kind: PropertyKind::Navigation }
    }

    pub fn collection_navigation(source: QueryNode, name: &str) -> Self {
        QueryNode::Property {
            source: Box::new(source),
            name: name.to_string(),
            kind: PropertyKind::CollectionNavigation,
        }
    }

    pub fn collection_property(source: QueryNode, name: &str) -> Self {
        QueryNode::Property { source: Box::new(source), name: name.to_string(), kind: PropertyKind::Collection }
    }

    pub fn open_property(source: QueryNode, name: &str) -> Self {
        QueryNode::OpenProperty { source: Box::new(source), name: name.to_string() }
    }

    pub fn binary(op: BinaryOperatorKind, left: QueryNode, right: QueryNode) -> Self {
        QueryNode::BinaryOperator { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn unary(op: UnaryOperatorKind, operand: QueryNode) -> Self {
        QueryNode::UnaryOperator { op, operand: Box::new(operand) }
    }

    pub fn convert(source: QueryNode, ty: EdmTypeRef) -> Self {
        QueryNode::Convert { source: Box::new(source), ty }
    }

    pub fn function(name: &str, args: Vec<QueryNode>) -> Self {
        QueryNode::FunctionCall { name: name.to_string(), args }
    }

    pub fn any(source: QueryNode, range_variable: RangeVariable, body: Option<QueryNode>) -> Self {
        QueryNode::Any { source: Box::new(source), range_variable, body: body.map(Box::new) }
    }

    pub fn all(source: QueryNode, range_variable: RangeVariable, body: QueryNode) -> Self {
        QueryNode::All { source: Box::new(source), range_variable, body: Box::new(body) }
    }

    pub fn in_collection(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::In { left: Box::new(left), right: Box::new(right) }
    }

    pub fn count(source: QueryNode, filter: Option<FilterClause>) -> Self {
        QueryNode::Count { source: Box::new(source), filter: filter.map(Box::new) }
    }

    /// Property path segments from the range variable down to this node, for
    /// plain (non-dynamic) access chains.
    pub fn property_path(&self) -> Option<Vec<&str>> {
        match self {
            QueryNode::RangeVariable(_) => Some(Vec::new()),
            QueryNode::Property { source, name, .. } => {
                let mut path = source.property_path()?;
                path.push(name);
                Some(path)
            }
            _ => None,
        }
    }

    /// Whether a property chain crosses a navigation property.
    pub fn crosses_navigation(&self) -> bool {
        match self {
            QueryNode::Property { source, kind, .. } => kind.is_navigation() || source.crosses_navigation(),
            _ => false,
        }
    }
}
