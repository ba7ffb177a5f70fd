//! Filter expression trees for query predicates.
//!
//! A filter is a tree of operator nodes serialized into the `fc` section of
//! a query document. Two wire shapes exist:
//!
//! - named result: `{"operator": "=", "operand": "status", "result": "A"}`
//!   used by `=`, `!=`, `IN` and the string operators
//! - operand list: `{"operator": "&&", "operand": [ ... ]}`
//!   used by logical, arithmetic and ordered-comparison operators
//!
//! Bare strings in an operand position are field references; everything
//! else is a literal or a nested node.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ClientError, Result};

/// The closed operator alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
  And,
  Or,
  Eq,
  Ne,
  Gt,
  Gte,
  Lt,
  Lte,
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Contains,
  StartsWith,
  EndsWith,
  IContains,
  IStartsWith,
  IEndsWith,
  In,
}

impl FilterOp {
  /// The wire token for this operator.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::And => "&&",
      Self::Or => "||",
      Self::Eq => "=",
      Self::Ne => "!=",
      Self::Gt => ">",
      Self::Gte => ">=",
      Self::Lt => "<",
      Self::Lte => "<=",
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Rem => "%",
      Self::Contains => "%%",
      Self::StartsWith => "^%%",
      Self::EndsWith => "%%$",
      Self::IContains => "i%%",
      Self::IStartsWith => "^i%%",
      Self::IEndsWith => "i%%$",
      Self::In => "IN",
    }
  }

  pub fn from_token(token: &str) -> Option<Self> {
    match token {
      "&&" => Some(Self::And),
      "||" => Some(Self::Or),
      "=" => Some(Self::Eq),
      "!=" => Some(Self::Ne),
      ">" => Some(Self::Gt),
      ">=" => Some(Self::Gte),
      "<" => Some(Self::Lt),
      "<=" => Some(Self::Lte),
      "+" => Some(Self::Add),
      "-" => Some(Self::Sub),
      "*" => Some(Self::Mul),
      "/" => Some(Self::Div),
      "%" => Some(Self::Rem),
      "%%" => Some(Self::Contains),
      "^%%" => Some(Self::StartsWith),
      "%%$" => Some(Self::EndsWith),
      "i%%" => Some(Self::IContains),
      "^i%%" => Some(Self::IStartsWith),
      "i%%$" => Some(Self::IEndsWith),
      "IN" => Some(Self::In),
      _ => None,
    }
  }

  /// Whether this operator serializes with a named `result` field.
  fn takes_named_result(self) -> bool {
    matches!(
      self,
      Self::Eq
        | Self::Ne
        | Self::In
        | Self::Contains
        | Self::StartsWith
        | Self::EndsWith
        | Self::IContains
        | Self::IStartsWith
        | Self::IEndsWith
    )
  }
}

/// One value inside an operand position.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
  /// A scalar (or literal array) value.
  Literal(Value),
  /// A reference to a schema field, encoded as a bare string.
  Field(String),
  /// A nested filter node.
  Node(Box<FilterNode>),
  /// A nested multi-node sub-filter, encoded as a list of node objects.
  Nodes(Vec<FilterNode>),
}

impl FilterOperand {
  /// A literal value. Use this for string literals; bare `&str` converts to
  /// a field reference.
  pub fn literal(value: impl Into<Value>) -> Self {
    Self::Literal(value.into())
  }

  pub fn field(name: impl Into<String>) -> Self {
    Self::Field(name.into())
  }

  pub fn to_value(&self) -> Value {
    match self {
      Self::Literal(value) => value.clone(),
      Self::Field(name) => Value::String(name.clone()),
      Self::Node(node) => node.to_value(),
      Self::Nodes(nodes) => Value::Array(nodes.iter().map(FilterNode::to_value).collect()),
    }
  }

  pub fn from_value(value: &Value) -> Result<Self> {
    match value {
      Value::Object(_) => Ok(Self::Node(Box::new(FilterNode::from_value(value)?))),
      Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
        let nodes = items
          .iter()
          .map(FilterNode::from_value)
          .collect::<Result<Vec<_>>>()?;
        Ok(Self::Nodes(nodes))
      }
      Value::String(name) => Ok(Self::Field(name.clone())),
      other => Ok(Self::Literal(other.clone())),
    }
  }

  /// A single value usable as a division or modulo operand: anything but a
  /// list shape.
  fn is_single_value(&self) -> bool {
    match self {
      Self::Literal(value) => !value.is_array(),
      Self::Field(_) | Self::Node(_) => true,
      Self::Nodes(_) => false,
    }
  }
}

impl From<&str> for FilterOperand {
  fn from(name: &str) -> Self {
    Self::Field(name.to_string())
  }
}

impl From<String> for FilterOperand {
  fn from(name: String) -> Self {
    Self::Field(name)
  }
}

impl From<i64> for FilterOperand {
  fn from(value: i64) -> Self {
    Self::Literal(value.into())
  }
}

impl From<i32> for FilterOperand {
  fn from(value: i32) -> Self {
    Self::Literal(value.into())
  }
}

impl From<f64> for FilterOperand {
  fn from(value: f64) -> Self {
    Self::Literal(value.into())
  }
}

impl From<bool> for FilterOperand {
  fn from(value: bool) -> Self {
    Self::Literal(value.into())
  }
}

impl From<Value> for FilterOperand {
  fn from(value: Value) -> Self {
    Self::Literal(value)
  }
}

impl From<FilterNode> for FilterOperand {
  fn from(node: FilterNode) -> Self {
    Self::Node(Box::new(node))
  }
}

impl From<FilterBuilder> for FilterOperand {
  fn from(builder: FilterBuilder) -> Self {
    let mut nodes = builder.nodes;
    if nodes.len() == 1 {
      Self::Node(Box::new(nodes.remove(0)))
    } else {
      Self::Nodes(nodes)
    }
  }
}

/// One node of a filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
  /// `{operator, operand, result}`
  Binary {
    op: FilterOp,
    operand: FilterOperand,
    result: Value,
  },
  /// `{operator, operand: [..]}`
  Nary {
    op: FilterOp,
    operands: Vec<FilterOperand>,
  },
}

impl FilterNode {
  pub fn op(&self) -> FilterOp {
    match self {
      Self::Binary { op, .. } | Self::Nary { op, .. } => *op,
    }
  }

  /// Serialize into the wire shape.
  pub fn to_value(&self) -> Value {
    match self {
      Self::Binary {
        op,
        operand,
        result,
      } => json!({
        "operator": op.as_str(),
        "operand": operand.to_value(),
        "result": result,
      }),
      Self::Nary { op, operands } => json!({
        "operator": op.as_str(),
        "operand": operands.iter().map(FilterOperand::to_value).collect::<Vec<_>>(),
      }),
    }
  }

  /// Rebuild a node from its wire shape.
  pub fn from_value(value: &Value) -> Result<Self> {
    let object = value
      .as_object()
      .ok_or_else(|| ClientError::InvalidValue("filter node must be a JSON object".into()))?;
    let token = object
      .get("operator")
      .and_then(Value::as_str)
      .ok_or_else(|| ClientError::InvalidValue("filter node is missing its operator".into()))?;
    let op = FilterOp::from_token(token)
      .ok_or_else(|| ClientError::InvalidValue(format!("unknown filter operator '{}'", token)))?;
    let operand = object
      .get("operand")
      .ok_or_else(|| ClientError::InvalidValue("filter node is missing its operand".into()))?;

    if op.takes_named_result() {
      let result = object
        .get("result")
        .ok_or_else(|| ClientError::InvalidValue("filter node is missing its result".into()))?;
      Ok(Self::Binary {
        op,
        operand: FilterOperand::from_value(operand)?,
        result: result.clone(),
      })
    } else {
      let items = operand.as_array().ok_or_else(|| {
        ClientError::InvalidValue(format!("operator '{}' requires an operand list", token))
      })?;
      let operands = items
        .iter()
        .map(FilterOperand::from_value)
        .collect::<Result<Vec<_>>>()?;
      Ok(Self::Nary { op, operands })
    }
  }
}

impl Serialize for FilterNode {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    self.to_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for FilterNode {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Self::from_value(&value).map_err(D::Error::custom)
  }
}

impl From<FilterNode> for FilterBuilder {
  fn from(node: FilterNode) -> Self {
    FilterBuilder::new().push(node)
  }
}

/// Accumulates filter nodes; every constructor validates its inputs and
/// returns the builder for chaining with `?`.
///
/// ```
/// use zteradb::FilterBuilder;
///
/// let filter = FilterBuilder::new()
///   .eq("status", "A")?
///   .istarts_with("name", "S")?;
/// # Ok::<(), zteradb::ClientError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
  nodes: Vec<FilterNode>,
}

impl FilterBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(mut self, node: FilterNode) -> Self {
    self.nodes.push(node);
    self
  }

  /// Logical AND over a list of operands.
  pub fn and(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.logical(FilterOp::And, operands)
  }

  /// Logical OR over a list of operands.
  pub fn or(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.logical(FilterOp::Or, operands)
  }

  fn logical(mut self, op: FilterOp, operands: Vec<FilterOperand>) -> Result<Self> {
    self.nodes.push(FilterNode::Nary { op, operands });
    Ok(self)
  }

  pub fn eq(self, field: &str, value: impl Into<Value>) -> Result<Self> {
    self.named_result(FilterOp::Eq, field, value.into())
  }

  pub fn ne(self, field: &str, value: impl Into<Value>) -> Result<Self> {
    self.named_result(FilterOp::Ne, field, value.into())
  }

  pub fn gt(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.ordered(FilterOp::Gt, operands)
  }

  pub fn gte(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.ordered(FilterOp::Gte, operands)
  }

  pub fn lt(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.ordered(FilterOp::Lt, operands)
  }

  pub fn lte(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.ordered(FilterOp::Lte, operands)
  }

  fn ordered(mut self, op: FilterOp, operands: Vec<FilterOperand>) -> Result<Self> {
    if operands.len() < 2 {
      return Err(ClientError::InvalidValue(format!(
        "comparison '{}' requires at least two operands, got {}",
        op.as_str(),
        operands.len()
      )));
    }
    self.nodes.push(FilterNode::Nary { op, operands });
    Ok(self)
  }

  pub fn add(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.arithmetic(FilterOp::Add, operands)
  }

  pub fn sub(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.arithmetic(FilterOp::Sub, operands)
  }

  pub fn mul(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.arithmetic(FilterOp::Mul, operands)
  }

  /// Division. Operands must be single values (no lists); a zero divisor is
  /// not rejected here and will surface as a server-side error.
  pub fn div(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.division(FilterOp::Div, operands)
  }

  /// Modulo. Same operand rules as [`FilterBuilder::div`].
  pub fn rem(self, operands: Vec<FilterOperand>) -> Result<Self> {
    self.division(FilterOp::Rem, operands)
  }

  fn arithmetic(mut self, op: FilterOp, operands: Vec<FilterOperand>) -> Result<Self> {
    if operands.len() < 2 {
      return Err(ClientError::InvalidValue(format!(
        "arithmetic '{}' requires at least two operands, got {}",
        op.as_str(),
        operands.len()
      )));
    }
    self.nodes.push(FilterNode::Nary { op, operands });
    Ok(self)
  }

  fn division(self, op: FilterOp, operands: Vec<FilterOperand>) -> Result<Self> {
    if let Some(bad) = operands.iter().find(|operand| !operand.is_single_value()) {
      return Err(ClientError::InvalidValue(format!(
        "operator '{}' requires single-value operands, got {:?}",
        op.as_str(),
        bad
      )));
    }
    self.arithmetic(op, operands)
  }

  pub fn contains(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::Contains, field, pattern)
  }

  pub fn starts_with(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::StartsWith, field, pattern)
  }

  pub fn ends_with(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::EndsWith, field, pattern)
  }

  pub fn icontains(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::IContains, field, pattern)
  }

  pub fn istarts_with(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::IStartsWith, field, pattern)
  }

  pub fn iends_with(self, field: &str, pattern: &str) -> Result<Self> {
    self.string_op(FilterOp::IEndsWith, field, pattern)
  }

  fn string_op(mut self, op: FilterOp, field: &str, pattern: &str) -> Result<Self> {
    if field.is_empty() || pattern.is_empty() {
      return Err(ClientError::InvalidValue(format!(
        "string operator '{}' requires non-empty field and pattern",
        op.as_str()
      )));
    }
    self.nodes.push(FilterNode::Binary {
      op,
      operand: FilterOperand::Field(field.to_string()),
      result: Value::String(pattern.to_string()),
    });
    Ok(self)
  }

  /// Set membership: the field's value must equal one of `values`.
  pub fn is_in(mut self, field: &str, values: Vec<Value>) -> Result<Self> {
    if field.is_empty() {
      return Err(ClientError::InvalidValue(
        "IN requires a non-empty field name".into(),
      ));
    }
    self.nodes.push(FilterNode::Binary {
      op: FilterOp::In,
      operand: FilterOperand::Field(field.to_string()),
      result: Value::Array(values),
    });
    Ok(self)
  }

  fn named_result(mut self, op: FilterOp, field: &str, result: Value) -> Result<Self> {
    if field.is_empty() {
      return Err(ClientError::InvalidValue(format!(
        "operator '{}' requires a non-empty field name",
        op.as_str()
      )));
    }
    self.nodes.push(FilterNode::Binary {
      op,
      operand: FilterOperand::Field(field.to_string()),
      result,
    });
    Ok(self)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn nodes(&self) -> &[FilterNode] {
    &self.nodes
  }

  /// Consume the builder, yielding the accumulated nodes.
  pub fn build(self) -> Vec<FilterNode> {
    self.nodes
  }

  /// The accumulated form: a single node unwraps to its object, more than
  /// one becomes the node list.
  pub fn to_value(&self) -> Value {
    if self.nodes.len() == 1 {
      self.nodes[0].to_value()
    } else {
      Value::Array(self.nodes.iter().map(FilterNode::to_value).collect())
    }
  }
}
