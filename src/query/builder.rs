//! Fluent builder for query documents.

use serde_json::{json, Map, Value};

use super::filter::{FilterBuilder, FilterNode};
use crate::config::Env;
use crate::error::{ClientError, Result};

/// Field names the server reserves for its own query document sections.
pub const RESERVED_FIELD_NAMES: [&str; 11] = [
  "__schema_name",
  "__database_id",
  "__query_type",
  "__fields",
  "__filters",
  "__filter_conditions",
  "__limit",
  "__sort",
  "__related_fields",
  "__count",
  "__env",
];

/// The operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
  #[default]
  None,
  Insert,
  Select,
  Update,
  Delete,
}

impl QueryType {
  pub fn as_u16(self) -> u16 {
    match self {
      Self::None => 0,
      Self::Insert => 1,
      Self::Select => 2,
      Self::Update => 3,
      Self::Delete => 4,
    }
  }
}

/// A query under construction against one schema.
///
/// Setters consume and return the query; validating setters return
/// `Result<Query>` for `?`-chaining:
///
/// ```
/// use zteradb::{FilterBuilder, Query};
///
/// let query = Query::new("user")
///   .select()
///   .filter_condition(FilterBuilder::new().eq("status", "A")?)
///   .sort(serde_json::json!({"name": 1}))?
///   .limit(0, 50)?;
/// # Ok::<(), zteradb::ClientError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
  pub(crate) schema_name: String,
  pub(crate) database_id: Option<String>,
  pub(crate) query_type: QueryType,
  pub(crate) fields: Map<String, Value>,
  pub(crate) filters: Map<String, Value>,
  pub(crate) filter_conditions: Vec<FilterNode>,
  pub(crate) sort: Vec<(String, i64)>,
  pub(crate) limit: Option<(i64, i64)>,
  pub(crate) related: Vec<(String, Query)>,
  pub(crate) count: bool,
  pub(crate) env: Option<Env>,
}

impl Query {
  pub fn new(schema_name: impl Into<String>) -> Self {
    Self {
      schema_name: schema_name.into(),
      ..Self::default()
    }
  }

  pub fn select(mut self) -> Self {
    self.query_type = QueryType::Select;
    self
  }

  pub fn insert(mut self) -> Self {
    self.query_type = QueryType::Insert;
    self
  }

  pub fn update(mut self) -> Self {
    self.query_type = QueryType::Update;
    self
  }

  pub fn delete(mut self) -> Self {
    self.query_type = QueryType::Delete;
    self
  }

  /// Merge an object of user fields. Reserved names are rejected.
  pub fn fields(mut self, fields: Value) -> Result<Self> {
    let map = as_object(fields, "fields")?;
    for (name, value) in map {
      check_field_name(&name)?;
      self.fields.insert(name, value);
    }
    Ok(self)
  }

  /// Set one user field. The explicit counterpart of the dynamic-property
  /// interface: names starting with `__` are rejected outright.
  pub fn set_field(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
    check_field_name(name)?;
    self.fields.insert(name.to_string(), value.into());
    Ok(self)
  }

  /// Merge equality-only filters; values must be scalars.
  pub fn filter(mut self, filters: Value) -> Result<Self> {
    let map = as_object(filters, "filter")?;
    for (name, value) in map {
      if value.is_object() || value.is_array() {
        return Err(ClientError::InvalidValue(format!(
          "filter value for '{}' must be a scalar; use filter_condition for expressions",
          name
        )));
      }
      self.filters.insert(name, value);
    }
    Ok(self)
  }

  /// Append the accumulated form of a filter expression.
  pub fn filter_condition(mut self, condition: impl Into<FilterBuilder>) -> Self {
    self.filter_conditions.extend(condition.into().build());
    self
  }

  /// Append (field, order) sort pairs; order is +1 (ascending) or -1
  /// (descending).
  pub fn sort(mut self, sort: Value) -> Result<Self> {
    let map = as_object(sort, "sort")?;
    if map.is_empty() {
      return Err(ClientError::InvalidValue(
        "sort requires at least one field".into(),
      ));
    }
    for (field, order) in map {
      let order = order.as_i64().filter(|o| *o == 1 || *o == -1).ok_or_else(|| {
        ClientError::InvalidValue(format!(
          "sort order for '{}' must be 1 or -1",
          field
        ))
      })?;
      self.sort.push((field, order));
    }
    Ok(self)
  }

  /// Restrict results to the half-open row range `[start, end)`.
  pub fn limit(mut self, start: i64, end: i64) -> Result<Self> {
    if start < 0 || end < 0 {
      return Err(ClientError::InvalidValue(format!(
        "limit bounds must be non-negative, got [{}, {})",
        start, end
      )));
    }
    if start >= end {
      return Err(ClientError::InvalidValue(format!(
        "limit start ({}) must be strictly less than end ({})",
        start, end
      )));
    }
    self.limit = Some((start, end));
    Ok(self)
  }

  /// Ask for a row count instead of rows. Once on, stays on.
  pub fn count(mut self) -> Self {
    self.count = true;
    self
  }

  /// Attach a nested query whose results are joined under `name`.
  pub fn related_field(mut self, name: &str, query: Query) -> Result<Self> {
    if name.is_empty() {
      return Err(ClientError::InvalidValue(
        "related field name must not be empty".into(),
      ));
    }
    self.related.push((name.to_string(), query));
    Ok(self)
  }

  pub fn set_env(mut self, env: Env) -> Self {
    self.env = Some(env);
    self
  }

  pub fn set_database_id(mut self, database_id: impl Into<String>) -> Self {
    self.database_id = Some(database_id.into());
    self
  }

  /// Produce the query document sent to the server.
  ///
  /// Fails when no concrete query type was chosen.
  pub fn generate(&self) -> Result<Value> {
    if self.query_type == QueryType::None {
      return Err(ClientError::InvalidValue(
        "query type not set; call select(), insert(), update() or delete()".into(),
      ));
    }

    let mut sort = Map::new();
    for (field, order) in &self.sort {
      sort.insert(field.clone(), json!(order));
    }

    let mut related = Map::new();
    for (name, query) in &self.related {
      related.insert(name.clone(), query.generate()?);
    }

    let mut doc = Map::new();
    doc.insert(
      "db".into(),
      json!(self.database_id.clone().unwrap_or_default()),
    );
    doc.insert("sh".into(), json!(self.schema_name));
    doc.insert("qt".into(), json!(self.query_type.as_u16()));
    doc.insert("fl".into(), Value::Object(self.fields.clone()));
    doc.insert("fi".into(), Value::Object(self.filters.clone()));
    doc.insert(
      "fc".into(),
      Value::Array(self.filter_conditions.iter().map(FilterNode::to_value).collect()),
    );
    doc.insert("rf".into(), Value::Object(related));
    doc.insert("st".into(), Value::Object(sort));
    doc.insert(
      "lt".into(),
      self
        .limit
        .map(|(start, end)| json!([start, end]))
        .unwrap_or(Value::Null),
    );
    doc.insert("cnt".into(), json!(self.count));
    doc.insert(
      "env".into(),
      self.env.map(|e| json!(e.as_str())).unwrap_or(Value::Null),
    );
    Ok(Value::Object(doc))
  }
}

fn as_object(value: Value, what: &str) -> Result<Map<String, Value>> {
  match value {
    Value::Object(map) => Ok(map),
    other => Err(ClientError::InvalidValue(format!(
      "{} expects a JSON object, got {}",
      what,
      json_type_name(&other)
    ))),
  }
}

fn check_field_name(name: &str) -> Result<()> {
  if name.starts_with("__") || RESERVED_FIELD_NAMES.contains(&name) {
    return Err(ClientError::InvalidValue(format!(
      "'{}' is a reserved field name",
      name
    )));
  }
  Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
