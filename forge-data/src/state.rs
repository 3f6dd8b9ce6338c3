use std::collections::BTreeMap;

use crate::error::QueryError;

/// A bound scalar value, flowing only through parameterized statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}
impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}
impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}
impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}
impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

/// A resolved parameter: a value plus a unique key. The key carries a
/// random suffix so repeated binds of the same column never collide
/// inside one compiled statement, per `spec.md` §4.10.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub key: String,
    pub value: Scalar,
}

/// Generates binding keys unique within one compiled query. Not
/// cryptographically meaningful; the randomness only exists to make
/// collisions between two binds of the same column name impossible
/// without threading a global counter through the builder.
pub fn fresh_binding(column: &str, value: Scalar) -> Binding {
    use rand::Rng;
    let suffix: u32 = rand::thread_rng().gen();
    Binding { key: format!("{column}_{suffix:08x}"), value }
}

/// An opaque, trusted raw SQL fragment. Only constructible through
/// [`Expression::raw`], which rejects anything that could smuggle a
/// second statement or comment past the query builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(String);

impl Expression {
    pub fn raw(sql: impl Into<String>) -> Result<Self, QueryError> {
        let sql = sql.into();
        if !sql.is_ascii() {
            return Err(QueryError::InvalidExpression { reason: "expression must be ASCII".into() });
        }
        if sql.chars().any(|c| c.is_control()) {
            return Err(QueryError::InvalidExpression { reason: "expression contains a control character".into() });
        }
        if sql.contains(';') {
            return Err(QueryError::InvalidExpression { reason: "expression contains ';'".into() });
        }
        if sql.contains("--") {
            return Err(QueryError::InvalidExpression { reason: "expression contains a SQL line comment".into() });
        }
        if sql.contains("/*") || sql.contains("*/") {
            return Err(QueryError::InvalidExpression { reason: "expression contains a SQL block comment".into() });
        }
        Ok(Expression(sql))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A column reference, or a trusted raw fragment standing in for one
/// (`selectRaw`).
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Column(String),
    Raw(Expression),
}

/// Closed allowlist of comparison operators `spec.md` §4.10 requires;
/// nothing outside this set reaches SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "like" | "LIKE" => Ok(Operator::Like),
            "not like" | "NOT LIKE" => Ok(Operator::NotLike),
            other => Err(QueryError::InvalidOperator { operator: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    FullOuter,
    Cross,
    Natural,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left: String,
    pub operator: Operator,
    pub right: String,
    pub boolean: Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: String,
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub conditions: Vec<JoinCondition>,
}

/// One WHERE/HAVING predicate. `boolean` says how it combines with the
/// predicate before it (ignored for the first predicate in a list).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison { column: String, operator: Operator, value: Binding, boolean: Boolean },
    ColumnComparison { left: String, operator: Operator, right: String, boolean: Boolean },
    In { column: String, values: Vec<Binding>, negate: bool, boolean: Boolean },
    Null { column: String, negate: bool, boolean: Boolean },
    Between { column: String, low: Binding, high: Binding, negate: bool, boolean: Boolean },
    Raw { expression: Expression, bindings: Vec<Binding>, boolean: Boolean },
    JsonContains { column: String, path: Option<String>, value: Binding, boolean: Boolean },
    FullText { columns: Vec<String>, query: String, boolean: Boolean },
    Today { column: String, boolean: Boolean },
    Past { column: String, boolean: Boolean },
    Future { column: String, boolean: Boolean },
}

impl Predicate {
    pub fn boolean(&self) -> Boolean {
        match self {
            Predicate::Comparison { boolean, .. }
            | Predicate::ColumnComparison { boolean, .. }
            | Predicate::In { boolean, .. }
            | Predicate::Null { boolean, .. }
            | Predicate::Between { boolean, .. }
            | Predicate::Raw { boolean, .. }
            | Predicate::JsonContains { boolean, .. }
            | Predicate::FullText { boolean, .. }
            | Predicate::Today { boolean, .. }
            | Predicate::Past { boolean, .. }
            | Predicate::Future { boolean, .. } => *boolean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    Column { column: String, direction: Direction },
    Field { column: String, values: Vec<Scalar> },
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashMode {
    Exclude,
    WithTrashed,
    OnlyTrashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftDeleteState {
    pub enabled: bool,
    pub column: String,
    pub mode: TrashMode,
}

impl Default for SoftDeleteState {
    fn default() -> Self {
        Self { enabled: false, column: "deleted_at".to_string(), mode: TrashMode::Exclude }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

/// The query builder's entire mutable-looking-but-immutable state.
/// Every builder mutator clones this and returns a new value; nothing
/// here is ever mutated in place once attached to a `QueryBuilder`
/// that's been handed back to a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub from: Option<String>,
    pub columns: Vec<SelectColumn>,
    pub distinct: bool,
    pub joins: Vec<JoinClause>,
    pub conditions: Vec<Predicate>,
    pub groups: Vec<String>,
    pub havings: Vec<Predicate>,
    pub orders: Vec<OrderSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub values: Option<BTreeMap<String, Scalar>>,
    pub operation: Operation,
    pub soft_delete: SoftDeleteState,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            from: None,
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            conditions: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            values: None,
            operation: Operation::Select,
            soft_delete: SoftDeleteState::default(),
        }
    }
}

/// Validate a column/table identifier against the conservative pattern
/// `spec.md` §4.10 mandates, without pulling in `regex` for a check this
/// cheap.
pub fn is_valid_identifier(ident: &str) -> bool {
    !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_identifier(ident: &str, kind: &'static str) -> Result<(), QueryError> {
    if is_valid_identifier(ident) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier { kind, ident: ident.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_rejects_semicolon() {
        assert!(Expression::raw("id = 1; DROP TABLE users").is_err());
    }

    #[test]
    fn expression_rejects_line_comment() {
        assert!(Expression::raw("id = 1 -- comment").is_err());
    }

    #[test]
    fn expression_rejects_block_comment() {
        assert!(Expression::raw("id = 1 /* comment */").is_err());
    }

    #[test]
    fn expression_rejects_non_ascii() {
        assert!(Expression::raw("naïve = 1").is_err());
    }

    #[test]
    fn expression_accepts_clean_fragment() {
        assert!(Expression::raw("COUNT(*) AS total").is_ok());
    }

    #[test]
    fn identifier_validation_rejects_sql_injection_attempt() {
        assert!(!is_valid_identifier("users; DROP TABLE users"));
        assert!(is_valid_identifier("users"));
    }

    #[test]
    fn operator_parse_rejects_unknown() {
        assert!(Operator::parse("UNION SELECT").is_err());
    }

    #[test]
    fn fresh_bindings_for_same_column_never_collide() {
        let a = fresh_binding("id", Scalar::Int(1));
        let b = fresh_binding("id", Scalar::Int(1));
        assert_ne!(a.key, b.key);
    }
}
