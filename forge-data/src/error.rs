/// Everything that can go wrong composing or validating a query, kept as
/// a flat enum carrying just enough context to reconstruct the failure,
/// matching the rest of the workspace's hand-rolled error style.
#[derive(Debug)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    InvalidOperator { operator: String },
    InvalidExpression { reason: String },
    EmptyWhereIn { column: String },
    MissingFrom,
    NoColumnsToInsert,
    NoValuesToUpdate,
    UnsupportedDialectFeature { feature: &'static str, dialect: &'static str },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => write!(f, "invalid {kind} identifier '{ident}'"),
            QueryError::InvalidOperator { operator } => write!(f, "operator '{operator}' is not in the allowlist"),
            QueryError::InvalidExpression { reason } => write!(f, "rejected raw expression: {reason}"),
            QueryError::EmptyWhereIn { column } => write!(f, "whereIn on '{column}' given an empty value list"),
            QueryError::MissingFrom => write!(f, "query has no FROM table set"),
            QueryError::NoColumnsToInsert => write!(f, "insert() called with no values"),
            QueryError::NoValuesToUpdate => write!(f, "update() called with no values"),
            QueryError::UnsupportedDialectFeature { feature, dialect } => {
                write!(f, "'{feature}' is not supported by the {dialect} dialect")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Errors occurring while running a compiled query or managing a
/// transaction's outermost lifecycle, kept here (rather than only in
/// `forge-data-sqlx`) so `DataError` can wrap either without that crate
/// needing a dependency edge back into the driver crate.
#[derive(Debug)]
pub enum TransactionError {
    NoActiveManager,
    InvalidState { reason: String },
    CommitFailed { depth: usize, reason: String },
    RollbackFailed { depth: usize, reason: String },
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::NoActiveManager => write!(f, "no transaction manager is active"),
            TransactionError::InvalidState { reason } => write!(f, "invalid transaction state: {reason}"),
            TransactionError::CommitFailed { depth, reason } => {
                write!(f, "commit failed at nesting depth {depth}: {reason}")
            }
            TransactionError::RollbackFailed { depth, reason } => {
                write!(f, "rollback failed at nesting depth {depth}: {reason}")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

/// Top-level data-layer error, matching the teacher's `r2e-data::DataError`
/// shape but widened with `From<QueryError>`/`From<TransactionError>` arms
/// per `spec.md` §7's unified taxonomy.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    Query(QueryError),
    Transaction(TransactionError),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type; used by
    /// backend crates (`forge-data-sqlx`) to wrap driver errors without
    /// leaking their concrete type into this crate.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "not found: {msg}"),
            DataError::Query(e) => write!(f, "query error: {e}"),
            DataError::Transaction(e) => write!(f, "transaction error: {e}"),
            DataError::Database(e) => write!(f, "database error: {e}"),
            DataError::Other(msg) => write!(f, "data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Query(e) => Some(e),
            DataError::Transaction(e) => Some(e),
            DataError::Database(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<QueryError> for DataError {
    fn from(e: QueryError) -> Self {
        DataError::Query(e)
    }
}

impl From<TransactionError> for DataError {
    fn from(e: TransactionError) -> Self {
        DataError::Transaction(e)
    }
}
