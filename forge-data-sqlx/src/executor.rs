use std::collections::BTreeMap;

use forge_data::{Compiled, DataError, Operation, Scalar};

/// One returned row, column name to value. Kept as a plain map rather
/// than a typed struct since the orchestrator has no schema knowledge;
/// callers decode rows into their own entity types.
pub type ExecutedRow = BTreeMap<String, Scalar>;

/// What running a [`Compiled`] statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Rows(Vec<ExecutedRow>),
    Affected(u64),
}

/// Driver-agnostic contract the orchestrator runs compiled statements
/// and transaction control through. Implementations own the live
/// connection/transaction state; every method takes `&self` so the
/// orchestrator can hold an `Executor` without exclusive access.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, compiled: &Compiled, operation: Operation) -> Result<ExecOutcome, DataError>;

    async fn begin(&self) -> Result<(), DataError>;
    async fn commit(&self) -> Result<(), DataError>;
    async fn rollback(&self) -> Result<(), DataError>;

    async fn savepoint(&self, name: &str) -> Result<(), DataError>;
    async fn release_savepoint(&self, name: &str) -> Result<(), DataError>;
    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DataError>;
}
