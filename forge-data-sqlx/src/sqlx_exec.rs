use std::collections::BTreeMap;

use forge_data::{Compiled, DataError, Operation, Scalar};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Column, Row, Transaction};

use crate::error::SqlxErrorExt;
use crate::executor::{ExecOutcome, Executor, ExecutedRow};

enum ConnState {
    Idle,
    InTransaction(Transaction<'static, Any>),
}

/// `sqlx`-backed [`Executor`], generic across every driver `sqlx::Any`
/// covers (the workspace enables the concrete drivers it needs through
/// `forge-data-sqlx`'s `sqlite`/`postgres`/`mysql` Cargo features). A
/// single connection pool plus one mutable transaction slot: `run`
/// executes against the pool when idle and against the open
/// transaction once one exists.
pub struct SqlxExecutor {
    pool: AnyPool,
    state: std::sync::Mutex<ConnState>,
}

impl SqlxExecutor {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool, state: std::sync::Mutex::new(ConnState::Idle) }
    }

    pub async fn connect(url: &str) -> Result<Self, DataError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect(url).await.map_err(SqlxErrorExt::into_query_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn take_state(&self) -> ConnState {
        let mut guard = self.state.lock().expect("executor connection state lock poisoned");
        std::mem::replace(&mut *guard, ConnState::Idle)
    }

    fn put_state(&self, state: ConnState) {
        *self.state.lock().expect("executor connection state lock poisoned") = state;
    }
}

fn bind_scalar<'q>(
    mut query: sqlx::query::Query<'q, Any, AnyArguments<'q>>,
    scalar: &'q Scalar,
) -> sqlx::query::Query<'q, Any, AnyArguments<'q>> {
    query = match scalar {
        Scalar::Str(s) => query.bind(s.as_str()),
        Scalar::Int(i) => query.bind(*i),
        Scalar::Float(f) => query.bind(*f),
        Scalar::Bool(b) => query.bind(*b),
        Scalar::Null => query.bind(Option::<i64>::None),
    };
    query
}

fn decode_row(row: &AnyRow) -> ExecutedRow {
    let mut out = BTreeMap::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let idx = column.ordinal();
        let value = row
            .try_get::<i64, _>(idx)
            .map(Scalar::Int)
            .or_else(|_| row.try_get::<f64, _>(idx).map(Scalar::Float))
            .or_else(|_| row.try_get::<bool, _>(idx).map(Scalar::Bool))
            .or_else(|_| row.try_get::<String, _>(idx).map(Scalar::Str))
            .unwrap_or(Scalar::Null);
        out.insert(name, value);
    }
    out
}

async fn execute_compiled<'e, E>(executor: E, compiled: &Compiled, operation: Operation) -> Result<ExecOutcome, DataError>
where
    E: sqlx::Executor<'e, Database = Any>,
{
    let mut query = sqlx::query(&compiled.sql);
    for binding in &compiled.bindings {
        query = bind_scalar(query, &binding.value);
    }
    match operation {
        Operation::Select => {
            let rows = query.fetch_all(executor).await.map_err(SqlxErrorExt::into_query_error)?;
            Ok(ExecOutcome::Rows(rows.iter().map(decode_row).collect()))
        }
        Operation::Insert | Operation::Update | Operation::Delete => {
            let result = query.execute(executor).await.map_err(SqlxErrorExt::into_query_error)?;
            Ok(ExecOutcome::Affected(result.rows_affected()))
        }
    }
}

#[async_trait::async_trait]
impl Executor for SqlxExecutor {
    async fn run(&self, compiled: &Compiled, operation: Operation) -> Result<ExecOutcome, DataError> {
        match self.take_state() {
            ConnState::InTransaction(mut tx) => {
                let result = execute_compiled(&mut *tx, compiled, operation).await;
                self.put_state(ConnState::InTransaction(tx));
                result
            }
            ConnState::Idle => {
                let result = execute_compiled(&self.pool, compiled, operation).await;
                self.put_state(ConnState::Idle);
                result
            }
        }
    }

    async fn begin(&self) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::Idle => {
                let tx = self.pool.begin().await.map_err(SqlxErrorExt::into_query_error)?;
                self.put_state(ConnState::InTransaction(tx));
                Ok(())
            }
            other @ ConnState::InTransaction(_) => {
                self.put_state(other);
                Err(DataError::Other("begin called while a transaction is already open".into()))
            }
        }
    }

    async fn commit(&self) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::InTransaction(tx) => tx.commit().await.map_err(SqlxErrorExt::into_query_error),
            ConnState::Idle => Err(DataError::Other("commit called with no open transaction".into())),
        }
    }

    async fn rollback(&self) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::InTransaction(tx) => tx.rollback().await.map_err(SqlxErrorExt::into_query_error),
            ConnState::Idle => Err(DataError::Other("rollback called with no open transaction".into())),
        }
    }

    async fn savepoint(&self, name: &str) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::InTransaction(mut tx) => {
                let result = sqlx::query(&format!("SAVEPOINT {name}"))
                    .execute(&mut *tx)
                    .await
                    .map(|_| ())
                    .map_err(SqlxErrorExt::into_query_error);
                self.put_state(ConnState::InTransaction(tx));
                result
            }
            ConnState::Idle => Err(DataError::Other("savepoint requested with no open transaction".into())),
        }
    }

    async fn release_savepoint(&self, name: &str) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::InTransaction(mut tx) => {
                let result = sqlx::query(&format!("RELEASE SAVEPOINT {name}"))
                    .execute(&mut *tx)
                    .await
                    .map(|_| ())
                    .map_err(SqlxErrorExt::into_query_error);
                self.put_state(ConnState::InTransaction(tx));
                result
            }
            ConnState::Idle => Err(DataError::Other("release_savepoint requested with no open transaction".into())),
        }
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DataError> {
        match self.take_state() {
            ConnState::InTransaction(mut tx) => {
                let result = sqlx::query(&format!("ROLLBACK TO SAVEPOINT {name}"))
                    .execute(&mut *tx)
                    .await
                    .map(|_| ())
                    .map_err(SqlxErrorExt::into_query_error);
                self.put_state(ConnState::InTransaction(tx));
                result
            }
            ConnState::Idle => Err(DataError::Other("rollback_to_savepoint requested with no open transaction".into())),
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use forge_data::Binding;

    async fn in_memory() -> SqlxExecutor {
        SqlxExecutor::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_select_round_trips_through_any() {
        let executor = in_memory().await;
        executor
            .run(&Compiled { sql: "CREATE TABLE widgets (id INTEGER, name TEXT)".into(), bindings: vec![] }, Operation::Update)
            .await
            .unwrap();
        executor
            .run(
                &Compiled {
                    sql: "INSERT INTO widgets (id, name) VALUES (?, ?)".into(),
                    bindings: vec![
                        Binding { key: "id".into(), value: Scalar::Int(1) },
                        Binding { key: "name".into(), value: Scalar::Str("bolt".into()) },
                    ],
                },
                Operation::Insert,
            )
            .await
            .unwrap();
        let outcome = executor
            .run(&Compiled { sql: "SELECT id, name FROM widgets".into(), bindings: vec![] }, Operation::Select)
            .await
            .unwrap();
        match outcome {
            ExecOutcome::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("name"), Some(&Scalar::Str("bolt".into())));
            }
            ExecOutcome::Affected(_) => panic!("expected rows"),
        }
    }

    #[tokio::test]
    async fn savepoint_rollback_discards_only_the_nested_write() {
        let executor = in_memory().await;
        executor
            .run(&Compiled { sql: "CREATE TABLE widgets (id INTEGER)".into(), bindings: vec![] }, Operation::Update)
            .await
            .unwrap();
        executor.begin().await.unwrap();
        executor
            .run(&Compiled { sql: "INSERT INTO widgets (id) VALUES (1)".into(), bindings: vec![] }, Operation::Insert)
            .await
            .unwrap();
        executor.savepoint("SP_test").await.unwrap();
        executor
            .run(&Compiled { sql: "INSERT INTO widgets (id) VALUES (2)".into(), bindings: vec![] }, Operation::Insert)
            .await
            .unwrap();
        executor.rollback_to_savepoint("SP_test").await.unwrap();
        executor.commit().await.unwrap();

        let outcome = executor
            .run(&Compiled { sql: "SELECT id FROM widgets".into(), bindings: vec![] }, Operation::Select)
            .await
            .unwrap();
        match outcome {
            ExecOutcome::Rows(rows) => assert_eq!(rows.len(), 1),
            ExecOutcome::Affected(_) => panic!("expected rows"),
        }
    }
}
