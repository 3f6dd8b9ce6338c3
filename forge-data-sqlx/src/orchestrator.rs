use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use forge_data::{Binding, Compiled, DataError, Operation, TransactionError};

use crate::executor::{ExecOutcome, Executor};

/// Restricted mirror of [`forge_data::Operation`] without `Select`,
/// matching `spec.md`'s note that identity-map entries tag their kind
/// as an enum rather than routing the flush path off raw SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMapEntry {
    pub operation: MutationKind,
    pub sql: String,
    pub bindings: Vec<Binding>,
}

/// FIFO queue of deferred mutations. Entries accumulate while a
/// transaction is open and flush in arrival order on the commit path.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: VecDeque<IdentityMapEntry>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, operation: MutationKind, sql: String, bindings: Vec<Binding>) {
        self.entries.push_back(IdentityMapEntry { operation, sql, bindings });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn drain(&mut self) -> Vec<IdentityMapEntry> {
        self.entries.drain(..).collect()
    }
}

fn savepoint_name() -> String {
    use rand::Rng;
    let suffix: u32 = rand::thread_rng().gen();
    format!("SP_{suffix:08x}")
}

/// Driver-agnostic orchestrator binding a [`forge_data::QueryBuilder`]'s
/// compiled output to an [`Executor`], with an optional [`IdentityMap`]
/// and nested-transaction support via `SP_<unique>` savepoints released
/// or rolled back LIFO, per `spec.md` §4.11.
pub struct QueryOrchestrator<E: Executor> {
    executor: E,
    identity_map: Mutex<IdentityMap>,
    depth: AtomicUsize,
    savepoints: Mutex<Vec<String>>,
}

impl<E: Executor> QueryOrchestrator<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            identity_map: Mutex::new(IdentityMap::new()),
            depth: AtomicUsize::new(0),
            savepoints: Mutex::new(Vec::new()),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Executes `compiled` immediately, except a mutation issued while a
    /// transaction is open, which is queued into the identity map
    /// instead (`spec.md` §4.11: "execute or defer ... through an
    /// Executor contract").
    pub async fn run(&self, compiled: Compiled, operation: Operation) -> Result<ExecOutcome, DataError> {
        let mutation = match operation {
            Operation::Insert => Some(MutationKind::Insert),
            Operation::Update => Some(MutationKind::Update),
            Operation::Delete => Some(MutationKind::Delete),
            Operation::Select => None,
        };

        if let Some(kind) = mutation {
            if self.depth() > 0 {
                let mut map = self.identity_map.lock().expect("identity map lock poisoned");
                map.schedule(kind, compiled.sql, compiled.bindings);
                return Ok(ExecOutcome::Affected(0));
            }
        }

        self.executor.run(&compiled, operation).await
    }

    pub fn pending_mutations(&self) -> usize {
        self.identity_map.lock().expect("identity map lock poisoned").len()
    }

    async fn flush_identity_map(&self) -> Result<(), DataError> {
        let pending = {
            let mut map = self.identity_map.lock().expect("identity map lock poisoned");
            map.drain()
        };
        for entry in pending {
            let compiled = Compiled { sql: entry.sql, bindings: entry.bindings };
            let operation = match entry.operation {
                MutationKind::Insert => Operation::Insert,
                MutationKind::Update => Operation::Update,
                MutationKind::Delete => Operation::Delete,
            };
            self.executor.run(&compiled, operation).await?;
        }
        Ok(())
    }

    /// Runs `body` inside a transaction, opening a savepoint instead of
    /// a fresh transaction when one is already active. Commits (or
    /// releases the savepoint) and flushes the identity map on success;
    /// rolls back (or rolls back to the savepoint) and re-raises on any
    /// failure, including a flush failure.
    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T, DataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DataError>>,
    {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst);
        if depth == 0 {
            self.executor.begin().await.map_err(|e| {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                e
            })?;
        } else {
            let name = savepoint_name();
            self.executor.savepoint(&name).await.map_err(|e| {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                e
            })?;
            self.savepoints.lock().expect("savepoint stack lock poisoned").push(name);
        }

        match body().await {
            Ok(value) => match self.flush_identity_map().await {
                Ok(()) => {
                    self.close_success(depth).await?;
                    Ok(value)
                }
                Err(flush_err) => {
                    let _ = self.close_failure(depth).await;
                    Err(flush_err)
                }
            },
            Err(body_err) => {
                if let Err(rollback_err) = self.close_failure(depth).await {
                    Err(rollback_err)
                } else {
                    Err(body_err)
                }
            }
        }
    }

    async fn close_success(&self, depth: usize) -> Result<(), DataError> {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        if depth == 0 {
            self.executor.commit().await.map_err(|e| wrap_commit(depth, e))
        } else {
            let name = self.pop_savepoint(depth)?;
            self.executor.release_savepoint(&name).await.map_err(|e| wrap_commit(depth, e))
        }
    }

    async fn close_failure(&self, depth: usize) -> Result<(), DataError> {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        if depth == 0 {
            self.executor.rollback().await.map_err(|e| wrap_rollback(depth, e))
        } else {
            let name = self.pop_savepoint(depth)?;
            self.executor.rollback_to_savepoint(&name).await.map_err(|e| wrap_rollback(depth, e))
        }
    }

    fn pop_savepoint(&self, depth: usize) -> Result<String, DataError> {
        self.savepoints.lock().expect("savepoint stack lock poisoned").pop().ok_or_else(|| {
            DataError::from(TransactionError::InvalidState {
                reason: format!("no savepoint registered for nesting depth {depth}"),
            })
        })
    }
}

fn wrap_commit(depth: usize, e: DataError) -> DataError {
    DataError::from(TransactionError::CommitFailed { depth, reason: e.to_string() })
}

fn wrap_rollback(depth: usize, e: DataError) -> DataError {
    DataError::from(TransactionError::RollbackFailed { depth, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeExecutor {
        calls: StdMutex<Vec<String>>,
        fail_on_sql: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl Executor for FakeExecutor {
        async fn run(&self, compiled: &Compiled, _operation: Operation) -> Result<ExecOutcome, DataError> {
            self.calls.lock().unwrap().push(format!("run:{}", compiled.sql));
            if self.fail_on_sql == Some(compiled.sql.as_str()) {
                return Err(DataError::Other("boom".into()));
            }
            Ok(ExecOutcome::Affected(1))
        }
        async fn begin(&self) -> Result<(), DataError> {
            self.calls.lock().unwrap().push("begin".into());
            Ok(())
        }
        async fn commit(&self) -> Result<(), DataError> {
            self.calls.lock().unwrap().push("commit".into());
            Ok(())
        }
        async fn rollback(&self) -> Result<(), DataError> {
            self.calls.lock().unwrap().push("rollback".into());
            Ok(())
        }
        async fn savepoint(&self, name: &str) -> Result<(), DataError> {
            self.calls.lock().unwrap().push(format!("savepoint:{name}"));
            Ok(())
        }
        async fn release_savepoint(&self, name: &str) -> Result<(), DataError> {
            self.calls.lock().unwrap().push(format!("release:{name}"));
            Ok(())
        }
        async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DataError> {
            self.calls.lock().unwrap().push(format!("rollback_to:{name}"));
            Ok(())
        }
    }

    fn compiled(sql: &str) -> Compiled {
        Compiled { sql: sql.to_string(), bindings: vec![] }
    }

    #[tokio::test]
    async fn mutation_outside_transaction_runs_immediately() {
        let orchestrator = QueryOrchestrator::new(FakeExecutor::default());
        orchestrator.run(compiled("INSERT INTO t"), Operation::Insert).await.unwrap();
        assert_eq!(*orchestrator.executor.calls.lock().unwrap(), vec!["run:INSERT INTO t"]);
    }

    #[tokio::test]
    async fn mutation_inside_transaction_is_deferred_then_flushed_fifo() {
        let orchestrator = QueryOrchestrator::new(FakeExecutor::default());
        orchestrator
            .transaction(|| async {
                orchestrator.run(compiled("INSERT INTO a"), Operation::Insert).await?;
                orchestrator.run(compiled("INSERT INTO b"), Operation::Insert).await?;
                Ok::<_, DataError>(())
            })
            .await
            .unwrap();
        let calls = orchestrator.executor.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["begin", "run:INSERT INTO a", "run:INSERT INTO b", "commit"]);
    }

    #[tokio::test]
    async fn nested_transaction_uses_savepoint_and_releases_on_success() {
        let orchestrator = QueryOrchestrator::new(FakeExecutor::default());
        orchestrator
            .transaction(|| async {
                orchestrator
                    .transaction(|| async { Ok::<_, DataError>(()) })
                    .await
            })
            .await
            .unwrap();
        let calls = orchestrator.executor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], "begin");
        assert!(calls[1].starts_with("savepoint:SP_"));
        assert!(calls[2].starts_with("release:SP_"));
        assert_eq!(calls[3], "commit");
        assert_eq!(calls[1].trim_start_matches("savepoint:"), calls[2].trim_start_matches("release:"));
    }

    #[tokio::test]
    async fn body_error_rolls_back_and_reraises() {
        let orchestrator = QueryOrchestrator::new(FakeExecutor::default());
        let result = orchestrator
            .transaction(|| async { Err::<(), _>(DataError::Other("nope".into())) })
            .await;
        assert!(matches!(result, Err(DataError::Other(msg)) if msg == "nope"));
        assert_eq!(*orchestrator.executor.calls.lock().unwrap(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn flush_failure_rolls_back_whole_transaction() {
        let executor = FakeExecutor { fail_on_sql: Some("INSERT INTO bad"), ..Default::default() };
        let orchestrator = QueryOrchestrator::new(executor);
        let result = orchestrator
            .transaction(|| async {
                orchestrator.run(compiled("INSERT INTO bad"), Operation::Insert).await?;
                Ok::<_, DataError>(())
            })
            .await;
        assert!(result.is_err());
        let calls = orchestrator.executor.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["begin", "run:INSERT INTO bad", "rollback"]);
    }

    #[test]
    fn identity_map_is_fifo() {
        let mut map = IdentityMap::new();
        map.schedule(MutationKind::Insert, "a".into(), vec![]);
        map.schedule(MutationKind::Update, "b".into(), vec![]);
        let drained = map.drain();
        assert_eq!(drained[0].sql, "a");
        assert_eq!(drained[1].sql, "b");
    }
}
