use std::sync::Mutex;

use forge_data::{Compiled, DataError, Operation};

use crate::executor::{ExecOutcome, Executor};

/// One recorded interaction, for assertions in tests that exercise a
/// query builder + orchestrator pair without a real database.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Run { sql: String, operation: Operation },
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    ReleaseSavepoint(String),
    RollbackToSavepoint(String),
}

/// `spec.md` §4.11's pretend mode: records `(sql, bindings)` and
/// returns a successful, empty result without touching I/O.
#[derive(Default)]
pub struct PretendExecutor {
    calls: Mutex<Vec<RecordedCall>>,
}

impl PretendExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("pretend executor lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Executor for PretendExecutor {
    async fn run(&self, compiled: &Compiled, operation: Operation) -> Result<ExecOutcome, DataError> {
        self.calls
            .lock()
            .expect("pretend executor lock poisoned")
            .push(RecordedCall::Run { sql: compiled.sql.clone(), operation });
        Ok(match operation {
            Operation::Select => ExecOutcome::Rows(Vec::new()),
            Operation::Insert | Operation::Update | Operation::Delete => ExecOutcome::Affected(0),
        })
    }

    async fn begin(&self) -> Result<(), DataError> {
        self.calls.lock().expect("pretend executor lock poisoned").push(RecordedCall::Begin);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DataError> {
        self.calls.lock().expect("pretend executor lock poisoned").push(RecordedCall::Commit);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DataError> {
        self.calls.lock().expect("pretend executor lock poisoned").push(RecordedCall::Rollback);
        Ok(())
    }

    async fn savepoint(&self, name: &str) -> Result<(), DataError> {
        self.calls.lock().expect("pretend executor lock poisoned").push(RecordedCall::Savepoint(name.to_string()));
        Ok(())
    }

    async fn release_savepoint(&self, name: &str) -> Result<(), DataError> {
        self.calls
            .lock()
            .expect("pretend executor lock poisoned")
            .push(RecordedCall::ReleaseSavepoint(name.to_string()));
        Ok(())
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DataError> {
        self.calls
            .lock()
            .expect("pretend executor lock poisoned")
            .push(RecordedCall::RollbackToSavepoint(name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_without_touching_io() {
        let executor = PretendExecutor::new();
        let compiled = Compiled { sql: "SELECT * FROM users".into(), bindings: vec![] };
        let outcome = executor.run(&compiled, Operation::Select).await.unwrap();
        assert_eq!(outcome, ExecOutcome::Rows(Vec::new()));
        assert_eq!(
            executor.calls(),
            vec![RecordedCall::Run { sql: "SELECT * FROM users".into(), operation: Operation::Select }]
        );
    }
}
