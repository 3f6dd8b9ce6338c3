//! `sqlx`-backed query execution for Forge: the [`Executor`] contract,
//! the [`QueryOrchestrator`] (identity map + savepoint transactions)
//! that runs compiled statements through it, a concrete
//! [`SqlxExecutor`], and a [`PretendExecutor`] for dry runs.

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod pretend;
pub mod sqlx_exec;

pub use error::{SqlxErrorExt, SqlxResult};
pub use executor::{ExecOutcome, Executor, ExecutedRow};
pub use orchestrator::{IdentityMap, IdentityMapEntry, MutationKind, QueryOrchestrator};
pub use pretend::{PretendExecutor, RecordedCall};
pub use sqlx_exec::SqlxExecutor;

pub mod prelude {
    pub use crate::{
        ExecOutcome, Executor, PretendExecutor, QueryOrchestrator, SqlxErrorExt, SqlxExecutor, SqlxResult,
    };
    pub use forge_data::prelude::*;
}
