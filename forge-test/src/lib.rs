//! In-process test harness for Forge: a [`fake_request::TestApp`] that
//! dispatches [`fake_request::FakeRequest`]s straight into a router
//! without a socket, a [`clock::TestClock`] and [`clock::SequentialIds`]
//! for deterministic timing and identifiers, and a re-exported
//! [`forge_data_sqlx::PretendExecutor`] for exercising the query layer
//! without a database.

pub mod clock;
pub mod fake_request;

pub use clock::{SequentialIds, TestClock};
pub use fake_request::{FakeRequest, FakeResponse, TestApp};
pub use forge_data_sqlx::{PretendExecutor, RecordedCall};

pub mod prelude {
    pub use crate::{FakeRequest, FakeResponse, PretendExecutor, SequentialIds, TestApp, TestClock};
}
