pub mod mocks;
pub mod repositories;

pub use mocks::{complete, init_tracing, MockCommitter, Recorder};
pub use repositories::{User, UserCache, UserRepository};
