pub mod engine;
pub mod remote;

pub use engine::{merge_projects, SyncEngine};
pub use remote::{HttpRemoteStore, RemoteStore};
