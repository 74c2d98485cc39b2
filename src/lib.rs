pub mod aggregate;
pub mod artifacts;
pub mod build_info;
pub mod case;
pub mod comment;
pub mod config;
pub mod error;
pub mod finalize;
pub mod hooks;
pub mod http;
pub mod mapping;
pub mod reconcile;
pub mod remote;
pub mod results;
pub mod run;

pub use config::{Credentials, RunConfig};
pub use error::{RemoteServiceError, SyncError, SyncResult};
pub use finalize::{FinalizeRequest, Finalized};
pub use hooks::{NoopSyncHooks, SyncHooks, TracingSyncHooks};
pub use run::service::{ActiveRun, RunController};
