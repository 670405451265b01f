//! Data model shared by providers, jobs, and broadcasters.

mod data_source;
mod item;
mod poll;
mod progress;
mod result;

pub use data_source::{DataSourceConfiguration, DataSourceId};
pub use item::{ItemFailure, SyncItem};
pub use poll::PollResult;
pub use progress::{JobId, JobProgressMessage, JobState, JobStep};
pub use result::{AttributeChange, SyncResult, SyncResultKind, SyncResultType};
