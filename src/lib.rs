// Library surface shared by the binary and the integration tests.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod drill;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod runtime;
pub mod session;
pub mod suggest;
pub mod ui;

pub use error::{KeydrillError, Result};
pub use history::{HistoryStore, MemoryHistory, SqliteHistory};
pub use record::{ConfusionMap, ErrorMap, LatencySummary, SessionRecord, SessionRecordBuilder};
pub use session::{Key, SessionEngine, SessionObserver};
pub use suggest::{rank, Suggestion};
