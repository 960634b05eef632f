pub mod actor;
pub mod api;
pub mod error;
pub mod format;
pub mod models;
pub mod pagination;
pub mod scrapers;
pub mod storage;
pub mod utils;
pub mod xml;

pub use actor::{ActorRun, PlatformEnv, RunOutcome, RunState, RunSummary};
pub use error::{InputError, ScraperError};
pub use models::Record;
