pub mod config;
pub mod error;
pub mod model;
pub mod traits;

pub use config::Config;
pub use error::*;
pub use model::*;
pub use traits::{LiveValueStore, NotificationSink, RuleStore};
