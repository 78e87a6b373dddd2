pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod statistics;
pub mod telemetry;

pub use crate::client::HttpClient;
pub use crate::config::{Args, RunConfig};
pub use crate::driver::{ActiveUnits, LoadDriver, UnitState};
pub use crate::error::{ConfigError, RequestError};
pub use crate::statistics::{RunReport, UnitReport};
