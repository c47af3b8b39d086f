//! Infrastructure layer: stores, external gateway clients, configuration.

pub mod config;
pub mod external;
pub mod stores;

pub use config::{ConfigError, Settings};
pub use external::flutterwave::{FlutterwaveClient, FlutterwaveEnvironment};
