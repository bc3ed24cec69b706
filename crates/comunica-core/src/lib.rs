//! Comunica Core - shared foundation for the comunica scraper.
//!
//! This crate holds everything the scraping pipeline reads but never mutates:
//! the run configuration, validated identifiers, and the tribunal catalogue.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based [`RunConfig`] with environment overrides
//! - [`types`] - Validated newtypes (`TribunalCode`)
//! - [`tribunals`] - Catalogue of state and federal regional courts
//!
//! # Example
//!
//! ```rust
//! use comunica_core::{RunConfig, TribunalCode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = RunConfig::default();
//! config.tribunals = TribunalCode::parse_list("TJSP,TRF3")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod tribunals;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, CacheConfig, ConcurrencyConfig, OutputConfig, PeriodConfig, RunConfig,
    TransportConfig,
};
pub use error::{ComunicaError, ConfigError, ConfigResult, Result};
pub use tribunals::{Tribunal, TribunalGroup, TribunalKind};
pub use types::TribunalCode;
