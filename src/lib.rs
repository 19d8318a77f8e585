pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use adapters::storage::LocalStorage;
pub use config::AppConfig;
pub use core::{etl::EtlEngine, fetcher::Fetcher, orchestrator::Orchestrator, writer::CsvWriter};
pub use domain::model::{Dataset, DatasetKind, DeputyRecord, Provenance, SourceFormat};
pub use domain::report::{LoadReport, RunOutcome, SourceSummary};
pub use domain::source::{default_sources, Endpoint, SourceDefinition};
pub use utils::error::{EtlError, Result};
