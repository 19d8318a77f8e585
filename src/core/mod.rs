pub mod etl;
pub mod fetcher;
pub mod merge;
pub mod orchestrator;
pub mod parse;
pub mod writer;

pub use crate::domain::model::{Dataset, DeputyRecord};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
