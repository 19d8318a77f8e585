use crate::domain::model::{Dataset, DatasetKind, SourceFormat};
use crate::utils::error::EtlError;

/// 單一來源的抓取結果
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    pub kind: DatasetKind,
    pub output_file: Option<String>,
    pub raw_output_file: Option<String>,
    pub result: Result<FetchedSource, EtlError>,
}

#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub dataset: Dataset,
    pub raw_payload: Vec<u8>,
}

impl SourceOutcome {
    pub fn dataset(&self) -> Option<&Dataset> {
        self.result.as_ref().ok().map(|fetched| &fetched.dataset)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One line of the source comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub name: String,
    pub succeeded: bool,
    pub record_count: usize,
    pub column_count: usize,
    pub sample_columns: Vec<String>,
    pub format: Option<SourceFormat>,
    pub used_fallback: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct TransformResult {
    pub unified: Dataset,
    pub statistics: Option<Dataset>,
    pub sources: Vec<SourceOutcome>,
    pub comparison: Vec<SourceSummary>,
}

impl TransformResult {
    pub fn has_data(&self) -> bool {
        !self.unified.is_empty() || self.statistics.as_ref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug)]
pub struct LoadReport {
    pub written_files: Vec<String>,
    pub unified_count: usize,
    pub statistics_count: usize,
    pub comparison: Vec<SourceSummary>,
}

/// 一次執行的最終結果；沒有任何來源成功時回傳 `NoDataCollected` 而非錯誤
#[derive(Debug)]
pub enum RunOutcome {
    Completed(LoadReport),
    NoDataCollected {
        unified: Dataset,
        comparison: Vec<SourceSummary>,
    },
}

impl RunOutcome {
    pub fn is_no_data(&self) -> bool {
        matches!(self, RunOutcome::NoDataCollected { .. })
    }
}
