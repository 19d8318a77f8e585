use crate::core::fetcher::Fetcher;
use crate::core::merge::{merge_datasets, DeputyKey};
use crate::core::writer::CsvWriter;
use crate::domain::model::{Dataset, DatasetKind, Provenance, SourceFormat};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::domain::report::{
    FetchedSource, LoadReport, SourceOutcome, SourceSummary, TransformResult,
};
use crate::domain::source::{Endpoint, SourceDefinition};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::path::Path;

const SAMPLE_COLUMNS: usize = 5;

/// 依序抓取所有來源、合併並寫出 CSV
pub struct Orchestrator<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    fetcher: Fetcher,
}

impl<S: Storage, C: ConfigProvider> Orchestrator<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let fetcher = Fetcher::new(config.request_timeout(), config.user_agent())?;
        Ok(Self {
            storage,
            config,
            fetcher,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Fetch one endpoint. An empty CSV payload is retried once against the
    /// matching JSON endpoint.
    pub async fn fetch_endpoint(&self, source: &str, endpoint: &Endpoint) -> Result<FetchedSource> {
        match self.fetcher.fetch(source, endpoint).await {
            Err(EtlError::EmptyPayloadError { url }) => {
                let Some(substitute) = endpoint.json_substitute() else {
                    return Err(EtlError::EmptyPayloadError { url });
                };
                tracing::warn!(
                    "{}: empty payload from {}, retrying as JSON via {}",
                    source,
                    url,
                    substitute.url
                );
                let mut fetched = self.fetcher.fetch(source, &substitute).await?;
                fetched.dataset.provenance.used_fallback = true;
                Ok(fetched)
            }
            other => other,
        }
    }

    /// 依序嘗試來源的端點；全部失敗時保留最後一個錯誤，不中斷整體執行
    pub async fn fetch_source(&self, definition: &SourceDefinition) -> SourceOutcome {
        tracing::info!("📥 Fetching source {}", definition.name);

        let mut last_error = EtlError::MissingConfigError {
            field: format!("sources.{}.endpoints", definition.name),
        };
        let mut result = None;
        for endpoint in &definition.endpoints {
            tracing::debug!("{}: trying {} ({})", definition.name, endpoint.url, endpoint.format);
            match self.fetch_endpoint(&definition.name, endpoint).await {
                Ok(fetched) => {
                    result = Some(fetched);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("{}: {} failed: {}", definition.name, endpoint.url, e);
                    last_error = e;
                }
                Err(e) => {
                    tracing::error!("{}: {} failed: {}", definition.name, endpoint.url, e);
                    last_error = e;
                }
            }
        }

        SourceOutcome {
            name: definition.name.clone(),
            kind: definition.kind,
            output_file: definition.output_file.clone(),
            raw_output_file: definition.raw_output_file.clone(),
            result: result.ok_or(last_error),
        }
    }

    fn full_path(&self, file: &str) -> String {
        Path::new(self.config.output_path())
            .join(file)
            .display()
            .to_string()
    }

    fn writer(&self) -> CsvWriter {
        CsvWriter::new(self.config.delimiter()).with_bom(self.config.write_bom())
    }
}

/// 比較各來源的筆數與欄位
pub fn compare_sources(outcomes: &[SourceOutcome]) -> Vec<SourceSummary> {
    tracing::info!("=== Source comparison ===");
    outcomes
        .iter()
        .map(|outcome| {
            let summary = match &outcome.result {
                Ok(fetched) => {
                    let columns = fetched.dataset.columns();
                    SourceSummary {
                        name: outcome.name.clone(),
                        succeeded: true,
                        record_count: fetched.dataset.len(),
                        column_count: columns.len(),
                        sample_columns: columns.into_iter().take(SAMPLE_COLUMNS).collect(),
                        format: Some(fetched.dataset.provenance.format),
                        used_fallback: fetched.dataset.provenance.used_fallback,
                        error: None,
                    }
                }
                Err(e) => SourceSummary {
                    name: outcome.name.clone(),
                    succeeded: false,
                    record_count: 0,
                    column_count: 0,
                    sample_columns: Vec::new(),
                    format: None,
                    used_fallback: false,
                    error: Some(e.to_string()),
                },
            };

            if summary.succeeded {
                tracing::info!(
                    "✅ {}: {} deputies, {} columns ({}...){}",
                    summary.name,
                    summary.record_count,
                    summary.column_count,
                    summary.sample_columns.join(", "),
                    if summary.used_fallback { " [json fallback]" } else { "" }
                );
            } else {
                tracing::warn!(
                    "❌ {}: failed ({})",
                    summary.name,
                    summary.error.as_deref().unwrap_or("unknown error")
                );
            }
            summary
        })
        .collect()
}

fn merge_kind(
    name: &str,
    outcomes: &[SourceOutcome],
    kind: DatasetKind,
    key: &DeputyKey,
) -> Option<Dataset> {
    let datasets: Vec<&Dataset> = outcomes
        .iter()
        .filter(|o| o.kind == kind)
        .filter_map(SourceOutcome::dataset)
        .collect();
    if datasets.is_empty() {
        return None;
    }
    Some(merge_datasets(name, &datasets, key))
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for Orchestrator<S, C> {
    async fn extract(&self) -> Result<Vec<SourceOutcome>> {
        let mut outcomes = Vec::with_capacity(self.config.sources().len());
        for definition in self.config.sources() {
            outcomes.push(self.fetch_source(definition).await);
        }
        Ok(outcomes)
    }

    async fn transform(&self, outcomes: Vec<SourceOutcome>) -> Result<TransformResult> {
        let comparison = compare_sources(&outcomes);
        let key = DeputyKey::new(self.config.key_fields());

        let unified = merge_kind("unified", &outcomes, DatasetKind::Roster, &key)
            .unwrap_or_else(|| Dataset::empty(Provenance::new("unified", "", SourceFormat::Json)));
        let statistics = merge_kind("statistics", &outcomes, DatasetKind::Statistics, &key);

        tracing::info!(
            "Unified roster: {} deputies; statistics: {}",
            unified.len(),
            statistics
                .as_ref()
                .map(|s| s.len().to_string())
                .unwrap_or_else(|| "unavailable".to_string())
        );

        Ok(TransformResult {
            unified,
            statistics,
            sources: outcomes,
            comparison,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadReport> {
        let writer = self.writer();
        let mut written: Vec<String> = Vec::new();
        let mut written_names: HashSet<String> = HashSet::new();

        for outcome in &result.sources {
            let Ok(fetched) = &outcome.result else {
                continue;
            };
            if let Some(file) = &outcome.output_file {
                writer.write(&self.storage, file, &fetched.dataset).await?;
                tracing::info!("💾 {} → {}", outcome.name, self.full_path(file));
                written_names.insert(file.clone());
                written.push(self.full_path(file));
            }
            if let Some(file) = &outcome.raw_output_file {
                self.storage.write_file(file, &fetched.raw_payload).await?;
                tracing::info!("💾 {} (raw) → {}", outcome.name, self.full_path(file));
                written_names.insert(file.clone());
                written.push(self.full_path(file));
            }
        }

        if !result.unified.is_empty() {
            let file = self.config.unified_file();
            writer.write(&self.storage, file, &result.unified).await?;
            tracing::info!("💾 unified roster → {}", self.full_path(file));
            written.push(self.full_path(file));
        }

        if let Some(statistics) = result.statistics.as_ref().filter(|s| !s.is_empty()) {
            let file = self.config.statistics_file();
            if written_names.contains(file) {
                tracing::debug!("Statistics already written to {}", file);
            } else {
                writer.write(&self.storage, file, statistics).await?;
                tracing::info!("💾 statistics → {}", self.full_path(file));
                written.push(self.full_path(file));
            }
        }

        Ok(LoadReport {
            written_files: written,
            unified_count: result.unified.len(),
            statistics_count: result.statistics.as_ref().map_or(0, Dataset::len),
            comparison: result.comparison,
        })
    }
}
