use crate::core::Pipeline;
use crate::domain::report::RunOutcome;
use crate::utils::error::Result;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!("=== Starting download from all sources ===");

        // Extract
        let outcomes = self.pipeline.extract().await?;
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!("Fetched {}/{} sources", succeeded, outcomes.len());

        // Transform
        let result = self.pipeline.transform(outcomes).await?;
        if !result.has_data() {
            tracing::warn!("No data collected from any source; nothing written");
            return Ok(RunOutcome::NoDataCollected {
                unified: result.unified,
                comparison: result.comparison,
            });
        }

        // Load
        let report = self.pipeline.load(result).await?;
        tracing::info!("Wrote {} files", report.written_files.len());

        Ok(RunOutcome::Completed(report))
    }
}
