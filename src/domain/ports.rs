use crate::domain::report::{LoadReport, SourceOutcome, TransformResult};
use crate::domain::source::SourceDefinition;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    /// 寫入並覆蓋同路徑的既有檔案
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn sources(&self) -> &[SourceDefinition];
    fn output_path(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn user_agent(&self) -> &str;
    fn key_fields(&self) -> &[String];
    fn delimiter(&self) -> u8;
    fn write_bom(&self) -> bool;
    fn unified_file(&self) -> &str;
    fn statistics_file(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceOutcome>>;
    async fn transform(&self, outcomes: Vec<SourceOutcome>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<LoadReport>;
}
