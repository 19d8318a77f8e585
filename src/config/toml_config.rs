use crate::domain::ports::ConfigProvider;
use crate::domain::source::{default_sources, SourceDefinition};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_delimiter, validate_non_empty_string, validate_path, validate_positive_number,
    validate_unique, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: "data_deputes".to_string(),
            timeout_seconds: 30,
            user_agent: format!("deputes-etl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// 判斷重複議員的欄位
    pub key_fields: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            key_fields: vec!["nom".to_string(), "nom_circo".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub delimiter: char,
    pub bom: bool,
    pub unified_file: String,
    pub statistics_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            bom: true,
            unified_file: "deputes_unifie.csv".to_string(),
            statistics_file: "deputes_statistiques.csv".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            merge: MergeConfig::default(),
            output: OutputConfig::default(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DEPUTES_OUTPUT_DIR})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            EtlError::ConfigValidationError {
                field: "env_substitution".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.run.output_dir = output_dir.into();
        self
    }

    pub fn source(&self, name: &str) -> Option<&SourceDefinition> {
        self.sources.iter().find(|s| s.name == name)
    }

    fn validate_sources(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "sources".to_string(),
            });
        }
        validate_unique("sources.name", self.sources.iter().map(|s| s.name.as_str()))?;

        for source in &self.sources {
            let prefix = format!("sources.{}", source.name);
            validate_non_empty_string("sources.name", &source.name)?;
            if source.endpoints.is_empty() {
                return Err(EtlError::MissingConfigError {
                    field: format!("{}.endpoints", prefix),
                });
            }
            for file in source.output_file.iter().chain(source.raw_output_file.iter()) {
                validate_path(&format!("{}.output_file", prefix), file)?;
            }
            for endpoint in &source.endpoints {
                validate_url(&format!("{}.endpoints.url", prefix), &endpoint.url)?;
                if let Some(fallback) = &endpoint.json_fallback {
                    validate_url(&format!("{}.endpoints.json_fallback", prefix), fallback)?;
                }
                if let Some(delimiter) = endpoint.delimiter {
                    validate_delimiter(&format!("{}.endpoints.delimiter", prefix), delimiter)?;
                }
            }
        }
        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn sources(&self) -> &[SourceDefinition] {
        &self.sources
    }

    fn output_path(&self) -> &str {
        &self.run.output_dir
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_seconds)
    }

    fn user_agent(&self) -> &str {
        &self.run.user_agent
    }

    fn key_fields(&self) -> &[String] {
        &self.merge.key_fields
    }

    fn delimiter(&self) -> u8 {
        // ASCII is enforced by validate()
        self.output.delimiter as u8
    }

    fn write_bom(&self) -> bool {
        self.output.bom
    }

    fn unified_file(&self) -> &str {
        &self.output.unified_file
    }

    fn statistics_file(&self) -> &str {
        &self.output.statistics_file
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_path("run.output_dir", &self.run.output_dir)?;
        validate_positive_number("run.timeout_seconds", self.run.timeout_seconds, 1)?;
        validate_non_empty_string("run.user_agent", &self.run.user_agent)?;

        if self.merge.key_fields.iter().all(|f| f.trim().is_empty()) {
            return Err(EtlError::MissingConfigError {
                field: "merge.key_fields".to_string(),
            });
        }

        validate_delimiter("output.delimiter", self.output.delimiter)?;
        validate_path("output.unified_file", &self.output.unified_file)?;
        validate_path("output.statistics_file", &self.output.statistics_file)?;

        self.validate_sources()
    }
}
