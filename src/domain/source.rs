use crate::domain::model::{DatasetKind, SourceFormat};
use serde::{Deserialize, Serialize};

pub const NOSDEPUTES_BASE_URL: &str = "https://www.nosdeputes.fr";

const ASSEMBLEE_OPEN_DATA_CSV: &str = "https://data.assemblee-nationale.fr/static/openData/repository/17/amo/deputes_actifs_csv_opendata/liste_deputes_libre_office.csv";

/// 一個資料來源：依序嘗試其端點，第一個成功者即為該來源的結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: DatasetKind,
    pub endpoints: Vec<Endpoint>,
    /// CSV written for this source's dataset, relative to the output directory
    pub output_file: Option<String>,
    /// Raw payload archived as-is (json/xml documents)
    pub raw_output_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub format: SourceFormat,
    /// CSV only; defaults to ','
    pub delimiter: Option<char>,
    /// Dot-separated path to the record array inside a JSON/XML document
    pub records_path: Option<String>,
    /// Per-item wrapper key, e.g. `depute` in `{"depute": {...}}`
    pub record_key: Option<String>,
    /// JSON endpoint used when this CSV endpoint returns an empty payload
    pub json_fallback: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            url: url.into(),
            format,
            delimiter: None,
            records_path: None,
            record_key: None,
            json_fallback: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_records_path(mut self, path: impl Into<String>) -> Self {
        self.records_path = Some(path.into());
        self
    }

    pub fn with_record_key(mut self, key: impl Into<String>) -> Self {
        self.record_key = Some(key.into());
        self
    }

    pub fn with_json_fallback(mut self, url: impl Into<String>) -> Self {
        self.json_fallback = Some(url.into());
        self
    }

    /// 取得 CSV 端點對應的 JSON 端點：優先使用設定值，否則把結尾的 `/csv` 換成 `/json`
    pub fn json_fallback_url(&self) -> Option<String> {
        if self.format != SourceFormat::Csv {
            return None;
        }
        if let Some(url) = &self.json_fallback {
            return Some(url.clone());
        }

        let mut parsed = url::Url::parse(&self.url).ok()?;
        let path = parsed.path().trim_end_matches('/');
        let stem = path.strip_suffix("/csv")?;
        let json_path = format!("{}/json", stem);
        parsed.set_path(&json_path);
        Some(parsed.to_string())
    }

    /// 以同一組解析設定建立 JSON 替代端點
    pub fn json_substitute(&self) -> Option<Endpoint> {
        let url = self.json_fallback_url()?;
        Some(Endpoint {
            url,
            format: SourceFormat::Json,
            delimiter: None,
            records_path: self.records_path.clone(),
            record_key: self.record_key.clone(),
            json_fallback: None,
        })
    }
}

/// 內建的來源清單（NosDéputés.fr 與國民議會開放資料）
pub fn default_sources() -> Vec<SourceDefinition> {
    vec![
        SourceDefinition {
            name: "nosdeputes_csv".to_string(),
            kind: DatasetKind::Roster,
            endpoints: vec![Endpoint::new(
                format!("{}/deputes/csv", NOSDEPUTES_BASE_URL),
                SourceFormat::Csv,
            )
            .with_delimiter(';')
            .with_records_path("deputes")
            .with_record_key("depute")],
            output_file: Some("deputes_nosdeputes.csv".to_string()),
            raw_output_file: None,
        },
        SourceDefinition {
            name: "nosdeputes_json".to_string(),
            kind: DatasetKind::Roster,
            endpoints: vec![Endpoint::new(
                format!("{}/deputes/json", NOSDEPUTES_BASE_URL),
                SourceFormat::Json,
            )
            .with_records_path("deputes")
            .with_record_key("depute")],
            output_file: None,
            raw_output_file: Some("deputes_nosdeputes.json".to_string()),
        },
        SourceDefinition {
            name: "nosdeputes_synthese".to_string(),
            kind: DatasetKind::Statistics,
            endpoints: vec![Endpoint::new(
                format!("{}/synthese/data/json", NOSDEPUTES_BASE_URL),
                SourceFormat::Json,
            )
            .with_records_path("deputes")],
            output_file: Some("deputes_statistiques.csv".to_string()),
            raw_output_file: None,
        },
        SourceDefinition {
            name: "assemblee_officiel".to_string(),
            kind: DatasetKind::Roster,
            endpoints: vec![
                Endpoint::new(ASSEMBLEE_OPEN_DATA_CSV, SourceFormat::Csv).with_delimiter(';'),
                Endpoint::new(
                    format!("{}/deputes/json", NOSDEPUTES_BASE_URL),
                    SourceFormat::Json,
                )
                .with_records_path("deputes")
                .with_record_key("depute"),
            ],
            output_file: Some("deputes_assemblee_officiel.csv".to_string()),
            raw_output_file: None,
        },
    ]
}
