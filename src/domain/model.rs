use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 一位議員的一列資料：欄位順序依來源出現順序保留
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeputyRecord {
    fields: Vec<(String, Option<String>)>,
}

impl DeputyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定欄位；已存在的欄位就地覆寫，保留原本位置
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Returns the value if the field is present and non-null.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for DeputyRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut record = DeputyRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
    Xml,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 資料集的邏輯類別：基本名冊或統計（參與度、忠誠度）資料
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Roster,
    Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub url: String,
    pub format: SourceFormat,
    /// true when the CSV endpoint came back empty and the JSON one was used
    pub used_fallback: bool,
    pub encoding: String,
    pub fetched_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(source: impl Into<String>, url: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            format,
            used_fallback: false,
            encoding: "UTF-8".to_string(),
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<DeputyRecord>,
    pub provenance: Provenance,
}

impl Dataset {
    pub fn new(records: Vec<DeputyRecord>, provenance: Provenance) -> Self {
        Self {
            records,
            provenance,
        }
    }

    pub fn empty(provenance: Provenance) -> Self {
        Self::new(Vec::new(), provenance)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 所有記錄欄位的聯集，依首次出現順序排列
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in &self.records {
            for key in record.keys() {
                if seen.insert(key) {
                    columns.push(key.to_string());
                }
            }
        }
        columns
    }
}
