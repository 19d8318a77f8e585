use crate::core::parse::{parse_payload, record_from_object};
use crate::domain::model::{Dataset, DeputyRecord, Provenance, SourceFormat};
use crate::domain::report::FetchedSource;
use crate::domain::source::Endpoint;
use crate::utils::encoding::PayloadDecoder;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// 對單一端點發出 HTTP 請求並把回應轉為資料集
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    decoder: PayloadDecoder,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            decoder: PayloadDecoder::default(),
        })
    }

    pub fn with_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// GET the url and return the body bytes. Timeouts and connection
    /// failures map to `NetworkError`, non-2xx statuses to `HttpStatusError`.
    pub async fn fetch_raw(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EtlError::network(url, &e))?;

        let status = response.status();
        tracing::debug!("{} responded with {}", url, status);
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EtlError::network(url, &e))?;
        Ok(body.to_vec())
    }

    pub async fn fetch(&self, source: &str, endpoint: &Endpoint) -> Result<FetchedSource> {
        let raw_payload = self.fetch_raw(&endpoint.url).await?;
        let dataset = self.parse(source, endpoint, &raw_payload)?;
        Ok(FetchedSource {
            dataset,
            raw_payload,
        })
    }

    /// 解碼並解析已下載的內容；空白內容或零筆記錄都視為 `EmptyPayloadError`
    pub fn parse(&self, source: &str, endpoint: &Endpoint, payload: &[u8]) -> Result<Dataset> {
        if is_blank(payload) {
            return Err(EtlError::EmptyPayloadError {
                url: endpoint.url.clone(),
            });
        }

        let decoded = self.decoder.decode(&endpoint.url, payload)?;
        let records = parse_payload(endpoint, &decoded.text)?;
        if records.is_empty() {
            return Err(EtlError::EmptyPayloadError {
                url: endpoint.url.clone(),
            });
        }

        tracing::debug!(
            "Parsed {} records from {} ({}, {})",
            records.len(),
            endpoint.url,
            endpoint.format,
            decoded.encoding
        );

        let mut provenance = Provenance::new(source, endpoint.url.clone(), endpoint.format);
        provenance.encoding = decoded.encoding.to_string();
        Ok(Dataset::new(records, provenance))
    }

    /// 取得單一議員的詳細資料（`{base}/{slug}/json`）
    pub async fn fetch_deputy(&self, base_url: &str, slug: &str) -> Result<DeputyRecord> {
        let slug = slug.trim();
        if slug.is_empty() || slug.contains('/') {
            return Err(EtlError::InvalidConfigValueError {
                field: "depute".to_string(),
                value: slug.to_string(),
                reason: "Expected a deputy slug such as 'jean-dupont'".to_string(),
            });
        }

        let url = format!("{}/{}/json", base_url.trim_end_matches('/'), slug);
        let payload = self.fetch_raw(&url).await?;
        if is_blank(&payload) {
            return Err(EtlError::EmptyPayloadError { url });
        }

        let decoded = self.decoder.decode(&url, &payload)?;
        let document: serde_json::Value = serde_json::from_str(&decoded.text)
            .map_err(|e| EtlError::malformed(&url, SourceFormat::Json, e))?;
        let fields = document
            .get("depute")
            .unwrap_or(&document)
            .as_object()
            .ok_or_else(|| EtlError::malformed(&url, SourceFormat::Json, "expected an object"))?;

        Ok(record_from_object(fields))
    }
}

fn is_blank(payload: &[u8]) -> bool {
    let body = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);
    body.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5), "deputes-etl-test").unwrap()
    }

    fn fixture() -> serde_json::Value {
        serde_json::json!({
            "deputes": [
                {"depute": {"id": 1, "nom": "Jean Dupont", "nom_circo": "Somme", "sexe": "H", "parti_ratt_financier": "Parti A"}},
                {"depute": {"id": 2, "nom": "Marie Curie", "nom_circo": "Paris", "sexe": "F", "profession": "Chercheuse"}},
                {"depute": {"id": 3, "nom": "Louis Pasteur", "nom_circo": "Jura", "sexe": "H", "twitter": null}}
            ]
        })
    }

    #[tokio::test]
    async fn test_fetch_json_fixture_yields_three_records() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/deputes/json");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(fixture());
        });

        let endpoint = Endpoint::new(server.url("/deputes/json"), SourceFormat::Json)
            .with_records_path("deputes")
            .with_record_key("depute");
        let fetched = fetcher().fetch("nosdeputes_json", &endpoint).await.unwrap();

        api_mock.assert();
        let dataset = fetched.dataset;
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records[0].get("nom"), Some("Jean Dupont"));
        assert_eq!(dataset.records[0].get("parti_ratt_financier"), Some("Parti A"));
        assert_eq!(dataset.records[1].get("profession"), Some("Chercheuse"));
        assert_eq!(dataset.records[2].get("nom_circo"), Some("Jura"));
        assert_eq!(dataset.records[2].get("twitter"), None);
        assert_eq!(dataset.provenance.source, "nosdeputes_json");
        assert_eq!(dataset.provenance.format, SourceFormat::Json);
        assert!(!fetched.raw_payload.is_empty());
    }

    #[tokio::test]
    async fn test_empty_csv_body_is_empty_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/deputes/csv");
            then.status(200).header("Content-Type", "text/csv").body("  \n");
        });

        let endpoint = Endpoint::new(server.url("/deputes/csv"), SourceFormat::Csv);
        let err = fetcher().fetch("nosdeputes_csv", &endpoint).await.unwrap_err();
        assert!(matches!(err, EtlError::EmptyPayloadError { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_http_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/deputes/json");
            then.status(503);
        });

        let endpoint = Endpoint::new(server.url("/deputes/json"), SourceFormat::Json);
        let err = fetcher().fetch("nosdeputes_json", &endpoint).await.unwrap_err();
        assert!(matches!(err, EtlError::HttpStatusError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .body("nom\nJean Dupont\n");
        });

        let fetcher = Fetcher::new(Duration::from_millis(200), "deputes-etl-test").unwrap();
        let endpoint = Endpoint::new(server.url("/slow"), SourceFormat::Csv);
        let err = fetcher.fetch("slow", &endpoint).await.unwrap_err();
        assert!(matches!(err, EtlError::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_latin1_csv_is_decoded_with_fallback_encoding() {
        let server = MockServer::start();
        // "nom;nom_circo\nHélène;Hérault\n" encoded as ISO-8859-1
        let mut body = b"nom;nom_circo\nH".to_vec();
        body.extend_from_slice(&[0xE9]);
        body.extend_from_slice(b"l");
        body.extend_from_slice(&[0xE8]);
        body.extend_from_slice(b"ne;H");
        body.extend_from_slice(&[0xE9]);
        body.extend_from_slice(b"rault\n");
        server.mock(|when, then| {
            when.method(GET).path("/export.csv");
            then.status(200).body(body);
        });

        let endpoint =
            Endpoint::new(server.url("/export.csv"), SourceFormat::Csv).with_delimiter(';');
        let dataset = fetcher().fetch("an", &endpoint).await.unwrap().dataset;

        assert_eq!(dataset.records[0].get("nom"), Some("Hélène"));
        assert_eq!(dataset.records[0].get("nom_circo"), Some("Hérault"));
        assert_eq!(dataset.provenance.encoding, "windows-1252");
    }

    #[tokio::test]
    async fn test_fetch_deputy_details() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/jean-dupont/json");
            then.status(200).json_body(serde_json::json!({
                "depute": {"nom": "Jean Dupont", "nom_circo": "Somme", "profession": "Agriculteur"}
            }));
        });

        let record = fetcher()
            .fetch_deputy(&server.base_url(), "jean-dupont")
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(record.get("nom"), Some("Jean Dupont"));
        assert_eq!(record.get("profession"), Some("Agriculteur"));
    }

    #[tokio::test]
    async fn test_fetch_deputy_rejects_bad_slug() {
        let err = fetcher()
            .fetch_deputy("http://localhost", "../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfigValueError { .. }));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(b""));
        assert!(is_blank(b" \r\n\t"));
        assert!(is_blank(&[0xEF, 0xBB, 0xBF, b'\n']));
        assert!(!is_blank(b"nom"));
    }
}
