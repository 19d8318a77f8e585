//! Payload parsers: decoded CSV/JSON/XML text into deputy records.

use crate::domain::model::{DeputyRecord, SourceFormat};
use crate::domain::source::Endpoint;
use crate::utils::error::{EtlError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

/// 自動尋找記錄陣列時的最大巢狀深度
const MAX_ENVELOPE_DEPTH: usize = 4;

pub fn parse_payload(endpoint: &Endpoint, text: &str) -> Result<Vec<DeputyRecord>> {
    match endpoint.format {
        SourceFormat::Csv => parse_csv(&endpoint.url, text, endpoint.delimiter.unwrap_or(',')),
        SourceFormat::Json => {
            let document: Value = serde_json::from_str(text)
                .map_err(|e| EtlError::malformed(&endpoint.url, SourceFormat::Json, e))?;
            records_from_document(endpoint, &document)
        }
        SourceFormat::Xml => {
            let document = xml_to_json(text)
                .map_err(|e| EtlError::malformed(&endpoint.url, SourceFormat::Xml, e))?;
            records_from_document(endpoint, &document)
        }
    }
}

pub fn parse_csv(url: &str, text: &str, delimiter: char) -> Result<Vec<DeputyRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| EtlError::malformed(url, SourceFormat::Csv, e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| EtlError::malformed(url, SourceFormat::Csv, e))?;
        let record: DeputyRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| {
                let value = (!value.is_empty()).then(|| value.to_string());
                (key.to_string(), value)
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}

/// 從 JSON（或由 XML 轉換而來的）文件中取出記錄
pub fn records_from_document(endpoint: &Endpoint, document: &Value) -> Result<Vec<DeputyRecord>> {
    let items: Vec<&Value> = match &endpoint.records_path {
        Some(path) => {
            let target = walk_path(document, path).ok_or_else(|| {
                EtlError::malformed(
                    &endpoint.url,
                    endpoint.format,
                    format!("records path '{}' not found", path),
                )
            })?;
            match target {
                Value::Array(items) => items.iter().collect(),
                Value::Object(_) => vec![target],
                Value::Null => Vec::new(),
                _ => {
                    return Err(EtlError::malformed(
                        &endpoint.url,
                        endpoint.format,
                        format!("records path '{}' is not a list", path),
                    ))
                }
            }
        }
        None => find_records(document, 0).ok_or_else(|| {
            EtlError::malformed(&endpoint.url, endpoint.format, "no records in document")
        })?,
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match unwrap_item(item, endpoint.record_key.as_deref()) {
            Value::Object(fields) => records.push(record_from_object(fields)),
            other => tracing::debug!("Skipping non-object item in {}: {}", endpoint.url, other),
        }
    }
    Ok(records)
}

pub fn record_from_object(fields: &Map<String, Value>) -> DeputyRecord {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), value_to_cell(value)))
        .collect()
}

/// JSON 值轉為欄位字串：巢狀結構保留為精簡 JSON 文字
pub fn value_to_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn walk_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| current.get(segment))
}

/// 沒有設定 records_path 時的記錄搜尋：第一個陣列即為記錄清單；
/// 單鍵包裝層一路往下，若終點是帶有純量欄位的物件則視為單筆記錄
/// (例如只有一個 `<depute>` 的 XML)
fn find_records(value: &Value, depth: usize) -> Option<Vec<&Value>> {
    match value {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) if depth < MAX_ENVELOPE_DEPTH => {
            if let Some(items) = map.values().find_map(|v| v.as_array()) {
                return Some(items.iter().collect());
            }
            if map.len() != 1 {
                return None;
            }
            let inner = map.values().next()?;
            match inner {
                Value::Object(fields) if has_scalar_field(fields) => {
                    find_records(inner, depth + 1).or_else(|| Some(vec![inner]))
                }
                _ => find_records(inner, depth + 1),
            }
        }
        _ => None,
    }
}

fn has_scalar_field(fields: &Map<String, Value>) -> bool {
    fields
        .values()
        .any(|v| !matches!(v, Value::Object(_) | Value::Array(_)))
}

fn unwrap_item<'a>(item: &'a Value, record_key: Option<&str>) -> &'a Value {
    let Value::Object(map) = item else {
        return item;
    };
    match record_key {
        Some(key) => match map.get(key) {
            Some(inner @ Value::Object(_)) => inner,
            _ => item,
        },
        None if map.len() == 1 => match map.values().next() {
            Some(inner @ Value::Object(_)) => inner,
            _ => item,
        },
        None => item,
    }
}

/// Parse an XML document into a JSON tree: repeated tags become arrays,
/// leaf elements become strings, empty elements become null.
pub fn xml_to_json(xml: &str) -> std::result::Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = tag_name(&e);
                let attributes = attributes_of(&e);
                let child = parse_element(&mut reader, attributes)?;
                insert_child(&mut root, tag, child);
            }
            Ok(Event::Empty(e)) => {
                let tag = tag_name(&e);
                insert_child(&mut root, tag, empty_element(attributes_of(&e)));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("XML parse error: {}", e)),
        }
        buf.clear();
    }

    if root.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(Value::Object(root))
}

fn parse_element(
    reader: &mut Reader<&[u8]>,
    attributes: Map<String, Value>,
) -> std::result::Result<Value, String> {
    let mut map = attributes;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = tag_name(&e);
                let attrs = attributes_of(&e);
                let child = parse_element(reader, attrs)?;
                insert_child(&mut map, tag, child);
            }
            Ok(Event::Empty(e)) => {
                let tag = tag_name(&e);
                insert_child(&mut map, tag, empty_element(attributes_of(&e)));
            }
            Ok(Event::Text(e)) => {
                let content = e.xml_content().map_err(|err| err.to_string())?;
                text.push_str(&content);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::GeneralRef(e)) => {
                let name = String::from_utf8_lossy(&e).to_string();
                match resolve_entity(&name) {
                    Some(resolved) => text.push_str(&resolved),
                    None => text.push_str(&format!("&{};", name)),
                }
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => return Err("unexpected end of document".to_string()),
            Ok(_) => {}
            Err(e) => return Err(format!("XML parse error: {}", e)),
        }
        buf.clear();
    }

    let text = text.trim();
    if map.is_empty() {
        if text.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::String(text.to_string()))
        }
    } else {
        Ok(Value::Object(map))
    }
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attributes_of(e: &BytesStart<'_>) -> Map<String, Value> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = String::from_utf8_lossy(&attr.value).to_string();
            (key, Value::String(value))
        })
        .collect()
}

fn empty_element(attributes: Map<String, Value>) -> Value {
    if attributes.is_empty() {
        Value::Null
    } else {
        Value::Object(attributes)
    }
}

fn insert_child(map: &mut Map<String, Value>, tag: String, child: Value) {
    match map.get_mut(&tag) {
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
        None => {
            map.insert(tag, child);
        }
    }
}

fn resolve_entity(name: &str) -> Option<String> {
    match name {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value).map(String::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_endpoint() -> Endpoint {
        Endpoint::new("http://localhost/deputes/json", SourceFormat::Json)
    }

    #[test]
    fn test_parse_csv_with_blank_cells() {
        let text = "nom;nom_circo;twitter\nJean Dupont;Somme;\nMarie Curie;Paris;@mcurie\n";
        let records = parse_csv("test", text, ';').unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("nom"), Some("Jean Dupont"));
        assert!(records[0].contains_key("twitter"));
        assert_eq!(records[0].get("twitter"), None);
        assert_eq!(records[1].get("twitter"), Some("@mcurie"));
    }

    #[test]
    fn test_parse_csv_header_only_yields_no_records() {
        let records = parse_csv("test", "nom,nom_circo\n", ',').unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_nosdeputes_envelope_is_unwrapped() {
        let document = serde_json::json!({
            "deputes": [
                {"depute": {"nom": "Jean Dupont", "nb_mandats": 2, "sites_web": [{"site": "x"}]}},
                {"depute": {"nom": "Marie Curie", "twitter": null}}
            ]
        });
        let endpoint = json_endpoint().with_records_path("deputes").with_record_key("depute");
        let records = records_from_document(&endpoint, &document).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("nb_mandats"), Some("2"));
        assert_eq!(records[0].get("sites_web"), Some(r#"[{"site":"x"}]"#));
        assert_eq!(records[1].get("twitter"), None);
    }

    #[test]
    fn test_record_array_found_without_path() {
        let document = serde_json::json!({
            "meta": {"total": 1},
            "deputes": [{"depute": {"nom": "Jean Dupont"}}]
        });
        let records = records_from_document(&json_endpoint(), &document).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("nom"), Some("Jean Dupont"));
    }

    #[test]
    fn test_missing_records_path_is_malformed() {
        let document = serde_json::json!({"message": "maintenance"});
        let endpoint = json_endpoint().with_records_path("deputes");
        let err = records_from_document(&endpoint, &document).unwrap_err();
        assert!(matches!(err, EtlError::MalformedPayloadError { .. }));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_payload(&json_endpoint(), "{\"deputes\": [").unwrap_err();
        assert!(matches!(err, EtlError::MalformedPayloadError { .. }));
    }

    #[test]
    fn test_parse_xml_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<deputes>
  <depute>
    <id>1</id>
    <nom>Jean Dupont</nom>
    <nom_circo>Somme</nom_circo>
    <twitter/>
  </depute>
  <depute>
    <id>2</id>
    <nom>Dupont&amp;Fils</nom>
    <nom_circo>Paris</nom_circo>
  </depute>
</deputes>"#;
        let endpoint = Endpoint::new("http://localhost/deputes/xml", SourceFormat::Xml);
        let records = parse_payload(&endpoint, xml).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("nom"), Some("Jean Dupont"));
        assert!(records[0].contains_key("twitter"));
        assert_eq!(records[0].get("twitter"), None);
        assert_eq!(records[1].get("nom"), Some("Dupont&Fils"));
        assert_eq!(records[1].get("nom_circo"), Some("Paris"));
    }

    #[test]
    fn test_single_xml_record_without_list() {
        let xml = "<deputes><depute><nom>Jean Dupont</nom><nom_circo>Somme</nom_circo></depute></deputes>";
        let endpoint = Endpoint::new("http://localhost/deputes/xml", SourceFormat::Xml);
        let records = parse_payload(&endpoint, xml).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("nom"), Some("Jean Dupont"));
        assert_eq!(records[0].get("nom_circo"), Some("Somme"));
        assert!(!records[0].contains_key("depute"));
    }

    #[test]
    fn test_single_wrapped_json_record_without_path() {
        let document = serde_json::json!({"depute": {"nom": "Marie Curie", "nom_circo": "Paris"}});
        let records = records_from_document(&json_endpoint(), &document).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("nom"), Some("Marie Curie"));
    }

    #[test]
    fn test_scalar_only_document_has_no_records() {
        let document = serde_json::json!({"message": "maintenance"});
        let err = records_from_document(&json_endpoint(), &document).unwrap_err();
        assert!(matches!(err, EtlError::MalformedPayloadError { .. }));
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#233").as_deref(), Some("é"));
        assert_eq!(resolve_entity("#xE9").as_deref(), Some("é"));
        assert_eq!(resolve_entity("nbsp"), None);
    }
}
