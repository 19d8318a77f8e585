use crate::domain::model::{Dataset, DeputyRecord, Provenance, SourceFormat};
use std::collections::HashSet;

/// 用於辨識同一位議員的鍵（預設為姓名 + 選區）
#[derive(Debug, Clone)]
pub struct DeputyKey {
    fields: Vec<String>,
}

impl DeputyKey {
    pub fn new(fields: &[String]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    /// `None` when the record has none of the key fields, so it cannot be matched.
    pub fn of(&self, record: &DeputyRecord) -> Option<String> {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                record
                    .get(field)
                    .map(|v| v.trim().to_lowercase())
                    .unwrap_or_default()
            })
            .collect();

        if parts.iter().all(String::is_empty) {
            None
        } else {
            Some(parts.join("\u{1f}"))
        }
    }
}

impl Default for DeputyKey {
    fn default() -> Self {
        Self::new(&["nom".to_string(), "nom_circo".to_string()])
    }
}

/// Merge datasets in order. A key seen in an earlier dataset wins; later
/// duplicates are dropped. Records without any key field are always kept.
pub fn merge_datasets(name: &str, datasets: &[&Dataset], key: &DeputyKey) -> Dataset {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for dataset in datasets {
        for record in &dataset.records {
            match key.of(record) {
                Some(k) => {
                    if seen.insert(k) {
                        records.push(record.clone());
                    } else {
                        dropped += 1;
                    }
                }
                None => records.push(record.clone()),
            }
        }
    }

    if dropped > 0 {
        tracing::debug!("{}: dropped {} duplicate records while merging", name, dropped);
    }

    let provenance = match datasets.first() {
        Some(first) => {
            let mut provenance = first.provenance.clone();
            provenance.source = merged_source_label(name, datasets);
            provenance
        }
        None => Provenance::new(name, "", SourceFormat::Json),
    };
    Dataset::new(records, provenance)
}

fn merged_source_label(name: &str, datasets: &[&Dataset]) -> String {
    let sources: Vec<&str> = datasets
        .iter()
        .map(|d| d.provenance.source.as_str())
        .collect();
    format!("{} ({})", name, sources.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nom: &str, circo: &str, parti: &str) -> DeputyRecord {
        [
            ("nom", Some(nom.to_string())),
            ("nom_circo", Some(circo.to_string())),
            ("parti", Some(parti.to_string())),
        ]
        .into_iter()
        .collect()
    }

    fn dataset(source: &str, records: Vec<DeputyRecord>) -> Dataset {
        Dataset::new(
            records,
            Provenance::new(source, "http://localhost", SourceFormat::Json),
        )
    }

    #[test]
    fn test_overlapping_keys_keep_earlier_source() {
        let first = dataset(
            "a",
            vec![record("Jean Dupont", "Somme", "A"), record("Marie Curie", "Paris", "A")],
        );
        let second = dataset(
            "b",
            vec![record("jean dupont ", "SOMME", "B"), record("Louis Pasteur", "Jura", "B")],
        );

        let merged = merge_datasets("unified", &[&first, &second], &DeputyKey::default());

        assert_eq!(merged.len(), 3);
        let dupont: Vec<_> = merged
            .records
            .iter()
            .filter(|r| r.get("nom").map(|n| n.trim().eq_ignore_ascii_case("jean dupont")) == Some(true))
            .collect();
        assert_eq!(dupont.len(), 1);
        assert_eq!(dupont[0].get("parti"), Some("A"));
        assert_eq!(merged.records[2].get("nom"), Some("Louis Pasteur"));
        assert_eq!(merged.provenance.source, "unified (a > b)");
    }

    #[test]
    fn test_duplicates_within_one_source_keep_first() {
        let only = dataset(
            "a",
            vec![record("Jean Dupont", "Somme", "A"), record("Jean Dupont", "Somme", "B")],
        );

        let merged = merge_datasets("unified", &[&only], &DeputyKey::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.records[0].get("parti"), Some("A"));
    }

    #[test]
    fn test_same_name_different_constituency_is_not_duplicate() {
        let first = dataset("a", vec![record("Jean Dupont", "Somme", "A")]);
        let second = dataset("b", vec![record("Jean Dupont", "Gironde", "B")]);

        let merged = merge_datasets("unified", &[&first, &second], &DeputyKey::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_records_without_key_fields_are_kept() {
        let keyless: DeputyRecord = [("twitter", Some("@x".to_string()))].into_iter().collect();
        let first = dataset("a", vec![keyless.clone()]);
        let second = dataset("b", vec![keyless]);

        let merged = merge_datasets("unified", &[&first, &second], &DeputyKey::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_nothing_is_empty() {
        let merged = merge_datasets("unified", &[], &DeputyKey::default());
        assert!(merged.is_empty());
    }
}
