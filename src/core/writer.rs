use crate::domain::model::Dataset;
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// 把資料集寫成分隔字元檔；欄位為所有記錄欄位的聯集，缺值留白
#[derive(Debug, Clone, Copy)]
pub struct CsvWriter {
    delimiter: u8,
    bom: bool,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl CsvWriter {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            bom: false,
        }
    }

    /// Prefix the output with a UTF-8 byte-order mark (spreadsheet friendly).
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    /// 單一欄位的空值寫成 `""`，不會輸出空白行
    pub fn to_bytes(&self, dataset: &Dataset) -> Result<Vec<u8>> {
        let columns = dataset.columns();
        let mut buffer = Vec::new();
        if self.bom {
            buffer.extend_from_slice(UTF8_BOM);
        }
        if columns.is_empty() {
            return Ok(buffer);
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(buffer);
        writer.write_record(&columns)?;
        for record in &dataset.records {
            writer.write_record(columns.iter().map(|column| record.get(column).unwrap_or("")))?;
        }

        writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }

    /// 序列化後交給 Storage 寫入，同路徑的舊檔會被覆蓋
    pub async fn write<S: Storage>(
        &self,
        storage: &S,
        path: &str,
        dataset: &Dataset,
    ) -> Result<()> {
        let bytes = self.to_bytes(dataset)?;
        tracing::debug!(
            "Writing {} records ({} bytes) to {}",
            dataset.len(),
            bytes.len(),
            path
        );
        storage.write_file(path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DeputyRecord, Provenance, SourceFormat};

    fn record(pairs: &[(&str, Option<&str>)]) -> DeputyRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    fn dataset(records: Vec<DeputyRecord>) -> Dataset {
        Dataset::new(
            records,
            Provenance::new("test", "http://localhost", SourceFormat::Json),
        )
    }

    #[test]
    fn test_single_column_missing_value_keeps_row() {
        let ds = dataset(vec![
            record(&[("nom", Some("A"))]),
            record(&[("nom", None)]),
        ]);
        let output = String::from_utf8(CsvWriter::default().to_bytes(&ds).unwrap()).unwrap();
        assert_eq!(output, "nom\nA\n\"\"\n");

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][0], "");
    }

    #[test]
    fn test_heterogeneous_keys_union_header_and_blanks() {
        let ds = dataset(vec![
            record(&[("nom", Some("Jean Dupont")), ("sexe", Some("H"))]),
            record(&[("nom", Some("Marie Curie")), ("profession", Some("Chercheuse"))]),
            record(&[("twitter", Some("@lpasteur")), ("nom", None)]),
        ]);

        let output = String::from_utf8(CsvWriter::default().to_bytes(&ds).unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "nom,sexe,profession,twitter");
        assert_eq!(lines[1], "Jean Dupont,H,,");
        assert_eq!(lines[2], "Marie Curie,,Chercheuse,");
        assert_eq!(lines[3], ",,,@lpasteur");
    }

    #[test]
    fn test_delimiter_and_quoting() {
        let ds = dataset(vec![record(&[
            ("nom", Some("Dupont; Jean")),
            ("nom_circo", Some("Somme")),
        ])]);

        let output = String::from_utf8(CsvWriter::new(b';').to_bytes(&ds).unwrap()).unwrap();
        assert_eq!(output, "nom;nom_circo\n\"Dupont; Jean\";Somme\n");
    }

    #[test]
    fn test_bom_prefix() {
        let ds = dataset(vec![record(&[("nom", Some("Hélène"))])]);
        let bytes = CsvWriter::default().with_bom(true).to_bytes(&ds).unwrap();

        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(&bytes[3..], "nom\nHélène\n".as_bytes());
    }

    #[test]
    fn test_empty_dataset_writes_nothing() {
        let bytes = CsvWriter::default().to_bytes(&dataset(vec![])).unwrap();
        assert!(bytes.is_empty());
    }
}
