use crate::utils::error::{EtlError, Result};
use encoding_rs::{Encoding, ISO_8859_15, UTF_8, WINDOWS_1252};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
}

/// 依序嘗試候選編碼的嚴格解碼器（不使用替代字元）
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    candidates: Vec<&'static Encoding>,
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self {
            candidates: vec![UTF_8, WINDOWS_1252, ISO_8859_15],
        }
    }
}

impl PayloadDecoder {
    pub fn with_candidates(candidates: Vec<&'static Encoding>) -> Self {
        Self { candidates }
    }

    pub fn candidate_names(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|e| e.name()).collect()
    }

    /// A byte-order mark overrides the candidate list; otherwise the first
    /// candidate that decodes every byte wins.
    pub fn decode(&self, url: &str, bytes: &[u8]) -> Result<DecodedText> {
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            tracing::debug!("BOM found in payload from {}: {}", url, encoding.name());
            return encoding
                .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
                .map(|text| DecodedText {
                    text: text.into_owned(),
                    encoding: encoding.name(),
                })
                .ok_or_else(|| EtlError::DecodeError {
                    url: url.to_string(),
                    tried: vec![encoding.name().to_string()],
                });
        }

        let mut tried = Vec::with_capacity(self.candidates.len());
        for encoding in &self.candidates {
            tried.push(encoding.name().to_string());
            match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                Some(text) => {
                    if tried.len() > 1 {
                        tracing::info!(
                            "Decoded payload from {} as {} after {} failed",
                            url,
                            encoding.name(),
                            tried[..tried.len() - 1].join(", ")
                        );
                    }
                    return Ok(DecodedText {
                        text: text.into_owned(),
                        encoding: encoding.name(),
                    });
                }
                None => tracing::debug!("Payload from {} is not valid {}", url, encoding.name()),
            }
        }

        Err(EtlError::DecodeError {
            url: url.to_string(),
            tried,
        })
    }
}
