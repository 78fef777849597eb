//! services/api/src/adapters/extraction.rs
//!
//! This module contains the text-extraction adapter. It implements the
//! `TextExtractionService` port from the `core` crate.
//!
//! OCR is out of scope: this adapter substitutes a fixed sample contract for
//! every document, which is the stand-in a real OCR collaborator would
//! replace. The port contract is bytes in, non-empty text out.

use async_trait::async_trait;

use assurscan_core::ports::{PortError, PortResult, TextExtractionService};

const SAMPLE_CONTRACT_TEXT: &str = r#"CONTRAT D'ASSURANCE AUTOMOBILE

Assuré : Jean Dupont
Véhicule : Renault Clio 2020
Immatriculation : AB-123-CD

GARANTIES INCLUSES :
- Responsabilité civile
- Dommages tous accidents
- Vol et incendie
- Protection juridique

MONTANTS :
Prime mensuelle : 45€
Franchise : 350€
Plafond de garantie : 50 000€

EXCLUSIONS :
- Conduite en état d'ivresse
- Catastrophes naturelles
- Usage professionnel du véhicule

Date de souscription : 01/01/2024
Échéance annuelle : 31/12/2024"#;

/// A mock OCR adapter returning a fixed French contract for any input.
#[derive(Clone, Default)]
pub struct MockOcrAdapter;

impl MockOcrAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractionService for MockOcrAdapter {
    async fn extract_text(&self, file_bytes: &[u8]) -> PortResult<String> {
        if file_bytes.is_empty() {
            return Err(PortError::InvalidPayload(
                "Document is empty, nothing to extract".to_string(),
            ));
        }
        Ok(SAMPLE_CONTRACT_TEXT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_non_empty_text_for_any_document() {
        let adapter = MockOcrAdapter::new();
        let text = adapter.extract_text(b"%PDF-1.4").await.unwrap();
        assert!(text.contains("CONTRAT D'ASSURANCE"));
        assert!(!text.trim().is_empty());
    }

    #[tokio::test]
    async fn empty_document_is_rejected() {
        let adapter = MockOcrAdapter::new();
        let err = adapter.extract_text(b"").await.unwrap_err();
        assert!(matches!(err, PortError::InvalidPayload(_)));
    }
}
