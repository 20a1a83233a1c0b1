//! Human-facing document numbers.
//!
//! Each document type has its own sequence, assigned by the repository and
//! starting at 1. A number renders two ways:
//!
//! - code: `RCP-001` / `DEL-001`
//! - warehouse reference: `WH/IN/0001` / `WH/OUT/0001`

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockmaster_core::{DomainError, ValueObject};

use crate::status::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub document_type: DocumentType,
    pub sequence: u32,
}

impl ValueObject for DocumentNumber {}

impl DocumentNumber {
    pub fn new(document_type: DocumentType, sequence: u32) -> Self {
        Self {
            document_type,
            sequence,
        }
    }

    fn code_prefix(document_type: DocumentType) -> &'static str {
        match document_type {
            DocumentType::Receipt => "RCP",
            DocumentType::Delivery => "DEL",
        }
    }

    /// Short code, e.g. `RCP-001`.
    pub fn code(&self) -> String {
        format!(
            "{}-{:03}",
            Self::code_prefix(self.document_type),
            self.sequence
        )
    }

    /// Warehouse reference, e.g. `WH/OUT/0001`.
    pub fn reference(&self) -> String {
        let direction = match self.document_type {
            DocumentType::Receipt => "IN",
            DocumentType::Delivery => "OUT",
        };
        format!("WH/{direction}/{:04}", self.sequence)
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.code())
    }
}

/// Parses the short code form (`DEL-012`).
impl FromStr for DocumentNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::invalid_id(format!("malformed document code '{s}'"));

        let (prefix, digits) = s.split_once('-').ok_or_else(invalid)?;
        let document_type = match prefix {
            "RCP" => DocumentType::Receipt,
            "DEL" => DocumentType::Delivery,
            _ => return Err(invalid()),
        };
        if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence: u32 = digits.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }

        Ok(Self::new(document_type, sequence))
    }
}
