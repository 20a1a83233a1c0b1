//! Document status state machine.
//!
//! # States
//!
//! - `draft`: editable, no stock effect yet
//! - `waiting`: confirmed, waiting for availability
//! - `ready`: deliveries hold a reservation for every line
//! - `done` (terminal): stock has physically moved
//! - `canceled` (terminal): nothing moved; reservations released
//!
//! The document type never changes whether a transition is legal, only which
//! ledger operation runs for each line. [`plan`] is pure: it returns the target
//! status and the per-line ledger effects, and the caller applies them.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockmaster_core::{DomainError, DomainResult};
use stockmaster_products::{LedgerOp, ProductId};

use crate::document::DocumentLine;

/// Status of a stock document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Waiting,
    Ready,
    Done,
    Canceled,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Draft,
        DocumentStatus::Waiting,
        DocumentStatus::Ready,
        DocumentStatus::Done,
        DocumentStatus::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Waiting => "waiting",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Done => "done",
            DocumentStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Done | DocumentStatus::Canceled)
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown document status '{s}'")))
    }
}

/// Receipt (inbound) or delivery (outbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Receipt,
    Delivery,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Receipt => "receipt",
            DocumentType::Delivery => "delivery",
        }
    }
}

impl core::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" => Ok(DocumentType::Receipt),
            "delivery" => Ok(DocumentType::Delivery),
            other => Err(DomainError::validation(format!(
                "unknown document type '{other}'"
            ))),
        }
    }
}

/// What to do when the requested status equals the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameStatus {
    /// Fail with `InvalidTransition`.
    #[default]
    Reject,
    /// Succeed without any effect.
    Accept,
}

/// One ledger operation to run for one document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEffect {
    pub line_no: u32,
    pub product_id: ProductId,
    pub op: LedgerOp,
    pub quantity: u64,
}

/// Outcome of a validated transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub effects: Vec<LedgerEffect>,
}

impl TransitionPlan {
    /// A same-status request accepted as a no-op.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Products touched by the plan, sorted and deduplicated.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.effects.iter().map(|e| e.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Validate `from -> to` for a document and compute the ledger effects.
pub fn plan(
    document_type: DocumentType,
    from: DocumentStatus,
    to: DocumentStatus,
    lines: &[DocumentLine],
    same_status: SameStatus,
) -> DomainResult<TransitionPlan> {
    use DocumentStatus::*;

    if from == to {
        return match same_status {
            SameStatus::Accept => Ok(TransitionPlan {
                from,
                to,
                effects: Vec::new(),
            }),
            SameStatus::Reject => Err(DomainError::invalid_transition(from, to)),
        };
    }

    // Leaving draft requires at least one line, except to cancel.
    if from == Draft && to != Canceled && lines.is_empty() {
        return Err(DomainError::validation(format!(
            "cannot move a document without lines from draft to {to}"
        )));
    }

    let op = match (from, to) {
        (Draft, Waiting) => None,
        (Draft | Waiting, Ready) => match document_type {
            DocumentType::Delivery => Some(LedgerOp::Reserve),
            DocumentType::Receipt => None,
        },
        (Ready, Done) => match document_type {
            DocumentType::Delivery => Some(LedgerOp::Consume),
            DocumentType::Receipt => Some(LedgerOp::Receive),
        },
        (Draft | Waiting, Done) => match document_type {
            DocumentType::Delivery => Some(LedgerOp::RemoveUnreserved),
            DocumentType::Receipt => Some(LedgerOp::Receive),
        },
        (Ready, Canceled) => match document_type {
            DocumentType::Delivery => Some(LedgerOp::Release),
            DocumentType::Receipt => None,
        },
        (Draft | Waiting, Canceled) => None,
        _ => return Err(DomainError::invalid_transition(from, to)),
    };

    let effects = match op {
        Some(op) => lines
            .iter()
            .map(|line| LedgerEffect {
                line_no: line.line_no,
                product_id: line.product_id,
                op,
                quantity: line.quantity,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(TransitionPlan { from, to, effects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockmaster_core::AggregateId;
    use DocumentStatus::*;

    fn line(line_no: u32, quantity: u64) -> DocumentLine {
        DocumentLine {
            line_no,
            product_id: ProductId::new(AggregateId::new()),
            quantity,
            reserved: 0,
        }
    }

    fn ops(plan: &TransitionPlan) -> Vec<LedgerOp> {
        plan.effects.iter().map(|e| e.op).collect()
    }

    #[test]
    fn delivery_reserves_when_becoming_ready() {
        let lines = vec![line(1, 10), line(2, 3)];
        for from in [Draft, Waiting] {
            let plan =
                plan(DocumentType::Delivery, from, Ready, &lines, SameStatus::Reject).unwrap();
            assert_eq!(ops(&plan), vec![LedgerOp::Reserve, LedgerOp::Reserve]);
            assert_eq!(plan.effects[0].quantity, 10);
        }
    }

    #[test]
    fn receipt_has_no_effect_until_done() {
        let lines = vec![line(1, 10)];
        let plan = plan(DocumentType::Receipt, Draft, Ready, &lines, SameStatus::Reject).unwrap();
        assert!(plan.effects.is_empty());
        assert_eq!(plan.to, Ready);
    }

    #[test]
    fn done_effects_depend_on_origin_and_type() {
        let lines = vec![line(1, 5)];
        let cases = [
            (DocumentType::Delivery, Ready, LedgerOp::Consume),
            (DocumentType::Delivery, Draft, LedgerOp::RemoveUnreserved),
            (DocumentType::Delivery, Waiting, LedgerOp::RemoveUnreserved),
            (DocumentType::Receipt, Ready, LedgerOp::Receive),
            (DocumentType::Receipt, Draft, LedgerOp::Receive),
            (DocumentType::Receipt, Waiting, LedgerOp::Receive),
        ];
        for (document_type, from, expected) in cases {
            let plan = plan(document_type, from, Done, &lines, SameStatus::Reject).unwrap();
            assert_eq!(ops(&plan), vec![expected], "{document_type} from {from}");
        }
    }

    #[test]
    fn canceling_releases_only_ready_deliveries() {
        let lines = vec![line(1, 5)];
        let released =
            plan(DocumentType::Delivery, Ready, Canceled, &lines, SameStatus::Reject).unwrap();
        assert_eq!(ops(&released), vec![LedgerOp::Release]);

        for (document_type, from) in [
            (DocumentType::Delivery, Draft),
            (DocumentType::Delivery, Waiting),
            (DocumentType::Receipt, Ready),
        ] {
            let plan = plan(document_type, from, Canceled, &lines, SameStatus::Reject).unwrap();
            assert!(plan.effects.is_empty());
        }
    }

    #[test]
    fn leaving_draft_requires_lines() {
        for to in [Waiting, Ready, Done] {
            let err = plan(DocumentType::Delivery, Draft, to, &[], SameStatus::Reject).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
        // An empty draft can still be canceled.
        assert!(plan(DocumentType::Delivery, Draft, Canceled, &[], SameStatus::Reject).is_ok());
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let lines = vec![line(1, 1)];
        for from in [Done, Canceled] {
            for to in DocumentStatus::ALL {
                if to == from {
                    continue;
                }
                let err = plan(DocumentType::Delivery, from, to, &lines, SameStatus::Accept)
                    .unwrap_err();
                assert_eq!(err, DomainError::invalid_transition(from, to));
            }
        }
    }

    #[test]
    fn backwards_transitions_are_invalid() {
        let lines = vec![line(1, 1)];
        for (from, to) in [(Waiting, Draft), (Ready, Draft), (Ready, Waiting)] {
            let err =
                plan(DocumentType::Receipt, from, to, &lines, SameStatus::Reject).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn same_status_depends_on_caller_policy() {
        let lines = vec![line(1, 1)];
        let err =
            plan(DocumentType::Delivery, Ready, Ready, &lines, SameStatus::Reject).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let plan = plan(DocumentType::Delivery, Ready, Ready, &lines, SameStatus::Accept).unwrap();
        assert!(plan.is_noop());
        assert!(plan.effects.is_empty());
    }

    #[test]
    fn status_parsing_rejects_unknown_values() {
        assert_eq!("ready".parse::<DocumentStatus>().unwrap(), Ready);
        assert!("Ready".parse::<DocumentStatus>().is_err());
        assert!("cancelled".parse::<DocumentStatus>().is_err());
        assert!("".parse::<DocumentType>().is_err());
    }

    #[test]
    fn product_ids_are_deduplicated() {
        let product = ProductId::new(AggregateId::new());
        let lines = vec![
            DocumentLine { line_no: 1, product_id: product, quantity: 2, reserved: 0 },
            DocumentLine { line_no: 2, product_id: product, quantity: 3, reserved: 0 },
        ];
        let plan = plan(DocumentType::Delivery, Draft, Done, &lines, SameStatus::Reject).unwrap();
        assert_eq!(plan.product_ids(), vec![product]);
    }
}
