//! Stock move history.
//!
//! One record per line whose ledger effect physically moved stock in or out of
//! the warehouse, plus one per manual adjustment. Reservations and releases
//! leave no move behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockmaster_core::CorrelationId;
use stockmaster_products::{MoveDirection, ProductId};

use crate::document::DocumentId;
use crate::reference::DocumentNumber;
use crate::status::TransitionPlan;

/// Reference recorded on manual adjustments.
pub const ADJUSTMENT_REFERENCE: &str = "WH/ADJ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMove {
    /// Shared by every move of one transition.
    pub correlation_id: CorrelationId,
    /// `None` for manual adjustments.
    pub document_id: Option<DocumentId>,
    pub reference: String,
    pub product_id: ProductId,
    pub direction: MoveDirection,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

impl StockMove {
    /// Moves produced by a committed transition, in line order.
    pub fn from_plan(
        correlation_id: CorrelationId,
        document_id: DocumentId,
        number: DocumentNumber,
        plan: &TransitionPlan,
        occurred_at: DateTime<Utc>,
    ) -> Vec<StockMove> {
        let reference = number.reference();
        plan.effects
            .iter()
            .filter_map(|effect| {
                effect.op.moves_stock().map(|direction| StockMove {
                    correlation_id,
                    document_id: Some(document_id),
                    reference: reference.clone(),
                    product_id: effect.product_id,
                    direction,
                    quantity: effect.quantity,
                    occurred_at,
                })
            })
            .collect()
    }

    /// Stock received directly on a product, outside any document.
    pub fn adjustment(
        correlation_id: CorrelationId,
        product_id: ProductId,
        quantity: u64,
        occurred_at: DateTime<Utc>,
    ) -> StockMove {
        StockMove {
            correlation_id,
            document_id: None,
            reference: ADJUSTMENT_REFERENCE.to_string(),
            product_id,
            direction: MoveDirection::In,
            quantity,
            occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentLine;
    use crate::status::{self, DocumentStatus, DocumentType, SameStatus};
    use stockmaster_core::AggregateId;

    fn lines() -> Vec<DocumentLine> {
        vec![
            DocumentLine {
                line_no: 1,
                product_id: ProductId::new(AggregateId::new()),
                quantity: 10,
                reserved: 10,
            },
            DocumentLine {
                line_no: 2,
                product_id: ProductId::new(AggregateId::new()),
                quantity: 3,
                reserved: 3,
            },
        ]
    }

    fn moves_for(
        document_type: DocumentType,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Vec<StockMove> {
        let plan = status::plan(document_type, from, to, &lines(), SameStatus::Reject).unwrap();
        StockMove::from_plan(
            CorrelationId::new(),
            DocumentId::new(AggregateId::new()),
            DocumentNumber::new(document_type, 7),
            &plan,
            Utc::now(),
        )
    }

    #[test]
    fn processed_delivery_moves_stock_out() {
        let moves = moves_for(DocumentType::Delivery, DocumentStatus::Ready, DocumentStatus::Done);
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| m.direction == MoveDirection::Out));
        assert_eq!(moves[0].reference, "WH/OUT/0007");
        assert_eq!(moves[1].quantity, 3);
        assert_eq!(moves[0].correlation_id, moves[1].correlation_id);
    }

    #[test]
    fn adjustments_carry_no_document() {
        let product_id = ProductId::new(AggregateId::new());
        let adjustment = StockMove::adjustment(CorrelationId::new(), product_id, 4, Utc::now());
        assert_eq!(adjustment.document_id, None);
        assert_eq!(adjustment.reference, ADJUSTMENT_REFERENCE);
        assert_eq!(adjustment.direction, MoveDirection::In);
        assert_eq!(adjustment.quantity, 4);
    }

    #[test]
    fn processed_receipt_moves_stock_in() {
        let moves = moves_for(DocumentType::Receipt, DocumentStatus::Draft, DocumentStatus::Done);
        assert!(moves.iter().all(|m| m.direction == MoveDirection::In));
        assert_eq!(moves[0].reference, "WH/IN/0007");
    }

    #[test]
    fn reservations_and_releases_leave_no_moves() {
        assert!(
            moves_for(DocumentType::Delivery, DocumentStatus::Waiting, DocumentStatus::Ready)
                .is_empty()
        );
        assert!(
            moves_for(DocumentType::Delivery, DocumentStatus::Ready, DocumentStatus::Canceled)
                .is_empty()
        );
    }
}
