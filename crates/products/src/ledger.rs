//! Quantity ledger: invariant-preserving arithmetic over on-hand and reserved stock.
//!
//! Every operation takes the current [`StockLevels`] and returns new levels or a
//! [`LedgerError`]. Nothing here persists anything; callers decide when a result
//! is committed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockmaster_core::{AggregateId, DomainError, ValueObject};

/// On-hand and reserved quantity of one product.
///
/// Invariant: `reserved <= on_hand`. The fields are private so the invariant can
/// only change through the ledger operations below.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct StockLevels {
    on_hand: u64,
    reserved: u64,
}

impl ValueObject for StockLevels {}

/// Ledger precondition failures (no product context yet).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("quantity overflow")]
    Overflow,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("insufficient reserved stock: requested {requested}, reserved {reserved}")]
    InsufficientReservedStock { requested: u64, reserved: u64 },

    #[error("reserved {reserved} exceeds on-hand {on_hand}")]
    ReservedExceedsOnHand { on_hand: u64, reserved: u64 },
}

impl LedgerError {
    /// Attach the product the failure happened on.
    pub fn into_domain(self, product: AggregateId) -> DomainError {
        match self {
            LedgerError::ZeroQuantity => DomainError::validation("quantity must be positive"),
            LedgerError::Overflow => DomainError::validation(format!(
                "quantity overflow for product {product}"
            )),
            LedgerError::InsufficientStock {
                requested,
                available,
            } => DomainError::InsufficientStock {
                product,
                requested,
                available,
                shortfall: requested - available,
            },
            LedgerError::InsufficientReservedStock {
                requested,
                reserved,
            } => DomainError::InsufficientReservedStock {
                product,
                requested,
                reserved,
                shortfall: requested - reserved,
            },
            LedgerError::ReservedExceedsOnHand { on_hand, reserved } => DomainError::invariant(
                format!("product {product}: reserved {reserved} exceeds on-hand {on_hand}"),
            ),
        }
    }
}

impl StockLevels {
    /// Levels with nothing reserved.
    pub fn with_on_hand(on_hand: u64) -> Self {
        Self {
            on_hand,
            reserved: 0,
        }
    }

    /// Rebuild levels from stored columns, rejecting rows that break the invariant.
    pub fn from_parts(on_hand: u64, reserved: u64) -> Result<Self, LedgerError> {
        if reserved > on_hand {
            return Err(LedgerError::ReservedExceedsOnHand { on_hand, reserved });
        }
        Ok(Self { on_hand, reserved })
    }

    pub fn on_hand(&self) -> u64 {
        self.on_hand
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn free_to_use(&self) -> u64 {
        self.on_hand - self.reserved
    }

    /// Inbound stock (receipt done). Always valid for a positive quantity.
    pub fn receive(self, qty: u64) -> Result<Self, LedgerError> {
        ensure_positive(qty)?;
        let on_hand = self.on_hand.checked_add(qty).ok_or(LedgerError::Overflow)?;
        Ok(Self { on_hand, ..self })
    }

    /// Allocate free stock to a delivery (delivery ready).
    pub fn reserve(self, qty: u64) -> Result<Self, LedgerError> {
        ensure_positive(qty)?;
        let available = self.free_to_use();
        if qty > available {
            return Err(LedgerError::InsufficientStock {
                requested: qty,
                available,
            });
        }
        Ok(Self {
            reserved: self.reserved + qty,
            ..self
        })
    }

    /// Give reserved stock back to free-to-use (ready delivery canceled). Clamped at zero.
    pub fn release(self, qty: u64) -> Self {
        Self {
            reserved: self.reserved.saturating_sub(qty),
            ..self
        }
    }

    /// Ship previously reserved stock (ready delivery done).
    pub fn consume(self, qty: u64) -> Result<Self, LedgerError> {
        ensure_positive(qty)?;
        if qty > self.reserved {
            return Err(LedgerError::InsufficientReservedStock {
                requested: qty,
                reserved: self.reserved,
            });
        }
        Ok(Self {
            on_hand: self.on_hand - qty,
            reserved: self.reserved - qty,
        })
    }

    /// Ship stock that was never reserved (draft/waiting delivery straight to done).
    pub fn remove_unreserved(self, qty: u64) -> Result<Self, LedgerError> {
        ensure_positive(qty)?;
        let available = self.free_to_use();
        if qty > available {
            return Err(LedgerError::InsufficientStock {
                requested: qty,
                available,
            });
        }
        Ok(Self {
            on_hand: self.on_hand - qty,
            ..self
        })
    }

    /// Run one ledger operation by name.
    pub fn apply(self, op: LedgerOp, qty: u64) -> Result<Self, LedgerError> {
        match op {
            LedgerOp::Receive => self.receive(qty),
            LedgerOp::Reserve => self.reserve(qty),
            LedgerOp::Release => Ok(self.release(qty)),
            LedgerOp::Consume => self.consume(qty),
            LedgerOp::RemoveUnreserved => self.remove_unreserved(qty),
        }
    }
}

fn ensure_positive(qty: u64) -> Result<(), LedgerError> {
    if qty == 0 {
        return Err(LedgerError::ZeroQuantity);
    }
    Ok(())
}

/// The five ledger operations, as data (used by transition plans).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOp {
    Receive,
    Reserve,
    Release,
    Consume,
    RemoveUnreserved,
}

impl LedgerOp {
    /// Direction of the physical stock move this operation causes, if any.
    pub fn moves_stock(self) -> Option<MoveDirection> {
        match self {
            LedgerOp::Receive => Some(MoveDirection::In),
            LedgerOp::Consume | LedgerOp::RemoveUnreserved => Some(MoveDirection::Out),
            LedgerOp::Reserve | LedgerOp::Release => None,
        }
    }
}

/// Direction of a physical stock move.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    In,
    Out,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_increases_on_hand_only() {
        let levels = StockLevels::from_parts(10, 4).unwrap().receive(5).unwrap();
        assert_eq!(levels.on_hand(), 15);
        assert_eq!(levels.reserved(), 4);
        assert_eq!(levels.free_to_use(), 11);
    }

    #[test]
    fn receive_rejects_zero() {
        assert_eq!(
            StockLevels::with_on_hand(1).receive(0),
            Err(LedgerError::ZeroQuantity)
        );
    }

    #[test]
    fn receive_reports_overflow() {
        assert_eq!(
            StockLevels::with_on_hand(u64::MAX).receive(1),
            Err(LedgerError::Overflow)
        );
    }

    #[test]
    fn reserve_uses_free_to_use_not_on_hand() {
        let levels = StockLevels::from_parts(10, 6).unwrap();
        let err = levels.reserve(5).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: 5,
                available: 4
            }
        );
        let ok = levels.reserve(4).unwrap();
        assert_eq!(ok.free_to_use(), 0);
    }

    #[test]
    fn release_is_clamped_at_zero() {
        let levels = StockLevels::from_parts(10, 3).unwrap().release(7);
        assert_eq!(levels.reserved(), 0);
        assert_eq!(levels.on_hand(), 10);
    }

    #[test]
    fn consume_requires_reserved_stock() {
        let levels = StockLevels::from_parts(10, 2).unwrap();
        assert_eq!(
            levels.consume(3),
            Err(LedgerError::InsufficientReservedStock {
                requested: 3,
                reserved: 2
            })
        );
        let after = levels.consume(2).unwrap();
        assert_eq!(after.on_hand(), 8);
        assert_eq!(after.reserved(), 0);
    }

    #[test]
    fn remove_unreserved_cannot_touch_reserved_stock() {
        let levels = StockLevels::from_parts(5, 3).unwrap();
        assert!(matches!(
            levels.remove_unreserved(3),
            Err(LedgerError::InsufficientStock { requested: 3, available: 2 })
        ));
        let after = levels.remove_unreserved(2).unwrap();
        assert_eq!(after.on_hand(), 3);
        assert_eq!(after.reserved(), 3);
    }

    #[test]
    fn from_parts_rejects_reserved_above_on_hand() {
        assert!(StockLevels::from_parts(1, 2).is_err());
    }

    #[test]
    fn shortfall_is_computed_when_attaching_product() {
        let product = AggregateId::new();
        let err = LedgerError::InsufficientStock {
            requested: 12,
            available: 10,
        }
        .into_domain(product);
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product,
                requested: 12,
                available: 10,
                shortfall: 2
            }
        );
    }

    #[test]
    fn only_receive_consume_and_remove_move_stock() {
        assert_eq!(LedgerOp::Receive.moves_stock(), Some(MoveDirection::In));
        assert_eq!(LedgerOp::Consume.moves_stock(), Some(MoveDirection::Out));
        assert_eq!(
            LedgerOp::RemoveUnreserved.moves_stock(),
            Some(MoveDirection::Out)
        );
        assert_eq!(LedgerOp::Reserve.moves_stock(), None);
        assert_eq!(LedgerOp::Release.moves_stock(), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_op() -> impl Strategy<Value = LedgerOp> {
            prop_oneof![
                Just(LedgerOp::Receive),
                Just(LedgerOp::Reserve),
                Just(LedgerOp::Release),
                Just(LedgerOp::Consume),
                Just(LedgerOp::RemoveUnreserved),
            ]
        }

        /// `(on_hand, reserved, qty)` with `qty` always within free-to-use.
        fn reservable() -> impl Strategy<Value = (u64, u64, u64)> {
            (1u64..10_000)
                .prop_flat_map(|on_hand| (Just(on_hand), 0..on_hand))
                .prop_flat_map(|(on_hand, reserved)| {
                    (Just(on_hand), Just(reserved), 1..=on_hand - reserved)
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: reserved never exceeds on-hand, whatever sequence runs.
            #[test]
            fn reserved_never_exceeds_on_hand(
                start in 0u64..1_000,
                ops in proptest::collection::vec((any_op(), 0u64..500), 0..50)
            ) {
                let mut levels = StockLevels::with_on_hand(start);
                for (op, qty) in ops {
                    if let Ok(next) = levels.apply(op, qty) {
                        levels = next;
                    }
                    prop_assert!(levels.reserved() <= levels.on_hand());
                }
            }

            /// Property: reserve then release of the same quantity restores reserved.
            #[test]
            fn reserve_release_round_trip((on_hand, reserved, qty) in reservable()) {
                let levels = StockLevels::from_parts(on_hand, reserved).unwrap();
                prop_assert!(qty <= levels.free_to_use());

                let back = levels.reserve(qty).unwrap().release(qty);
                prop_assert_eq!(back, levels);
            }

            /// Property: reserving more than free-to-use fails and changes nothing.
            #[test]
            fn over_reservation_fails(
                on_hand in 0u64..10_000,
                reserved in 0u64..10_000,
                extra in 1u64..1_000
            ) {
                let levels = StockLevels::from_parts(on_hand.max(reserved), reserved).unwrap();
                let qty = levels.free_to_use() + extra;
                let before = levels;
                let result = levels.reserve(qty);
                let is_insufficient = matches!(result, Err(LedgerError::InsufficientStock { .. }));
                prop_assert!(is_insufficient);
                prop_assert_eq!(levels, before);
            }
        }
    }
}
