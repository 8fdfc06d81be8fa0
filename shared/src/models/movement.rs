//! Movement ledger: immutable IN/OUT events and the planning rule that
//! turns a requested movement into a new balance

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BalanceRecord;
use crate::error::LedgerError;
use crate::types::Actor;
use crate::validation::{normalize_optional_text, validate_non_negative, validate_positive_quantity};

/// Reason text stamped on EPI withdrawals when the caller gives none
pub const EPI_WITHDRAWAL_REASON: &str = "Retirada de EPI";

/// Reason text stamped on administrative count corrections
pub const ADJUSTMENT_REASON: &str = "Ajuste de inventário";

/// Decimal places kept on the weighted average price
const AVERAGE_PRICE_SCALE: u32 = crate::validation::MAX_DECIMAL_PLACES;

/// Direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            _ => None,
        }
    }
}

/// What kind of business event a movement records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementCategory {
    #[default]
    Generic,
    /// Protective equipment handed to a collaborator
    EpiWithdrawal,
    /// Synthetic movement emitted by an administrative count correction
    Adjustment,
}

impl MovementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementCategory::Generic => "generic",
            MovementCategory::EpiWithdrawal => "epi_withdrawal",
            MovementCategory::Adjustment => "adjustment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generic" => Some(MovementCategory::Generic),
            "epi_withdrawal" => Some(MovementCategory::EpiWithdrawal),
            "adjustment" => Some(MovementCategory::Adjustment),
            _ => None,
        }
    }
}

/// An immutable ledger entry; never updated or deleted once committed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementEvent {
    pub id: Uuid,
    pub balance_id: Uuid,
    pub site_id: Uuid,
    pub movement_type: MovementType,
    pub category: MovementCategory,
    pub quantity: Decimal,
    pub movement_date: NaiveDate,
    pub reason: Option<String>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    /// Purchase price per unit, IN movements only
    pub unit_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl MovementEvent {
    /// Quantity with the sign of its direction
    pub fn signed_quantity(&self) -> Decimal {
        match self.movement_type {
            MovementType::In => self.quantity,
            MovementType::Out => -self.quantity,
        }
    }
}

/// A movement as requested by a caller, before it is planned against a balance
#[derive(Debug, Clone, PartialEq)]
pub struct MovementDraft {
    pub movement_type: MovementType,
    pub category: MovementCategory,
    pub quantity: Decimal,
    pub movement_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub actor: Option<Actor>,
    pub unit_price: Option<Decimal>,
}

impl MovementDraft {
    pub fn new(movement_type: MovementType, quantity: Decimal) -> Self {
        Self {
            movement_type,
            category: MovementCategory::Generic,
            quantity,
            movement_date: None,
            reason: None,
            actor: None,
            unit_price: None,
        }
    }

    pub fn inbound(quantity: Decimal) -> Self {
        Self::new(MovementType::In, quantity)
    }

    pub fn outbound(quantity: Decimal) -> Self {
        Self::new(MovementType::Out, quantity)
    }

    /// An OUT movement handing protective equipment to a collaborator
    pub fn epi_withdrawal(quantity: Decimal, collaborator: Actor) -> Self {
        Self::outbound(quantity)
            .with_category(MovementCategory::EpiWithdrawal)
            .with_actor(Some(collaborator))
    }

    pub fn with_category(mut self, category: MovementCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_actor(mut self, actor: Option<Actor>) -> Self {
        self.actor = actor;
        self
    }

    pub fn on_date(mut self, date: Option<NaiveDate>) -> Self {
        self.movement_date = date;
        self
    }

    pub fn with_unit_price(mut self, unit_price: Option<Decimal>) -> Self {
        self.unit_price = unit_price;
        self
    }
}

/// The outcome of planning a movement: the balance to write and the event to
/// append, both committed together or not at all
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMovement {
    /// Version the stored balance must still carry for the commit to succeed
    pub expected_version: i64,
    pub balance: BalanceRecord,
    pub event: MovementEvent,
}

impl BalanceRecord {
    /// Plan a movement against the current balance
    ///
    /// Pure: the caller commits the result atomically. An OUT that would take
    /// the quantity below zero is rejected with `InsufficientStock`.
    pub fn plan_movement(
        &self,
        draft: MovementDraft,
        now: DateTime<Utc>,
    ) -> Result<PlannedMovement, LedgerError> {
        validate_positive_quantity(draft.quantity)?;

        if draft.category == MovementCategory::EpiWithdrawal
            && draft.movement_type != MovementType::Out
        {
            return Err(LedgerError::invalid(
                "movement_type",
                "EPI withdrawals are always OUT movements",
            ));
        }

        let mut balance = self.clone();
        let unit_price = match draft.movement_type {
            MovementType::In => {
                balance.quantity += draft.quantity;
                if let Some(price) = draft.unit_price {
                    validate_non_negative("unit_price", price)?;
                    balance.average_price = weighted_average_price(
                        self.quantity,
                        self.average_price,
                        draft.quantity,
                        price,
                    );
                }
                draft.unit_price
            }
            MovementType::Out => {
                if draft.unit_price.is_some() {
                    return Err(LedgerError::invalid(
                        "unit_price",
                        "only applies to IN movements",
                    ));
                }
                let remaining = self.quantity - draft.quantity;
                if remaining < Decimal::ZERO {
                    return Err(LedgerError::InsufficientStock {
                        requested: draft.quantity,
                        available: self.quantity,
                    });
                }
                balance.quantity = remaining;
                None
            }
        };
        balance.version = self.version + 1;
        balance.updated_at = now;

        let reason = normalize_optional_text(draft.reason).or_else(|| match draft.category {
            MovementCategory::EpiWithdrawal => Some(EPI_WITHDRAWAL_REASON.to_string()),
            MovementCategory::Adjustment => Some(ADJUSTMENT_REASON.to_string()),
            MovementCategory::Generic => None,
        });
        let (actor_id, actor_name) = match draft.actor {
            Some(actor) => (Some(actor.id), Some(actor.name)),
            None => (None, None),
        };

        let event = MovementEvent {
            id: Uuid::new_v4(),
            balance_id: self.id,
            site_id: self.site_id,
            movement_type: draft.movement_type,
            category: draft.category,
            quantity: draft.quantity,
            movement_date: draft.movement_date.unwrap_or_else(|| now.date_naive()),
            reason,
            actor_id,
            actor_name,
            unit_price,
            created_at: now,
        };

        Ok(PlannedMovement {
            expected_version: self.version,
            balance,
            event,
        })
    }
}

/// Draft the synthetic movement that brings `current` to `target`
///
/// Returns `None` when the count already matches.
pub fn adjustment_draft(
    current: Decimal,
    target: Decimal,
) -> Result<Option<MovementDraft>, LedgerError> {
    validate_non_negative("quantity", target)?;

    let delta = target - current;
    let draft = if delta > Decimal::ZERO {
        Some(MovementDraft::inbound(delta))
    } else if delta < Decimal::ZERO {
        Some(MovementDraft::outbound(-delta))
    } else {
        None
    };

    Ok(draft.map(|d| d.with_category(MovementCategory::Adjustment)))
}

/// New average unit price after receiving `incoming` units at `unit_price`
pub fn weighted_average_price(
    quantity: Decimal,
    average_price: Decimal,
    incoming: Decimal,
    unit_price: Decimal,
) -> Decimal {
    let total_quantity = quantity + incoming;
    if total_quantity <= Decimal::ZERO {
        return average_price;
    }
    ((quantity * average_price + incoming * unit_price) / total_quantity)
        .round_dp(AVERAGE_PRICE_SCALE)
}

/// Rebuild a quantity from its movements
pub fn replay_quantity<'a>(events: impl IntoIterator<Item = &'a MovementEvent>) -> Decimal {
    events
        .into_iter()
        .map(MovementEvent::signed_quantity)
        .sum()
}

/// Totals of a balance's ledger, as summed by a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub movement_count: u64,
}

impl MovementTotals {
    pub fn replayed_quantity(&self) -> Decimal {
        self.total_in - self.total_out
    }
}

/// Result of checking a balance against its ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerAudit {
    pub balance_id: Uuid,
    pub recorded_quantity: Decimal,
    pub replayed_quantity: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub movement_count: u64,
    pub consistent: bool,
}

impl LedgerAudit {
    pub fn new(balance: &BalanceRecord, totals: MovementTotals) -> Self {
        let replayed_quantity = totals.replayed_quantity();
        Self {
            balance_id: balance.id,
            recorded_quantity: balance.quantity,
            replayed_quantity,
            total_in: totals.total_in,
            total_out: totals.total_out,
            movement_count: totals.movement_count,
            consistent: replayed_quantity == balance.quantity,
        }
    }
}
