//! Loan overlay: custody records that shadow availability without touching
//! the balance

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::validation::{
    normalize_optional_text, validate_date_order, validate_positive_quantity,
    validate_required_text,
};

/// Where a loaned item comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrigin {
    /// A balance record owned by the site
    Owned,
    /// An active rented equipment batch
    Rented,
}

impl ItemOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOrigin::Owned => "owned",
            ItemOrigin::Rented => "rented",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owned" => Some(ItemOrigin::Owned),
            "rented" => Some(ItemOrigin::Rented),
            _ => None,
        }
    }
}

/// Loan lifecycle; `Returned` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "open",
            LoanStatus::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(LoanStatus::Open),
            "returned" => Some(LoanStatus::Returned),
            _ => None,
        }
    }
}

/// The item a loan is held against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanTarget {
    pub origin: ItemOrigin,
    pub item_id: Uuid,
}

impl LoanTarget {
    pub fn owned(item_id: Uuid) -> Self {
        Self {
            origin: ItemOrigin::Owned,
            item_id,
        }
    }

    pub fn rented(item_id: Uuid) -> Self {
        Self {
            origin: ItemOrigin::Rented,
            item_id,
        }
    }
}

/// A tool loan or EPI withdrawal-as-loan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub item_id: Uuid,
    pub item_origin: ItemOrigin,
    pub item_name: String,
    pub borrower_name: String,
    pub quantity: Decimal,
    pub loan_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub return_notes: Option<String>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

/// Request to open a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoan {
    pub item_origin: ItemOrigin,
    pub item_id: Uuid,
    pub borrower_name: String,
    pub quantity: Decimal,
    pub loan_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewLoan {
    pub fn target(&self) -> LoanTarget {
        LoanTarget {
            origin: self.item_origin,
            item_id: self.item_id,
        }
    }
}

impl LoanRecord {
    /// Build an OPEN loan; the availability check happens where the loan is
    /// committed
    pub fn open(
        site_id: Uuid,
        request: NewLoan,
        item_name: String,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        validate_positive_quantity(request.quantity)?;
        validate_required_text("borrower_name", &request.borrower_name)?;

        Ok(Self {
            id: Uuid::new_v4(),
            site_id,
            item_id: request.item_id,
            item_origin: request.item_origin,
            item_name,
            borrower_name: request.borrower_name.trim().to_string(),
            quantity: request.quantity,
            loan_date: request.loan_date.unwrap_or_else(|| now.date_naive()),
            return_date: None,
            notes: normalize_optional_text(request.notes),
            return_notes: None,
            status: LoanStatus::Open,
            created_at: now,
        })
    }

    pub fn target(&self) -> LoanTarget {
        LoanTarget {
            origin: self.item_origin,
            item_id: self.item_id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }

    /// OPEN → RETURNED; there is no way back
    pub fn mark_returned(
        &mut self,
        return_date: NaiveDate,
        return_notes: Option<String>,
    ) -> Result<(), LedgerError> {
        if self.status == LoanStatus::Returned {
            return Err(LedgerError::InvalidStateTransition(
                "loan has already been returned",
            ));
        }
        validate_date_order("return_date", self.loan_date, return_date)?;

        self.status = LoanStatus::Returned;
        self.return_date = Some(return_date);
        self.return_notes = normalize_optional_text(return_notes);
        Ok(())
    }
}

/// Availability of an item: capacity minus open loans, never below zero
pub fn available(capacity: Decimal, committed: Decimal) -> Decimal {
    (capacity - committed).max(Decimal::ZERO)
}

/// Reject a loan request that exceeds the current availability
pub fn ensure_available(
    capacity: Decimal,
    committed: Decimal,
    requested: Decimal,
) -> Result<(), LedgerError> {
    let available = available(capacity, committed);
    if requested > available {
        return Err(LedgerError::InsufficientStock {
            requested,
            available,
        });
    }
    Ok(())
}

/// Sum of open loans against one target
pub fn committed_quantity<'a>(
    loans: impl IntoIterator<Item = &'a LoanRecord>,
    target: LoanTarget,
) -> Decimal {
    loans
        .into_iter()
        .filter(|loan| loan.is_open() && loan.target() == target)
        .map(|loan| loan.quantity)
        .sum()
}

/// An item currently offered by the loan overlay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanableItem {
    pub origin: ItemOrigin,
    pub item_id: Uuid,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub capacity: Decimal,
    pub committed: Decimal,
    pub available: Decimal,
}

impl LoanableItem {
    pub fn new(
        target: LoanTarget,
        name: String,
        unit: String,
        category: String,
        capacity: Decimal,
        committed: Decimal,
    ) -> Self {
        Self {
            origin: target.origin,
            item_id: target.item_id,
            name,
            unit,
            category,
            capacity,
            committed,
            available: available(capacity, committed),
        }
    }
}
