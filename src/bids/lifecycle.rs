//! Bid status states and the transitions operators may trigger.
//!
//! Status changes arrive as part of ordinary bid updates; every update
//! passes through [`BidStatus::validate_transition`] and then recomputes
//! the bid value with [`derived_value`], so status and value never
//! disagree in a persisted row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{BidError, ItemLedger};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    Pending,
    Won,
    Partial,
    Lost,
    Delivered,
    Paid,
}

impl BidStatus {
    pub const ALL: [BidStatus; 6] = [
        Self::Pending,
        Self::Won,
        Self::Partial,
        Self::Lost,
        Self::Delivered,
        Self::Paid,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Won => "won",
            Self::Partial => "partial",
            Self::Lost => "lost",
            Self::Delivered => "delivered",
            Self::Paid => "paid",
        }
    }

    /// Statuses whose value is the sum of won item prices.
    pub const fn counts_won_items(&self) -> bool {
        matches!(
            self,
            Self::Won | Self::Partial | Self::Delivered | Self::Paid
        )
    }

    /// Statuses whose value is still owed to the company.
    pub const fn is_receivable(&self) -> bool {
        matches!(self, Self::Won | Self::Partial | Self::Delivered)
    }

    /// Checks a status change against the lifecycle table. Keeping the same
    /// status is an edit and always allowed.
    pub fn validate_transition(&self, to: BidStatus) -> Result<(), BidError> {
        if *self == to {
            return Ok(());
        }

        let allowed = match (self, to) {
            (Self::Pending, Self::Won | Self::Partial | Self::Lost) => true,
            (Self::Won | Self::Partial, Self::Delivered) => true,
            (Self::Won | Self::Partial | Self::Delivered, Self::Lost) => true,
            (Self::Delivered, Self::Paid) => true,
            (Self::Paid, Self::Delivered) => true,
            (Self::Lost, Self::Won) => true,
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(BidError::InvalidTransition { from: *self, to })
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = BidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BidError::UnknownStatus(s.to_string()))
    }
}

/// Value a bid must carry in `status`. Lost bids keep `current`.
pub fn derived_value(status: BidStatus, items: &ItemLedger, current: f64) -> f64 {
    match status {
        BidStatus::Pending => items.quoted_total(),
        BidStatus::Lost => current,
        _ => items.won_total(),
    }
}
