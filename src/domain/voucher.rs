use super::ids::{UserId, VoucherId};
use crate::error::Conflict;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A pre-purchased bundle of class credits owned by one student.
///
/// Invariant: `remaining_credits <= total_credits`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Voucher {
    pub id: VoucherId,
    pub student: UserId,
    pub total_credits: u32,
    pub remaining_credits: u32,
    pub price: Decimal,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revision: u64,
}

impl Voucher {
    pub fn new(student: UserId, total_credits: u32, price: Decimal) -> Self {
        Self {
            id: VoucherId::new(),
            student,
            total_credits,
            remaining_credits: total_credits,
            price,
            created_at: Utc::now(),
            expires_at: None,
            revision: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// A voucher can pay for a class when it has credit left and has not expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.remaining_credits > 0 && !self.is_expired(now)
    }

    /// Spends one credit.
    pub fn debit(&mut self, now: DateTime<Utc>) -> Result<(), Conflict> {
        if !self.is_usable(now) {
            return Err(Conflict::InsufficientVoucher(self.student.clone()));
        }
        self.remaining_credits -= 1;
        Ok(())
    }

    /// Gives one credit back, never exceeding the purchased total.
    pub fn refund(&mut self) -> bool {
        if self.remaining_credits >= self.total_credits {
            return false;
        }
        self.remaining_credits += 1;
        true
    }
}
