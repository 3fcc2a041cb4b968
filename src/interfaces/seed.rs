//! Initial teachers, students and vouchers, loaded from a JSON file.
//!
//! ```json
//! {
//!   "teachers": [{ "id": "t-1", "username": "ada", "email": "ada@example.com" }],
//!   "students": [{ "id": "s-1", "username": "bob", "email": "bob@example.com" }],
//!   "vouchers": [{ "id": "v-1", "student": "s-1", "credits": 5, "price": "40" }]
//! }
//! ```
//!
//! Documents whose id is already stored are left alone, so the same seed can be
//! applied to a persistent store on every run.

use crate::domain::ids::{UserId, VoucherId};
use crate::domain::ports::Stores;
use crate::domain::user::{Student, Teacher, User};
use crate::domain::voucher::Voucher;
use crate::error::{EntityKind, Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct SeedVoucher {
    pub id: VoucherId,
    pub student: UserId,
    pub credits: u32,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub teachers: Vec<Teacher>,
    pub students: Vec<Student>,
    pub vouchers: Vec<SeedVoucher>,
}

/// Counts of documents actually written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub vouchers: usize,
}

impl Seed {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub async fn apply(self, stores: &Stores) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        let users = self
            .teachers
            .into_iter()
            .map(User::from)
            .chain(self.students.into_iter().map(User::from));
        for user in users {
            if stores.users.get(user.id()).await?.is_some() {
                debug!(user_id = %user.id(), "user already stored, skipping");
                continue;
            }
            stores.users.save(user).await?;
            summary.users += 1;
        }

        for seed in self.vouchers {
            if stores.vouchers.get(&seed.id).await?.is_some() {
                debug!(voucher_id = %seed.id, "voucher already stored, skipping");
                continue;
            }
            if stores.users.get_student(&seed.student).await?.is_none() {
                return Err(Error::not_found(EntityKind::Student, &seed.student));
            }
            let mut voucher = Voucher::new(seed.student, seed.credits, seed.price);
            voucher.id = seed.id;
            voucher.expires_at = seed.expires_at;
            stores.vouchers.save(voucher).await?;
            summary.vouchers += 1;
        }

        info!(users = summary.users, vouchers = summary.vouchers, "seed applied");
        Ok(summary)
    }
}
