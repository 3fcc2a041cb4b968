use super::ids::{ClassId, EnrollmentId, UserId, VoucherId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Direct,
    Voucher,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Direct => f.write_str("direct"),
            PaymentType::Voucher => f.write_str("voucher"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(PaymentType::Direct),
            "voucher" => Ok(PaymentType::Voucher),
            other => Err(format!("unknown payment type '{other}'")),
        }
    }
}

/// Binds one student to one class. Immutable once created.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: UserId,
    pub class: ClassId,
    pub payment_type: PaymentType,
    /// Set only for voucher-paid enrollments.
    pub voucher: Option<VoucherId>,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

impl Enrollment {
    pub fn new(
        student: UserId,
        class: ClassId,
        payment_type: PaymentType,
        voucher: Option<VoucherId>,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new(),
            student,
            class,
            payment_type,
            voucher,
            enrolled_at,
            revision: 0,
        }
    }

    pub fn is_for(&self, student: &UserId, class: &ClassId) -> bool {
        &self.student == student && &self.class == class
    }
}
