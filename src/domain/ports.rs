use super::class::Class;
use super::enrollment::{Enrollment, PaymentType};
use super::ids::{ClassId, EnrollmentId, UserId, VoucherId};
use super::user::{Student, Teacher, User};
use super::voucher::Voucher;
use crate::error::{EntityKind, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// A stored entity with an identity and an optimistic-concurrency revision.
///
/// Stores only accept an `update` whose `revision` matches the stored one, and
/// bump it on success.
pub trait Document: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Display + Send + Sync;
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;
    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
}

impl Document for User {
    type Id = UserId;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &UserId {
        User::id(self)
    }
    fn revision(&self) -> u64 {
        self.record().revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.record_mut().revision = revision;
    }
}

impl Document for Class {
    type Id = ClassId;
    const KIND: EntityKind = EntityKind::Class;

    fn id(&self) -> &ClassId {
        &self.id
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

impl Document for Voucher {
    type Id = VoucherId;
    const KIND: EntityKind = EntityKind::Voucher;

    fn id(&self) -> &VoucherId {
        &self.id
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

impl Document for Enrollment {
    type Id = EnrollmentId;
    const KIND: EntityKind = EntityKind::Enrollment;

    fn id(&self) -> &EnrollmentId {
        &self.id
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

/// Predicate for class lookups. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassQuery {
    pub teacher: Option<UserId>,
    /// Inclusive lower bound on `start_date`.
    pub starts_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `start_date`.
    pub starts_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the title.
    pub title_contains: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl ClassQuery {
    pub fn matches(&self, class: &Class) -> bool {
        self.teacher.as_ref().is_none_or(|t| &class.teacher == t)
            && self.starts_from.is_none_or(|from| class.start_date >= from)
            && self.starts_before.is_none_or(|to| class.start_date < to)
            && self.title_contains.as_ref().is_none_or(|needle| {
                class
                    .title
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            })
            && self.min_price.is_none_or(|min| class.price.value() >= min)
            && self.max_price.is_none_or(|max| class.price.value() <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentQuery {
    pub student: Option<UserId>,
    pub class: Option<ClassId>,
    pub payment_type: Option<PaymentType>,
}

impl EnrollmentQuery {
    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.student.as_ref().is_none_or(|s| &enrollment.student == s)
            && self.class.as_ref().is_none_or(|c| &enrollment.class == c)
            && self.payment_type.is_none_or(|p| enrollment.payment_type == p)
    }
}

/// Teachers and students, stored in one collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Upsert, ignoring revisions.
    async fn save(&self, user: User) -> StoreResult<User>;
    async fn get(&self, id: &UserId) -> StoreResult<Option<User>>;
    /// Compare-and-swap on `revision`.
    async fn update(&self, user: User) -> StoreResult<User>;

    async fn get_teacher(&self, id: &UserId) -> StoreResult<Option<Teacher>> {
        Ok(self.get(id).await?.and_then(User::into_teacher))
    }

    async fn get_student(&self, id: &UserId) -> StoreResult<Option<Student>> {
        Ok(self.get(id).await?.and_then(User::into_student))
    }
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` if the id is taken.
    async fn insert(&self, class: Class) -> StoreResult<Class>;
    async fn save(&self, class: Class) -> StoreResult<Class>;
    async fn get(&self, id: &ClassId) -> StoreResult<Option<Class>>;
    async fn update(&self, class: Class) -> StoreResult<Class>;
    async fn delete(&self, id: &ClassId) -> StoreResult<bool>;
    /// Deletes `class` only if the stored revision still matches; `Stale` otherwise.
    async fn delete_unchanged(&self, class: &Class) -> StoreResult<()>;
    async fn find(&self, query: &ClassQuery) -> StoreResult<Vec<Class>>;
}

#[async_trait]
pub trait VoucherStore: Send + Sync {
    async fn save(&self, voucher: Voucher) -> StoreResult<Voucher>;
    async fn get(&self, id: &VoucherId) -> StoreResult<Option<Voucher>>;
    async fn update(&self, voucher: Voucher) -> StoreResult<Voucher>;
    async fn find_by_student(&self, student: &UserId) -> StoreResult<Vec<Voucher>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` if the id is taken or the
    /// (student, class) pair already has an enrollment.
    async fn insert(&self, enrollment: Enrollment) -> StoreResult<Enrollment>;
    async fn get(&self, id: &EnrollmentId) -> StoreResult<Option<Enrollment>>;
    async fn find_for(
        &self,
        student: &UserId,
        class: &ClassId,
    ) -> StoreResult<Option<Enrollment>>;
    async fn find(&self, query: &EnrollmentQuery) -> StoreResult<Vec<Enrollment>>;
    async fn delete(&self, id: &EnrollmentId) -> StoreResult<bool>;
}

pub type UserStoreRef = Arc<dyn UserStore>;
pub type ClassStoreRef = Arc<dyn ClassStore>;
pub type VoucherStoreRef = Arc<dyn VoucherStore>;
pub type EnrollmentStoreRef = Arc<dyn EnrollmentStore>;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockRef = Arc<dyn Clock>;

/// The set of collaborators shared by the engines.
#[derive(Clone)]
pub struct Stores {
    pub users: UserStoreRef,
    pub classes: ClassStoreRef,
    pub vouchers: VoucherStoreRef,
    pub enrollments: EnrollmentStoreRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::class::Price;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn class(title: &str, price: Decimal, day: u32) -> Class {
        Class {
            id: ClassId::new(),
            title: title.into(),
            description: None,
            teacher: UserId::from("t-1"),
            price: Price::new(price).unwrap(),
            allow_voucher: true,
            max_students: None,
            start_date: Utc.with_ymd_and_hms(2030, 1, day, 10, 0, 0).unwrap(),
            duration_minutes: 60,
            created_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            enrolled_students: Vec::new(),
            revision: 0,
        }
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(ClassQuery::default().matches(&class("Yoga", dec!(10), 5)));
    }

    #[test]
    fn test_query_bounds() {
        let yoga = class("Morning Yoga", dec!(10), 5);
        let query = ClassQuery {
            title_contains: Some("yoGA".into()),
            min_price: Some(dec!(10)),
            max_price: Some(dec!(10)),
            starts_from: Some(yoga.start_date),
            starts_before: Some(yoga.start_date + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(query.matches(&yoga));

        let exclusive_end = ClassQuery {
            starts_before: Some(yoga.start_date),
            ..Default::default()
        };
        assert!(!exclusive_end.matches(&yoga));

        let other_teacher = ClassQuery {
            teacher: Some(UserId::from("t-2")),
            ..Default::default()
        };
        assert!(!other_teacher.matches(&yoga));
    }
}
