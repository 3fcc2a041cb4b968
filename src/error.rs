use crate::domain::ids::{ClassId, UserId};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Kinds of stored documents, used to name the missing or conflicting entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Teacher,
    Student,
    User,
    Class,
    Voucher,
    Enrollment,
}

impl EntityKind {
    /// Name of the collection (or column family) holding documents of this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Teacher | EntityKind::Student | EntityKind::User => "users",
            EntityKind::Class => "classes",
            EntityKind::Voucher => "vouchers",
            EntityKind::Enrollment => "enrollments",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::User => "user",
            EntityKind::Class => "class",
            EntityKind::Voucher => "voucher",
            EntityKind::Enrollment => "enrollment",
        };
        f.write_str(name)
    }
}

/// Malformed input: the caller has to change the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid duration: {0} minutes (expected 1..=480)")]
    InvalidDuration(u32),
    #[error("invalid price: {0} (expected 0..=999)")]
    InvalidPrice(Decimal),
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),
    #[error("search term must have at least 2 characters")]
    InvalidSearchTerm,
    #[error("invalid price range: {min}..{max}")]
    InvalidPriceRange { min: Decimal, max: Decimal },
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Business-rule violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Conflict {
    #[error("teacher already teaches class {class} in this time window")]
    ScheduleConflict { class: ClassId },
    #[error("class still has {0} enrolled student(s)")]
    ClassHasEnrollments(usize),
    #[error("student {student} is already enrolled in class {class}")]
    DuplicateEnrollment { student: UserId, class: ClassId },
    #[error("class {0} is full")]
    ClassFull(ClassId),
    #[error("student {0} has no voucher credit left")]
    InsufficientVoucher(UserId),
    #[error("class {0} does not accept vouchers")]
    VoucherNotAccepted(ClassId),
    #[error("voucher does not belong to student {0}")]
    VoucherNotOwned(UserId),
    #[error("class {0} has already started")]
    ClassStarted(ClassId),
    #[error("class id {0} is already in use")]
    ClassIdTaken(ClassId),
    #[error("{kind} {id} kept changing concurrently, giving up")]
    Contention { kind: EntityKind, id: String },
}

/// Failures reported by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} was modified concurrently")]
    Stale { kind: EntityKind, id: String },
    #[error("{kind} {id} already exists")]
    Duplicate { kind: EntityKind, id: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

/// Coarse classification of failures, as surfaced to request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Conflict,
    ConsistencyGap,
    Storage,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error("inconsistent state left behind: {0}")]
    ConsistencyGap(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Validation(_) | Error::Csv(_) | Error::Json(_) => ErrorCategory::Validation,
            Error::Conflict(_) => ErrorCategory::Conflict,
            Error::ConsistencyGap(_) => ErrorCategory::ConsistencyGap,
            Error::Store(_) | Error::Io(_) => ErrorCategory::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
