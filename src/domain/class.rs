use super::ids::{ClassId, UserId};
use super::schedule::TimeWindow;
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Price of a single class, always within `0..=999`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const MAX: Decimal = dec!(999);

    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value < Decimal::ZERO || value > Self::MAX {
            return Err(ValidationError::InvalidPrice(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Class {
    pub id: ClassId,
    pub title: String,
    pub description: Option<String>,
    pub teacher: UserId,
    pub price: Price,
    pub allow_voucher: bool,
    pub max_students: Option<u32>,
    /// Always stored in UTC.
    pub start_date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub enrolled_students: Vec<UserId>,
    #[serde(default)]
    pub revision: u64,
}

impl Class {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_date, self.duration_minutes)
    }

    pub fn enrolled_count(&self) -> usize {
        self.enrolled_students.len()
    }

    pub fn is_enrolled(&self, student: &UserId) -> bool {
        self.enrolled_students.contains(student)
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now
    }

    /// Seats left, or `None` when the class has no capacity limit.
    pub fn remaining_spots(&self) -> Option<usize> {
        self.max_students
            .map(|max| (max as usize).saturating_sub(self.enrolled_count()))
    }

    pub fn add_student(&mut self, student: &UserId) -> bool {
        if self.is_enrolled(student) {
            return false;
        }
        self.enrolled_students.push(student.clone());
        true
    }

    pub fn remove_student(&mut self, student: &UserId) -> bool {
        let before = self.enrolled_students.len();
        self.enrolled_students.retain(|s| s != student);
        before != self.enrolled_students.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_class() -> Class {
        Class {
            id: ClassId::from("c-1"),
            title: "Rust basics".into(),
            description: None,
            teacher: UserId::from("t-1"),
            price: Price::new(dec!(20)).unwrap(),
            allow_voucher: true,
            max_students: Some(2),
            start_date: Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap(),
            duration_minutes: 60,
            created_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            enrolled_students: Vec::new(),
            revision: 0,
        }
    }

    #[test]
    fn test_price_bounds() {
        assert!(Price::new(dec!(0)).is_ok());
        assert!(Price::new(dec!(999)).is_ok());
        assert_eq!(
            Price::new(dec!(999.01)),
            Err(ValidationError::InvalidPrice(dec!(999.01)))
        );
        assert!(Price::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_price_rejected_on_deserialize() {
        assert!(serde_json::from_str::<Price>("\"1000\"").is_err());
        let price: Price = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(price.value(), dec!(12.50));
    }

    #[test]
    fn test_remaining_spots() {
        let mut class = sample_class();
        assert_eq!(class.remaining_spots(), Some(2));
        assert!(class.add_student(&UserId::from("s-1")));
        assert!(!class.add_student(&UserId::from("s-1")));
        assert_eq!(class.remaining_spots(), Some(1));

        class.max_students = None;
        assert_eq!(class.remaining_spots(), None);
    }

    #[test]
    fn test_window_end() {
        let class = sample_class();
        let window = class.window();
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2030, 1, 10, 11, 0, 0).unwrap()
        );
    }
}
