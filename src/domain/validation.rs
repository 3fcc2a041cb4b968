//! Stateless business rules for scheduling and enrollment.
//!
//! Nothing in here touches storage: callers load the entities and pass them in.

use super::class::{Class, Price};
use super::ids::UserId;
use super::schedule::{StartDate, TimeWindow};
use super::user::Student;
use crate::error::{Conflict, ValidationError};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::fmt;

pub const MAX_DAYS_AHEAD: i64 = 60;
pub const MAX_DURATION_MINUTES: u32 = 480;
pub const MAX_STUDENTS_LIMIT: u32 = 100;
pub const MIN_SEARCH_TERM_LEN: usize = 2;

/// Normalizes `start_date` to UTC and checks it falls in `(now, now + 60 days]`.
pub fn normalize_and_validate_start_date(
    start_date: StartDate,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    let start = start_date.to_utc();
    if start <= now {
        return Err(ValidationError::InvalidSchedule(
            "the class start date must be in the future".into(),
        ));
    }
    if start > now + Duration::days(MAX_DAYS_AHEAD) {
        return Err(ValidationError::InvalidSchedule(format!(
            "the class start date cannot be more than {MAX_DAYS_AHEAD} days ahead"
        )));
    }
    Ok(start)
}

pub fn validate_duration(minutes: u32) -> Result<(), ValidationError> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(ValidationError::InvalidDuration(minutes));
    }
    Ok(())
}

pub fn validate_price(price: Decimal) -> Result<Price, ValidationError> {
    Price::new(price)
}

pub fn validate_max_students(max: Option<u32>) -> Result<(), ValidationError> {
    match max {
        Some(0) => Err(ValidationError::InvalidCapacity(
            "the maximum number of students must be greater than zero".into(),
        )),
        Some(max) if max > MAX_STUDENTS_LIMIT => Err(ValidationError::InvalidCapacity(format!(
            "the maximum number of students cannot exceed {MAX_STUDENTS_LIMIT}"
        ))),
        _ => Ok(()),
    }
}

/// Fails if any of `teacher`'s classes in `existing` overlaps `candidate`.
///
/// `existing` may be a loose superset (other teachers, non-overlapping classes);
/// only exact overlaps of the same teacher count.
pub fn validate_teacher_availability(
    candidate: &TimeWindow,
    existing: &[Class],
    teacher: &UserId,
) -> Result<(), Conflict> {
    match existing
        .iter()
        .find(|class| &class.teacher == teacher && class.window().overlaps(candidate))
    {
        Some(clash) => Err(Conflict::ScheduleConflict {
            class: clash.id.clone(),
        }),
        None => Ok(()),
    }
}

pub fn has_available_spots(class: &Class) -> bool {
    class.remaining_spots().is_none_or(|left| left > 0)
}

/// Why a student cannot currently enroll in a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentBlocker {
    ClassMissing,
    StudentMissing,
    AlreadyStarted,
    Full,
    AlreadyEnrolled,
}

impl fmt::Display for EnrollmentBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EnrollmentBlocker::ClassMissing => "the class does not exist",
            EnrollmentBlocker::StudentMissing => "the student does not exist",
            EnrollmentBlocker::AlreadyStarted => "the class has already started",
            EnrollmentBlocker::Full => "the class is full",
            EnrollmentBlocker::AlreadyEnrolled => "the student is already enrolled in this class",
        };
        f.write_str(reason)
    }
}

/// Checks, in order: class exists, student exists, class not started, a seat
/// is free, student not already enrolled. The first failing check is reported.
pub fn validate_class_enrollment(
    class: Option<&Class>,
    student: Option<&Student>,
    now: DateTime<Utc>,
) -> Result<(), EnrollmentBlocker> {
    let class = class.ok_or(EnrollmentBlocker::ClassMissing)?;
    let student = student.ok_or(EnrollmentBlocker::StudentMissing)?;
    if class.has_started(now) {
        return Err(EnrollmentBlocker::AlreadyStarted);
    }
    if !has_available_spots(class) {
        return Err(EnrollmentBlocker::Full);
    }
    if class.is_enrolled(student.id()) {
        return Err(EnrollmentBlocker::AlreadyEnrolled);
    }
    Ok(())
}

/// A class with any enrolled student cannot be deleted.
pub fn validate_not_enrolled_for_deletion(class: &Class) -> Result<(), Conflict> {
    match class.enrolled_count() {
        0 => Ok(()),
        n => Err(Conflict::ClassHasEnrollments(n)),
    }
}

/// Returns the trimmed term.
pub fn validate_search_term(term: &str) -> Result<&str, ValidationError> {
    let trimmed = term.trim();
    if trimmed.chars().count() < MIN_SEARCH_TERM_LEN {
        return Err(ValidationError::InvalidSearchTerm);
    }
    Ok(trimmed)
}

pub fn validate_price_range(min: Decimal, max: Decimal) -> Result<(), ValidationError> {
    if min < Decimal::ZERO || max < Decimal::ZERO || min > max {
        return Err(ValidationError::InvalidPriceRange { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ClassId;
    use crate::domain::user::UserRecord;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
    }

    fn class_at(id: &str, teacher: &str, start: DateTime<Utc>, minutes: u32) -> Class {
        Class {
            id: ClassId::from(id),
            title: format!("class {id}"),
            description: None,
            teacher: UserId::from(teacher),
            price: Price::new(dec!(10)).unwrap(),
            allow_voucher: true,
            max_students: Some(1),
            start_date: start,
            duration_minutes: minutes,
            created_at: now(),
            enrolled_students: Vec::new(),
            revision: 0,
        }
    }

    fn student(id: &str) -> Student {
        Student::new(UserRecord::new(UserId::from(id), id, format!("{id}@example.com")))
    }

    #[test]
    fn test_start_date_window() {
        let now = now();
        assert!(normalize_and_validate_start_date((now + Duration::days(10)).into(), now).is_ok());
        assert!(normalize_and_validate_start_date((now + Duration::days(60)).into(), now).is_ok());
        assert!(matches!(
            normalize_and_validate_start_date((now - Duration::days(1)).into(), now),
            Err(ValidationError::InvalidSchedule(_))
        ));
        assert!(normalize_and_validate_start_date(now.into(), now).is_err());
        assert!(
            normalize_and_validate_start_date(
                (now + Duration::days(60) + Duration::seconds(1)).into(),
                now
            )
            .is_err()
        );
    }

    #[test]
    fn test_naive_start_date_treated_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2030, 1, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let start = normalize_and_validate_start_date(StartDate::Naive(naive), now()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2030, 1, 5, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_duration_bounds() {
        assert_eq!(validate_duration(0), Err(ValidationError::InvalidDuration(0)));
        assert!(validate_duration(1).is_ok());
        assert!(validate_duration(480).is_ok());
        assert_eq!(validate_duration(481), Err(ValidationError::InvalidDuration(481)));
    }

    #[test]
    fn test_price_bounds() {
        assert!(validate_price(dec!(0)).is_ok());
        assert!(validate_price(dec!(999)).is_ok());
        assert!(validate_price(dec!(1000)).is_err());
        assert!(validate_price(dec!(-1)).is_err());
    }

    #[test]
    fn test_max_students_bounds() {
        assert!(validate_max_students(None).is_ok());
        assert!(validate_max_students(Some(1)).is_ok());
        assert!(validate_max_students(Some(100)).is_ok());
        assert!(matches!(
            validate_max_students(Some(0)),
            Err(ValidationError::InvalidCapacity(_))
        ));
        assert!(validate_max_students(Some(101)).is_err());
    }

    #[test]
    fn test_availability_ignores_back_to_back_and_other_teachers() {
        let ten = Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap();
        let existing = vec![
            class_at("c-1", "t-1", ten, 60),
            class_at("c-2", "t-2", ten + Duration::hours(1), 60),
        ];
        let teacher = UserId::from("t-1");

        let back_to_back = TimeWindow::new(ten + Duration::hours(1), 60);
        assert!(validate_teacher_availability(&back_to_back, &existing, &teacher).is_ok());

        let overlapping = TimeWindow::new(ten + Duration::minutes(30), 60);
        assert_eq!(
            validate_teacher_availability(&overlapping, &existing, &teacher),
            Err(Conflict::ScheduleConflict {
                class: ClassId::from("c-1")
            })
        );

        let before = TimeWindow::new(ten - Duration::hours(1), 60);
        assert!(validate_teacher_availability(&before, &existing, &teacher).is_ok());
    }

    #[test]
    fn test_enrollment_checks_in_order() {
        let now = now();
        let mut class = class_at("c-1", "t-1", now + Duration::days(1), 60);
        let s1 = student("s-1");
        let s2 = student("s-2");

        assert_eq!(
            validate_class_enrollment(None, None, now),
            Err(EnrollmentBlocker::ClassMissing)
        );
        assert_eq!(
            validate_class_enrollment(Some(&class), None, now),
            Err(EnrollmentBlocker::StudentMissing)
        );
        assert!(validate_class_enrollment(Some(&class), Some(&s1), now).is_ok());

        class.add_student(s1.id());
        // Full takes precedence over already-enrolled.
        assert_eq!(
            validate_class_enrollment(Some(&class), Some(&s1), now),
            Err(EnrollmentBlocker::Full)
        );
        assert_eq!(
            validate_class_enrollment(Some(&class), Some(&s2), now),
            Err(EnrollmentBlocker::Full)
        );

        class.max_students = None;
        assert_eq!(
            validate_class_enrollment(Some(&class), Some(&s1), now),
            Err(EnrollmentBlocker::AlreadyEnrolled)
        );

        let later = class.start_date;
        assert_eq!(
            validate_class_enrollment(Some(&class), Some(&s2), later),
            Err(EnrollmentBlocker::AlreadyStarted)
        );
    }

    #[test]
    fn test_deletion_requires_empty_class() {
        let mut class = class_at("c-1", "t-1", now(), 60);
        assert!(validate_not_enrolled_for_deletion(&class).is_ok());
        class.add_student(&UserId::from("s-1"));
        assert_eq!(
            validate_not_enrolled_for_deletion(&class),
            Err(Conflict::ClassHasEnrollments(1))
        );
    }

    #[test]
    fn test_search_term() {
        assert_eq!(validate_search_term("  ru  "), Ok("ru"));
        assert_eq!(validate_search_term(" r "), Err(ValidationError::InvalidSearchTerm));
        assert_eq!(validate_search_term(""), Err(ValidationError::InvalidSearchTerm));
    }

    #[test]
    fn test_price_range() {
        assert!(validate_price_range(dec!(0), dec!(0)).is_ok());
        assert!(validate_price_range(dec!(5), dec!(50)).is_ok());
        assert!(validate_price_range(dec!(-1), dec!(50)).is_err());
        assert!(validate_price_range(dec!(50), dec!(5)).is_err());
    }
}
