#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use classroll::application::scheduling::CreateClassRequest;
use classroll::application::service::Classroom;
use classroll::config::EngineConfig;
use classroll::domain::ids::{ClassId, UserId, VoucherId};
use classroll::domain::ports::Stores;
use classroll::domain::user::{Student, Teacher, UserRecord};
use classroll::domain::voucher::Voucher;
use classroll::infrastructure::clock::FixedClock;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// The instant every fixture clock is pinned to.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap()
}

pub struct Platform {
    pub classroom: Arc<Classroom>,
    pub stores: Stores,
    pub clock: FixedClock,
}

pub fn platform_with(config: EngineConfig) -> Platform {
    let stores = Stores::in_memory();
    let clock = FixedClock::new(now());
    let classroom = Classroom::new(stores.clone(), Arc::new(clock.clone()), config);
    Platform {
        classroom: Arc::new(classroom),
        stores,
        clock,
    }
}

pub fn platform() -> Platform {
    platform_with(EngineConfig::default())
}

pub async fn add_teacher(stores: &Stores, id: &str) -> UserId {
    let record = UserRecord::new(UserId::from(id), id, format!("{id}@example.com"));
    let teacher = Teacher::new(record);
    stores.users.save(teacher.into()).await.unwrap();
    UserId::from(id)
}

pub async fn add_student(stores: &Stores, id: &str) -> UserId {
    let record = UserRecord::new(UserId::from(id), id, format!("{id}@example.com"));
    let student = Student::new(record);
    stores.users.save(student.into()).await.unwrap();
    UserId::from(id)
}

pub async fn give_voucher(stores: &Stores, student: &UserId, credits: u32) -> VoucherId {
    let voucher = Voucher::new(student.clone(), credits, dec!(50));
    let id = voucher.id.clone();
    stores.vouchers.save(voucher).await.unwrap();
    id
}

pub fn class_request(
    teacher: &UserId,
    start: DateTime<Utc>,
    minutes: u32,
    max_students: Option<u32>,
) -> CreateClassRequest {
    CreateClassRequest {
        class_id: None,
        teacher_id: teacher.clone(),
        title: "Wheel throwing".into(),
        description: None,
        price: dec!(35),
        allow_voucher: true,
        max_students,
        start_date: start.into(),
        duration_minutes: minutes,
    }
}

/// 10:00 UTC, `days` after the fixture clock.
pub fn at_ten(days: i64) -> DateTime<Utc> {
    now() + Duration::days(days) + Duration::hours(2)
}

pub async fn create_class(
    platform: &Platform,
    teacher: &UserId,
    start: DateTime<Utc>,
    max_students: Option<u32>,
) -> ClassId {
    platform
        .classroom
        .scheduler
        .create_class(class_request(teacher, start, 60, max_students))
        .await
        .unwrap()
        .id
}
