use crate::application::enrollment::EnrollmentRequest;
use crate::application::scheduling::CreateClassRequest;
use crate::application::service::Command;
use crate::domain::enrollment::PaymentType;
use crate::domain::ids::{ClassId, UserId, VoucherId};
use crate::domain::schedule::StartDate;
use crate::error::{Error, Result, ValidationError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateClass,
    DeleteClass,
    Enroll,
    Unenroll,
}

/// One row of an operations file. Columns an operation does not use may be
/// empty or missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationRecord {
    pub op: OperationKind,
    #[serde(default)]
    pub student: Option<UserId>,
    #[serde(default)]
    pub teacher: Option<UserId>,
    #[serde(default)]
    pub class: Option<ClassId>,
    #[serde(default)]
    pub payment: Option<PaymentType>,
    #[serde(default)]
    pub voucher: Option<VoucherId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub start: Option<StartDate>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub max_students: Option<u32>,
    /// Blank means vouchers are accepted.
    #[serde(default)]
    pub allow_voucher: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(Error::Validation(ValidationError::MissingField(field)))
}

impl TryFrom<OperationRecord> for Command {
    type Error = Error;

    fn try_from(row: OperationRecord) -> Result<Self> {
        let command = match row.op {
            OperationKind::CreateClass => Command::CreateClass(CreateClassRequest {
                class_id: row.class,
                teacher_id: required(row.teacher, "teacher")?,
                title: required(row.title, "title")?,
                description: row.description,
                price: required(row.price, "price")?,
                allow_voucher: row.allow_voucher.unwrap_or(true),
                max_students: row.max_students,
                start_date: required(row.start, "start")?,
                duration_minutes: required(row.duration, "duration")?,
            }),
            OperationKind::DeleteClass => Command::DeleteClass(required(row.class, "class")?),
            OperationKind::Enroll => Command::Enroll(EnrollmentRequest {
                student_id: required(row.student, "student")?,
                class_id: required(row.class, "class")?,
                payment_type: row.payment.unwrap_or(PaymentType::Direct),
                voucher_id: row.voucher,
            }),
            OperationKind::Unenroll => Command::Unenroll {
                student: required(row.student, "student")?,
                class: required(row.class, "class")?,
            },
        };
        Ok(command)
    }
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding one `Result<OperationRecord>` per row.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, so large files are streamed.
    pub fn operations(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op, student, teacher, class, payment, voucher, title, price, start, \
                          duration, max_students, allow_voucher, description";

    fn read(rows: &str) -> Vec<Result<OperationRecord>> {
        let data = format!("{HEADER}\n{rows}");
        OperationReader::new(data.as_bytes()).operations().collect()
    }

    #[test]
    fn test_reader_valid_stream() {
        let results = read(
            "create_class, , t-1, yoga, , , Morning Yoga, 12.5, 2030-01-02T10:00:00Z, 60, 10\n\
             enroll, s-1, , yoga, voucher, , , , , ,\n\
             unenroll, s-1, , yoga",
        );
        assert_eq!(results.len(), 3);

        let create = results[0].as_ref().unwrap();
        assert_eq!(create.op, OperationKind::CreateClass);
        assert_eq!(create.price, Some(dec!(12.5)));
        assert_eq!(create.max_students, Some(10));
        assert_eq!(create.student, None);

        let enroll = results[1].as_ref().unwrap();
        assert_eq!(enroll.payment, Some(PaymentType::Voucher));
        assert_eq!(enroll.voucher, None);

        assert_eq!(results[2].as_ref().unwrap().op, OperationKind::Unenroll);
    }

    #[test]
    fn test_reader_malformed_line() {
        let results = read("teleport, s-1, , yoga\nenroll, s-1, , yoga, cash");
        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_rows_become_commands() {
        let mut rows = read(
            "create_class, , t-1, , , , Pottery, 30, 2030-01-02 10:00:00, 90,\n\
             enroll, s-1, , c-1\n\
             delete_class",
        )
        .into_iter()
        .map(|r| r.unwrap());

        match Command::try_from(rows.next().unwrap()).unwrap() {
            Command::CreateClass(request) => {
                assert_eq!(request.class_id, None);
                assert_eq!(request.max_students, None);
                assert_eq!(request.duration_minutes, 90);
                assert!(request.allow_voucher);
                assert_eq!(request.description, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match Command::try_from(rows.next().unwrap()).unwrap() {
            Command::Enroll(request) => assert_eq!(request.payment_type, PaymentType::Direct),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(matches!(
            Command::try_from(rows.next().unwrap()),
            Err(Error::Validation(ValidationError::MissingField("class")))
        ));
    }

    #[test]
    fn test_class_options_from_trailing_columns() {
        let mut rows = read(
            "create_class, , t-1, wheel, , , Wheel, 30, 2030-01-02T10:00:00Z, 60, 4, false, Bring an apron\n\
             create_class, , t-1, glaze, , , Glaze, 30, 2030-01-03T10:00:00Z, 60, 4, true,",
        )
        .into_iter()
        .map(|r| r.unwrap());

        match Command::try_from(rows.next().unwrap()).unwrap() {
            Command::CreateClass(request) => {
                assert!(!request.allow_voucher);
                assert_eq!(request.description.as_deref(), Some("Bring an apron"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        match Command::try_from(rows.next().unwrap()).unwrap() {
            Command::CreateClass(request) => {
                assert!(request.allow_voucher);
                assert_eq!(request.description, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
