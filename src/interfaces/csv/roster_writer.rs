use crate::domain::class::Class;
use crate::error::Result;
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct RosterRow<'a> {
    class: &'a str,
    title: &'a str,
    teacher: &'a str,
    start: String,
    enrolled: usize,
    /// Empty when the class has no cap.
    capacity: Option<u32>,
}

impl<'a> From<&'a Class> for RosterRow<'a> {
    fn from(class: &'a Class) -> Self {
        Self {
            class: class.id.as_str(),
            title: &class.title,
            teacher: class.teacher.as_str(),
            start: class.start_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            enrolled: class.enrolled_count(),
            capacity: class.max_students,
        }
    }
}

/// Writes one summary line per class.
pub struct RosterWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RosterWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_roster<'a, I>(&mut self, classes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Class>,
    {
        let mut wrote_any = false;
        for class in classes {
            self.writer.serialize(RosterRow::from(class))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer
                .write_record(["class", "title", "teacher", "start", "enrolled", "capacity"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::class::Price;
    use crate::domain::ids::{ClassId, UserId};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn class(id: &str, max_students: Option<u32>) -> Class {
        Class {
            id: ClassId::from(id),
            title: "Jazz, intro".into(),
            description: None,
            teacher: UserId::from("t-1"),
            price: Price::new(dec!(20)).unwrap(),
            allow_voucher: true,
            max_students,
            start_date: Utc.with_ymd_and_hms(2030, 1, 2, 10, 0, 0).unwrap(),
            duration_minutes: 60,
            created_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            enrolled_students: vec![UserId::from("s-1")],
            revision: 0,
        }
    }

    fn render(classes: &[Class]) -> String {
        let mut out = Vec::new();
        RosterWriter::new(&mut out).write_roster(classes).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_roster_rows() {
        let out = render(&[class("c-1", Some(4)), class("c-2", None)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "class,title,teacher,start,enrolled,capacity");
        assert_eq!(lines[1], "c-1,\"Jazz, intro\",t-1,2030-01-02T10:00:00Z,1,4");
        assert_eq!(lines[2], "c-2,\"Jazz, intro\",t-1,2030-01-02T10:00:00Z,1,");
    }

    #[test]
    fn test_empty_roster_still_has_header() {
        assert_eq!(render(&[]), "class,title,teacher,start,enrolled,capacity\n");
    }
}
