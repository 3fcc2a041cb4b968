use crate::domain::class::Class;
use crate::domain::ids::{ClassId, UserId};
use crate::domain::ports::{ClassQuery, ClockRef, Stores};
use crate::domain::validation::{
    EnrollmentBlocker, has_available_spots, validate_class_enrollment, validate_price_range,
    validate_search_term,
};
use crate::error::Result;
use chrono::{DateTime, Days, Utc};
use rust_decimal::Decimal;

/// Whether a student may enroll, and if not, why.
pub type Eligibility = std::result::Result<(), EnrollmentBlocker>;

/// Read-only views over the class collection.
pub struct ClassCatalog {
    stores: Stores,
    clock: ClockRef,
}

impl ClassCatalog {
    pub fn new(stores: Stores, clock: ClockRef) -> Self {
        Self { stores, clock }
    }

    pub async fn get_class(&self, id: &ClassId) -> Result<Option<Class>> {
        Ok(self.stores.classes.get(id).await?)
    }

    /// All classes, ordered by start date.
    pub async fn list_classes(&self) -> Result<Vec<Class>> {
        self.find(ClassQuery::default()).await
    }

    /// Classes that have not started yet and still have a free seat.
    pub async fn list_available_classes(&self, now: DateTime<Utc>) -> Result<Vec<Class>> {
        let classes = self
            .find(ClassQuery {
                starts_from: Some(now),
                ..Default::default()
            })
            .await?;
        Ok(classes
            .into_iter()
            .filter(|c| c.start_date > now && has_available_spots(c))
            .collect())
    }

    /// Classes starting from now through the end of the day `days_ahead` days out.
    ///
    /// A horizon past the last representable date leaves the range open-ended.
    pub async fn upcoming_classes(&self, days_ahead: u32) -> Result<Vec<Class>> {
        let now = self.clock.now();
        let horizon = now
            .date_naive()
            .checked_add_days(Days::new(u64::from(days_ahead) + 1))
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc());
        self.find(ClassQuery {
            starts_from: Some(now),
            starts_before: horizon,
            ..Default::default()
        })
        .await
    }

    pub async fn search_by_title(&self, term: &str) -> Result<Vec<Class>> {
        let term = validate_search_term(term)?;
        self.find(ClassQuery {
            title_contains: Some(term.to_owned()),
            ..Default::default()
        })
        .await
    }

    /// Both bounds inclusive.
    pub async fn classes_in_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<Class>> {
        validate_price_range(min, max)?;
        self.find(ClassQuery {
            min_price: Some(min),
            max_price: Some(max),
            ..Default::default()
        })
        .await
    }

    /// Empty when the teacher is unknown.
    pub async fn classes_by_teacher(&self, teacher: &UserId) -> Result<Vec<Class>> {
        self.find(ClassQuery {
            teacher: Some(teacher.clone()),
            ..Default::default()
        })
        .await
    }

    /// Zero for an unknown class.
    pub async fn enrollment_count(&self, id: &ClassId) -> Result<usize> {
        Ok(self
            .get_class(id)
            .await?
            .map_or(0, |class| class.enrolled_count()))
    }

    /// An unknown class counts as full.
    pub async fn is_class_full(&self, id: &ClassId) -> Result<bool> {
        Ok(self
            .get_class(id)
            .await?
            .is_none_or(|class| !has_available_spots(&class)))
    }

    pub async fn can_enroll(&self, class_id: &ClassId, student_id: &UserId) -> Result<Eligibility> {
        let class = self.get_class(class_id).await?;
        let student = self.stores.users.get_student(student_id).await?;
        Ok(validate_class_enrollment(
            class.as_ref(),
            student.as_ref(),
            self.clock.now(),
        ))
    }

    async fn find(&self, query: ClassQuery) -> Result<Vec<Class>> {
        Ok(self.stores.classes.find(&query).await?)
    }
}
