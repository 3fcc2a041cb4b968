use super::unit_of_work::{Outcome, modify};
use crate::config::EngineConfig;
use crate::domain::class::Class;
use crate::domain::ids::{ClassId, UserId};
use crate::domain::ports::{ClassQuery, ClockRef, Stores};
use crate::domain::schedule::{StartDate, TimeWindow};
use crate::domain::user::{Teacher, User};
use crate::domain::validation::{
    MAX_DURATION_MINUTES, normalize_and_validate_start_date, validate_duration,
    validate_max_students, validate_not_enrolled_for_deletion, validate_price,
    validate_teacher_availability,
};
use crate::error::{Conflict, EntityKind, Error, Result, StoreError, ValidationError};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

fn default_allow_voucher() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClassRequest {
    /// Caller-chosen id; a fresh one is generated when absent.
    #[serde(default)]
    pub class_id: Option<ClassId>,
    pub teacher_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_allow_voucher")]
    pub allow_voucher: bool,
    #[serde(default)]
    pub max_students: Option<u32>,
    pub start_date: StartDate,
    pub duration_minutes: u32,
}

/// Partial update of a class. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub allow_voucher: Option<bool>,
    pub max_students: Option<u32>,
    pub start_date: Option<StartDate>,
    pub duration_minutes: Option<u32>,
}

/// Validates and persists classes against their teacher's other commitments.
///
/// Every successful creation bumps the teacher document's revision, so two
/// racing creations for the same teacher are serialized on it: the loser
/// re-runs the availability check and sees the winner's class.
pub struct ClassScheduler {
    stores: Stores,
    clock: ClockRef,
    config: EngineConfig,
}

impl ClassScheduler {
    pub fn new(stores: Stores, clock: ClockRef, config: EngineConfig) -> Self {
        Self {
            stores,
            clock,
            config,
        }
    }

    pub async fn create_class(&self, request: CreateClassRequest) -> Result<Class> {
        let now = self.clock.now();
        self.load_teacher(&request.teacher_id).await?;

        let start_date = normalize_and_validate_start_date(request.start_date, now)?;
        validate_duration(request.duration_minutes)?;
        let price = validate_price(request.price)?;
        validate_max_students(request.max_students)?;

        let class = Class {
            id: request.class_id.unwrap_or_default(),
            title: request.title,
            description: request.description,
            teacher: request.teacher_id,
            price,
            allow_voucher: request.allow_voucher,
            max_students: request.max_students,
            start_date,
            duration_minutes: request.duration_minutes,
            created_at: now,
            enrolled_students: Vec::new(),
            revision: 0,
        };

        let mut inserted = false;
        match self.commit_new_class(&class, &mut inserted).await {
            Ok(()) => {
                info!(class_id = %class.id, teacher_id = %class.teacher, start = %class.start_date, "class created");
                Ok(class)
            }
            Err(err) if inserted => Err(self.discard_class(&class.id, err).await),
            Err(err) => {
                warn!(teacher_id = %class.teacher, error = %err, "class creation rejected");
                Err(err)
            }
        }
    }

    /// Availability check, class insert and teacher-list append as one unit.
    async fn commit_new_class(&self, class: &Class, inserted: &mut bool) -> Result<()> {
        let window = class.window();
        for attempt in 1..=self.config.max_write_attempts {
            let mut teacher = self.load_teacher(&class.teacher).await?;
            self.check_availability(&teacher, &window, Some(&class.id))
                .await?;

            if !*inserted {
                match self.stores.classes.insert(class.clone()).await {
                    Ok(_) => *inserted = true,
                    Err(StoreError::Duplicate { .. }) => {
                        return Err(Conflict::ClassIdTaken(class.id.clone()).into());
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            teacher.add_class(&class.id);
            match self.stores.users.update(User::Teacher(teacher)).await {
                Ok(_) => return Ok(()),
                Err(StoreError::Stale { .. }) => {
                    debug!(teacher_id = %class.teacher, attempt, "teacher changed concurrently, re-checking availability");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Conflict::Contention {
            kind: EntityKind::Teacher,
            id: class.teacher.to_string(),
        }
        .into())
    }

    /// Removes a half-created class, keeping `cause` as the reported error.
    async fn discard_class(&self, id: &ClassId, cause: Error) -> Error {
        match self.stores.classes.delete(id).await {
            Ok(_) => {
                warn!(class_id = %id, error = %cause, "class creation rolled back");
                cause
            }
            Err(e) => {
                error!(class_id = %id, error = %e, "failed to roll back class creation");
                Error::ConsistencyGap(format!(
                    "class {id} was left behind after a failed creation ({cause}): {e}"
                ))
            }
        }
    }

    async fn load_teacher(&self, id: &UserId) -> Result<Teacher> {
        self.stores
            .users
            .get_teacher(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Teacher, id))
    }

    /// Fails with `ScheduleConflict` if `teacher` already teaches during `window`.
    /// Only classes the teacher lists count as booked; a class another
    /// creation has inserted but not yet committed is ignored.
    async fn check_availability(
        &self,
        teacher: &Teacher,
        window: &TimeWindow,
        exclude: Option<&ClassId>,
    ) -> Result<()> {
        // Any overlapping class must start before the window ends and no
        // earlier than the longest possible class before it.
        let query = ClassQuery {
            teacher: Some(teacher.record.id.clone()),
            starts_from: Some(window.start - Duration::minutes(i64::from(MAX_DURATION_MINUTES))),
            starts_before: Some(window.end),
            ..Default::default()
        };
        let existing: Vec<Class> = self
            .stores
            .classes
            .find(&query)
            .await?
            .into_iter()
            .filter(|c| Some(&c.id) != exclude && teacher.created_classes.contains(&c.id))
            .collect();
        validate_teacher_availability(window, &existing, &teacher.record.id)?;
        Ok(())
    }

    pub async fn update_class(&self, id: &ClassId, update: ClassUpdate) -> Result<Class> {
        let now = self.clock.now();
        let start_date = update
            .start_date
            .map(|start| normalize_and_validate_start_date(start, now))
            .transpose()?;
        if let Some(minutes) = update.duration_minutes {
            validate_duration(minutes)?;
        }
        let price = update.price.map(validate_price).transpose()?;
        validate_max_students(update.max_students)?;

        let reschedules = start_date.is_some() || update.duration_minutes.is_some();
        for attempt in 1..=self.config.max_write_attempts {
            let mut class = self
                .stores
                .classes
                .get(id)
                .await?
                .ok_or_else(|| Error::not_found(EntityKind::Class, id))?;

            if let Some(max) = update.max_students
                && (max as usize) < class.enrolled_count()
            {
                return Err(ValidationError::InvalidCapacity(format!(
                    "class already has {} enrolled students",
                    class.enrolled_count()
                ))
                .into());
            }
            if let Some(title) = &update.title {
                class.title = title.clone();
            }
            if let Some(description) = &update.description {
                class.description = Some(description.clone());
            }
            if let Some(price) = price {
                class.price = price;
            }
            if let Some(allow_voucher) = update.allow_voucher {
                class.allow_voucher = allow_voucher;
            }
            if let Some(max) = update.max_students {
                class.max_students = Some(max);
            }
            if let Some(start) = start_date {
                class.start_date = start;
            }
            if let Some(minutes) = update.duration_minutes {
                class.duration_minutes = minutes;
            }

            if reschedules {
                let teacher = self.load_teacher(&class.teacher).await?;
                self.check_availability(&teacher, &class.window(), Some(&class.id))
                    .await?;
            }

            match self.stores.classes.update(class).await {
                Ok(saved) => {
                    info!(class_id = %id, "class updated");
                    return Ok(saved);
                }
                Err(StoreError::Stale { .. }) => {
                    debug!(class_id = %id, attempt, "class changed concurrently, retrying update");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Conflict::Contention {
            kind: EntityKind::Class,
            id: id.to_string(),
        }
        .into())
    }

    /// Deletes a class that has no enrolled students.
    ///
    /// The delete is conditional on the revision that passed the check, so a
    /// concurrent enrollment either lands first (and blocks the delete) or finds
    /// the class gone.
    pub async fn delete_class(&self, id: &ClassId) -> Result<()> {
        let mut deleted = None;
        for attempt in 1..=self.config.max_write_attempts {
            let class = self
                .stores
                .classes
                .get(id)
                .await?
                .ok_or_else(|| Error::not_found(EntityKind::Class, id))?;
            if let Err(conflict) = validate_not_enrolled_for_deletion(&class) {
                warn!(class_id = %id, error = %conflict, "class deletion rejected");
                return Err(conflict.into());
            }
            match self.stores.classes.delete_unchanged(&class).await {
                Ok(()) => {
                    deleted = Some(class);
                    break;
                }
                Err(StoreError::Stale { .. }) => {
                    debug!(class_id = %id, attempt, "class changed concurrently, retrying delete");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let Some(class) = deleted else {
            return Err(Conflict::Contention {
                kind: EntityKind::Class,
                id: id.to_string(),
            }
            .into());
        };
        info!(class_id = %id, teacher_id = %class.teacher, "class deleted");

        if self.config.detach_deleted_class_from_teacher {
            self.detach_from_teacher(&class).await?;
        }
        Ok(())
    }

    async fn detach_from_teacher(&self, class: &Class) -> Result<()> {
        let outcome = modify(
            &*self.stores.users,
            &class.teacher,
            self.config.max_write_attempts,
            |user: &mut User| match user {
                User::Teacher(teacher) => Ok(teacher.remove_class(&class.id)),
                User::Student(_) => Ok(false),
            },
        )
        .await;
        match outcome {
            Ok(Outcome::Saved(_) | Outcome::Unchanged(_)) => Ok(()),
            Ok(Outcome::Missing) => {
                warn!(class_id = %class.id, teacher_id = %class.teacher, "owning teacher no longer exists");
                Ok(())
            }
            Err(e) => {
                error!(class_id = %class.id, teacher_id = %class.teacher, error = %e, "class deleted but still listed by its teacher");
                Err(Error::ConsistencyGap(format!(
                    "class {} deleted but still listed by teacher {}: {e}",
                    class.id, class.teacher
                )))
            }
        }
    }
}
