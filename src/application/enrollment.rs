use super::unit_of_work::{Outcome, modify};
use crate::config::EngineConfig;
use crate::domain::class::Class;
use crate::domain::enrollment::{Enrollment, PaymentType};
use crate::domain::ids::{ClassId, EnrollmentId, UserId, VoucherId};
use crate::domain::ports::{ClockRef, EnrollmentQuery, Stores};
use crate::domain::user::{Student, User};
use crate::domain::validation::has_available_spots;
use crate::domain::voucher::Voucher;
use crate::error::{Conflict, EntityKind, Error, Result, StoreError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: UserId,
    pub class_id: ClassId,
    pub payment_type: PaymentType,
    /// Voucher to spend; when absent the student's soonest-expiring usable
    /// voucher is used.
    #[serde(default)]
    pub voucher_id: Option<VoucherId>,
}

/// A completed step of an enrollment, undone in reverse order on failure.
#[derive(Debug)]
enum Undo {
    RefundVoucher(VoucherId),
    DeleteEnrollment(EnrollmentId),
    ReleaseSeat { class: ClassId, student: UserId },
}

/// Links students to classes while holding the capacity, uniqueness and
/// voucher-balance invariants under concurrent callers.
///
/// The seat itself is taken with a compare-and-swap on the class document, and
/// the store rejects a second enrollment for the same (student, class) pair, so
/// racing requests cannot overbook or double-enroll. Every step after the
/// voucher debit is compensated if a later step fails.
pub struct EnrollmentEngine {
    stores: Stores,
    clock: ClockRef,
    config: EngineConfig,
}

impl EnrollmentEngine {
    pub fn new(stores: Stores, clock: ClockRef, config: EngineConfig) -> Self {
        Self {
            stores,
            clock,
            config,
        }
    }

    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment> {
        let now = self.clock.now();
        let student = self.load_student(&request.student_id).await?;
        let class = self.load_class(&request.class_id).await?;

        if let Err(err) = self.precheck(&student, &class, &request, now).await {
            warn!(student_id = %request.student_id, class_id = %request.class_id, error = %err, "enrollment rejected");
            return Err(err);
        }

        let mut undo = Vec::new();
        let voucher = match request.payment_type {
            PaymentType::Direct => None,
            PaymentType::Voucher => {
                let id = self
                    .debit_voucher(&student, request.voucher_id.as_ref(), now)
                    .await
                    .inspect_err(|err| {
                        warn!(student_id = %request.student_id, class_id = %request.class_id, error = %err, "voucher debit failed");
                    })?;
                undo.push(Undo::RefundVoucher(id.clone()));
                Some(id)
            }
        };

        let enrollment = Enrollment::new(
            request.student_id.clone(),
            request.class_id.clone(),
            request.payment_type,
            voucher,
            now,
        );
        let enrollment = match self.stores.enrollments.insert(enrollment).await {
            Ok(enrollment) => enrollment,
            Err(StoreError::Duplicate { .. }) => {
                let err = Conflict::DuplicateEnrollment {
                    student: request.student_id.clone(),
                    class: request.class_id.clone(),
                }
                .into();
                return Err(self.abort(undo, err).await);
            }
            Err(e) => return Err(self.abort(undo, e.into()).await),
        };
        undo.push(Undo::DeleteEnrollment(enrollment.id.clone()));

        if let Err(err) = self
            .reserve_seat(&request.class_id, &request.student_id, now)
            .await
        {
            return Err(self.abort(undo, err).await);
        }
        undo.push(Undo::ReleaseSeat {
            class: request.class_id.clone(),
            student: request.student_id.clone(),
        });

        if let Err(err) = self
            .attach_to_student(&request.student_id, &request.class_id)
            .await
        {
            return Err(self.abort(undo, err).await);
        }

        info!(
            enrollment_id = %enrollment.id,
            student_id = %enrollment.student,
            class_id = %enrollment.class,
            payment_type = %enrollment.payment_type,
            "student enrolled"
        );
        Ok(enrollment)
    }

    /// Checks that can be made on the loaded snapshots, before anything is written.
    async fn precheck(
        &self,
        student: &Student,
        class: &Class,
        request: &EnrollmentRequest,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_enrolled(student.id(), &class.id).await? {
            return Err(Conflict::DuplicateEnrollment {
                student: student.id().clone(),
                class: class.id.clone(),
            }
            .into());
        }
        if class.has_started(now) {
            return Err(Conflict::ClassStarted(class.id.clone()).into());
        }
        if !has_available_spots(class) {
            return Err(Conflict::ClassFull(class.id.clone()).into());
        }
        if request.payment_type == PaymentType::Voucher && !class.allow_voucher {
            return Err(Conflict::VoucherNotAccepted(class.id.clone()).into());
        }
        Ok(())
    }

    /// Spends one credit and returns the voucher it was taken from.
    async fn debit_voucher(
        &self,
        student: &Student,
        requested: Option<&VoucherId>,
        now: DateTime<Utc>,
    ) -> Result<VoucherId> {
        let candidates = match requested {
            Some(id) => {
                let voucher = self
                    .stores
                    .vouchers
                    .get(id)
                    .await?
                    .ok_or_else(|| Error::not_found(EntityKind::Voucher, id))?;
                if &voucher.student != student.id() {
                    return Err(Conflict::VoucherNotOwned(student.id().clone()).into());
                }
                vec![voucher.id]
            }
            None => {
                let mut usable: Vec<Voucher> = self
                    .stores
                    .vouchers
                    .find_by_student(student.id())
                    .await?
                    .into_iter()
                    .filter(|v| v.is_usable(now))
                    .collect();
                usable.sort_by_key(|v| (v.expires_at.is_none(), v.expires_at));
                usable.into_iter().map(|v| v.id).collect()
            }
        };

        for id in candidates {
            let outcome = modify(
                &*self.stores.vouchers,
                &id,
                self.config.max_write_attempts,
                |voucher: &mut Voucher| {
                    voucher.debit(now)?;
                    Ok(true)
                },
            )
            .await;
            match outcome {
                Ok(Outcome::Saved(_)) => return Ok(id),
                Ok(Outcome::Missing | Outcome::Unchanged(_)) => continue,
                // Another request drained it first; try the next one.
                Err(Error::Conflict(Conflict::InsufficientVoucher(_))) if requested.is_none() => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Conflict::InsufficientVoucher(student.id().clone()).into())
    }

    /// Adds the student to the class roster, re-checking capacity against the
    /// latest stored state on every attempt.
    async fn reserve_seat(
        &self,
        class_id: &ClassId,
        student: &UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let outcome = modify(
            &*self.stores.classes,
            class_id,
            self.config.max_write_attempts,
            |class: &mut Class| {
                if class.is_enrolled(student) {
                    return Ok(false);
                }
                if class.has_started(now) {
                    return Err(Conflict::ClassStarted(class.id.clone()).into());
                }
                if !has_available_spots(class) {
                    return Err(Conflict::ClassFull(class.id.clone()).into());
                }
                Ok(class.add_student(student))
            },
        )
        .await?;
        match outcome {
            Outcome::Missing => Err(Error::not_found(EntityKind::Class, class_id)),
            Outcome::Saved(_) | Outcome::Unchanged(_) => Ok(()),
        }
    }

    async fn attach_to_student(&self, student: &UserId, class: &ClassId) -> Result<()> {
        let outcome = modify(
            &*self.stores.users,
            student,
            self.config.max_write_attempts,
            |user: &mut User| match user {
                User::Student(s) => Ok(s.add_enrolled_class(class)),
                User::Teacher(_) => Err(Error::not_found(EntityKind::Student, student)),
            },
        )
        .await?;
        match outcome {
            Outcome::Missing => Err(Error::not_found(EntityKind::Student, student)),
            Outcome::Saved(_) | Outcome::Unchanged(_) => Ok(()),
        }
    }

    async fn release_seat(&self, class: &ClassId, student: &UserId) -> Result<()> {
        modify(
            &*self.stores.classes,
            class,
            self.config.max_write_attempts,
            |c: &mut Class| Ok(c.remove_student(student)),
        )
        .await?;
        Ok(())
    }

    async fn detach_from_student(&self, student: &UserId, class: &ClassId) -> Result<()> {
        modify(
            &*self.stores.users,
            student,
            self.config.max_write_attempts,
            |user: &mut User| match user {
                User::Student(s) => Ok(s.remove_enrolled_class(class)),
                User::Teacher(_) => Ok(false),
            },
        )
        .await?;
        Ok(())
    }

    async fn refund_voucher(&self, voucher: &VoucherId) -> Result<()> {
        modify(
            &*self.stores.vouchers,
            voucher,
            self.config.max_write_attempts,
            |v: &mut Voucher| Ok(v.refund()),
        )
        .await?;
        Ok(())
    }

    /// Undoes completed steps, newest first, and returns the error to report.
    async fn abort(&self, steps: Vec<Undo>, cause: Error) -> Error {
        let mut failures = Vec::new();
        for step in steps.into_iter().rev() {
            let result = match &step {
                Undo::RefundVoucher(voucher) => self.refund_voucher(voucher).await,
                Undo::DeleteEnrollment(id) => self
                    .stores
                    .enrollments
                    .delete(id)
                    .await
                    .map(|_| ())
                    .map_err(Error::from),
                Undo::ReleaseSeat { class, student } => self.release_seat(class, student).await,
            };
            if let Err(e) = result {
                error!(?step, error = %e, "compensation failed");
                failures.push(format!("{step:?}: {e}"));
            }
        }
        if failures.is_empty() {
            warn!(error = %cause, "enrollment rolled back");
            cause
        } else {
            Error::ConsistencyGap(format!(
                "enrollment failed ({cause}) and could not be fully rolled back: {}",
                failures.join("; ")
            ))
        }
    }

    /// Removes the enrollment and both reciprocal references.
    ///
    /// Voucher credit is only given back when `refund_voucher_on_unenroll` is set.
    pub async fn unenroll(&self, student_id: &UserId, class_id: &ClassId) -> Result<()> {
        self.load_student(student_id).await?;
        self.load_class(class_id).await?;
        let enrollment = self
            .stores
            .enrollments
            .find_for(student_id, class_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(EntityKind::Enrollment, format!("{student_id}/{class_id}"))
            })?;

        if !self.stores.enrollments.delete(&enrollment.id).await? {
            // Lost a race with another unenroll of the same pair.
            return Err(Error::not_found(EntityKind::Enrollment, &enrollment.id));
        }

        let mut failures = Vec::new();
        if let Err(e) = self.release_seat(class_id, student_id).await {
            failures.push(format!("class roster: {e}"));
        }
        if let Err(e) = self.detach_from_student(student_id, class_id).await {
            failures.push(format!("student class list: {e}"));
        }
        if self.config.refund_voucher_on_unenroll
            && let Some(voucher) = &enrollment.voucher
            && let Err(e) = self.refund_voucher(voucher).await
        {
            failures.push(format!("voucher refund: {e}"));
        }

        if !failures.is_empty() {
            error!(%student_id, %class_id, failures = ?failures, "enrollment deleted but references remain");
            return Err(Error::ConsistencyGap(format!(
                "enrollment {} deleted but cleanup failed: {}",
                enrollment.id,
                failures.join("; ")
            )));
        }
        info!(%student_id, %class_id, enrollment_id = %enrollment.id, "student unenrolled");
        Ok(())
    }

    pub async fn is_enrolled(&self, student_id: &UserId, class_id: &ClassId) -> Result<bool> {
        Ok(self
            .stores
            .enrollments
            .find_for(student_id, class_id)
            .await?
            .is_some())
    }

    pub async fn enrollments_by_student(&self, student_id: &UserId) -> Result<Vec<Enrollment>> {
        self.load_student(student_id).await?;
        let query = EnrollmentQuery {
            student: Some(student_id.clone()),
            ..Default::default()
        };
        Ok(self.stores.enrollments.find(&query).await?)
    }

    pub async fn enrollments_by_class(&self, class_id: &ClassId) -> Result<Vec<Enrollment>> {
        let query = EnrollmentQuery {
            class: Some(class_id.clone()),
            ..Default::default()
        };
        Ok(self.stores.enrollments.find(&query).await?)
    }

    pub async fn enrollments_by_payment_type(
        &self,
        payment_type: PaymentType,
    ) -> Result<Vec<Enrollment>> {
        let query = EnrollmentQuery {
            payment_type: Some(payment_type),
            ..Default::default()
        };
        Ok(self.stores.enrollments.find(&query).await?)
    }

    /// Total credits left across the student's usable vouchers.
    pub async fn voucher_balance(&self, student_id: &UserId) -> Result<u32> {
        self.load_student(student_id).await?;
        let now = self.clock.now();
        Ok(self
            .stores
            .vouchers
            .find_by_student(student_id)
            .await?
            .iter()
            .filter(|v| !v.is_expired(now))
            .map(|v| v.remaining_credits)
            .sum())
    }

    async fn load_student(&self, id: &UserId) -> Result<Student> {
        self.stores
            .users
            .get_student(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Student, id))
    }

    async fn load_class(&self, id: &ClassId) -> Result<Class> {
        self.stores
            .classes
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Class, id))
    }
}
