use super::catalog::ClassCatalog;
use super::enrollment::{EnrollmentEngine, EnrollmentRequest};
use super::scheduling::{ClassScheduler, CreateClassRequest};
use crate::config::EngineConfig;
use crate::domain::class::Class;
use crate::domain::enrollment::Enrollment;
use crate::domain::ids::{ClassId, UserId};
use crate::domain::ports::{ClockRef, Stores};
use crate::error::Result;
use tracing::debug;

/// A single request against the platform.
#[derive(Debug, Clone)]
pub enum Command {
    CreateClass(CreateClassRequest),
    DeleteClass(ClassId),
    Enroll(EnrollmentRequest),
    Unenroll { student: UserId, class: ClassId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    ClassCreated(Class),
    ClassDeleted(ClassId),
    Enrolled(Enrollment),
    Unenrolled { student: UserId, class: ClassId },
}

/// The scheduling, enrollment and catalog engines wired to one set of stores.
pub struct Classroom {
    pub scheduler: ClassScheduler,
    pub enrollment: EnrollmentEngine,
    pub catalog: ClassCatalog,
}

impl Classroom {
    pub fn new(stores: Stores, clock: ClockRef, config: EngineConfig) -> Self {
        Self {
            scheduler: ClassScheduler::new(stores.clone(), clock.clone(), config.clone()),
            enrollment: EnrollmentEngine::new(stores.clone(), clock.clone(), config),
            catalog: ClassCatalog::new(stores, clock),
        }
    }

    pub async fn execute(&self, command: Command) -> Result<Applied> {
        debug!(?command, "executing");
        match command {
            Command::CreateClass(request) => self
                .scheduler
                .create_class(request)
                .await
                .map(Applied::ClassCreated),
            Command::DeleteClass(id) => {
                self.scheduler.delete_class(&id).await?;
                Ok(Applied::ClassDeleted(id))
            }
            Command::Enroll(request) => self
                .enrollment
                .enroll(request)
                .await
                .map(Applied::Enrolled),
            Command::Unenroll { student, class } => {
                self.enrollment.unenroll(&student, &class).await?;
                Ok(Applied::Unenrolled { student, class })
            }
        }
    }
}
