use super::ids::{ClassId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields shared by every user regardless of role.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub revision: u64,
}

fn default_active() -> bool {
    true
}

impl UserRecord {
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            full_name: None,
            created_at: Utc::now(),
            is_active: true,
            revision: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Teacher {
    #[serde(flatten)]
    pub record: UserRecord,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    /// Classes this teacher created, in creation order.
    #[serde(default)]
    pub created_classes: Vec<ClassId>,
}

impl Teacher {
    pub fn new(record: UserRecord) -> Self {
        Self {
            record,
            biography: None,
            specialization: None,
            created_classes: Vec::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.record.id
    }

    /// Records ownership of a class. Returns false if it was already listed.
    pub fn add_class(&mut self, class: &ClassId) -> bool {
        if self.created_classes.contains(class) {
            return false;
        }
        self.created_classes.push(class.clone());
        true
    }

    pub fn remove_class(&mut self, class: &ClassId) -> bool {
        let before = self.created_classes.len();
        self.created_classes.retain(|c| c != class);
        before != self.created_classes.len()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Student {
    #[serde(flatten)]
    pub record: UserRecord,
    #[serde(default)]
    pub enrolled_classes: Vec<ClassId>,
}

impl Student {
    pub fn new(record: UserRecord) -> Self {
        Self {
            record,
            enrolled_classes: Vec::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.record.id
    }

    pub fn add_enrolled_class(&mut self, class: &ClassId) -> bool {
        if self.enrolled_classes.contains(class) {
            return false;
        }
        self.enrolled_classes.push(class.clone());
        true
    }

    pub fn remove_enrolled_class(&mut self, class: &ClassId) -> bool {
        let before = self.enrolled_classes.len();
        self.enrolled_classes.retain(|c| c != class);
        before != self.enrolled_classes.len()
    }
}

/// Teachers and students share one collection, discriminated by `role`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum User {
    Teacher(Teacher),
    Student(Student),
}

impl User {
    pub fn record(&self) -> &UserRecord {
        match self {
            User::Teacher(teacher) => &teacher.record,
            User::Student(student) => &student.record,
        }
    }

    pub fn record_mut(&mut self) -> &mut UserRecord {
        match self {
            User::Teacher(teacher) => &mut teacher.record,
            User::Student(student) => &mut student.record,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.record().id
    }

    pub fn into_teacher(self) -> Option<Teacher> {
        match self {
            User::Teacher(teacher) => Some(teacher),
            User::Student(_) => None,
        }
    }

    pub fn into_student(self) -> Option<Student> {
        match self {
            User::Student(student) => Some(student),
            User::Teacher(_) => None,
        }
    }
}

impl From<Teacher> for User {
    fn from(teacher: Teacher) -> Self {
        User::Teacher(teacher)
    }
}

impl From<Student> for User {
    fn from(student: Student) -> Self {
        User::Student(student)
    }
}
