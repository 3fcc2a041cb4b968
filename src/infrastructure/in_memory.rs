use crate::domain::class::Class;
use crate::domain::enrollment::Enrollment;
use crate::domain::ids::{ClassId, EnrollmentId, UserId, VoucherId};
use crate::domain::ports::{
    ClassQuery, ClassStore, Document, EnrollmentQuery, EnrollmentStore, Stores, UserStore,
    VoucherStore,
};
use crate::domain::user::User;
use crate::domain::voucher::Voucher;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe map of documents keyed by id.
///
/// Every write takes the write lock, which makes the revision check and the
/// insert a single atomic step.
pub struct Collection<D: Document> {
    documents: Arc<RwLock<HashMap<D::Id, D>>>,
}

impl<D: Document> Clone for Collection<D> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
        }
    }
}

impl<D: Document> Default for Collection<D> {
    fn default() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<D: Document> Collection<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &D::Id) -> Option<D> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn save(&self, document: D) -> D {
        let mut documents = self.documents.write().await;
        documents.insert(document.id().clone(), document.clone());
        document
    }

    /// Inserts a new document unless the id is taken or `conflicts` matches a
    /// stored one.
    pub async fn insert_unless<F>(&self, mut document: D, conflicts: F) -> StoreResult<D>
    where
        F: Fn(&D) -> bool,
    {
        let mut documents = self.documents.write().await;
        if documents.contains_key(document.id()) || documents.values().any(conflicts) {
            return Err(StoreError::Duplicate {
                kind: D::KIND,
                id: document.id().to_string(),
            });
        }
        document.set_revision(0);
        documents.insert(document.id().clone(), document.clone());
        Ok(document)
    }

    pub async fn update(&self, mut document: D) -> StoreResult<D> {
        let mut documents = self.documents.write().await;
        let stale = || StoreError::Stale {
            kind: D::KIND,
            id: document.id().to_string(),
        };
        match documents.get(document.id()) {
            Some(stored) if stored.revision() == document.revision() => {}
            _ => return Err(stale()),
        }
        document.set_revision(document.revision() + 1);
        documents.insert(document.id().clone(), document.clone());
        Ok(document)
    }

    pub async fn delete(&self, id: &D::Id) -> bool {
        self.documents.write().await.remove(id).is_some()
    }

    pub async fn delete_unchanged(&self, document: &D) -> StoreResult<()> {
        let mut documents = self.documents.write().await;
        match documents.get(document.id()) {
            Some(stored) if stored.revision() == document.revision() => {
                documents.remove(document.id());
                Ok(())
            }
            _ => Err(StoreError::Stale {
                kind: D::KIND,
                id: document.id().to_string(),
            }),
        }
    }

    pub async fn filter<F>(&self, predicate: F) -> Vec<D>
    where
        F: Fn(&D) -> bool,
    {
        let documents = self.documents.read().await;
        documents.values().filter(|d| predicate(*d)).cloned().collect()
    }
}

/// In-memory store for teachers and students.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Collection<User>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn save(&self, user: User) -> StoreResult<User> {
        Ok(self.users.save(user).await)
    }

    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users.get(id).await)
    }

    async fn update(&self, user: User) -> StoreResult<User> {
        self.users.update(user).await
    }
}

/// In-memory store for classes.
#[derive(Default, Clone)]
pub struct InMemoryClassStore {
    classes: Collection<Class>,
}

impl InMemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClassStore for InMemoryClassStore {
    async fn insert(&self, class: Class) -> StoreResult<Class> {
        self.classes.insert_unless(class, |_| false).await
    }

    async fn save(&self, class: Class) -> StoreResult<Class> {
        Ok(self.classes.save(class).await)
    }

    async fn get(&self, id: &ClassId) -> StoreResult<Option<Class>> {
        Ok(self.classes.get(id).await)
    }

    async fn update(&self, class: Class) -> StoreResult<Class> {
        self.classes.update(class).await
    }

    async fn delete(&self, id: &ClassId) -> StoreResult<bool> {
        Ok(self.classes.delete(id).await)
    }

    async fn delete_unchanged(&self, class: &Class) -> StoreResult<()> {
        self.classes.delete_unchanged(class).await
    }

    async fn find(&self, query: &ClassQuery) -> StoreResult<Vec<Class>> {
        let mut classes = self.classes.filter(|c| query.matches(c)).await;
        classes.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(classes)
    }
}

/// In-memory store for vouchers.
#[derive(Default, Clone)]
pub struct InMemoryVoucherStore {
    vouchers: Collection<Voucher>,
}

impl InMemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoucherStore for InMemoryVoucherStore {
    async fn save(&self, voucher: Voucher) -> StoreResult<Voucher> {
        Ok(self.vouchers.save(voucher).await)
    }

    async fn get(&self, id: &VoucherId) -> StoreResult<Option<Voucher>> {
        Ok(self.vouchers.get(id).await)
    }

    async fn update(&self, voucher: Voucher) -> StoreResult<Voucher> {
        self.vouchers.update(voucher).await
    }

    async fn find_by_student(&self, student: &UserId) -> StoreResult<Vec<Voucher>> {
        let mut vouchers = self.vouchers.filter(|v| &v.student == student).await;
        vouchers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(vouchers)
    }
}

/// In-memory store for enrollments, unique per (student, class).
#[derive(Default, Clone)]
pub struct InMemoryEnrollmentStore {
    enrollments: Collection<Enrollment>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn insert(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        let (student, class) = (enrollment.student.clone(), enrollment.class.clone());
        self.enrollments
            .insert_unless(enrollment, |existing| existing.is_for(&student, &class))
            .await
    }

    async fn get(&self, id: &EnrollmentId) -> StoreResult<Option<Enrollment>> {
        Ok(self.enrollments.get(id).await)
    }

    async fn find_for(
        &self,
        student: &UserId,
        class: &ClassId,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .enrollments
            .filter(|e| e.is_for(student, class))
            .await
            .into_iter()
            .next())
    }

    async fn find(&self, query: &EnrollmentQuery) -> StoreResult<Vec<Enrollment>> {
        let mut enrollments = self.enrollments.filter(|e| query.matches(e)).await;
        enrollments.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at).then(a.id.cmp(&b.id)));
        Ok(enrollments)
    }

    async fn delete(&self, id: &EnrollmentId) -> StoreResult<bool> {
        Ok(self.enrollments.delete(id).await)
    }
}

impl Stores {
    /// A fresh, empty set of in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            classes: Arc::new(InMemoryClassStore::new()),
            vouchers: Arc::new(InMemoryVoucherStore::new()),
            enrollments: Arc::new(InMemoryEnrollmentStore::new()),
        }
    }
}
