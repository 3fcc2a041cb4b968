use crate::domain::class::Class;
use crate::domain::enrollment::Enrollment;
use crate::domain::ids::{ClassId, EnrollmentId, UserId, VoucherId};
use crate::domain::ports::{
    ClassQuery, ClassStore, Document, EnrollmentQuery, EnrollmentStore, Stores, UserStore,
    VoucherStore,
};
use crate::domain::user::User;
use crate::domain::voucher::Voucher;
use crate::error::{EntityKind, StoreError, StoreResult};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for teachers and students.
pub const CF_USERS: &str = "users";
/// Column Family for classes.
pub const CF_CLASSES: &str = "classes";
/// Column Family for vouchers.
pub const CF_VOUCHERS: &str = "vouchers";
/// Column Family for enrollments.
pub const CF_ENROLLMENTS: &str = "enrollments";

/// A persistent store implementation using RocksDB.
///
/// Each collection lives in its own Column Family, keyed by the document id
/// and holding the document as JSON.
///
/// RocksDB has no compare-and-swap, so every conditional write (revision
/// check, unique insert, conditional delete) runs its read and write under a
/// single store-wide lock. Plain reads do not take it.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_USERS, CF_CLASSES, CF_VOUCHERS, CF_ENROLLMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// All four store ports backed by this database.
    pub fn stores(&self) -> Stores {
        Stores {
            users: Arc::new(self.clone()),
            classes: Arc::new(self.clone()),
            vouchers: Arc::new(self.clone()),
            enrollments: Arc::new(self.clone()),
        }
    }

    fn cf(&self, kind: EntityKind) -> StoreResult<&ColumnFamily> {
        let name = kind.collection();
        self.db.cf_handle(name).ok_or_else(|| {
            StoreError::Io(std::io::Error::other(format!(
                "{name} column family not found"
            )))
        })
    }

    fn read<D>(&self, id: &D::Id) -> StoreResult<Option<D>>
    where
        D: Document + DeserializeOwned,
    {
        let cf = self.cf(D::KIND)?;
        match self.db.get_pinned_cf(cf, id.to_string())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<D>(&self, document: &D) -> StoreResult<()>
    where
        D: Document + Serialize,
    {
        let cf = self.cf(D::KIND)?;
        let value = serde_json::to_vec(document)?;
        self.db.put_cf(cf, document.id().to_string(), value)?;
        Ok(())
    }

    fn scan<D, F>(&self, predicate: F) -> StoreResult<Vec<D>>
    where
        D: Document + DeserializeOwned,
        F: Fn(&D) -> bool,
    {
        let cf = self.cf(D::KIND)?;
        let mut documents = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let document: D = serde_json::from_slice(&value)?;
            if predicate(&document) {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn stale<D: Document>(document: &D) -> StoreError {
        StoreError::Stale {
            kind: D::KIND,
            id: document.id().to_string(),
        }
    }

    async fn insert_unless<D, F>(&self, mut document: D, conflicts: F) -> StoreResult<D>
    where
        D: Document + Serialize + DeserializeOwned,
        F: Fn(&D) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        if self.read::<D>(document.id())?.is_some() || !self.scan(conflicts)?.is_empty() {
            return Err(StoreError::Duplicate {
                kind: D::KIND,
                id: document.id().to_string(),
            });
        }
        document.set_revision(0);
        self.write(&document)?;
        Ok(document)
    }

    async fn swap<D>(&self, mut document: D) -> StoreResult<D>
    where
        D: Document + Serialize + DeserializeOwned,
    {
        let _guard = self.write_lock.lock().await;
        match self.read::<D>(document.id())? {
            Some(stored) if stored.revision() == document.revision() => {}
            _ => return Err(Self::stale(&document)),
        }
        document.set_revision(document.revision() + 1);
        self.write(&document)?;
        Ok(document)
    }

    async fn overwrite<D>(&self, document: D) -> StoreResult<D>
    where
        D: Document + Serialize,
    {
        let _guard = self.write_lock.lock().await;
        self.write(&document)?;
        Ok(document)
    }

    async fn remove<D>(&self, id: &D::Id) -> StoreResult<bool>
    where
        D: Document + DeserializeOwned,
    {
        let _guard = self.write_lock.lock().await;
        if self.read::<D>(id)?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(self.cf(D::KIND)?, id.to_string())?;
        Ok(true)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn save(&self, user: User) -> StoreResult<User> {
        self.overwrite(user).await
    }

    async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.read(id)
    }

    async fn update(&self, user: User) -> StoreResult<User> {
        self.swap(user).await
    }
}

#[async_trait]
impl ClassStore for RocksDBStore {
    async fn insert(&self, class: Class) -> StoreResult<Class> {
        self.insert_unless(class, |_: &Class| false).await
    }

    async fn save(&self, class: Class) -> StoreResult<Class> {
        self.overwrite(class).await
    }

    async fn get(&self, id: &ClassId) -> StoreResult<Option<Class>> {
        self.read(id)
    }

    async fn update(&self, class: Class) -> StoreResult<Class> {
        self.swap(class).await
    }

    async fn delete(&self, id: &ClassId) -> StoreResult<bool> {
        self.remove::<Class>(id).await
    }

    async fn delete_unchanged(&self, class: &Class) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        match self.read::<Class>(&class.id)? {
            Some(stored) if stored.revision == class.revision => {
                self.db.delete_cf(self.cf(EntityKind::Class)?, class.id.to_string())?;
                Ok(())
            }
            _ => Err(Self::stale(class)),
        }
    }

    async fn find(&self, query: &ClassQuery) -> StoreResult<Vec<Class>> {
        let mut classes = self.scan(|c: &Class| query.matches(c))?;
        classes.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(classes)
    }
}

#[async_trait]
impl VoucherStore for RocksDBStore {
    async fn save(&self, voucher: Voucher) -> StoreResult<Voucher> {
        self.overwrite(voucher).await
    }

    async fn get(&self, id: &VoucherId) -> StoreResult<Option<Voucher>> {
        self.read(id)
    }

    async fn update(&self, voucher: Voucher) -> StoreResult<Voucher> {
        self.swap(voucher).await
    }

    async fn find_by_student(&self, student: &UserId) -> StoreResult<Vec<Voucher>> {
        let mut vouchers = self.scan(|v: &Voucher| &v.student == student)?;
        vouchers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(vouchers)
    }
}

#[async_trait]
impl EnrollmentStore for RocksDBStore {
    async fn insert(&self, enrollment: Enrollment) -> StoreResult<Enrollment> {
        let (student, class) = (enrollment.student.clone(), enrollment.class.clone());
        self.insert_unless(enrollment, |e: &Enrollment| e.is_for(&student, &class))
            .await
    }

    async fn get(&self, id: &EnrollmentId) -> StoreResult<Option<Enrollment>> {
        self.read(id)
    }

    async fn find_for(
        &self,
        student: &UserId,
        class: &ClassId,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .scan(|e: &Enrollment| e.is_for(student, class))?
            .into_iter()
            .next())
    }

    async fn find(&self, query: &EnrollmentQuery) -> StoreResult<Vec<Enrollment>> {
        let mut enrollments = self.scan(|e: &Enrollment| query.matches(e))?;
        enrollments.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at).then(a.id.cmp(&b.id)));
        Ok(enrollments)
    }

    async fn delete(&self, id: &EnrollmentId) -> StoreResult<bool> {
        self.remove::<Enrollment>(id).await
    }
}
