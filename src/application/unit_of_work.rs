use crate::domain::class::Class;
use crate::domain::ports::{ClassStore, Document, UserStore, VoucherStore};
use crate::domain::user::User;
use crate::domain::voucher::Voucher;
use crate::error::{Conflict, Result, StoreError, StoreResult};
use async_trait::async_trait;
use tracing::debug;

/// Read/compare-and-swap access to one kind of document.
#[async_trait]
pub trait Revisioned<D: Document>: Send + Sync {
    async fn load(&self, id: &D::Id) -> StoreResult<Option<D>>;
    async fn store(&self, document: D) -> StoreResult<D>;
}

#[async_trait]
impl Revisioned<Class> for dyn ClassStore {
    async fn load(&self, id: &<Class as Document>::Id) -> StoreResult<Option<Class>> {
        self.get(id).await
    }

    async fn store(&self, class: Class) -> StoreResult<Class> {
        self.update(class).await
    }
}

#[async_trait]
impl Revisioned<Voucher> for dyn VoucherStore {
    async fn load(&self, id: &<Voucher as Document>::Id) -> StoreResult<Option<Voucher>> {
        self.get(id).await
    }

    async fn store(&self, voucher: Voucher) -> StoreResult<Voucher> {
        self.update(voucher).await
    }
}

#[async_trait]
impl Revisioned<User> for dyn UserStore {
    async fn load(&self, id: &<User as Document>::Id) -> StoreResult<Option<User>> {
        self.get(id).await
    }

    async fn store(&self, user: User) -> StoreResult<User> {
        self.update(user).await
    }
}

#[derive(Debug, PartialEq)]
pub enum Outcome<D> {
    /// No document with that id.
    Missing,
    /// The mutation reported nothing to change; nothing was written.
    Unchanged(D),
    Saved(D),
}

/// Loads a document, applies `mutate` and writes it back with compare-and-swap,
/// starting over from a fresh read whenever another writer got there first.
///
/// `mutate` returns `Ok(false)` when no write is needed, and an error to abort.
/// It is re-run against the latest state on every attempt, so any check it
/// performs holds at the moment of the successful write.
pub async fn modify<D, S, F>(
    store: &S,
    id: &D::Id,
    max_attempts: u32,
    mut mutate: F,
) -> Result<Outcome<D>>
where
    D: Document,
    S: Revisioned<D> + ?Sized,
    F: FnMut(&mut D) -> Result<bool> + Send,
{
    for attempt in 1..=max_attempts {
        let Some(mut document) = store.load(id).await? else {
            return Ok(Outcome::Missing);
        };
        if !mutate(&mut document)? {
            return Ok(Outcome::Unchanged(document));
        }
        match store.store(document).await {
            Ok(saved) => return Ok(Outcome::Saved(saved)),
            Err(StoreError::Stale { .. }) => {
                debug!(kind = %D::KIND, %id, attempt, "concurrent write detected, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(Conflict::Contention {
        kind: D::KIND,
        id: id.to_string(),
    }
    .into())
}
