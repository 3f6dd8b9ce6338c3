use crate::error::DataError;
use crate::page::{Page, Pageable};

/// Generic async CRUD facade over the query builder, the ambient
/// typed-repository layer a complete query stack always carries
/// alongside a raw SQL builder.
#[async_trait::async_trait]
pub trait Repository<T, Id>: Send + Sync
where
    T: Send + Sync + 'static,
    Id: Send + Sync + 'static,
{
    async fn find_by_id(&self, id: &Id) -> Result<Option<T>, DataError>;
    async fn find_all(&self) -> Result<Vec<T>, DataError>;
    async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<T>, DataError>;
    async fn save(&self, entity: &T) -> Result<T, DataError>;
    async fn delete(&self, id: &Id) -> Result<bool, DataError>;
    async fn count(&self) -> Result<u64, DataError>;
}
