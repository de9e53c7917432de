//! Persistence seam for the material record.
//!
//! Every implementation enforces the record rules itself (required fields,
//! price minimum, unique code, supplier validity), so they hold no matter
//! which caller reaches the store. Each operation runs as the given
//! [`ServiceIdentity`]; there is no ambient elevated mode.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::ServiceIdentity;
use crate::error::Result;
use crate::models::common::MaterialFilter;
use crate::models::material::{Material, MaterialPatch, NewMaterial};

pub use memory::MemoryStore;
pub use postgres::PgMaterialStore;

#[async_trait]
pub trait MaterialStore: Send + Sync {
    /// Materials matching `filter`, in `filter.order`, paged by limit/offset.
    async fn search(&self, actor: &ServiceIdentity, filter: &MaterialFilter)
        -> Result<Vec<Material>>;

    async fn browse(&self, actor: &ServiceIdentity, id: i64) -> Result<Option<Material>>;

    async fn create(&self, actor: &ServiceIdentity, new: NewMaterial) -> Result<Material>;

    /// Applies the supplied fields. `Ok(None)` when no record has `id`.
    /// On any error the stored record is unchanged.
    async fn write(
        &self,
        actor: &ServiceIdentity,
        id: i64,
        patch: MaterialPatch,
    ) -> Result<Option<Material>>;

    /// Permanently removes the record. `Ok(false)` when it was already gone.
    async fn unlink(&self, actor: &ServiceIdentity, id: i64) -> Result<bool>;
}

pub type SharedStore = Arc<dyn MaterialStore>;
