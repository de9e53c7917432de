//! In-process store with its own partner directory. Backs the integration
//! tests and any embedding that has no database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    auth::ServiceIdentity,
    error::Result,
    models::{
        common::{MaterialFilter, MaterialOrder},
        material::{ConstraintError, Material, MaterialPatch, NewMaterial},
    },
};

use super::MaterialStore;

/// A party that materials may reference. Only partners with
/// `supplier_rank > 0` count as suppliers.
#[derive(Debug, Clone, PartialEq)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub supplier_rank: i32,
}

impl Partner {
    pub fn is_supplier(&self) -> bool {
        self.supplier_rank > 0
    }
}

#[derive(Default)]
struct Inner {
    partners: BTreeMap<i64, Partner>,
    materials: BTreeMap<i64, Material>,
    last_partner_id: i64,
    last_material_id: i64,
}

impl Inner {
    fn verify_supplier(&self, supplier_id: i64) -> std::result::Result<(), ConstraintError> {
        match self.partners.get(&supplier_id) {
            Some(p) if p.is_supplier() => Ok(()),
            _ => Err(ConstraintError::InvalidSupplier(supplier_id)),
        }
    }

    fn verify_code_free(&self, code: &str, except: Option<i64>) -> std::result::Result<(), ConstraintError> {
        let taken = self
            .materials
            .values()
            .any(|m| m.code == code && Some(m.id) != except);
        if taken {
            return Err(ConstraintError::DuplicateCode(code.to_string()));
        }
        Ok(())
    }

    /// Copies a stored record with the supplier name resolved, the way the
    /// SQL store joins it at read time.
    fn resolved(&self, m: &Material) -> Material {
        let mut out = m.clone();
        out.supplier_name = self.partners.get(&m.supplier_id).map(|p| p.name.clone());
        out
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a partner and returns it with its assigned id.
    pub async fn add_partner(&self, name: &str, supplier_rank: i32) -> Partner {
        let mut inner = self.inner.write().await;
        inner.last_partner_id += 1;
        let partner = Partner {
            id: inner.last_partner_id,
            name: name.to_string(),
            supplier_rank,
        };
        inner.partners.insert(partner.id, partner.clone());
        partner
    }
}

#[async_trait]
impl MaterialStore for MemoryStore {
    async fn search(
        &self,
        _actor: &ServiceIdentity,
        filter: &MaterialFilter,
    ) -> Result<Vec<Material>> {
        let inner = self.inner.read().await;

        let mut rows: Vec<&Material> = inner
            .materials
            .values()
            .filter(|m| filter.material_type.map_or(true, |t| m.material_type == t))
            .filter(|m| filter.supplier_id.map_or(true, |s| m.supplier_id == s))
            .collect();

        match filter.order {
            MaterialOrder::CodeName => rows.sort_by(|a, b| {
                (a.code.as_str(), a.name.as_str(), a.id).cmp(&(b.code.as_str(), b.name.as_str(), b.id))
            }),
            MaterialOrder::IdDesc => rows.sort_by(|a, b| b.id.cmp(&a.id)),
        }

        let offset = usize::try_from(filter.offset).unwrap_or(0);
        let limit = filter
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|m| inner.resolved(m))
            .collect())
    }

    async fn browse(&self, _actor: &ServiceIdentity, id: i64) -> Result<Option<Material>> {
        let inner = self.inner.read().await;
        Ok(inner.materials.get(&id).map(|m| inner.resolved(m)))
    }

    async fn create(&self, actor: &ServiceIdentity, new: NewMaterial) -> Result<Material> {
        let new = new.normalized()?;

        let mut inner = self.inner.write().await;
        inner.verify_supplier(new.supplier_id)?;
        inner.verify_code_free(&new.code, None)?;

        inner.last_material_id += 1;
        let now = OffsetDateTime::now_utc();
        let material = Material {
            id: inner.last_material_id,
            code: new.code,
            name: new.name,
            material_type: new.material_type,
            buy_price: new.buy_price,
            supplier_id: new.supplier_id,
            supplier_name: None,
            created_by: actor.name().to_string(),
            updated_by: actor.name().to_string(),
            create_date: now,
            write_date: now,
        };
        inner.materials.insert(material.id, material.clone());

        Ok(inner.resolved(&material))
    }

    async fn write(
        &self,
        actor: &ServiceIdentity,
        id: i64,
        patch: MaterialPatch,
    ) -> Result<Option<Material>> {
        let patch = patch.normalized()?;

        let mut inner = self.inner.write().await;
        let Some(current) = inner.materials.get(&id) else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(inner.resolved(current)));
        }

        if let Some(supplier_id) = patch.supplier_id {
            inner.verify_supplier(supplier_id)?;
        }
        if let Some(code) = &patch.code {
            inner.verify_code_free(code, Some(id))?;
        }

        // All checks passed; nothing below can fail.
        let mut updated = current.clone();
        if let Some(code) = patch.code {
            updated.code = code;
        }
        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(material_type) = patch.material_type {
            updated.material_type = material_type;
        }
        if let Some(buy_price) = patch.buy_price {
            updated.buy_price = buy_price;
        }
        if let Some(supplier_id) = patch.supplier_id {
            updated.supplier_id = supplier_id;
        }
        updated.updated_by = actor.name().to_string();
        updated.write_date = OffsetDateTime::now_utc();

        inner.materials.insert(id, updated.clone());
        Ok(Some(inner.resolved(&updated)))
    }

    async fn unlink(&self, _actor: &ServiceIdentity, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.materials.remove(&id).is_some())
    }
}
