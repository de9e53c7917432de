use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use crate::{
    auth::ServiceIdentity,
    error::{AppError, Result},
    models::{
        common::MaterialFilter,
        material::{ConstraintError, Material, MaterialPatch, NewMaterial},
    },
};

use super::MaterialStore;

const SELECT_MATERIAL: &str = r#"
    SELECT m.id, m.code, m.name, m.material_type, m.buy_price, m.supplier_id,
           p.name AS supplier_name,
           m.created_by, m.updated_by, m.create_date, m.write_date
    FROM materials m
    LEFT JOIN partners p ON p.id = m.supplier_id
"#;

pub struct PgMaterialStore {
    pool: PgPool,
}

impl PgMaterialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch(conn: &mut PgConnection, id: i64) -> Result<Option<Material>> {
    let row = sqlx::query_as::<_, Material>(&format!("{SELECT_MATERIAL} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

async fn verify_supplier(conn: &mut PgConnection, supplier_id: i64) -> Result<()> {
    let ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM partners WHERE id = $1 AND supplier_rank > 0)",
    )
    .bind(supplier_id)
    .fetch_one(conn)
    .await?;

    if !ok {
        return Err(ConstraintError::InvalidSupplier(supplier_id).into());
    }
    Ok(())
}

/// Folds database constraint violations into the model's own error so both
/// stores report them the same way.
fn map_write_error(e: sqlx::Error, code: Option<&str>, supplier_id: Option<i64>) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        match (db_err.code().as_deref(), db_err.constraint()) {
            (Some("23505"), Some("material_code_uniq")) => {
                return ConstraintError::DuplicateCode(code.unwrap_or_default().to_string()).into();
            }
            (Some("23503"), _) => {
                if let Some(sid) = supplier_id {
                    return ConstraintError::InvalidSupplier(sid).into();
                }
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl MaterialStore for PgMaterialStore {
    async fn search(
        &self,
        actor: &ServiceIdentity,
        filter: &MaterialFilter,
    ) -> Result<Vec<Material>> {
        tracing::debug!(actor = actor.name(), ?filter, "Searching materials");

        let sql = format!(
            r#"{SELECT_MATERIAL}
            WHERE ($1::material_type IS NULL OR m.material_type = $1)
              AND ($2::BIGINT IS NULL OR m.supplier_id = $2)
            ORDER BY {}
            LIMIT $3 OFFSET $4"#,
            filter.order.sql()
        );

        let rows = sqlx::query_as::<_, Material>(&sql)
            .bind(filter.material_type)
            .bind(filter.supplier_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn browse(&self, actor: &ServiceIdentity, id: i64) -> Result<Option<Material>> {
        tracing::debug!(actor = actor.name(), id, "Browsing material");
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    async fn create(&self, actor: &ServiceIdentity, new: NewMaterial) -> Result<Material> {
        let new = new.normalized()?;

        let mut tx = self.pool.begin().await?;
        verify_supplier(&mut tx, new.supplier_id).await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO materials (code, name, material_type, buy_price, supplier_id,
                                   created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id
            "#,
        )
        .bind(&new.code)
        .bind(&new.name)
        .bind(new.material_type)
        .bind(new.buy_price)
        .bind(new.supplier_id)
        .bind(actor.name())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, Some(&new.code), Some(new.supplier_id)))?;

        let material = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Material {} missing after insert", id)))?;

        tx.commit().await?;
        Ok(material)
    }

    async fn write(
        &self,
        actor: &ServiceIdentity,
        id: i64,
        patch: MaterialPatch,
    ) -> Result<Option<Material>> {
        let patch = patch.normalized()?;

        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM materials WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        if let Some(supplier_id) = patch.supplier_id {
            verify_supplier(&mut tx, supplier_id).await?;
        }

        if !patch.is_empty() {
            sqlx::query(
                r#"
                UPDATE materials
                SET code          = COALESCE($2, code),
                    name          = COALESCE($3, name),
                    material_type = COALESCE($4, material_type),
                    buy_price     = COALESCE($5, buy_price),
                    supplier_id   = COALESCE($6, supplier_id),
                    updated_by    = $7,
                    write_date    = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(patch.code.as_deref())
            .bind(patch.name.as_deref())
            .bind(patch.material_type)
            .bind(patch.buy_price)
            .bind(patch.supplier_id)
            .bind(actor.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, patch.code.as_deref(), patch.supplier_id))?;
        }

        let material = fetch(&mut tx, id).await?;
        tx.commit().await?;
        Ok(material)
    }

    async fn unlink(&self, actor: &ServiceIdentity, id: i64) -> Result<bool> {
        tracing::debug!(actor = actor.name(), id, "Unlinking material");
        let rows = sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }
}
