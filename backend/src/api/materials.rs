use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::{
    auth::ApiKeyAuth,
    error::{AppError, Result},
    models::{
        common::MaterialListParams,
        material::{CreateMaterialRequest, MaterialList, MaterialView, UpdateMaterialRequest},
    },
    store::SharedStore,
};

/// Path ids that are not integers cannot name a record.
fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| AppError::material_not_found())
}

/// A path segment axum cannot decode names no record either.
fn path_id(path: std::result::Result<Path<String>, PathRejection>) -> Result<i64> {
    let Path(raw) = path.map_err(|e| {
        tracing::debug!("Path rejected: {}", e);
        AppError::material_not_found()
    })?;
    parse_id(&raw)
}

fn list_params(
    query: std::result::Result<Query<MaterialListParams>, QueryRejection>,
) -> Result<MaterialListParams> {
    let Query(params) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(params)
}

/// Parses a request body as a JSON object. An empty body reads as `{}`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice::<Value>(body)
            .map_err(|_| AppError::BadRequest("Invalid JSON".into()))?
    };
    if !value.is_object() {
        return Err(AppError::BadRequest("Invalid JSON".into()));
    }
    serde_json::from_value(value).map_err(|_| AppError::BadRequest("Invalid JSON".into()))
}

pub async fn list(
    State(store): State<SharedStore>,
    auth: ApiKeyAuth,
    query: std::result::Result<Query<MaterialListParams>, QueryRejection>,
) -> Result<Json<MaterialList>> {
    let filter = list_params(query)?.into_filter()?;

    let results: Vec<MaterialView> = store
        .search(&auth.service, &filter)
        .await?
        .into_iter()
        .map(MaterialView::from)
        .collect();

    Ok(Json(MaterialList {
        count: results.len(),
        results,
    }))
}

pub async fn get_one(
    State(store): State<SharedStore>,
    auth: ApiKeyAuth,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<MaterialView>> {
    let id = path_id(path)?;

    let material = store
        .browse(&auth.service, id)
        .await?
        .ok_or_else(AppError::material_not_found)?;

    Ok(Json(material.into()))
}

pub async fn create(
    State(store): State<SharedStore>,
    auth: ApiKeyAuth,
    body: Bytes,
) -> Result<(StatusCode, Json<MaterialView>)> {
    let req: CreateMaterialRequest = parse_body(&body)?;
    req.validate()?;
    let new = req.into_new_material()?;

    let material = store.create(&auth.service, new).await?;
    tracing::info!(
        id = material.id,
        code = %material.code,
        actor = auth.service.name(),
        "Material created"
    );

    Ok((StatusCode::CREATED, Json(material.into())))
}

pub async fn update(
    State(store): State<SharedStore>,
    auth: ApiKeyAuth,
    path: std::result::Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Result<Json<MaterialView>> {
    let id = path_id(path)?;

    // Absence is reported before anything about the body.
    store
        .browse(&auth.service, id)
        .await?
        .ok_or_else(AppError::material_not_found)?;

    let req: UpdateMaterialRequest = parse_body(&body)?;
    req.validate()?;
    let patch = req.into_patch()?;

    let material = store
        .write(&auth.service, id, patch)
        .await?
        .ok_or_else(AppError::material_not_found)?;
    tracing::info!(
        id = material.id,
        code = %material.code,
        actor = auth.service.name(),
        "Material updated"
    );

    Ok(Json(material.into()))
}

pub async fn delete_one(
    State(store): State<SharedStore>,
    auth: ApiKeyAuth,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<StatusCode> {
    let id = path_id(path)?;

    if !store.unlink(&auth.service, id).await? {
        return Err(AppError::material_not_found());
    }
    tracing::info!(id, actor = auth.service.name(), "Material deleted");

    Ok(StatusCode::NO_CONTENT)
}
