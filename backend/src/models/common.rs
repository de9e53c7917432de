use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::material::MaterialType;

pub const DEFAULT_LIST_LIMIT: i64 = 80;

/// Raw list query. Values stay strings so malformed numbers come back as a
/// JSON 400 instead of an extractor rejection. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct MaterialListParams {
    pub material_type: Option<String>,
    pub supplier_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Sort order for material searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MaterialOrder {
    /// Model default: code, then name.
    #[default]
    CodeName,
    /// Newest first, used by the API listing.
    IdDesc,
}

impl MaterialOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            MaterialOrder::CodeName => "m.code ASC, m.name ASC, m.id ASC",
            MaterialOrder::IdDesc => "m.id DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFilter {
    pub material_type: Option<MaterialType>,
    pub supplier_id: Option<i64>,
    /// `None` returns every match.
    pub limit: Option<i64>,
    pub offset: i64,
    pub order: MaterialOrder,
}

impl Default for MaterialFilter {
    fn default() -> Self {
        Self {
            material_type: None,
            supplier_id: None,
            limit: Some(DEFAULT_LIST_LIMIT),
            offset: 0,
            order: MaterialOrder::default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl MaterialListParams {
    /// `limit` defaults to 80; an explicit `limit=0` lifts the limit.
    pub fn into_filter(self) -> Result<MaterialFilter> {
        let material_type = non_empty(&self.material_type)
            .map(|t| t.parse::<MaterialType>())
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let supplier_id = non_empty(&self.supplier_id)
            .map(|s| s.parse::<i64>())
            .transpose()
            .map_err(|_| AppError::BadRequest("supplier_id must be integer".into()))?;

        let page = |v: &Option<String>, default: i64| -> Result<i64> {
            match non_empty(v) {
                None => Ok(default),
                Some(s) => s
                    .parse::<i64>()
                    .map_err(|_| AppError::BadRequest("limit/offset must be integers".into())),
            }
        };
        let limit = page(&self.limit, DEFAULT_LIST_LIMIT)?;
        let offset = page(&self.offset, 0)?;
        if limit < 0 || offset < 0 {
            return Err(AppError::BadRequest(
                "limit/offset must be non-negative integers".into(),
            ));
        }

        Ok(MaterialFilter {
            material_type,
            supplier_id,
            limit: (limit > 0).then_some(limit),
            offset,
            order: MaterialOrder::IdDesc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(t: Option<&str>, s: Option<&str>, l: Option<&str>, o: Option<&str>) -> MaterialListParams {
        MaterialListParams {
            material_type: t.map(String::from),
            supplier_id: s.map(String::from),
            limit: l.map(String::from),
            offset: o.map(String::from),
        }
    }

    #[test]
    fn defaults_apply_when_absent_or_empty() {
        let f = params(None, Some(""), Some(""), None).into_filter().unwrap();
        assert_eq!(f.limit, Some(80));
        assert_eq!(f.offset, 0);
        assert_eq!(f.supplier_id, None);
        assert_eq!(f.order, MaterialOrder::IdDesc);
    }

    #[test]
    fn parses_all_filters() {
        let f = params(Some("jeans"), Some("12"), Some("5"), Some("10"))
            .into_filter()
            .unwrap();
        assert_eq!(f.material_type, Some(MaterialType::Jeans));
        assert_eq!(f.supplier_id, Some(12));
        assert_eq!((f.limit, f.offset), (Some(5), 10));
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let f = params(None, None, Some("0"), None).into_filter().unwrap();
        assert_eq!(f.limit, None);
    }

    #[test]
    fn malformed_numbers_are_bad_requests() {
        assert!(matches!(
            params(None, Some("x"), None, None).into_filter(),
            Err(AppError::BadRequest(msg)) if msg == "supplier_id must be integer"
        ));
        assert!(matches!(
            params(None, None, Some("ten"), None).into_filter(),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            params(None, None, None, Some("-1")).into_filter(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            params(Some("silk"), None, None, None).into_filter(),
            Err(AppError::BadRequest(_))
        ));
    }
}
