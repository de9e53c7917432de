use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, Result};

/// Lowest accepted buy price, inclusive.
pub const MIN_BUY_PRICE: f64 = 100.0;

const PRICE_MESSAGE: &str = "Material buy price cannot be less than 100.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "material_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    Fabric,
    Jeans,
    Cotton,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Fabric => "fabric",
            MaterialType::Jeans => "jeans",
            MaterialType::Cotton => "cotton",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("material_type must be one of: fabric, jeans, cotton")]
pub struct UnknownMaterialType;

impl FromStr for MaterialType {
    type Err = UnknownMaterialType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fabric" => Ok(MaterialType::Fabric),
            "jeans" => Ok(MaterialType::Jeans),
            "cotton" => Ok(MaterialType::Cotton),
            _ => Err(UnknownMaterialType),
        }
    }
}

/// Record-level rule violations. Raised by every store regardless of how the
/// write reached it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintError {
    #[error("Material code must be unique.")]
    DuplicateCode(String),

    #[error("Material buy price cannot be less than 100.")]
    PriceBelowMinimum(f64),

    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Supplier {0} does not exist or is not a supplier")]
    InvalidSupplier(i64),
}

/// Full material record as stored, joined with its supplier's display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Material {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub buy_price: f64,
    pub supplier_id: i64,
    pub supplier_name: Option<String>,
    pub created_by: String,
    pub updated_by: String,
    pub create_date: OffsetDateTime,
    pub write_date: OffsetDateTime,
}

/// JSON shape returned to API clients (no audit columns).
#[derive(Debug, Clone, Serialize)]
pub struct MaterialView {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub buy_price: f64,
    pub supplier_id: Option<i64>,
    pub supplier_name: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub create_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub write_date: Option<OffsetDateTime>,
}

impl From<Material> for MaterialView {
    fn from(m: Material) -> Self {
        Self {
            id: m.id,
            code: m.code,
            name: m.name,
            material_type: m.material_type,
            buy_price: m.buy_price,
            supplier_id: Some(m.supplier_id),
            supplier_name: m.supplier_name,
            create_date: Some(m.create_date),
            write_date: Some(m.write_date),
        }
    }
}

/// List response; `count` is the number of records in `results`.
#[derive(Debug, Serialize)]
pub struct MaterialList {
    pub count: usize,
    pub results: Vec<MaterialView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMaterial {
    pub code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub buy_price: f64,
    pub supplier_id: i64,
}

impl NewMaterial {
    /// Applies price precision and checks the record-level rules that do
    /// not need the store (uniqueness and supplier validity do).
    pub fn normalized(mut self) -> std::result::Result<Self, ConstraintError> {
        check_text("code", &self.code)?;
        check_text("name", &self.name)?;
        self.buy_price = check_price(self.buy_price)?;
        Ok(self)
    }
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub material_type: Option<MaterialType>,
    pub buy_price: Option<f64>,
    pub supplier_id: Option<i64>,
}

impl MaterialPatch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.material_type.is_none()
            && self.buy_price.is_none()
            && self.supplier_id.is_none()
    }

    /// Same rules as [`NewMaterial::normalized`], applied to the supplied
    /// fields. The stored record already satisfies them for the rest.
    pub fn normalized(mut self) -> std::result::Result<Self, ConstraintError> {
        if let Some(code) = &self.code {
            check_text("code", code)?;
        }
        if let Some(name) = &self.name {
            check_text("name", name)?;
        }
        if let Some(price) = self.buy_price {
            self.buy_price = Some(check_price(price)?);
        }
        Ok(self)
    }
}

fn check_text(field: &'static str, value: &str) -> std::result::Result<(), ConstraintError> {
    if value.trim().is_empty() {
        return Err(ConstraintError::MissingField(field));
    }
    Ok(())
}

/// Rounds to two decimals, then enforces the minimum.
fn check_price(price: f64) -> std::result::Result<f64, ConstraintError> {
    if !price.is_finite() {
        return Err(ConstraintError::MissingField("buy_price"));
    }
    let rounded = (price * 100.0).round() / 100.0;
    if rounded < MIN_BUY_PRICE {
        return Err(ConstraintError::PriceBelowMinimum(price));
    }
    Ok(rounded)
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Raw request body. Fields keep their JSON value so that type problems are
/// reported per field instead of as a parse failure, and so that an explicit
/// `null` can be told apart from an absent key.
#[derive(Debug, Default, Deserialize)]
pub struct MaterialPayload {
    #[serde(default, deserialize_with = "present")]
    pub code: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub material_type: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub buy_price: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub supplier_id: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl MaterialPayload {
    fn fields(&self) -> [(&'static str, Option<&Value>); 5] {
        [
            ("code", self.code.as_ref()),
            ("name", self.name.as_ref()),
            ("material_type", self.material_type.as_ref()),
            ("buy_price", self.buy_price.as_ref()),
            ("supplier_id", self.supplier_id.as_ref()),
        ]
    }

    /// Checks every supplied field. Fields listed in `skip` were already
    /// reported.
    fn check_supplied(&self, errors: &mut ValidationErrors, skip: &[&'static str]) {
        for (field, value) in self.fields() {
            let Some(value) = value else { continue };
            if skip.contains(&field) {
                continue;
            }
            if let Some(err) = check_value(field, value) {
                errors.add(field, err);
            }
        }
    }
}

fn check_value(field: &'static str, value: &Value) -> Option<ValidationError> {
    match field {
        "code" | "name" => text_of(value)
            .is_none()
            .then(|| field_error("text", "must be a non-empty string")),
        "material_type" => type_of(value)
            .is_none()
            .then(|| field_error("choice", "must be one of: fabric, jeans, cotton")),
        "buy_price" => match price_of(value) {
            None => Some(field_error("number", "must be a number")),
            Some(p) if p < MIN_BUY_PRICE => Some(field_error("min_price", PRICE_MESSAGE)),
            Some(_) => None,
        },
        "supplier_id" => supplier_of(value)
            .is_none()
            .then(|| field_error("integer", "must be an integer")),
        _ => None,
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn text_of(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn type_of(value: &Value) -> Option<MaterialType> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn price_of(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    price.is_finite().then_some(price)
}

/// Integral ids may arrive as `7`, `7.0` or `"7"`.
fn supplier_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Creation body: all five fields are mandatory.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct CreateMaterialRequest(pub MaterialPayload);

impl Validate for CreateMaterialRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut missing = Vec::new();
        for (field, value) in self.0.fields() {
            if is_missing(value) {
                errors.add(field, field_error("required", "is required"));
                missing.push(field);
            }
        }
        self.0.check_supplied(&mut errors, &missing);

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl CreateMaterialRequest {
    /// Converts a validated body into model input.
    pub fn into_new_material(self) -> Result<NewMaterial> {
        let p = self.0;
        let code = p.code.as_ref().and_then(text_of);
        let name = p.name.as_ref().and_then(text_of);
        let material_type = p.material_type.as_ref().and_then(type_of);
        let buy_price = p.buy_price.as_ref().and_then(price_of);
        let supplier_id = p.supplier_id.as_ref().and_then(supplier_of);

        match (code, name, material_type, buy_price, supplier_id) {
            (Some(code), Some(name), Some(material_type), Some(buy_price), Some(supplier_id)) => {
                Ok(NewMaterial {
                    code,
                    name,
                    material_type,
                    buy_price,
                    supplier_id,
                })
            }
            _ => Err(AppError::BadRequest(
                "Missing required fields: code, name, material_type, buy_price, supplier_id"
                    .into(),
            )),
        }
    }
}

/// Update body: any subset of the fields; only supplied ones are checked.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct UpdateMaterialRequest(pub MaterialPayload);

impl Validate for UpdateMaterialRequest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.0.check_supplied(&mut errors, &[]);

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl UpdateMaterialRequest {
    pub fn into_patch(self) -> Result<MaterialPatch> {
        let p = self.0;
        Ok(MaterialPatch {
            code: convert(p.code, "code", text_of)?,
            name: convert(p.name, "name", text_of)?,
            material_type: convert(p.material_type, "material_type", type_of)?,
            buy_price: convert(p.buy_price, "buy_price", price_of)?,
            supplier_id: convert(p.supplier_id, "supplier_id", supplier_of)?,
        })
    }
}

fn convert<T>(
    value: Option<Value>,
    field: &str,
    parse: fn(&Value) -> Option<T>,
) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(v) => parse(&v)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid value for {}", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_body(v: Value) -> CreateMaterialRequest {
        serde_json::from_value(v).unwrap()
    }

    fn update_body(v: Value) -> UpdateMaterialRequest {
        serde_json::from_value(v).unwrap()
    }

    fn valid() -> Value {
        json!({
            "code": "MAT-001",
            "name": "Kain Fabrik",
            "material_type": "fabric",
            "buy_price": 150.0,
            "supplier_id": 7,
        })
    }

    #[test]
    fn material_type_parses_only_known_values() {
        assert_eq!("jeans".parse::<MaterialType>().unwrap(), MaterialType::Jeans);
        assert_eq!(MaterialType::Cotton.to_string(), "cotton");
        assert!("Jeans".parse::<MaterialType>().is_err());
        assert!("silk".parse::<MaterialType>().is_err());
    }

    #[test]
    fn create_accepts_complete_body() {
        let req = create_body(valid());
        assert!(req.validate().is_ok());
        let new = req.into_new_material().unwrap();
        assert_eq!(new.code, "MAT-001");
        assert_eq!(new.material_type, MaterialType::Fabric);
        assert_eq!(new.buy_price, 150.0);
        assert_eq!(new.supplier_id, 7);
    }

    #[test]
    fn create_accepts_numeric_strings() {
        let mut body = valid();
        body["buy_price"] = json!("120.5");
        body["supplier_id"] = json!("7");
        let new = create_body(body).into_new_material().unwrap();
        assert_eq!(new.buy_price, 120.5);
        assert_eq!(new.supplier_id, 7);
    }

    #[test]
    fn supplier_id_accepts_whole_floats_only() {
        let mut body = valid();
        body["supplier_id"] = json!(7.0);
        let new = create_body(body).into_new_material().unwrap();
        assert_eq!(new.supplier_id, 7);

        let mut body = valid();
        body["supplier_id"] = json!(7.5);
        let errors = create_body(body).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("supplier_id"));
    }

    #[test]
    fn create_reports_every_missing_field() {
        let req = create_body(json!({ "code": "", "material_type": "jeans", "buy_price": null }));
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["code", "name", "buy_price", "supplier_id"] {
            assert!(fields.contains_key(field), "{} should be reported", field);
        }
        assert!(!fields.contains_key("material_type"));
    }

    #[test]
    fn create_rejects_price_below_minimum() {
        let mut body = valid();
        body["buy_price"] = json!(50.0);
        let errors = create_body(body).validate().unwrap_err();
        let price_errors = errors.field_errors()["buy_price"];
        assert_eq!(price_errors[0].code, "min_price");
    }

    #[test]
    fn create_rejects_unknown_type_and_bad_supplier() {
        let mut body = valid();
        body["material_type"] = json!("silk");
        body["supplier_id"] = json!("abc");
        let errors = create_body(body).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("material_type"));
        assert!(fields.contains_key("supplier_id"));
    }

    #[test]
    fn update_checks_only_supplied_fields() {
        let req = update_body(json!({ "buy_price": 220.0, "material_type": "jeans" }));
        assert!(req.validate().is_ok());
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.buy_price, Some(220.0));
        assert_eq!(patch.material_type, Some(MaterialType::Jeans));
        assert!(patch.code.is_none());
        assert!(patch.supplier_id.is_none());
    }

    #[test]
    fn update_rejects_explicit_null_and_low_price() {
        assert!(update_body(json!({ "name": null })).validate().is_err());
        assert!(update_body(json!({ "buy_price": 10.0 })).validate().is_err());
        assert!(update_body(json!({ "buy_price": "cheap" })).validate().is_err());
    }

    #[test]
    fn empty_update_is_valid_and_empty() {
        let req = update_body(json!({}));
        assert!(req.validate().is_ok());
        assert!(req.into_patch().unwrap().is_empty());
    }

    #[test]
    fn model_rules_hold_without_the_api() {
        let new = NewMaterial {
            code: "M-1".into(),
            name: "Denim".into(),
            material_type: MaterialType::Jeans,
            buy_price: 99.99,
            supplier_id: 1,
        };
        assert_eq!(
            new.clone().normalized(),
            Err(ConstraintError::PriceBelowMinimum(99.99))
        );

        let blank = NewMaterial {
            name: "  ".into(),
            buy_price: 100.0,
            ..new
        };
        assert_eq!(blank.normalized(), Err(ConstraintError::MissingField("name")));
    }

    #[test]
    fn price_is_rounded_to_cents() {
        let patch = MaterialPatch {
            buy_price: Some(123.456),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(patch.buy_price, Some(123.46));
    }

    #[test]
    fn view_serializes_contract_keys() {
        let now = OffsetDateTime::now_utc();
        let view = MaterialView::from(Material {
            id: 3,
            code: "API-001".into(),
            name: "Kain API".into(),
            material_type: MaterialType::Fabric,
            buy_price: 150.0,
            supplier_id: 9,
            supplier_name: Some("API Supplier".into()),
            created_by: "svc".into(),
            updated_by: "svc".into(),
            create_date: now,
            write_date: now,
        });
        let v = serde_json::to_value(&view).unwrap();
        assert_eq!(v["material_type"], "fabric");
        assert_eq!(v["supplier_id"], 9);
        assert_eq!(v["supplier_name"], "API Supplier");
        assert!(v["create_date"].is_string());
        assert!(v.get("created_by").is_none());
    }
}
