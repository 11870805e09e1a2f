//! Payload validation against the schema mapping table. Collects every field
//! error before failing, and returns only the writable fields.

use crate::config::{ColumnDef, ColumnKind, EntityDef};
use crate::error::{AppError, FieldErrors};
use crate::store::{Record, REQUIRED_MESSAGE};
use serde_json::Value;

const UNKNOWN_FIELD: &str = "Unknown field.";
const NULL_MESSAGE: &str = "This field may not be null.";
const BLANK_MESSAGE: &str = "This field may not be blank.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// PUT: every writable field must be supplied.
    Replace,
    /// PATCH: only supplied fields are checked.
    Partial,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a request body. Read-only fields are dropped, unknown fields rejected.
    pub fn validate(entity: &EntityDef, body: Value, mode: WriteMode) -> Result<Record, AppError> {
        let Value::Object(body) = body else {
            return Err(AppError::BadRequest("request body must be a JSON object".into()));
        };
        let mut errors = FieldErrors::new();
        let mut clean = Record::new();
        for (key, value) in body {
            match entity.column(&key) {
                None => errors.add(&key, UNKNOWN_FIELD),
                Some(col) if col.is_read_only() => {}
                Some(col) => match check_field(col, &value) {
                    Ok(()) => {
                        clean.insert(key, value);
                    }
                    Err(message) => errors.add(&key, message),
                },
            }
        }
        if mode != WriteMode::Partial {
            for col in entity.writable_columns() {
                if !clean.contains_key(col.name) && errors.get(col.name).is_none() {
                    errors.add(col.name, REQUIRED_MESSAGE);
                }
            }
        }
        errors.into_result()?;
        Ok(clean)
    }
}

fn check_field(col: &ColumnDef, v: &Value) -> Result<(), String> {
    if v.is_null() {
        return Err(NULL_MESSAGE.into());
    }
    match &col.kind {
        ColumnKind::Integer => match v.as_i64() {
            Some(_) => Ok(()),
            None => Err("A valid integer is required.".into()),
        },
        ColumnKind::Float => match v.is_number() {
            true => Ok(()),
            false => Err("A valid number is required.".into()),
        },
        ColumnKind::Text { max_length } => {
            let s = v.as_str().ok_or("Not a valid string.")?;
            if s.trim().is_empty() {
                return Err(BLANK_MESSAGE.into());
            }
            if s.chars().count() > *max_length as usize {
                return Err(format!("Ensure this field has no more than {} characters.", max_length));
            }
            Ok(())
        }
        ColumnKind::Choice(choices) => match v.as_str() {
            Some(s) if choices.contains(&s) => Ok(()),
            Some("") => Err(BLANK_MESSAGE.into()),
            Some(s) => Err(format!("\"{}\" is not a valid choice.", s)),
            None => Err(format!("\"{}\" is not a valid choice.", v)),
        },
        ColumnKind::ForeignKey { .. } => match v.as_i64() {
            Some(_) => Ok(()),
            None => Err(format!("Incorrect type. Expected pk value, received {}.", json_type(v))),
        },
        ColumnKind::Serial | ColumnKind::CreatedAt => Ok(()),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "float",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
