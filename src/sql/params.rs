//! Typed bind values derived from JSON record fields and their column kinds.

use crate::config::ColumnKind;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};

pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A value bound to a PostgreSQL placeholder. The variant follows the column
/// type, so NULLs are sent with the right type too.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

impl SqlParam {
    pub fn from_json(kind: &ColumnKind, v: &Value) -> Self {
        match kind {
            ColumnKind::Serial | ColumnKind::Integer | ColumnKind::ForeignKey { .. } => SqlParam::Int(v.as_i64()),
            ColumnKind::Float => SqlParam::Float(v.as_f64()),
            ColumnKind::Text { .. } | ColumnKind::Choice(_) | ColumnKind::CreatedAt => {
                SqlParam::Text(v.as_str().map(String::from))
            }
        }
    }

    pub fn bind_to<'q>(&self, query: PgQuery<'q>) -> PgQuery<'q> {
        match self {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityKind;
    use serde_json::json;

    #[test]
    fn param_type_follows_column_kind() {
        let fk = ColumnKind::ForeignKey {
            target: EntityKind::Project,
            owner: true,
        };
        assert_eq!(SqlParam::from_json(&fk, &json!(4)), SqlParam::Int(Some(4)));
        assert_eq!(SqlParam::from_json(&ColumnKind::Float, &json!(3)), SqlParam::Float(Some(3.0)));
        assert_eq!(
            SqlParam::from_json(&ColumnKind::Choice(&["metric"]), &json!("metric")),
            SqlParam::Text(Some("metric".into()))
        );
        assert_eq!(SqlParam::from_json(&ColumnKind::Integer, &Value::Null), SqlParam::Int(None));
    }
}
