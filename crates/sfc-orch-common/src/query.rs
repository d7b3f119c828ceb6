//! Listing queries: filtering, projection, stable sort and marker pagination.
//!
//! Records are compared through their serialized JSON form, so any
//! [`Listable`] type can be filtered and sorted on any of its fields without
//! per-type boilerplate.
//!
//! Pagination works on the fully sorted collection: the page starts right
//! after the record whose id is the marker (or right before it, when walking
//! in reverse), and filters are applied while the page is collected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// A projected record.
pub type Row = Map<String, Value>;

/// Errors raised while evaluating a [`ListQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown sort key: {0}")]
    UnknownSortKey(String),

    #[error("Marker {0} not found")]
    MarkerNotFound(Uuid),

    #[error("Failed to serialize record {id}: {message}")]
    Serialization { id: Uuid, message: String },
}

/// A record type that can be listed.
pub trait Listable: Serialize {
    /// Field names a listing may sort on.
    const FIELDS: &'static [&'static str];

    /// Unique id, used as the final sort key and as the page marker.
    fn id(&self) -> Uuid;
}

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Parameters of a list operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Field name -> accepted values.
    pub filters: BTreeMap<String, Vec<Value>>,
    /// Fields to keep in each row; empty keeps all.
    pub fields: Vec<String>,
    /// Sort keys applied in order; `id` ascending always breaks ties.
    pub sorts: Vec<SortKey>,
    /// Maximum rows per page; `None` or `0` means unlimited.
    pub limit: Option<usize>,
    /// Id of the last record of the previous page.
    pub marker: Option<Uuid>,
    /// Walk backwards from the marker.
    pub page_reverse: bool,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter accepting any of `values` for `field`.
    pub fn with_filter(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.insert(field.into(), values);
        self
    }

    /// Restricts rows to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a sort key.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_marker(mut self, marker: Uuid) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.page_reverse = true;
        self
    }

    /// Evaluates the query over `records`.
    pub fn apply<'a, T, I>(&self, records: I) -> Result<Vec<Row>, QueryError>
    where
        T: Listable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for key in &self.sorts {
            if !T::FIELDS.contains(&key.field.as_str()) {
                return Err(QueryError::UnknownSortKey(key.field.clone()));
            }
        }

        let mut rows = records
            .into_iter()
            .map(|record| to_row(record).map(|row| (record.id(), row)))
            .collect::<Result<Vec<_>, _>>()?;

        rows.sort_by(|(a_id, a), (b_id, b)| self.compare(a, b).then_with(|| a_id.cmp(b_id)));

        let (before, after) = match self.marker {
            Some(marker) => {
                let pos = rows
                    .iter()
                    .position(|(id, _)| *id == marker)
                    .ok_or(QueryError::MarkerNotFound(marker))?;
                let after = rows.split_off(pos + 1);
                rows.pop();
                (rows, after)
            }
            None if self.page_reverse => (rows, Vec::new()),
            None => (Vec::new(), rows),
        };

        let limit = self.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        let page: Vec<Row> = if self.page_reverse {
            let mut page: Vec<Row> = before
                .into_iter()
                .rev()
                .filter(|(_, row)| self.matches(row))
                .take(limit)
                .map(|(_, row)| row)
                .collect();
            page.reverse();
            page
        } else {
            after
                .into_iter()
                .filter(|(_, row)| self.matches(row))
                .take(limit)
                .map(|(_, row)| row)
                .collect()
        };

        Ok(page.into_iter().map(|row| self.project(row)).collect())
    }

    fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|(field, accepted)| match row.get(field) {
            Some(Value::Array(items)) => items.iter().any(|item| accepted.contains(item)),
            Some(value) => accepted.contains(value),
            None => false,
        })
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.sorts {
            let ordering = compare_values(a.get(&key.field), b.get(&key.field));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn project(&self, row: Row) -> Row {
        if self.fields.is_empty() {
            return row;
        }
        row.into_iter()
            .filter(|(field, _)| self.fields.iter().any(|f| f == field))
            .collect()
    }
}

fn to_row<T: Listable>(record: &T) -> Result<Row, QueryError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(QueryError::Serialization {
            id: record.id(),
            message: format!("expected an object, got {}", other),
        }),
        Err(e) => Err(QueryError::Serialization {
            id: record.id(),
            message: e.to_string(),
        }),
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
