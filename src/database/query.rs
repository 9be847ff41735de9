//! Query-string parsing for list endpoints.
//!
//! `?role=admin&createdAt[gte]=2024-01-01&sort=-createdAt,name&fields=name,email&page=2&limit=10`
//!
//! Only fields present in a resource's allow-list are honoured, so the column
//! names that end up in SQL always come from compile-time constants.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

/// A queryable field: its public (JSON) name, the backing column and the SQL
/// type request values are cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    pub sql_type: &'static str,
}

impl Field {
    pub const fn new(name: &'static str, column: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            column,
            sql_type,
        }
    }

    /// Whether `value` can be cast to this field's SQL type.
    pub fn accepts(&self, value: &str) -> bool {
        match self.sql_type {
            "boolean" => matches!(value, "true" | "false"),
            "timestamptz" => {
                DateTime::parse_from_rfc3339(value).is_ok()
                    || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                    || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
            }
            "uuid" => uuid::Uuid::parse_str(value).is_ok(),
            "integer" | "bigint" => value.parse::<i64>().is_ok(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "eq" => Some(FilterOp::Eq),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: Field,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub field: Field,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    /// Public field names to keep in each returned document. `id` is always kept.
    pub fields: Option<Vec<String>>,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            fields: None,
            page: 1,
            limit: ListQuery::DEFAULT_LIMIT,
        }
    }
}

const RESERVED: &[&str] = &["page", "sort", "limit", "fields"];

impl ListQuery {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 100;
    pub const MAX_PAGE: i64 = 1_000_000;

    pub fn parse(raw: Option<&str>, allowed: &[Field]) -> Result<Self> {
        let mut query = ListQuery::default();
        let lookup = |name: &str| allowed.iter().find(|f| f.name == name).copied();

        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
            match key.as_ref() {
                "page" => {
                    query.page = value.parse::<i64>().unwrap_or(1).clamp(1, Self::MAX_PAGE);
                }
                "limit" => {
                    query.limit = value
                        .parse::<i64>()
                        .unwrap_or(Self::DEFAULT_LIMIT)
                        .clamp(1, Self::MAX_LIMIT);
                }
                "sort" => {
                    query.sort = value
                        .split(',')
                        .map(str::trim)
                        .filter_map(|part| {
                            let (name, descending) = match part.strip_prefix('-') {
                                Some(rest) => (rest, true),
                                None => (part, false),
                            };
                            lookup(name).map(|field| SortKey { field, descending })
                        })
                        .collect();
                }
                "fields" => {
                    let mut names: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|name| lookup(name).is_some())
                        .map(str::to_string)
                        .collect();
                    names.push("id".to_string());
                    query.fields = Some(names);
                }
                other => {
                    let (name, op) = match other.split_once('[') {
                        Some((name, rest)) => (name, rest.trim_end_matches(']')),
                        None => (other, ""),
                    };
                    if RESERVED.contains(&name) {
                        continue;
                    }
                    if let (Some(field), Some(op)) = (lookup(name), FilterOp::parse(op)) {
                        if !field.accepts(&value) {
                            return Err(Error::BadRequest(format!(
                                "Invalid value for {}: {}",
                                field.name, value
                            )));
                        }
                        query.filters.push(Filter {
                            field,
                            op,
                            value: value.into_owned(),
                        });
                    }
                }
            }
        }

        if query.sort.is_empty() {
            if let Some(field) = lookup("createdAt") {
                query.sort.push(SortKey {
                    field,
                    descending: true,
                });
            }
        }

        Ok(query)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}
