//! Shared Data Transfer Objects (DTOs) for API handlers.
//!
//! Every success body is wrapped in `{"data": ...}`; lists add a
//! `pagination` block next to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::store::{ListQuery, Pagination};

/// Single-item response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// List response envelope.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ListResponse<T> {
    pub fn new((data, pagination): (Vec<T>, Pagination)) -> Self {
        Self { data, pagination }
    }
}

/// Bracketed list parameters, e.g.
/// `?pagination[page]=2&pagination[count]=50&filters[name]=go&sorts[created_at]=asc`.
///
/// Unknown keys and malformed numbers are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(flatten)]
    pub raw: HashMap<String, String>,
}

impl ListParams {
    pub fn into_query(self) -> ListQuery {
        let mut query = ListQuery::default();
        for (key, value) in self.raw {
            let Some((group, field)) = bracketed(&key) else {
                continue;
            };
            match group {
                "pagination" => match field {
                    "page" => {
                        if let Ok(page) = value.parse() {
                            query.page = page;
                        }
                    }
                    "count" => {
                        if let Ok(count) = value.parse() {
                            query.count = count;
                        }
                    }
                    _ => {}
                },
                "filters" => {
                    query.filters.insert(field.to_string(), value);
                }
                "sorts" => {
                    query.sorts.insert(field.to_string(), value);
                }
                _ => {}
            }
        }
        query
    }
}

/// Split `group[field]` into its two parts.
fn bracketed(key: &str) -> Option<(&str, &str)> {
    let (group, rest) = key.split_once('[')?;
    let field = rest.strip_suffix(']')?;
    if group.is_empty() || field.is_empty() {
        return None;
    }
    Some((group, field))
}

/// Request body checks run by the `JsonBody` extractor.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn require_email(field: &str, value: &str) -> Result<()> {
    require_non_empty(field, value)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(format!("{field} must be a valid email")));
    }
    Ok(())
}

pub fn require_min_len(field: &str, value: &str, min: usize) -> Result<()> {
    if value.chars().count() < min {
        return Err(AppError::Validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        ListParams {
            raw: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_list_params_parse_brackets() {
        let query = params(&[
            ("pagination[page]", "3"),
            ("pagination[count]", "50"),
            ("filters[name]", "go"),
            ("sorts[created_at]", "asc"),
        ])
        .into_query();
        assert_eq!(query.page, 3);
        assert_eq!(query.count, 50);
        assert_eq!(query.filters.get("name").map(String::as_str), Some("go"));
        assert_eq!(query.sorts.get("created_at").map(String::as_str), Some("asc"));
    }

    #[test]
    fn test_list_params_ignore_garbage() {
        let query = params(&[
            ("pagination[page]", "abc"),
            ("page", "7"),
            ("filters[]", "x"),
            ("sorts[name", "asc"),
        ])
        .into_query();
        assert_eq!(query.page, 1);
        assert_eq!(query.count, 20);
        assert!(query.filters.is_empty());
        assert!(query.sorts.is_empty());
    }

    #[test]
    fn test_email_shape() {
        assert!(require_email("email", "a@b.co").is_ok());
        for bad in ["", "plain", "@b.co", "a@b", "a@.co", "a b@c.io"] {
            assert!(
                matches!(require_email("email", bad), Err(AppError::Validation(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn test_min_len_counts_chars() {
        assert!(require_min_len("password", "ääääää", 6).is_ok());
        assert!(require_min_len("password", "12345", 6).is_err());
    }
}
