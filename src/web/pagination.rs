//! Query-string parsing for the list endpoints: pagination plus the repeated
//! `state` filter parameter.

use super::errors::ApiError;
use crate::storage::Page;

/// Parsed list-endpoint parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: Page,
    pub states: Vec<String>,
}

/// Parse `page`, `page_size` and repeated `state` parameters from a raw query
/// string. Missing values default to page 1 with `default_max_page` records;
/// a requested page size is capped at `default_max_page`. Malformed numbers
/// are a bad request.
pub fn parse_list_params(
    query: Option<&str>,
    default_max_page: u32,
) -> Result<ListParams, ApiError> {
    let mut page: u32 = 1;
    let mut page_size: u32 = default_max_page;
    let mut states = Vec::new();

    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "page" => {
                page = value.parse().map_err(|_| {
                    ApiError::bad_request(format!("invalid page parameter: {value}"))
                })?;
                if page == 0 {
                    return Err(ApiError::bad_request("page parameter must be positive"));
                }
            }
            "page_size" => {
                page_size = value.parse().map_err(|_| {
                    ApiError::bad_request(format!("invalid page_size parameter: {value}"))
                })?;
                if page_size == 0 {
                    return Err(ApiError::bad_request("page_size parameter must be positive"));
                }
                page_size = page_size.min(default_max_page);
            }
            "state" => states.push(value.into_owned()),
            _ => {}
        }
    }

    Ok(ListParams {
        page: Page { page, page_size },
        states,
    })
}
