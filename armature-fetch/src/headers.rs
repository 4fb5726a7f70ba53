//! Header flattening.

use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::config::HEADER_SECTIONS;
use crate::{ErrorCode, FetchError, ParamMap, ParamValue, Result};

/// Collapse sectioned headers into one flat map for `method`.
///
/// Layers apply in order `common`, then the section named after the
/// lower-cased method, then the top level. A later layer replaces an earlier
/// header of the same name, compared case-insensitively. Section keys never
/// appear in the output.
pub fn flatten_headers(headers: Option<&ParamMap>, method: &Method) -> Option<ParamMap> {
    let headers = headers?;
    let method = method.as_str().to_ascii_lowercase();

    let layers = [
        headers.get("common").and_then(ParamValue::as_map),
        headers.get(&method).and_then(ParamValue::as_map),
        Some(headers),
    ];

    let mut flat = ParamMap::new();
    for layer in layers.into_iter().flatten() {
        for (name, value) in layer {
            if is_section(name) {
                continue;
            }
            flat.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            flat.insert(name.clone(), value.clone());
        }
    }
    Some(flat)
}

fn is_section(name: &str) -> bool {
    HEADER_SECTIONS.contains(&name)
}

/// Convert a flat header map into an [`HeaderMap`].
///
/// Lists become repeated headers; every other value is rendered as a string.
pub fn to_header_map(headers: &ParamMap) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            FetchError::new(format!("Invalid header name {name}"), ErrorCode::BadOptionValue)
                .with_source(e)
        })?;
        match value {
            ParamValue::List(values) => {
                for value in values {
                    map.append(header_name.clone(), header_value(name, value)?);
                }
            }
            value => {
                map.insert(header_name, header_value(name, value)?);
            }
        }
    }
    Ok(map)
}

fn header_value(name: &str, value: &ParamValue) -> Result<HeaderValue> {
    HeaderValue::from_str(&value.to_plain_string()).map_err(|e| {
        FetchError::new(
            format!("Invalid value for header {name}"),
            ErrorCode::BadOptionValue,
        )
        .with_source(e)
    })
}

/// Check whether `headers` already carries `name`, case-insensitively.
pub fn has_header(headers: &ParamMap, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}
