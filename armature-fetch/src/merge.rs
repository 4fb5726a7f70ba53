//! Layered configuration merging.
//!
//! `merge_config(base, overrides)` never mutates its inputs. Each field is
//! resolved by one of two strategies:
//!
//! - **override wins**: the override value if provided, else the base value.
//!   `url`, `params`, `data` and `headers` use it, so an override headers map
//!   replaces the base map wholesale. Every other scalar field behaves the
//!   same way.
//! - **deep merge**: `auth` combines nested maps key by key.

use crate::{ParamMap, ParamValue, RequestConfig};

/// Merge `overrides` on top of `base` into a fresh configuration.
pub fn merge_config(base: &RequestConfig, overrides: &RequestConfig) -> RequestConfig {
    RequestConfig {
        url: override_wins(&base.url, &overrides.url),
        params: override_wins(&base.params, &overrides.params),
        data: override_wins(&base.data, &overrides.data),
        headers: override_wins(&base.headers, &overrides.headers),
        auth: deep_merge_value(base.auth.as_ref(), overrides.auth.as_ref()),
        method: override_wins(&base.method, &overrides.method),
        base_url: override_wins(&base.base_url, &overrides.base_url),
        timeout: override_wins(&base.timeout, &overrides.timeout),
        response_type: override_wins(&base.response_type, &overrides.response_type),
        validate_status: override_wins(&base.validate_status, &overrides.validate_status),
        params_serializer: override_wins(&base.params_serializer, &overrides.params_serializer),
        adapter: override_wins(&base.adapter, &overrides.adapter),
        cancel_token: override_wins(&base.cancel_token, &overrides.cancel_token),
    }
}

fn override_wins<T: Clone>(base: &Option<T>, overrides: &Option<T>) -> Option<T> {
    overrides.as_ref().or(base.as_ref()).cloned()
}

/// Deep-merge strategy for a single field.
///
/// A map override is merged key by key over the base; any other override
/// wins outright; without an override the base passes through.
pub fn deep_merge_value(
    base: Option<&ParamValue>,
    overrides: Option<&ParamValue>,
) -> Option<ParamValue> {
    match (base, overrides) {
        (Some(ParamValue::Map(base)), Some(ParamValue::Map(overrides))) => {
            Some(ParamValue::Map(deep_merge(&[base, overrides])))
        }
        (_, Some(value)) => Some(value.clone()),
        (base, None) => base.cloned(),
    }
}

/// Merge maps left to right; later layers win, nested maps combine.
pub fn deep_merge(layers: &[&ParamMap]) -> ParamMap {
    let mut result = ParamMap::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            let merged = match (result.get(key), value) {
                (Some(ParamValue::Map(existing)), ParamValue::Map(incoming)) => {
                    ParamValue::Map(deep_merge(&[existing, incoming]))
                }
                _ => value.clone(),
            };
            result.insert(key.clone(), merged);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Body, param_map};
    use http::Method;
    use std::time::Duration;

    fn auth(pairs: &[(&str, i64)]) -> ParamValue {
        ParamValue::Map(param_map(pairs.iter().map(|(k, v)| (*k, *v))))
    }

    #[test]
    fn test_deep_merge_auth() {
        let base = RequestConfig::new().auth(auth(&[("a", 1), ("b", 2)]));
        let overrides = RequestConfig::new().auth(auth(&[("b", 3)]));

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged.auth, Some(auth(&[("a", 1), ("b", 3)])));
    }

    #[test]
    fn test_deep_merge_nested_maps() {
        let inner_base = ParamValue::Map(param_map([("x", 1), ("y", 2)]));
        let inner_override = ParamValue::Map(param_map([("y", 20)]));
        let base = RequestConfig::new().auth(ParamValue::Map(param_map([("inner", inner_base)])));
        let overrides =
            RequestConfig::new().auth(ParamValue::Map(param_map([("inner", inner_override)])));

        let merged = merge_config(&base, &overrides).auth.unwrap();
        let inner = merged.as_map().unwrap()["inner"].as_map().unwrap();
        assert_eq!(inner["x"], ParamValue::Integer(1));
        assert_eq!(inner["y"], ParamValue::Integer(20));
    }

    #[test]
    fn test_non_map_override_wins_outright() {
        let base = RequestConfig::new().auth(auth(&[("a", 1)]));
        let overrides = RequestConfig::new().auth("token");

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged.auth, Some(ParamValue::from("token")));
    }

    #[test]
    fn test_base_auth_passes_through() {
        let base = RequestConfig::new().auth(auth(&[("a", 1)]));
        let merged = merge_config(&base, &RequestConfig::new());
        assert_eq!(merged.auth, Some(auth(&[("a", 1)])));
    }

    #[test]
    fn test_override_headers_replace_base() {
        let base = RequestConfig::new()
            .header("X-Base", "1")
            .header("X-Shared", "base");
        let overrides = RequestConfig::new().header("X-Shared", "override");

        let merged = merge_config(&base, &overrides);
        let headers = merged.headers.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["X-Shared"].as_str(), Some("override"));
    }

    #[test]
    fn test_empty_override_is_still_provided() {
        let base = RequestConfig::new().param("page", 1).url("/base");
        let overrides = RequestConfig::new().params(ParamMap::new()).url("");

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged.params, Some(ParamMap::new()));
        assert_eq!(merged.url.as_deref(), Some(""));
    }

    #[test]
    fn test_base_only_fields_copied() {
        let base = RequestConfig::defaults()
            .base_url("http://h")
            .timeout(Duration::from_secs(5));
        let overrides = RequestConfig::new()
            .url("/x")
            .method(Method::POST)
            .data(Body::Text("hi".into()));

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged.base_url.as_deref(), Some("http://h"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.method, Some(Method::POST));
        assert_eq!(merged.url.as_deref(), Some("/x"));
        assert!(merged.validate_status.is_some());
        assert!(merged.adapter.is_some());
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let base = RequestConfig::new().url("/a").auth(auth(&[("a", 1)]));
        let overrides = RequestConfig::new().url("/b").auth(auth(&[("b", 2)]));

        let _ = merge_config(&base, &overrides);
        assert_eq!(base.url.as_deref(), Some("/a"));
        assert_eq!(base.auth, Some(auth(&[("a", 1)])));
        assert_eq!(overrides.url.as_deref(), Some("/b"));
        assert_eq!(overrides.auth, Some(auth(&[("b", 2)])));
    }

    #[test]
    fn test_self_merge_is_idempotent() {
        let config = RequestConfig::new()
            .url("/x")
            .param("id", 1)
            .header("X-Id", "abc")
            .data(Body::Text("body".into()));

        let once = merge_config(&config, &config);
        let twice = merge_config(&once, &once);
        assert_eq!(once.url, twice.url);
        assert_eq!(once.params, twice.params);
        assert_eq!(once.headers, twice.headers);
        assert_eq!(once.data, twice.data);
        assert_eq!(once.url, config.url);
    }

    #[test]
    fn test_deep_merge_layers() {
        let a = param_map([("k", 1), ("only_a", 1)]);
        let b = param_map([("k", 2)]);
        let merged = deep_merge(&[&a, &b]);
        assert_eq!(merged["k"], ParamValue::Integer(2));
        assert_eq!(merged["only_a"], ParamValue::Integer(1));
    }
}
