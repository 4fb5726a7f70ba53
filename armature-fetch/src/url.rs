//! URL building helpers.

use crate::{ParamMap, ParamValue, ParamsSerializer};

/// Check whether `url` carries a scheme (`http://...`) or is protocol-relative (`//...`).
pub fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    let Some(end) = url.find("://") else {
        return false;
    };
    let mut scheme = url[..end].chars();
    scheme.next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join `base` and `relative` with exactly one `/`.
pub fn combine_urls(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Append serialized `params` to `url`.
///
/// Lists repeat the key with a `[]` suffix, dates render as ISO-8601 and
/// nested maps as JSON. A custom `serializer` replaces all of that.
///
/// ```
/// use armature_fetch::{build_url, param_map, ParamValue};
///
/// let params = param_map([("ids", ParamValue::from(vec![1, 2]))]);
/// assert_eq!(build_url("/api", Some(&params), None), "/api?ids[]=1&ids[]=2");
/// ```
pub fn build_url(
    url: &str,
    params: Option<&ParamMap>,
    serializer: Option<&ParamsSerializer>,
) -> String {
    let Some(params) = params else {
        return url.to_string();
    };

    let serialized = match serializer {
        Some(serializer) => serializer.serialize(params),
        None => serialize_params(params),
    };

    if serialized.is_empty() {
        return url.to_string();
    }
    // Drop any fragment before appending params.
    let url = url.split_once('#').map_or(url, |(head, _)| head);
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{serialized}")
}

fn serialize_params(params: &ParamMap) -> String {
    let mut parts = Vec::new();
    for (key, value) in params {
        match value {
            ParamValue::List(values) => {
                let key = encode(&format!("{key}[]"));
                for value in values {
                    parts.push(format!("{key}={}", encode(&value.to_plain_string())));
                }
            }
            value => parts.push(format!("{}={}", encode(key), encode(&value.to_plain_string()))),
        }
    }
    parts.join("&")
}

// Form encoding with a few URL-safe characters kept readable.
fn encode(value: &str) -> String {
    ::url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%40", "@")
        .replace("%3A", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%5B", "[")
        .replace("%5D", "]")
        .replace("%7E", "~")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_map;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("custom-scheme+v1.0://host"));
        assert!(is_absolute_url("//example.com"));
        assert!(!is_absolute_url("/path/to/resource"));
        assert!(!is_absolute_url("123://host"));
        assert!(!is_absolute_url("/redirect?to=http://other"));
    }

    #[test]
    fn test_combine_urls() {
        assert_eq!(combine_urls("http://h", "/x"), "http://h/x");
        assert_eq!(combine_urls("http://h///", "//x"), "http://h/x");
        assert_eq!(combine_urls("http://h/api", "users"), "http://h/api/users");
        assert_eq!(combine_urls("http://h/", ""), "http://h/");
    }

    #[test]
    fn test_build_url_scalars() {
        let params = param_map([("id", ParamValue::from(123)), ("name", "test".into())]);
        assert_eq!(build_url("/api", Some(&params), None), "/api?id=123&name=test");
    }

    #[test]
    fn test_build_url_without_params() {
        assert_eq!(build_url("/api", None, None), "/api");
        assert_eq!(build_url("/api", Some(&ParamMap::new()), None), "/api");
    }

    #[test]
    fn test_build_url_existing_query() {
        let params = param_map([("page", 1)]);
        assert_eq!(
            build_url("/api?sort=desc", Some(&params), None),
            "/api?sort=desc&page=1"
        );
    }

    #[test]
    fn test_build_url_drops_fragment() {
        let params = param_map([("a", 1)]);
        assert_eq!(build_url("/x#top", Some(&params), None), "/x?a=1");
    }

    #[test]
    fn test_build_url_date_and_object() {
        let date = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let params = param_map([("date", ParamValue::from(date))]);
        assert_eq!(
            build_url("/api", Some(&params), None),
            "/api?date=2023-01-01T00:00:00.000Z"
        );

        let obj = ParamValue::Map(param_map([("a", 1)]));
        let params = param_map([("obj", obj)]);
        assert_eq!(
            build_url("/api", Some(&params), None),
            "/api?obj=%7B%22a%22:1%7D"
        );

        let nested = ParamValue::Map(param_map([("d", ParamValue::from(date))]));
        let params = param_map([("o", nested)]);
        assert_eq!(
            build_url("/a", Some(&params), None),
            "/a?o=%7B%22d%22:%222023-01-01T00:00:00.000Z%22%7D"
        );
    }

    #[test]
    fn test_build_url_encoding() {
        let params = param_map([("q", "a b@c,d$")]);
        assert_eq!(build_url("/s", Some(&params), None), "/s?q=a+b@c,d$");

        let params = param_map([("q", "x&y=z")]);
        assert_eq!(build_url("/s", Some(&params), None), "/s?q=x%26y%3Dz");

        let params = param_map([("q", "~it's (ok)!")]);
        assert_eq!(build_url("/s", Some(&params), None), "/s?q=~it's+(ok)!");
    }

    #[test]
    fn test_build_url_custom_serializer() {
        let serializer = ParamsSerializer::new(|_| "custom=true".to_string());
        let params = param_map([("a", 1)]);
        assert_eq!(
            build_url("/api", Some(&params), Some(&serializer)),
            "/api?custom=true"
        );
    }
}
