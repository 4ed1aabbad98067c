//! Control-plane URL resolution.
//!
//! The configured endpoint may be a bare host, a host with scheme, or a full
//! URL copied from another integration. Every outbound call goes through
//! [`resolve`] so all of them agree on the base.

const HTTP: &str = "http://";
const HTTPS: &str = "https://";

/// Build a fully qualified URL for `path` on the configured `endpoint`.
///
/// - An explicit scheme on `endpoint` wins over `use_ssl`.
/// - Any path already present on `endpoint` is replaced by `path`, never merged.
/// - An empty `path` yields the base without a trailing slash.
pub fn resolve(endpoint: &str, path: &str, use_ssl: bool) -> String {
    match split_scheme(endpoint) {
        Some((scheme, rest)) => format!("{}{}{}", scheme, authority(rest), path),
        None => {
            let scheme = if use_ssl { HTTPS } else { HTTP };
            let host = endpoint.strip_suffix('/').unwrap_or(endpoint);
            format!("{}{}{}", scheme, host, path)
        }
    }
}

/// Host (and port) of `endpoint`, without scheme or path. Empty when the
/// endpoint names no host, e.g. `"https://"`.
pub fn host(endpoint: &str) -> &str {
    match split_scheme(endpoint) {
        Some((_, rest)) => authority(rest),
        None => authority(endpoint),
    }
}

fn split_scheme(endpoint: &str) -> Option<(&'static str, &str)> {
    [HTTPS, HTTP]
        .into_iter()
        .find_map(|scheme| endpoint.strip_prefix(scheme).map(|rest| (scheme, rest)))
}

fn authority(rest: &str) -> &str {
    match rest.find('/') {
        Some(idx) => &rest[..idx],
        None => rest,
    }
}
