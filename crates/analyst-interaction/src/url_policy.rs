//! Local-only URL policy for backend endpoints.
//!
//! The backend URL is operator-editable configuration, so the direct adapter
//! refuses to talk to anything that is not this machine. A URL passes the
//! static check when it is http(s) and its host is `localhost` or a
//! loopback/unspecified IP literal, or any other name (to be confirmed by
//! resolution). Before each request the host is resolved and every address
//! must be loopback.

use analyst_core::{AnalystError, Result};
use std::net::IpAddr;
use url::{Host, Url};

/// Loopback or unspecified (`0.0.0.0`, `::`) addresses.
pub fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_loopback() || ipv4.is_unspecified(),
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Parses a backend URL and applies the static part of the policy.
///
/// IP literals must be local. Names other than `localhost` are accepted here
/// and checked by [`ensure_resolves_locally`].
pub fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AnalystError::unconfigured(format!("Invalid backend URL '{}': {}", raw.trim(), e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AnalystError::unconfigured(format!(
            "Backend URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    match url.host() {
        None => Err(AnalystError::unconfigured("Backend URL has no host")),
        Some(Host::Ipv4(ip)) if !is_local_ip(IpAddr::V4(ip)) => Err(not_local(&ip.to_string())),
        Some(Host::Ipv6(ip)) if !is_local_ip(IpAddr::V6(ip)) => Err(not_local(&ip.to_string())),
        Some(_) => Ok(url),
    }
}

/// Whether `raw` passes the static policy.
pub fn is_allowed_backend_url(raw: &str) -> bool {
    parse_backend_url(raw).is_ok()
}

/// Resolves the URL's host and requires every address to be local.
pub async fn ensure_resolves_locally(url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| AnalystError::unconfigured("Backend URL has no host"))?;
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let lookup_host = host.trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<_> = tokio::net::lookup_host((lookup_host, port))
        .await
        .map_err(|e| AnalystError::unconfigured(format!("Cannot resolve backend host '{}': {}", host, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(AnalystError::unconfigured(format!(
            "Backend host '{}' resolved to no addresses",
            host
        )));
    }
    if let Some(addr) = addrs.iter().find(|addr| !is_local_ip(addr.ip())) {
        tracing::warn!(host, address = %addr.ip(), "Refusing non-local backend host");
        return Err(not_local(&format!("{} ({})", host, addr.ip())));
    }
    Ok(())
}

fn not_local(host: &str) -> AnalystError {
    AnalystError::unconfigured(format!(
        "Backend host {} is not local; only localhost backends are allowed",
        host
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ips() {
        assert!(is_local_ip("127.0.0.1".parse().unwrap()));
        assert!(is_local_ip("127.10.0.3".parse().unwrap()));
        assert!(is_local_ip("0.0.0.0".parse().unwrap()));
        assert!(is_local_ip("::1".parse().unwrap()));
        assert!(is_local_ip("::ffff:127.0.0.1".parse().unwrap()));

        assert!(!is_local_ip("10.0.0.1".parse().unwrap()));
        assert!(!is_local_ip("192.168.1.20".parse().unwrap()));
        assert!(!is_local_ip("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_static_policy() {
        assert!(is_allowed_backend_url("http://localhost:11434/"));
        assert!(is_allowed_backend_url("https://127.0.0.1:8443/api/generate"));
        assert!(is_allowed_backend_url("http://[::1]:11434"));

        assert!(!is_allowed_backend_url("http://8.8.8.8/"));
        assert!(!is_allowed_backend_url("ftp://localhost/"));
        assert!(!is_allowed_backend_url("localhost:11434"));
        assert!(!is_allowed_backend_url(""));
    }

    #[test]
    fn test_refusal_is_unconfigured() {
        let err = parse_backend_url("http://192.168.0.9:11434").unwrap_err();
        assert_eq!(err.kind(), analyst_core::ErrorKind::BackendUnconfigured);
    }

    #[tokio::test]
    async fn test_literal_loopback_resolves_locally() {
        let url = Url::parse("http://127.0.0.1:11434/").unwrap();
        assert!(ensure_resolves_locally(&url).await.is_ok());

        let url = Url::parse("http://[::1]:11434/").unwrap();
        assert!(ensure_resolves_locally(&url).await.is_ok());
    }
}
