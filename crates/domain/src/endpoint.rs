//! Outbound URL safety gate.
//!
//! Every provider call and every remote config fetch passes its URL through
//! [`EndpointValidator::validate`] before any network attempt. Checks are
//! purely syntactic; hostnames are not resolved.

use polychat_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Hostnames refused unless loopback is permitted.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "ip6-localhost", "instance-data"];

/// Reasons an endpoint was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Input could not be parsed as an absolute URL.
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },
    /// Scheme other than http/https.
    UnsupportedScheme {
        /// Scheme that was found.
        scheme: String,
    },
    /// URL carries no host.
    MissingHost,
    /// Host is loopback or in a private range.
    PrivateHost {
        /// Offending host as written in the URL.
        host: String,
    },
}

impl EndpointError {
    /// Stable code shared by every variant.
    pub fn error_code() -> ErrorCode {
        ErrorCode::new("provider", "invalid_endpoint")
    }
}

impl fmt::Display for EndpointError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(formatter, "endpoint is not a valid URL: {reason}"),
            Self::UnsupportedScheme { scheme } => {
                write!(formatter, "endpoint scheme `{scheme}` is not http or https")
            },
            Self::MissingHost => formatter.write_str("endpoint has no host"),
            Self::PrivateHost { host } => {
                write!(formatter, "endpoint host `{host}` is loopback or private")
            },
        }
    }
}

impl std::error::Error for EndpointError {}

impl From<EndpointError> for ErrorEnvelope {
    fn from(error: EndpointError) -> Self {
        let envelope = Self::expected(EndpointError::error_code(), error.to_string());
        match error {
            EndpointError::Malformed { .. } => envelope.with_metadata("reason", "malformed"),
            EndpointError::UnsupportedScheme { scheme } => envelope
                .with_metadata("reason", "scheme")
                .with_metadata("scheme", scheme),
            EndpointError::MissingHost => envelope.with_metadata("reason", "missing_host"),
            EndpointError::PrivateHost { host } => envelope
                .with_metadata("reason", "private_host")
                .with_metadata("host", host),
        }
    }
}

/// Validates outbound URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointValidator {
    allow_loopback: bool,
}

impl EndpointValidator {
    /// Validator that refuses loopback and private hosts.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_loopback: false,
        }
    }

    /// Validator with an explicit loopback policy.
    #[must_use]
    pub const fn new(allow_loopback: bool) -> Self {
        Self { allow_loopback }
    }

    /// Returns true when loopback/private hosts are permitted.
    #[must_use]
    pub const fn allows_loopback(&self) -> bool {
        self.allow_loopback
    }

    /// Validate and parse an endpoint.
    pub fn validate(&self, raw: &str) -> Result<Url, EndpointError> {
        validate_endpoint(raw, self.allow_loopback)
    }
}

/// Validate an endpoint URL, returning the parsed form.
///
/// Only `http` and `https` are accepted. Unless `allow_loopback` is set,
/// loopback, private-range and link-local hosts are refused.
pub fn validate_endpoint(raw: &str, allow_loopback: bool) -> Result<Url, EndpointError> {
    let url = Url::parse(raw.trim()).map_err(|error| EndpointError::Malformed {
        reason: error.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {},
        other => {
            return Err(EndpointError::UnsupportedScheme {
                scheme: other.to_string(),
            });
        },
    }

    let host = url.host().ok_or(EndpointError::MissingHost)?;
    if !allow_loopback && is_restricted_host(&host) {
        return Err(EndpointError::PrivateHost {
            host: host.to_string(),
        });
    }

    Ok(url)
}

fn is_restricted_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            BLOCKED_HOSTNAMES.contains(&name.as_str()) || name.ends_with(".localhost")
        },
        Host::Ipv4(ip) => is_restricted_v4(*ip),
        Host::Ipv6(ip) => is_restricted_v6(*ip),
    }
}

const fn is_restricted_v4(ip: Ipv4Addr) -> bool {
    matches!(
        ip.octets(),
        [127 | 10 | 172 | 0, ..] | [192, 168, ..] | [169, 254, ..]
    )
}

fn is_restricted_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_restricted_v4(mapped);
    }
    let head = ip.segments().first().copied().unwrap_or(0);
    ip.is_loopback() || ip.is_unspecified() || (head & 0xfe00) == 0xfc00 || (head & 0xffc0) == 0xfe80
}

/// Returns true when `ip` would be refused without the loopback allowance.
#[must_use]
pub fn is_restricted_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_restricted_v4(v4),
        IpAddr::V6(v6) => is_restricted_v6(v6),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes() {
        let error = validate_endpoint("ftp://host/x", true).err();
        assert_eq!(
            error,
            Some(EndpointError::UnsupportedScheme {
                scheme: "ftp".to_string()
            })
        );
        assert!(validate_endpoint("file:///etc/passwd", true).is_err());
    }

    #[test]
    fn loopback_requires_explicit_permission() {
        assert!(matches!(
            validate_endpoint("http://127.0.0.1/x", false),
            Err(EndpointError::PrivateHost { .. })
        ));
        assert!(validate_endpoint("http://127.0.0.1/x", true).is_ok());
        assert!(validate_endpoint("http://localhost:8080/v1", false).is_err());
        assert!(validate_endpoint("http://[::1]:8080/v1", false).is_err());
    }

    #[test]
    fn private_ranges_are_refused() {
        for raw in [
            "http://10.0.0.5/v1",
            "http://172.16.0.1/v1",
            "http://172.40.1.1/v1",
            "https://192.168.1.20/v1",
            "http://169.254.169.254/latest",
            "http://0.0.0.0/",
            "http://[fd00::1]/v1",
        ] {
            assert!(validate_endpoint(raw, false).is_err(), "{raw} should be refused");
        }
    }

    #[test]
    fn public_https_is_always_accepted() {
        for allow in [false, true] {
            let url = validate_endpoint("https://api.example.com/x", allow);
            assert!(matches!(url, Ok(ref parsed) if parsed.host_str() == Some("api.example.com")));
        }
    }

    #[test]
    fn malformed_urls_use_the_same_code() {
        let error = validate_endpoint("not a url", false).err();
        assert!(matches!(error, Some(EndpointError::Malformed { .. })));

        let envelope = error.map(ErrorEnvelope::from);
        assert!(matches!(
            envelope,
            Some(ref env) if env.code == EndpointError::error_code()
        ));
    }

    #[test]
    fn validator_carries_policy() {
        assert!(EndpointValidator::strict().validate("http://127.0.0.1/").is_err());
        assert!(EndpointValidator::new(true).validate("http://127.0.0.1/").is_ok());
        assert!(!EndpointValidator::strict().allows_loopback());
        assert!(is_restricted_ip(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(!is_restricted_ip(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }
}
