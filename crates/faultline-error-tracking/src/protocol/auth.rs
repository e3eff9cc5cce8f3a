//! DSN and auth-header parsing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// The components of a client DSN:
/// `scheme://public_key@host/…/project_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDsn {
    pub scheme: String,
    pub public_key: String,
    pub host: String,
    pub project_id: String,
}

/// Parse a DSN string. An empty public key or a missing path component is
/// not a valid DSN.
pub fn parse_dsn(dsn: &str) -> Option<ParsedDsn> {
    let url = url::Url::parse(dsn).ok()?;

    let public_key = url.username().to_string();
    if public_key.is_empty() {
        return None;
    }

    let host = url.host_str()?.to_string();

    // The project id is the last path component
    let project_id = url
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())?
        .to_string();

    Some(ParsedDsn {
        scheme: url.scheme().to_string(),
        public_key,
        host,
        project_id,
    })
}

/// Extract `sentry_key` from an `X-Sentry-Auth` header:
/// `Sentry sentry_key=KEY, sentry_version=7, …`
pub fn parse_sentry_auth(header: &str) -> Option<String> {
    let header = header.strip_prefix("Sentry ").unwrap_or(header);

    for part in header.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("sentry_key=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Extract the key from an HTTP Basic `Authorization` header: the key is
/// the pre-colon portion of the decoded credentials.
pub fn parse_basic_auth(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let key = decoded.split(':').next().unwrap_or(&decoded);
    (!key.is_empty()).then(|| key.to_string())
}

/// Resolve the public key for an ingest request, in priority order:
/// 1. the `sentry_key` query parameter,
/// 2. the `X-Sentry-Auth` header,
/// 3. HTTP Basic `Authorization`.
pub fn extract_public_key(
    query_key: Option<&str>,
    sentry_auth_header: Option<&str>,
    authorization_header: Option<&str>,
) -> Option<String> {
    if let Some(key) = query_key.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    if let Some(key) = sentry_auth_header.and_then(parse_sentry_auth) {
        return Some(key);
    }

    authorization_header.and_then(parse_basic_auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dsn_extracts_all_components() {
        let parsed = parse_dsn("https://abc123@faultline.example.com/42").unwrap();
        assert_eq!(parsed.scheme, "https");
        assert_eq!(parsed.public_key, "abc123");
        assert_eq!(parsed.host, "faultline.example.com");
        assert_eq!(parsed.project_id, "42");
    }

    #[test]
    fn parse_dsn_takes_the_last_path_component() {
        let parsed = parse_dsn("https://k@host.io/ingest/api/p99").unwrap();
        assert_eq!(parsed.project_id, "p99");
    }

    #[test]
    fn dsn_without_key_or_path_is_invalid() {
        assert!(parse_dsn("https://host.io/42").is_none());
        assert!(parse_dsn("https://key@host.io/").is_none());
        assert!(parse_dsn("not a url").is_none());
    }

    #[test]
    fn sentry_auth_header_parses_key() {
        assert_eq!(
            parse_sentry_auth("Sentry sentry_key=pub123,sentry_version=7"),
            Some("pub123".to_string())
        );
        // spaces after commas are tolerated
        assert_eq!(
            parse_sentry_auth("Sentry sentry_version=7, sentry_key=pub123, sentry_client=x/1.0"),
            Some("pub123".to_string())
        );
        assert_eq!(parse_sentry_auth("Sentry sentry_version=7"), None);
    }

    #[test]
    fn basic_auth_takes_the_pre_colon_portion() {
        use base64::engine::general_purpose::STANDARD;
        let header = format!("Basic {}", STANDARD.encode("mykey:ignored"));
        assert_eq!(parse_basic_auth(&header), Some("mykey".to_string()));

        let no_colon = format!("Basic {}", STANDARD.encode("justkey"));
        assert_eq!(parse_basic_auth(&no_colon), Some("justkey".to_string()));

        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic ???"), None);
    }

    #[test]
    fn key_resolution_order_prefers_query_param() {
        use base64::engine::general_purpose::STANDARD;
        let basic = format!("Basic {}", STANDARD.encode("basic_key:"));

        assert_eq!(
            extract_public_key(
                Some("query_key"),
                Some("Sentry sentry_key=header_key"),
                Some(&basic),
            ),
            Some("query_key".to_string())
        );
        assert_eq!(
            extract_public_key(None, Some("Sentry sentry_key=header_key"), Some(&basic)),
            Some("header_key".to_string())
        );
        assert_eq!(
            extract_public_key(None, None, Some(&basic)),
            Some("basic_key".to_string())
        );
        assert_eq!(extract_public_key(None, None, None), None);
    }
}
