//! Parser for the server's `status.php` document.
//!
//! The body is a flat JSON-like object such as
//! `{"installed":"true","version":"4.0.1","versionstring":"4.0.1","edition":""}`.
//! It is split on `,` and `:`; values containing either character are
//! truncated.

/// Fields recognized in a `status.php` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub version: Option<String>,
    pub version_string: Option<String>,
    pub edition: Option<String>,
    /// Keys that were present but not recognized.
    pub unrecognized: Vec<String>,
}

/// A complete discovery answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationInfo {
    pub version: String,
    pub version_string: String,
    pub edition: String,
}

impl ServerStatus {
    /// All of `version`, `versionstring` and `edition` were present. An empty
    /// value still counts.
    pub fn is_complete(&self) -> bool {
        self.version.is_some() && self.version_string.is_some() && self.edition.is_some()
    }

    pub fn installation(&self) -> Option<InstallationInfo> {
        Some(InstallationInfo {
            version: self.version.clone()?,
            version_string: self.version_string.clone()?,
            edition: self.edition.clone()?,
        })
    }
}

pub fn parse_status(body: &str) -> ServerStatus {
    let mut status = ServerStatus::default();

    let inner = strip_enclosing(body.trim());
    if inner.trim().is_empty() {
        return status;
    }

    for pair in inner.split(',') {
        let mut parts = pair.split(':');
        let key = unquote(parts.next().unwrap_or_default());
        let Some(raw_value) = parts.next() else {
            tracing::debug!("Malformed entry in status.php: {}", pair);
            status.unrecognized.push(key);
            continue;
        };
        let value = unquote(raw_value);

        match key.as_str() {
            "versionstring" => status.version_string = Some(value),
            "version" => status.version = Some(value),
            "edition" => status.edition = Some(value),
            "installed" => {}
            _ => {
                tracing::warn!("Unknown info from status.php: {} = {}", key, value);
                status.unrecognized.push(key);
            }
        }
    }

    status
}

/// Drop the first and the last character (the braces of the object).
fn strip_enclosing(text: &str) -> &str {
    let mut chars = text.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_status() {
        let status = parse_status(
            r#"{"installed":"true","version":"4.0.1","versionstring":"4.0.1","edition":""}"#,
        );
        assert!(status.is_complete());
        let info = status.installation().unwrap();
        assert_eq!(info.version, "4.0.1");
        assert_eq!(info.version_string, "4.0.1");
        assert_eq!(info.edition, "");
        assert!(status.unrecognized.is_empty());
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_newline() {
        let status = parse_status(
            "{ \"version\" : \"5.0.0.3\", \"versionstring\" : \"5.0 beta\", \"edition\" : \"Enterprise\" }\n",
        );
        let info = status.installation().unwrap();
        assert_eq!(info.version, "5.0.0.3");
        assert_eq!(info.version_string, "5.0 beta");
        assert_eq!(info.edition, "Enterprise");
    }

    #[test]
    fn test_missing_versionstring_is_incomplete() {
        let status = parse_status(r#"{"installed":"true","version":"4.0.1","edition":""}"#);
        assert!(!status.is_complete());
        assert!(status.installation().is_none());
    }

    #[test]
    fn test_unknown_keys_are_recorded() {
        let status = parse_status(
            r#"{"version":"1","versionstring":"1","edition":"","maintenance":"false"}"#,
        );
        assert!(status.is_complete());
        assert_eq!(status.unrecognized, vec!["maintenance".to_string()]);
    }

    #[test]
    fn test_values_with_colon_are_truncated() {
        let status = parse_status(r#"{"version":"1","url":"http://example.com"}"#);
        assert_eq!(status.version.as_deref(), Some("1"));
        assert_eq!(status.unrecognized, vec!["url".to_string()]);
    }

    #[test]
    fn test_non_status_body() {
        assert_eq!(parse_status(""), ServerStatus::default());
        assert!(!parse_status("<html><body>Not here</body></html>").is_complete());
    }
}
