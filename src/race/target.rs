//! Upstream target identity and URL rewriting.

use std::fmt;

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;
use url::Url;

/// Which of the two targets an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The opposing side of the race.
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::A => "a",
            Side::B => "b",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors building a [`Target`].
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target URL {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("target {0} must use http or https")]
    Scheme(String),
    #[error("target {0} has no host")]
    MissingHost(String),
    #[error("target {url:?} has an unusable authority: {source}")]
    Authority {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
}

/// One upstream backend: scheme, host and optional port.
///
/// Immutable after startup and shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    side: Side,
    scheme: Scheme,
    authority: Authority,
}

impl Target {
    /// Parse an absolute `http`/`https` URL. Any path on it is ignored.
    pub fn parse(side: Side, raw: &str) -> Result<Self, TargetError> {
        let base = Url::parse(raw).map_err(|source| TargetError::Parse {
            url: raw.to_string(),
            source,
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(TargetError::Scheme(raw.to_string()));
        }
        if base.host_str().map_or(true, str::is_empty) {
            return Err(TargetError::MissingHost(raw.to_string()));
        }

        let host = base.host_str().unwrap_or_default();
        let authority = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = authority
            .parse::<Authority>()
            .map_err(|source| TargetError::Authority {
                url: raw.to_string(),
                source,
            })?;
        let scheme = if base.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };

        Ok(Self {
            side,
            scheme,
            authority,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// `host[:port]` of the target.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Build the outbound URI for an inbound request URI.
    ///
    /// Only scheme and authority change. The path and query bytes are reused
    /// as received, without decoding or dot-segment removal.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_keeps_path_and_query() {
        let target = Target::parse(Side::A, "http://127.0.0.1:9000").unwrap();
        let uri: Uri = "/api/items?id=7&sort=asc".parse().unwrap();

        let rewritten = target.rewrite(&uri).unwrap();
        assert_eq!(rewritten, "http://127.0.0.1:9000/api/items?id=7&sort=asc");
    }

    #[test]
    fn test_rewrite_keeps_path_bytes_verbatim() {
        let target = Target::parse(Side::A, "http://127.0.0.1:9000").unwrap();

        for raw in ["/a/../b", "/a/%2e%2e/secret", "/x?name='bob'", "/./c", "/%7Euser//x"] {
            let uri: Uri = raw.parse().unwrap();
            let rewritten = target.rewrite(&uri).unwrap();
            assert_eq!(rewritten.path_and_query().unwrap().as_str(), raw);
            assert_eq!(rewritten.authority().unwrap().as_str(), "127.0.0.1:9000");
        }
    }

    #[test]
    fn test_rewrite_replaces_target_path() {
        let target = Target::parse(Side::B, "https://backend.example/ignored").unwrap();
        let uri: Uri = "/".parse().unwrap();

        assert_eq!(target.rewrite(&uri).unwrap(), "https://backend.example/");
        assert_eq!(target.to_string(), "https://backend.example");
        assert_eq!(target.scheme(), &Scheme::HTTPS);
    }

    #[test]
    fn test_parse_rejects_non_http() {
        assert!(matches!(
            Target::parse(Side::A, "ftp://example.com"),
            Err(TargetError::Scheme(_))
        ));
        assert!(matches!(
            Target::parse(Side::A, "example.com:80"),
            Err(TargetError::Scheme(_)) | Err(TargetError::Parse { .. })
        ));
        assert!(matches!(
            Target::parse(Side::A, "/relative/path"),
            Err(TargetError::Parse { .. })
        ));
    }

    #[test]
    fn test_side_other() {
        assert_eq!(Side::A.other(), Side::B);
        assert_eq!(Side::B.other(), Side::A);
        assert_eq!(Side::B.index(), 1);
    }
}
