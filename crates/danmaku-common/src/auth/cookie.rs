//! Cookie jar and cookie-backed session identity
//!
//! Reads a browser cookie export (Netscape format) or a raw `Cookie` header
//! and derives the viewer identity used by the auth packet and by outbound
//! chat.

use danmaku_core::{SessionIdentity, SessionProvider};
use std::collections::BTreeMap;
use std::path::Path;

/// Domain a cookie must belong to in order to be kept
const COOKIE_DOMAIN: &str = "bilibili.com";

/// Prefix browsers put on HttpOnly entries in Netscape exports
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

const UID_COOKIE: &str = "DedeUserID";
const BUVID_COOKIE: &str = "buvid3";
const CSRF_COOKIE: &str = "bili_jct";
const SESSION_COOKIE: &str = "SESSDATA";

/// Cookie loading errors
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("Failed to read cookie file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Name/value cookie store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    /// Parse a Netscape cookie file
    ///
    /// Lines have seven whitespace-separated fields. Only cookies whose
    /// domain contains `bilibili.com` are kept. Everything after the sixth
    /// field is the value, so values containing spaces survive.
    pub fn parse_netscape(content: &str) -> Self {
        let mut cookies = BTreeMap::new();

        for (index, raw) in content.lines().enumerate() {
            let mut line = raw.trim();
            if let Some(rest) = line.strip_prefix(HTTP_ONLY_PREFIX) {
                line = rest;
            } else if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 7 {
                tracing::debug!(line = index + 1, fields = parts.len(), "Skipping cookie line");
                continue;
            }

            let domain = parts[0];
            if !domain.contains(COOKIE_DOMAIN) {
                continue;
            }

            cookies.insert(parts[5].to_string(), parts[6..].join(" "));
        }

        Self { cookies }
    }

    /// Parse a raw `Cookie` header value (`a=1; b=2`)
    pub fn parse_header(header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect();

        Self { cookies }
    }

    /// Parse either format, detecting a Netscape export by its tab/field shape
    pub fn parse(content: &str) -> Self {
        let looks_netscape = content
            .lines()
            .any(|l| l.trim_start().starts_with('#') || l.split_whitespace().count() >= 7);

        if looks_netscape {
            Self::parse_netscape(content)
        } else {
            Self::parse_header(content.trim())
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Render as a `Cookie` header value
    pub fn to_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Session identity backed by a cookie jar
#[derive(Debug, Clone, Default)]
pub struct CookieSession {
    jar: CookieJar,
}

impl CookieSession {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    /// Session with no cookies
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Load a cookie file; a missing file yields an anonymous session
    pub fn load(path: Option<&Path>) -> Result<Self, CookieError> {
        let Some(path) = path else {
            tracing::info!("No cookie file configured, using anonymous session");
            return Ok(Self::anonymous());
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Cookie file not found, using anonymous session");
                return Ok(Self::anonymous());
            }
            Err(e) => {
                return Err(CookieError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        let session = Self::new(CookieJar::parse(&content));
        if session.jar.get(SESSION_COOKIE).is_none() || session.jar.get(CSRF_COOKIE).is_none() {
            tracing::warn!(
                path = %path.display(),
                "Cookie file lacks SESSDATA or bili_jct, outbound chat will fail"
            );
        }
        tracing::info!(
            path = %path.display(),
            cookies = session.jar.len(),
            uid = session.uid(),
            "Loaded cookie session"
        );

        Ok(session)
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    /// Viewer uid, 0 when absent or not numeric
    pub fn uid(&self) -> u64 {
        self.jar
            .get(UID_COOKIE)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl SessionProvider for CookieSession {
    fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            uid: self.uid(),
            buvid: self.jar.get(BUVID_COOKIE).unwrap_or_default().to_string(),
            csrf: self.jar.get(CSRF_COOKIE).map(str::to_string),
            cookie_header: (!self.jar.is_empty()).then(|| self.jar.to_header()),
        }
    }
}
