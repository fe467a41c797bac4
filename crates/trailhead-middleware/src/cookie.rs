//! Cookie parsing and `Set-Cookie` rendering.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Cookies sent by the client, parsed from the `Cookie` header.
///
/// Values are percent-decoded. Later duplicates do not overwrite earlier
/// ones.
///
/// ```
/// use trailhead_middleware::cookie::Cookies;
///
/// let cookies = Cookies::parse("_csrf=abc; theme=dark");
/// assert_eq!(cookies.get("_csrf"), Some("abc"));
/// assert_eq!(cookies.get("theme"), Some("dark"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    cookies: HashMap<String, String>,
}

impl Cookies {
    /// Creates an empty cookie jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` header value.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = HashMap::new();

        for pair in header_value.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map_or_else(|_| value.to_string(), std::borrow::Cow::into_owned);
            cookies.entry(name.to_string()).or_insert(value);
        }

        Self { cookies }
    }

    /// Parses every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &http::HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(http::header::COOKIE) {
            if let Ok(text) = value.to_str() {
                for (name, value) in Self::parse(text).cookies {
                    jar.cookies.entry(name).or_insert(value);
                }
            }
        }
        jar
    }

    /// Gets a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Checks if a cookie exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Returns the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns `true` if there are no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Sent with cross-site requests.
    None,
    /// Sent with same-site requests and top-level navigations.
    #[default]
    Lax,
    /// Sent with same-site requests only.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lax => write!(f, "Lax"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// Builder for a `Set-Cookie` response header.
///
/// ```
/// use trailhead_middleware::cookie::{SameSite, SetCookie};
///
/// let header = SetCookie::new("_csrf", "s3cret")
///     .path("/")
///     .http_only(true)
///     .same_site(SameSite::Lax)
///     .to_header_value();
/// assert_eq!(header, "_csrf=s3cret; Path=/; HttpOnly; SameSite=Lax");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    path: Option<String>,
    max_age: Option<Duration>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    /// Creates a new `Set-Cookie` builder.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the `Max-Age` attribute.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets the `Secure` attribute.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `HttpOnly` attribute.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Sets `SameSite` only when `same_site` is `Some`.
    #[must_use]
    pub fn maybe_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns `true` if the `Secure` attribute is set.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns `true` if the `HttpOnly` attribute is set.
    #[must_use]
    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Returns the `SameSite` attribute.
    #[must_use]
    pub fn same_site_value(&self) -> Option<SameSite> {
        self.same_site
    }

    /// Renders the `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, urlencoding::encode(&self.value))];

        if let Some(ref path) = self.path {
            parts.push(format!("Path={path}"));
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}
