//! Remote image allowlist and the matching content-security policy.
//!
//! Product and cart images come from backend-supplied URLs. Only `https`
//! URLs on an allowlisted host are rendered; the same list produces the
//! `img-src` directive so the browser enforces what the client checks.

use url::Url;

/// Policy for product images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePolicy {
    hosts: Vec<String>,
}

impl ImagePolicy {
    /// Policy allowing `hosts`. A host written `*.example.com` allows every
    /// subdomain of `example.com` but not `example.com` itself.
    #[must_use]
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.into().trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Whether `url` may be rendered.
    #[must_use]
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() != "https" {
            return false;
        }
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.hosts.iter().any(|pattern| match pattern.strip_prefix("*.") {
            Some(suffix) => host
                .strip_suffix(suffix)
                .is_some_and(|sub| sub.len() > 1 && sub.ends_with('.')),
            None => host == *pattern,
        })
    }

    /// `url` if it may be rendered.
    #[must_use]
    pub fn filter<'a>(&self, url: Option<&'a str>) -> Option<&'a str> {
        url.filter(|u| {
            let allowed = self.is_allowed(u);
            if !allowed {
                tracing::debug!(url = %u, "Dropping image from host outside the allowlist");
            }
            allowed
        })
    }

    /// The `img-src` directive.
    #[must_use]
    pub fn img_src(&self) -> String {
        let mut directive = String::from("img-src 'self'");
        for host in &self.hosts {
            directive.push_str(" https://");
            directive.push_str(host);
        }
        directive
    }

    /// Full content-security policy for pages rendering storefront images.
    ///
    /// Starts locked down; only `img-src` is widened to the allowlist.
    #[must_use]
    pub fn content_security_policy(&self) -> String {
        let img_src = self.img_src();
        [
            "default-src 'none'",
            "script-src 'self'",
            "style-src 'self'",
            "font-src 'self'",
            img_src.as_str(),
            "connect-src 'self'",
            "frame-src 'none'",
            "object-src 'none'",
            "base-uri 'self'",
            "form-action 'self'",
            "frame-ancestors 'none'",
            "upgrade-insecure-requests",
        ]
        .join("; ")
    }
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self::new(["res.cloudinary.com"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_host() {
        let policy = ImagePolicy::default();
        assert!(policy.is_allowed("https://res.cloudinary.com/demo/image/upload/shirt.jpg"));
        assert!(policy.is_allowed("https://RES.cloudinary.com/a.png"));
        assert!(!policy.is_allowed("https://evil.com/res.cloudinary.com/a.png"));
        assert!(!policy.is_allowed("https://res.cloudinary.com.evil.com/a.png"));
    }

    #[test]
    fn test_https_only() {
        let policy = ImagePolicy::default();
        assert!(!policy.is_allowed("http://res.cloudinary.com/a.png"));
        assert!(!policy.is_allowed("data:image/png;base64,AAAA"));
        assert!(!policy.is_allowed("/relative/path.png"));
    }

    #[test]
    fn test_wildcard_subdomains() {
        let policy = ImagePolicy::new(["*.cdn.example.com"]);
        assert!(policy.is_allowed("https://eu.cdn.example.com/a.png"));
        assert!(policy.is_allowed("https://a.b.cdn.example.com/a.png"));
        assert!(!policy.is_allowed("https://cdn.example.com/a.png"));
        assert!(!policy.is_allowed("https://evilcdn.example.com/a.png"));
    }

    #[test]
    fn test_filter() {
        let policy = ImagePolicy::default();
        assert_eq!(policy.filter(Some("http://res.cloudinary.com/a.png")), None);
        assert_eq!(
            policy.filter(Some("https://res.cloudinary.com/a.png")),
            Some("https://res.cloudinary.com/a.png")
        );
        assert_eq!(policy.filter(None), None);
    }

    #[test]
    fn test_content_security_policy() {
        let policy = ImagePolicy::new(["res.cloudinary.com", "*.cdn.example.com"]);
        assert_eq!(
            policy.img_src(),
            "img-src 'self' https://res.cloudinary.com https://*.cdn.example.com"
        );

        let csp = policy.content_security_policy();
        assert!(csp.starts_with("default-src 'none'; "));
        assert!(csp.contains("; img-src 'self' https://res.cloudinary.com https://*.cdn.example.com; "));
        assert!(csp.ends_with("upgrade-insecure-requests"));
    }
}
