//! Operator routing intent
//!
//! The answer set gathered from the operator. Sub-fields that only make sense
//! behind a toggle live inside an `Option`, so a disabled feature has nothing
//! to read.

/// Default entrypoint for plain HTTP
pub const DEFAULT_HTTP_ENTRYPOINT: &str = "http";
/// Default entrypoint for TLS
pub const DEFAULT_HTTPS_ENTRYPOINT: &str = "https";
/// Default ACME resolver name
pub const DEFAULT_CERT_RESOLVER: &str = "mySSL";
/// Default overlay network the proxy reaches services on
pub const DEFAULT_NETWORK: &str = "proxy";

/// TLS settings, present only when SSL is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslOptions {
    /// Entrypoint the secure router binds to
    pub entrypoint: String,
    /// Redirect plain HTTP to HTTPS
    pub redirect: bool,
    /// Public port the redirect points at
    pub port: u16,
    /// ACME resolver name, if certificates are issued automatically
    pub cert_resolver: Option<String>,
}

impl Default for SslOptions {
    fn default() -> Self {
        Self {
            entrypoint: DEFAULT_HTTPS_ENTRYPOINT.to_string(),
            redirect: true,
            port: 443,
            cert_resolver: Some(DEFAULT_CERT_RESOLVER.to_string()),
        }
    }
}

/// Basic-auth settings, present only when auth is enabled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    /// `user:password` lines
    pub users: Vec<String>,
    /// Also emit `traefikConfig.clearPassword.<user>` labels holding the
    /// clear-text password. Anyone able to inspect the service can read them.
    pub emit_clear_passwords: bool,
}

impl AuthOptions {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
            emit_clear_passwords: false,
        }
    }

    pub fn with_clear_passwords(mut self, emit: bool) -> Self {
        self.emit_clear_passwords = emit;
        self
    }
}

/// Everything needed to derive a service's routing labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingIntent {
    /// Entrypoint for the plain HTTP router
    pub entrypoint_http: String,
    /// TLS settings; `None` disables the secure router entirely
    pub ssl: Option<SslOptions>,
    /// Network the proxy uses to reach the service
    pub network: String,
    /// Port the container listens on
    pub service_port: u16,
    /// Sticky sessions on the load balancer
    pub sticky: bool,
    /// Router priority
    pub priority: i64,
    /// Host names, in rule order
    pub hosts: Vec<String>,
    /// Basic auth; `None` disables it
    pub auth: Option<AuthOptions>,
    /// Emit a Content-Security-Policy header middleware
    pub security_policy: bool,
    /// Emit a wildcard Access-Control-Allow-Origin header middleware
    pub cors: bool,
    /// Run the generated commands after printing them
    pub execute: bool,
}

impl Default for RoutingIntent {
    fn default() -> Self {
        Self {
            entrypoint_http: DEFAULT_HTTP_ENTRYPOINT.to_string(),
            ssl: Some(SslOptions::default()),
            network: DEFAULT_NETWORK.to_string(),
            service_port: 80,
            sticky: false,
            priority: 0,
            hosts: Vec::new(),
            auth: None,
            security_policy: false,
            cors: false,
            execute: false,
        }
    }
}

impl RoutingIntent {
    /// Intent for the given hosts with every other answer at its default
    pub fn for_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse a newline-delimited host list, dropping blank lines
    pub fn parse_hosts(text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn without_ssl(mut self) -> Self {
        self.ssl = None;
        self
    }

    pub fn with_ssl(mut self, ssl: SslOptions) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn with_auth(mut self, auth: AuthOptions) -> Self {
        self.auth = Some(auth);
        self
    }

    /// SSL enabled with redirect on
    pub fn redirects_to_https(&self) -> bool {
        self.ssl.as_ref().is_some_and(|s| s.redirect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_prompt_defaults() {
        let intent = RoutingIntent::default();
        assert_eq!(intent.entrypoint_http, "http");
        assert_eq!(intent.service_port, 80);
        assert_eq!(intent.network, "proxy");
        assert_eq!(intent.priority, 0);
        assert!(!intent.sticky);
        assert!(intent.auth.is_none());

        let ssl = intent.ssl.unwrap();
        assert_eq!(ssl.entrypoint, "https");
        assert_eq!(ssl.port, 443);
        assert!(ssl.redirect);
        assert_eq!(ssl.cert_resolver.as_deref(), Some("mySSL"));
    }

    #[test]
    fn test_parse_hosts_drops_blank_lines() {
        let hosts = RoutingIntent::parse_hosts("a.com\n\nb.com\n");
        assert_eq!(hosts, vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_redirects_to_https() {
        assert!(RoutingIntent::default().redirects_to_https());
        assert!(!RoutingIntent::default().without_ssl().redirects_to_https());

        let no_redirect = RoutingIntent::default().with_ssl(SslOptions {
            redirect: false,
            ..Default::default()
        });
        assert!(!no_redirect.redirects_to_https());
    }
}
