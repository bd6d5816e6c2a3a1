//! Middleware chain assembly
//!
//! Each feature toggle contributes a middleware definition and a position in
//! the HTTP and/or HTTPS chain. Order is significant: it becomes the chain's
//! label value and therefore the proxy's evaluation order.
//!
//! 1. https-redirect (HTTP only, when SSL redirects)
//! 2. auth (HTTP only without redirect; HTTPS whenever SSL is on)
//! 3. secPolicy (both routers)
//! 4. cors (both routers)
//!
//! A chain middleware and the router reference to it are only emitted for a
//! non-empty chain.

use crate::credentials::EncodedCredentials;
use crate::intent::RoutingIntent;
use crate::labels::{LabelEntry, CLEAR_PASSWORD_NS, MIDDLEWARES_NS, ROUTERS_NS};

/// What a middleware does; also its name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    HttpsRedirect,
    Auth,
    SecPolicy,
    Cors,
    Chain,
    SecureChain,
}

impl Purpose {
    pub fn suffix(&self) -> &'static str {
        match self {
            Purpose::HttpsRedirect => "https-redirect",
            Purpose::Auth => "auth",
            Purpose::SecPolicy => "secPolicy",
            Purpose::Cors => "cors",
            Purpose::Chain => "chain",
            Purpose::SecureChain => "secure-chain",
        }
    }
}

/// `<service>-<purpose>`
pub fn middleware_name(service_key: &str, purpose: Purpose) -> String {
    format!("{}-{}", service_key, purpose.suffix())
}

/// Label key prefix of a middleware definition
pub fn middleware_key(service_key: &str, purpose: Purpose) -> String {
    format!("{}.{}", MIDDLEWARES_NS, middleware_name(service_key, purpose))
}

/// Content-Security-Policy value allowing connections to every host over
/// both schemes
pub fn security_policy_value<S: AsRef<str>>(hosts: &[S]) -> String {
    let mut parts = vec!["connect-src".to_string()];
    for host in hosts {
        let host = host.as_ref();
        parts.push(format!("http://{}", host));
        parts.push(format!("https://{}", host));
    }
    parts.push("'self'".to_string());
    parts.join(" ")
}

/// Middleware chains and the labels that define them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiddlewarePlan {
    /// Middleware names for the plain HTTP router, in order
    pub http_chain: Vec<String>,
    /// Middleware names for the secure router, in order
    pub https_chain: Vec<String>,
    /// Redirect, security-policy and CORS definitions
    pub definitions: Vec<LabelEntry>,
    /// Basic-auth definition, preceded by any clear-password diagnostics
    pub auth_definitions: Vec<LabelEntry>,
    /// Chain definitions and the router references to them
    pub chain_definitions: Vec<LabelEntry>,
}

/// Assemble the chains for a service.
///
/// `credentials` is only read when the intent enables basic auth.
pub fn assemble(
    intent: &RoutingIntent,
    service_key: &str,
    credentials: Option<&EncodedCredentials>,
) -> MiddlewarePlan {
    let mut plan = MiddlewarePlan::default();
    let ssl_enabled = intent.ssl.is_some();

    if let Some(ssl) = intent.ssl.as_ref().filter(|s| s.redirect) {
        let key = middleware_key(service_key, Purpose::HttpsRedirect);
        plan.definitions
            .push(LabelEntry::new(format!("{}.redirectscheme.scheme", key), "https"));
        plan.definitions.push(LabelEntry::new(
            format!("{}.redirectscheme.port", key),
            ssl.port.to_string(),
        ));
        plan.http_chain
            .push(middleware_name(service_key, Purpose::HttpsRedirect));
    }

    if let Some(auth) = &intent.auth {
        let empty = EncodedCredentials::default();
        let credentials = credentials.unwrap_or(&empty);

        if auth.emit_clear_passwords {
            for (user, password) in credentials.clear_pairs() {
                plan.auth_definitions.push(LabelEntry::new(
                    format!("{}.{}", CLEAR_PASSWORD_NS, user),
                    password,
                ));
            }
        }

        plan.auth_definitions.push(LabelEntry::with_shell_value(
            format!("{}.basicauth.users", middleware_key(service_key, Purpose::Auth)),
            credentials.combo_string(),
            credentials.shell_combo_string(),
        ));

        let name = middleware_name(service_key, Purpose::Auth);
        if !intent.redirects_to_https() {
            plan.http_chain.push(name.clone());
        }
        if ssl_enabled {
            plan.https_chain.push(name);
        }
    }

    if intent.security_policy {
        plan.definitions.push(LabelEntry::new(
            format!(
                "{}.headers.customresponseheaders.Content-Security-Policy",
                middleware_key(service_key, Purpose::SecPolicy)
            ),
            security_policy_value(&intent.hosts),
        ));
        push_both(&mut plan, service_key, Purpose::SecPolicy, ssl_enabled);
    }

    if intent.cors {
        plan.definitions.push(LabelEntry::new(
            format!(
                "{}.headers.customresponseheaders.Access-Control-Allow-Origin",
                middleware_key(service_key, Purpose::Cors)
            ),
            "*",
        ));
        push_both(&mut plan, service_key, Purpose::Cors, ssl_enabled);
    }

    if !plan.http_chain.is_empty() {
        let chain = attach_chain(service_key, Purpose::Chain, "", &plan.http_chain);
        plan.chain_definitions.extend(chain);
    }
    if !plan.https_chain.is_empty() {
        let chain = attach_chain(service_key, Purpose::SecureChain, "-secure", &plan.https_chain);
        plan.chain_definitions.extend(chain);
    }

    plan
}

fn push_both(plan: &mut MiddlewarePlan, service_key: &str, purpose: Purpose, ssl_enabled: bool) {
    let name = middleware_name(service_key, purpose);
    if ssl_enabled {
        plan.https_chain.push(name.clone());
    }
    plan.http_chain.push(name);
}

/// Chain definition followed by the router's reference to it
fn attach_chain(
    service_key: &str,
    purpose: Purpose,
    router_suffix: &str,
    members: &[String],
) -> [LabelEntry; 2] {
    [
        LabelEntry::new(
            format!("{}.chain.middlewares", middleware_key(service_key, purpose)),
            members.join(","),
        ),
        LabelEntry::new(
            format!("{}.{}{}.middlewares", ROUTERS_NS, service_key, router_suffix),
            middleware_name(service_key, purpose),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::encode_with_cost;
    use crate::intent::{AuthOptions, SslOptions};

    fn keys(labels: &[LabelEntry]) -> Vec<&str> {
        labels.iter().map(|l| l.key.as_str()).collect()
    }

    #[test]
    fn test_redirect_only() {
        let intent = RoutingIntent::for_hosts(["a.com"]);
        let plan = assemble(&intent, "web-app", None);

        assert_eq!(plan.http_chain, vec!["web-app-https-redirect"]);
        assert!(plan.https_chain.is_empty());
        assert_eq!(
            keys(&plan.definitions),
            vec![
                "traefik.http.middlewares.web-app-https-redirect.redirectscheme.scheme",
                "traefik.http.middlewares.web-app-https-redirect.redirectscheme.port",
            ]
        );
        assert_eq!(plan.definitions[1].value, "443");
        assert_eq!(
            keys(&plan.chain_definitions),
            vec![
                "traefik.http.middlewares.web-app-chain.chain.middlewares",
                "traefik.http.routers.web-app.middlewares",
            ]
        );
        assert_eq!(plan.chain_definitions[0].value, "web-app-https-redirect");
        assert_eq!(plan.chain_definitions[1].value, "web-app-chain");
    }

    #[test]
    fn test_nothing_enabled_emits_no_chain() {
        let intent = RoutingIntent::for_hosts(["a.com"]).with_ssl(SslOptions {
            redirect: false,
            ..Default::default()
        });
        let plan = assemble(&intent, "svc", None);

        assert!(plan.http_chain.is_empty());
        assert!(plan.https_chain.is_empty());
        assert!(plan.definitions.is_empty());
        assert!(plan.auth_definitions.is_empty());
        assert!(plan.chain_definitions.is_empty());
    }

    #[test]
    fn test_redirect_preempts_http_auth() {
        let creds = encode_with_cost(&["admin:pw"], 4).unwrap();
        let intent = RoutingIntent::for_hosts(["a.com"]).with_auth(AuthOptions::new(["admin:pw"]));
        let plan = assemble(&intent, "svc", Some(&creds));

        assert_eq!(plan.http_chain, vec!["svc-https-redirect"]);
        assert_eq!(plan.https_chain, vec!["svc-auth"]);
    }

    #[test]
    fn test_auth_without_redirect_on_both_chains() {
        let creds = encode_with_cost(&["admin:pw"], 4).unwrap();
        let intent = RoutingIntent::for_hosts(["a.com"])
            .with_ssl(SslOptions {
                redirect: false,
                ..Default::default()
            })
            .with_auth(AuthOptions::new(["admin:pw"]));
        let plan = assemble(&intent, "svc", Some(&creds));

        assert_eq!(plan.http_chain, vec!["svc-auth"]);
        assert_eq!(plan.https_chain, vec!["svc-auth"]);

        let auth = plan.auth_definitions.last().unwrap();
        assert_eq!(auth.key, "traefik.http.middlewares.svc-auth.basicauth.users");
        assert_eq!(auth.value, creds.combo_string());
        assert_eq!(auth.shell_value(), creds.shell_combo_string());
    }

    #[test]
    fn test_auth_without_ssl_is_http_only() {
        let creds = encode_with_cost(&["admin:pw"], 4).unwrap();
        let intent = RoutingIntent::for_hosts(["a.com"])
            .without_ssl()
            .with_auth(AuthOptions::new(["admin:pw"]));
        let plan = assemble(&intent, "svc", Some(&creds));

        assert_eq!(plan.http_chain, vec!["svc-auth"]);
        assert!(plan.https_chain.is_empty());
        assert!(!plan
            .chain_definitions
            .iter()
            .any(|l| l.key.contains("secure")));
    }

    #[test]
    fn test_clear_passwords_are_opt_in() {
        let creds = encode_with_cost(&["admin:pw1", "bob:pw2"], 4).unwrap();

        let quiet = RoutingIntent::default().with_auth(AuthOptions::new(["admin:pw1", "bob:pw2"]));
        let plan = assemble(&quiet, "svc", Some(&creds));
        assert_eq!(plan.auth_definitions.len(), 1);

        let loud = RoutingIntent::default()
            .with_auth(AuthOptions::new(["admin:pw1", "bob:pw2"]).with_clear_passwords(true));
        let plan = assemble(&loud, "svc", Some(&creds));
        assert_eq!(
            keys(&plan.auth_definitions),
            vec![
                "traefikConfig.clearPassword.admin",
                "traefikConfig.clearPassword.bob",
                "traefik.http.middlewares.svc-auth.basicauth.users",
            ]
        );
        assert_eq!(plan.auth_definitions[0].value, "pw1");
    }

    #[test]
    fn test_full_chain_order() {
        let creds = encode_with_cost(&["admin:pw"], 4).unwrap();
        let mut intent = RoutingIntent::for_hosts(["a.com"])
            .with_ssl(SslOptions {
                redirect: false,
                ..Default::default()
            })
            .with_auth(AuthOptions::new(["admin:pw"]));
        intent.security_policy = true;
        intent.cors = true;

        let plan = assemble(&intent, "svc", Some(&creds));
        assert_eq!(plan.http_chain, vec!["svc-auth", "svc-secPolicy", "svc-cors"]);
        assert_eq!(plan.https_chain, vec!["svc-auth", "svc-secPolicy", "svc-cors"]);
        assert_eq!(
            plan.chain_definitions[0].value,
            "svc-auth,svc-secPolicy,svc-cors"
        );
        assert_eq!(
            keys(&plan.chain_definitions),
            vec![
                "traefik.http.middlewares.svc-chain.chain.middlewares",
                "traefik.http.routers.svc.middlewares",
                "traefik.http.middlewares.svc-secure-chain.chain.middlewares",
                "traefik.http.routers.svc-secure.middlewares",
            ]
        );
    }

    #[test]
    fn test_headers_without_ssl() {
        let mut intent = RoutingIntent::for_hosts(["a.com"]).without_ssl();
        intent.security_policy = true;
        intent.cors = true;

        let plan = assemble(&intent, "svc", None);
        assert_eq!(plan.http_chain, vec!["svc-secPolicy", "svc-cors"]);
        assert!(plan.https_chain.is_empty());
        assert_eq!(plan.definitions[1].value, "*");
    }

    #[test]
    fn test_security_policy_value() {
        assert_eq!(
            security_policy_value(&["a.com", "b.com"]),
            "connect-src http://a.com https://a.com http://b.com https://b.com 'self'"
        );
        assert_eq!(security_policy_value::<&str>(&[]), "connect-src 'self'");
    }

    #[test]
    fn test_middleware_names() {
        assert_eq!(middleware_name("web-app", Purpose::SecureChain), "web-app-secure-chain");
        assert_eq!(
            middleware_key("web-app", Purpose::Auth),
            "traefik.http.middlewares.web-app-auth"
        );
    }
}
