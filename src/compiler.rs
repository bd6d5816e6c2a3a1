//! Label mutation compiler
//!
//! Turns a service, its current labels and a [`RoutingIntent`] into a
//! [`LabelTransaction`]: every managed label is removed, then the complete
//! new set is added. Nothing from the previous configuration is carried
//! over, so compiling twice against the same snapshot gives the same removal
//! set regardless of what is added.
//!
//! Added labels are emitted in a fixed sequence:
//!
//! 1. enable flag, network, service port
//! 2. secure router (SSL only)
//! 3. HTTP router
//! 4. redirect, security-policy and CORS middlewares
//! 5. sticky sessions
//! 6. basic auth
//! 7. chain definitions and router references, which name middlewares
//!    defined above

use crate::credentials::{encode_with_cost, EncodedCredentials};
use crate::error::Result;
use crate::intent::RoutingIntent;
use crate::labels::{
    dashed_name, host_rule, managed_keys, LabelEntry, LabelTransaction, ROUTERS_NS, SERVICES_NS,
};
use crate::middleware::assemble;
use crate::registry::Service;
use std::collections::BTreeMap;
use tracing::debug;

/// Compiles routing intent into label transactions
#[derive(Debug, Clone)]
pub struct LabelCompiler {
    bcrypt_cost: u32,
}

impl Default for LabelCompiler {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl LabelCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bcrypt cost used for basic-auth hashes
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Compile the label transaction for one service
    pub fn compile(
        &self,
        service: &Service,
        current_labels: &BTreeMap<String, String>,
        intent: &RoutingIntent,
    ) -> Result<LabelTransaction> {
        let remove_keys = managed_keys(current_labels);

        let credentials = match &intent.auth {
            Some(auth) => Some(encode_with_cost(auth.users.as_slice(), self.bcrypt_cost)?),
            None => None,
        };

        let add_entries = build_entries(&service.name, intent, credentials.as_ref());

        debug!(
            service = %service.name,
            removed = remove_keys.len(),
            added = add_entries.len(),
            "label transaction compiled"
        );

        Ok(LabelTransaction {
            service_name: service.name.clone(),
            remove_keys,
            add_entries,
        })
    }
}

/// Compile with the default bcrypt cost
pub fn compile(
    service: &Service,
    current_labels: &BTreeMap<String, String>,
    intent: &RoutingIntent,
) -> Result<LabelTransaction> {
    LabelCompiler::default().compile(service, current_labels, intent)
}

fn build_entries(
    service_name: &str,
    intent: &RoutingIntent,
    credentials: Option<&EncodedCredentials>,
) -> Vec<LabelEntry> {
    let key = dashed_name(service_name);
    let router = format!("{}.{}", ROUTERS_NS, key);
    let lb_service = format!("{}.{}.loadbalancer", SERVICES_NS, key);
    let rule = host_rule(&intent.hosts);

    let mut entries = vec![
        LabelEntry::new("traefik.enable", "true"),
        LabelEntry::new("traefik.docker.network", intent.network.as_str()),
        LabelEntry::new(
            format!("{}.server.port", lb_service),
            intent.service_port.to_string(),
        ),
    ];

    if let Some(ssl) = &intent.ssl {
        let secure = format!("{}-secure", router);
        entries.push(LabelEntry::new(
            format!("{}.entrypoints", secure),
            ssl.entrypoint.as_str(),
        ));
        entries.push(LabelEntry::new(format!("{}.rule", secure), rule.as_str()));
        entries.push(LabelEntry::new(format!("{}.service", secure), key.as_str()));
        entries.push(LabelEntry::new(format!("{}.tls", secure), "true"));
        if let Some(resolver) = &ssl.cert_resolver {
            entries.push(LabelEntry::new(
                format!("{}.tls.certresolver", secure),
                resolver.as_str(),
            ));
        }
        entries.push(LabelEntry::new(
            format!("{}.priority", secure),
            intent.priority.to_string(),
        ));
    }

    entries.push(LabelEntry::new(
        format!("{}.entrypoints", router),
        intent.entrypoint_http.as_str(),
    ));
    entries.push(LabelEntry::new(format!("{}.rule", router), rule.as_str()));
    entries.push(LabelEntry::new(
        format!("{}.priority", router),
        intent.priority.to_string(),
    ));

    let plan = assemble(intent, &key, credentials);
    entries.extend(plan.definitions);

    if intent.sticky {
        entries.push(LabelEntry::new(format!("{}.sticky", lb_service), "true"));
    }

    entries.extend(plan.auth_definitions);
    entries.extend(plan.chain_definitions);
    entries
}
