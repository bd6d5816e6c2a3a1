use anyhow::Context;
use clap::Parser;
use traefik_labels::compiler::LabelCompiler;
use traefik_labels::config::{cache_path, config_path, ToolConfig};
use traefik_labels::executor::{ExecutionPolicy, Session};
use traefik_labels::intent::{
    AuthOptions, RoutingIntent, SslOptions, DEFAULT_CERT_RESOLVER, DEFAULT_HTTPS_ENTRYPOINT,
    DEFAULT_HTTP_ENTRYPOINT, DEFAULT_NETWORK,
};
use traefik_labels::registry::{find_service, Service, ServiceRegistry, SystemShell};
use traefik_labels::render::{comment_output, compose_listing, display_commands, shell_commands};
use tracing::{info, warn};

/// Generate and apply Traefik routing labels for a swarm service
#[derive(Debug, Parser)]
#[command(name = "traefik-config", version)]
struct Cli {
    /// Execute on the local docker (persisted)
    #[arg(short = 'l', long, conflicts_with = "remote")]
    local: bool,

    /// Execute on a remote server over ssh (persisted)
    #[arg(short = 'r', long, value_name = "SERVER")]
    remote: Option<String>,

    /// ssh port on the remote server
    #[arg(short = 'p', long, requires = "remote")]
    port: Option<u16>,

    /// ssh username on the remote server
    #[arg(short = 'u', long, requires = "remote")]
    username: Option<String>,

    /// Query the orchestrator instead of using the cached service list
    #[arg(short = 'n', long)]
    no_cache: bool,

    /// Only offer services whose name contains this text
    #[arg(short = 'f', long, value_name = "NAME")]
    filter: Option<String>,

    /// Only print the compose listing
    #[arg(short = 's', long)]
    show_compose: bool,

    /// Service to configure, by id or name; lists candidates when omitted
    #[arg(long)]
    service: Option<String>,

    /// Entrypoint for plain HTTP
    #[arg(long, default_value = DEFAULT_HTTP_ENTRYPOINT)]
    entrypoint_http: String,

    /// Disable the TLS router
    #[arg(long)]
    no_ssl: bool,

    /// Keep plain HTTP instead of redirecting it to HTTPS
    #[arg(long)]
    no_redirect: bool,

    /// Public HTTPS port the redirect points at
    #[arg(long, default_value_t = 443)]
    ssl_port: u16,

    /// Entrypoint for HTTPS
    #[arg(long, default_value = DEFAULT_HTTPS_ENTRYPOINT)]
    entrypoint_https: String,

    /// Do not request certificates from an ACME resolver
    #[arg(long)]
    no_cert_resolver: bool,

    /// ACME resolver name
    #[arg(long, default_value = DEFAULT_CERT_RESOLVER)]
    cert_resolver: String,

    /// Network the proxy reaches the service on
    #[arg(long, default_value = DEFAULT_NETWORK)]
    network: String,

    /// Port the service listens on inside the container
    #[arg(long, default_value_t = 80)]
    service_port: u16,

    /// Enable sticky sessions on the load balancer
    #[arg(long)]
    sticky: bool,

    /// Router priority
    #[arg(long, default_value_t = 0)]
    priority: i64,

    /// Host name to route (repeatable)
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Basic-auth user as user:password (repeatable; enables basic auth)
    #[arg(long = "auth-user", value_name = "USER:PASSWORD")]
    auth_users: Vec<String>,

    /// Also store clear-text passwords in traefikConfig.clearPassword.* labels
    #[arg(long, requires = "auth_users")]
    emit_clear_passwords: bool,

    /// Add a Content-Security-Policy header middleware
    #[arg(long)]
    security_policy: bool,

    /// Add a wildcard Access-Control-Allow-Origin header middleware
    #[arg(long)]
    cors: bool,

    /// Run the generated commands
    #[arg(long, conflicts_with = "show_compose")]
    execute: bool,

    /// Skip the add step when the remove step fails
    #[arg(long, requires = "execute")]
    halt_on_failure: bool,
}

impl Cli {
    fn intent(&self) -> RoutingIntent {
        let ssl = (!self.no_ssl).then(|| SslOptions {
            entrypoint: self.entrypoint_https.clone(),
            redirect: !self.no_redirect,
            port: self.ssl_port,
            cert_resolver: (!self.no_cert_resolver).then(|| self.cert_resolver.clone()),
        });
        let auth = (!self.auth_users.is_empty()).then(|| {
            AuthOptions::new(self.auth_users.iter().cloned())
                .with_clear_passwords(self.emit_clear_passwords)
        });

        RoutingIntent {
            entrypoint_http: self.entrypoint_http.clone(),
            ssl,
            network: self.network.clone(),
            service_port: self.service_port,
            sticky: self.sticky,
            priority: self.priority,
            hosts: self
                .hosts
                .iter()
                .flat_map(|h| RoutingIntent::parse_hosts(h))
                .collect(),
            auth,
            security_policy: self.security_policy,
            cors: self.cors,
            execute: self.execute,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traefik_labels=info".parse().expect("valid log directive")),
        )
        .init();

    let cli = Cli::parse();

    let config_file = config_path();
    let mut config = ToolConfig::load(&config_file);
    if cli.local {
        config = ToolConfig::local();
        config.save(&config_file)?;
    } else if let Some(server) = &cli.remote {
        config = ToolConfig::remote(server, cli.username.as_deref(), cli.port);
        config.save(&config_file)?;
    }

    let registry = ServiceRegistry::new(SystemShell::new(config.clone()), cache_path());
    let services = registry
        .list_services(cli.filter.as_deref(), cli.no_cache)
        .context("cannot list services")?;

    let Some(wanted) = cli.service.as_deref() else {
        for service in &services {
            println!("{}\t{}", service.id, service.name);
        }
        return Ok(());
    };

    let selected = find_service(&services, wanted)
        .with_context(|| format!("service '{}' is not among the discovered services", wanted))?;
    let detail = registry
        .inspect(&selected.id)
        .context("cannot read service labels")?;

    let intent = cli.intent();
    if intent.hosts.is_empty() {
        warn!("no hosts given, router rules will be empty");
    }

    let service = Service {
        id: detail.id.clone(),
        name: detail.name.clone(),
    };
    let tx = LabelCompiler::new().compile(&service, &detail.labels, &intent)?;

    println!("{}", compose_listing(&tx));
    if cli.show_compose {
        return Ok(());
    }

    let commands = shell_commands(&tx);
    println!("{}", display_commands(&commands, &config));

    if intent.execute {
        println!("\n\n# Executing commands...");
        let policy = ExecutionPolicy {
            halt_on_failure: cli.halt_on_failure,
        };
        let outcome = Session::new(config.target())
            .with_policy(policy)
            .spawn(commands)
            .await
            .context("execution task panicked")??;

        println!("{}", comment_output(&outcome.output));
        if outcome.success() {
            info!(service = %service.name, "labels applied");
        } else {
            // The orchestrator's exit code stays in the output trailer only
            warn!(service = %service.name, exit_code = outcome.exit_code, "label update reported a failure");
        }
    }

    Ok(())
}
