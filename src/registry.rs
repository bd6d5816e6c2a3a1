//! Service discovery and label introspection
//!
//! The candidate list comes from `docker service ls`, cached verbatim in a
//! plain-text file until the operator bypasses the cache. Labels come from a
//! per-service `docker service inspect`.

use crate::config::ToolConfig;
use crate::error::{LabelError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

/// Discovery query; one `id,name` line per service
pub const LIST_SERVICES_CMD: &str = r#"docker service ls --format "{{.ID}},{{.Name}}""#;

/// A running orchestrator service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    pub name: String,
}

/// Result of inspecting a single service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetail {
    pub id: String,
    /// Name from the service spec
    pub name: String,
    /// Every label on the service, managed or not
    pub labels: BTreeMap<String, String>,
}

/// Runs a command string through the configured shell and captures stdout
pub trait ShellRunner {
    fn capture(&self, command: &str) -> std::result::Result<String, String>;
}

impl<T: ShellRunner + ?Sized> ShellRunner for &T {
    fn capture(&self, command: &str) -> std::result::Result<String, String> {
        (**self).capture(command)
    }
}

/// [`ShellRunner`] that wraps commands with the configured template and
/// hands them to `sh -c`
#[derive(Debug, Clone)]
pub struct SystemShell {
    config: ToolConfig,
}

impl SystemShell {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }
}

impl ShellRunner for SystemShell {
    fn capture(&self, command: &str) -> std::result::Result<String, String> {
        let wrapped = self.config.wrap(command);
        debug!(command = %wrapped, "running orchestrator query");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&wrapped)
            .output()
            .map_err(|e| format!("failed to spawn shell: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(if stderr.is_empty() {
                format!("command exited with {}", output.status)
            } else {
                format!("command exited with {}: {}", output.status, stderr)
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Spec")]
    spec: InspectSpec,
}

#[derive(Debug, Deserialize)]
struct InspectSpec {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Labels", default)]
    labels: Option<BTreeMap<String, String>>,
}

/// Discovers services and reads their labels
pub struct ServiceRegistry<R> {
    runner: R,
    cache_path: PathBuf,
}

impl<R: ShellRunner> ServiceRegistry<R> {
    pub fn new(runner: R, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            cache_path: cache_path.into(),
        }
    }

    /// List services, optionally filtered by a case-sensitive name substring.
    ///
    /// The cache file is used when present unless `bypass_cache` is set; a
    /// fresh query overwrites it.
    pub fn list_services(&self, filter: Option<&str>, bypass_cache: bool) -> Result<Vec<Service>> {
        let raw = match self.read_cache(bypass_cache) {
            Some(raw) => raw,
            None => self.query_services()?,
        };

        let services: Vec<Service> = parse_services(&raw)
            .into_iter()
            .filter(|s| filter.map_or(true, |f| s.name.contains(f)))
            .collect();

        debug!(count = services.len(), filter = ?filter, "services listed");
        Ok(services)
    }

    fn read_cache(&self, bypass_cache: bool) -> Option<String> {
        if bypass_cache || !self.cache_path.exists() {
            return None;
        }

        match std::fs::read_to_string(&self.cache_path) {
            Ok(raw) => {
                debug!(path = %self.cache_path.display(), "using cached service list");
                Some(raw)
            }
            Err(e) => {
                warn!(path = %self.cache_path.display(), error = %e, "unreadable service cache, querying");
                None
            }
        }
    }

    fn query_services(&self) -> Result<String> {
        let raw = self
            .runner
            .capture(LIST_SERVICES_CMD)
            .map_err(LabelError::Discovery)?;

        if let Err(e) = std::fs::write(&self.cache_path, &raw) {
            warn!(path = %self.cache_path.display(), error = %e, "failed to write service cache");
        } else {
            info!(path = %self.cache_path.display(), "service cache refreshed");
        }

        Ok(raw)
    }

    /// Inspect a service by id (or name)
    pub fn inspect(&self, service: &str) -> Result<ServiceDetail> {
        let command = format!("docker service inspect {}", shell_words::quote(service));
        let raw = self
            .runner
            .capture(&command)
            .map_err(|reason| LabelError::Inspection {
                service: service.to_string(),
                reason,
            })?;

        parse_inspect(service, &raw)
    }

    /// Full label map of a service
    pub fn get_labels(&self, service: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.inspect(service)?.labels)
    }
}

/// Parse `id,name` discovery lines; lines without a name are skipped
pub fn parse_services(data: &str) -> Vec<Service> {
    data.lines()
        .filter_map(|line| {
            let mut parts = line.trim_end_matches('\r').split(',');
            let id = parts.next()?;
            let name = parts.next().filter(|n| !n.is_empty())?;
            Some(Service {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Parse `docker service inspect` JSON output
pub fn parse_inspect(service: &str, raw: &str) -> Result<ServiceDetail> {
    let inspection_err = |reason: String| LabelError::Inspection {
        service: service.to_string(),
        reason,
    };

    let entries: Vec<InspectEntry> =
        serde_json::from_str(raw).map_err(|e| inspection_err(format!("invalid inspect output: {}", e)))?;
    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| inspection_err("inspect returned no services".to_string()))?;

    Ok(ServiceDetail {
        id: if entry.id.is_empty() {
            service.to_string()
        } else {
            entry.id
        },
        name: entry.spec.name,
        labels: entry.spec.labels.unwrap_or_default(),
    })
}

/// Find a service by exact id or exact name
pub fn find_service<'a>(services: &'a [Service], needle: &str) -> Option<&'a Service> {
    services
        .iter()
        .find(|s| s.id == needle)
        .or_else(|| services.iter().find(|s| s.name == needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services() {
        let services = parse_services("abc123,api-svc\ndef456,web-svc\n\n");
        assert_eq!(
            services,
            vec![
                Service {
                    id: "abc123".to_string(),
                    name: "api-svc".to_string()
                },
                Service {
                    id: "def456".to_string(),
                    name: "web-svc".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_services_skips_nameless_lines() {
        let services = parse_services("orphan\nabc,ok\r\nxyz,\n");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "ok");
    }

    #[test]
    fn test_parse_inspect() {
        let raw = r#"[{"ID":"abc123","Spec":{"Name":"web_app","Labels":{"traefik.enable":"true","com.docker.stack.namespace":"web"}}}]"#;
        let detail = parse_inspect("abc123", raw).unwrap();
        assert_eq!(detail.id, "abc123");
        assert_eq!(detail.name, "web_app");
        assert_eq!(detail.labels.len(), 2);
        assert_eq!(detail.labels["traefik.enable"], "true");
    }

    #[test]
    fn test_parse_inspect_null_labels() {
        let raw = r#"[{"Spec":{"Name":"bare","Labels":null}}]"#;
        let detail = parse_inspect("bare", raw).unwrap();
        assert_eq!(detail.id, "bare");
        assert!(detail.labels.is_empty());
    }

    #[test]
    fn test_parse_inspect_errors() {
        assert!(matches!(
            parse_inspect("x", "[]"),
            Err(LabelError::Inspection { .. })
        ));
        assert!(matches!(
            parse_inspect("x", "Error: no such service: x"),
            Err(LabelError::Inspection { .. })
        ));
    }

    #[test]
    fn test_find_service() {
        let services = parse_services("abc,api\ndef,web\n");
        assert_eq!(find_service(&services, "def").unwrap().name, "web");
        assert_eq!(find_service(&services, "api").unwrap().id, "abc");
        assert!(find_service(&services, "ap").is_none());
    }
}
