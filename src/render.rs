//! Rendering a label transaction as orchestrator commands or as a
//! compose-style listing

use crate::config::ToolConfig;
use crate::labels::{escape_double_quoted, LabelTransaction};

/// First line of the compose listing
pub const COMPOSE_HEADER: &str = "# Showing in a compose format and as shell comments";

/// Output form of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// `docker service update` invocations, remove first
    ShellCommands,
    /// `- "key=value"` lines for a compose `labels:` block
    ComposeListing,
}

/// Render a transaction in the given mode
pub fn render(tx: &LabelTransaction, mode: RenderMode) -> String {
    match mode {
        RenderMode::ShellCommands => shell_commands(tx).join("\n"),
        RenderMode::ComposeListing => compose_listing(tx),
    }
}

/// The remove command followed by the add command.
///
/// No remove command is produced when nothing is managed yet; a bare
/// `docker service update` would still roll the service.
pub fn shell_commands(tx: &LabelTransaction) -> Vec<String> {
    let mut commands = Vec::with_capacity(2);

    if !tx.remove_keys.is_empty() {
        let flags = tx
            .remove_keys
            .iter()
            .map(|key| format!("--label-rm \"{}\"", escape_double_quoted(key)))
            .collect();
        commands.push(update_command(flags, &tx.service_name));
    }

    if !tx.add_entries.is_empty() {
        let flags = tx
            .add_entries
            .iter()
            .map(|entry| format!("--label-add \"{}\"", entry.shell_literal()))
            .collect();
        commands.push(update_command(flags, &tx.service_name));
    }

    commands
}

fn update_command(flags: Vec<String>, service_name: &str) -> String {
    format!(
        "docker service update \\\n{} \\\n{}",
        flags.join(" \\\n"),
        shell_words::quote(service_name)
    )
}

/// Added labels as compose list items with literal values
pub fn compose_listing(tx: &LabelTransaction) -> String {
    let mut lines = Vec::with_capacity(tx.add_entries.len() + 1);
    lines.push(COMPOSE_HEADER.to_string());
    for entry in &tx.add_entries {
        lines.push(format!("- \"{}\"", entry.literal()));
    }
    lines.join("\n")
}

/// Commands as they would be typed by the operator: wrapped in the remote
/// shell template when the configuration targets a remote host.
pub fn display_commands(commands: &[String], config: &ToolConfig) -> String {
    commands
        .iter()
        .map(|cmd| {
            if config.remote {
                config.wrap(cmd)
            } else {
                cmd.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix every line of session output with `# `
pub fn comment_output(output: &str) -> String {
    output
        .split('\n')
        .map(|line| format!("# {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelEntry;

    fn transaction() -> LabelTransaction {
        LabelTransaction {
            service_name: "web_app".to_string(),
            remove_keys: vec![
                "traefik.enable".to_string(),
                "traefik.http.routers.web-app.rule".to_string(),
            ],
            add_entries: vec![
                LabelEntry::new("traefik.enable", "true"),
                LabelEntry::new("traefik.http.routers.web-app.rule", "Host(`a.com`)"),
            ],
        }
    }

    #[test]
    fn test_shell_commands() {
        let commands = shell_commands(&transaction());
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            "docker service update \\\n\
             --label-rm \"traefik.enable\" \\\n\
             --label-rm \"traefik.http.routers.web-app.rule\" \\\n\
             web_app"
        );
        assert_eq!(
            commands[1],
            "docker service update \\\n\
             --label-add \"traefik.enable=true\" \\\n\
             --label-add \"traefik.http.routers.web-app.rule=Host(\\`a.com\\`)\" \\\n\
             web_app"
        );
    }

    #[test]
    fn test_empty_remove_set_skipped() {
        let mut tx = transaction();
        tx.remove_keys.clear();
        let commands = shell_commands(&tx);
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("--label-add"));
        assert!(!commands[0].contains("--label-rm"));
    }

    #[test]
    fn test_compose_listing() {
        let listing = compose_listing(&transaction());
        assert_eq!(
            listing,
            "# Showing in a compose format and as shell comments\n\
             - \"traefik.enable=true\"\n\
             - \"traefik.http.routers.web-app.rule=Host(`a.com`)\""
        );
        assert_eq!(render(&transaction(), RenderMode::ComposeListing), listing);
    }

    #[test]
    fn test_display_commands() {
        let commands = vec!["docker service ls".to_string()];
        assert_eq!(
            display_commands(&commands, &ToolConfig::local()),
            "docker service ls"
        );
        assert_eq!(
            display_commands(&commands, &ToolConfig::remote("h", None, None)),
            "ssh -p 22 root@h 'docker service ls'"
        );
    }

    #[test]
    fn test_comment_output() {
        assert_eq!(comment_output("a\nb"), "# a\n# b");
        assert_eq!(comment_output(""), "# ");
    }
}
