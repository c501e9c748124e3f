use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use permissions::authz::{Action, Role};
use permissions::{settings, storage};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "permissions",
    version,
    about = "Inspect and edit the authorization policy"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether SUBJECT may perform ACTION on RESOURCE
    Check {
        subject: String,
        resource: String,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Grant SUBJECT (a user or a group) ACTION on RESOURCE
    Grant {
        subject: String,
        resource: String,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Revoke a single grant
    Revoke {
        subject: String,
        resource: String,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Give USER a ROLE in GROUP; existing roles are kept
    AddMember {
        user: String,
        group: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Take one ROLE in GROUP away from USER
    RemoveMember {
        user: String,
        group: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Drop every grant on RESOURCE
    RemoveResource { resource: String },
    /// List the groups USER belongs to with their highest role
    Roles { user: String },
    /// List the members of GROUP with their highest role
    Members { group: String },
    /// List the configured system administrators
    Admins,
}

fn parse_action(s: &str) -> std::result::Result<Action, String> {
    Action::parse(s).ok_or_else(|| format!("unknown action `{s}` (expected read or write)"))
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("unknown role `{s}` (expected owner, admin or member)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    // init storage (database) and the engine on top of it
    let engine = storage::open_engine(&settings.database, &settings.authz.system_admins).await?;

    let output = match cli.command {
        Command::Check {
            subject,
            resource,
            action,
        } => {
            let decision = engine.explain(&subject, &resource, action);
            json!({
                "allowed": decision.is_allowed(),
                "decision": format!("{decision:?}"),
            })
        }
        Command::Grant {
            subject,
            resource,
            action,
        } => json!({ "changed": engine.add_permission(&subject, &resource, action).await? }),
        Command::Revoke {
            subject,
            resource,
            action,
        } => json!({ "changed": engine.remove_permission(&subject, &resource, action).await? }),
        Command::AddMember { user, group, role } => {
            json!({ "changed": engine.add_user_group_role(&user, &group, role).await? })
        }
        Command::RemoveMember { user, group, role } => {
            json!({ "changed": engine.remove_user_group_role(&user, &group, role).await? })
        }
        Command::RemoveResource { resource } => {
            json!({ "changed": engine.remove_resource(&resource).await? })
        }
        Command::Roles { user } => json!(engine.get_groups_and_roles_for_user(&user)),
        Command::Members { group } => json!(engine.members_of_group(&group)),
        Command::Admins => {
            let mut admins: Vec<String> = engine.system_admins().iter().cloned().collect();
            admins.sort();
            json!(admins)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&output).into_diagnostic()?
    );
    Ok(())
}
