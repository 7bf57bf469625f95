use std::net::IpAddr;
use std::path::PathBuf;

use agora_model::user::Role;
use agora_relay::session::DEFAULT_HISTORY_LIMIT;
use agora_utils::args::llm::LlmServices;
use clap::{Args, Parser, Subcommand};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "agora", about = "Chat with the agents of the marketplace")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    Run(Run),
    /// Change the role of a user, e.g. to make them an admin.
    SetRole(SetRole),
    /// Replace the text of a partial agent turn and mark it complete.
    CompleteTurn(CompleteTurn),
}

#[derive(Debug, Clone, Default, Args)]
#[group(multiple = true, required = false)]
pub(crate) struct Db {
    #[arg(long, help = "Min connections")]
    pub(crate) db_min_connections: Option<u32>,

    #[arg(long, help = "Max connections")]
    pub(crate) db_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct Auth {
    #[arg(long, env = "AGORA_JWT_SECRET", hide_env_values = true, help = "HS256 secret of the access tokens")]
    pub(crate) jwt_secret: String,

    #[arg(long, value_delimiter = ',')]
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone, Parser)]
pub(crate) struct Run {
    #[arg(long)]
    pub(crate) host: Option<IpAddr>,

    #[arg(short, long)]
    pub(crate) port: Option<u16>,

    #[arg(long, env = "AGORA_DB_URL", help = "sqlite:// or postgres:// url of the database")]
    pub(crate) db_url: Url,

    #[command(flatten)]
    pub(crate) db: Db,

    #[command(flatten)]
    pub(crate) auth: Auth,

    #[command(flatten)]
    pub(crate) llm_services: LlmServices,

    #[arg(long, env = "AGORA_AGENTS", help = "Agent catalog file, the built-in catalog is used if missing")]
    pub(crate) agents: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT, help = "Number of turns sent to the model")]
    pub(crate) history_limit: usize,

    #[arg(long = "sentry-dsn", help = "Sentry url")]
    pub(crate) sentry_dsn: Option<String>,

    #[arg(long, default_value = "dev", help = "Set the environment used by sentry")]
    pub(crate) env: String,
}

#[derive(Debug, Clone, Parser)]
pub(crate) struct SetRole {
    #[arg(long, env = "AGORA_DB_URL")]
    pub(crate) db_url: Url,

    pub(crate) user_id: Uuid,

    pub(crate) role: Role,
}

#[derive(Debug, Clone, Parser)]
pub(crate) struct CompleteTurn {
    #[arg(long, env = "AGORA_DB_URL")]
    pub(crate) db_url: Url,

    pub(crate) conversation_id: Uuid,

    pub(crate) turn_order: i32,

    #[arg(help = "Full text of the completed turn")]
    pub(crate) content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_role() {
        let user_id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "agora",
            "set-role",
            "--db-url",
            "sqlite://agora.sqlite",
            &user_id.to_string(),
            "admin",
        ])
        .unwrap();
        let Commands::SetRole(set_role) = cli.command else {
            panic!("expected set-role");
        };
        assert_eq!(set_role.user_id, user_id);
        assert_eq!(set_role.role, Role::Admin);
    }

    #[test]
    fn test_parse_complete_turn() {
        let conversation_id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "agora",
            "complete-turn",
            "--db-url",
            "sqlite://agora.sqlite",
            &conversation_id.to_string(),
            "3",
            "Sure, here it is.",
        ])
        .unwrap();
        let Commands::CompleteTurn(complete_turn) = cli.command else {
            panic!("expected complete-turn");
        };
        assert_eq!(complete_turn.conversation_id, conversation_id);
        assert_eq!(complete_turn.turn_order, 3);
        assert_eq!(complete_turn.content, "Sure, here it is.");
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "agora",
            "run",
            "--db-url",
            "sqlite::memory:",
            "--jwt-secret",
            "secret",
            "--origins",
            "http://localhost:5173,https://agora.example",
        ])
        .unwrap();
        let Commands::Run(run) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(run.auth.origins.len(), 2);
        assert_eq!(run.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(run.agents.is_none());
    }
}
