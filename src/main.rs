mod handlers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wishchat_analytics::views::{ChatbotSort, OrganizationSort};
use wishchat_core::commands::{AdminCommand, NewCoupon, NewPlan, NewStaff};
use wishchat_core::config::AppConfig;
use wishchat_core::types::{LogKind, MonthKey};

#[derive(Parser)]
#[command(
    name = "wishchat-admin",
    about = "Administrative analytics and reporting for the wishchat platform",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/wishchat-admin/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the snapshot directory
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Dashboard report for a month (default)
    Report {
        /// Month to report on (YYYY-MM); defaults to the current month
        #[arg(short, long)]
        month: Option<MonthKey>,
        /// Print a compact text summary instead of markdown
        #[arg(long)]
        text: bool,
    },

    /// List selectable report months
    Months {
        /// Number of months to list
        #[arg(short = 'n', long, default_value_t = 12)]
        count: usize,
    },

    /// List organizations
    Orgs {
        /// Case-insensitive name filter
        #[arg(short, long, default_value = "")]
        search: String,
        /// Sort field: name, members, chatbots, tokens
        #[arg(long, default_value = "tokens")]
        sort: OrganizationSort,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },

    /// Chatbots, sending capacity, and token split for one organization
    Org { id: i64 },

    /// List chatbots across organizations
    Chatbots {
        /// Case-insensitive chatbot or organization name filter
        #[arg(short, long, default_value = "")]
        search: String,
        /// Sort field: name, organization, tokens
        #[arg(long, default_value = "tokens")]
        sort: ChatbotSort,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
        /// Only chatbots above 80% of their message limit
        #[arg(long)]
        low_quota: bool,
    },

    /// Quota details for one chatbot
    Chatbot { id: i64 },

    /// Coupons and subscription plans
    Billing {
        /// Case-insensitive coupon code filter
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Activity log
    Logs {
        #[command(subcommand)]
        action: Option<LogsAction>,
    },

    /// Prepare an administrative change and record it in the activity log
    Command {
        #[command(subcommand)]
        command: CommandArgs,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub(crate) enum LogsAction {
    /// List entries grouped by day, newest first
    List {
        /// Only entries of this kind
        #[arg(short, long)]
        kind: Option<LogKind>,
        /// Only entries recorded by this user
        #[arg(short, long)]
        user: Option<String>,
        /// Case-insensitive description filter
        #[arg(short, long, default_value = "")]
        search: String,
        /// Include server-side activity from the snapshot
        #[arg(long)]
        server: bool,
    },
    /// Print the local log as plain text
    Export,
}

#[derive(Subcommand)]
pub(crate) enum CommandArgs {
    /// Set a chatbot's message limit
    SetLimit { chatbot: i64, limit: i64 },
    /// Grant extra messages for the current period
    Boost { chatbot: i64, messages: i64 },
    /// Set the grace period in days
    GracePeriod { chatbot: i64, days: i64 },
    /// Allow a chatbot to send messages
    EnableSending { chatbot: i64 },
    /// Stop a chatbot from sending messages
    DisableSending { chatbot: i64 },
    /// Grant the lifetime plan
    AssignLifetime { chatbot: i64 },
    /// Revoke the lifetime plan
    RevokeLifetime { chatbot: i64 },
    /// Delete a subscription plan
    DeletePlan { plan: i64 },
    /// Create a subscription plan
    CreatePlan {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        message_limit: i64,
        #[arg(long, default_value_t = 0)]
        trial_days: i64,
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        lifetime: bool,
        #[arg(long)]
        auto_reset: bool,
    },
    /// Create a coupon code
    CreateCoupon {
        #[arg(long)]
        code: String,
        #[arg(long)]
        discount: f64,
        #[arg(long)]
        max_usage: i64,
        #[arg(long)]
        inactive: bool,
    },
    /// Create a staff account
    CreateStaff {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "WISHCHAT_STAFF_PASSWORD")]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

impl CommandArgs {
    pub(crate) fn into_admin_command(self) -> AdminCommand {
        match self {
            CommandArgs::SetLimit { chatbot, limit } => AdminCommand::UpdateMessageLimit {
                chatbot_id: chatbot,
                message_limit: limit,
            },
            CommandArgs::Boost { chatbot, messages } => AdminCommand::AddTemporaryBoost {
                chatbot_id: chatbot,
                additional_messages: messages,
            },
            CommandArgs::GracePeriod { chatbot, days } => AdminCommand::UpdateGracePeriod {
                chatbot_id: chatbot,
                grace_period_days: days,
            },
            CommandArgs::EnableSending { chatbot } => AdminCommand::SetSending {
                chatbot_id: chatbot,
                enabled: true,
            },
            CommandArgs::DisableSending { chatbot } => AdminCommand::SetSending {
                chatbot_id: chatbot,
                enabled: false,
            },
            CommandArgs::AssignLifetime { chatbot } => {
                AdminCommand::AssignLifetime { chatbot_id: chatbot }
            }
            CommandArgs::RevokeLifetime { chatbot } => {
                AdminCommand::RevokeLifetime { chatbot_id: chatbot }
            }
            CommandArgs::DeletePlan { plan } => AdminCommand::DeletePlan { plan_id: plan },
            CommandArgs::CreatePlan {
                name,
                price,
                message_limit,
                trial_days,
                inactive,
                lifetime,
                auto_reset,
            } => AdminCommand::CreatePlan(NewPlan {
                name,
                price,
                message_limit,
                trial_days,
                is_active: !inactive,
                is_lifetime: lifetime,
                auto_reset_quota: auto_reset,
            }),
            CommandArgs::CreateCoupon {
                code,
                discount,
                max_usage,
                inactive,
            } => AdminCommand::CreateCoupon(NewCoupon {
                code,
                discount_percent: discount,
                max_usage,
                is_active: !inactive,
            }),
            CommandArgs::CreateStaff {
                email,
                username,
                password,
                first_name,
                last_name,
            } => AdminCommand::CreateStaff(NewStaff {
                email,
                username,
                password,
                first_name,
                last_name,
            }),
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wishchat_admin=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Apply CLI overrides.
    if let Some(dir) = &cli.snapshot_dir {
        config.snapshot.dir = Some(dir.clone());
    }

    tracing::debug!(
        "Snapshot dir: {}, activity log: {}",
        config.snapshot_dir().display(),
        config.activity_log_path().display(),
    );

    match cli.command {
        Some(Commands::Report { month, text }) => {
            handlers::report(&config, month, text)?;
        }
        None => {
            handlers::report(&config, None, false)?;
        }
        Some(Commands::Months { count }) => {
            handlers::months(&config, count)?;
        }
        Some(Commands::Orgs { search, sort, asc }) => {
            handlers::organizations(&config, &search, sort, asc)?;
        }
        Some(Commands::Org { id }) => {
            handlers::organization_detail(&config, id)?;
        }
        Some(Commands::Chatbots {
            search,
            sort,
            asc,
            low_quota,
        }) => {
            handlers::chatbots(&config, &search, sort, asc, low_quota)?;
        }
        Some(Commands::Chatbot { id }) => {
            handlers::chatbot_detail(&config, id)?;
        }
        Some(Commands::Billing { search }) => {
            handlers::billing(&config, &search)?;
        }
        Some(Commands::Logs { action }) => {
            handlers::logs(&config, action)?;
        }
        Some(Commands::Command { command }) => {
            handlers::admin_command(&config, command.into_admin_command())?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config)?;
        }
    }

    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_report_month() {
        let cli = Cli::try_parse_from(["wishchat-admin", "report", "--month", "2025-04"]).unwrap();
        match cli.command {
            Some(Commands::Report { month, text }) => {
                assert_eq!(month, Some(MonthKey::new(2025, 4).unwrap()));
                assert!(!text);
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_month_and_sort() {
        assert!(Cli::try_parse_from(["wishchat-admin", "report", "--month", "April"]).is_err());
        assert!(Cli::try_parse_from(["wishchat-admin", "orgs", "--sort", "size"]).is_err());
    }

    #[test]
    fn test_cli_command_maps_to_admin_command() {
        let cli = Cli::try_parse_from([
            "wishchat-admin",
            "command",
            "create-coupon",
            "--code",
            "SPRING",
            "--discount",
            "15",
            "--max-usage",
            "100",
        ])
        .unwrap();
        let Some(Commands::Command { command }) = cli.command else {
            panic!("expected command");
        };
        assert_eq!(
            command.into_admin_command(),
            AdminCommand::CreateCoupon(NewCoupon {
                code: "SPRING".into(),
                discount_percent: 15.0,
                max_usage: 100,
                is_active: true,
            })
        );
    }

    #[test]
    fn test_cli_parses_org_detail() {
        let cli = Cli::try_parse_from(["wishchat-admin", "org", "7"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Org { id: 7 })));
        assert!(Cli::try_parse_from(["wishchat-admin", "org", "acme"]).is_err());
    }

    #[test]
    fn test_cli_disable_sending() {
        let cli =
            Cli::try_parse_from(["wishchat-admin", "command", "disable-sending", "42"]).unwrap();
        let Some(Commands::Command { command }) = cli.command else {
            panic!("expected command");
        };
        assert_eq!(
            command.into_admin_command(),
            AdminCommand::SetSending {
                chatbot_id: 42,
                enabled: false
            }
        );
    }
}
