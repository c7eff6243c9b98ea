//! Clap derive structures for the `community` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use community_core::Page;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// community -- watch and act on Community platform services
#[derive(Debug, Parser)]
#[command(
    name = "community",
    version,
    about = "Follow services, employees, proposals and reviews from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "COMMUNITY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// API base URL (overrides config)
    #[arg(long, short = 'u', env = "COMMUNITY_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Session token (overrides keyring and config)
    #[arg(long, env = "COMMUNITY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Author name shown on optimistic rows
    #[arg(long, env = "COMMUNITY_DISPLAY_NAME", global = true)]
    pub display_name: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Page presets, as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PageArg {
    /// Service detail
    Service,
    /// Employee roster
    Employees,
    /// Service + proposals
    Proposals,
    /// Service + reviews
    Reviews,
}

impl From<PageArg> for Page {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::Service => Page::ServiceDetail,
            PageArg::Employees => Page::Employees,
            PageArg::Proposals => Page::Proposals,
            PageArg::Reviews => Page::Reviews,
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a page once and print it
    Show(ShowArgs),

    /// Poll a page and print every change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Remove an employee from a service
    Unlink(UnlinkArgs),

    /// Follow a service
    Follow(ServiceArgs),

    /// Stop following a service
    Unfollow(ServiceArgs),

    /// Raise a proposal on a service
    Propose(ProposeArgs),

    /// Review a service
    Review(ReviewArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub page: PageArg,
    /// Service id
    pub service: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub page: PageArg,
    /// Service id
    pub service: String,

    /// Poll period in milliseconds (overrides config)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Exit after this many updates
    #[arg(long)]
    pub updates: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Service id
    pub service: String,
}

#[derive(Debug, Args)]
pub struct UnlinkArgs {
    /// Service id
    pub service: String,
    /// Employee id
    pub employee: u64,
}

#[derive(Debug, Args)]
pub struct ProposeArgs {
    /// Service id
    pub service: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: String,
    /// Last day of debate (YYYY-MM-DD)
    #[arg(long)]
    pub debate_end: String,
    /// Last day of deliberation (YYYY-MM-DD)
    #[arg(long)]
    pub deliberation_end: String,
}

#[derive(Debug, Args)]
pub struct ReviewArgs {
    /// Service id
    pub service: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: String,
    /// Rating from 1 to 5
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub rating: u8,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (secrets masked)
    Show,
    /// Print the config file path
    Path,
    /// Store the session token in the system keyring
    SetToken {
        /// Token value (prompted for when omitted)
        #[arg(long)]
        value: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}
