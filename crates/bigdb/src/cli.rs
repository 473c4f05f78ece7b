//! Clap derive structures for the `bigdb` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Kept free of crate-internal imports so `build.rs` can include it.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bigdb -- query and configure a controller's BigDB tree
#[derive(Debug, Parser)]
#[command(
    name = "bigdb",
    version,
    about = "Query and configure BigDB controllers from the command line",
    long_about = "Navigate a controller's BigDB data tree and issue data, RPC and schema\n\
        requests against any path. Paths use field-style names: `core/switch_config`\n\
        addresses `controller/core/switch-config`.",
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
    /// Controller profile to use
    #[arg(long, short = 'p', env = "BIGDB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller host or base URL (overrides profile)
    #[arg(long, short = 'H', env = "BIGDB_HOST", global = true)]
    pub host: Option<String>,

    /// Username for password login
    #[arg(long, short = 'u', env = "BIGDB_USERNAME", global = true)]
    pub user: Option<String>,

    /// Password for password login
    #[arg(long, env = "BIGDB_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Session token (skips password login)
    #[arg(long, env = "BIGDB_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Connect without authenticating
    #[arg(long, global = true)]
    pub no_auth: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "BIGDB_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (default: wait forever)
    #[arg(long, env = "BIGDB_TIMEOUT", global = true)]
    pub timeout: Option<f64>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    pub connect_timeout: Option<f64>,

    /// Retry idempotent requests on connection failures
    #[arg(long, env = "BIGDB_RETRIES", global = true)]
    pub retries: Option<u32>,

    /// Output format (default from config, else json)
    #[arg(long, short = 'o', env = "BIGDB_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table for lists of records, pretty JSON otherwise
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the data at a path
    Get(ReadArgs),

    /// Fetch the schema describing a path
    Schema(ReadArgs),

    /// Create data at a path
    Post(WriteArgs),

    /// Replace data at a path
    Put(WriteArgs),

    /// Merge data into a path
    Patch(WriteArgs),

    /// Delete the data at a path
    #[command(alias = "rm")]
    Delete(PathArgs),

    /// Invoke an RPC
    Rpc(RpcArgs),

    /// Manage fabric switches
    #[command(alias = "sw")]
    Switches(SwitchesArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Path-level verbs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct PathArgs {
    /// Path below `controller`, e.g. `core/switch_config`
    pub path: String,

    /// Equality predicate on the last segment (repeatable, in order)
    #[arg(long = "match", short = 'm', value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub matches: Vec<(String, String)>,

    /// Query parameter (repeatable)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub param: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub path: PathArgs,
}

#[derive(Debug, Args)]
pub struct BodyArgs {
    /// Request body as inline JSON
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body from a JSON file (`-` for stdin)
    #[arg(long, short = 'f')]
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    #[command(flatten)]
    pub path: PathArgs,

    #[command(flatten)]
    pub body: BodyArgs,
}

#[derive(Debug, Args)]
pub struct RpcArgs {
    #[command(flatten)]
    pub path: PathArgs,

    #[command(flatten)]
    pub body: BodyArgs,
}

/// Parse `key=value`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

// ── Switches ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SwitchesArgs {
    #[command(subcommand)]
    pub command: SwitchesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchesCommand {
    /// List switches in the fabric
    #[command(alias = "ls")]
    List,

    /// Show one switch by name or DPID
    Show(SwitchRef),

    /// Add a switch to the fabric
    Add {
        /// Switch name
        name: String,

        /// Datapath ID (e.g. 00:00:00:00:00:00:00:01)
        #[arg(long)]
        dpid: Option<String>,

        /// Fabric role (leaf, spine)
        #[arg(long)]
        role: Option<String>,

        /// Leaf group
        #[arg(long)]
        leaf_group: Option<String>,
    },

    /// Remove a switch from the fabric
    #[command(alias = "rm")]
    Remove(SwitchRef),

    /// Show a switch's interfaces
    Interfaces {
        /// Datapath ID
        dpid: String,
    },

    /// Show a switch's connections
    Connections {
        /// Datapath ID
        dpid: String,
    },

    /// Reset a switch's controller connection
    Disconnect {
        /// Datapath ID
        dpid: String,
    },
}

#[derive(Debug, Args)]
pub struct SwitchRef {
    /// Switch name
    #[arg(required_unless_present = "dpid", conflicts_with = "dpid")]
    pub name: Option<String>,

    /// Select by datapath ID instead of name
    #[arg(long)]
    pub dpid: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the current configuration (secrets redacted)
    Show,

    /// Create a profile with guided setup
    Init,

    /// List configured profiles
    Profiles,

    /// Store a password or token in the system keyring
    SetPassword {
        /// Store a session token instead of a password
        #[arg(long)]
        token: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
