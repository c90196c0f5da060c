//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// podgrid - discover, provision and manage remote GPU compute pods.
#[derive(Parser, Debug, Clone)]
#[command(name = "podgrid")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Registry file path.
    #[arg(long, env = "PODGRID_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Skip the structured API and use CLI-output parsing directly.
    #[arg(long)]
    pub no_api: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover and compare GPU offerings.
    Resources {
        /// Resources subcommand to execute.
        #[command(subcommand)]
        command: ResourceCommands,
    },

    /// Manage remote compute pods.
    Pods {
        /// Pods subcommand to execute.
        #[command(subcommand)]
        command: PodsCommands,
    },

    /// Manage the local registry of configured pods.
    Pod {
        /// Registry subcommand to execute.
        #[command(subcommand)]
        command: RegistryCommands,
    },
}

/// Offering discovery subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ResourceCommands {
    /// List available GPU offerings.
    List(ListArgs),

    /// Compare GPU types by their cheapest offering.
    Compare(CompareArgs),

    /// List the GPU type names the external system knows.
    GpuTypes,
}

/// Arguments for `resources list`.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Filter by GPU type (e.g. H100_80GB).
    #[arg(long)]
    pub gpu_type: Option<String>,

    /// Filter by provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Preferred region.
    #[arg(long)]
    pub region: Option<String>,

    /// Minimum available count.
    #[arg(long, default_value_t = 1)]
    pub min_count: u32,

    /// Minimum cost per hour.
    #[arg(long)]
    pub min_cost: Option<f64>,

    /// Maximum cost per hour.
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Include $0.00 entries (likely placeholders).
    #[arg(long)]
    pub include_free: bool,

    /// Sort key.
    #[arg(long, value_enum, default_value_t = SortByArg::Cost)]
    pub sort_by: SortByArg,

    /// Sort in descending order.
    #[arg(long)]
    pub desc: bool,

    /// Maximum number of results to show.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

/// Sort key options for `resources list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortByArg {
    /// Hourly cost.
    Cost,
    /// Available count.
    Availability,
    /// Provider name.
    Provider,
    /// GPU type.
    GpuType,
}

/// Arguments for `resources compare`.
#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Comma-separated GPU types to compare.
    #[arg(long)]
    pub gpu_types: String,

    /// Minimum available count.
    #[arg(long, default_value_t = 1)]
    pub min_count: u32,

    /// Maximum cost per hour.
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Preferred region.
    #[arg(long)]
    pub region: Option<String>,

    /// Filter by provider.
    #[arg(long)]
    pub provider: Option<String>,
}

/// Remote pod subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum PodsCommands {
    /// Create a compute pod from the cheapest matching offering.
    Create(CreateArgs),

    /// List pods.
    List {
        /// Show all pods including terminated ones.
        #[arg(long)]
        all: bool,
    },

    /// Show a pod's current status.
    Status {
        /// Pod id; defaults to the active pod's recorded id.
        id: Option<String>,
    },

    /// Fetch a pod's logs.
    Logs {
        /// Pod id; defaults to the active pod's recorded id.
        id: Option<String>,

        /// Number of log lines to retrieve.
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: u32,
    },

    /// Terminate a pod.
    Terminate {
        /// Pod id; defaults to the active pod's recorded id.
        id: Option<String>,
    },

    /// Print the SSH command for a running pod.
    Ssh {
        /// Pod id; defaults to the active pod's recorded id.
        id: Option<String>,
    },
}

/// Arguments for `pods create`.
#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// GPU type to request (e.g. H100_80GB).
    #[arg(long)]
    pub gpu_type: String,

    /// Number of GPUs.
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Pod name; generated when omitted.
    #[arg(long)]
    pub name: Option<String>,

    /// Preferred region.
    #[arg(long)]
    pub region: Option<String>,

    /// Preferred provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Container image.
    #[arg(long, default_value = "pytorch/pytorch:2.0.1-cuda11.7-cudnn8-devel")]
    pub image: String,

    /// Disk size in GB.
    #[arg(long, default_value_t = 50)]
    pub disk_size: u32,

    /// Environment variables (KEY=value), repeatable.
    #[arg(long = "env")]
    pub env: Vec<String>,

    /// Reject offerings above this hourly cost.
    #[arg(long)]
    pub max_cost: Option<f64>,

    /// Show what would be created without creating it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Local registry subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum RegistryCommands {
    /// Record a pod configuration. The first one becomes active.
    Setup(SetupArgs),

    /// List configured pods.
    List,

    /// Make a configured pod the active one.
    Switch {
        /// Pod name.
        name: String,
    },

    /// Remove a pod configuration. Removing the active pod clears the
    /// active pointer.
    Remove {
        /// Pod name.
        name: String,
    },

    /// Show a configured pod (the active one when no name is given).
    Status {
        /// Pod name.
        name: Option<String>,

        /// Probe SSH reachability.
        #[arg(long)]
        probe: bool,
    },
}

/// Arguments for `pod setup`.
#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    /// Unique pod name.
    pub name: String,

    /// SSH target (user@host, `ssh ` prefix tolerated).
    pub ssh: String,

    /// Probe reachability before saving.
    #[arg(long)]
    pub test_connection: bool,

    /// Treat an unreachable target as fatal instead of a warning.
    #[arg(long, requires = "test_connection")]
    pub strict: bool,

    /// Provider name to record.
    #[arg(long)]
    pub provider: Option<String>,

    /// Region to record.
    #[arg(long)]
    pub region: Option<String>,

    /// GPU type to record.
    #[arg(long)]
    pub gpu_type: Option<String>,

    /// GPU count to record.
    #[arg(long)]
    pub gpu_count: Option<u32>,

    /// Hourly cost to record.
    #[arg(long)]
    pub cost_per_hour: Option<f64>,

    /// External pod id to record.
    #[arg(long)]
    pub pod_id: Option<String>,
}
