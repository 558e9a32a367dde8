use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "vmshift",
    about = "vmshift — least-utilized VM placement for hypervisor clusters",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Cluster snapshot (JSON) to read and update
    #[arg(short, long, global = true, default_value = "cluster.json")]
    inventory: PathBuf,
    /// vmshift.toml with placement defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Compute and report, but do not write the snapshot back
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place a single VM
    Vm {
        #[command(subcommand)]
        action: VmAction,
    },
    /// Drain, rebalance or service a host
    Host {
        #[command(subcommand)]
        action: HostAction,
    },
    /// Inspect a cluster
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
    /// Write a vmshift.toml with every default spelled out
    Init {
        #[arg(short, long, default_value = "vmshift.toml")]
        path: PathBuf,
    },
}

/// Policy flags shared by the placement commands.
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Keep the VM's current host as a candidate
    #[arg(long)]
    pub rebalance: bool,
    /// Ignore the CPU and memory utilization caps
    #[arg(long)]
    pub no_limit: bool,
    /// Power VMs off before relocating and back on afterwards
    #[arg(long)]
    pub cold_migrate: bool,
    /// VM to leave where it is (repeatable)
    #[arg(long)]
    pub skip: Vec<String>,
}

#[derive(Subcommand)]
enum VmAction {
    /// Move a VM to the least utilized eligible host
    Migrate {
        name: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Show the ranked targets for a VM without moving it
    Plan {
        name: String,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum HostAction {
    /// Migrate a host's VMs, heaviest first, until one has nowhere better to go
    Migrate {
        name: String,
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Spread a host's VMs round-robin over hosts below the cluster average
    Rebalance {
        name: String,
        /// Upper bound on relocations (default from config, else 6)
        #[arg(long)]
        max_migrations: Option<u32>,
        #[command(flatten)]
        policy: PolicyArgs,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Enter or exit maintenance mode
    #[command(group(ArgGroup::new("mode").required(true).args(["enter", "exit"])))]
    Maintenance {
        name: String,
        #[arg(long)]
        enter: bool,
        #[arg(long)]
        exit: bool,
        /// Drain the host before entering maintenance mode
        #[arg(long, requires = "enter", conflicts_with = "exit")]
        migrate_vms: bool,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Reboot a host that is already in maintenance mode
    Reboot { name: String },
    /// Reconnect a host the control plane has lost
    Reconnect { name: String },
}

#[derive(Subcommand)]
enum ClusterAction {
    /// List hosts that are not reporting green
    Health {
        name: String,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List VMs the control plane reports as "Unknown"
    UnknownVms {
        name: String,
        /// Power off and destroy them
        #[arg(long)]
        destroy: bool,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vmshift=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        return commands::init(path);
    }

    let session = commands::Session::open(&cli.inventory, cli.config.as_deref())?;

    let lines = match cli.command {
        Commands::Vm { action } => match action {
            VmAction::Migrate { name, policy } => commands::vm::migrate(&session, &name, &policy),
            VmAction::Plan {
                name,
                policy,
                format,
            } => commands::vm::plan(&session, &name, &policy, &format),
        },
        Commands::Host { action } => match action {
            HostAction::Migrate {
                name,
                policy,
                format,
            } => commands::host::migrate(&session, &name, &policy, &format),
            HostAction::Rebalance {
                name,
                max_migrations,
                policy,
                format,
            } => commands::host::rebalance(&session, &name, max_migrations, &policy, &format),
            HostAction::Maintenance {
                name,
                enter,
                migrate_vms,
                policy,
                ..
            } => commands::host::maintenance(&session, &name, enter, migrate_vms, &policy),
            HostAction::Reboot { name } => commands::host::reboot(&session, &name),
            HostAction::Reconnect { name } => commands::host::reconnect(&session, &name),
        },
        Commands::Cluster { action } => match action {
            ClusterAction::Health { name, format } => {
                commands::cluster::health(&session, &name, &format)
            }
            ClusterAction::UnknownVms {
                name,
                destroy,
                format,
            } => commands::cluster::unknown_vms(&session, &name, destroy, &format),
        },
        Commands::Init { .. } => unreachable!("handled above"),
    };

    // Moves that happened before a failure are real; persist them either way.
    if !cli.dry_run {
        session.save()?;
    }

    for line in lines? {
        println!("{line}");
    }
    Ok(())
}
