use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mcpgate")]
#[command(author = "Webrana Team")]
#[command(version)]
#[command(about = "Discover and call tools on MCP servers over HTTP or WebSocket", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: per-user config directory)
    #[arg(short, long, global = true, env = "MCPGATE_CONFIG")]
    pub config: Option<String>,
}

/// Which server to talk to: a configured id or an ad-hoc URL.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Server id from the config file
    pub server: Option<String>,

    /// Base URL of a server that is not in the config file
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the tools a server exposes
    Discover {
        #[command(flatten)]
        target: Target,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one tool and print its raw result
    Call {
        #[command(flatten)]
        target: Target,

        /// Tool name exactly as the server expects it (e.g. `scope.name`)
        #[arg(short, long, required = true)]
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// List configured servers
    Servers,

    /// Show current configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}
