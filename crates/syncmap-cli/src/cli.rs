use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "syncmap")]
#[command(about = "Link internal records to their integration counterparts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to sync configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the internal object an integration change refers to
    Resolve {
        /// Integration that reported the change
        #[arg(long)]
        integration: String,
        /// Internal object type to resolve to
        #[arg(long, value_name = "TYPE")]
        object_type: String,
        /// Change descriptor JSON (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Find the integration object an internal change is mapped to
    Reverse {
        /// Integration to look up
        #[arg(long)]
        integration: String,
        /// Integration object type to resolve to
        #[arg(long, value_name = "TYPE")]
        object_type: String,
        /// Change descriptor JSON (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Record synced objects from reconciliation events, one JSON object per line
    Reconcile {
        /// Events file (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Register or remove identifier values of an internal object
    Index {
        /// Internal object type
        #[arg(long, value_name = "TYPE")]
        object_type: String,
        /// Internal object id
        #[arg(long)]
        id: String,
        /// Identifier value, repeatable
        #[arg(
            long = "field",
            value_name = "NAME=VALUE",
            required_unless_present = "remove",
            conflicts_with = "remove"
        )]
        fields: Vec<String>,
        /// Drop every identifier value of the object
        #[arg(long)]
        remove: bool,
    },
    /// List stored mappings of an integration
    Mappings {
        /// Integration name
        #[arg(long)]
        integration: String,
        /// Number of mappings to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
