use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "asit",
    about = "ASIT compliance: tree shape, leaf contracts, federation policy, evidence anchors",
    version
)]
pub struct Cli {
    /// Ruleset file (default: nearest asit.toml upwards from the working directory)
    #[arg(long, global = true)]
    pub ruleset: Option<String>,

    /// Without a subcommand, runs `check` on the working directory
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full run: tree shape, retired terms, then every present leaf
    Check {
        /// Tree root
        #[arg(long, default_value = ".")]
        root: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Tree shape and retired-term scan only
    TreeCheck {
        /// Tree root
        #[arg(long, default_value = ".")]
        root: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate one leaf directory
    LeafCheck {
        /// Leaf directory (`<DOMAIN>/<LAYER>/<LEAF>`)
        #[arg(default_value = ".")]
        path: String,

        /// Leaf kind: CB, QB, FWD, UE, FE or SE (default: from the tree shape)
        #[arg(long)]
        kind: Option<String>,

        /// Domain code (default: grandparent directory name)
        #[arg(long)]
        domain: Option<String>,

        /// Layer code (default: parent directory name)
        #[arg(long)]
        layer: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a federation contract
    FederationCheck {
        #[arg(default_value = "federation.json")]
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay a coalition event log against its trust and rekey policy
    CoalitionCheck {
        #[arg(default_value = "coalition.json")]
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a solver orchestration contract
    OrchestrationCheck {
        #[arg(default_value = "orchestration.json")]
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build, verify and inspect evidence anchors
    Anchor {
        #[command(subcommand)]
        command: AnchorCommands,
    },

    /// Print the canonical byte form of a JSON record
    Canonicalize {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        path: String,

        /// Print the SHA-256 of the canonical bytes instead
        #[arg(long)]
        hash: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum AnchorCommands {
    /// Build and sign an anchor from an event file
    Build {
        /// Event file: utcs_code, timestamp, payload fields, trace_refs
        #[arg(long, default_value = "event.json")]
        event: String,

        /// Additional trace reference (repeatable)
        #[arg(long = "trace-ref")]
        trace_refs: Vec<String>,

        /// File holding the Ed25519 seed as 64 hex characters
        #[arg(long, default_value = "anchor.key")]
        key: String,

        /// Output file, or `-` for stdout
        #[arg(long, default_value = "anchor.json")]
        out: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute the content hash and check the signature
    Verify {
        #[arg(default_value = "anchor.json")]
        path: String,

        /// File holding the Ed25519 public key as 64 hex characters
        #[arg(long, default_value = "anchor.pub")]
        public_key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the public key for a signing seed
    PublicKey {
        #[arg(long, default_value = "anchor.key")]
        key: String,
    },
}
