use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Print the installation prefix and exit
    #[clap(long)]
    pub(crate) prefix: bool,

    /// Increase log output (-v, -vv, -vvv)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,

    #[command(subcommand)]
    pub(crate) command: Option<BrewletCommand>,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum BrewletCommand {
    /// Download, verify and install a formula, then write its shim to `<prefix>/bin`
    Install {
        /// Path to a formula `.toml`, or the name of a known formula
        formula: String,
    },
    /// Remove `<prefix>/opt/<name>` and the shim `<prefix>/bin/<name>`
    Uninstall {
        name: String,
    },
    /// List installed packages
    List,
    /// Show a formula and whether it is installed
    Info {
        formula: String,
    },
    /// Output the executable and shim paths if they exist
    Which {
        name: String,
    },
    /// Download and verify a formula's archive into the cache without installing
    Fetch {
        formula: String,
    },
    /// Print the SHA-256 of a local file or URL
    Sha256 {
        /// File path, `file://` or `http(s)://` URL
        source: String,
    },
    /// Point a formula file at a new release, pinning the new archive's checksum
    Bump {
        /// Path to the formula `.toml` to rewrite
        formula: String,
        /// New version (semver, no leading 'v')
        #[clap(long)]
        version: String,
        /// Download URL of the new release
        #[clap(long)]
        url: String,
    },
    /// Remove all cached archives
    Cleanup,
}
