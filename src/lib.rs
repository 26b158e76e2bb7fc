//! # Brewlet Core Library
//!
//! This crate contains the core logic of the `brewlet` tool: a small,
//! prefix-based installer for prebuilt binary tools.
//!
//! A tool is described by a *formula*, a TOML descriptor pinning a download
//! URL and its SHA-256 checksum. Installing a formula downloads the archive,
//! verifies it, extracts it to `<prefix>/opt/<name>/libexec` and writes a
//! bash shim to `<prefix>/bin/<name>` that resolves the prefix every time it
//! runs and `exec`s the real binary.
//!
//! ## Modules Overview
//! - [`formula`] – Parsing, validation and per-platform sources of formulas
//! - [`prefix`] – Filesystem layout under the installation prefix
//! - [`fetch`] – Retrieving archives over HTTP(S) or from `file://` URLs
//! - [`extract`] – Unpacking zip and tar archives safely
//! - [`shims`] – Generating the forwarding shims
//! - [`installer`] – Installing, uninstalling and listing packages
//! - [`receipt`] – The `INSTALL_RECEIPT.json` written for each package
//! - [`util`] – Shared helpers (hashing, validation)
//! - [`global`] – Standard directories, configuration and the archive cache
//! - [`error`] – The error taxonomy

pub mod error;
pub mod extract;
pub mod fetch;
pub mod formula;
pub mod global;
pub mod installer;
pub mod prefix;
pub mod receipt;
pub mod shims;
pub mod util;

pub use error::{InstallError, Result};
pub use formula::{Formula, Source};
pub use global::cache::*;
pub use global::config::Config;
pub use installer::*;
pub use prefix::Prefix;
pub use receipt::Receipt;
pub use shims::*;
pub use util::*;
