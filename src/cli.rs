//! CLI argument parsing with clap.

use clap::{Args, Parser, Subcommand};

/// Preview a room repainted with a catalog paint color.
#[derive(Parser, Debug)]
#[command(name = "recolor", version, about)]
pub struct Cli {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Repaint one element of a local room photo.
    Apply(ApplyArgs),
    /// Serve the `apply-color` HTTP endpoint.
    Serve(ServeArgs),
}

/// Arguments for `recolor apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the room photo.
    pub image: String,

    /// Element to repaint, e.g. "parede principal".
    #[arg(short, long)]
    pub element: String,

    /// Target color as hex, e.g. "#4A7C59".
    #[arg(short, long)]
    pub color: String,

    /// Catalog name of the color.
    #[arg(short = 'n', long)]
    pub color_name: Option<String>,

    /// Model name or short alias (defaults to the configured model).
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output format: jpeg, png, webp.
    #[arg(short, long, default_value = "jpeg")]
    pub format: String,

    /// Output file path (auto-generated if not specified).
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for `recolor serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (defaults to the configured host).
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (defaults to the configured port).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model name or short alias (defaults to the configured model).
    #[arg(short, long)]
    pub model: Option<String>,
}
