use std::path::PathBuf;

use clap::Parser;

/// sage AI question router
#[derive(Debug, Parser)]
#[command(
    name = "sage",
    about = "Route a question across AI providers with automatic failover"
)]
pub struct Args {
    /// The question to ask
    pub question: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "sage.toml", env = "SAGE_CONFIG")]
    pub config: PathBuf,

    /// Force a specific provider to the head of the candidate list
    #[arg(long, env = "SAGE_PROVIDER")]
    pub provider: Option<String>,

    /// Use a specific model instead of the provider's default
    #[arg(long)]
    pub model: Option<String>,

    /// Response-language hint (e.g. zh-CN)
    #[arg(long)]
    pub locale: Option<String>,
}
