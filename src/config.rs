use std::path::PathBuf;

use clap::Parser;

/// Environment variable holding the log filter (`tracing_subscriber::EnvFilter` syntax).
pub const LOG_ENV: &str = "CONCILIADOR_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Reconcile INSALÉS order exports against YUNO or NUBCEO settlements.
#[derive(Debug, Clone, Parser)]
#[command(name = "conciliador", version, about)]
pub struct Args {
    /// Directory with the INSALÉS order exports (.csv, .xls, .xlsx).
    #[arg(long, env = "CONCILIADOR_INSALES_DIR", default_value = "insales")]
    pub insales_dir: PathBuf,

    /// Directory with the settlement exports.
    #[arg(long, env = "CONCILIADOR_LIQUIDACIONES_DIR", default_value = "liquidaciones")]
    pub liquidaciones_dir: PathBuf,

    /// Directory where `resultado_<n>` files are written.
    #[arg(long, env = "CONCILIADOR_OUTPUT_DIR", default_value = "resultados")]
    pub output_dir: PathBuf,

    /// Print the run report as JSON instead of the text summary.
    #[arg(long)]
    pub json: bool,

    /// Wait for ENTER before exiting.
    #[arg(long)]
    pub pause: bool,
}
