//! # quantify 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/quantify.rs`

use super::FitOptions;
use crate::batch::DEFAULT_PATTERN;
use clap::Args;
use std::path::PathBuf;

/// quantify 子命令参数
#[derive(Args, Debug)]
pub struct QuantifyArgs {
    /// Spectrum file or directory of spectra
    pub input: PathBuf,

    #[command(flatten)]
    pub fit: FitOptions,

    /// Glob pattern for input files (directory mode, comma separated)
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Drop fits whose R² is below this value
    #[arg(long)]
    pub min_r2: Option<f64>,

    /// Number of consecutive spectra per sample
    #[arg(long, default_value_t = 6)]
    pub spectra_per_sample: usize,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Write per-spectrum results to this CSV file
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Write per-sample statistics to this CSV file
    #[arg(long)]
    pub samples_csv: Option<PathBuf>,
}
