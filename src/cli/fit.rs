//! # fit 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fit.rs`

use super::FitOptions;
use clap::Args;
use std::path::PathBuf;

/// fit 子命令参数
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Spectrum file (two-column energy/intensity text)
    pub input: PathBuf,

    #[command(flatten)]
    pub fit: FitOptions,
}
