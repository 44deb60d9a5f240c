//! # calibrations 子命令 CLI 定义
//!
//! 校准存储管理：list / show / delete / reset / export / import
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calibrations.rs`

use crate::models::Element;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// calibrations 主命令参数
#[derive(Args, Debug)]
pub struct CalibrationsArgs {
    #[command(subcommand)]
    pub command: CalibrationsCommands,
}

/// calibrations 子命令
#[derive(Subcommand, Debug)]
pub enum CalibrationsCommands {
    /// List stored calibrations
    List,

    /// Show one calibration with its standards and quality report
    Show {
        /// Element symbol
        element: Element,
    },

    /// Delete one calibration (element reverts to the default)
    Delete {
        /// Element symbol
        element: Element,
    },

    /// Delete all calibrations
    Reset {
        /// Confirm the reset
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Export calibrations to JSON
    Export {
        /// Only these elements (comma separated)
        #[arg(long, value_delimiter = ',')]
        elements: Vec<Element>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import calibrations from JSON
    Import {
        /// Exported calibration file
        file: PathBuf,

        /// Keep existing calibrations instead of replacing them
        #[arg(long, default_value_t = false)]
        no_overwrite: bool,
    },
}
