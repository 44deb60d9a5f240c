//! # standards 子命令 CLI 定义
//!
//! 标准样品目录管理：list / add / remove / enable / disable
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/standards.rs`

use crate::models::Element;
use clap::{Args, Subcommand};

/// standards 主命令参数
#[derive(Args, Debug)]
pub struct StandardsArgs {
    #[command(subcommand)]
    pub command: StandardsCommands,
}

/// standards 子命令
#[derive(Subcommand, Debug)]
pub enum StandardsCommands {
    /// List standards with their certified values
    List {
        /// Only standards certifying this element
        #[arg(short, long)]
        element: Option<Element>,
    },

    /// Add a custom standard
    Add {
        /// Standard name
        name: String,

        /// Certified value as EL=VALUE, ppm or percent (repeatable), e.g. Pb=120 or Fe=4.8%
        #[arg(short, long = "conc", required = true, value_parser = parse_conc_spec)]
        concentrations: Vec<(Element, String)>,
    },

    /// Remove a custom standard
    Remove {
        /// Standard name
        name: String,
    },

    /// Include a standard in calibrations
    Enable {
        /// Standard name
        name: String,
    },

    /// Exclude a standard from calibrations
    Disable {
        /// Standard name
        name: String,
    },
}

/// 解析 `EL=VALUE`，数值部分留给目录校验
pub fn parse_conc_spec(input: &str) -> Result<(Element, String), String> {
    let (element, value) = input
        .split_once('=')
        .ok_or_else(|| format!("Expected EL=VALUE, got '{}'", input))?;
    let element: Element = element.trim().parse().map_err(|e| format!("{}", e))?;
    Ok((element, value.trim().to_string()))
}
