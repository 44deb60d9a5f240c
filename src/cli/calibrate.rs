//! # calibrate 子命令 CLI 定义
//!
//! 每个 `--standard` 形如 `"NAME=GLOB"`，GLOB 匹配该标准样品的重复谱图。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calibrate.rs`

use super::FitOptions;
use clap::Args;

/// calibrate 子命令参数
#[derive(Args, Debug)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub fit: FitOptions,

    /// Standard spectra as NAME=GLOB (repeatable), e.g. "PACS-2=std/pacs2_*.csv"
    #[arg(short, long = "standard", value_parser = parse_standard_spec, required = true)]
    pub standards: Vec<(String, String)>,

    /// Evaluate the calibration without storing it
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// 解析 `NAME=GLOB`
pub fn parse_standard_spec(input: &str) -> Result<(String, String), String> {
    let (name, pattern) = input
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=GLOB, got '{}'", input))?;
    let (name, pattern) = (name.trim(), pattern.trim());
    if name.is_empty() || pattern.is_empty() {
        return Err(format!("Expected NAME=GLOB, got '{}'", input));
    }
    Ok((name.to_string(), pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_spec() {
        assert_eq!(
            parse_standard_spec("NIST SRM 2586 = data/2586_*.csv").unwrap(),
            ("NIST SRM 2586".to_string(), "data/2586_*.csv".to_string())
        );
        assert!(parse_standard_spec("PACS-2").is_err());
        assert!(parse_standard_spec("=a*.csv").is_err());
    }
}
