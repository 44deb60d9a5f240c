//! # 谱图文本格式解析器
//!
//! 读取两列（或更多列）的能量/强度文本文件。
//!
//! ## 支持格式
//! ```text
//! # EMSA 元数据行 (#XUNITS : eV 时能量换算为 keV)
//! Energy,Counts            <- 非数值表头行被跳过
//! 0.010, 12.
//! 0.020;15
//! 0.030	18               <- 制表符 / 空白分隔
//! #ENDOFDATA
//! ```
//! 只取每行前两个数值字段；第三列（如基线）被忽略。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `models/spectrum.rs`

use crate::error::{Result, XrfError};
use crate::models::Spectrum;
use std::fs;
use std::path::Path;

/// 从文件加载谱图，名称取文件名
pub fn load_spectrum(path: &Path) -> Result<Spectrum> {
    if !path.exists() {
        return Err(XrfError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| XrfError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    parse_spectrum_content(&content, name).map_err(|e| match e {
        XrfError::InvalidSpectrum(reason) => XrfError::ParseError {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// 从字符串内容解析
pub fn parse_spectrum_content(content: &str, name: &str) -> Result<Spectrum> {
    let mut energy = Vec::new();
    let mut counts = Vec::new();
    let mut energy_divisor = 1.0;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(meta) = line.strip_prefix('#') {
            if let Some((key, value)) = meta.split_once(':') {
                if key.trim().eq_ignore_ascii_case("XUNITS")
                    && value.trim().eq_ignore_ascii_case("eV")
                {
                    energy_divisor = 1000.0;
                }
            }
            continue;
        }

        let mut fields = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty());

        let parsed = match (fields.next(), fields.next()) {
            (Some(e), Some(c)) => e.parse::<f64>().ok().zip(c.parse::<f64>().ok()),
            _ => None,
        };

        // 表头或说明行
        let Some((e, c)) = parsed else {
            continue;
        };

        energy.push(e / energy_divisor);
        counts.push(c);
    }

    if energy.is_empty() {
        return Err(XrfError::InvalidSpectrum(
            "no numeric energy/intensity rows found".to_string(),
        ));
    }

    Spectrum::new(name, energy, counts)
}
