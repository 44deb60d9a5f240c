//! # 统一错误处理模块
//!
//! 定义 xrfquant 的所有错误类型，使用 `thiserror` 派生。
//!
//! - `FitError`: 单条谱图拟合失败（可恢复：调用方跳过该谱图）
//! - `XrfError`: 其余所有错误，`FitError` 可通过 `?` 自动转换
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// 单条谱图峰拟合错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("spectrum covers {spectrum_low:.3}-{spectrum_high:.3} keV, integration region needs {low:.3}-{high:.3} keV")]
    RegionNotCovered {
        low: f64,
        high: f64,
        spectrum_low: f64,
        spectrum_high: f64,
    },

    #[error("only {found} samples inside peak region (need at least {required})")]
    InsufficientPoints { found: usize, required: usize },

    #[error("no background samples at the {0} shoulder of the integration region")]
    NoShoulderSamples(&'static str),

    #[error("Gaussian fit did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// xrfquant 统一错误类型
#[derive(Error, Debug)]
pub enum XrfError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse spectrum file: {path}\nReason: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Invalid spectrum: {0}")]
    InvalidSpectrum(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 拟合与校准错误
    // ─────────────────────────────────────────────────────────────
    #[error("Peak fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("No usable replicate spectra for standard '{standard}' ({element})")]
    InsufficientData {
        standard: String,
        element: String,
        /// 每条重复谱图的失败原因
        skipped: Vec<(String, FitError)>,
    },

    #[error("Cannot determine calibration line for {element}: {reason}")]
    DegenerateFit { element: String, reason: String },

    #[error("Calibration for {element} has zero slope and cannot be inverted")]
    SingularCalibration { element: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Import rejected, no calibrations changed. Element '{element}': {reason}")]
    InvalidImport { element: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 查找错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Unknown standard: {0}")]
    UnknownStandard(String),

    #[error("Element {element} has no {profile} peak profile")]
    ProfileUnavailable { element: String, profile: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, XrfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_error_converts() {
        let err: XrfError = FitError::InsufficientPoints {
            found: 3,
            required: 5,
        }
        .into();
        assert!(matches!(err, XrfError::Fit(_)));
        assert!(err.to_string().contains("only 3 samples"));
    }

    #[test]
    fn test_import_error_message() {
        let err = XrfError::InvalidImport {
            element: "Zn".to_string(),
            reason: "missing field `slope`".to_string(),
        };
        assert!(err.to_string().contains("no calibrations changed"));
        assert!(err.to_string().contains("Zn"));
    }
}
