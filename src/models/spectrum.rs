//! # XRF 谱图数据模型
//!
//! 能量 (keV) / 强度 (counts) 有序样本对，由外部加载器创建，核心只读取。
//!
//! ## 依赖关系
//! - 被 `parsers/spectrum.rs` 创建
//! - 被 `xrf/fitter.rs` 读取

use crate::error::{Result, XrfError};
use crate::models::EnergyWindow;

/// XRF 谱图
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// 谱图名称（通常为文件名）
    pub name: String,
    energy: Vec<f64>,
    counts: Vec<f64>,
}

impl Spectrum {
    /// 创建谱图并校验：等长、至少 2 个样本、能量严格递增、数值有限
    pub fn new(name: impl Into<String>, energy: Vec<f64>, counts: Vec<f64>) -> Result<Self> {
        let name = name.into();

        if energy.len() != counts.len() {
            return Err(XrfError::InvalidSpectrum(format!(
                "{}: {} energy values but {} intensity values",
                name,
                energy.len(),
                counts.len()
            )));
        }
        if energy.len() < 2 {
            return Err(XrfError::InvalidSpectrum(format!(
                "{}: need at least 2 samples, got {}",
                name,
                energy.len()
            )));
        }
        if energy.iter().chain(counts.iter()).any(|v| !v.is_finite()) {
            return Err(XrfError::InvalidSpectrum(format!(
                "{}: contains non-finite values",
                name
            )));
        }
        if let Some(i) = energy.windows(2).position(|w| w[1] <= w[0]) {
            return Err(XrfError::InvalidSpectrum(format!(
                "{}: energy not strictly increasing at sample {} ({} -> {})",
                name,
                i + 1,
                energy[i],
                energy[i + 1]
            )));
        }

        Ok(Self {
            name,
            energy,
            counts,
        })
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    /// 能量覆盖范围 (最小, 最大)
    pub fn energy_range(&self) -> (f64, f64) {
        // new() 保证至少 2 个样本
        (self.energy[0], self.energy[self.energy.len() - 1])
    }

    /// 谱图是否完整覆盖给定能量窗口
    pub fn covers(&self, window: &EnergyWindow) -> bool {
        let (low, high) = self.energy_range();
        low <= window.low && high >= window.high
    }

    /// 截取窗口内 (闭区间) 的样本
    pub fn slice(&self, window: &EnergyWindow) -> (&[f64], &[f64]) {
        let start = self.energy.partition_point(|&e| e < window.low);
        let end = self.energy.partition_point(|&e| e <= window.high);
        (&self.energy[start..end], &self.counts[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Spectrum {
        let energy: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        let counts = vec![1.0; n];
        Spectrum::new("ramp", energy, counts).unwrap()
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = Spectrum::new("bad", vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(err.to_string().contains("1 intensity values"));
    }

    #[test]
    fn test_rejects_non_monotonic_energy() {
        let err = Spectrum::new("bad", vec![1.0, 2.0, 2.0], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, XrfError::InvalidSpectrum(_)));
    }

    #[test]
    fn test_rejects_single_sample() {
        assert!(Spectrum::new("one", vec![1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_slice_is_inclusive() {
        let s = ramp(10); // 0.0 .. 4.5
        let (e, c) = s.slice(&EnergyWindow::new(1.0, 2.0));
        assert_eq!(e, &[1.0, 1.5, 2.0]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_covers() {
        let s = ramp(10);
        assert!(s.covers(&EnergyWindow::new(0.0, 4.5)));
        assert!(!s.covers(&EnergyWindow::new(0.0, 5.0)));
    }
}
