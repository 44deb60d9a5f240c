//! # 样品分组统计
//!
//! 按输入顺序把连续的 `spectra_per_sample` 条谱图结果归为一个样品
//! (`Sample_1`, `Sample_2`, ...)，最后一组可以不满。
//!
//! ## 依赖关系
//! - 被 `commands/quantify.rs`, `xrf/export.rs` 使用
//! - 使用 `xrf/stats.rs`

use crate::error::{Result, XrfError};
use crate::xrf::stats::Stats;

use serde::Serialize;

/// 单条谱图的定量结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumQuantity {
    pub spectrum: String,
    pub integrated_intensity: f64,
    pub concentration: f64,
    pub fit_r_squared: Option<f64>,
    pub peak_center: f64,
}

/// 单个样品的统计
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStatistics {
    pub name: String,
    pub spectra: Vec<String>,
    pub intensity: Stats,
    pub concentration: Stats,
}

impl SampleStatistics {
    pub fn n(&self) -> usize {
        self.intensity.n
    }
}

pub fn group_samples(
    results: &[SpectrumQuantity],
    spectra_per_sample: usize,
) -> Result<Vec<SampleStatistics>> {
    if spectra_per_sample == 0 {
        return Err(XrfError::InvalidArgument(
            "spectra per sample must be at least 1".to_string(),
        ));
    }

    let groups = results
        .chunks(spectra_per_sample)
        .enumerate()
        .filter_map(|(i, chunk)| {
            let intensities: Vec<f64> = chunk.iter().map(|r| r.integrated_intensity).collect();
            let concentrations: Vec<f64> = chunk.iter().map(|r| r.concentration).collect();
            Some(SampleStatistics {
                name: format!("Sample_{}", i + 1),
                spectra: chunk.iter().map(|r| r.spectrum.clone()).collect(),
                intensity: Stats::describe(&intensities)?,
                concentration: Stats::describe(&concentrations)?,
            })
        })
        .collect();

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quantity(name: &str, intensity: f64) -> SpectrumQuantity {
        SpectrumQuantity {
            spectrum: name.to_string(),
            integrated_intensity: intensity,
            concentration: 0.5 * intensity,
            fit_r_squared: Some(0.99),
            peak_center: 10.55,
        }
    }

    #[test]
    fn test_grouping_keeps_partial_tail() {
        let results: Vec<_> = (1..=7)
            .map(|i| quantity(&format!("s_{}", i), i as f64 * 10.0))
            .collect();
        let samples = group_samples(&results, 3).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].name, "Sample_1");
        assert_eq!(samples[0].spectra, vec!["s_1", "s_2", "s_3"]);
        assert_relative_eq!(samples[0].intensity.mean, 20.0);
        assert_relative_eq!(samples[0].concentration.mean, 10.0);
        assert_relative_eq!(samples[0].intensity.std_dev, 10.0);
        assert_relative_eq!(samples[0].concentration.rsd_percent, 50.0);

        assert_eq!(samples[2].n(), 1);
        assert_eq!(samples[2].intensity.std_dev, 0.0);
    }

    #[test]
    fn test_zero_group_size_rejected() {
        assert!(group_samples(&[quantity("a", 1.0)], 0).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(group_samples(&[], 6).unwrap().is_empty());
    }
}
