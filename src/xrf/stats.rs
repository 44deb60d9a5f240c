//! # 描述统计
//!
//! 重复测量的均值、样本标准差 (n-1)、RSD 与 SEM。
//!
//! ## 依赖关系
//! - 被 `xrf/aggregator.rs`, `xrf/sample.rs` 使用

/// 一组数值的描述统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub n: usize,
    pub mean: f64,
    /// 样本标准差，n = 1 时为 0
    pub std_dev: f64,
    /// 相对标准偏差 (%)，均值为 0 时定义为 0
    pub rsd_percent: f64,
    /// 平均值标准误差
    pub sem: f64,
}

impl Stats {
    /// 空输入返回 None
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;

        let std_dev = if n > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        let rsd_percent = if mean != 0.0 {
            (std_dev / mean * 100.0).abs()
        } else {
            0.0
        };

        Some(Self {
            n,
            mean,
            std_dev,
            rsd_percent,
            sem: std_dev / (n as f64).sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty() {
        assert!(Stats::describe(&[]).is_none());
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        let s = Stats::describe(&[42.0]).unwrap();
        assert_eq!(s.n, 1);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.rsd_percent, 0.0);
        assert_eq!(s.sem, 0.0);
    }

    #[test]
    fn test_sample_std_dev() {
        let s = Stats::describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(s.mean, 5.0);
        // n-1 分母: sqrt(32 / 7)
        assert_relative_eq!(s.std_dev, (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.rsd_percent, s.std_dev / 5.0 * 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_mean_rsd_defined() {
        let s = Stats::describe(&[-1.0, 1.0]).unwrap();
        assert_eq!(s.rsd_percent, 0.0);
    }
}
