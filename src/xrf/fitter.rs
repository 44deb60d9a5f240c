//! # XRF 峰拟合器
//!
//! 从单条谱图提取某元素扣除背景后的积分强度。
//!
//! ## 算法概述
//! 1. 截取积分窗口内的样本
//! 2. 用积分窗口两端的肩部样本拟合线性背景（不受峰高影响）
//! 3. 全窗口扣除背景
//! 4. 在拟合窗口内用 Levenberg-Marquardt 拟合单个高斯峰 (振幅, 中心, σ)，
//!    计算扣除背景数据上的 R²
//! 5. 积分强度 = 扣除背景信号在整个积分窗口上的梯形积分（而非高斯解析面积）
//!
//! ## 依赖关系
//! - 被 `xrf/aggregator.rs`, `xrf/engine.rs`, `commands/` 调用
//! - 使用 `models/spectrum.rs`, `models/element.rs`

use crate::error::{FitError, Result};
use crate::models::{Element, EnergyWindow, PeakChoice, PeakProfile, Spectrum};

use serde::Serialize;

/// 背景肩部窗口策略
///
/// 肩部窗口为积分窗口两端各 `shoulder_width_kev` 宽的区间，
/// 截止于拟合窗口边界且不含边界本身，不会伸入峰区。
/// 该宽度影响校准结果，建立校准与测量样品时必须一致。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundPolicy {
    pub shoulder_width_kev: f64,
}

impl Default for BackgroundPolicy {
    fn default() -> Self {
        Self {
            shoulder_width_kev: 0.10,
        }
    }
}

/// 拟合器配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitterConfig {
    pub background: BackgroundPolicy,
    /// LM 最大迭代次数
    pub max_iterations: usize,
    /// 相对收敛容差（残差平方和与参数步长）
    pub tolerance: f64,
    /// 拟合窗口内最少样本数（3 个高斯参数）
    pub min_peak_samples: usize,
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            background: BackgroundPolicy::default(),
            max_iterations: 200,
            tolerance: 1e-10,
            min_peak_samples: 5,
        }
    }
}

/// 高斯峰参数: f(x) = amplitude * exp(-(x - center)² / (2σ²))
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

impl GaussianParams {
    pub fn eval(&self, x: f64) -> f64 {
        let arg = (x - self.center) / self.sigma;
        self.amplitude * (-0.5 * arg * arg).exp()
    }

    /// 半高全宽 = 2√(2 ln 2) σ
    pub fn fwhm(&self) -> f64 {
        2.0 * (2.0 * std::f64::consts::LN_2).sqrt() * self.sigma
    }
}

/// 峰拟合结果（临时对象，不持久化）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakFitResult {
    /// 扣除背景后的积分面积，接近检出限时可能为负
    pub integrated_intensity: f64,
    /// 高斯拟合 R²，信号无方差时为 None
    pub fit_r_squared: Option<f64>,
    /// 拟合得到的峰中心 (keV)
    pub peak_center_observed: f64,
    pub background_slope: f64,
    pub background_intercept: f64,
    pub gaussian: GaussianParams,
    /// LM 迭代次数
    pub iterations: usize,
}

impl PeakFitResult {
    /// 在 R² 阈值下是否可用；R² 未定义视为不合格
    pub fn passes_r2(&self, min_r2: f64) -> bool {
        self.fit_r_squared.is_some_and(|r2| r2 >= min_r2)
    }
}

/// 峰拟合器（纯函数，无副作用）
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakFitter {
    config: FitterConfig,
}

impl PeakFitter {
    pub fn new(config: FitterConfig) -> Self {
        Self { config }
    }

    pub fn with_background(background: BackgroundPolicy) -> Self {
        Self {
            config: FitterConfig {
                background,
                ..FitterConfig::default()
            },
        }
    }

    /// 按元素和峰选择拟合
    pub fn fit(
        &self,
        spectrum: &Spectrum,
        element: Element,
        choice: PeakChoice,
    ) -> Result<PeakFitResult> {
        let profile = element.definition().profile(choice)?;
        Ok(self.fit_profile(spectrum, profile)?)
    }

    /// 按峰定义拟合
    pub fn fit_profile(
        &self,
        spectrum: &Spectrum,
        profile: &PeakProfile,
    ) -> std::result::Result<PeakFitResult, FitError> {
        debug_assert!(profile.is_consistent());
        let integration = profile.integration_region;
        let peak = profile.peak_region;

        if !spectrum.covers(&integration) {
            let (spectrum_low, spectrum_high) = spectrum.energy_range();
            return Err(FitError::RegionNotCovered {
                low: integration.low,
                high: integration.high,
                spectrum_low,
                spectrum_high,
            });
        }

        let (x, y) = spectrum.slice(&integration);

        // 线性背景
        let (background_slope, background_intercept) = self.estimate_background(x, y, profile)?;
        let signal: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| yi - (background_slope * xi + background_intercept))
            .collect();

        // 拟合窗口内的扣除背景信号
        let (peak_x, peak_y): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(&signal)
            .filter(|(&xi, _)| peak.contains(xi))
            .map(|(&xi, &si)| (xi, si))
            .unzip();

        if peak_x.len() < self.config.min_peak_samples {
            return Err(FitError::InsufficientPoints {
                found: peak_x.len(),
                required: self.config.min_peak_samples,
            });
        }

        let (gaussian, iterations) = self.fit_gaussian(&peak_x, &peak_y, &peak)?;
        let fit_r_squared = r_squared(&peak_x, &peak_y, &gaussian);

        Ok(PeakFitResult {
            integrated_intensity: trapezoid(x, &signal),
            fit_r_squared,
            peak_center_observed: gaussian.center,
            background_slope,
            background_intercept,
            gaussian,
            iterations,
        })
    }

    /// 用两端肩部样本最小二乘拟合背景直线
    fn estimate_background(
        &self,
        x: &[f64],
        y: &[f64],
        profile: &PeakProfile,
    ) -> std::result::Result<(f64, f64), FitError> {
        let width = self.config.background.shoulder_width_kev;
        let integration = profile.integration_region;
        let peak = profile.peak_region;

        let low_window = EnergyWindow::new(integration.low, (integration.low + width).min(peak.low));
        let high_window =
            EnergyWindow::new((integration.high - width).max(peak.high), integration.high);

        // 肩部严格位于峰区之外，即使窗口退化到峰区边界
        let mut low_idx: Vec<usize> = (0..x.len())
            .filter(|&i| low_window.contains(x[i]) && x[i] < peak.low)
            .collect();
        let mut high_idx: Vec<usize> = (0..x.len())
            .filter(|&i| high_window.contains(x[i]) && x[i] > peak.high)
            .collect();

        // 窗口内无样本时退回到最靠近窗口边缘、且不在峰区内的样本
        if low_idx.is_empty() {
            match x.first() {
                Some(&e) if e < peak.low => low_idx.push(0),
                _ => return Err(FitError::NoShoulderSamples("low")),
            }
        }
        if high_idx.is_empty() {
            match x.last() {
                Some(&e) if e > peak.high => high_idx.push(x.len() - 1),
                _ => return Err(FitError::NoShoulderSamples("high")),
            }
        }

        let (bx, by): (Vec<f64>, Vec<f64>) = low_idx
            .iter()
            .chain(high_idx.iter())
            .map(|&i| (x[i], y[i]))
            .unzip();

        // 两侧肩部能量不同，直线总能确定
        fit_line(&bx, &by).ok_or(FitError::NoShoulderSamples("both"))
    }

    /// Levenberg-Marquardt 高斯拟合，返回参数与迭代次数
    fn fit_gaussian(
        &self,
        x: &[f64],
        y: &[f64],
        region: &EnergyWindow,
    ) -> std::result::Result<(GaussianParams, usize), FitError> {
        let spacing = region.width() / (x.len().max(2) - 1) as f64;
        let sigma_min = (0.25 * spacing).max(1e-6);
        let sigma_max = region.width();

        let project = |p: [f64; 3]| -> [f64; 3] {
            [
                p[0].max(0.0),
                p[1].clamp(region.low, region.high),
                p[2].clamp(sigma_min, sigma_max),
            ]
        };

        let mut p = project(initial_guess(x, y, region));
        let mut cost = sum_squares(x, y, &p);
        let mut lambda = 1e-3;
        let tol = self.config.tolerance;

        if cost < 1e-30 {
            return Ok((to_params(&p), 0));
        }

        for iteration in 1..=self.config.max_iterations {
            let (jtj, jtr) = normal_equations(x, y, &p);

            let mut damped = jtj;
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * jtj[i][i].max(1e-12);
            }

            let candidate = solve3(damped, jtr).map(|d| {
                let next = project([p[0] + d[0], p[1] + d[1], p[2] + d[2]]);
                (next, sum_squares(x, y, &next))
            });

            match candidate {
                Some((next, next_cost)) if next_cost.is_finite() && next_cost < cost => {
                    let step = (0..3)
                        .map(|i| (next[i] - p[i]).abs() / (p[i].abs() + tol))
                        .fold(0.0_f64, f64::max);
                    let improvement = cost - next_cost;

                    p = next;
                    cost = next_cost;
                    lambda = (lambda / 10.0).max(1e-12);

                    if improvement <= tol * cost || step <= tol || cost < 1e-30 {
                        return Ok((to_params(&p), iteration));
                    }
                }
                _ => {
                    lambda *= 10.0;
                    // 任何方向都无法再降低残差：已处于极小值
                    if lambda > 1e12 {
                        return Ok((to_params(&p), iteration));
                    }
                }
            }

            if p.iter().any(|v| !v.is_finite()) {
                break;
            }
        }

        Err(FitError::NotConverged {
            iterations: self.config.max_iterations,
        })
    }
}

/// 初始参数：最大值位置与振幅，半高宽估计 σ
fn initial_guess(x: &[f64], y: &[f64], region: &EnergyWindow) -> [f64; 3] {
    let (idx, &max_y) = y
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &0.0));

    let amplitude = max_y.max(0.0);
    let center = x.get(idx).copied().unwrap_or((region.low + region.high) / 2.0);

    let above_half = y.iter().filter(|&&v| amplitude > 0.0 && v >= amplitude / 2.0).count();
    let spacing = region.width() / (x.len().max(2) - 1) as f64;
    let sigma = if above_half >= 2 {
        above_half as f64 * spacing / 2.3548
    } else {
        region.width() / 6.0
    };

    [amplitude, center, sigma]
}

fn to_params(p: &[f64; 3]) -> GaussianParams {
    GaussianParams {
        amplitude: p[0],
        center: p[1],
        sigma: p[2],
    }
}

fn sum_squares(x: &[f64], y: &[f64], p: &[f64; 3]) -> f64 {
    let g = to_params(p);
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - g.eval(xi);
            r * r
        })
        .sum()
}

/// JᵀJ 与 Jᵀr
fn normal_equations(x: &[f64], y: &[f64], p: &[f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let (a, mu, s) = (p[0], p[1], p[2]);
    let mut jtj = [[0.0; 3]; 3];
    let mut jtr = [0.0; 3];

    for (&xi, &yi) in x.iter().zip(y) {
        let d = xi - mu;
        let e = (-0.5 * d * d / (s * s)).exp();
        let r = yi - a * e;

        // ∂f/∂a, ∂f/∂μ, ∂f/∂σ
        let j = [e, a * e * d / (s * s), a * e * d * d / (s * s * s)];

        for row in 0..3 {
            jtr[row] += j[row] * r;
            for col in 0..3 {
                jtj[row][col] += j[row] * j[col];
            }
        }
    }

    (jtj, jtr)
}

/// 3×3 线性方程组（部分主元高斯消元），奇异时返回 None
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut out = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| a[row][k] * out[k]).sum();
        out[row] = (b[row] - tail) / a[row][row];
    }

    out.iter().all(|v| v.is_finite()).then_some(out)
}

/// 高斯拟合 R²，限制在 [0, 1]
fn r_squared(x: &[f64], y: &[f64], g: &GaussianParams) -> Option<f64> {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean) * (v - mean)).sum();
    if ss_tot <= f64::EPSILON * y.len() as f64 {
        return None;
    }
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| (yi - g.eval(xi)).powi(2))
        .sum();
    Some((1.0 - ss_res / ss_tot).clamp(0.0, 1.0))
}

/// 最小二乘直线 (slope, intercept)
pub(crate) fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 2 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let sxx: f64 = x.iter().map(|v| (v - mean_x) * (v - mean_x)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// 梯形积分
fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}
