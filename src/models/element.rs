//! # 元素定义数据模型
//!
//! 可分析元素的闭集合及其特征谱线窗口。
//!
//! 每个元素有主峰 (`primary`) 和可选的替代峰 (`alternative`)：
//! 替代峰用于避开谱线重叠（如 Pb Lα 与 As Kα 都在 10.5 keV 附近），
//! 由调用方显式选择，从不自动切换。
//!
//! 窗口约束: `integration.low <= peak.low < peak.high <= integration.high`
//!
//! ## 依赖关系
//! - 被 `xrf/` 所有子模块使用
//! - 被 `cli/` 解析元素参数

use crate::error::{Result, XrfError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 能量区间 (keV, 闭区间)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyWindow {
    pub low: f64,
    pub high: f64,
}

impl EnergyWindow {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, energy: f64) -> bool {
        energy >= self.low && energy <= self.high
    }

    /// 是否完整包含另一窗口
    pub fn encloses(&self, other: &EnergyWindow) -> bool {
        self.low <= other.low && other.high <= self.high
    }
}

impl fmt::Display for EnergyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}-{:.2} keV", self.low, self.high)
    }
}

/// 峰选择（主峰 / 替代峰）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakChoice {
    #[default]
    Primary,
    Alternative,
}

impl fmt::Display for PeakChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakChoice::Primary => write!(f, "primary"),
            PeakChoice::Alternative => write!(f, "alternative"),
        }
    }
}

/// 单条特征谱线的拟合/积分窗口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakProfile {
    /// 谱线名称，如 "L-alpha"
    pub line: &'static str,
    /// 理论峰位 (keV)
    pub center_energy: f64,
    /// 高斯拟合窗口
    pub peak_region: EnergyWindow,
    /// 面积积分窗口（包含拟合窗口）
    pub integration_region: EnergyWindow,
}

impl PeakProfile {
    /// 检查窗口约束
    pub fn is_consistent(&self) -> bool {
        self.peak_region.low < self.peak_region.high
            && self.integration_region.encloses(&self.peak_region)
            && self.peak_region.contains(self.center_energy)
    }
}

/// 元素定义
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementDefinition {
    pub element: Element,
    pub name: &'static str,
    pub primary: PeakProfile,
    pub alternative: Option<PeakProfile>,
}

impl ElementDefinition {
    pub fn symbol(&self) -> &'static str {
        self.element.symbol()
    }

    /// 按选择取峰定义
    pub fn profile(&self, choice: PeakChoice) -> Result<&PeakProfile> {
        match choice {
            PeakChoice::Primary => Ok(&self.primary),
            PeakChoice::Alternative => {
                self.alternative
                    .as_ref()
                    .ok_or_else(|| XrfError::ProfileUnavailable {
                        element: self.symbol().to_string(),
                        profile: choice.to_string(),
                    })
            }
        }
    }
}

/// 可分析元素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Element {
    Pb,
    As,
    Cd,
    Cr,
    Zn,
    Ni,
    Cu,
    Fe,
    Se,
    S,
}

impl Element {
    pub const ALL: [Element; 10] = [
        Element::Pb,
        Element::As,
        Element::Cd,
        Element::Cr,
        Element::Zn,
        Element::Ni,
        Element::Cu,
        Element::Fe,
        Element::Se,
        Element::S,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Element::Pb => "Pb",
            Element::As => "As",
            Element::Cd => "Cd",
            Element::Cr => "Cr",
            Element::Zn => "Zn",
            Element::Ni => "Ni",
            Element::Cu => "Cu",
            Element::Fe => "Fe",
            Element::Se => "Se",
            Element::S => "S",
        }
    }

    /// 静态元素定义
    pub fn definition(self) -> &'static ElementDefinition {
        // ELEMENT_TABLE 与 ALL 同序
        &ELEMENT_TABLE[self as usize]
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = XrfError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Element::ALL
            .iter()
            .copied()
            .find(|e| e.symbol().eq_ignore_ascii_case(s))
            .ok_or_else(|| XrfError::UnknownElement(s.to_string()))
    }
}

impl From<Element> for String {
    fn from(e: Element) -> Self {
        e.symbol().to_string()
    }
}

impl TryFrom<String> for Element {
    type Error = XrfError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

const fn profile(
    line: &'static str,
    center_energy: f64,
    peak: (f64, f64),
    integration: (f64, f64),
) -> PeakProfile {
    PeakProfile {
        line,
        center_energy,
        peak_region: EnergyWindow::new(peak.0, peak.1),
        integration_region: EnergyWindow::new(integration.0, integration.1),
    }
}

// ─────────────────────────────────────────────────────────────
// 元素谱线表（能量单位 keV）
// ─────────────────────────────────────────────────────────────
static ELEMENT_TABLE: [ElementDefinition; 10] = [
    ElementDefinition {
        element: Element::Pb,
        name: "Lead",
        primary: profile("L-alpha", 10.55, (10.25, 10.85), (10.0, 11.1)),
        alternative: Some(profile("L-beta", 12.61, (12.35, 12.9), (12.1, 13.1))),
    },
    ElementDefinition {
        element: Element::As,
        name: "Arsenic",
        primary: profile("K-alpha", 10.54, (10.25, 10.85), (10.0, 11.1)),
        alternative: Some(profile("K-beta", 11.73, (11.45, 12.0), (11.25, 12.2))),
    },
    ElementDefinition {
        element: Element::Cd,
        name: "Cadmium",
        primary: profile("K-alpha", 23.17, (22.8, 23.5), (22.5, 23.8)),
        alternative: Some(profile("K-beta", 26.10, (25.7, 26.5), (25.4, 26.8))),
    },
    ElementDefinition {
        element: Element::Cr,
        name: "Chromium",
        primary: profile("K-alpha", 5.41, (5.22, 5.62), (5.1, 5.74)),
        alternative: Some(profile("K-beta", 5.95, (5.8, 6.1), (5.76, 6.16))),
    },
    ElementDefinition {
        element: Element::Zn,
        name: "Zinc",
        primary: profile("K-alpha", 8.64, (8.45, 8.85), (8.32, 8.96)),
        alternative: Some(profile("K-beta", 9.57, (9.4, 9.75), (9.3, 9.85))),
    },
    ElementDefinition {
        element: Element::Ni,
        name: "Nickel",
        primary: profile("K-alpha", 7.48, (7.3, 7.66), (7.2, 7.76)),
        alternative: Some(profile("K-beta", 8.26, (8.12, 8.42), (8.06, 8.5))),
    },
    ElementDefinition {
        element: Element::Cu,
        name: "Copper",
        primary: profile("K-alpha", 8.05, (7.88, 8.22), (7.78, 8.3)),
        alternative: Some(profile("K-beta", 8.90, (8.76, 9.05), (8.7, 9.12))),
    },
    ElementDefinition {
        element: Element::Fe,
        name: "Iron",
        primary: profile("K-alpha", 6.40, (6.22, 6.58), (6.1, 6.7)),
        alternative: Some(profile("K-beta", 7.06, (6.9, 7.22), (6.82, 7.3))),
    },
    ElementDefinition {
        element: Element::Se,
        name: "Selenium",
        primary: profile("K-alpha", 11.22, (11.02, 11.42), (10.9, 11.55)),
        alternative: Some(profile("K-beta", 12.50, (12.3, 12.7), (12.2, 12.8))),
    },
    ElementDefinition {
        element: Element::S,
        name: "Sulfur",
        primary: profile("K-alpha", 2.31, (2.18, 2.44), (2.08, 2.54)),
        // Kβ (2.46 keV) 与 Kα 无法分辨
        alternative: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for e in Element::ALL {
            assert_eq!(e.definition().element, e);
        }
    }

    #[test]
    fn test_all_profiles_satisfy_window_invariant() {
        for e in Element::ALL {
            let def = e.definition();
            assert!(def.primary.is_consistent(), "{} primary", e);
            if let Some(alt) = def.alternative {
                assert!(alt.is_consistent(), "{} alternative", e);
            }
        }
    }

    #[test]
    fn test_parse_symbol_case_insensitive() {
        assert_eq!("pb".parse::<Element>().unwrap(), Element::Pb);
        assert_eq!(" Zn ".parse::<Element>().unwrap(), Element::Zn);
        assert!(matches!(
            "Xx".parse::<Element>(),
            Err(XrfError::UnknownElement(_))
        ));
    }

    #[test]
    fn test_sulfur_has_no_alternative() {
        let def = Element::S.definition();
        assert!(def.profile(PeakChoice::Primary).is_ok());
        assert!(matches!(
            def.profile(PeakChoice::Alternative),
            Err(XrfError::ProfileUnavailable { .. })
        ));
    }

    #[test]
    fn test_element_serde_as_symbol() {
        let json = serde_json::to_string(&Element::Cu).unwrap();
        assert_eq!(json, "\"Cu\"");
        let back: Element = serde_json::from_str("\"cu\"").unwrap();
        assert_eq!(back, Element::Cu);
        let choice = serde_json::to_string(&PeakChoice::Alternative).unwrap();
        assert_eq!(choice, "\"alternative\"");
    }
}
