//! # 标准样品目录
//!
//! 内置参考物质的认证浓度 + 用户自定义标准样品，以及启用/禁用选择。
//!
//! 浓度映射是稀疏的：未列出的元素表示"不含该元素的认证值"，而不是 0，
//! 这样的标准样品不参与该元素的回归。
//!
//! 只有自定义标准样品和禁用集合会写入目录文件，内置值从不落盘。
//!
//! ## 依赖关系
//! - 被 `xrf/engine.rs`, `commands/` 使用
//! - 使用 `xrf/store.rs` 的原子写入

use crate::error::{Result, XrfError};
use crate::models::Element;
use crate::xrf::store::{write_atomic, LoadStatus};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

/// 内置参考物质（证书原文格式，% 或 ppm；"<" 与 N/A 视为无认证值）
const BUILTIN_STANDARDS: &[(&str, &[(Element, &str)])] = &[
    (
        "Till-1",
        &[
            (Element::Pb, "22"),
            (Element::As, "18"),
            (Element::Cd, "<0.2"),
            (Element::Cr, "65"),
            (Element::Zn, "98"),
            (Element::Ni, "24"),
            (Element::Cu, "47"),
            (Element::Fe, "4.81%"),
            (Element::Se, "N/A"),
        ],
    ),
    (
        "LKSD-1",
        &[
            (Element::Pb, "82"),
            (Element::As, "40"),
            (Element::Cd, "1.2"),
            (Element::Cr, "31"),
            (Element::Zn, "331"),
            (Element::Ni, "16"),
            (Element::Cu, "44"),
            (Element::Fe, "2.80%"),
            (Element::S, "1.57%"),
        ],
    ),
    (
        "PACS-2",
        &[
            (Element::Pb, "183"),
            (Element::As, "26.2"),
            (Element::Cd, "2.11"),
            (Element::Cr, "90.7"),
            (Element::Zn, "364"),
            (Element::Ni, "39.5"),
            (Element::Cu, "310"),
            (Element::Fe, "4.09%"),
            (Element::Se, "0.92"),
            (Element::S, "1.29%"),
        ],
    ),
    (
        "NIST SRM 2586",
        &[
            (Element::Pb, "432"),
            (Element::As, "8.7"),
            (Element::Cd, "2.71"),
            (Element::Cr, "301"),
            (Element::Zn, "352"),
            (Element::Ni, "75"),
            (Element::Cu, "N/A"),
            (Element::Fe, "5.16%"),
        ],
    ),
    (
        "NIST SRM 2587",
        &[
            (Element::Pb, "3242"),
            (Element::As, "13.7"),
            (Element::Cd, "1.92"),
            (Element::Cr, "92"),
            (Element::Zn, "335.8"),
            (Element::Fe, "2.84%"),
        ],
    ),
];

/// 解析认证浓度文本，返回 ppm
///
/// 支持 `"432"`, `"432 ppm"`, `"1.29%"` (= 12900 ppm)。
/// `"N/A"`、低于检出限 (`"<0.01%"`) 和其他文本返回 `Validation` 错误。
pub fn parse_concentration(text: &str) -> Result<f64> {
    let s = text.trim();
    let invalid = |why: &str| XrfError::Validation(format!("concentration '{}' {}", text, why));

    if s.is_empty() || s.eq_ignore_ascii_case("n/a") || s.eq_ignore_ascii_case("na") {
        return Err(invalid("has no certified value"));
    }
    if s.starts_with('<') {
        return Err(invalid("is below the detection limit"));
    }

    let (number, factor) = if let Some(pct) = s.strip_suffix('%') {
        (pct.trim(), 10_000.0)
    } else if let Some(ppm) = s
        .strip_suffix("ppm")
        .or_else(|| s.strip_suffix("PPM"))
    {
        (ppm.trim(), 1.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = number
        .parse()
        .map_err(|_| invalid("is not a number"))?;
    if !value.is_finite() {
        return Err(invalid("is not a finite number"));
    }
    Ok(value * factor)
}

/// 一个标准样品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardDefinition {
    pub name: String,
    /// 元素 -> 认证浓度 (ppm)
    pub concentrations: BTreeMap<Element, f64>,
    #[serde(skip)]
    pub builtin: bool,
}

impl StandardDefinition {
    pub fn certified(&self, element: Element) -> Option<f64> {
        self.concentrations.get(&element).copied()
    }
}

/// 目录文件内容
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    custom: Vec<StandardDefinition>,
    #[serde(default)]
    disabled: BTreeSet<String>,
}

/// 标准样品目录
#[derive(Debug)]
pub struct StandardCatalog {
    path: Option<PathBuf>,
    standards: Vec<StandardDefinition>,
    disabled: BTreeSet<String>,
    load_status: LoadStatus,
}

impl Default for StandardCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StandardCatalog {
    /// 仅内置标准样品，全部启用，不落盘
    pub fn builtin() -> Self {
        let standards = BUILTIN_STANDARDS
            .iter()
            .map(|(name, values)| StandardDefinition {
                name: name.to_string(),
                concentrations: values
                    .iter()
                    .filter_map(|(el, text)| parse_concentration(text).ok().map(|v| (*el, v)))
                    .collect(),
                builtin: true,
            })
            .collect();

        Self {
            path: None,
            standards,
            disabled: BTreeSet::new(),
            load_status: LoadStatus::Missing,
        }
    }

    /// 加载目录文件；缺失或损坏时只有内置标准样品
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut catalog = Self::builtin();

        match fs::read_to_string(&path) {
            Ok(content) => match catalog.apply_file(&content) {
                Ok(n) => catalog.load_status = LoadStatus::Loaded(n),
                Err(e) => {
                    catalog = Self::builtin();
                    catalog.load_status = LoadStatus::Corrupt(e.to_string());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => catalog.load_status = LoadStatus::Corrupt(e.to_string()),
        }

        catalog.path = Some(path);
        catalog
    }

    fn apply_file(&mut self, content: &str) -> Result<usize> {
        let file: CatalogFile = serde_json::from_str(content)?;
        let n = file.custom.len();
        for custom in file.custom {
            self.add_custom_in_memory(&custom.name, custom.concentrations)?;
        }
        self.disabled = file.disabled;
        Ok(n)
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    /// 全部标准样品（内置在前，自定义按添加顺序）
    pub fn standards(&self) -> &[StandardDefinition] {
        &self.standards
    }

    /// 名称查找，忽略大小写
    pub fn standard(&self, name: &str) -> Option<&StandardDefinition> {
        let name = name.trim();
        self.standards
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn certified_value(&self, standard_name: &str, element: Element) -> Option<f64> {
        self.standard(standard_name)?.certified(element)
    }

    pub fn is_enabled(&self, standard_name: &str) -> bool {
        match self.standard(standard_name) {
            Some(s) => !self.disabled.contains(&s.name),
            None => false,
        }
    }

    pub fn enabled_standards(&self) -> Vec<&str> {
        self.standards
            .iter()
            .filter(|s| !self.disabled.contains(&s.name))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// 已启用且有该元素认证值的标准样品，按目录顺序
    pub fn standards_for(&self, element: Element) -> Vec<(&str, f64)> {
        self.standards
            .iter()
            .filter(|s| !self.disabled.contains(&s.name))
            .filter_map(|s| s.certified(element).map(|c| (s.name.as_str(), c)))
            .collect()
    }

    /// 至少有两个可用标准样品的元素
    pub fn calibratable_elements(&self) -> Vec<Element> {
        Element::ALL
            .iter()
            .copied()
            .filter(|&el| self.standards_for(el).len() >= 2)
            .collect()
    }

    /// 添加自定义标准样品并写盘
    pub fn add_custom(
        &mut self,
        name: &str,
        concentrations: impl IntoIterator<Item = (Element, f64)>,
    ) -> Result<()> {
        self.add_custom_in_memory(name, concentrations)?;
        if let Err(e) = self.persist() {
            self.standards.pop();
            return Err(e);
        }
        Ok(())
    }

    fn add_custom_in_memory(
        &mut self,
        name: &str,
        concentrations: impl IntoIterator<Item = (Element, f64)>,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(XrfError::Validation("standard name is empty".to_string()));
        }
        if self.standard(name).is_some() {
            return Err(XrfError::Validation(format!(
                "standard '{}' already exists",
                name
            )));
        }

        let mut map = BTreeMap::new();
        for (element, value) in concentrations {
            if !value.is_finite() || value <= 0.0 {
                return Err(XrfError::Validation(format!(
                    "{} concentration for '{}' must be a positive number, got {}",
                    element, name, value
                )));
            }
            map.insert(element, value);
        }
        if map.is_empty() {
            return Err(XrfError::Validation(format!(
                "standard '{}' certifies no elements",
                name
            )));
        }

        self.standards.push(StandardDefinition {
            name: name.to_string(),
            concentrations: map,
            builtin: false,
        });
        Ok(())
    }

    /// 删除自定义标准样品；内置标准样品只能禁用
    pub fn remove_custom(&mut self, name: &str) -> Result<()> {
        let index = self
            .standards
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| XrfError::UnknownStandard(name.to_string()))?;
        if self.standards[index].builtin {
            return Err(XrfError::Validation(format!(
                "'{}' is a built-in standard and can only be disabled",
                self.standards[index].name
            )));
        }

        let removed = self.standards.remove(index);
        let was_disabled = self.disabled.remove(&removed.name);
        if let Err(e) = self.persist() {
            if was_disabled {
                self.disabled.insert(removed.name.clone());
            }
            self.standards.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, standard_name: &str, enabled: bool) -> Result<()> {
        let name = self
            .standard(standard_name)
            .map(|s| s.name.clone())
            .ok_or_else(|| XrfError::UnknownStandard(standard_name.to_string()))?;

        let changed = if enabled {
            self.disabled.remove(&name)
        } else {
            self.disabled.insert(name.clone())
        };
        if !changed {
            return Ok(());
        }

        if let Err(e) = self.persist() {
            if enabled {
                self.disabled.insert(name);
            } else {
                self.disabled.remove(&name);
            }
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = CatalogFile {
            custom: self.standards.iter().filter(|s| !s.builtin).cloned().collect(),
            disabled: self.disabled.clone(),
        };
        write_atomic(path, &serde_json::to_string_pretty(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_concentration() {
        assert_eq!(parse_concentration("432").unwrap(), 432.0);
        assert_eq!(parse_concentration(" 26.2 ppm ").unwrap(), 26.2);
        assert!((parse_concentration("1.29%").unwrap() - 12900.0).abs() < 1e-9);
        assert!(parse_concentration("N/A").is_err());
        assert!(parse_concentration("<0.01%").is_err());
        assert!(parse_concentration("trace").is_err());
        assert!(parse_concentration("").is_err());
    }

    #[test]
    fn test_builtin_values() {
        let catalog = StandardCatalog::builtin();
        assert_eq!(catalog.certified_value("NIST SRM 2586", Element::Pb), Some(432.0));
        assert_eq!(catalog.certified_value("nist srm 2587", Element::Pb), Some(3242.0));
        assert!((catalog.certified_value("PACS-2", Element::S).unwrap() - 12900.0).abs() < 1e-9);
        // 低于检出限与 N/A 均为缺失
        assert_eq!(catalog.certified_value("Till-1", Element::Cd), None);
        assert_eq!(catalog.certified_value("NIST SRM 2586", Element::Cu), None);
        assert_eq!(catalog.certified_value("Unknown", Element::Pb), None);
    }

    #[test]
    fn test_sparse_custom_standard_is_excluded() {
        let mut catalog = StandardCatalog::builtin();
        catalog.add_custom("House Soil A", [(Element::Pb, 120.0)]).unwrap();

        assert_eq!(catalog.certified_value("House Soil A", Element::Zn), None);
        assert!(catalog
            .standards_for(Element::Zn)
            .iter()
            .all(|(name, _)| *name != "House Soil A"));
        assert!(catalog
            .standards_for(Element::Pb)
            .contains(&("House Soil A", 120.0)));
    }

    #[test]
    fn test_add_custom_validation() {
        let mut catalog = StandardCatalog::builtin();
        let collide = catalog.add_custom("pacs-2", [(Element::Pb, 1.0)]);
        assert!(matches!(collide, Err(XrfError::Validation(_))));
        let zero = catalog.add_custom("Z", [(Element::Pb, 0.0)]);
        assert!(matches!(zero, Err(XrfError::Validation(_))));
        let nan = catalog.add_custom("N", [(Element::Pb, f64::NAN)]);
        assert!(matches!(nan, Err(XrfError::Validation(_))));
        assert_eq!(catalog.standards().len(), BUILTIN_STANDARDS.len());
    }

    #[test]
    fn test_enable_disable() {
        let mut catalog = StandardCatalog::builtin();
        assert_eq!(catalog.enabled_standards().len(), 5);

        catalog.set_enabled("LKSD-1", false).unwrap();
        assert!(!catalog.is_enabled("LKSD-1"));
        assert!(!catalog.enabled_standards().contains(&"LKSD-1"));
        assert!(catalog
            .standards_for(Element::Pb)
            .iter()
            .all(|(name, _)| *name != "LKSD-1"));

        catalog.set_enabled("LKSD-1", true).unwrap();
        assert!(catalog.is_enabled("LKSD-1"));
        assert!(catalog.set_enabled("Nope", false).is_err());
    }

    #[test]
    fn test_calibratable_elements() {
        let mut catalog = StandardCatalog::builtin();
        let elements = catalog.calibratable_elements();
        assert!(elements.contains(&Element::Pb));
        assert!(elements.contains(&Element::S));
        // 只有 PACS-2 有 Se 认证值
        assert!(!elements.contains(&Element::Se));

        catalog.set_enabled("PACS-2", false).unwrap();
        assert!(!catalog.calibratable_elements().contains(&Element::S));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("standards.json");

        let mut catalog = StandardCatalog::open(&path);
        catalog
            .add_custom("House Soil A", [(Element::Pb, 120.0), (Element::Zn, 310.0)])
            .unwrap();
        catalog.set_enabled("Till-1", false).unwrap();

        let reopened = StandardCatalog::open(&path);
        assert_eq!(reopened.load_status(), &LoadStatus::Loaded(1));
        assert_eq!(reopened.certified_value("House Soil A", Element::Zn), Some(310.0));
        assert!(!reopened.is_enabled("Till-1"));
        assert!(!reopened.standard("House Soil A").unwrap().builtin);

        // 内置值不写入文件
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("PACS-2"));
    }

    #[test]
    fn test_remove_custom() {
        let mut catalog = StandardCatalog::builtin();
        catalog.add_custom("Mine Tailings", [(Element::As, 540.0)]).unwrap();
        catalog.remove_custom("Mine Tailings").unwrap();
        assert!(catalog.standard("Mine Tailings").is_none());
        assert!(matches!(
            catalog.remove_custom("Till-1"),
            Err(XrfError::Validation(_))
        ));
    }

    #[test]
    fn test_corrupt_catalog_falls_back_to_builtin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("standards.json");
        fs::write(&path, "[1, 2").unwrap();
        let catalog = StandardCatalog::open(&path);
        assert!(matches!(catalog.load_status(), LoadStatus::Corrupt(_)));
        assert_eq!(catalog.standards().len(), BUILTIN_STANDARDS.len());
    }
}
