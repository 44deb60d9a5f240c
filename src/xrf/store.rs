//! # 校准存储
//!
//! 元素符号 -> 校准记录 的持久化映射。
//!
//! - 缺失键表示使用默认单位校准 (slope = 1, intercept = 0)
//! - 每次修改后立即写盘：先写同目录临时文件再 rename；写盘失败则回滚内存修改
//! - 文件缺失视为空存储；文件损坏视为空存储并通过 `LoadStatus` 告知调用方
//! - 导入先整体校验再一次性应用，任何一条记录不完整则零修改
//! - 未知元素键被保留，未知字段被忽略
//!
//! ## 依赖关系
//! - 被 `xrf/engine.rs`, `commands/` 使用
//! - 使用 `models/calibration.rs`

use crate::error::{Result, XrfError};
use crate::models::{ActiveCalibration, Calibration, Element, PeakChoice, StandardSummary};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 持久化文件中每个元素的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// 标准样品名称
    pub standards_used: Vec<String>,
    #[serde(deserialize_with = "deserialize_created_date")]
    pub created_date: DateTime<Utc>,
    pub equation: String,
    #[serde(default)]
    pub peak_profile: PeakChoice,
    /// 完整汇总，与 `standards_used` 一一对应；旧格式记录没有此字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standards: Option<Vec<StandardSummary>>,
}

/// RFC 3339，或不带时区的 ISO-8601（按 UTC 处理）
fn deserialize_created_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl From<&Calibration> for CalibrationRecord {
    fn from(cal: &Calibration) -> Self {
        Self {
            slope: cal.slope,
            intercept: cal.intercept,
            r_squared: cal.r_squared,
            standards_used: cal.standard_names(),
            created_date: cal.created_timestamp,
            equation: cal.equation(),
            peak_profile: cal.peak_profile_used,
            standards: cal
                .standards_used
                .iter()
                .all(StandardSummary::has_statistics)
                .then(|| cal.standards_used.clone()),
        }
    }
}

impl CalibrationRecord {
    /// 检查结构完整性并转换为校准
    pub fn into_calibration(self, key: &str) -> std::result::Result<Calibration, String> {
        for (field, value) in [
            ("slope", self.slope),
            ("intercept", self.intercept),
            ("r_squared", self.r_squared),
        ] {
            if !value.is_finite() {
                return Err(format!("{} is not a finite number", field));
            }
        }

        if self.standards_used.len() < Calibration::MIN_STANDARDS {
            return Err(format!(
                "{} standard(s) recorded, at least {} required",
                self.standards_used.len(),
                Calibration::MIN_STANDARDS
            ));
        }
        if self.standards_used.iter().any(|name| name.trim().is_empty()) {
            return Err("standards_used contains an empty name".to_string());
        }

        let standards = match self.standards {
            Some(standards) => {
                let names_match = standards.len() == self.standards_used.len()
                    && standards
                        .iter()
                        .zip(&self.standards_used)
                        .all(|(s, name)| &s.standard_name == name);
                if !names_match {
                    return Err("standards_used does not match standards".to_string());
                }
                if let Some(s) = standards.iter().find(|s| {
                    s.n == 0
                        || s.raw_intensities.len() != s.n
                        || !s.certified_concentration.is_finite()
                        || !s.mean_intensity.is_finite()
                }) {
                    return Err(format!("standard '{}' is incomplete", s.standard_name));
                }
                standards
            }
            None => self
                .standards_used
                .into_iter()
                .map(StandardSummary::name_only)
                .collect(),
        };

        Ok(Calibration {
            element: key.to_string(),
            slope: self.slope,
            intercept: self.intercept,
            r_squared: self.r_squared,
            standards_used: standards,
            created_timestamp: self.created_date,
            peak_profile_used: self.peak_profile,
        })
    }
}

/// 启动时加载状态
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// 无持久化文件（或仅内存存储）
    Missing,
    Loaded(usize),
    /// 文件无法解析，按空存储处理
    Corrupt(String),
}

/// 导入结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    /// `overwrite = false` 时保留的已有元素
    pub kept: Vec<String>,
}

/// 校准存储
#[derive(Debug)]
pub struct CalibrationStore {
    path: Option<PathBuf>,
    calibrations: BTreeMap<String, Calibration>,
    load_status: LoadStatus,
}

impl CalibrationStore {
    /// 从文件加载；文件缺失或损坏都不会失败
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let (calibrations, load_status) = match fs::read_to_string(&path) {
            Ok(content) => match parse_records(&content) {
                Ok(map) => {
                    let n = map.len();
                    (map, LoadStatus::Loaded(n))
                }
                Err(e) => (BTreeMap::new(), LoadStatus::Corrupt(e.to_string())),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (BTreeMap::new(), LoadStatus::Missing)
            }
            Err(e) => (BTreeMap::new(), LoadStatus::Corrupt(e.to_string())),
        };

        Self {
            path: Some(path),
            calibrations,
            load_status,
        }
    }

    /// 不落盘的存储
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            calibrations: BTreeMap::new(),
            load_status: LoadStatus::Missing,
        }
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    pub fn len(&self) -> usize {
        self.calibrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calibrations.is_empty()
    }

    /// 当前生效的校准；未校准元素返回默认单位校准
    pub fn get(&self, element: Element) -> ActiveCalibration<'_> {
        match self.calibrations.get(element.symbol()) {
            Some(cal) => ActiveCalibration::Stored(cal),
            None => ActiveCalibration::Default,
        }
    }

    /// 按存储键查找（包括未知元素键）
    pub fn calibration(&self, key: &str) -> Option<&Calibration> {
        self.calibrations.get(key)
    }

    /// 按键排序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Calibration)> {
        self.calibrations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 整体替换该元素的校准并写盘，返回被替换的旧记录
    pub fn put(&mut self, element: Element, mut calibration: Calibration) -> Result<Option<Calibration>> {
        if calibration.standards_used.len() < Calibration::MIN_STANDARDS {
            return Err(XrfError::DegenerateFit {
                element: element.to_string(),
                reason: format!(
                    "refusing to store a calibration with {} standard(s)",
                    calibration.standards_used.len()
                ),
            });
        }

        let key = element.symbol().to_string();
        calibration.element = key.clone();
        let previous = self.calibrations.insert(key.clone(), calibration);

        if let Err(e) = self.persist() {
            match previous {
                Some(old) => self.calibrations.insert(key, old),
                None => self.calibrations.remove(&key),
            };
            return Err(e);
        }
        Ok(previous)
    }

    /// 删除；元素本未校准时返回 false
    pub fn delete(&mut self, element: Element) -> Result<bool> {
        self.delete_key(element.symbol())
    }

    pub fn delete_key(&mut self, key: &str) -> Result<bool> {
        let Some(old) = self.calibrations.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist() {
            self.calibrations.insert(key.to_string(), old);
            return Err(e);
        }
        Ok(true)
    }

    /// 清空全部校准，返回清除的数量
    pub fn reset_all(&mut self) -> Result<usize> {
        let old = std::mem::take(&mut self.calibrations);
        if let Err(e) = self.persist() {
            self.calibrations = old;
            return Err(e);
        }
        Ok(old.len())
    }

    /// 导出为 JSON；`subset` 为 None 时导出全部（含未知元素键）
    pub fn export(&self, subset: Option<&[Element]>) -> Result<String> {
        let records: BTreeMap<&str, CalibrationRecord> = self
            .calibrations
            .iter()
            .filter(|(key, _)| match subset {
                Some(elements) => elements.iter().any(|e| e.symbol() == key.as_str()),
                None => true,
            })
            .map(|(key, cal)| (key.as_str(), CalibrationRecord::from(cal)))
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// 导入：全部记录校验通过后一次性应用并写盘一次
    pub fn import(&mut self, blob: &str, overwrite: bool) -> Result<ImportReport> {
        let incoming = parse_records(blob)?;

        let mut report = ImportReport::default();
        let old = self.calibrations.clone();

        for (key, cal) in incoming {
            match self.calibrations.contains_key(&key) {
                true if !overwrite => report.kept.push(key),
                true => {
                    self.calibrations.insert(key.clone(), cal);
                    report.replaced.push(key);
                }
                false => {
                    self.calibrations.insert(key.clone(), cal);
                    report.added.push(key);
                }
            }
        }

        if report.added.is_empty() && report.replaced.is_empty() {
            return Ok(report);
        }

        if let Err(e) = self.persist() {
            self.calibrations = old;
            return Err(e);
        }
        Ok(report)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = self.export(None)?;
        write_atomic(path, &content)
    }
}

/// 解析并校验整个文件/导入内容；任一记录不合格则整体失败
fn parse_records(content: &str) -> Result<BTreeMap<String, Calibration>> {
    let root: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Object(entries) = root else {
        return Err(XrfError::Validation(
            "calibration data must be a JSON object keyed by element".to_string(),
        ));
    };

    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let record: CalibrationRecord =
            serde_json::from_value(value).map_err(|e| XrfError::InvalidImport {
                element: key.clone(),
                reason: e.to_string(),
            })?;
        let cal = record
            .into_calibration(&key)
            .map_err(|reason| XrfError::InvalidImport {
                element: key.clone(),
                reason,
            })?;
        map.insert(key, cal);
    }
    Ok(map)
}

/// 写同目录临时文件后 rename
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, content).map_err(|e| XrfError::FileWriteError {
        path: tmp.display().to_string(),
        source: e,
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        XrfError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_calibration(slope: f64, intercept: f64) -> Calibration {
        Calibration {
            element: String::new(),
            slope,
            intercept,
            r_squared: 0.998_712_345_678_9,
            standards_used: vec![
                StandardSummary::from_intensities("Till-1", 22.0, vec![650.1, 661.7, 655.3])
                    .unwrap(),
                StandardSummary::from_intensities("NIST SRM 2586", 432.0, vec![13150.25, 13149.75])
                    .unwrap(),
                StandardSummary::from_intensities("NIST SRM 2587", 3242.0, vec![98200.0]).unwrap(),
            ],
            created_timestamp: Utc::now(),
            peak_profile_used: PeakChoice::Primary,
        }
    }

    #[test]
    fn test_unset_element_uses_default() {
        let store = CalibrationStore::in_memory();
        let active = store.get(Element::Pb);
        assert!(active.is_default());
        assert_eq!(active.slope(), 1.0);
        assert_eq!(active.intercept(), 0.0);
        assert!(active.r_squared().is_none());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::open(dir.path().join("none.json"));
        assert!(store.is_empty());
        assert_eq!(store.load_status(), &LoadStatus::Missing);
    }

    #[test]
    fn test_corrupt_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CalibrationStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(store.load_status(), LoadStatus::Corrupt(_)));
    }

    #[test]
    fn test_put_writes_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");

        let mut store = CalibrationStore::open(&path);
        store.put(Element::Pb, sample_calibration(0.0330, -2.46)).unwrap();
        assert!(path.exists());

        let reopened = CalibrationStore::open(&path);
        assert_eq!(reopened.load_status(), &LoadStatus::Loaded(1));
        let cal = reopened.calibration("Pb").unwrap();
        assert_eq!(cal.slope, 0.0330);
        assert_eq!(cal.element, "Pb");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"created_date\""));
        assert!(text.contains("Concentration = 0.0330 × Intensity + -2.4600"));
    }

    #[test]
    fn test_put_replaces_and_delete_unsets() {
        let mut store = CalibrationStore::in_memory();
        assert!(store.put(Element::Zn, sample_calibration(1.0, 0.0)).unwrap().is_none());
        let old = store.put(Element::Zn, sample_calibration(2.0, 0.0)).unwrap();
        assert_eq!(old.unwrap().slope, 1.0);
        assert_eq!(store.get(Element::Zn).slope(), 2.0);

        assert!(store.delete(Element::Zn).unwrap());
        assert!(!store.delete(Element::Zn).unwrap());
        assert!(store.get(Element::Zn).is_default());
    }

    #[test]
    fn test_put_rejects_single_standard() {
        let mut store = CalibrationStore::in_memory();
        let mut cal = sample_calibration(1.0, 0.0);
        cal.standards_used.truncate(1);
        assert!(store.put(Element::Cu, cal).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempdir().unwrap();
        // 目标路径是目录，rename 必然失败
        let path = dir.path().join("as_dir");
        fs::create_dir(&path).unwrap();
        let mut store = CalibrationStore::open(&path);
        assert!(store.put(Element::Fe, sample_calibration(1.0, 0.0)).is_err());
        assert!(store.get(Element::Fe).is_default());
    }

    #[test]
    fn test_export_import_is_bit_identical() {
        let mut source = CalibrationStore::in_memory();
        source.put(Element::Pb, sample_calibration(0.033_039_388_594_944_15, -2.464_432_686_654_9)).unwrap();
        source.put(Element::As, sample_calibration(1.0 / 3.0, 0.1 + 0.2)).unwrap();

        let blob = source.export(None).unwrap();
        let mut target = CalibrationStore::in_memory();
        let report = target.import(&blob, true).unwrap();
        assert_eq!(report.added.len(), 2);

        for (key, cal) in source.iter() {
            let copy = target.calibration(key).unwrap();
            assert_eq!(copy.slope.to_bits(), cal.slope.to_bits());
            assert_eq!(copy.intercept.to_bits(), cal.intercept.to_bits());
            assert_eq!(copy.r_squared.to_bits(), cal.r_squared.to_bits());
            assert_eq!(copy.standards_used, cal.standards_used);
            assert_eq!(copy, cal);
        }
    }

    #[test]
    fn test_export_subset() {
        let mut store = CalibrationStore::in_memory();
        store.put(Element::Pb, sample_calibration(1.0, 0.0)).unwrap();
        store.put(Element::Zn, sample_calibration(2.0, 0.0)).unwrap();
        let blob = store.export(Some(&[Element::Zn])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("Zn"));
    }

    #[test]
    fn test_import_missing_field_changes_nothing() {
        let mut source = CalibrationStore::in_memory();
        source.put(Element::Pb, sample_calibration(5.0, 0.0)).unwrap();
        source.put(Element::Zn, sample_calibration(6.0, 0.0)).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&source.export(None).unwrap()).unwrap();
        value["Zn"].as_object_mut().unwrap().remove("intercept");
        let blob = value.to_string();

        let mut target = CalibrationStore::in_memory();
        target.put(Element::Pb, sample_calibration(1.0, 0.0)).unwrap();

        let err = target.import(&blob, true).unwrap_err();
        match err {
            XrfError::InvalidImport { element, .. } => assert_eq!(element, "Zn"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(target.len(), 1);
        assert_eq!(target.get(Element::Pb).slope(), 1.0);
        assert!(target.get(Element::Zn).is_default());
    }

    #[test]
    fn test_import_rejects_non_numeric_slope() {
        let mut source = CalibrationStore::in_memory();
        source.put(Element::Cd, sample_calibration(5.0, 0.0)).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&source.export(None).unwrap()).unwrap();
        value["Cd"]["slope"] = serde_json::Value::String("steep".to_string());

        let mut target = CalibrationStore::in_memory();
        assert!(target.import(&value.to_string(), true).is_err());
        assert!(target.is_empty());
    }

    #[test]
    fn test_import_without_overwrite_keeps_existing() {
        let mut source = CalibrationStore::in_memory();
        source.put(Element::Pb, sample_calibration(9.0, 0.0)).unwrap();
        source.put(Element::Ni, sample_calibration(7.0, 0.0)).unwrap();
        let blob = source.export(None).unwrap();

        let mut target = CalibrationStore::in_memory();
        target.put(Element::Pb, sample_calibration(1.0, 0.0)).unwrap();
        let report = target.import(&blob, false).unwrap();

        assert_eq!(report.kept, vec!["Pb".to_string()]);
        assert_eq!(report.added, vec!["Ni".to_string()]);
        assert_eq!(target.get(Element::Pb).slope(), 1.0);
        assert_eq!(target.get(Element::Ni).slope(), 7.0);
    }

    #[test]
    fn test_unknown_keys_and_fields_are_tolerated() {
        let mut source = CalibrationStore::in_memory();
        source.put(Element::Pb, sample_calibration(2.0, 1.0)).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&source.export(None).unwrap()).unwrap();
        value["Pb"]["operator"] = serde_json::Value::String("lab 3".to_string());
        let pb = value["Pb"].clone();
        value["Hg"] = pb;

        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");
        let mut store = CalibrationStore::open(&path);
        let report = store.import(&value.to_string(), true).unwrap();
        assert_eq!(report.added.len(), 2);

        let reopened = CalibrationStore::open(&path);
        assert!(reopened.calibration("Hg").is_some());
        assert_eq!(reopened.get(Element::Pb).slope(), 2.0);
    }

    #[test]
    fn test_reset_all() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");
        let mut store = CalibrationStore::open(&path);
        store.put(Element::Pb, sample_calibration(1.0, 0.0)).unwrap();
        store.put(Element::Se, sample_calibration(1.0, 0.0)).unwrap();
        assert_eq!(store.reset_all().unwrap(), 2);
        assert!(store.is_empty());
        assert!(CalibrationStore::open(&path).is_empty());
    }

    const PLAIN_RECORDS: &str = r#"{
        "Pb": {
            "slope": 13.8913,
            "intercept": 0.0,
            "r_squared": 0.9901,
            "standards_used": ["Till-1", "LKSD-1", "PACS-2"],
            "created_date": "2025-01-15T10:30:00Z",
            "equation": "Concentration = 13.8913 × Intensity + 0.0000"
        },
        "Zn": {
            "slope": 0.25,
            "intercept": 1.5,
            "r_squared": 0.97,
            "standards_used": ["Till-1", "PACS-2"],
            "created_date": "2025-01-16T08:00:00.123456",
            "equation": "Concentration = 0.2500 × Intensity + 1.5000"
        }
    }"#;

    #[test]
    fn test_open_plain_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");
        fs::write(&path, PLAIN_RECORDS).unwrap();

        let store = CalibrationStore::open(&path);
        assert_eq!(store.load_status(), &LoadStatus::Loaded(2));
        assert_eq!(store.get(Element::Pb).slope(), 13.8913);

        let pb = store.calibration("Pb").unwrap();
        assert_eq!(pb.standard_names(), vec!["Till-1", "LKSD-1", "PACS-2"]);
        assert!(pb.standards_used.iter().all(|s| !s.has_statistics()));

        let zn = store.calibration("Zn").unwrap();
        assert_eq!(zn.created_timestamp.to_rfc3339(), "2025-01-16T08:00:00.123456+00:00");
    }

    #[test]
    fn test_import_plain_records_and_export_again() {
        let mut store = CalibrationStore::in_memory();
        let report = store.import(PLAIN_RECORDS, true).unwrap();
        assert_eq!(report.added, vec!["Pb".to_string(), "Zn".to_string()]);
        assert_eq!(store.get(Element::Zn).intercept(), 1.5);

        let blob = store.export(None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert!(value["Pb"].get("standards").is_none());
        assert_eq!(value["Pb"]["standards_used"][2], "PACS-2");

        let mut copy = CalibrationStore::in_memory();
        copy.import(&blob, true).unwrap();
        assert_eq!(
            copy.calibration("Pb").unwrap().standard_names(),
            store.calibration("Pb").unwrap().standard_names()
        );
    }

    #[test]
    fn test_plain_record_with_one_standard_is_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(PLAIN_RECORDS).unwrap();
        value["Zn"]["standards_used"] = serde_json::json!(["Till-1"]);

        let mut store = CalibrationStore::in_memory();
        let err = store.import(&value.to_string(), true).unwrap_err();
        assert!(matches!(err, XrfError::InvalidImport { element, .. } if element == "Zn"));
        assert!(store.is_empty());
    }
}
