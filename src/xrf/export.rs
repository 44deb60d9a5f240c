//! # 定量结果导出
//!
//! 导出每条谱图结果与每个样品统计到 CSV。
//!
//! ## 依赖关系
//! - 被 `commands/quantify.rs` 调用
//! - 使用 `xrf/sample.rs` 的结果结构
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{Result, XrfError};
use crate::xrf::sample::{SampleStatistics, SpectrumQuantity};

use std::io::Write;
use std::path::Path;

/// 导出每条谱图结果
pub fn spectra_to_csv(results: &[SpectrumQuantity], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_spectra(&mut wtr, results)?;
    wtr.flush().map_err(|e| XrfError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

/// 导出样品统计
pub fn samples_to_csv(samples: &[SampleStatistics], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    write_samples(&mut wtr, samples)?;
    wtr.flush().map_err(|e| XrfError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

fn write_spectra<W: Write>(wtr: &mut csv::Writer<W>, results: &[SpectrumQuantity]) -> Result<()> {
    wtr.write_record([
        "spectrum",
        "integrated_intensity",
        "concentration_ppm",
        "fit_r_squared",
        "peak_center_kev",
    ])?;

    for r in results {
        wtr.write_record([
            r.spectrum.clone(),
            format!("{:.4}", r.integrated_intensity),
            format!("{:.4}", r.concentration),
            r.fit_r_squared
                .map(|v| format!("{:.6}", v))
                .unwrap_or_default(),
            format!("{:.4}", r.peak_center),
        ])?;
    }
    Ok(())
}

fn write_samples<W: Write>(wtr: &mut csv::Writer<W>, samples: &[SampleStatistics]) -> Result<()> {
    wtr.write_record([
        "sample",
        "n",
        "mean_intensity",
        "std_intensity",
        "rsd_intensity_pct",
        "mean_concentration_ppm",
        "std_concentration_ppm",
        "rsd_concentration_pct",
        "sem_concentration_ppm",
        "spectra",
    ])?;

    for s in samples {
        wtr.write_record([
            s.name.clone(),
            s.n().to_string(),
            format!("{:.4}", s.intensity.mean),
            format!("{:.4}", s.intensity.std_dev),
            format!("{:.2}", s.intensity.rsd_percent),
            format!("{:.4}", s.concentration.mean),
            format!("{:.4}", s.concentration.std_dev),
            format!("{:.2}", s.concentration.rsd_percent),
            format!("{:.4}", s.concentration.sem),
            s.spectra.join(";"),
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrf::sample::group_samples;
    use tempfile::tempdir;

    fn results() -> Vec<SpectrumQuantity> {
        vec![
            SpectrumQuantity {
                spectrum: "soil_1.csv".to_string(),
                integrated_intensity: 1000.0,
                concentration: 30.5,
                fit_r_squared: Some(0.995),
                peak_center: 10.551,
            },
            SpectrumQuantity {
                spectrum: "soil_2.csv".to_string(),
                integrated_intensity: 1100.0,
                concentration: 33.8,
                fit_r_squared: None,
                peak_center: 10.548,
            },
        ]
    }

    #[test]
    fn test_spectra_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spectra.csv");
        spectra_to_csv(&results(), &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "soil_1.csv");
        assert_eq!(&rows[0][2], "30.5000");
        assert_eq!(&rows[1][3], "");
    }

    #[test]
    fn test_samples_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        let samples = group_samples(&results(), 2).unwrap();
        samples_to_csv(&samples, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "sample");
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Sample_1");
        assert_eq!(&rows[0][1], "2");
        assert_eq!(&rows[0][9], "soil_1.csv;soil_2.csv");
    }
}
