use crate::core::tables::check_override;
use crate::domain::model::{HtsRecord, OverrideKind, TradeOverride};
use crate::domain::ports::ReferenceSource;
use crate::utils::error::{Result, TariffError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct HtsRow {
    code: String,
    description: String,
    general_rate: Option<String>,
    special_rate: Option<String>,
    other_rate: Option<String>,
    unit_of_quantity: String,
}

#[derive(Debug, Deserialize)]
struct OverrideRow {
    program: String,
    country_code: String,
    code_prefix: String,
    kind: OverrideKind,
    rate: String,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
}

/// 從本機 CSV 檔讀取稅則表與覆寫表
#[derive(Debug, Clone)]
pub struct CsvReferenceSource {
    hts_path: PathBuf,
    overrides_path: Option<PathBuf>,
}

impl CsvReferenceSource {
    pub fn new(hts_path: impl Into<PathBuf>, overrides_path: Option<PathBuf>) -> Self {
        Self {
            hts_path: hts_path.into(),
            overrides_path,
        }
    }
}

#[async_trait]
impl ReferenceSource for CsvReferenceSource {
    async fn load_hts(&self) -> Result<Vec<HtsRecord>> {
        let data = tokio::fs::read(&self.hts_path).await?;
        let records = parse_hts_csv(&data, &source_name(&self.hts_path))?;
        tracing::debug!(
            "Loaded {} HTS records from {}",
            records.len(),
            self.hts_path.display()
        );
        Ok(records)
    }

    async fn load_overrides(&self) -> Result<Vec<TradeOverride>> {
        let Some(path) = &self.overrides_path else {
            return Ok(Vec::new());
        };
        let data = tokio::fs::read(path).await?;
        let overrides = parse_overrides_csv(&data, &source_name(path))?;
        tracing::debug!("Loaded {} trade overrides from {}", overrides.len(), path.display());
        Ok(overrides)
    }

    fn describe(&self) -> String {
        match &self.overrides_path {
            Some(path) => format!("{} + {}", self.hts_path.display(), path.display()),
            None => self.hts_path.display().to_string(),
        }
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// 解析稅則 CSV；`row` 以檔案行號計（標題為第 1 行）
pub fn parse_hts_csv(data: &[u8], source_name: &str) -> Result<Vec<HtsRecord>> {
    let mut records = Vec::new();
    for (i, row) in reader(data).deserialize::<HtsRow>().enumerate() {
        let row = row?;
        let line = i + 2;
        let record = HtsRecord::new(
            &row.code,
            &row.description,
            non_empty(row.general_rate),
            non_empty(row.special_rate),
            non_empty(row.other_rate),
            &row.unit_of_quantity,
        )
        .ok_or_else(|| TariffError::DataError {
            source_name: source_name.to_string(),
            row: line,
            message: format!("'{}' is not a valid HTS code (need at least 4 digits)", row.code),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// 解析覆寫表 CSV，每列經 [`check_override`] 正規化與檢查
pub fn parse_overrides_csv(data: &[u8], source_name: &str) -> Result<Vec<TradeOverride>> {
    let mut overrides = Vec::new();
    for (i, row) in reader(data).deserialize::<OverrideRow>().enumerate() {
        let row = row?;
        let line = i + 2;
        let parsed = TradeOverride {
            program: row.program,
            country_code: row.country_code,
            code_prefix: row.code_prefix,
            kind: row.kind,
            rate: row.rate,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
        };
        let checked = check_override(parsed).map_err(|message| TariffError::DataError {
            source_name: source_name.to_string(),
            row: line,
            message,
        })?;
        overrides.push(checked);
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HTS: &str = "\
code,description,general_rate,special_rate,other_rate,unit_of_quantity
8471.30.0100,Portable automatic data processing machines,Free,,35%,No.
0101.21.0010,\"Horses, purebred breeding\",,,,No.
";

    const OVERRIDES: &str = "\
program,country_code,code_prefix,kind,rate,effective_from,effective_to
Section 301 List 3,cn,8471.30,surcharge,25,2019-05-10,
USMCA,MX,84,preferential,special,2020-07-01,2030-12-31
";

    #[test]
    fn test_parse_hts_rows() {
        let records = parse_hts_csv(HTS.as_bytes(), "hts.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].general_rate.as_deref(), Some("Free"));
        assert_eq!(records[0].special_rate, None);
        assert_eq!(records[1].description, "Horses, purebred breeding");
        assert_eq!(records[1].general_rate, None);
    }

    #[test]
    fn test_bad_hts_code_reports_line() {
        let data = "code,description,general_rate,special_rate,other_rate,unit_of_quantity\nABCD,bad,Free,,,No.\n";
        let err = parse_hts_csv(data.as_bytes(), "hts.csv").unwrap_err();
        assert!(matches!(err, TariffError::DataError { row: 2, .. }));
    }

    #[test]
    fn test_parse_override_rows() {
        let overrides = parse_overrides_csv(OVERRIDES.as_bytes(), "overrides.csv").unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].country_code, "CN");
        assert_eq!(overrides[0].code_prefix, "847130");
        assert_eq!(overrides[0].effective_to, None);
        assert_eq!(overrides[1].kind, OverrideKind::Preferential);
    }

    #[test]
    fn test_surcharge_with_specific_rate_is_rejected() {
        let data = "program,country_code,code_prefix,kind,rate,effective_from,effective_to\nX,CN,84,surcharge,2¢/kg,2019-01-01,\n";
        assert!(parse_overrides_csv(data.as_bytes(), "overrides.csv").is_err());
    }

    #[test]
    fn test_bad_override_row_reports_file_line() {
        let data = "program,country_code,code_prefix,kind,rate,effective_from,effective_to\n\
                    A,CN,8471,surcharge,25,2019-01-01,\n\
                    B,CHN,8471,surcharge,25,2019-01-01,\n";
        let err = parse_overrides_csv(data.as_bytes(), "overrides.csv").unwrap_err();
        assert!(matches!(
            err,
            TariffError::DataError { ref source_name, row: 3, .. } if source_name == "overrides.csv"
        ));
    }

    #[tokio::test]
    async fn test_load_from_files() {
        let mut hts = NamedTempFile::new().unwrap();
        hts.write_all(HTS.as_bytes()).unwrap();
        let mut overrides = NamedTempFile::new().unwrap();
        overrides.write_all(OVERRIDES.as_bytes()).unwrap();

        let source = CsvReferenceSource::new(hts.path(), Some(overrides.path().to_path_buf()));
        assert_eq!(source.load_hts().await.unwrap().len(), 2);
        assert_eq!(source.load_overrides().await.unwrap().len(), 2);

        let no_overrides = CsvReferenceSource::new(hts.path(), None);
        assert!(no_overrides.load_overrides().await.unwrap().is_empty());
    }
}
