use crate::adapters::CsvReferenceSource;
use crate::core::duty::DutyPolicy;
use crate::core::engine::EngineSettings;
use crate::core::fees::FeeSchedule;
use crate::utils::error::{Result, TariffError};
use crate::utils::validation::{
    validate_country_code, validate_currency_code, validate_path, validate_range, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub fees: FeeSchedule,
    #[serde(default)]
    pub duty: DutyConfig,
    pub sourcing: Option<SourcingConfig>,
    pub search: Option<SearchConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub hts_path: String,
    pub overrides_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyConfig {
    #[serde(default = "default_column2_countries")]
    pub column2_countries: Vec<String>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// 未設定時使用啟動當天（UTC）
    pub reference_date: Option<NaiveDate>,
}

fn default_column2_countries() -> Vec<String> {
    ["CU", "KP", "RU", "BY"].iter().map(|c| c.to_string()).collect()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

impl Default for DutyConfig {
    fn default() -> Self {
        Self {
            column2_countries: default_column2_countries(),
            base_currency: default_base_currency(),
            reference_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingConfig {
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_limit: Option<usize>,
    pub max_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub json_logs: Option<bool>,
}

impl TariffConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TariffError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TariffError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TARIFF_DATA_DIR})，未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TariffError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_path("data.hts_path", &self.data.hts_path).map_err(as_config_error)?;
        if let Some(path) = &self.data.overrides_path {
            validate_path("data.overrides_path", path).map_err(as_config_error)?;
        }

        let fees = &self.fees;
        for (field, value) in [
            ("fees.mpf_rate_percent", fees.mpf_rate_percent),
            ("fees.mpf_minimum", fees.mpf_minimum),
            ("fees.mpf_maximum", fees.mpf_maximum),
            ("fees.hmf_rate_percent", fees.hmf_rate_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TariffError::ConfigValidationError {
                    field: field.to_string(),
                    message: format!("must be a non-negative number, got {}", value),
                });
            }
        }
        if fees.mpf_minimum > fees.mpf_maximum {
            return Err(TariffError::ConfigValidationError {
                field: "fees.mpf_minimum".to_string(),
                message: format!(
                    "minimum {} is greater than maximum {}",
                    fees.mpf_minimum, fees.mpf_maximum
                ),
            });
        }

        validate_currency_code("duty.base_currency", &self.duty.base_currency)
            .map_err(as_config_error)?;
        for country in &self.duty.column2_countries {
            validate_country_code("duty.column2_countries", country).map_err(as_config_error)?;
        }

        validate_range("sourcing.concurrency", self.sourcing_concurrency(), 1, 64)
            .map_err(as_config_error)?;
        validate_range("search.max_limit", self.search_max_limit(), 1, 1000)
            .map_err(as_config_error)?;
        validate_range(
            "search.default_limit",
            self.search_default_limit(),
            1,
            self.search_max_limit(),
        )
        .map_err(as_config_error)?;

        let bind = self.server_bind();
        if bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(TariffError::ConfigValidationError {
                field: "server.bind".to_string(),
                message: format!("'{}' is not a socket address (host:port)", bind),
            });
        }

        Ok(())
    }

    pub fn sourcing_concurrency(&self) -> usize {
        self.sourcing
            .as_ref()
            .and_then(|s| s.concurrency)
            .unwrap_or(4)
    }

    pub fn search_default_limit(&self) -> usize {
        self.search
            .as_ref()
            .and_then(|s| s.default_limit)
            .unwrap_or(10)
    }

    pub fn search_max_limit(&self) -> usize {
        self.search.as_ref().and_then(|s| s.max_limit).unwrap_or(100)
    }

    pub fn server_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "127.0.0.1:8000".to_string())
    }

    pub fn json_logs(&self) -> bool {
        self.server
            .as_ref()
            .and_then(|s| s.json_logs)
            .unwrap_or(false)
    }

    /// 轉成引擎參數
    ///
    /// 未設定 `duty.reference_date` 時取啟動當天（UTC），覆寫是否生效會隨啟動日期改變。
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fees: self.fees.clone(),
            duty: DutyPolicy {
                column2_countries: self
                    .duty
                    .column2_countries
                    .iter()
                    .map(|c| c.to_ascii_uppercase())
                    .collect(),
            },
            base_currency: self.duty.base_currency.to_ascii_uppercase(),
            reference_date: self
                .duty
                .reference_date
                .unwrap_or_else(|| {
                    let today = chrono::Utc::now().date_naive();
                    tracing::warn!(
                        "⚠️ duty.reference_date not set, using {} (results depend on startup date)",
                        today
                    );
                    today
                }),
            sourcing_concurrency: self.sourcing_concurrency(),
            search_default_limit: self.search_default_limit(),
            search_max_limit: self.search_max_limit(),
        }
    }

    pub fn reference_source(&self) -> CsvReferenceSource {
        CsvReferenceSource::new(
            PathBuf::from(&self.data.hts_path),
            self.data.overrides_path.as_ref().map(PathBuf::from),
        )
    }
}

fn as_config_error(err: TariffError) -> TariffError {
    match err {
        TariffError::InvalidInput { field, reason, .. } => TariffError::ConfigValidationError {
            field,
            message: reason,
        },
        other => other,
    }
}

impl Validate for TariffConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let toml_content = r#"
[data]
hts_path = "data/hts.csv"
"#;

        let config = TariffConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.fees, FeeSchedule::default());
        assert_eq!(config.duty.base_currency, "USD");
        assert!(config.duty.column2_countries.contains(&"KP".to_string()));
        assert_eq!(config.sourcing_concurrency(), 4);
        assert_eq!(config.server_bind(), "127.0.0.1:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_pins_reference_date() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tariff-config.toml");
        let config = TariffConfig::from_file(&path).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.engine_settings().reference_date,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[data]
hts_path = "data/hts.csv"
overrides_path = "data/overrides.csv"

[fees]
mpf_rate_percent = 0.3464
mpf_minimum = 31.67
mpf_maximum = 614.35
hmf_rate_percent = 0.125

[duty]
column2_countries = ["cu", "kp"]
reference_date = "2024-06-01"

[sourcing]
concurrency = 8

[search]
default_limit = 5
max_limit = 50

[server]
bind = "0.0.0.0:9000"
json_logs = true
"#;

        let config = TariffConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        let settings = config.engine_settings();
        assert_eq!(settings.fees.mpf_minimum, 31.67);
        assert_eq!(settings.duty.column2_countries, vec!["CU", "KP"]);
        assert_eq!(
            settings.reference_date,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
        assert_eq!(settings.sourcing_concurrency, 8);
        assert_eq!(settings.search_max_limit, 50);
        assert!(config.json_logs());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_TARIFF_DATA_DIR", "/srv/tariff");

        let toml_content = r#"
[data]
hts_path = "${TEST_TARIFF_DATA_DIR}/hts.csv"
"#;

        let config = TariffConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.data.hts_path, "/srv/tariff/hts.csv");

        std::env::remove_var("TEST_TARIFF_DATA_DIR");
    }

    #[test]
    fn test_config_validation() {
        let inverted = r#"
[data]
hts_path = "data/hts.csv"

[fees]
mpf_minimum = 600.0
mpf_maximum = 500.0
"#;
        let config = TariffConfig::from_toml_str(inverted).unwrap();
        assert!(matches!(
            config.validate(),
            Err(TariffError::ConfigValidationError { ref field, .. }) if field == "fees.mpf_minimum"
        ));

        let bad_bind = r#"
[data]
hts_path = "data/hts.csv"

[server]
bind = "localhost"
"#;
        let config = TariffConfig::from_toml_str(bad_bind).unwrap();
        assert!(config.validate().is_err());

        let bad_country = r#"
[data]
hts_path = "data/hts.csv"

[duty]
column2_countries = ["CUB"]
"#;
        let config = TariffConfig::from_toml_str(bad_country).unwrap();
        assert!(matches!(
            config.validate(),
            Err(TariffError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[data]
hts_path = "data/hts.csv"

[sourcing]
concurrency = 2
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TariffConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.sourcing_concurrency(), 2);
    }
}
