use crate::utils::error::Result;
use crate::utils::validation::{
    validate_country_code, validate_currency_code, validate_non_empty_string,
    validate_non_negative_amount, validate_positive_amount, validate_positive_number, Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 去除 HTS 代碼中的分隔符號（句點、空白、連字號）
///
/// 不驗證內容，呼叫端自行檢查是否全為數字。
pub fn normalize_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '-' | ' ' | '\t'))
        .collect()
}

/// HTS 稅則資料列，啟動時載入後唯讀
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtsRecord {
    pub code: String,
    pub description: String,
    pub general_rate: Option<String>,
    pub special_rate: Option<String>,
    pub other_rate: Option<String>,
    pub unit_of_quantity: String,
    pub chapter: String,
    pub heading: String,
    pub subheading: Option<String>,
}

impl HtsRecord {
    /// 由原始欄位建立，章/節/子目由代碼前綴切出
    ///
    /// 代碼正規化後至少需要 4 位數字。
    pub fn new(
        code: &str,
        description: &str,
        general_rate: Option<String>,
        special_rate: Option<String>,
        other_rate: Option<String>,
        unit_of_quantity: &str,
    ) -> Option<Self> {
        let digits = normalize_code(code);
        if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            code: code.trim().to_string(),
            description: description.trim().to_string(),
            general_rate,
            special_rate,
            other_rate,
            unit_of_quantity: unit_of_quantity.trim().to_string(),
            chapter: digits[..2].to_string(),
            heading: digits[..4].to_string(),
            subheading: (digits.len() >= 6).then(|| digits[..6].to_string()),
        })
    }

    pub fn normalized_code(&self) -> String {
        normalize_code(&self.code)
    }
}

/// 稅率欄位解析後的形式
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateExpr {
    Free,
    AdValorem { percent: f64 },
    Specific { amount_usd: f64, unit: String },
    Compound { amount_usd: f64, unit: String, percent: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    #[default]
    Ocean,
    Air,
    Truck,
    Rail,
}

fn default_quantity() -> u32 {
    1
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_claim_preference() -> bool {
    true
}

/// 單筆到岸成本試算請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub hts_code: String,
    pub country_code: String,
    pub product_value: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub freight_cost: f64,
    #[serde(default)]
    pub insurance_cost: f64,
    #[serde(default)]
    pub other_costs: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub transport_mode: TransportMode,
    /// 未指定時使用引擎的基準日期
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default = "default_claim_preference")]
    pub claim_preference: bool,
}

impl CalculationRequest {
    pub fn new(hts_code: &str, country_code: &str, product_value: f64) -> Self {
        Self {
            hts_code: hts_code.to_string(),
            country_code: country_code.to_string(),
            product_value,
            quantity: default_quantity(),
            freight_cost: 0.0,
            insurance_cost: 0.0,
            other_costs: 0.0,
            currency: default_currency(),
            transport_mode: TransportMode::default(),
            entry_date: None,
            claim_preference: true,
        }
    }

    pub fn with_costs(mut self, freight: f64, insurance: f64, other: f64) -> Self {
        self.freight_cost = freight;
        self.insurance_cost = insurance;
        self.other_costs = other;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = mode;
        self
    }

    pub fn with_entry_date(mut self, date: NaiveDate) -> Self {
        self.entry_date = Some(date);
        self
    }
}

impl Validate for CalculationRequest {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("hts_code", &self.hts_code)?;
        validate_country_code("country_code", &self.country_code)?;
        validate_positive_amount("product_value", self.product_value)?;
        validate_positive_number("quantity", self.quantity as usize, 1)?;
        validate_non_negative_amount("freight_cost", self.freight_cost)?;
        validate_non_negative_amount("insurance_cost", self.insurance_cost)?;
        validate_non_negative_amount("other_costs", self.other_costs)?;
        validate_currency_code("currency", &self.currency)?;
        Ok(())
    }
}

/// 各成本項目明細，僅供顯示與稽核
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub product_value: f64,
    pub freight_cost: f64,
    pub insurance_cost: f64,
    pub other_costs: f64,
    pub quantity: u32,
    pub currency: String,
    pub transport_mode: TransportMode,
    pub ad_valorem_duty: f64,
    pub specific_duty: f64,
    pub rate_basis: String,
    pub applied_program: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub hts_code: String,
    pub country_code: String,
    pub duty_rate: f64,
    pub duty_amount: f64,
    pub mpf_amount: f64,
    pub hmf_amount: f64,
    pub customs_value: f64,
    pub total_landed_cost: f64,
    pub breakdown: CostBreakdown,
}

/// 多國比較時共用的商品條件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub hts_code: String,
    pub product_value: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub freight_cost: f64,
    #[serde(default)]
    pub insurance_cost: f64,
    #[serde(default)]
    pub other_costs: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub transport_mode: TransportMode,
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
}

impl ProductSpec {
    pub fn request_for(&self, country_code: &str) -> CalculationRequest {
        CalculationRequest {
            hts_code: self.hts_code.clone(),
            country_code: country_code.to_string(),
            product_value: self.product_value,
            quantity: self.quantity,
            freight_cost: self.freight_cost,
            insurance_cost: self.insurance_cost,
            other_costs: self.other_costs,
            currency: self.currency.clone(),
            transport_mode: self.transport_mode,
            entry_date: self.entry_date,
            claim_preference: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Savings,
    DutyRate,
    TotalLandedCost,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcingOption {
    pub country_code: String,
    /// 從價稅率（%），不含從量稅
    pub duty_rate: f64,
    pub duty_amount: f64,
    /// 總稅額佔完稅價格的百分比，含從量稅；依稅率排序時使用
    pub effective_duty_rate: f64,
    pub total_landed_cost: f64,
    pub savings: f64,
    pub fta_benefits: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedCountry {
    pub country_code: String,
    pub kind: String,
    pub reason: String,
}

/// 部分國家無法試算時附在結果上的說明，不視為整體失敗
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialComparisonFailure {
    pub excluded: Vec<ExcludedCountry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcingReport {
    pub baseline_country: String,
    pub sort_by: SortKey,
    pub options: Vec<SourcingOption>,
    pub partial_failure: Option<PartialComparisonFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub score: f64,
    pub record: HtsRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// 貿易救濟附加稅（例如 Section 301），疊加於基本稅率
    Surcharge,
    /// 自由貿易協定優惠稅率，取代基本稅率
    Preferential,
}

/// 貿易措施覆寫表的一列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOverride {
    pub program: String,
    pub country_code: String,
    pub code_prefix: String,
    pub kind: OverrideKind,
    /// surcharge: 加計百分比；preferential: 稅率文字或 "special"
    pub rate: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl TradeOverride {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        date >= self.effective_from && self.effective_to.map_or(true, |end| date <= end)
    }
}

/// 對外訊息的中繼資料，依種類分型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageMetadata {
    DutyResult(CalculationResult),
    SourcingResult(SourcingReport),
    ProductInfo(HtsRecord),
    SearchResults(Vec<SearchHit>),
    Error { kind: String, message: String },
}

impl From<&crate::utils::error::TariffError> for MessageMetadata {
    fn from(err: &crate::utils::error::TariffError) -> Self {
        MessageMetadata::Error {
            kind: err.category().code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_is_sliced_from_code() {
        let record = HtsRecord::new(
            "8471.30.0100",
            "Portable automatic data processing machines",
            Some("Free".to_string()),
            None,
            Some("35%".to_string()),
            "No.",
        )
        .unwrap();

        assert_eq!(record.chapter, "84");
        assert_eq!(record.heading, "8471");
        assert_eq!(record.subheading.as_deref(), Some("847130"));
        assert_eq!(record.normalized_code(), "8471300100");
    }

    #[test]
    fn test_short_or_non_numeric_codes_are_rejected() {
        assert!(HtsRecord::new("84", "too short", None, None, None, "No.").is_none());
        assert!(HtsRecord::new("84AB.30", "letters", None, None, None, "No.").is_none());
        let heading_only = HtsRecord::new("8471", "heading", None, None, None, "No.").unwrap();
        assert_eq!(heading_only.subheading, None);
    }

    #[test]
    fn test_override_effective_window_is_inclusive() {
        let row = TradeOverride {
            program: "Section 301".to_string(),
            country_code: "CN".to_string(),
            code_prefix: "8471".to_string(),
            kind: OverrideKind::Surcharge,
            rate: "25".to_string(),
            effective_from: NaiveDate::from_ymd_opt(2019, 5, 10).unwrap(),
            effective_to: Some(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
        };

        assert!(!row.is_active_on(NaiveDate::from_ymd_opt(2019, 5, 9).unwrap()));
        assert!(row.is_active_on(NaiveDate::from_ymd_opt(2019, 5, 10).unwrap()));
        assert!(row.is_active_on(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!row.is_active_on(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: CalculationRequest = serde_json::from_value(serde_json::json!({
            "hts_code": "8471.30.0100",
            "country_code": "CN",
            "product_value": 1000.0
        }))
        .unwrap();

        assert_eq!(req.quantity, 1);
        assert_eq!(req.currency, "USD");
        assert_eq!(req.transport_mode, TransportMode::Ocean);
        assert!(req.claim_preference);
        assert_eq!(req.freight_cost, 0.0);
    }

    #[test]
    fn test_message_metadata_is_tagged() {
        let err = crate::utils::error::TariffError::NotFound {
            code: "9999.99.9999".to_string(),
        };
        let value = serde_json::to_value(MessageMetadata::from(&err)).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["kind"], "not_found");
    }
}
