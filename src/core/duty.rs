//! 稅率解析與適用稅率判定。
//!
//! 判定順序（先符合者為準）：
//! 1. 生效中的貿易救濟附加稅，疊加於基本稅率
//! 2. 生效中的 FTA 優惠稅率（需申請優惠），取代基本稅率
//! 3. 基本稅率：一般國家用 general_rate，第二欄國家用 other_rate
//!
//! 任何缺漏或無法解析的稅率一律回傳 `AmbiguousRate`，不會當成免稅。

use crate::core::tables::OverrideTable;
use crate::domain::model::{HtsRecord, OverrideKind, RateExpr};
use crate::utils::error::{Result, TariffError};
use chrono::NaiveDate;

/// 覆寫表中代表「改用 special_rate 欄位」的值
pub const SPECIAL_RATE_MARKER: &str = "special";

enum Component {
    Percent(f64),
    Specific(f64, String),
}

/// 解析稅率文字：`Free`、`25%`、`25`、`2.5¢/kg`、`$1.20/doz`、`4.4¢/kg + 6%`
///
/// special 欄位常見的 `Free (A,AU,BH)` 會先去掉括號內的適用方案清單。
pub fn parse_rate(text: &str) -> Option<RateExpr> {
    let text = match text.find('(') {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    };
    if text.is_empty() {
        return None;
    }
    if text.eq_ignore_ascii_case("free") {
        return Some(RateExpr::Free);
    }

    let parts: Vec<&str> = text.split('+').map(str::trim).collect();
    match parts.as_slice() {
        [single] => match parse_component(single)? {
            Component::Percent(percent) => Some(RateExpr::AdValorem { percent }),
            Component::Specific(amount_usd, unit) => Some(RateExpr::Specific { amount_usd, unit }),
        },
        [first, second] => match (parse_component(first)?, parse_component(second)?) {
            (Component::Specific(amount_usd, unit), Component::Percent(percent))
            | (Component::Percent(percent), Component::Specific(amount_usd, unit)) => {
                Some(RateExpr::Compound {
                    amount_usd,
                    unit,
                    percent,
                })
            }
            _ => None,
        },
        _ => None,
    }
}

fn parse_component(text: &str) -> Option<Component> {
    if let Some(number) = text.strip_suffix('%') {
        return parse_amount(number).map(Component::Percent);
    }

    if let Some((amount, unit)) = text.split_once('/') {
        let unit = unit.trim();
        if unit.is_empty() {
            return None;
        }
        let amount = amount.trim();
        let usd = if let Some(cents) = amount.strip_suffix('¢') {
            parse_amount(cents)? / 100.0
        } else if let Some(dollars) = amount.strip_prefix('$') {
            parse_amount(dollars)?
        } else {
            return None;
        };
        return Some(Component::Specific(usd, unit.to_string()));
    }

    parse_amount(text).map(Component::Percent)
}

fn parse_amount(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// 從量稅部分：每單位美元
#[derive(Debug, Clone, PartialEq)]
pub struct SpecificDuty {
    pub amount_usd: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateBasis {
    General,
    Column2,
    Surcharge { program: String, added_percent: f64 },
    Preferential { program: String },
}

impl RateBasis {
    pub fn label(&self) -> &'static str {
        match self {
            RateBasis::General => "general",
            RateBasis::Column2 => "column2",
            RateBasis::Surcharge { .. } => "surcharge",
            RateBasis::Preferential { .. } => "preferential",
        }
    }

    pub fn program(&self) -> Option<&str> {
        match self {
            RateBasis::Surcharge { program, .. } | RateBasis::Preferential { program } => {
                Some(program)
            }
            RateBasis::General | RateBasis::Column2 => None,
        }
    }
}

/// 判定後的適用稅率
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRate {
    pub ad_valorem_percent: f64,
    pub specific: Option<SpecificDuty>,
    pub basis: RateBasis,
}

impl AppliedRate {
    fn from_expr(expr: RateExpr, basis: RateBasis) -> Self {
        let (ad_valorem_percent, specific) = match expr {
            RateExpr::Free => (0.0, None),
            RateExpr::AdValorem { percent } => (percent, None),
            RateExpr::Specific { amount_usd, unit } => (0.0, Some(SpecificDuty { amount_usd, unit })),
            RateExpr::Compound {
                amount_usd,
                unit,
                percent,
            } => (percent, Some(SpecificDuty { amount_usd, unit })),
        };
        Self {
            ad_valorem_percent,
            specific,
            basis,
        }
    }
}

/// 稅率政策設定
#[derive(Debug, Clone, Default)]
pub struct DutyPolicy {
    /// 不適用正常貿易關係、改用第二欄稅率的國家
    pub column2_countries: Vec<String>,
}

impl DutyPolicy {
    pub fn is_column2(&self, country_code: &str) -> bool {
        self.column2_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country_code))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    pub date: NaiveDate,
    pub claim_preference: bool,
}

pub fn evaluate(
    record: &HtsRecord,
    country_code: &str,
    ctx: &EvaluationContext,
    overrides: &OverrideTable,
    policy: &DutyPolicy,
) -> Result<AppliedRate> {
    let code = record.normalized_code();
    let ambiguous = |reason: String| TariffError::AmbiguousRate {
        code: record.code.clone(),
        country: country_code.to_string(),
        reason,
    };

    let (base_column, base_basis) = if policy.is_column2(country_code) {
        ("other_rate", RateBasis::Column2)
    } else {
        ("general_rate", RateBasis::General)
    };
    let base_text = match base_basis {
        RateBasis::Column2 => record.other_rate.as_deref(),
        _ => record.general_rate.as_deref(),
    };
    let base_expr = || -> Result<RateExpr> {
        let text = base_text.ok_or_else(|| ambiguous(format!("{} is missing", base_column)))?;
        parse_rate(text).ok_or_else(|| ambiguous(format!("{} '{}' is not a recognized rate", base_column, text)))
    };

    let applied = if let Some(row) =
        overrides.find(OverrideKind::Surcharge, &code, country_code, ctx.date)
    {
        let added_percent = match parse_rate(&row.rate) {
            Some(RateExpr::AdValorem { percent }) => percent,
            _ => {
                return Err(ambiguous(format!(
                    "surcharge '{}' rate '{}' is not a percentage",
                    row.program, row.rate
                )))
            }
        };
        let mut applied = AppliedRate::from_expr(
            base_expr()?,
            RateBasis::Surcharge {
                program: row.program.clone(),
                added_percent,
            },
        );
        applied.ad_valorem_percent += added_percent;
        applied
    } else if let Some(row) = ctx
        .claim_preference
        .then(|| overrides.find(OverrideKind::Preferential, &code, country_code, ctx.date))
        .flatten()
    {
        let expr = if row.rate.trim().eq_ignore_ascii_case(SPECIAL_RATE_MARKER) {
            let text = record
                .special_rate
                .as_deref()
                .ok_or_else(|| ambiguous(format!("{} points to a missing special_rate", row.program)))?;
            parse_rate(text)
                .ok_or_else(|| ambiguous(format!("special_rate '{}' is not a recognized rate", text)))?
        } else {
            parse_rate(&row.rate).ok_or_else(|| {
                ambiguous(format!(
                    "preferential '{}' rate '{}' is not a recognized rate",
                    row.program, row.rate
                ))
            })?
        };
        AppliedRate::from_expr(
            expr,
            RateBasis::Preferential {
                program: row.program.clone(),
            },
        )
    } else {
        AppliedRate::from_expr(base_expr()?, base_basis)
    };

    if let Some(specific) = &applied.specific {
        if !same_unit(&specific.unit, &record.unit_of_quantity) {
            return Err(ambiguous(format!(
                "specific duty is per '{}' but quantity is reported in '{}'",
                specific.unit, record.unit_of_quantity
            )));
        }
    }

    Ok(applied)
}

fn same_unit(a: &str, b: &str) -> bool {
    let clean = |s: &str| s.trim().trim_end_matches('.').to_ascii_lowercase();
    clean(a) == clean(b)
}
