//! 多國採購比較：每個國家各跑一次完整試算，再依指定欄位排序。

use crate::core::fees::round_cents;
use crate::domain::model::{
    CalculationResult, ExcludedCountry, PartialComparisonFailure, SortKey, SourcingOption,
    SourcingReport,
};
use crate::utils::error::Result;
use std::cmp::Ordering;

/// 基準國在前，其後依輸入順序；重複國家只保留第一次
pub fn countries_in_order(baseline: &str, candidates: &[String]) -> Vec<String> {
    let mut countries: Vec<String> = Vec::with_capacity(candidates.len() + 1);
    for country in std::iter::once(baseline).chain(candidates.iter().map(String::as_str)) {
        let country = country.trim().to_ascii_uppercase();
        if !country.is_empty() && !countries.contains(&country) {
            countries.push(country);
        }
    }
    countries
}

/// 由各國試算結果組成報表
///
/// `outcomes` 需與 [`countries_in_order`] 同順序。基準國失敗時無法計算節省金額，直接回傳該錯誤；
/// 其他國家失敗則排除並記錄在 `partial_failure`。
pub fn build_report(
    baseline: &str,
    outcomes: Vec<(String, Result<CalculationResult>)>,
    sort_by: SortKey,
) -> Result<SourcingReport> {
    let baseline = baseline.trim().to_ascii_uppercase();

    let mut successes: Vec<(String, CalculationResult)> = Vec::with_capacity(outcomes.len());
    let mut excluded = Vec::new();
    for (country, outcome) in outcomes {
        match outcome {
            Ok(result) => successes.push((country, result)),
            Err(err) if country == baseline => return Err(err),
            Err(err) => excluded.push(ExcludedCountry {
                country_code: country,
                kind: err.category().code().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    // 基準國一定存在：countries_in_order 總是把它放第一個
    let baseline_total = successes
        .iter()
        .find(|(country, _)| *country == baseline)
        .map(|(_, result)| result.total_landed_cost)
        .unwrap_or(0.0);

    let mut options: Vec<SourcingOption> = successes
        .into_iter()
        .map(|(country, result)| SourcingOption {
            fta_benefits: fta_benefits(&result),
            savings: round_cents(baseline_total - result.total_landed_cost),
            country_code: country,
            duty_rate: result.duty_rate,
            effective_duty_rate: effective_duty_rate(&result),
            duty_amount: result.duty_amount,
            total_landed_cost: result.total_landed_cost,
        })
        .collect();

    sort_options(&mut options, sort_by);

    Ok(SourcingReport {
        baseline_country: baseline,
        sort_by,
        options,
        partial_failure: (!excluded.is_empty()).then_some(PartialComparisonFailure { excluded }),
    })
}

/// 依序逐一試算後組成報表
pub fn compare<F>(
    baseline: &str,
    candidates: &[String],
    sort_by: SortKey,
    mut calculate: F,
) -> Result<SourcingReport>
where
    F: FnMut(&str) -> Result<CalculationResult>,
{
    let outcomes = countries_in_order(baseline, candidates)
        .into_iter()
        .map(|country| {
            let outcome = calculate(&country);
            (country, outcome)
        })
        .collect();
    build_report(baseline, outcomes, sort_by)
}

/// 穩定排序，同值時保留輸入順序
pub fn sort_options(options: &mut [SourcingOption], sort_by: SortKey) {
    let cmp = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match sort_by {
        SortKey::Savings => options.sort_by(|a, b| cmp(b.savings, a.savings)),
        SortKey::DutyRate => {
            options.sort_by(|a, b| cmp(a.effective_duty_rate, b.effective_duty_rate))
        }
        SortKey::TotalLandedCost => {
            options.sort_by(|a, b| cmp(a.total_landed_cost, b.total_landed_cost))
        }
    }
}

/// 總稅額 / 完稅價格，以百分比表示並取到小數兩位
fn effective_duty_rate(result: &CalculationResult) -> f64 {
    if result.customs_value <= 0.0 {
        return 0.0;
    }
    round_cents(result.duty_amount / result.customs_value * 100.0)
}

fn fta_benefits(result: &CalculationResult) -> Option<String> {
    if result.breakdown.rate_basis != "preferential" {
        return None;
    }
    let program = result.breakdown.applied_program.as_deref()?;
    Some(format!(
        "{}: preferential duty rate {}% applied",
        program, result.duty_rate
    ))
}
