use crate::core::duty::AppliedRate;
use crate::core::fees::{round_cents, Fees};
use crate::domain::model::{CalculationRequest, CalculationResult, CostBreakdown, HtsRecord};

/// 完稅價格：商品價值 + 運費 + 保險 + 其他費用（CIF 含運保）
pub fn customs_value(request: &CalculationRequest) -> f64 {
    round_cents(
        request.product_value + request.freight_cost + request.insurance_cost + request.other_costs,
    )
}

/// 彙總成到岸成本
///
/// 各金額先進位到分再加總，所以 `total_landed_cost` 與各項之和完全一致。
pub fn aggregate(
    request: &CalculationRequest,
    record: &HtsRecord,
    rate: &AppliedRate,
    fees: Fees,
) -> CalculationResult {
    let customs_value = customs_value(request);
    let ad_valorem_duty = round_cents(customs_value * rate.ad_valorem_percent / 100.0);
    let specific_duty = rate
        .specific
        .as_ref()
        .map(|s| round_cents(s.amount_usd * f64::from(request.quantity)))
        .unwrap_or(0.0);
    let duty_amount = ad_valorem_duty + specific_duty;
    let total_landed_cost = customs_value + duty_amount + fees.mpf + fees.hmf;

    CalculationResult {
        hts_code: record.code.clone(),
        country_code: request.country_code.to_ascii_uppercase(),
        duty_rate: rate.ad_valorem_percent,
        duty_amount,
        mpf_amount: fees.mpf,
        hmf_amount: fees.hmf,
        customs_value,
        total_landed_cost,
        breakdown: CostBreakdown {
            product_value: request.product_value,
            freight_cost: request.freight_cost,
            insurance_cost: request.insurance_cost,
            other_costs: request.other_costs,
            quantity: request.quantity,
            currency: request.currency.to_ascii_uppercase(),
            transport_mode: request.transport_mode,
            ad_valorem_duty,
            specific_duty,
            rate_basis: rate.basis.label().to_string(),
            applied_program: rate.basis.program().map(str::to_string),
        },
    }
}
