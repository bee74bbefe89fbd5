use crate::core::duty::{self, DutyPolicy, EvaluationContext};
use crate::core::fees::FeeSchedule;
use crate::core::tables::{TableHandle, TariffTables};
use crate::core::{aggregator, resolver, sourcing};
use crate::domain::model::{
    CalculationRequest, CalculationResult, HtsRecord, ProductSpec, SearchHit, SortKey,
    SourcingReport,
};
use crate::domain::ports::ReferenceSource;
use crate::utils::error::{Result, TariffError};
use crate::utils::validation::Validate;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// 引擎執行參數，由設定檔轉換而來
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub fees: FeeSchedule,
    pub duty: DutyPolicy,
    /// 不做匯率換算，請求幣別必須與此相同
    pub base_currency: String,
    /// 請求未帶 entry_date 時用來判斷覆寫是否生效
    pub reference_date: NaiveDate,
    pub sourcing_concurrency: usize,
    pub search_default_limit: usize,
    pub search_max_limit: usize,
}

impl EngineSettings {
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            fees: FeeSchedule::default(),
            duty: DutyPolicy::default(),
            base_currency: "USD".to_string(),
            reference_date,
            sourcing_concurrency: 4,
            search_default_limit: 10,
            search_max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub hts_records: usize,
    pub overrides: usize,
}

impl From<&TariffTables> for TableStats {
    fn from(tables: &TariffTables) -> Self {
        Self {
            hts_records: tables.hts.len(),
            overrides: tables.overrides.len(),
        }
    }
}

/// 稅費試算引擎
///
/// 複製成本低（內部皆為 `Arc`），可直接交給多個請求處理端共用。
/// 每次呼叫都只讀取當下的表快照，沒有其他共享可變狀態。
#[derive(Debug, Clone)]
pub struct TariffEngine {
    tables: TableHandle,
    settings: Arc<EngineSettings>,
}

impl TariffEngine {
    pub fn new(tables: TariffTables, settings: EngineSettings) -> Self {
        Self::with_handle(TableHandle::new(tables), settings)
    }

    pub fn with_handle(tables: TableHandle, settings: EngineSettings) -> Self {
        Self {
            tables,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn stats(&self) -> TableStats {
        TableStats::from(self.tables.snapshot().as_ref())
    }

    pub fn lookup(&self, code: &str) -> Result<HtsRecord> {
        let tables = self.tables.snapshot();
        resolver::resolve(&tables.hts, code).cloned()
    }

    /// `limit` 未指定時用預設值，並限制在上限內
    pub fn search(&self, query: &str, chapter: Option<&str>, limit: Option<usize>) -> Vec<SearchHit> {
        let limit = limit
            .unwrap_or(self.settings.search_default_limit)
            .min(self.settings.search_max_limit);
        let tables = self.tables.snapshot();
        resolver::search(&tables.hts, query, chapter, limit)
    }

    pub fn calculate(&self, request: &CalculationRequest) -> Result<CalculationResult> {
        let tables = self.tables.snapshot();
        calculate_with(&self.settings, &tables, request)
    }

    /// 依序比較各國到岸成本
    pub fn compare_sourcing(
        &self,
        baseline: &str,
        candidates: &[String],
        spec: &ProductSpec,
        sort_by: SortKey,
    ) -> Result<SourcingReport> {
        spec.request_for(baseline).validate()?;
        let tables = self.tables.snapshot();
        sourcing::compare(baseline, candidates, sort_by, |country| {
            calculate_with(&self.settings, &tables, &spec.request_for(country))
        })
    }

    /// 與 [`compare_sourcing`](Self::compare_sourcing) 相同，但各國試算分散到有上限的工作池
    ///
    /// 全部完成後才依排序鍵排序。所有國家共用同一份表快照。
    pub async fn compare_sourcing_parallel(
        &self,
        baseline: &str,
        candidates: &[String],
        spec: &ProductSpec,
        sort_by: SortKey,
    ) -> Result<SourcingReport> {
        spec.request_for(baseline).validate()?;

        let tables = self.tables.snapshot();
        let countries = sourcing::countries_in_order(baseline, candidates);
        let semaphore = Arc::new(Semaphore::new(self.settings.sourcing_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        tracing::debug!(
            "Comparing {} countries with {} workers",
            countries.len(),
            self.settings.sourcing_concurrency
        );

        for (idx, country) in countries.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| TariffError::TaskFailed {
                    message: e.to_string(),
                })?;
            let settings = Arc::clone(&self.settings);
            let tables = Arc::clone(&tables);
            let request = spec.request_for(country);
            tasks.spawn_blocking(move || {
                let outcome = calculate_with(&settings, &tables, &request);
                drop(permit);
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<Result<CalculationResult>>> =
            countries.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (idx, outcome) = joined.map_err(|e| TariffError::TaskFailed {
                message: e.to_string(),
            })?;
            slots[idx] = Some(outcome);
        }

        let outcomes = countries
            .into_iter()
            .zip(slots)
            .filter_map(|(country, slot)| slot.map(|outcome| (country, outcome)))
            .collect();
        sourcing::build_report(baseline, outcomes, sort_by)
    }

    /// 從來源重新載入參考資料並整批替換
    ///
    /// 載入失敗時保留舊表。
    pub async fn reload(&self, source: &dyn ReferenceSource) -> Result<TableStats> {
        let tables = TariffTables::load_from(source).await?;
        let stats = TableStats::from(&tables);
        self.tables.swap(tables);
        tracing::info!(
            "🔄 Reference tables reloaded from {} ({} HTS records, {} overrides)",
            source.describe(),
            stats.hts_records,
            stats.overrides
        );
        Ok(stats)
    }
}

/// 單筆試算：驗證 → 查代碼 → 判定稅率 → 規費 → 彙總
fn calculate_with(
    settings: &EngineSettings,
    tables: &TariffTables,
    request: &CalculationRequest,
) -> Result<CalculationResult> {
    request.validate()?;
    if !request.currency.eq_ignore_ascii_case(&settings.base_currency) {
        return Err(TariffError::invalid_input(
            "currency",
            &request.currency,
            format!(
                "Only {} is supported; convert amounts before calculating",
                settings.base_currency
            ),
        ));
    }

    let record = resolver::resolve(&tables.hts, &request.hts_code)?;
    let ctx = EvaluationContext {
        date: request.entry_date.unwrap_or(settings.reference_date),
        claim_preference: request.claim_preference,
    };
    let rate = duty::evaluate(
        record,
        &request.country_code,
        &ctx,
        &tables.overrides,
        &settings.duty,
    )?;
    let customs_value = aggregator::customs_value(request);
    if !customs_value.is_finite() {
        return Err(too_large(request));
    }
    let fees = settings
        .fees
        .compute_fees(customs_value, request.transport_mode);

    let result = aggregator::aggregate(request, record, &rate, fees);
    if !(result.duty_amount.is_finite() && result.total_landed_cost.is_finite()) {
        return Err(too_large(request));
    }
    Ok(result)
}

/// 金額加總或稅額溢位，無法給出有意義的結果
fn too_large(request: &CalculationRequest) -> TariffError {
    TariffError::invalid_input(
        "product_value",
        request.product_value,
        "Amounts are too large to calculate a landed cost",
    )
}
