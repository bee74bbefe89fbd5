use crate::core::duty::{parse_rate, SPECIAL_RATE_MARKER};
use crate::domain::model::{normalize_code, HtsRecord, OverrideKind, RateExpr, TradeOverride};
use crate::domain::ports::ReferenceSource;
use crate::utils::error::{Result, TariffError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 以正規化代碼為鍵的稅則索引，保留原始載入順序供搜尋使用
#[derive(Debug, Default)]
pub struct HtsIndex {
    records: Vec<HtsRecord>,
    by_code: HashMap<String, usize>,
}

/// 第 `index` 筆資料在 CSV 中的行號（標題為第 1 行）
fn line_of(index: usize) -> usize {
    index + 2
}

impl HtsIndex {
    /// 代碼重複時回報第二次出現的行號
    pub fn new(records: Vec<HtsRecord>) -> Result<Self> {
        let mut by_code = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if by_code.insert(record.normalized_code(), i).is_some() {
                return Err(TariffError::DataError {
                    source_name: "hts".to_string(),
                    row: line_of(i),
                    message: format!("duplicate HTS code {}", record.code),
                });
            }
        }
        Ok(Self { records, by_code })
    }

    pub fn get(&self, normalized: &str) -> Option<&HtsRecord> {
        self.by_code.get(normalized).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[HtsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 貿易措施覆寫表
#[derive(Debug, Default)]
pub struct OverrideTable {
    rows: Vec<TradeOverride>,
}

/// 正規化並檢查一列覆寫資料
///
/// 前綴去除分隔符號、國家代碼轉大寫；稅率需符合該種類可用的格式。
pub fn check_override(mut row: TradeOverride) -> std::result::Result<TradeOverride, String> {
    let code_prefix = normalize_code(row.code_prefix.trim());
    if code_prefix.is_empty() || !code_prefix.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid code_prefix '{}'", row.code_prefix));
    }
    let country_code = row.country_code.trim().to_ascii_uppercase();
    if country_code.len() != 2 || !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("invalid country_code '{}'", row.country_code));
    }
    if let Some(end) = row.effective_to {
        if end < row.effective_from {
            return Err(format!(
                "effective_to {} is before effective_from {}",
                end, row.effective_from
            ));
        }
    }

    let rate_ok = match row.kind {
        OverrideKind::Surcharge => matches!(parse_rate(&row.rate), Some(RateExpr::AdValorem { .. })),
        OverrideKind::Preferential => {
            row.rate.trim().eq_ignore_ascii_case(SPECIAL_RATE_MARKER) || parse_rate(&row.rate).is_some()
        }
    };
    if !rate_ok {
        return Err(format!(
            "rate '{}' is not valid for a {:?} override",
            row.rate, row.kind
        ));
    }

    row.code_prefix = code_prefix;
    row.country_code = country_code;
    Ok(row)
}

impl OverrideTable {
    pub fn new(rows: Vec<TradeOverride>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                check_override(row).map_err(|message| TariffError::DataError {
                    source_name: "overrides".to_string(),
                    row: line_of(i),
                    message,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    /// 找出指定種類下生效中、代碼前綴最長的一列
    ///
    /// 前綴長度相同時取表中先出現者。
    pub fn find(
        &self,
        kind: OverrideKind,
        normalized_code: &str,
        country_code: &str,
        date: NaiveDate,
    ) -> Option<&TradeOverride> {
        let mut best: Option<&TradeOverride> = None;
        for row in &self.rows {
            if row.kind != kind
                || !row.country_code.eq_ignore_ascii_case(country_code)
                || !normalized_code.starts_with(&row.code_prefix)
                || !row.is_active_on(date)
            {
                continue;
            }
            match best {
                Some(current) if current.code_prefix.len() >= row.code_prefix.len() => {}
                _ => best = Some(row),
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 一份完整且不可變的參考資料快照
#[derive(Debug, Default)]
pub struct TariffTables {
    pub hts: HtsIndex,
    pub overrides: OverrideTable,
}

impl TariffTables {
    pub fn new(records: Vec<HtsRecord>, overrides: Vec<TradeOverride>) -> Result<Self> {
        Ok(Self {
            hts: HtsIndex::new(records)?,
            overrides: OverrideTable::new(overrides)?,
        })
    }

    pub async fn load_from(source: &dyn ReferenceSource) -> Result<Self> {
        let records = source.load_hts().await?;
        let overrides = source.load_overrides().await?;
        Self::new(records, overrides)
    }
}

/// 可整批替換的參考資料控制代碼
///
/// 讀取端取得 `Arc` 快照後即與後續替換無關，不會看到更新到一半的表。
#[derive(Debug, Clone)]
pub struct TableHandle {
    current: Arc<RwLock<Arc<TariffTables>>>,
}

impl TableHandle {
    pub fn new(tables: TariffTables) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(tables))),
        }
    }

    pub fn snapshot(&self) -> Arc<TariffTables> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// 替換整份表，回傳舊的快照
    pub fn swap(&self, tables: TariffTables) -> Arc<TariffTables> {
        let next = Arc::new(tables);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
