use crate::domain::model::{HtsRecord, TradeOverride};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 參考資料來源（稅則表與貿易措施覆寫表）
///
/// 引擎只讀取，不負責資料的匯入與更新。
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn load_hts(&self) -> Result<Vec<HtsRecord>>;
    async fn load_overrides(&self) -> Result<Vec<TradeOverride>>;
    fn describe(&self) -> String;
}
