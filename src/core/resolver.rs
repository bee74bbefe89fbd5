//! HTS 代碼查詢與描述搜尋。

use crate::core::tables::HtsIndex;
use crate::domain::model::{normalize_code, HtsRecord, SearchHit};
use crate::utils::error::{Result, TariffError};
use std::cmp::Ordering;

/// 將使用者輸入的代碼轉成索引鍵
///
/// "8471.30.0100" 與 "8471300100" 會得到相同結果。
pub fn normalize_lookup_code(raw: &str) -> Result<String> {
    let digits = normalize_code(raw.trim());
    if digits.is_empty() {
        return Err(TariffError::invalid_input(
            "hts_code",
            raw,
            "HTS code cannot be empty",
        ));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(TariffError::invalid_input(
            "hts_code",
            raw,
            "HTS code may only contain digits and periods",
        ));
    }
    Ok(digits)
}

pub fn resolve<'a>(index: &'a HtsIndex, code: &str) -> Result<&'a HtsRecord> {
    let key = normalize_lookup_code(code)?;
    index.get(&key).ok_or_else(|| TariffError::NotFound {
        code: code.trim().to_string(),
    })
}

/// 依描述做關鍵字搜尋，最相關者在前
///
/// 分數為查詢詞命中比例；純數字查詢另外比對代碼前綴。同分時依代碼排序。
pub fn search(
    index: &HtsIndex,
    query: &str,
    chapter_filter: Option<&str>,
    limit: usize,
) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    let digit_query = normalize_code(query);
    let digit_query = (digit_query.len() >= 2 && digit_query.chars().all(|c| c.is_ascii_digit()))
        .then_some(digit_query);

    let chapter_filter = chapter_filter
        .map(normalize_code)
        .filter(|c| !c.is_empty());

    let mut hits: Vec<SearchHit> = index
        .records()
        .iter()
        .filter(|record| match &chapter_filter {
            Some(prefix) => record.normalized_code().starts_with(prefix.as_str()),
            None => true,
        })
        .filter_map(|record| {
            let score = score_record(record, &terms, digit_query.as_deref());
            (score > 0.0).then(|| SearchHit {
                score,
                record: record.clone(),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.record.code.cmp(&b.record.code))
    });
    hits.truncate(limit);
    hits
}

fn score_record(record: &HtsRecord, terms: &[String], digit_query: Option<&str>) -> f64 {
    if let Some(digits) = digit_query {
        if record.normalized_code().starts_with(digits) {
            return 1.0;
        }
    }

    if terms.is_empty() {
        return 0.0;
    }

    let description = record.description.to_lowercase();
    let matched = terms
        .iter()
        .filter(|term| description.contains(term.as_str()))
        .count();
    matched as f64 / terms.len() as f64
}
