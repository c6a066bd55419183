use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level {other:?}")),
        }
    }
}

/// One stored analysis result, in the field names clients exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub fact_check_suggestion: String,
    #[serde(default)]
    pub verdict: String,
}

#[derive(sqlx::FromRow)]
struct ScanRow {
    id: String,
    timestamp: String,
    content: String,
    image_url: Option<String>,
    is_ai_generated: bool,
    confidence_score: f64,
    risk_level: String,
    indicators: String,
    fact_check_suggestion: String,
    verdict: String,
}

impl From<ScanRow> for ScanRecord {
    fn from(row: ScanRow) -> Self {
        let risk_level = row.risk_level.parse().unwrap_or_else(|err| {
            warn!(scan_id = %row.id, %err, "stored scan has an invalid risk level");
            RiskLevel::Low
        });
        let indicators = serde_json::from_str(&row.indicators).unwrap_or_else(|err| {
            warn!(scan_id = %row.id, ?err, "stored scan has unreadable indicators");
            Vec::new()
        });

        ScanRecord {
            id: row.id,
            timestamp: row.timestamp,
            content: row.content,
            image_url: row.image_url,
            is_ai_generated: row.is_ai_generated,
            confidence_score: row.confidence_score,
            risk_level,
            indicators,
            fact_check_suggestion: row.fact_check_suggestion,
            verdict: row.verdict,
        }
    }
}

/// Aggregate view over a user's scans.
///
/// `record` folds one result in at a time, keeping `accuracy` as the running
/// mean of confidence scores, so the totals can be maintained incrementally
/// (as the offline client does) or rebuilt from stored rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_scanned: u64,
    pub flagged: u64,
    pub verified: u64,
    pub accuracy: f64,
}

impl ScanStats {
    pub fn record(&mut self, is_ai_generated: bool, confidence_score: f64) {
        let previous = self.total_scanned as f64;
        self.total_scanned += 1;
        if is_ai_generated {
            self.flagged += 1;
        } else {
            self.verified += 1;
        }
        self.accuracy = (self.accuracy * previous + confidence_score) / self.total_scanned as f64;
    }
}

pub async fn insert_scan(
    pool: &SqlitePool,
    user_id: Option<i64>,
    scan: &ScanRecord,
) -> sqlx::Result<()> {
    let indicators = serde_json::to_string(&scan.indicators)
        .map_err(|err| sqlx::Error::Protocol(err.to_string()))?;

    sqlx::query(
        "INSERT INTO scans (id, user_id, timestamp, content, image_url, is_ai_generated,
             confidence_score, risk_level, indicators, fact_check_suggestion, verdict)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&scan.id)
    .bind(user_id)
    .bind(&scan.timestamp)
    .bind(&scan.content)
    .bind(scan.image_url.as_deref())
    .bind(scan.is_ai_generated)
    .bind(scan.confidence_score)
    .bind(scan.risk_level.as_str())
    .bind(indicators)
    .bind(&scan.fact_check_suggestion)
    .bind(&scan.verdict)
    .execute(pool)
    .await?;

    Ok(())
}

/// Scans owned by `user_id`, newest first. Anonymous scans never match.
pub async fn list_history(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<ScanRecord>> {
    let rows = sqlx::query_as::<_, ScanRow>(
        "SELECT id, timestamp, content, image_url, is_ai_generated, confidence_score,
                risk_level, indicators, fact_check_suggestion, verdict
         FROM scans
         WHERE user_id = ?
         ORDER BY timestamp DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ScanRecord::from).collect())
}

pub async fn get_stats(pool: &SqlitePool, user_id: i64) -> sqlx::Result<ScanStats> {
    let rows: Vec<(bool, f64)> = sqlx::query_as(
        "SELECT is_ai_generated, confidence_score FROM scans WHERE user_id = ? ORDER BY timestamp",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut stats = ScanStats::default();
    for (is_ai_generated, confidence_score) in rows {
        stats.record(is_ai_generated, confidence_score);
    }
    Ok(stats)
}
