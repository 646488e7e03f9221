//! Report generation for screening runs.
//!
//! Ranks scored candidates, keeps the top N, and renders the result as a
//! CSV attachment (the email payload) or Markdown (logs, API responses).

pub mod mailer;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use mailer::MailClient;

use crate::pipeline::ProvenanceBreakdown;
use crate::scoring::ScoredStock;

// ============================================================================
// Run Report
// ============================================================================

/// The ranked outcome of one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: String,
    /// When the report was assembled
    pub generated_at: DateTime<Utc>,
    /// Top picks, buy-score descending
    pub picks: Vec<ScoredStock>,
    /// Candidates that received a score
    pub total_scored: usize,
    /// Records produced by the fetch pipeline
    pub total_records: usize,
    /// Real vs synthetic data split
    pub breakdown: ProvenanceBreakdown,
}

/// CSV row shape; columns follow the report contract.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Industry")]
    industry: &'a str,
    #[serde(rename = "BuyScore")]
    buy_score: u8,
    #[serde(rename = "ReasonsToBuy")]
    reasons: String,
}

impl RunReport {
    /// Rank the scored candidates and keep the top `top_n`.
    ///
    /// Sorting is buy-score descending with the symbol as a stable
    /// tiebreaker, so equal scores rank deterministically.
    pub fn new(
        run_id: impl Into<String>,
        mut scored: Vec<ScoredStock>,
        top_n: usize,
        total_records: usize,
        breakdown: ProvenanceBreakdown,
    ) -> Self {
        let total_scored = scored.len();
        scored.sort_by(|a, b| {
            b.buy_score
                .cmp(&a.buy_score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        scored.truncate(top_n);

        Self {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            picks: scored,
            total_scored,
            total_records,
            breakdown,
        }
    }

    /// Email subject line.
    pub fn subject(&self) -> String {
        format!("Top {} Stock Buy Picks (P/E > 0)", self.picks.len())
    }

    /// Render the picks as CSV.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for pick in &self.picks {
            writer
                .serialize(CsvRow {
                    symbol: &pick.symbol,
                    industry: &pick.sector,
                    buy_score: pick.buy_score,
                    reasons: pick.reasons.join("; "),
                })
                .context("Failed to encode report row")?;
        }

        let bytes = writer.into_inner().context("Failed to flush report CSV")?;
        String::from_utf8(bytes).context("Report CSV is not valid UTF-8")
    }

    /// Render the report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = format!(
            "# Stock Buy Picks\n\n**Run**: {}\n**Generated**: {}\n\n",
            self.run_id,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Records fetched**: {}\n", self.total_records));
        md.push_str(&format!(
            "- **Data provenance**: {} real, {} synthetic\n",
            self.breakdown.real, self.breakdown.synthetic
        ));
        md.push_str(&format!("- **Candidates scored**: {}\n\n", self.total_scored));

        md.push_str("## Picks\n\n");
        md.push_str("| # | Symbol | Industry | Score | Reasons |\n");
        md.push_str("|---|--------|----------|-------|---------|\n");
        for (rank, pick) in self.picks.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                rank + 1,
                pick.symbol,
                pick.sector,
                pick.buy_score,
                pick.reasons.join("; ")
            ));
        }

        md
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "Run {}: {} picks from {} scored candidates ({} records: {} real / {} synthetic)",
            self.run_id,
            self.picks.len(),
            self.total_scored,
            self.total_records,
            self.breakdown.real,
            self.breakdown.synthetic
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(symbol: &str, score: u8) -> ScoredStock {
        ScoredStock {
            symbol: symbol.to_string(),
            sector: "Information Technology".to_string(),
            buy_score: score,
            reasons: vec!["solid growth".to_string(), "cheap".to_string()],
        }
    }

    #[test]
    fn test_ranking_is_score_descending() {
        let report = RunReport::new(
            "run-a",
            vec![scored("LOW", 3), scored("HIGH", 9), scored("MID", 6)],
            25,
            3,
            ProvenanceBreakdown::default(),
        );

        let symbols: Vec<&str> = report.picks.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["HIGH", "MID", "LOW"]);
    }

    #[test]
    fn test_ties_break_by_symbol() {
        let report = RunReport::new(
            "run-a",
            vec![scored("ZZZ", 7), scored("AAA", 7)],
            25,
            2,
            ProvenanceBreakdown::default(),
        );
        assert_eq!(report.picks[0].symbol, "AAA");
    }

    #[test]
    fn test_top_n_truncation() {
        let candidates = (0..40).map(|i| scored(&format!("S{}", i), 5)).collect();
        let report = RunReport::new("run-a", candidates, 25, 40, ProvenanceBreakdown::default());

        assert_eq!(report.picks.len(), 25);
        assert_eq!(report.total_scored, 40);
    }

    #[test]
    fn test_csv_shape() {
        let report = RunReport::new(
            "run-a",
            vec![scored("AAPL", 9)],
            25,
            1,
            ProvenanceBreakdown::default(),
        );

        let csv = report.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Symbol,Industry,BuyScore,ReasonsToBuy"));
        assert_eq!(
            lines.next(),
            Some("AAPL,Information Technology,9,solid growth; cheap")
        );
    }

    #[test]
    fn test_markdown_lists_all_picks() {
        let report = RunReport::new(
            "run-a",
            vec![scored("AAPL", 9), scored("MSFT", 8)],
            25,
            2,
            ProvenanceBreakdown::default(),
        );

        let md = report.to_markdown();
        assert!(md.contains("| 1 | AAPL |"));
        assert!(md.contains("| 2 | MSFT |"));
    }

    #[test]
    fn test_subject_reflects_pick_count() {
        let report = RunReport::new(
            "run-a",
            vec![scored("AAPL", 9)],
            25,
            1,
            ProvenanceBreakdown::default(),
        );
        assert_eq!(report.subject(), "Top 1 Stock Buy Picks (P/E > 0)");
    }
}
