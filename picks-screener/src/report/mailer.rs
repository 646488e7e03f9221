//! Mail delivery for run reports.
//!
//! Posts the report to a configured mail-relay endpoint with the CSV as an
//! attachment. Delivery is best-effort with bounded retries; an
//! unconfigured client is a logged no-op, never an error.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::RunReport;

/// Request to the mail relay.
#[derive(Debug, Serialize)]
struct MailRequest {
    recipient: String,
    subject: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<MailAttachment>,
}

/// A single attachment.
#[derive(Debug, Serialize)]
struct MailAttachment {
    filename: String,
    content_type: String,
    content: String,
}

/// Response from the mail relay.
#[derive(Debug, Deserialize)]
struct MailResponse {
    success: bool,
    #[allow(dead_code)]
    message_id: Option<String>,
    error: Option<String>,
}

/// Client for sending run reports by email.
pub struct MailClient {
    enabled: bool,
    endpoint: String,
    recipient: String,
    retry_count: u32,
    client: reqwest::Client,
}

impl MailClient {
    /// Create a new mail client. Disabled unless both the relay endpoint
    /// and the recipient are configured.
    pub fn new(config: &picks_common::config::Config) -> Self {
        let email = &config.email;
        let endpoint = email.endpoint.clone().unwrap_or_default();
        let recipient = email.recipient.clone().unwrap_or_default();
        let enabled = !endpoint.is_empty() && !recipient.is_empty();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(email.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            enabled,
            endpoint,
            recipient,
            retry_count: email.retry_count.max(1),
            client,
        }
    }

    /// Whether delivery is configured.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Send a run report with its CSV attached.
    pub async fn send_report(&self, report: &RunReport) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!("Mail delivery not configured, skipping report email");
            return Ok(());
        }

        let csv = report.to_csv()?;
        let request = MailRequest {
            recipient: self.recipient.clone(),
            subject: report.subject(),
            body: format!(
                "Attached are the top {} stocks by buy score.\n\n{}",
                report.picks.len(),
                report.summary()
            ),
            attachment: Some(MailAttachment {
                filename: "top_picks.csv".to_string(),
                content_type: "text/csv".to_string(),
                content: csv,
            }),
        };

        self.send(&request).await
    }

    /// Send a request with retry logic.
    async fn send(&self, request: &MailRequest) -> Result<()> {
        let url = format!("{}/api/v1/send", self.endpoint);

        let mut last_error = None;
        for attempt in 1..=self.retry_count {
            match self.try_send(&url, request).await {
                Ok(()) => {
                    tracing::info!(
                        recipient = %self.recipient,
                        subject = %request.subject,
                        "Report email sent"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to send report email, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt)))
                            .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }

    /// Try to send a single request.
    async fn try_send(&self, url: &str, request: &MailRequest) -> Result<()> {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, error_text);
        }

        let result: MailResponse = response.json().await?;
        if result.success {
            Ok(())
        } else {
            anyhow::bail!(
                "Send failed: {}",
                result.error.unwrap_or_else(|| "Unknown error".to_string())
            )
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
