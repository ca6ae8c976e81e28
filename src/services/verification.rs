use anyhow::Context;
use serde::Deserialize;

use crate::services::metrics::VERIFICATIONS_COUNTER;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    pub score: Option<f64>,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

impl SiteVerifyResponse {
    /// reCAPTCHA v3: the token must be valid and the score strictly above the threshold.
    pub fn is_human(&self, min_score: f64) -> bool {
        self.success && self.score.map(|s| s > min_score).unwrap_or(false)
    }
}

/// Checks reCAPTCHA tokens against Google's siteverify endpoint.
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    min_score: f64,
}

impl RecaptchaVerifier {
    pub fn new(client: reqwest::Client, secret: String, min_score: f64) -> Self {
        Self { client, secret, min_score }
    }

    pub async fn verify(&self, token: &str) -> anyhow::Result<bool> {
        let response: SiteVerifyResponse = self
            .client
            .post(SITEVERIFY_URL)
            .query(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await
            .context("reCAPTCHA request failed")?
            .error_for_status()
            .context("reCAPTCHA returned an error status")?
            .json()
            .await
            .context("reCAPTCHA returned an unreadable body")?;

        let human = response.is_human(self.min_score);
        VERIFICATIONS_COUNTER
            .with_label_values(&[if human { "passed" } else { "rejected" }])
            .inc();
        if !human {
            tracing::info!(score = ?response.score, errors = ?response.error_codes, "reCAPTCHA rejected");
        }
        Ok(human)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> SiteVerifyResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn score_must_exceed_threshold() {
        assert!(parse(r#"{"success": true, "score": 0.9}"#).is_human(0.5));
        assert!(!parse(r#"{"success": true, "score": 0.5}"#).is_human(0.5));
        assert!(!parse(r#"{"success": false, "score": 0.9}"#).is_human(0.5));
    }

    #[test]
    fn missing_score_is_not_human() {
        let response = parse(r#"{"success": false, "error-codes": ["invalid-input-response"]}"#);
        assert_eq!(response.error_codes, vec!["invalid-input-response"]);
        assert!(!response.is_human(0.0));
    }
}
