// SPDX-License-Identifier: MIT

//! Bitrix24 REST client for fetching activity and user records.
//!
//! Handles:
//! - The `result`/`error` response envelope
//! - Offset pagination with a fixed page size and a hard page cap
//! - Inter-page delay to stay under the portal's rate limits
//!
//! The client knows nothing about caching; the reconciler decides when to
//! call it and what to do with partial results.

use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::models::Activity;

/// Bitrix24 REST client (inbound-webhook style: the auth token is part of
/// the base URL).
#[derive(Clone)]
pub struct BitrixClient {
    http: reqwest::Client,
    webhook_url: String,
    page_size: u32,
    page_cap: u32,
    page_delay: Duration,
}

/// Result of one (user, window) activity fetch.
///
/// `complete` is false when the page cap cut pagination short or a page
/// request failed mid-sequence; the records gathered so far are still valid
/// and cacheable, but the caller must not treat the window as fully covered.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub activities: Vec<Activity>,
    pub complete: bool,
}

impl BitrixClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            webhook_url: config.bitrix_webhook_url.clone(),
            page_size: config.page_size,
            page_cap: config.page_cap,
            page_delay: Duration::from_millis(config.page_delay_ms),
        }
    }

    /// Fetch all activities for one user inside one date window, paginating
    /// until the remote runs out of records or the page cap is hit.
    ///
    /// Results come back newest-first (`order[CREATED]=DESC`) so an aborted
    /// fetch keeps the freshest records; nothing downstream depends on the
    /// ordering for correctness.
    ///
    /// A transport or API failure mid-sequence ends pagination with
    /// `complete: false` rather than erroring: the caller treats the window
    /// identically to "remote returned nothing more" and must not infer
    /// absence of data from it.
    pub async fn list_activities(
        &self,
        user_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        type_filter: Option<&str>,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome {
            activities: Vec::new(),
            complete: true,
        };
        let mut offset: u32 = 0;
        let mut pages: u32 = 0;

        loop {
            let mut params: Vec<(String, String)> = vec![
                (
                    "filter[>=CREATED]".to_string(),
                    format!("{start_date}T00:00:00"),
                ),
                (
                    "filter[<=CREATED]".to_string(),
                    format!("{end_date}T23:59:59"),
                ),
                ("filter[AUTHOR_ID]".to_string(), user_id.to_string()),
                ("order[CREATED]".to_string(), "DESC".to_string()),
                ("start".to_string(), offset.to_string()),
            ];
            if let Some(type_id) = type_filter {
                params.push(("filter[TYPE_ID]".to_string(), type_id.to_string()));
            }
            for (i, field) in ["ID", "CREATED", "AUTHOR_ID", "TYPE_ID", "SUBJECT", "DESCRIPTION"]
                .iter()
                .enumerate()
            {
                params.push((format!("select[{i}]"), field.to_string()));
            }

            let page = match self.call_method("crm.activity.list", &params).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        %start_date,
                        %end_date,
                        offset,
                        error = %e,
                        "Activity page fetch failed, keeping partial window"
                    );
                    outcome.complete = false;
                    break;
                }
            };

            let records = match page.as_array() {
                Some(records) => records,
                None => {
                    tracing::warn!(user_id, offset, "Malformed activity page (not an array)");
                    outcome.complete = false;
                    break;
                }
            };

            if records.is_empty() {
                break;
            }

            for record in records {
                match Activity::from_remote(record) {
                    Some(activity) => outcome.activities.push(activity),
                    None => tracing::warn!(user_id, ?record, "Skipping unparseable activity"),
                }
            }

            // A short page means the remote ran out of records.
            if (records.len() as u32) < self.page_size {
                break;
            }

            pages += 1;
            if pages >= self.page_cap {
                tracing::warn!(
                    user_id,
                    %start_date,
                    %end_date,
                    pages,
                    "Page cap reached, window deliberately incomplete"
                );
                outcome.complete = false;
                break;
            }

            offset += self.page_size;
            tokio::time::sleep(self.page_delay).await;
        }

        tracing::debug!(
            user_id,
            %start_date,
            %end_date,
            count = outcome.activities.len(),
            complete = outcome.complete,
            "Window fetch finished"
        );
        outcome
    }

    /// Fetch the authenticated portal user (connection test).
    pub async fn current_user(&self) -> Result<Value, AppError> {
        self.call_method("user.current", &[]).await
    }

    /// Fetch one portal user's profile by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<Value>, AppError> {
        let params = [("ID".to_string(), user_id.to_string())];
        let result = self.call_method("user.get", &params).await?;
        Ok(result
            .as_array()
            .and_then(|users| users.first())
            .cloned())
    }

    /// Invoke one REST method and unwrap the `result`/`error` envelope.
    async fn call_method(
        &self,
        method: &str,
        params: &[(String, String)],
    ) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.webhook_url, method);

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::BitrixApi(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BitrixApi(format!(
                "{method} returned HTTP {status}: {body}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| AppError::BitrixApi(format!("{method} JSON parse error: {e}")))?;

        if let Some(error) = envelope.get("error") {
            let description = envelope
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(AppError::BitrixApi(format!(
                "{method} API error {error}: {description}"
            )));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| AppError::BitrixApi(format!("{method} response has no result field")))
    }
}
