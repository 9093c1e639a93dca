use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::source::TimeEntrySource;
use crate::time_entry::TimeEntry;

const USER_AGENT: &str = "toggl2sheet";

/// Toggl detailed reportの1ページ分のレスポンス。
#[derive(Debug, Deserialize)]
struct DetailedReport {
    total_count: usize,
    #[serde(default)]
    data: Vec<TogglDetailedEntry>,
}

/// Toggl detailed reportのエントリーをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglDetailedEntry {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_billable: bool,
    start: String,
    end: Option<String>,
}

impl TogglDetailedEntry {
    /// `TimeEntry`に変換する。実行中のエントリーは`None`を返す。
    fn into_time_entry(self) -> Result<Option<TimeEntry>> {
        let Some(end) = self.end.as_deref() else {
            debug!("Skip running time entry: {:?}", self.description);
            return Ok(None);
        };
        let start = parse_rfc3339(&self.start)?;
        let end = parse_rfc3339(end)?;
        if end < start {
            return Err(Error::MalformedInput(format!(
                "time entry ends before it starts: {} < {}",
                end, start
            )));
        }

        Ok(Some(TimeEntry {
            user: self.user.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            client: self.client.unwrap_or_default(),
            project: self.project.unwrap_or_default(),
            task: self.task.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            billable: self.is_billable,
            start,
            end,
        }))
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|datetime| datetime.to_utc())
        .map_err(|e| Error::MalformedInput(format!("invalid timestamp {:?}: {}", s, e)))
}

/// Toggl Reports APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new(Client::new(), DEFAULT_API_URL, token, 1397713);
/// let time_entries = client.read_time_entries(from, to).await.unwrap();
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
    workspace_id: u64,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `client` - 共有するHTTPクライアント
    /// * `api_url` - Reports APIのベースURL
    /// * `api_token` - Toggl APIトークン
    /// * `workspace_id` - 対象のワークスペース
    pub fn new(client: Client, api_url: &str, api_token: String, workspace_id: u64) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            workspace_id,
        }
    }

    /// detailed reportの指定ページを取得する。
    async fn read_page(&self, from: NaiveDate, to: NaiveDate, page: usize) -> Result<DetailedReport> {
        let response = self
            .client
            .get(format!("{}/details", self.api_url))
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .query(&[
                ("workspace_id", self.workspace_id.to_string()),
                ("since", from.format("%Y-%m-%d").to_string()),
                ("until", to.format("%Y-%m-%d").to_string()),
                ("page", page.to_string()),
                ("user_agent", USER_AGENT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                Error::SourceUnavailable(format!(
                    "Failed to send request to Toggl API at {}: {}",
                    self.api_url, e
                ))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::AuthFailed(format!("Toggl API returned {}", status)));
        }
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "Toggl API returned {} for page {}",
                status, page
            )));
        }

        response
            .json::<DetailedReport>()
            .await
            .map_err(|e| Error::MalformedInput(format!("Failed to deserialize response: {}", e)))
    }
}

impl TimeEntrySource for TogglClient {
    /// 指定された期間のタイムエントリーを全ページ分取得する。
    ///
    /// 受信件数がサーバーの報告する総件数に達するまでページを進める。
    async fn read_time_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeEntry>> {
        let mut time_entries = Vec::new();
        let mut received = 0;
        let mut page = 1;

        loop {
            let report = self.read_page(from, to, page).await?;
            info!("Reading from Toggl API: {}/{}", received, report.total_count);

            if report.data.is_empty() {
                if received < report.total_count {
                    warn!(
                        "Toggl API returned an empty page {} after {}/{} entries",
                        page, received, report.total_count
                    );
                }
                break;
            }

            received += report.data.len();
            for entry in report.data {
                if let Some(time_entry) = entry.into_time_entry()? {
                    time_entries.push(time_entry);
                }
            }

            if received >= report.total_count {
                break;
            }
            page += 1;
        }
        info!("length of time entries: {}", time_entries.len());

        Ok(time_entries)
    }
}
