use chrono::NaiveDate;

use crate::config::{Settings, SourceKind};
use crate::csv_export::CsvExport;
use crate::error::Result;
use crate::time_entry::TimeEntry;
use crate::toggl::TogglClient;

/// time entryを取得するためのtrait。
#[cfg_attr(test, mockall::automock)]
#[allow(async_fn_in_trait)]
pub trait TimeEntrySource {
    /// 指定された期間のタイムエントリーを取得する。
    ///
    /// 期間で絞り込むかどうかは実装による。CSVは絞り込まない。
    ///
    /// # Arguments
    ///
    /// * `from` - 期間の初日
    /// * `to` - 期間の最終日
    async fn read_time_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeEntry>>;
}

/// 設定で選択されたデータソース。リクエストごとに作成する。
pub enum EntrySource {
    Csv(CsvExport),
    Toggl(TogglClient),
}

impl EntrySource {
    /// 設定からデータソースを作成する。
    ///
    /// # Arguments
    ///
    /// * `settings` - サーバー設定
    /// * `http` - Toggl APIとの通信に使うクライアント
    pub fn from_settings(settings: &Settings, http: &reqwest::Client) -> Result<Self> {
        match settings.validate()? {
            SourceKind::Csv => {
                let path = settings.csv_file.clone().unwrap_or_default();
                Ok(Self::Csv(CsvExport::new(
                    path,
                    settings.csv_delimiter,
                    settings.timezone,
                )?))
            }
            SourceKind::Api => Ok(Self::Toggl(TogglClient::new(
                http.clone(),
                &settings.api_url,
                settings.api_token.clone().unwrap_or_default(),
                settings.workspace_id,
            ))),
        }
    }
}

impl TimeEntrySource for EntrySource {
    async fn read_time_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeEntry>> {
        match self {
            Self::Csv(export) => export.read_time_entries(from, to).await,
            Self::Toggl(client) => client.read_time_entries(from, to).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EntrySource;
    use crate::config::tests::csv_settings;
    use crate::error::Error;

    #[test]
    fn test_from_settings_csv() {
        let settings = csv_settings("export.csv");

        let source = EntrySource::from_settings(&settings, &reqwest::Client::new()).unwrap();

        assert!(matches!(source, EntrySource::Csv(_)));
    }

    #[test]
    fn test_from_settings_api() {
        let mut settings = csv_settings("export.csv");
        settings.csv_file = None;
        settings.api_token = Some("token".to_string());

        let source = EntrySource::from_settings(&settings, &reqwest::Client::new()).unwrap();

        assert!(matches!(source, EntrySource::Toggl(_)));
    }

    #[test]
    fn test_from_settings_without_source() {
        let mut settings = csv_settings("export.csv");
        settings.csv_file = None;

        let result = EntrySource::from_settings(&settings, &reqwest::Client::new());

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
