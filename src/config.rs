use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::Parser;
use log::LevelFilter;
use serde::Deserialize;

use crate::datetime;
use crate::error::{Error, Result};

/// Toggl Reports API v2のURL。
pub const DEFAULT_API_URL: &str = "https://api.track.toggl.com/reports/api/v2";

/// Toggl time entryからタイムシートを生成するHTTPサーバー。
///
/// # Examples
/// ```
/// $ cargo run -- --csv-file export.csv
/// $ TOGGL_API_TOKEN=xxx cargo run -- --workspace-id 1397713
/// ```
#[derive(Clone, Debug, Parser)]
#[clap(version, about)]
pub struct Settings {
    #[clap(long, default_value = "127.0.0.1:8080", help = "Address to listen on")]
    pub bind: SocketAddr,

    #[clap(
        long,
        env = "TOGGL_API_TOKEN",
        hide_env_values = true,
        help = "Toggl API token, reads entries from the detailed report API"
    )]
    pub api_token: Option<String>,

    #[clap(long, default_value = DEFAULT_API_URL, help = "Base URL of the Toggl reports API")]
    pub api_url: String,

    #[clap(long, default_value = "1397713", help = "Toggl workspace id")]
    pub workspace_id: u64,

    #[clap(long, help = "Toggl CSV export to read entries from")]
    pub csv_file: Option<PathBuf>,

    #[clap(long, default_value = ",", help = "Delimiter of the CSV export")]
    pub csv_delimiter: char,

    #[clap(long, default_value = "900000", help = "Time grid in milliseconds")]
    pub time_step: i64,

    #[clap(
        long,
        default_value = "Europe/Berlin",
        help = "Time zone used for calendar days",
        parse(try_from_str = parse_timezone),
    )]
    pub timezone: Tz,

    #[clap(long, help = "Only keep entries of this client")]
    pub client: Option<String>,

    #[clap(long = "project", help = "Only keep entries of these projects")]
    pub projects: Vec<String>,

    #[clap(long, default_value = "8", help = "Expected working hours per working day")]
    pub daily_hours: f64,

    #[clap(
        long,
        default_value = "info",
        help = "Log level",
        parse(try_from_str = parse_level),
    )]
    pub log_level: LevelFilter,
}

/// タイムゾーン名をパースする。
fn parse_timezone(s: &str) -> anyhow::Result<Tz> {
    Tz::from_str(s)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to parse time zone: {}", s))
}

/// ログレベルをパースする。
fn parse_level(s: &str) -> anyhow::Result<LevelFilter> {
    LevelFilter::from_str(s)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to parse log level: {}", s))
}

/// データソースの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Api,
}

impl Settings {
    /// 設定を検証し、利用するデータソースを返す。
    ///
    /// API tokenとCSVファイルのどちらか一方だけが設定されている必要がある。
    pub fn validate(&self) -> Result<SourceKind> {
        if self.time_step <= 0 {
            return Err(Error::Config(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }

        match (&self.api_token, &self.csv_file) {
            (Some(_), None) => Ok(SourceKind::Api),
            (None, Some(_)) => Ok(SourceKind::Csv),
            (None, None) => Err(Error::Config(
                "either an API token or a CSV file must be configured".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::Config(
                "only one of API token and CSV file may be configured".to_string(),
            )),
        }
    }

    /// 1稼働日あたりの所定労働時間をミリ秒で返す。
    pub fn daily_millis(&self) -> i64 {
        (self.daily_hours * 3_600_000.0).round() as i64
    }
}

/// 1日のエントリーを行に分ける際のキー。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grouping {
    #[default]
    None,
    Project,
    Customer,
    Title,
    Single,
}

impl FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NONE" => Ok(Grouping::None),
            "PROJECT" => Ok(Grouping::Project),
            "CUSTOMER" => Ok(Grouping::Customer),
            "TITLE" => Ok(Grouping::Title),
            "SINGLE" => Ok(Grouping::Single),
            _ => Err(Error::BadRequest(format!("unknown grouping: {}", s))),
        }
    }
}

/// `/current`と`/timesheet`のクエリパラメーター。
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub grouping: Option<String>,
}

/// 1リクエスト分の検証済みの設定。
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// リクエストで指定された開始日。
    pub start_date: Option<NaiveDate>,
    /// リクエストで指定された終了日。
    pub end_date: Option<NaiveDate>,
    /// 集計対象の初日。未指定の場合は当月の1日。
    pub from: NaiveDate,
    /// 集計対象の最終日。未指定の場合は今日。
    pub to: NaiveDate,
    pub grouping: Grouping,
    pub client: Option<String>,
    pub projects: Vec<String>,
    pub time_step: i64,
    pub timezone: Tz,
    pub daily_millis: i64,
}

impl ReportConfig {
    /// クエリパラメーターとサーバー設定から`ReportConfig`を作成する。
    pub fn new(query: &ReportQuery, settings: &Settings) -> Result<Self> {
        let start_date = query.start.as_deref().map(parse_query_date).transpose()?;
        let end_date = query.end.as_deref().map(parse_query_date).transpose()?;
        let grouping = query
            .grouping
            .as_deref()
            .map(Grouping::from_str)
            .transpose()?
            .unwrap_or_default();

        settings.validate()?;

        let today = datetime::today(&settings.timezone);
        let from = start_date.unwrap_or_else(|| datetime::first_day_of_month(today));
        let to = end_date.unwrap_or(today);
        if to < from {
            return Err(Error::Config(format!(
                "end date {} is before start date {}",
                to, from
            )));
        }

        Ok(Self {
            start_date,
            end_date,
            from,
            to,
            grouping,
            client: settings.client.clone(),
            projects: settings.projects.clone(),
            time_step: settings.time_step,
            timezone: settings.timezone,
            daily_millis: settings.daily_millis(),
        })
    }
}

fn parse_query_date(s: &str) -> Result<NaiveDate> {
    datetime::parse_date(s).ok_or_else(|| Error::BadRequest(format!("invalid date: {}", s)))
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use clap::Parser;
    use rstest::rstest;

    use super::{Grouping, ReportConfig, ReportQuery, Settings, SourceKind};
    use crate::datetime::mock_datetime;
    use crate::error::Error;

    pub(crate) fn csv_settings(path: &str) -> Settings {
        let mut settings = Settings::parse_from(["toggl2sheet", "--csv-file", path]);
        // TOGGL_API_TOKENが環境に設定されていても影響を受けないようにする
        settings.api_token = None;
        settings
    }

    fn query(start: Option<&str>, end: Option<&str>, grouping: Option<&str>) -> ReportQuery {
        ReportQuery {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            grouping: grouping.map(str::to_string),
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = csv_settings("export.csv");

        assert_eq!(settings.time_step, 900_000);
        assert_eq!(settings.workspace_id, 1397713);
        assert_eq!(settings.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(settings.daily_millis(), 8 * 3_600_000);
        assert_eq!(settings.validate().unwrap(), SourceKind::Csv);
    }

    #[test]
    fn test_settings_requires_one_source() {
        let mut settings = csv_settings("export.csv");
        settings.csv_file = None;
        settings.api_token = None;
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.api_token = Some("token".to_string());
        assert_eq!(settings.validate().unwrap(), SourceKind::Api);

        settings.csv_file = Some("export.csv".into());
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_settings_rejects_zero_step() {
        let mut settings = csv_settings("export.csv");
        settings.time_step = 0;

        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[rstest]
    #[case("NONE", Grouping::None)]
    #[case("PROJECT", Grouping::Project)]
    #[case("CUSTOMER", Grouping::Customer)]
    #[case("TITLE", Grouping::Title)]
    #[case("SINGLE", Grouping::Single)]
    fn test_grouping_from_str(#[case] input: &str, #[case] expected: Grouping) {
        assert_eq!(input.parse::<Grouping>().unwrap(), expected);
    }

    #[rstest]
    #[case::lowercase("project")]
    #[case::unknown("WEEK")]
    fn test_grouping_from_str_invalid(#[case] input: &str) {
        assert!(matches!(input.parse::<Grouping>(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_report_config_with_dates() {
        let settings = csv_settings("export.csv");

        let config = ReportConfig::new(
            &query(Some("2024-03-04"), Some("2024-03-06"), Some("PROJECT")),
            &settings,
        )
        .unwrap();

        assert_eq!(config.from, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(config.to, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert_eq!(config.start_date, Some(config.from));
        assert_eq!(config.grouping, Grouping::Project);
    }

    #[test]
    fn test_report_config_defaults_to_current_month() {
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap());
        let settings = csv_settings("export.csv");

        let config = ReportConfig::new(&query(None, None, None), &settings).unwrap();
        mock_datetime::clear_mock_time();

        assert_eq!(config.start_date, None);
        assert_eq!(config.from, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(config.to, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        assert_eq!(config.grouping, Grouping::None);
    }

    #[rstest]
    #[case::bad_start(query(Some("2024-13-01"), None, None))]
    #[case::bad_end(query(None, Some("yesterday"), None))]
    #[case::bad_grouping(query(None, None, Some("weekly")))]
    fn test_report_config_bad_request(#[case] input: ReportQuery) {
        let settings = csv_settings("export.csv");

        assert!(matches!(
            ReportConfig::new(&input, &settings),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_report_config_end_before_start() {
        let settings = csv_settings("export.csv");

        let result = ReportConfig::new(&query(Some("2024-03-06"), Some("2024-03-04"), None), &settings);

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
