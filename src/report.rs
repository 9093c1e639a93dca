use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use log::info;
use serde::Serialize;

use crate::calendar::{expected_millis, NonWorkingDays};
use crate::config::{Grouping, ReportConfig};
use crate::error::Result;
use crate::source::TimeEntrySource;
use crate::time_entry::TimeEntry;

/// タイムシートの1行。
///
/// 同じ日・同じキーのエントリーをまとめた行か、エントリーのない日の空行のどちらか。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSheetRow {
    pub day: NaiveDate,
    /// 最も早い開始時刻。空行では`None`。
    pub start: Option<DateTime<Utc>>,
    /// 最も遅い終了時刻。空行では`None`。
    pub end: Option<DateTime<Utc>>,
    /// 作業時間の合計(ミリ秒)。
    pub duration: i64,
    pub duration_by_project: BTreeMap<String, i64>,
    pub label: Option<String>,
    /// 祝日・週末の名称。空行にのみ付く。
    pub non_working_day: Option<String>,
}

impl TimeSheetRow {
    /// エントリーのない日の空行を返す。
    pub fn empty(day: NaiveDate, non_working_day: Option<String>) -> Self {
        Self {
            day,
            start: None,
            end: None,
            duration: 0,
            duration_by_project: BTreeMap::new(),
            label: None,
            non_working_day,
        }
    }

    fn add(&mut self, entry: &TimeEntry) {
        self.start = Some(self.start.map_or(entry.start, |start| start.min(entry.start)));
        self.end = Some(self.end.map_or(entry.end, |end| end.max(entry.end)));
        self.duration += entry.duration();
        *self
            .duration_by_project
            .entry(entry.project.clone())
            .or_insert(0) += entry.duration();
    }
}

/// ISO週ごと、プロジェクトごとの作業時間。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekEffort {
    pub year: i32,
    pub week: u32,
    pub projects: BTreeMap<String, i64>,
    pub total: i64,
}

/// 日ごと、作業内容ごとの作業時間。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEffort {
    pub day: NaiveDate,
    pub descriptions: BTreeMap<String, i64>,
}

/// 集計結果。時間はすべてミリ秒。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// 所定労働時間。開始日と終了日の両方が指定された場合のみ。
    pub expected: Option<i64>,
    /// 絞り込み後の全エントリーの合計。
    pub actual: i64,
    /// タイムシートの全行の合計。
    pub forecast: i64,
    pub by_week_and_project: Vec<WeekEffort>,
    pub by_day_and_description: Vec<DayEffort>,
}

/// 1リクエスト分のタイムシート。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimeSheet {
    pub rows: Vec<TimeSheetRow>,
    pub projects: Vec<String>,
    pub summary: Summary,
}

/// データソースからエントリーを取得し、タイムシートを作成する。
///
/// # Arguments
///
/// * `source` - タイムエントリーの取得元
/// * `config` - リクエストの設定
/// * `calendar` - 空行に付ける祝日・週末の名称を返すカレンダー
pub async fn create_time_sheet<S, C>(
    source: &S,
    config: &ReportConfig,
    calendar: &C,
) -> Result<TimeSheet>
where
    S: TimeEntrySource,
    C: NonWorkingDays + ?Sized,
{
    info!("Start at: {}, End at: {}", config.from, config.to);
    let time_entries = source.read_time_entries(config.from, config.to).await?;
    let time_entries = time_entries
        .iter()
        .map(|entry| entry.trim(config.time_step))
        .collect::<Vec<_>>();
    info!("Time entries retrieved successfully: {}", time_entries.len());

    Ok(build_time_sheet(time_entries, config, calendar))
}

/// 丸め済みのエントリーからタイムシートを作成する。
pub fn build_time_sheet<C: NonWorkingDays + ?Sized>(
    time_entries: Vec<TimeEntry>,
    config: &ReportConfig,
    calendar: &C,
) -> TimeSheet {
    let projects = if config.projects.is_empty() {
        project_names(&time_entries)
    } else {
        config.projects.clone()
    };

    let time_entries = filter_entries(time_entries, config.client.as_deref(), &config.projects);
    let tz = &config.timezone;

    let rows = group_rows(&time_entries, config.grouping, tz);
    let rows = fill_missing_days(rows, config.from, config.to, calendar);

    let expected = match (config.start_date, config.end_date) {
        (Some(start), Some(end)) => Some(expected_millis(calendar, start, end, config.daily_millis)),
        _ => None,
    };
    let summary = Summary {
        expected,
        actual: time_entries.iter().map(TimeEntry::duration).sum(),
        forecast: rows.iter().map(|row| row.duration).sum(),
        by_week_and_project: effort_by_week_and_project(&time_entries, tz),
        by_day_and_description: effort_by_day_and_description(&time_entries, tz),
    };

    TimeSheet {
        rows,
        projects,
        summary,
    }
}

/// 取得した順にプロジェクト名を重複なく返す。
pub fn project_names(time_entries: &[TimeEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    time_entries
        .iter()
        .filter(|entry| seen.insert(entry.project.as_str()))
        .map(|entry| entry.project.clone())
        .collect()
}

/// クライアントとプロジェクトで絞り込む。
///
/// 期間での絞り込みは行わない。
pub fn filter_entries(
    time_entries: Vec<TimeEntry>,
    client: Option<&str>,
    projects: &[String],
) -> Vec<TimeEntry> {
    time_entries
        .into_iter()
        .filter(|entry| client.map_or(true, |client| entry.client == client))
        .filter(|entry| projects.is_empty() || projects.contains(&entry.project))
        .collect()
}

/// エントリーを日とgroupingのキーでまとめ、開始時刻順の行にする。
///
/// 開始時刻が同じ行はラベル順、さらに同じなら最初に現れた順に並ぶ。
pub fn group_rows(time_entries: &[TimeEntry], grouping: Grouping, tz: &Tz) -> Vec<TimeSheetRow> {
    let mut rows: Vec<TimeSheetRow> = Vec::new();
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::new();

    for (i, entry) in time_entries.iter().enumerate() {
        let day = entry.day(tz);
        let (key, label) = match grouping {
            Grouping::None => (String::new(), None),
            Grouping::Project => (entry.project.clone(), Some(entry.project.clone())),
            Grouping::Customer => (entry.client.clone(), Some(entry.client.clone())),
            Grouping::Title => (entry.description.clone(), Some(entry.description.clone())),
            Grouping::Single => (i.to_string(), Some(entry.description.clone())),
        };

        let position = *index.entry((day, key)).or_insert_with(|| {
            let mut row = TimeSheetRow::empty(day, None);
            row.label = label;
            rows.push(row);
            rows.len() - 1
        });
        rows[position].add(entry);
    }

    rows.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.label.cmp(&b.label)));
    rows
}

/// `from`から`to`までの各日について行を並べ、エントリーのない日には空行を入れる。
///
/// 期間外の日の行は含めない。
pub fn fill_missing_days<C: NonWorkingDays + ?Sized>(
    rows: Vec<TimeSheetRow>,
    from: NaiveDate,
    to: NaiveDate,
    calendar: &C,
) -> Vec<TimeSheetRow> {
    let mut rows_by_day: BTreeMap<NaiveDate, Vec<TimeSheetRow>> = BTreeMap::new();
    for row in rows {
        rows_by_day.entry(row.day).or_default().push(row);
    }

    let mut result = Vec::new();
    for date in from.iter_days().take_while(|date| *date <= to) {
        match rows_by_day.remove(&date) {
            Some(rows) => result.extend(rows),
            None => result.push(TimeSheetRow::empty(date, calendar.lookup(date))),
        }
    }

    result
}

/// ISO週ごと、プロジェクトごとに作業時間を集計する。週の昇順で返す。
pub fn effort_by_week_and_project(time_entries: &[TimeEntry], tz: &Tz) -> Vec<WeekEffort> {
    let by_week_and_project: BTreeMap<(i32, u32), BTreeMap<String, i64>> =
        time_entries
            .iter()
            .fold(BTreeMap::new(), |mut accumulate, entry| {
                let week = entry.start.with_timezone(tz).iso_week();
                *accumulate
                    .entry((week.year(), week.week()))
                    .or_default()
                    .entry(entry.project.clone())
                    .or_insert(0) += entry.duration();
                accumulate
            });

    by_week_and_project
        .into_iter()
        .map(|((year, week), projects)| WeekEffort {
            year,
            week,
            total: projects.values().sum(),
            projects,
        })
        .collect()
}

/// 日ごと、作業内容ごとに作業時間を集計する。日付の昇順で返す。
pub fn effort_by_day_and_description(time_entries: &[TimeEntry], tz: &Tz) -> Vec<DayEffort> {
    let by_day: BTreeMap<NaiveDate, BTreeMap<String, i64>> =
        time_entries
            .iter()
            .fold(BTreeMap::new(), |mut accumulate, entry| {
                *accumulate
                    .entry(entry.day(tz))
                    .or_default()
                    .entry(entry.description.clone())
                    .or_insert(0) += entry.duration();
                accumulate
            });

    by_day
        .into_iter()
        .map(|(day, descriptions)| DayEffort { day, descriptions })
        .collect()
}
