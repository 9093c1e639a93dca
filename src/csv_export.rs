use std::{io::Read, path::PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord};
use log::info;

use crate::error::{Error, Result};
use crate::source::TimeEntrySource;
use crate::time_entry::TimeEntry;

/// CSVの列数。
const COLUMNS: usize = 11;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// TogglのCSVエクスポートを読み込む。
///
/// 列は`user, email, client, project, task, description, billable,
/// start_date, start_time, end_date, end_time`の順で、先頭の1行はヘッダーとして読み飛ばす。
#[derive(Debug, Clone)]
pub struct CsvExport {
    path: PathBuf,
    delimiter: u8,
    timezone: Tz,
}

impl CsvExport {
    /// 新しい`CsvExport`を返す。
    ///
    /// 区切り文字がASCIIでない場合はエラーを返す。
    pub fn new(path: PathBuf, delimiter: char, timezone: Tz) -> Result<Self> {
        let delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| Error::Config(format!("CSV delimiter must be ASCII: {:?}", delimiter)))?;

        Ok(Self {
            path,
            delimiter,
            timezone,
        })
    }

    /// CSVをパースしてタイムエントリーを返す。
    pub fn parse<R: Read>(&self, reader: R) -> Result<Vec<TimeEntry>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(reader);

        csv_reader
            .records()
            .map(|record| {
                let record =
                    record.map_err(|e| Error::MalformedInput(format!("Failed to read CSV: {}", e)))?;
                self.parse_record(&record)
            })
            .collect()
    }

    fn parse_record(&self, record: &StringRecord) -> Result<TimeEntry> {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() != COLUMNS {
            return Err(Error::MalformedInput(format!(
                "line {}: expected {} columns, got {}",
                line,
                COLUMNS,
                record.len()
            )));
        }

        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        let start = self.parse_datetime(&record[7], &record[8], line)?;
        let end = self.parse_datetime(&record[9], &record[10], line)?;
        if end < start {
            return Err(Error::MalformedInput(format!(
                "line {}: end {} is before start {}",
                line, end, start
            )));
        }

        Ok(TimeEntry {
            user: field(0),
            email: field(1),
            client: field(2),
            project: field(3),
            task: field(4),
            description: field(5),
            billable: &record[6] == "Yes",
            start,
            end,
        })
    }

    /// 日付と時刻の列を設定されたタイムゾーンの時刻としてパースする。
    fn parse_datetime(&self, date: &str, time: &str, line: u64) -> Result<DateTime<Utc>> {
        let text = format!("{} {}", date, time);
        let naive = NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).map_err(|e| {
            Error::MalformedInput(format!("line {}: invalid timestamp {:?}: {}", line, text, e))
        })?;

        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|datetime| datetime.to_utc())
            .ok_or_else(|| {
                Error::MalformedInput(format!(
                    "line {}: {:?} does not exist in {}",
                    line, text, self.timezone
                ))
            })
    }
}

impl TimeEntrySource for CsvExport {
    async fn read_time_entries(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<TimeEntry>> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::SourceUnavailable(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let entries = self.parse(content.as_slice())?;
        info!(
            "Read {} time entries from {}",
            entries.len(),
            self.path.display()
        );

        Ok(entries)
    }
}
