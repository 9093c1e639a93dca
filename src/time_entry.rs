use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// 1件の作業記録。
///
/// CSVまたはToggl APIから生成され、以後は変更しない。
/// `trim`は新しい値を返す。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeEntry {
    pub user: String,
    pub email: String,
    pub client: String,
    pub project: String,
    pub task: String,
    pub description: String,
    pub billable: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeEntry {
    /// 作業時間をミリ秒で返す。
    pub fn duration(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    /// 開始時刻の指定タイムゾーンでの日付を返す。
    pub fn day(&self, tz: &Tz) -> NaiveDate {
        self.start.with_timezone(tz).date_naive()
    }

    /// 開始・終了時刻を`step`ミリ秒の格子に丸めたエントリーを返す。
    ///
    /// ちょうど半分の場合は切り上げる。
    pub fn trim(&self, step: i64) -> Self {
        Self {
            start: trim_datetime(self.start, step),
            end: trim_datetime(self.end, step),
            ..self.clone()
        }
    }
}

fn trim_datetime(datetime: DateTime<Utc>, step: i64) -> DateTime<Utc> {
    if step <= 0 {
        return datetime;
    }
    let millis = datetime.timestamp_millis();
    let rest = millis.rem_euclid(step);
    let trimmed = if rest < step - rest {
        Some(millis - rest)
    } else {
        (millis - rest).checked_add(step)
    };

    trimmed
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(datetime)
}
