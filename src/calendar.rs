use chrono::{Datelike, NaiveDate, Weekday};

/// 休日・週末の注記を返すためのtrait。
///
/// 初期化後は読み取り専用で、リクエスト間で共有される。
pub trait NonWorkingDays: Send + Sync {
    /// 指定日が非稼働日であればその名称を返す。
    fn lookup(&self, date: NaiveDate) -> Option<String>;
}

/// ドイツ全国共通の祝日と週末を扱うカレンダー。
#[derive(Clone, Copy, Debug, Default)]
pub struct GermanCalendar;

impl NonWorkingDays for GermanCalendar {
    fn lookup(&self, date: NaiveDate) -> Option<String> {
        holiday(date)
            .or(match date.weekday() {
                Weekday::Sat => Some("Samstag"),
                Weekday::Sun => Some("Sonntag"),
                _ => None,
            })
            .map(str::to_string)
    }
}

fn holiday(date: NaiveDate) -> Option<&'static str> {
    match (date.month(), date.day()) {
        (1, 1) => return Some("Neujahr"),
        (5, 1) => return Some("Tag der Arbeit"),
        (10, 3) => return Some("Tag der Deutschen Einheit"),
        (12, 25) => return Some("1. Weihnachtstag"),
        (12, 26) => return Some("2. Weihnachtstag"),
        _ => {}
    }

    let easter = easter_sunday(date.year())?;
    match (date - easter).num_days() {
        -2 => Some("Karfreitag"),
        1 => Some("Ostermontag"),
        39 => Some("Christi Himmelfahrt"),
        50 => Some("Pfingstmontag"),
        _ => None,
    }
}

/// 指定年の復活祭の日曜日を返す。(グレゴリオ暦、匿名アルゴリズム)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// 期間内の所定労働時間(Sollarbeitszeit)をミリ秒で返す。
///
/// `start`から`end`まで(両端を含む)の稼働日数に`daily_millis`を掛ける。
pub fn expected_millis<C: NonWorkingDays + ?Sized>(
    calendar: &C,
    start: NaiveDate,
    end: NaiveDate,
    daily_millis: i64,
) -> i64 {
    let working_days = start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| calendar.lookup(*date).is_none())
        .count() as i64;

    working_days * daily_millis
}
