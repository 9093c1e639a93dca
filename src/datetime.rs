use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// 指定タイムゾーンでの今日の日付を返す。
pub fn today(tz: &Tz) -> NaiveDate {
    now().with_timezone(tz).date_naive()
}

/// 指定日付が属する月の1日を返す。
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// 日付をパースする。形式は`YYYY-MM-DD`。
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
    use chrono_tz::Europe::Berlin;
    use rstest::rstest;

    use super::{first_day_of_month, mock_datetime, parse_date, today};

    /// 何も設定しない場合は、現在時間が取得できることを確認する。
    ///
    ///  - 現在時刻での比較を行なっているため、ミリ秒単位まで比較するとテストが失敗する可能性があり、秒単位で比較している。
    #[test]
    fn test_now() {
        mock_datetime::clear_mock_time();

        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    /// モック時間を設定した時に、その時間が取得できることを確認する。
    #[test]
    fn test_now_specific_datetime() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );

        assert_eq!(mock_datetime::now().to_rfc3339(), datetime);
        mock_datetime::clear_mock_time();
    }

    /// UTCでは前日でもローカルの日付が返ることを確認する。
    #[test]
    fn test_today_in_timezone() {
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap());

        assert_eq!(today(&Berlin), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        mock_datetime::clear_mock_time();
    }

    #[test]
    fn test_first_day_of_month() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        assert_eq!(first_day_of_month(date), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[rstest]
    #[case::valid("2024-03-04", Some(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()))]
    #[case::invalid_day("2024-02-30", None)]
    #[case::wrong_format("04.03.2024", None)]
    #[case::empty("", None)]
    fn test_parse_date(#[case] input: &str, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_date(input), expected);
    }
}
