use std::fmt::Write;

use chrono_tz::Tz;

use crate::report::{TimeSheet, TimeSheetRow, WeekEffort};

/// タイムシートを表示するためのtrait。
pub trait TimeSheetPresenter {
    /// タイムシートを表示する。
    ///
    /// # Arguments
    ///
    /// * `time_sheet` - 表示するタイムシート
    fn show_time_sheet(&mut self, time_sheet: &TimeSheet) -> std::fmt::Result;
}

/// タイムシートをHTMLのtableとして出力する。
pub struct HtmlPage<'a, W: Write> {
    writer: &'a mut W,
    timezone: Tz,
}

impl<'a, W: Write> HtmlPage<'a, W> {
    /// 新しい`HtmlPage`を返す。時刻は`timezone`で表示する。
    pub fn new(writer: &'a mut W, timezone: Tz) -> Self {
        Self { writer, timezone }
    }

    fn write_heading(&mut self, projects: &[String]) -> std::fmt::Result {
        write!(
            self.writer,
            "<tr><th>Datum</th><th>Beginn</th><th>Ende</th><th>Dauer</th><th>Bezeichnung</th>"
        )?;
        for project in projects {
            write!(self.writer, "<th>{}</th>", escape(project))?;
        }
        writeln!(self.writer, "</tr>")
    }

    fn write_row(&mut self, row: &TimeSheetRow, projects: &[String]) -> std::fmt::Result {
        let time = |datetime: Option<chrono::DateTime<chrono::Utc>>| {
            datetime
                .map(|datetime| datetime.with_timezone(&self.timezone).format("%H:%M").to_string())
                .unwrap_or_default()
        };
        let start = time(row.start);
        let end = time(row.end);
        let label = row
            .label
            .as_deref()
            .or(row.non_working_day.as_deref())
            .unwrap_or_default();

        write!(
            self.writer,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
            row.day.format("%d.%m.%Y"),
            start,
            end,
            format_duration(row.duration),
            escape(label)
        )?;
        for project in projects {
            let duration = row
                .duration_by_project
                .get(project)
                .map(|duration| format_duration(*duration))
                .unwrap_or_default();
            write!(self.writer, "<td>{}</td>", duration)?;
        }
        writeln!(self.writer, "</tr>")
    }
}

impl<'a, W: Write> TimeSheetPresenter for HtmlPage<'a, W> {
    // 表の後に所定時間、実績、予測と週ごとの集計を続ける。
    fn show_time_sheet(&mut self, time_sheet: &TimeSheet) -> std::fmt::Result {
        write!(self.writer, "<html><body><table>")?;
        self.write_heading(&time_sheet.projects)?;
        for row in &time_sheet.rows {
            self.write_row(row, &time_sheet.projects)?;
        }
        writeln!(self.writer, "</table>")?;

        let summary = &time_sheet.summary;
        writeln!(self.writer, "<pre>")?;
        if let Some(expected) = summary.expected {
            writeln!(self.writer, "Sollarbeitszeit: {}", format_duration(expected))?;
        }
        writeln!(self.writer, "Ist-Leistung: {}", format_duration(summary.actual))?;
        writeln!(self.writer, "Prognose: {}", format_duration(summary.forecast))?;
        write!(
            self.writer,
            "{}",
            escape(&format_weeks(&summary.by_week_and_project))
        )?;
        write!(self.writer, "</pre></body></html>")
    }
}

/// 週ごとの集計を`KW`ブロックとして整形する。
pub fn format_weeks(weeks: &[WeekEffort]) -> String {
    weeks
        .iter()
        .map(|week| {
            let projects = week
                .projects
                .iter()
                .map(|(project, duration)| format!("  {}:\t{}", project, format_duration(*duration)))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "KW {}:\n{}\n  Gesamt:\t{}",
                week.week,
                projects,
                format_duration(week.total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// ミリ秒を`H:MM`形式にする。分未満は切り捨てる。
pub fn format_duration(millis: i64) -> String {
    let minutes = millis / 60_000;
    format!("{}:{:02}", minutes / 60, minutes % 60)
}

fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use chrono_tz::Europe::Berlin;
    use rstest::rstest;

    use super::{escape, format_duration, format_weeks, HtmlPage, TimeSheetPresenter};
    use crate::report::{Summary, TimeSheet, TimeSheetRow, WeekEffort};
    use crate::time_entry::tests::local;

    const HOUR: i64 = 3_600_000;

    #[rstest]
    #[case::zero(0, "0:00")]
    #[case::ninety_minutes(90 * 60_000, "1:30")]
    #[case::truncates_seconds(60_000 * 61 + 59_999, "1:01")]
    #[case::unpadded_hours(125 * HOUR, "125:00")]
    fn test_format_duration(#[case] millis: i64, #[case] expected: &str) {
        assert_eq!(format_duration(millis), expected);
    }

    #[test]
    fn test_format_weeks() {
        let weeks = vec![
            WeekEffort {
                year: 2024,
                week: 10,
                projects: BTreeMap::from([("A".to_string(), 2 * HOUR), ("B".to_string(), HOUR)]),
                total: 3 * HOUR,
            },
            WeekEffort {
                year: 2024,
                week: 11,
                projects: BTreeMap::from([("A".to_string(), HOUR / 4)]),
                total: HOUR / 4,
            },
        ];

        assert_eq!(
            format_weeks(&weeks),
            "KW 10:\n  A:\t2:00\n  B:\t1:00\n  Gesamt:\t3:00\nKW 11:\n  A:\t0:15\n  Gesamt:\t0:15"
        );
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("R&D <intern>"), "R&amp;D &lt;intern&gt;");
    }

    fn sheet(expected: Option<i64>) -> TimeSheet {
        let day = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let row = TimeSheetRow {
            day,
            start: Some(local((2024, 3, 8), (9, 0))),
            end: Some(local((2024, 3, 8), (10, 30))),
            duration: 90 * 60_000,
            duration_by_project: BTreeMap::from([("A".to_string(), 90 * 60_000)]),
            label: Some("A".to_string()),
            non_working_day: None,
        };
        let saturday = TimeSheetRow::empty(day.succ_opt().unwrap(), Some("Samstag".to_string()));

        TimeSheet {
            rows: vec![row, saturday],
            projects: vec!["A".to_string(), "B".to_string()],
            summary: Summary {
                expected,
                actual: 90 * 60_000,
                forecast: 90 * 60_000,
                by_week_and_project: vec![WeekEffort {
                    year: 2024,
                    week: 10,
                    projects: BTreeMap::from([("A".to_string(), 90 * 60_000)]),
                    total: 90 * 60_000,
                }],
                by_day_and_description: vec![],
            },
        }
    }

    #[test]
    fn test_show_time_sheet() {
        let mut writer = String::new();
        let mut presenter = HtmlPage::new(&mut writer, Berlin);

        presenter.show_time_sheet(&sheet(Some(16 * HOUR))).unwrap();

        assert!(writer.starts_with("<html><body><table>"));
        assert!(writer.contains("<th>Bezeichnung</th><th>A</th><th>B</th></tr>"));
        assert!(writer.contains(
            "<tr><td>08.03.2024</td><td>09:00</td><td>10:30</td><td>1:30</td><td>A</td><td>1:30</td><td></td></tr>"
        ));
        assert!(writer.contains(
            "<tr><td>09.03.2024</td><td></td><td></td><td>0:00</td><td>Samstag</td><td></td><td></td></tr>"
        ));
        assert!(writer.contains("Sollarbeitszeit: 16:00\n"));
        assert!(writer.contains("Ist-Leistung: 1:30\n"));
        assert!(writer.contains("Prognose: 1:30\n"));
        assert!(writer.contains("KW 10:\n  A:\t1:30\n  Gesamt:\t1:30"));
        assert!(writer.ends_with("</pre></body></html>"));
    }

    #[test]
    fn test_show_time_sheet_without_expected() {
        let mut writer = String::new();
        let mut presenter = HtmlPage::new(&mut writer, Berlin);

        presenter.show_time_sheet(&sheet(None)).unwrap();

        assert!(!writer.contains("Sollarbeitszeit"));
        assert!(writer.contains("Ist-Leistung: 1:30"));
    }
}
