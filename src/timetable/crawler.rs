//! Fetch one entity's weekly grid and parse it into a [`Timetable`] (§4.3).

use super::{Counterpart, CourseInfo, PeriodClock, Timetable};
use crate::error::{Error, ValidationError};
use crate::http;
use crate::index::{Index, TargetInfo};
use crate::index::crawler::parse_loose_timestamp;
use chrono::NaiveTime;
use html_scraper::{ElementRef, Html, Selector};
use regex::Regex;
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static LAST_UPDATE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.MsoNormal[align=center] span").unwrap());
static TIME_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{2})(\d{2})").unwrap());

const LUNCH_MARKER: &str = "午休";

fn default_aliases() -> Vec<HashSet<String>> {
    vec![HashSet::from(["朱蒙".to_owned(), "吳銘".to_owned()])]
}

pub struct TimetableCrawler {
    client: ClientWithMiddleware,
    aliases: Vec<HashSet<String>>,
}

impl TimetableCrawler {
    pub fn new(client: ClientWithMiddleware) -> Self {
        TimetableCrawler {
            client,
            aliases: default_aliases(),
        }
    }

    pub fn with_aliases(client: ClientWithMiddleware, aliases: Vec<HashSet<String>>) -> Self {
        TimetableCrawler { client, aliases }
    }

    /// Resolve a display name to its [`TargetInfo`], falling back to a
    /// configured alias when the index has no direct entry (§3 supplement).
    pub fn resolve<'a>(&self, target: &str, index: &'a Index) -> Option<&'a TargetInfo> {
        if let Some(info) = index.target_to_unique_info.get(target) {
            return Some(info);
        }
        for alias_set in &self.aliases {
            if !alias_set.contains(target) {
                continue;
            }
            for alias in alias_set.iter().filter(|a| a.as_str() != target) {
                if let Some(info) = index.target_to_unique_info.get(alias) {
                    return Some(info);
                }
            }
        }
        None
    }

    pub async fn fetch(&self, info: &TargetInfo, base_url: &str) -> Result<Timetable, Error> {
        let url = format!("{base_url}{}", info.url);
        let response = http::get(&self.client, &url).await?;
        let html = http::decode_body(response).await?;
        Ok(parse_timetable(&html, info, &url)?)
    }
}

fn parse_timetable(html: &str, info: &TargetInfo, url: &str) -> Result<Timetable, ValidationError> {
    let document = Html::parse_document(html);
    let last_update = document
        .select(&LAST_UPDATE_SEL)
        .nth(1)
        .and_then(|span| parse_loose_timestamp(span.text().collect::<String>().trim()))
        .unwrap_or_else(|| {
            warn!(%url, "no update date found in timetable page");
            chrono::Utc::now()
        });

    let rows = select_main_rows(&document).ok_or(ValidationError::NoTimetableMatched)?;

    let mut periods = PeriodClock::new();
    let mut lunch_break_periods: Option<PeriodClock> = None;
    let mut table: Vec<Vec<Option<CourseInfo>>> = vec![Vec::new(); 5];
    let mut lunch_break: Option<Vec<Option<CourseInfo>>> = None;

    for row in &rows {
        let Some((name, times)) = parse_period_row(&row[0], &row[1]) else {
            continue;
        };
        let cells: Vec<Option<CourseInfo>> = row[2..7].iter().map(|td| parse_cell(*td)).collect();

        if name.contains(LUNCH_MARKER) {
            let mut clock = PeriodClock::new();
            clock.insert(name, times);
            lunch_break_periods = Some(clock);
            lunch_break = Some(cells);
            continue;
        }

        periods.insert(name, times);
        for (weekday, cell) in cells.into_iter().enumerate() {
            table[weekday].push(cell);
        }
    }

    let timetable = Timetable {
        target: info.target.clone(),
        category: Some(info.category.clone()).filter(|c| !c.is_empty()),
        target_url: info.url.clone(),
        role: info.role,
        id: info.id.clone(),
        last_update,
        cache_fetch_at: None,
        table,
        periods,
        lunch_break,
        lunch_break_periods,
    };
    timetable.validate()?;
    Ok(timetable)
}

/// Keep only rows whose `<td>` count is 7 once border-styled filler cells
/// are excluded; use the first `<table>` that yields any such row (§4.3).
fn select_main_rows(document: &Html) -> Option<Vec<Vec<ElementRef<'_>>>> {
    for table in document.select(&TABLE_SEL) {
        let mut rows = Vec::new();
        for tr in table.select(&TR_SEL) {
            let tds: Vec<_> = tr
                .select(&TD_SEL)
                .filter(|td| !is_border_filler(td))
                .collect();
            if tds.len() == 7 {
                rows.push(tds);
            }
        }
        if !rows.is_empty() {
            return Some(rows);
        }
    }
    None
}

fn is_border_filler(td: &ElementRef) -> bool {
    td.value()
        .attr("style")
        .is_some_and(|style| style.contains("border"))
}

fn parse_period_row(name_cell: &ElementRef, time_cell: &ElementRef) -> Option<(String, (NaiveTime, NaiveTime))> {
    let name = strip_newlines(&name_cell.text().collect::<String>());
    let time_text = strip_newlines(&time_cell.text().collect::<String>());

    let times: Vec<String> = time_text
        .split('｜')
        .map(|t| TIME_DIGITS.replace_all(&t.replace(' ', ""), "$1:$2").into_owned())
        .collect();

    if times.len() != 2 {
        return None;
    }
    let start = NaiveTime::parse_from_str(&times[0], "%H:%M").ok()?;
    let end = NaiveTime::parse_from_str(&times[1], "%H:%M").ok()?;
    Some((name, (start, end)))
}

fn strip_newlines(text: &str) -> String {
    text.replace('\n', "").replace('\r', "")
}

/// A cell is free (`None`) iff it has no `<p>` children, or every `<p>` is
/// blank with no participant links (§4.3).
fn parse_cell(td: ElementRef) -> Option<CourseInfo> {
    let paragraphs: Vec<_> = td.select(&P_SEL).collect();
    if paragraphs.is_empty() {
        return None;
    }

    let mut counterpart = Vec::new();
    let mut subject_parts = Vec::new();
    for p in &paragraphs {
        let links: Vec<_> = p.select(&A_SEL).collect();
        if links.is_empty() {
            let text = clean_text(&p.text().collect::<String>());
            if !text.is_empty() {
                subject_parts.push(text);
            }
            continue;
        }
        for link in links {
            let name = clean_text(&link.text().collect::<String>());
            let href = link.value().attr("href").unwrap_or_default().to_owned();
            counterpart.push(Counterpart { participant: name, url: href });
        }
    }

    let subject = subject_parts.join("");
    if subject.trim().is_empty() && counterpart.is_empty() {
        return None;
    }
    Some(CourseInfo { subject, counterpart })
}

fn clean_text(text: &str) -> String {
    text.trim_matches(|c| c == '\n' || c == '\r' || c == ' ').replace(' ', ", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Role;

    fn info() -> TargetInfo {
        TargetInfo {
            target: "王大明".to_owned(),
            category: "國文科".to_owned(),
            url: "TA01.html".to_owned(),
            role: Role::Teacher,
            id: "TA01".to_owned(),
            id_prefix: "TA".to_owned(),
            id_suffix: "01".to_owned(),
        }
    }

    fn sample_html() -> String {
        let mut rows = String::new();
        for period in 1..=8 {
            let cells: String = (0..5)
                .map(|wd| {
                    if period == 1 && wd == 0 {
                        r#"<td><p>數學</p><p><a href="C101307.html">307</a></p></td>"#.to_owned()
                    } else {
                        "<td></td>".to_owned()
                    }
                })
                .collect();
            rows.push_str(&format!(
                r#"<tr><td>第{period}節</td><td>{:02}00｜{:02}50</td>{cells}</tr>"#,
                7 + period,
                7 + period
            ));
        }
        format!(
            r#"<html><body>
            <p class="MsoNormal" align="center"><span>更新於</span><span>2025/03/14 12:00</span></p>
            <table>{rows}</table>
            </body></html>"#
        )
    }

    #[test]
    fn parses_grid_into_transposed_matrix() {
        let html = sample_html();
        let timetable = parse_timetable(&html, &info(), "http://x/TA01.html").unwrap();
        assert_eq!(timetable.table.len(), 5);
        assert_eq!(timetable.table[0].len(), 8);
        assert!(timetable.table[0][0].is_some());
        assert!(timetable.table[1][0].is_none());
        assert_eq!(timetable.periods.len(), 8);
    }

    #[test]
    fn missing_table_is_validation_error() {
        let html = "<html><body>no table here</body></html>";
        let err = parse_timetable(html, &info(), "http://x/TA01.html").unwrap_err();
        assert!(matches!(err, ValidationError::NoTimetableMatched));
    }

    #[test]
    fn clean_text_trims_and_joins_internal_spaces() {
        assert_eq!(clean_text("\n  數學 A \r"), "數學, A");
    }

    #[test]
    fn alias_resolution_falls_back_to_known_alternate_name() {
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        let crawler = TimetableCrawler::new(client);

        let mut teacher = crate::index::CategoryMap::new();
        let mut category = std::collections::HashMap::new();
        let mut resolved = info();
        resolved.target = "吳銘".to_owned();
        category.insert(resolved.id.clone(), resolved);
        teacher.insert("國文科".to_owned(), category);
        let index = Index::build(teacher, crate::index::CategoryMap::new(), chrono::Utc::now(), "http://x/".to_owned());

        let found = crawler.resolve("朱蒙", &index);
        assert!(found.is_some());
        assert_eq!(found.unwrap().target, "吳銘");
    }
}
