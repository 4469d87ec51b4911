//! Fetch + parse the two upstream directory pages into category maps (§4.2).

use super::{CategoryMap, Index, TargetInfo};
use crate::error::FetchError;
use crate::http;
use chrono::{DateTime, Utc};
use html_scraper::{Html, Selector};
use reqwest_middleware::ClientWithMiddleware;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static SPAN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static LAST_UPDATE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.MsoNormal[align=center] span").unwrap());

pub struct IndexCrawler {
    client: ClientWithMiddleware,
    base_url: String,
}

impl IndexCrawler {
    pub fn new(client: ClientWithMiddleware, base_url: String) -> Self {
        IndexCrawler { client, base_url }
    }

    /// Fetch the root page plus both directory pages, re-fetching a
    /// directory at the root-specified URL when it differs from the
    /// default or the speculative fetch failed (§4.2).
    pub async fn fetch(&self) -> Result<Index, FetchError> {
        let root_url = format!("{}course.html", self.base_url);
        let default_teacher_url = format!("{}_TeachIndex.html", self.base_url);
        let default_class_url = format!("{}_ClassIndex.html", self.base_url);

        let (root_res, teacher_res, class_res) = tokio::join!(
            http::get(&self.client, &root_url),
            http::get(&self.client, &default_teacher_url),
            http::get(&self.client, &default_class_url),
        );

        let root_html = match root_res {
            Ok(r) => Some(http::decode_body(r).await?),
            Err(e) => {
                warn!(error = %e, "root index page fetch failed; falling back to default directory URLs");
                None
            }
        };

        let (root_teacher_url, root_class_url, last_update) = match &root_html {
            Some(html) => parse_root(html, &self.base_url),
            None => (default_teacher_url.clone(), default_class_url.clone(), Utc::now()),
        };

        let teacher_html = self
            .resolve_directory(teacher_res, &default_teacher_url, &root_teacher_url)
            .await?;
        let class_html = self
            .resolve_directory(class_res, &default_class_url, &root_class_url)
            .await?;

        let teacher_map = parse_directory(&teacher_html);
        let class_map = parse_directory(&class_html);

        info!(
            teacher_categories = teacher_map.len(),
            class_categories = class_map.len(),
            "index fetched and parsed"
        );

        Ok(Index::build(teacher_map, class_map, last_update, self.base_url.clone()))
    }

    /// Use the speculative fetch if it succeeded and the root didn't point
    /// elsewhere; otherwise re-fetch at the root-specified URL.
    async fn resolve_directory(
        &self,
        speculative: Result<reqwest::Response, FetchError>,
        default_url: &str,
        root_url: &str,
    ) -> Result<String, FetchError> {
        if root_url == default_url {
            if let Ok(response) = speculative {
                return http::decode_body(response).await;
            }
        }
        debug!(url = root_url, "re-fetching directory page at root-specified URL");
        let response = http::get(&self.client, root_url).await?;
        http::decode_body(response).await
    }
}

fn parse_root(html: &str, base_url: &str) -> (String, String, DateTime<Utc>) {
    let document = Html::parse_document(html);
    let last_update = extract_last_update(&document).unwrap_or_else(Utc::now);

    let mut teacher_url = None;
    let mut class_url = None;
    for a in document.select(&A_SEL) {
        let href = a.value().attr("href").unwrap_or_default();
        let text: String = a.text().collect();
        if href.is_empty() {
            continue;
        }
        if href.contains("TeachIndex") || text.contains('教') {
            teacher_url = Some(resolve_url(base_url, href));
        } else if href.contains("ClassIndex") || text.contains('班') {
            class_url = Some(resolve_url(base_url, href));
        }
    }

    (
        teacher_url.unwrap_or_else(|| format!("{base_url}_TeachIndex.html")),
        class_url.unwrap_or_else(|| format!("{base_url}_ClassIndex.html")),
        last_update,
    )
}

fn extract_last_update(document: &Html) -> Option<DateTime<Utc>> {
    let text = document.select(&LAST_UPDATE_SEL).next()?.text().collect::<String>();
    parse_loose_timestamp(text.trim())
}

/// Best-effort parse of a loosely-formatted upstream timestamp
/// (`YYYY/MM/DD HH:MM` or `YYYY-MM-DD`); returns `None` on anything else
/// rather than failing the whole fetch over a cosmetic field.
pub(crate) fn parse_loose_timestamp(text: &str) -> Option<DateTime<Utc>> {
    for fmt in ["%Y/%m/%d %H:%M", "%Y/%m/%d", "%Y-%m-%d %H:%M", "%Y-%m-%d"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(text, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_owned()
    } else {
        format!("{base_url}{}", href.trim_start_matches('/'))
    }
}

/// A row is a category header iff it has a `<span>` and no `<a>` (§4.2).
fn parse_directory(html: &str) -> CategoryMap {
    let document = Html::parse_document(html);
    let mut map: CategoryMap = CategoryMap::new();
    let mut current_category = String::new();

    for row in document.select(&TR_SEL) {
        let links: Vec<_> = row.select(&A_SEL).collect();
        if links.is_empty() {
            if let Some(span) = row.select(&SPAN_SEL).next() {
                let text: String = span.text().collect::<String>().trim().to_owned();
                if !text.is_empty() {
                    current_category = text;
                }
            }
            continue;
        }

        for link in links {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if href.is_empty() {
                continue;
            }
            let raw_text: String = link.text().collect();
            let target = normalize_link_text(&raw_text);
            if target.is_empty() {
                continue;
            }
            let info = TargetInfo::from_url(target, current_category.clone(), href.to_owned());
            map.entry(current_category.clone())
                .or_default()
                .insert(info.id.clone(), info);
        }
    }

    map
}

/// CJK-only text is kept verbatim; anything else has whitespace stripped and
/// a 3-character legacy upstream prefix trimmed (§4.2).
fn normalize_link_text(text: &str) -> String {
    let joined: String = text.split_whitespace().collect();
    if !joined.is_empty() && joined.chars().all(is_han) {
        return joined;
    }
    if joined.chars().count() > 3 {
        joined.chars().skip(3).collect()
    } else {
        joined
    }
}

fn is_han(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_only_text_kept_verbatim() {
        assert_eq!(normalize_link_text("王大明"), "王大明");
    }

    #[test]
    fn prefixed_text_trims_first_three_chars() {
        assert_eq!(normalize_link_text("101王大明"), "王大明");
    }

    #[test]
    fn short_text_without_prefix_unchanged() {
        assert_eq!(normalize_link_text("Tim"), "Tim");
    }

    #[test]
    fn parses_category_headers_and_link_rows() {
        let html = r#"
        <html><body><table>
        <tr><td><span>國文科</span></td></tr>
        <tr><td><a href="TA01.html">王大明</a></td></tr>
        <tr><td><a href="TA02.html">101Amy</a></td></tr>
        <tr><td><span>數學科</span></td></tr>
        <tr><td><a href="TB01.html">Tim</a></td></tr>
        </table></body></html>
        "#;
        let map = parse_directory(html);
        assert_eq!(map.len(), 2);
        assert_eq!(map["國文科"].len(), 2);
        assert_eq!(map["國文科"]["TA01"].target, "王大明");
        assert_eq!(map["國文科"]["TA02"].target, "Amy");
        assert_eq!(map["數學科"]["TB01"].target, "Tim");
    }

    #[test]
    fn loose_timestamp_formats() {
        assert!(parse_loose_timestamp("2025/03/14 12:00").is_some());
        assert!(parse_loose_timestamp("2025-03-14").is_some());
        assert!(parse_loose_timestamp("garbage").is_none());
    }
}
