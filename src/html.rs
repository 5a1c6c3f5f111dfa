//! Tolerant scanning of catalog HTML pages.
//!
//! Pages are not parsed into a DOM. Tags are tokenized with a regex and
//! elements are matched by depth, which is enough to pull dataset cards out
//! of listing pages and degrades to "no cards" on anything stranger.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::clean_text;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("tag pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute pattern is valid")
});

static CARD_DIV_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)dataset|card|item").expect("class pattern is valid"));
static CARD_LI_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)dataset|result").expect("class pattern is valid"));
static TITLE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)title|name").expect("class pattern is valid"));
static DESCRIPTION_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)description|summary").expect("class pattern is valid"));
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9A-Fa-f]{1,6})|([0-9]{1,7}));").expect("entity pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<'a> {
    pub start: usize,
    /// Byte offset just past the closing tag.
    pub end: usize,
    pub attrs: &'a str,
    pub inner: &'a str,
}

impl Element<'_> {
    pub fn attr(&self, name: &str) -> Option<String> {
        attribute(self.attrs, name)
    }

    pub fn text(&self) -> String {
        text_content(self.inner)
    }

    fn contains(&self, other: &Element<'_>) -> bool {
        self.start < other.start && other.end <= self.end
    }

    fn class_matches(&self, pattern: &Regex) -> bool {
        self.attr("class")
            .map(|class| pattern.is_match(&class))
            .unwrap_or(false)
    }
}

/// A dataset card found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlCard {
    pub title: String,
    pub href: Option<String>,
    pub description: String,
    /// Whole card text, whitespace-collapsed.
    pub text: String,
}

/// Every closed `name` element in document order (outer before inner).
pub fn elements<'a>(html: &'a str, name: &str) -> Vec<Element<'a>> {
    let mut open: Vec<(usize, usize, &'a str)> = Vec::new();
    let mut found = Vec::new();
    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !caps[2].eq_ignore_ascii_case(name) {
            continue;
        }
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        if &caps[1] == "/" {
            if let Some((start, inner_start, attrs)) = open.pop() {
                found.push(Element {
                    start,
                    end: whole.end(),
                    attrs,
                    inner: &html[inner_start..whole.start()],
                });
            }
        } else if !attrs.trim_end().ends_with('/') {
            open.push((whole.start(), whole.end(), attrs));
        }
    }
    found.sort_by_key(|element| element.start);
    found
}

pub fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attrs).find_map(|caps| {
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()))
    })
}

pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decodes the common named entities and numeric character references.
/// `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");
    NUMERIC_ENTITY
        .replace_all(&named, |caps: &regex::Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(decimal)) => decimal.as_str().parse().ok(),
                (None, None) => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .replace("&amp;", "&")
}

pub fn text_content(html: &str) -> String {
    clean_text(&decode_entities(&strip_tags(html)))
}

/// Dataset cards: `div`s whose class mentions dataset/card/item, then
/// `article`s, then `li`s whose class mentions dataset/result. Candidates
/// wrapping another candidate (listing grids) and cards without any title
/// candidate are skipped.
pub fn scan_cards(html: &str) -> Vec<HtmlCard> {
    let divs = elements(html, "div")
        .into_iter()
        .filter(|element| element.class_matches(&CARD_DIV_CLASS));
    let articles = elements(html, "article").into_iter();
    let items = elements(html, "li")
        .into_iter()
        .filter(|element| element.class_matches(&CARD_LI_CLASS));

    let candidates: Vec<Element<'_>> = divs.chain(articles).chain(items).collect();
    candidates
        .iter()
        .filter(|element| !candidates.iter().any(|other| element.contains(other)))
        .filter_map(card_from)
        .collect()
}

fn card_from(element: &Element<'_>) -> Option<HtmlCard> {
    let anchors = elements(element.inner, "a");
    let title_element = first_in_order(element.inner, &["h1", "h2", "h3", "h4", "a"], |candidate| {
        candidate.class_matches(&TITLE_CLASS)
    })
    .or_else(|| anchors.first().cloned())?;

    let title = title_element.text();
    if title.is_empty() {
        return None;
    }

    let href = anchors.iter().find_map(|anchor| anchor.attr("href"));
    let description = first_in_order(element.inner, &["p", "div"], |candidate| {
        candidate.class_matches(&DESCRIPTION_CLASS)
    })
    .map(|found| found.text())
    .unwrap_or_default();

    Some(HtmlCard {
        title,
        href,
        description,
        text: element.text(),
    })
}

fn first_in_order<'a, F>(html: &'a str, names: &[&str], predicate: F) -> Option<Element<'a>>
where
    F: Fn(&Element<'a>) -> bool,
{
    names
        .iter()
        .flat_map(|name| elements(html, name))
        .filter(|element| predicate(element))
        .min_by_key(|element| element.start)
}
