//! Small helpers over `scraper` shared by the adapters.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Whitespace-collapsed text of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first element matching `css`, if any and non-empty.
pub fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty())
}

/// Text of the first match of `css` under `element`.
pub fn child_text(element: &ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    element
        .select(&selector)
        .map(|e| element_text(&e))
        .find(|t| !t.is_empty())
}

/// Attribute `attr` of the first match of `css` under `element`.
pub fn child_attr(element: &ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    element
        .select(&selector)
        .find_map(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Paragraph texts of every match of `css`, joined with newlines.
pub fn joined_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let text = document
        .select(&selector)
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

/// Resolve `href` against the page it was found on.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}
