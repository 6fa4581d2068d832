//! Server-side view of the serialized page-builder document.
//!
//! Only the structure crawlers care about is read: ordered sections, rows
//! and the text-bearing elements inside them. Interactive widgets are
//! skipped. The output is a flat view model the templates iterate over.

use serde::Deserialize;
use url::Url;

/// A page-builder document: `sections -> rows -> elements`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageDocument {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// An element, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Heading {
        #[serde(default)]
        level: Option<u8>,
        #[serde(default)]
        text: String,
    },
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        #[serde(default)]
        src: String,
        #[serde(default)]
        alt: Option<String>,
    },
    Button {
        #[serde(default)]
        text: String,
        #[serde(default, alias = "url")]
        href: Option<String>,
    },
    List {
        #[serde(default)]
        items: Vec<String>,
    },
    Video {
        #[serde(default)]
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

impl PageDocument {
    /// Parse a stored document. `null` is an empty document.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for documents of the wrong shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
    }

    /// Visible sections with at least one renderable element.
    #[must_use]
    pub fn to_view(&self) -> Vec<SectionView> {
        self.sections
            .iter()
            .filter(|s| !s.hidden)
            .map(|section| SectionView {
                id: section.id.clone().unwrap_or_default(),
                elements: section
                    .rows
                    .iter()
                    .flat_map(|row| row.elements.iter())
                    .filter_map(ElementView::from_element)
                    .collect(),
            })
            .filter(|s| !s.elements.is_empty())
            .collect()
    }
}

/// A section ready for the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub id: String,
    pub elements: Vec<ElementView>,
}

/// An element ready for the template. `kind` selects the markup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementView {
    pub kind: &'static str,
    pub level: u8,
    pub text: String,
    pub href: String,
    pub items: Vec<String>,
}

impl ElementView {
    fn from_element(element: &Element) -> Option<Self> {
        let view = match element {
            Element::Heading { level, text } => Self {
                kind: "heading",
                level: level.unwrap_or(2).clamp(1, 6),
                text: text.trim().to_string(),
                ..Self::default()
            },
            Element::Text { text } => Self {
                kind: "text",
                text: text.trim().to_string(),
                ..Self::default()
            },
            Element::Image { src, alt } => Self {
                kind: "image",
                text: alt.clone().unwrap_or_default(),
                href: safe_url(src, IMAGE_SCHEMES).unwrap_or_default(),
                ..Self::default()
            },
            Element::Button { text, href } => Self {
                kind: "link",
                text: text.trim().to_string(),
                href: href
                    .as_deref()
                    .and_then(|h| safe_url(h, LINK_SCHEMES))
                    .unwrap_or_else(|| "#".to_string()),
                ..Self::default()
            },
            Element::List { items } => Self {
                kind: "list",
                items: items
                    .iter()
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty())
                    .collect(),
                ..Self::default()
            },
            Element::Video { url, title } => Self {
                kind: "link",
                text: title.clone().unwrap_or_else(|| url.clone()),
                href: safe_url(url, LINK_SCHEMES).unwrap_or_default(),
                ..Self::default()
            },
            Element::Unsupported => return None,
        };

        let empty = match view.kind {
            "list" => view.items.is_empty(),
            "image" => view.href.is_empty(),
            "link" => view.text.is_empty() || view.href.is_empty(),
            _ => view.text.is_empty(),
        };
        (!empty).then_some(view)
    }
}

const LINK_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];
const IMAGE_SCHEMES: &[&str] = &["http", "https"];

/// `raw` if it is relative or uses one of `schemes`. Script and data URLs
/// never reach a snapshot.
fn safe_url(raw: &str, schemes: &[&str]) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => schemes.contains(&url.scheme()).then(|| raw.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Some(raw.to_string()),
        Err(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_null_and_empty_documents_have_no_sections() {
        assert!(PageDocument::from_value(&json!(null)).unwrap().to_view().is_empty());
        assert!(PageDocument::from_value(&json!({})).unwrap().to_view().is_empty());
    }

    #[test]
    fn test_wrong_shape_is_an_error() {
        assert!(PageDocument::from_value(&json!("not a document")).is_err());
        assert!(PageDocument::from_value(&json!({ "sections": 3 })).is_err());
    }

    #[test]
    fn test_elements_flatten_in_order() {
        let doc = PageDocument::from_value(&json!({
            "sections": [{
                "id": "hero",
                "rows": [
                    { "elements": [{ "type": "heading", "level": 9, "text": "Hello" }] },
                    { "elements": [
                        { "type": "text", "text": "  Body  " },
                        { "type": "countdown", "ends_at": "2030-01-01" },
                        { "type": "button", "text": "Buy", "url": "/checkout" }
                    ] }
                ]
            }]
        }))
        .unwrap();

        let view = doc.to_view();
        assert_eq!(view.len(), 1);
        let kinds: Vec<_> = view[0].elements.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["heading", "text", "link"]);
        assert_eq!(view[0].elements[0].level, 6);
        assert_eq!(view[0].elements[1].text, "Body");
        assert_eq!(view[0].elements[2].href, "/checkout");
    }

    #[test]
    fn test_hidden_and_empty_sections_are_dropped() {
        let doc = PageDocument::from_value(&json!({
            "sections": [
                { "hidden": true, "rows": [{ "elements": [{ "type": "text", "text": "x" }] }] },
                { "rows": [{ "elements": [{ "type": "text", "text": "   " }] }] },
                { "rows": [] }
            ]
        }))
        .unwrap();
        assert!(doc.to_view().is_empty());
    }

    #[test]
    fn test_script_and_data_urls_are_dropped() {
        let doc = PageDocument::from_value(&json!({
            "sections": [{ "rows": [{ "elements": [
                { "type": "button", "text": "Win", "url": "javascript:alert(1)" },
                { "type": "button", "text": "Sneaky", "url": " JaVa\tScRiPt:alert(1)" },
                { "type": "image", "src": "data:image/svg+xml;base64,PHN2Zz4=", "alt": "x" },
                { "type": "video", "url": "vbscript:msgbox", "title": "Clip" },
                { "type": "button", "text": "Mail", "url": "mailto:hi@example.com" },
                { "type": "image", "src": "/static/hero.png", "alt": "Hero" },
                { "type": "button", "text": "Shop", "url": "https://shop.example.com/cart" }
            ] }] }]
        }))
        .unwrap();

        let elements = &doc.to_view()[0].elements;
        let hrefs: Vec<_> = elements.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["#", "#", "mailto:hi@example.com", "/static/hero.png", "https://shop.example.com/cart"]
        );
    }

    #[test]
    fn test_safe_url() {
        assert_eq!(safe_url("/about", LINK_SCHEMES).as_deref(), Some("/about"));
        assert_eq!(safe_url("about#team", LINK_SCHEMES).as_deref(), Some("about#team"));
        assert_eq!(safe_url("tel:+15550100", LINK_SCHEMES).as_deref(), Some("tel:+15550100"));
        assert_eq!(safe_url("mailto:a@b.c", IMAGE_SCHEMES), None);
        assert_eq!(safe_url("javascript:void(0)", LINK_SCHEMES), None);
        assert_eq!(safe_url("   ", LINK_SCHEMES), None);
    }
}
