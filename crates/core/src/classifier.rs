//! Crawler detection from the `User-Agent` header.
//!
//! Every tier links this module instead of keeping its own list: when the
//! edge proxy and the snapshot service disagree about what a crawler is,
//! crawlers get the interactive shell on one hop and a snapshot on another.

use serde::Serialize;

/// Lower-case substrings identifying search-engine crawlers and
/// social-preview fetchers.
pub const CRAWLER_SIGNATURES: &[&str] = &[
    // Search engines
    "googlebot",
    "google-inspectiontool",
    "googleother",
    "adsbot-google",
    "mediapartners-google",
    "bingbot",
    "msnbot",
    "bingpreview",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "yandex.com/bots",
    "sogou",
    "exabot",
    "applebot",
    "petalbot",
    "seznambot",
    "naver.me/spd",
    // Social previews
    "facebookexternalhit",
    "facebookcatalog",
    "facebot",
    "meta-externalagent",
    "twitterbot",
    "linkedinbot",
    "pinterestbot",
    "slackbot",
    "slack-imgproxy",
    "discordbot",
    "telegrambot",
    "whatsapp",
    "skypeuripreview",
    "redditbot",
    "tumblr",
    "vkshare",
    "embedly",
    "quora link preview",
    "outbrain",
    "bitlybot",
    "mastodon",
    "iframely",
    // SEO tooling
    "ahrefsbot",
    "semrushbot",
    "mj12bot",
    "dotbot",
    "rogerbot",
    "screaming frog",
    "w3c_validator",
];

/// Result of classifying a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientClass {
    pub is_crawler: bool,
    /// The signature that matched, for diagnostics.
    pub signature: Option<&'static str>,
}

impl ClientClass {
    pub const HUMAN: Self = Self {
        is_crawler: false,
        signature: None,
    };
}

/// Classify a `User-Agent` string.
///
/// Matching is a case-insensitive substring test against
/// [`CRAWLER_SIGNATURES`]. A missing or empty agent counts as human so that
/// such clients still reach the full application.
#[must_use]
pub fn classify(user_agent: &str) -> ClientClass {
    if user_agent.trim().is_empty() {
        return ClientClass::HUMAN;
    }

    let agent = user_agent.to_ascii_lowercase();
    CRAWLER_SIGNATURES
        .iter()
        .copied()
        .find(|sig| agent.contains(sig))
        .map_or(ClientClass::HUMAN, |sig| ClientClass {
            is_crawler: true,
            signature: Some(sig),
        })
}

/// Convenience wrapper over [`classify`] for optional header values.
#[must_use]
pub fn is_crawler(user_agent: Option<&str>) -> bool {
    user_agent.is_some_and(|ua| classify(ua).is_crawler)
}
