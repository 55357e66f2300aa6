use anyhow::Result;

/// Classifies visitors as automated traffic
pub trait BotDetector: Send + Sync {
    fn is_bot(&self, user_agent: Option<&str>) -> Result<bool>;
}

/// Substrings found in the user agents of crawlers, previewers and HTTP tools
const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "crawling",
    "slurp",
    "facebookexternalhit",
    "embedly",
    "preview",
    "headlesschrome",
    "lighthouse",
    "curl/",
    "wget/",
    "python-requests",
    "python-urllib",
    "go-http-client",
    "okhttp",
    "java/",
    "libwww-perl",
    "httpclient",
    "axios/",
    "node-fetch",
];

/// User-agent heuristic; a missing user agent is not treated as a bot
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAgentBotDetector;

impl BotDetector for UserAgentBotDetector {
    fn is_bot(&self, user_agent: Option<&str>) -> Result<bool> {
        let Some(user_agent) = user_agent else {
            return Ok(false);
        };
        let user_agent = user_agent.to_ascii_lowercase();
        Ok(BOT_MARKERS
            .iter()
            .any(|marker| user_agent.contains(marker)))
    }
}
