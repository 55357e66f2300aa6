use anyhow::{anyhow, bail};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ai::{parse_slug_candidate, TextGenerator};
use super::codec::SlugCodec;
use crate::error::{LinkError, LinkResult};
use crate::storage::LinkStore;

/// Characters used for generated slugs; no 0/o, 1/l/i look-alikes
pub const SLUG_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyz";

/// Draws per length before the length is increased
pub const MAX_ATTEMPTS_PER_LENGTH: usize = 5;

/// AI suggestions requested before falling back to a random slug
pub const MAX_AI_ATTEMPTS: usize = 2;

struct AiSuggester {
    client: Arc<dyn TextGenerator>,
    model: String,
    prompt: String,
    timeout: Duration,
}

/// Produces unused slugs, randomly or with the help of a text-generation model
pub struct SlugGenerator {
    links: Arc<LinkStore>,
    codec: SlugCodec,
    default_length: usize,
    ai: Option<AiSuggester>,
}

impl SlugGenerator {
    pub fn new(links: Arc<LinkStore>, codec: SlugCodec, default_length: usize) -> Self {
        Self {
            links,
            codec,
            default_length,
            ai: None,
        }
    }

    /// Enable AI suggestions; `{slugRegex}` in `prompt_template` is replaced with the slug pattern
    pub fn with_ai(
        mut self,
        client: Arc<dyn TextGenerator>,
        model: &str,
        prompt_template: &str,
        timeout: Duration,
    ) -> Self {
        self.ai = Some(AiSuggester {
            client,
            model: model.to_string(),
            prompt: prompt_template.replace("{slugRegex}", &self.codec.pattern()),
            timeout,
        });
        self
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Draw a random unused slug of `desired_length` (or the configured default).
    ///
    /// Each length gets [`MAX_ATTEMPTS_PER_LENGTH`] draws; after that the length
    /// grows by one for a single further round before giving up.
    pub async fn generate(&self, desired_length: Option<usize>) -> LinkResult<String> {
        let max_length = self.codec.max_length();
        let mut length = desired_length
            .unwrap_or(self.default_length)
            .clamp(1, max_length);

        for round in 0..2 {
            for attempt in 1..=MAX_ATTEMPTS_PER_LENGTH {
                let candidate = self.codec.normalize(&random_slug(length))?;
                if !self.is_taken(&candidate).await? {
                    return Ok(candidate);
                }
                debug!(slug = %candidate, attempt, length, "generated slug collided");
            }

            if round == 0 && length < max_length {
                info!(length, "slug space crowded, increasing length");
                length += 1;
            } else {
                break;
            }
        }

        Err(LinkError::GenerationFailed(format!(
            "no unused slug found up to length {length}"
        )))
    }

    /// Suggest a slug for `target_url`, preferring the AI model when configured.
    ///
    /// A rejected AI answer is retried once; after that a random slug is drawn.
    pub async fn suggest(&self, target_url: &str) -> LinkResult<String> {
        if let Some(ai) = &self.ai {
            for attempt in 1..=MAX_AI_ATTEMPTS {
                match self.ai_candidate(ai, target_url).await {
                    Ok(slug) => {
                        debug!(slug = %slug, attempt, "accepted AI slug suggestion");
                        return Ok(slug);
                    }
                    Err(reason) => {
                        warn!(attempt, reason = %reason, "discarding AI slug suggestion");
                    }
                }
            }
        }

        self.generate(None).await.map_err(|err| match err {
            LinkError::GenerationFailed(_) => err,
            other => LinkError::GenerationFailed(other.to_string()),
        })
    }

    async fn ai_candidate(&self, ai: &AiSuggester, target_url: &str) -> anyhow::Result<String> {
        let text = tokio::time::timeout(
            ai.timeout,
            ai.client.generate(&ai.model, &ai.prompt, target_url),
        )
        .await
        .map_err(|_| anyhow!("model call timed out after {}ms", ai.timeout.as_millis()))??;

        let candidate = parse_slug_candidate(&text)
            .ok_or_else(|| anyhow!("malformed model response: {text:?}"))?;
        let slug = self
            .codec
            .normalize(&candidate)
            .map_err(|err| anyhow!("candidate {candidate:?} rejected: {err}"))?;

        if self.is_taken(&slug).await? {
            bail!("candidate {slug:?} is already in use");
        }
        Ok(slug)
    }

    async fn is_taken(&self, slug: &str) -> LinkResult<bool> {
        Ok(self.links.get(slug).await?.is_some())
    }
}

fn random_slug(length: usize) -> String {
    (0..length)
        .map(|_| SLUG_ALPHABET[rand::random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}
