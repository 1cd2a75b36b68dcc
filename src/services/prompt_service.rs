//! Prompt generation for Truth & Dare and the tongue-twister game.
//!
//! Prompts are built from a small set of templates whose `{placeholder}`
//! slots are filled with random words, optionally tagged with a short random
//! suffix. Every prompt handed to a user is written to the prompt history,
//! and a user never receives the same text twice for the same kind.

use crate::db::now_timestamp;
use crate::models::PromptKind;
use crate::repositories::{PromptHistoryRepository, RepositoryError};
use once_cell::sync::Lazy;
use rand::{seq::SliceRandom, Rng};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[allow(clippy::unwrap_used)]
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z]+)\}").unwrap());

pub const DEFAULT_MAX_ATTEMPTS: usize = 200;
pub const DEFAULT_SUFFIX_PROBABILITY: f64 = 0.05;
const MAX_RECORD_RETRIES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum PromptServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Could not find an unused {0} prompt")]
    Exhausted(PromptKind),
}

/// Templates per prompt kind plus the word lists used to fill them.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: HashMap<PromptKind, Vec<String>>,
    fillers: HashMap<String, Vec<String>>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PromptCatalog {
    pub fn new(
        templates: HashMap<PromptKind, Vec<String>>,
        fillers: HashMap<String, Vec<String>>,
    ) -> Self {
        Self { templates, fillers }
    }

    pub fn templates(&self, kind: PromptKind) -> &[String] {
        self.templates.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn filler(&self, name: &str) -> &[String] {
        self.fillers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let templates = HashMap::from([
            (
                PromptKind::Truth,
                owned(&[
                    "What's a time you felt {emotion} about {object}? Explain.",
                    "Tell us about the most {adjective} thing you did at {place}.",
                    "When did you last {action} and how did it go?",
                    "What's a secret about your {category} you can share?",
                    "Describe a moment you felt very {emotion}.",
                ]),
            ),
            (
                PromptKind::Dare,
                owned(&[
                    "Record a short video of you {action} for 10-20 seconds.",
                    "Record your voice {action} and upload it.",
                    "Upload a video showing {object} in action.",
                    "Record a voice message describing a {adjective} {category}.",
                    "Make a short clip of you {action} in {place}.",
                ]),
            ),
            (
                PromptKind::Twister,
                owned(&[
                    "Say this tongue twister: '{twister}'.",
                    "Record yourself saying: '{twister}' three times fast.",
                    "Try this: '{twister}' in a {adjective} voice and upload it.",
                ]),
            ),
        ]);

        let fillers = HashMap::from([
            (
                "adjective".to_string(),
                owned(&[
                    "embarrassing",
                    "exciting",
                    "funny",
                    "scary",
                    "weird",
                    "silly",
                    "proud",
                ]),
            ),
            (
                "object".to_string(),
                owned(&[
                    "your phone",
                    "your pet",
                    "your last meal",
                    "a book you love",
                    "your first car",
                ]),
            ),
            (
                "emotion".to_string(),
                owned(&[
                    "jealous",
                    "happy",
                    "angry",
                    "nervous",
                    "excited",
                    "embarrassed",
                ]),
            ),
            (
                "action".to_string(),
                owned(&[
                    "dancing",
                    "singing",
                    "jumping",
                    "laughing",
                    "shouting",
                    "whistling",
                ]),
            ),
            (
                "place".to_string(),
                owned(&["school", "park", "kitchen", "party", "beach"]),
            ),
            (
                "category".to_string(),
                owned(&["family", "friendship", "hobby", "job", "dream"]),
            ),
            (
                "twister".to_string(),
                owned(&[
                    "She sells seashells by the seashore.",
                    "Peter Piper picked a peck of pickled peppers.",
                    "How much wood would a woodchuck chuck?",
                    "Betty Botter bought some butter.",
                    "Six slippery snails slid silently.",
                ]),
            ),
        ]);

        Self::new(templates, fillers)
    }
}

/// Pure, RNG-driven prompt builder. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct PromptGenerator {
    catalog: PromptCatalog,
    max_attempts: usize,
    suffix_probability: f64,
}

impl Default for PromptGenerator {
    fn default() -> Self {
        Self::new(PromptCatalog::default())
    }
}

impl PromptGenerator {
    pub fn new(catalog: PromptCatalog) -> Self {
        Self {
            catalog,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            suffix_probability: DEFAULT_SUFFIX_PROBABILITY,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_suffix_probability(mut self, probability: f64) -> Self {
        self.suffix_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Replaces every known `{placeholder}` with a random word. Unknown
    /// placeholders are left untouched.
    pub fn fill<R: Rng + ?Sized>(&self, template: &str, rng: &mut R) -> String {
        PLACEHOLDER_PATTERN
            .replace_all(template, |caps: &regex::Captures| {
                self.catalog
                    .filler(&caps[1])
                    .choose(&mut *rng)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .to_string()
    }

    /// One random prompt of `kind`, possibly tagged with ` (#xxxxx)`.
    pub fn candidate<R: Rng + ?Sized>(&self, kind: PromptKind, rng: &mut R) -> String {
        let raw = self.random_filled(kind, rng);
        if rng.gen_bool(self.suffix_probability) {
            format!("{} (#{:05x})", raw, rng.gen::<u32>() & 0xF_FFFF)
        } else {
            raw
        }
    }

    /// First candidate not in `used`; after `max_attempts` collisions a
    /// 128-bit random tag makes the prompt unique.
    pub fn pick_unused<R: Rng + ?Sized>(
        &self,
        kind: PromptKind,
        used: &HashSet<String>,
        rng: &mut R,
    ) -> String {
        for _ in 0..self.max_attempts {
            let candidate = self.candidate(kind, rng);
            if !used.contains(&candidate) {
                return candidate;
            }
        }
        format!(
            "{} (#{:032x})",
            self.random_filled(kind, rng),
            rng.gen::<u128>()
        )
    }

    fn random_filled<R: Rng + ?Sized>(&self, kind: PromptKind, rng: &mut R) -> String {
        match self.catalog.templates(kind).choose(rng) {
            Some(template) => self.fill(template, rng),
            None => format!("Surprise {} prompt", kind),
        }
    }
}

pub struct PromptService {
    history: Arc<dyn PromptHistoryRepository>,
    generator: PromptGenerator,
}

impl PromptService {
    pub fn new(history: Arc<dyn PromptHistoryRepository>, generator: PromptGenerator) -> Self {
        Self { history, generator }
    }

    /// Hands `phone` a prompt of `kind` it has never been given before and
    /// records it straight away, before any answer arrives.
    pub async fn generate_unique_prompt(
        &self,
        phone: &str,
        kind: PromptKind,
    ) -> Result<String, PromptServiceError> {
        let mut used = self.history.used_prompts(phone, kind).await?;

        for _ in 0..MAX_RECORD_RETRIES {
            let candidate = {
                let mut rng = rand::thread_rng();
                self.generator.pick_unused(kind, &used, &mut rng)
            };

            match self
                .history
                .record(phone, kind, &candidate, &now_timestamp())
                .await
            {
                Ok(()) => {
                    tracing::debug!("Assigned {} prompt to {}", kind, phone);
                    return Ok(candidate);
                }
                // Another request got there first with the same text.
                Err(RepositoryError::AlreadyExists) => {
                    used.insert(candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PromptServiceError::Exhausted(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::prompt_history_repository::MockPromptHistoryRepository;
    use rand::{rngs::StdRng, SeedableRng};

    fn single_template_generator(text: &str) -> PromptGenerator {
        let catalog = PromptCatalog::new(
            HashMap::from([(PromptKind::Truth, vec![text.to_string()])]),
            HashMap::new(),
        );
        PromptGenerator::new(catalog).with_suffix_probability(0.0)
    }

    #[test]
    fn filled_prompts_have_no_placeholders_left() {
        let generator = PromptGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for kind in [PromptKind::Truth, PromptKind::Dare, PromptKind::Twister] {
            for _ in 0..50 {
                let prompt = generator.candidate(kind, &mut rng);
                assert!(
                    !PLACEHOLDER_PATTERN.is_match(&prompt),
                    "unfilled placeholder in {:?}",
                    prompt
                );
            }
        }
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let generator = PromptGenerator::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generator.fill("Hello {nobody}", &mut rng), "Hello {nobody}");
    }

    #[test]
    fn same_seed_same_prompt() {
        let generator = PromptGenerator::default();
        let a = generator.candidate(PromptKind::Dare, &mut StdRng::seed_from_u64(42));
        let b = generator.candidate(PromptKind::Dare, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn suffix_is_five_hex_digits() {
        let generator = single_template_generator("Tell the truth.").with_suffix_probability(1.0);
        let prompt = generator.candidate(PromptKind::Truth, &mut StdRng::seed_from_u64(3));
        let tag = prompt
            .strip_prefix("Tell the truth. (#")
            .and_then(|rest| rest.strip_suffix(')'))
            .expect("suffix present");
        assert_eq!(tag.len(), 5);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn pick_unused_falls_back_to_long_tag() {
        let generator = single_template_generator("Only one.").with_max_attempts(10);
        let used = HashSet::from(["Only one.".to_string()]);
        let prompt = generator.pick_unused(PromptKind::Truth, &used, &mut StdRng::seed_from_u64(9));
        assert!(prompt.starts_with("Only one. (#"));
        assert_eq!(prompt.len(), "Only one. (#".len() + 32 + 1);
    }

    #[tokio::test]
    async fn test_retries_when_another_request_wins_the_race() {
        let mut mock_repo = MockPromptHistoryRepository::new();
        mock_repo
            .expect_used_prompts()
            .times(1)
            .returning(|_, _| Ok(HashSet::new()));

        let mut calls = 0;
        mock_repo
            .expect_record()
            .times(2)
            .returning(move |_, _, _, _| {
                calls += 1;
                if calls == 1 {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Ok(())
                }
            });

        let service = PromptService::new(
            Arc::new(mock_repo),
            single_template_generator("Same every time.").with_max_attempts(3),
        );
        let prompt = service
            .generate_unique_prompt("+15550001111", PromptKind::Truth)
            .await
            .unwrap();
        assert!(prompt.starts_with("Same every time. (#"));
    }
}
