//! Default content collaborators: a template-based generator and a
//! heuristic tone validator. Both are deliberately simple — anything
//! smarter plugs in through the same traits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use async_trait::async_trait;
use nudgeclaw_core::error::Result;
use nudgeclaw_core::traits::{ContentGenerator, ContentValidator, ReminderContext};
use nudgeclaw_core::types::{Content, NotificationType, UserPreferences, Verdict};

// ═══════════════════════════════════════════════════════
// Generator
// ═══════════════════════════════════════════════════════

/// Picks a phrasing variant per notification type so repeated reminders
/// don't read like a broken record. Seedable for deterministic tests.
pub struct TemplateGenerator {
    rng: Mutex<StdRng>,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn pick(&self, n: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..n),
            Err(_) => 0,
        }
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate(
        &self,
        context: &ReminderContext,
        _preferences: &UserPreferences,
    ) -> Result<Content> {
        let item = &context.item;
        let days = context.urgency.staleness.days_since_update.round() as i64;

        let (title, body) = match context.notification_type {
            NotificationType::StaleReminder => {
                let openers = [
                    format!("{} has been quiet for {days} days", item.id),
                    format!("Still on your plate: {}", item.id),
                    format!("Checking in on {}", item.id),
                ];
                let title = openers[self.pick(openers.len())].clone();
                let body = format!(
                    "{} ({} in {}) hasn't seen an update in {days} days. \
                     A quick status note or a close would keep it moving.",
                    item.id,
                    item.item_type.key(),
                    item.project
                );
                (title, body)
            }
            NotificationType::DeadlineWarning => {
                let title = match context.urgency.deadline.days_remaining {
                    Some(d) if d < 0.0 => format!("{} is past its deadline", item.id),
                    Some(d) if d <= 1.0 => format!("{} is due within a day", item.id),
                    Some(d) => format!("{} is due in {} days", item.id, d.ceil() as i64),
                    None => format!("{} is approaching its deadline", item.id),
                };
                let body = format!(
                    "{} in {} needs attention before its deadline. \
                     If it's blocked, flagging the blocker now beats silence.",
                    item.id, item.project
                );
                (title, body)
            }
            NotificationType::ProgressSummary => {
                let title = format!("Progress check: {}", item.project);
                let body = format!(
                    "A quick look at {} in {} — worth a short progress note \
                     so the rest of the team stays in the loop.",
                    item.id, item.project
                );
                (title, body)
            }
            NotificationType::TeamEncouragement => {
                let openers = [
                    format!("Nice momentum on {}", item.project),
                    format!("{} is moving along", item.project),
                ];
                let title = openers[self.pick(openers.len())].clone();
                let body = format!(
                    "Recent activity on {} looks healthy. Keep it up.",
                    item.project
                );
                (title, body)
            }
        };

        Ok(Content {
            title,
            body,
            action_ref: Some(item.id.clone()),
        })
    }
}

// ═══════════════════════════════════════════════════════
// Validator
// ═══════════════════════════════════════════════════════

const MAX_BODY_CHARS: usize = 500;

/// Scores wording for basic tone problems: shouting, nagging punctuation,
/// empty or bloated bodies, missing action reference.
pub struct HeuristicValidator {
    min_score: f64,
}

impl HeuristicValidator {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }
}

#[async_trait]
impl ContentValidator for HeuristicValidator {
    async fn validate(&self, content: &Content) -> Result<Verdict> {
        let mut score: f64 = 1.0;
        let mut suggestions = Vec::new();

        if content.title.trim().is_empty() || content.body.trim().is_empty() {
            score -= 0.5;
            suggestions.push("fill in the empty title or body".to_string());
        }
        let letters: Vec<char> = content.title.chars().filter(|c| c.is_alphabetic()).collect();
        if !letters.is_empty() && letters.iter().all(|c| c.is_uppercase()) {
            score -= 0.3;
            suggestions.push("stop shouting: lowercase the title".to_string());
        }
        let bangs = content.body.matches('!').count() + content.title.matches('!').count();
        if bangs > 1 {
            score -= 0.2;
            suggestions.push("drop the extra exclamation marks".to_string());
        }
        if content.body.chars().count() > MAX_BODY_CHARS {
            score -= 0.2;
            suggestions.push(format!("trim the body to {MAX_BODY_CHARS} characters"));
        }
        if content.action_ref.is_none() {
            score -= 0.1;
            suggestions.push("add an item reference the user can act on".to_string());
        }

        let score = score.max(0.0);
        Ok(Verdict {
            acceptable: score >= self.min_score,
            score,
            suggestions,
        })
    }

    async fn repair(&self, content: &Content, suggestions: &[String]) -> Result<Content> {
        let mut repaired = content.clone();
        for suggestion in suggestions {
            if suggestion.contains("lowercase") {
                let lower = repaired.title.to_lowercase();
                let mut chars = lower.chars();
                repaired.title = match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => lower,
                };
            } else if suggestion.contains("exclamation") {
                repaired.title = strip_extra_bangs(&repaired.title);
                repaired.body = strip_extra_bangs(&repaired.body);
            } else if suggestion.contains("trim the body") {
                repaired.body = repaired
                    .body
                    .chars()
                    .take(MAX_BODY_CHARS)
                    .collect::<String>()
                    .trim_end()
                    .to_string();
            }
        }
        Ok(repaired)
    }
}

fn strip_extra_bangs(text: &str) -> String {
    let mut seen = false;
    text.chars()
        .filter_map(|c| {
            if c != '!' {
                return Some(c);
            }
            if seen {
                None
            } else {
                seen = true;
                Some('.')
            }
        })
        .collect()
}
