//! Simulated in-character dialogue.
//!
//! # Responsibility
//! - Produce template responses in a character's voice from traits, values,
//!   voice patterns and memories.
//! - Pick the provider label the response is attributed to.
//!
//! # Invariants
//! - No network or model calls; output is a pure function of its inputs.
//! - Provider preference is `openai`, then `anthropic`, then `local`.

use crate::model::record::{Character, CharacterMemory};
use serde::{Deserialize, Serialize};

/// How many memories feed one response.
pub const MEMORY_CONTEXT_LIMIT: u32 = 10;

const LOCAL_RESPONSES: [&str; 4] = [
    "As {name}, I would say that's an interesting question.",
    "Given my background, I have some thoughts on this matter.",
    "I've considered this before, and my perspective is shaped by my experiences.",
    "That's something I've dealt with in the past.",
];

/// Backend a response is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogueProvider {
    OpenAi,
    Anthropic,
    Local,
}

impl DialogueProvider {
    /// Vault service id whose key enables this provider.
    pub fn service(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("openai"),
            Self::Anthropic => Some("anthropic"),
            Self::Local => None,
        }
    }

    /// First provider whose key is configured, else `Local`.
    pub fn select(has_key: impl Fn(&str) -> bool) -> Self {
        [Self::OpenAi, Self::Anthropic]
            .into_iter()
            .find(|provider| provider.service().is_some_and(&has_key))
            .unwrap_or(Self::Local)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStyle {
    #[default]
    Accurate,
    Concise,
    Detailed,
}

/// Template-based dialogue generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogueService;

impl DialogueService {
    pub fn new() -> Self {
        Self
    }

    /// Generates one reply from `character` to `prompt`.
    ///
    /// `memories` are expected most important first.
    pub fn generate(
        &self,
        character: &Character,
        prompt: &str,
        memories: &[CharacterMemory],
        style: ConversationStyle,
        provider: DialogueProvider,
    ) -> String {
        match provider {
            DialogueProvider::OpenAi | DialogueProvider::Anthropic => {
                styled_response(character, prompt, memories, style)
            }
            DialogueProvider::Local => local_response(character, prompt),
        }
    }
}

fn styled_response(
    character: &Character,
    prompt: &str,
    memories: &[CharacterMemory],
    style: ConversationStyle,
) -> String {
    let prompt = prompt.to_lowercase();
    let traits = character.traits.as_deref().unwrap_or("").to_lowercase();
    let values = character.values.as_deref().unwrap_or("").to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| prompt.contains(word));
    let pick = |source: &str, options: &[(&str, &'static str)], fallback: &'static str| {
        options
            .iter()
            .find(|(keyword, _)| source.contains(keyword))
            .map_or(fallback, |(_, text)| *text)
    };

    let response = if mentions(&["mission", "goal"]) {
        format!(
            "My current mission is to explore new possibilities and overcome challenges. {}",
            pick(&traits, &[("determined", "I never back down from a challenge.")], "")
        )
    } else if mentions(&["feel", "emotion"]) {
        format!(
            "I feel {}. {}",
            pick(
                &traits,
                &[
                    ("conflicted", "conflicted about many things"),
                    ("loyal", "strongly committed to my allies"),
                ],
                "cautiously optimistic",
            ),
            pick(&values, &[("honor", "Honor guides my emotions and actions.")], "")
        )
    } else if mentions(&["think", "opinion"]) {
        format!(
            "I think {}. {}",
            pick(
                &traits,
                &[
                    ("strategic", "we should approach this methodically"),
                    ("wise", "there is more to this than meets the eye"),
                ],
                "we should consider all angles",
            ),
            pick(&values, &[("truth", "The truth is what matters most.")], "")
        )
    } else {
        format!(
            "{} {}",
            pick(
                &traits,
                &[
                    ("mysterious", "There are many layers to this situation."),
                    ("intelligent", "I have analyzed this carefully."),
                ],
                "I understand your question.",
            ),
            pick(
                &values,
                &[
                    ("knowledge", "Knowledge is the key to understanding."),
                    ("progress", "Progress requires bold action."),
                ],
                "Let me share my perspective.",
            )
        )
    };
    let response = response.trim().to_string();

    match style {
        ConversationStyle::Accurate => response,
        ConversationStyle::Concise => {
            let first = response.split('.').next().unwrap_or("").trim();
            format!("{first}.")
        }
        ConversationStyle::Detailed => {
            let mut detailed = response;
            if let Some(voice) = character.voice_patterns.as_deref().filter(|v| !v.is_empty()) {
                detailed.push(' ');
                detailed.push_str(voice);
            }
            if let Some(memory) = memories.first() {
                detailed.push_str(" I still remember: ");
                detailed.push_str(memory.content.trim_end_matches('.'));
                detailed.push('.');
            }
            detailed.push_str(" I've experienced many things that have shaped my perspective on this.");
            detailed
        }
    }
}

fn local_response(character: &Character, prompt: &str) -> String {
    let index = prompt.chars().count() % LOCAL_RESPONSES.len();
    LOCAL_RESPONSES[index].replace("{name}", &character.name)
}

#[cfg(test)]
mod tests {
    use super::{ConversationStyle, DialogueProvider, DialogueService, LOCAL_RESPONSES};
    use crate::model::record::{Character, CharacterMemory, MemoryType};

    fn elara() -> Character {
        Character {
            id: "c1".to_string(),
            project_id: "p1".to_string(),
            name: "Captain Elara".to_string(),
            description: Some("Veteran starship captain with a troubled past".to_string()),
            traits: Some("Determined, Loyal, Strategic".to_string()),
            values: Some("Honor, Duty, Redemption".to_string()),
            voice_patterns: Some("Direct, authoritative.".to_string()),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn memory(content: &str) -> CharacterMemory {
        CharacterMemory {
            id: "m1".to_string(),
            character_id: "c1".to_string(),
            content: content.to_string(),
            memory_type: MemoryType::Episodic,
            importance: 5,
            created_at: 0,
        }
    }

    #[test]
    fn provider_prefers_openai_then_anthropic() {
        assert_eq!(DialogueProvider::select(|_| true), DialogueProvider::OpenAi);
        assert_eq!(
            DialogueProvider::select(|service| service == "anthropic"),
            DialogueProvider::Anthropic
        );
        assert_eq!(DialogueProvider::select(|_| false), DialogueProvider::Local);
    }

    #[test]
    fn keyword_templates_follow_traits_and_values() {
        let service = DialogueService::new();
        let mission = service.generate(
            &elara(),
            "What is your GOAL?",
            &[],
            ConversationStyle::Accurate,
            DialogueProvider::OpenAi,
        );
        assert!(mission.starts_with("My current mission"));
        assert!(mission.ends_with("I never back down from a challenge."));

        let feeling = service.generate(
            &elara(),
            "How do you feel?",
            &[],
            ConversationStyle::Accurate,
            DialogueProvider::Anthropic,
        );
        assert_eq!(
            feeling,
            "I feel strongly committed to my allies. Honor guides my emotions and actions."
        );
    }

    #[test]
    fn concise_keeps_first_sentence_and_detailed_adds_context() {
        let service = DialogueService::new();
        let concise = service.generate(
            &elara(),
            "what do you think",
            &[],
            ConversationStyle::Concise,
            DialogueProvider::OpenAi,
        );
        assert_eq!(concise, "I think we should approach this methodically.");

        let detailed = service.generate(
            &elara(),
            "what do you think",
            &[memory("Lost my first ship in the Battle of Proxima")],
            ConversationStyle::Detailed,
            DialogueProvider::OpenAi,
        );
        assert!(detailed.contains("Direct, authoritative."));
        assert!(detailed.contains("I still remember: Lost my first ship in the Battle of Proxima."));
        assert!(detailed.ends_with("shaped my perspective on this."));
    }

    #[test]
    fn local_provider_uses_fixed_lines() {
        let service = DialogueService::new();
        let reply = service.generate(
            &elara(),
            "abcd",
            &[],
            ConversationStyle::Detailed,
            DialogueProvider::Local,
        );
        assert_eq!(reply, "As Captain Elara, I would say that's an interesting question.");

        let other = service.generate(
            &elara(),
            "abcde",
            &[],
            ConversationStyle::Accurate,
            DialogueProvider::Local,
        );
        assert_eq!(other, LOCAL_RESPONSES[1]);
    }
}
