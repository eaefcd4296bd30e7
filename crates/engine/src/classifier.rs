//! Topic classification: which parts of the knowledge base a message is about.
//!
//! [`TopicClassifier`] is the seam; [`KeywordClassifier`] is the default
//! policy (case-insensitive substring matching against fixed keyword sets).

use serde::{Deserialize, Serialize};

/// Independent topic flags. A message may match several topics, or none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFlags {
    pub is_greeting: bool,
    pub is_about_skills: bool,
    pub is_about_experience: bool,
    pub is_about_projects: bool,
    pub is_about_personal: bool,
    pub is_about_education: bool,
}

impl TopicFlags {
    /// Whether the prompt should close with the "reference the information
    /// above" instruction. Only skills, experience and projects count;
    /// education adds its sections but keeps the generic instruction.
    pub fn has_knowledge_topic(&self) -> bool {
        self.is_about_skills || self.is_about_experience || self.is_about_projects
    }
}

/// Maps a message to topic flags.
///
/// Implementations must be pure: the same message always yields the same
/// flags, and classification never fails.
pub trait TopicClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, message: &str) -> TopicFlags;
}

const GREETING: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "what's up",
    "greetings",
];
const SKILLS: &[&str] = &[
    "skill",
    "technology",
    "programming",
    "language",
    "framework",
    "tool",
    "tech stack",
    "expertise",
];
const EXPERIENCE: &[&str] = &[
    "experience",
    "work",
    "job",
    "company",
    "role",
    "position",
    "career",
    "professional",
];
const PROJECTS: &[&str] = &[
    "project",
    "built",
    "developed",
    "created",
    "portfolio",
    "github",
    "demo",
];
const PERSONAL: &[&str] = &[
    "who are you",
    "about you",
    "your name",
    "contact",
    "location",
    "email",
    "phone",
];
const EDUCATION: &[&str] = &[
    "education",
    "degree",
    "university",
    "college",
    "study",
    "course",
    "certification",
];

/// Short messages containing a greeting keyword count as greetings.
pub const GREETING_MAX_CHARS: usize = 20;

/// Keyword-heuristic classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    greeting: Vec<String>,
    skills: Vec<String>,
    experience: Vec<String>,
    projects: Vec<String>,
    personal: Vec<String>,
    education: Vec<String>,
    greeting_max_chars: usize,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self {
            greeting: owned(GREETING),
            skills: owned(SKILLS),
            experience: owned(EXPERIENCE),
            projects: owned(PROJECTS),
            personal: owned(PERSONAL),
            education: owned(EDUCATION),
            greeting_max_chars: GREETING_MAX_CHARS,
        }
    }

    /// Add extra skill keywords (e.g. names of niche technologies).
    pub fn with_skill_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skills
            .extend(keywords.into_iter().map(|k| k.as_ref().to_lowercase()));
        self
    }

    fn is_greeting(&self, normalized: &str) -> bool {
        let short = normalized.chars().count() <= self.greeting_max_chars;
        self.greeting
            .iter()
            .any(|k| normalized == k || (short && normalized.contains(k.as_str())))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    fn classify(&self, message: &str) -> TopicFlags {
        let lower = message.to_lowercase();
        TopicFlags {
            is_greeting: self.is_greeting(lower.trim()),
            is_about_skills: contains_any(&lower, &self.skills),
            is_about_experience: contains_any(&lower, &self.experience),
            is_about_projects: contains_any(&lower, &self.projects),
            is_about_personal: contains_any(&lower, &self.personal),
            is_about_education: contains_any(&lower, &self.education),
        }
    }
}
