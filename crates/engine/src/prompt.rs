//! Prompt assembly.
//!
//! Builds the text prompt from the knowledge base sections selected by the
//! topic flags, recent conversation turns, and the user's question.
//! Pure: no I/O, deterministic for identical inputs.

use std::fmt::Write as _;
use std::sync::Arc;

use folio_core::knowledge::KnowledgeBase;
use folio_core::message::ConversationTurn;

use crate::classifier::TopicFlags;

/// Technical skills listed in a skills block.
const TECHNICAL_SKILLS_SHOWN: usize = 10;
/// Projects listed in a projects block.
const PROJECTS_SHOWN: usize = 2;
/// Prior answers are cut to this many characters.
pub const HISTORY_ANSWER_MAX_CHARS: usize = 300;

const KNOWLEDGE_INSTRUCTION: &str = "Please answer as if you are this developer, using \"I\" statements. Be specific and reference the relevant information provided above.";
const GENERIC_INSTRUCTION: &str = "Please answer as if you are this developer, using \"I\" statements. Keep your response focused and relevant to the question.";

/// Composes prompts against a shared, read-only knowledge base.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    knowledge: Arc<KnowledgeBase>,
    max_history_turns: usize,
}

impl PromptBuilder {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge,
            max_history_turns: 5,
        }
    }

    /// Cap how many of the supplied turns are woven into the prompt.
    pub fn with_max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = turns;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Build the prompt for `message`.
    ///
    /// `history` is chronological (oldest first). Only the newest
    /// `max_history_turns` entries are used, and never for greetings.
    pub fn build(&self, message: &str, flags: &TopicFlags, history: &[ConversationTurn]) -> String {
        let info = &self.knowledge.personal_info;

        if flags.is_greeting {
            return format!(
                "You are an AI assistant representing a skilled full-stack developer named {}.\n\n\
                 User: {message}\n\n\
                 Please respond with a brief, friendly greeting. Keep it short and natural. \
                 Don't go into details about experience unless specifically asked.\n\n\
                 Answer:",
                info.name
            );
        }

        let mut prompt = format!(
            "You are an AI assistant representing a skilled full-stack developer. \
             Here are the key facts about them:\n\nName: {}\nTitle: {}",
            info.name, info.title
        );

        if (flags.is_about_personal || flags.is_about_experience) && !info.summary.is_empty() {
            let _ = write!(prompt, "\nSummary: {}", info.summary);
        }

        if flags.is_about_skills {
            self.push_skills(&mut prompt);
        }
        if flags.is_about_experience {
            self.push_experience(&mut prompt);
        }
        if flags.is_about_projects {
            self.push_projects(&mut prompt);
        }
        if flags.is_about_education {
            self.push_education(&mut prompt);
        }

        self.push_history(&mut prompt, history);

        let _ = write!(prompt, "\n\nUser Question: {message}");

        let instruction = if flags.has_knowledge_topic() {
            KNOWLEDGE_INSTRUCTION
        } else {
            GENERIC_INSTRUCTION
        };
        let _ = write!(prompt, "\n\n{instruction}\n\nAnswer:");

        prompt
    }

    fn push_skills(&self, prompt: &mut String) {
        let skills = &self.knowledge.skills;
        let technical: Vec<&str> = skills
            .technical
            .iter()
            .take(TECHNICAL_SKILLS_SHOWN)
            .map(String::as_str)
            .collect();

        let _ = write!(
            prompt,
            "\n\nProgramming Languages: {}\nTechnical Skills: {}\nFrameworks: {}",
            skills.languages.join(", "),
            technical.join(", "),
            skills.frameworks.join(", ")
        );
    }

    fn push_experience(&self, prompt: &mut String) {
        if self.knowledge.experience.is_empty() {
            return;
        }
        prompt.push_str("\n\nWork Experience:");
        for exp in &self.knowledge.experience {
            let _ = write!(
                prompt,
                "\n• {} at {} ({})\n  {}",
                exp.position, exp.company, exp.duration, exp.description
            );
        }
    }

    fn push_projects(&self, prompt: &mut String) {
        if self.knowledge.projects.is_empty() {
            return;
        }
        prompt.push_str("\n\nKey Projects:");
        for proj in self.knowledge.projects.iter().take(PROJECTS_SHOWN) {
            let _ = write!(prompt, "\n• {}: {}", proj.name, proj.description);
        }
    }

    fn push_education(&self, prompt: &mut String) {
        if !self.knowledge.education.is_empty() {
            prompt.push_str("\n\nEducation:");
            for edu in &self.knowledge.education {
                let _ = write!(
                    prompt,
                    "\n• {}, {} ({})",
                    edu.degree, edu.institution, edu.duration
                );
            }
        }
        if !self.knowledge.certifications.is_empty() {
            prompt.push_str("\n\nCertifications:");
            for cert in &self.knowledge.certifications {
                let _ = write!(prompt, "\n• {} ({}, {})", cert.name, cert.issuer, cert.date);
            }
        }
    }

    fn push_history(&self, prompt: &mut String, history: &[ConversationTurn]) {
        let skip = history.len().saturating_sub(self.max_history_turns);
        let turns = &history[skip..];
        if turns.is_empty() {
            return;
        }

        prompt.push_str("\n\nPrevious conversation:");
        for turn in turns {
            let _ = write!(
                prompt,
                "\nQ: {}\nA: {}",
                turn.message,
                truncate_chars(&turn.response, HISTORY_ANSWER_MAX_CHARS)
            );
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
