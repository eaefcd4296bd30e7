//! The knowledge base: static, structured facts used as prompt material.
//!
//! Loaded once at startup, shared read-only (usually behind an `Arc`),
//! never mutated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    /// Greeting shown when a client opens a new conversation.
    #[serde(default)]
    pub welcome_message: String,
    /// Suggested first questions.
    #[serde(default)]
    pub conversation_starters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub company: String,
    pub position: String,
    pub duration: String,
    #[serde(default)]
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// Skill lists, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skills {
    #[serde(default)]
    pub technical: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub duration: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<String>,
    #[serde(default)]
    pub relevant_coursework: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl KnowledgeBase {
    /// The built-in placeholder profile, used when no knowledge file is
    /// configured.
    pub fn sample() -> Self {
        Self {
            personal_info: PersonalInfo {
                name: "Your Name".into(),
                title: "Full Stack Developer & AI Engineer".into(),
                email: "your.email@example.com".into(),
                phone: Some("+1 (555) 123-4567".into()),
                location: "San Francisco, CA".into(),
                summary: "Passionate full-stack developer with expertise in AI/ML, modern web \
                          technologies, and cloud architecture. Experienced in building scalable \
                          applications and implementing cutting-edge AI solutions."
                    .into(),
                linked_in: Some("https://linkedin.com/in/yourprofile".into()),
                github: Some("https://github.com/yourusername".into()),
                portfolio: Some("https://yourportfolio.com".into()),
            },
            experience: vec![
                Experience {
                    company: "Tech Innovation Inc.".into(),
                    position: "Senior Full Stack Developer".into(),
                    duration: "2022 - Present".into(),
                    location: "San Francisco, CA".into(),
                    description: "Lead development of AI-powered web applications and \
                                  microservices architecture"
                        .into(),
                    achievements: strings(&[
                        "Built and deployed 5+ production AI applications serving 10,000+ users",
                        "Implemented microservices architecture reducing system latency by 40%",
                        "Led a team of 4 developers in agile development practices",
                    ]),
                    technologies: strings(&[
                        "React", "Node.js", "Python", "Docker", "AWS", "PostgreSQL",
                    ]),
                },
                Experience {
                    company: "StartupXYZ".into(),
                    position: "Full Stack Developer".into(),
                    duration: "2020 - 2022".into(),
                    location: "San Francisco, CA".into(),
                    description: "Developed scalable web applications and implemented DevOps \
                                  practices"
                        .into(),
                    achievements: strings(&[
                        "Implemented CI/CD pipelines reducing deployment time by 60%",
                        "Developed RESTful APIs handling 1M+ requests daily",
                    ]),
                    technologies: strings(&["React", "Node.js", "Express", "MongoDB", "Docker"]),
                },
            ],
            skills: Skills {
                technical: strings(&[
                    "JavaScript/TypeScript",
                    "Python",
                    "Java",
                    "Go",
                    "Rust",
                    "React",
                    "Next.js",
                    "Vue.js",
                    "Angular",
                    "Svelte",
                    "Node.js",
                    "Express",
                    "FastAPI",
                    "PostgreSQL",
                    "Docker",
                    "Kubernetes",
                    "Machine Learning",
                    "LLMs",
                ]),
                languages: strings(&[
                    "JavaScript",
                    "TypeScript",
                    "Python",
                    "Java",
                    "Go",
                    "Rust",
                    "SQL",
                ]),
                frameworks: strings(&[
                    "React",
                    "Next.js",
                    "Node.js",
                    "Express",
                    "FastAPI",
                    "Django",
                    "Spring Boot",
                ]),
                tools: strings(&["Git", "Docker", "Kubernetes", "GitHub Actions", "Terraform"]),
                databases: strings(&["PostgreSQL", "MongoDB", "Redis", "SQLite"]),
            },
            education: vec![Education {
                institution: "University of California, Berkeley".into(),
                degree: "Bachelor of Science in Computer Science".into(),
                duration: "2016 - 2020".into(),
                location: "Berkeley, CA".into(),
                gpa: Some("3.8/4.0".into()),
                relevant_coursework: strings(&[
                    "Data Structures and Algorithms",
                    "Machine Learning",
                    "Database Systems",
                ]),
            }],
            projects: vec![
                Project {
                    name: "AI-Powered Content Generator".into(),
                    description: "Full-stack web application that generates marketing content \
                                  with LLMs, with user authentication, payments, and an \
                                  analytics dashboard"
                        .into(),
                    technologies: strings(&["React", "Node.js", "PostgreSQL", "Redis", "Docker"]),
                    github: Some("https://github.com/yourusername/ai-content-generator".into()),
                    demo: None,
                    achievements: strings(&["Processed 50,000+ content generation requests"]),
                },
                Project {
                    name: "Microservices E-commerce Platform".into(),
                    description: "Scalable e-commerce platform built with microservices, \
                                  featuring catalog, orders, and payment integration"
                        .into(),
                    technologies: strings(&["React", "Node.js", "MongoDB", "Kubernetes", "AWS"]),
                    github: Some("https://github.com/yourusername/ecommerce-microservices".into()),
                    demo: None,
                    achievements: strings(&["Handled 100,000+ transactions with 99.9% uptime"]),
                },
                Project {
                    name: "Real-time Chat Application".into(),
                    description: "Chat application with WebSocket support, file sharing, and \
                                  AI-powered message suggestions"
                        .into(),
                    technologies: strings(&["React", "Node.js", "Socket.io", "Redis"]),
                    github: Some("https://github.com/yourusername/realtime-chat".into()),
                    demo: None,
                    achievements: strings(&["Supports 1,000+ concurrent users"]),
                },
            ],
            certifications: vec![
                Certification {
                    name: "AWS Certified Solutions Architect".into(),
                    issuer: "Amazon Web Services".into(),
                    date: "2023".into(),
                    credential_id: None,
                },
                Certification {
                    name: "Google Cloud Professional Cloud Architect".into(),
                    issuer: "Google Cloud".into(),
                    date: "2022".into(),
                    credential_id: None,
                },
            ],
            welcome_message: "Hi! I'm an AI assistant that can tell you all about my background, \
                              skills, and experience. Feel free to ask me anything about my \
                              projects, technical expertise, or professional experience!"
                .into(),
            conversation_starters: strings(&[
                "What's your experience with AI and machine learning?",
                "Tell me about your most challenging project",
                "What technologies do you specialize in?",
                "What programming languages are you most proficient in?",
                "Can you describe your experience with cloud platforms?",
            ]),
        }
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::sample()
    }
}
