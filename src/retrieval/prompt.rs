/// Persona and label framing around a rendered context block.
///
/// Produces `"<persona>. Answer: <query>\n<label>:\n<context>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub persona: String,
    pub context_label: String,
}

pub const DEFAULT_PERSONA: &str = "You are a cybersecurity expert";
pub const DEFAULT_CONTEXT_LABEL: &str = "CVE data";

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            context_label: DEFAULT_CONTEXT_LABEL.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(persona: impl Into<String>, context_label: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            context_label: context_label.into(),
        }
    }

    pub fn compose(&self, query: &str, context: &str) -> String {
        format!(
            "{}. Answer: {}\n{}:\n{}",
            self.persona.trim_end_matches('.'),
            query.trim(),
            self.context_label,
            context
        )
    }
}
