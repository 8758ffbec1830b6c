use async_trait::async_trait;

/// Language-model side of the service.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Picks the template file name that best matches a free-text request.
    async fn best_template_match(
        &self,
        user_query: &str,
        templates: &[String],
    ) -> anyhow::Result<String>;

    /// One `(placeholder, question)` pair per well-formed line of the model answer.
    async fn questions_for_placeholders(
        &self,
        placeholders: &[String],
    ) -> anyhow::Result<Vec<(String, String)>>;
}

pub const QUESTION_SEPARATOR: &str = ":::";

pub const TEMPLATE_MATCH_PROMPT: &str = r#"User wants: "{{user_query}}"
Templates available: {{templates}}

Return ONLY the best matching file name (one filename exactly as it appears in the list).
"#;

pub const PLACEHOLDER_QUESTIONS_PROMPT: &str = r#"The document contains these fillable placeholders:
{{placeholders}}

For each placeholder, generate:
- A clear, short question to ask the user (in German or English depending on placeholder language).
- Do NOT translate placeholders.

Return output as lines in the form:
placeholder:::question
"#;

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

/// JSON array literal, e.g. `["Vorname", "Nachname"]`.
pub fn list_literal(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| items.join(", "))
}

pub fn template_match_prompt(user_query: &str, templates: &[String]) -> String {
    render_template(
        TEMPLATE_MATCH_PROMPT,
        &[
            ("user_query", user_query),
            ("templates", &list_literal(templates)),
        ],
    )
}

pub fn placeholder_questions_prompt(placeholders: &[String]) -> String {
    render_template(
        PLACEHOLDER_QUESTIONS_PROMPT,
        &[("placeholders", &list_literal(placeholders))],
    )
}

/// Lines without the separator are dropped; the split happens at the first separator.
pub fn parse_question_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(QUESTION_SEPARATOR))
        .map(|(p, q)| (p.trim().to_string(), q.trim().to_string()))
        .collect()
}
