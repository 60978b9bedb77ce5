//! Prompt templates.
//!
//! Pure functions embedding user input into fixed French instructions.
//! Callers validate that primary fields are non-blank before calling.

/// Substituted for a missing or blank QA context.
pub const NO_CONTEXT_FALLBACK: &str =
    "Aucun contexte spécifique n'est fourni. Réponds de manière générale.";

/// Concise summary of `text`, at most five sentences.
pub fn summarize_prompt(text: &str) -> String {
    format!(
        "Résume le texte suivant de manière concise en français, en 5 phrases maximum :\n\n{text}\n"
    )
}

/// First workflow step: summary of `text` that keeps the key information.
pub fn workflow_summary_prompt(text: &str) -> String {
    format!(
        "Tu es un assistant IA.
Résume le texte suivant en français, en 5 phrases maximum, en gardant les informations clés :

{text}
"
    )
}

/// Question answering with an optional caller-supplied context.
///
/// A `None` or whitespace-only context is replaced by [`NO_CONTEXT_FALLBACK`].
pub fn qa_prompt(question: &str, context: Option<&str>) -> String {
    let context = context
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(NO_CONTEXT_FALLBACK);

    format!(
        "
Tu es un assistant IA utile et précis. Tu dois répondre en français.

Contexte :
{context}

Question :
{question}

Réponse détaillée (mais concise) :
"
    )
}

/// Question answering restricted to retrieved context.
pub fn rag_qa_prompt(question: &str, context: &str) -> String {
    format!(
        "
Tu es un assistant IA spécialisé dans la compréhension d'une base de connaissances locale.
Utilise UNIQUEMENT le contexte fourni pour répondre, et réponds en français.

Contexte :
{context}

Question :
{question}

Réponse (claire, structurée, concise) :
"
    )
}

/// Bullet points derived from a summary.
pub fn bullets_prompt(summary: &str) -> String {
    format!(
        "À partir du résumé suivant, produis une liste de bullet points clairs en français.
Utilise un tiret '-' au début de chaque point.

Résumé :
{summary}
"
    )
}

/// Five comprehension questions derived from a summary and its bullet points.
pub fn questions_prompt(summary: &str, bullets: &str) -> String {
    format!(
        "À partir du contenu suivant (texte résumé et bullet points),
génère 5 questions pertinentes en français, pour vérifier la compréhension du sujet.

Résumé :
{summary}

Bullet points :
{bullets}
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_embeds_text_verbatim() {
        let prompt = summarize_prompt("Le chat dort.");
        assert!(prompt.contains("\n\nLe chat dort.\n"));
        assert!(prompt.contains("5 phrases maximum"));
    }

    #[test]
    fn workflow_summary_keeps_key_information() {
        let prompt = workflow_summary_prompt("Le chat dort.");
        assert!(prompt.starts_with("Tu es un assistant IA.\nRésume"));
        assert!(prompt.contains("en gardant les informations clés"));
        assert!(prompt.contains("\n\nLe chat dort.\n"));
        assert_ne!(prompt, summarize_prompt("Le chat dort."));
    }

    #[test]
    fn qa_without_context_uses_fallback() {
        for context in [None, Some(""), Some("   \n\t")] {
            let prompt = qa_prompt("Pourquoi ?", context);
            assert!(prompt.contains(NO_CONTEXT_FALLBACK));
            assert!(prompt.contains("Pourquoi ?"));
        }
    }

    #[test]
    fn qa_with_context_embeds_it_and_skips_fallback() {
        let prompt = qa_prompt("Qui dort ?", Some("  Le chat dort sur le canapé.  "));
        assert!(prompt.contains("  Le chat dort sur le canapé.  "));
        assert!(!prompt.contains(NO_CONTEXT_FALLBACK));
    }

    #[test]
    fn rag_prompt_restricts_to_context() {
        let prompt = rag_qa_prompt("Qui dort ?", "Le chat dort.");
        assert!(prompt.contains("UNIQUEMENT le contexte fourni"));
        assert!(prompt.contains("Le chat dort."));
        assert!(prompt.contains("Qui dort ?"));
    }

    #[test]
    fn follow_on_prompts_reference_prior_outputs() {
        let bullets = bullets_prompt("SUMMARY-1");
        assert!(bullets.contains("SUMMARY-1"));

        let questions = questions_prompt("SUMMARY-1", "- BULLET-1");
        assert!(questions.contains("SUMMARY-1"));
        assert!(questions.contains("- BULLET-1"));
        assert!(questions.find("SUMMARY-1") < questions.find("- BULLET-1"));
    }

    #[test]
    fn templates_are_deterministic() {
        assert_eq!(summarize_prompt("a"), summarize_prompt("a"));
        assert_eq!(qa_prompt("q", Some("c")), qa_prompt("q", Some("c")));
    }
}
