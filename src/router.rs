//! Keyword-weight persona router.
//!
//! Scores a free-text query against each persona's keyword table and picks
//! the highest-scoring persona. A keyword counts once no matter how often it
//! appears; matching is a case-insensitive substring test over the lowered
//! query. Stateless and pure: same query and same tables always yield the
//! same persona.

use crate::agents::{personas, AgentPersona};

/// Sum of weights for keywords present in the (already lowered) query.
///
/// Presence is binary per keyword — repeats add nothing.
fn keyword_score(lowered_query: &str, keywords: &[(&str, f64)]) -> f64 {
    keywords
        .iter()
        .filter(|(kw, _)| lowered_query.contains(kw))
        .map(|(_, weight)| weight)
        .sum()
}

/// Select the persona for a query.
///
/// The persona with the strictly highest score wins; on equal top scores the
/// earliest persona in registry order is kept. When no keyword matches at
/// all, the given default persona is returned.
pub fn route<'a>(query: &str, default: &'a AgentPersona) -> &'a AgentPersona {
    let lowered = query.to_lowercase();

    let mut best: Option<(&'a AgentPersona, f64)> = None;
    for persona in personas() {
        let score = keyword_score(&lowered, persona.keywords);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((persona, score)),
        }
    }

    match best {
        Some((persona, score)) if score > 0.0 => persona,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{default_persona, AgentKind};

    #[test]
    fn test_legal_keywords_select_legal() {
        let p = route(
            "Qual a carência máxima segundo a RN 465 da ANS?",
            default_persona(Some("care")),
        );
        assert_eq!(p.kind, AgentKind::Legal);
    }

    #[test]
    fn test_contract_keywords_select_contract() {
        let p = route(
            "Analise este contrato e aponte gaps e ofensores nas cláusulas",
            default_persona(None),
        );
        assert_eq!(p.kind, AgentKind::Contract);
    }

    #[test]
    fn test_commercial_keywords_select_commercial() {
        let p = route(
            "Como está a sinistralidade do mercado este ano?",
            default_persona(None),
        );
        assert_eq!(p.kind, AgentKind::Commercial);
    }

    #[test]
    fn test_care_keywords_select_care() {
        let p = route(
            "Como fazer o agendamento de consulta com especialista?",
            default_persona(None),
        );
        assert_eq!(p.kind, AgentKind::Care);
    }

    #[test]
    fn test_no_keywords_fall_back_to_default() {
        let p = route("bom dia, tudo bem?", default_persona(Some("commercial")));
        assert_eq!(p.kind, AgentKind::Commercial);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        // "contrato" repeated should not outscore a multi-keyword legal query.
        let p = route(
            "contrato contrato contrato; qual resolução da ANS regula a lei de reajuste e carência?",
            default_persona(None),
        );
        assert_eq!(p.kind, AgentKind::Legal);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let p = route("SINISTRALIDADE do MERCADO", default_persona(None));
        assert_eq!(p.kind, AgentKind::Commercial);
    }

    #[test]
    fn test_deterministic() {
        let q = "análise de cláusula de coparticipação no contrato";
        let a = route(q, default_persona(None)).kind;
        let b = route(q, default_persona(None)).kind;
        assert_eq!(a, b);
    }
}
