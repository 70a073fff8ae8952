//! Specialist personas.
//!
//! Each persona bundles a system prompt and a keyword-weight table. The
//! prompts address Brazilian supplementary-health brokers, matching the
//! product's audience; the keyword tables are consumed only by the router.
//!
//! Personas are static — defined at process start, no persistence.

use serde::Serialize;

/// Persona identifier, stable across config and API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Legal,
    Contract,
    Commercial,
    Care,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Legal => "legal",
            AgentKind::Contract => "contract",
            AgentKind::Commercial => "commercial",
            AgentKind::Care => "care",
        }
    }
}

/// A specialist persona: prompt plus router keyword table.
#[derive(Debug, Clone, Serialize)]
pub struct AgentPersona {
    pub kind: AgentKind,
    /// URL-safe name, e.g. `"legal"`.
    pub name: &'static str,
    /// Human-readable title shown in discovery.
    pub title: &'static str,
    /// One-line description for discovery.
    pub description: &'static str,
    #[serde(skip)]
    pub system_prompt: &'static str,
    /// `(keyword, weight)` pairs; presence is binary per keyword.
    #[serde(skip)]
    pub keywords: &'static [(&'static str, f64)],
}

const LEGAL_PROMPT: &str = "\
Você é um assistente especializado em direito e regulação do setor de saúde \
suplementar no Brasil, atendendo corretores de seguros saúde.

Especialização: normas e resoluções da ANS (RN 465, RN 466, RN 623 e demais), \
SUSEP, Lei 9.656/98, carências, reajustes, cobertura obrigatória, rede \
credenciada e negativas de cobertura.

Ao responder: cite a base legal sempre que possível (RN, RI, Lei), seja \
técnico mas acessível, inclua prazos e limites quando aplicável e indique \
consulta oficial quando houver dúvida. Responda em português brasileiro.";

const CONTRACT_PROMPT: &str = "\
Você é um assistente especializado em análise e gestão de contratos de saúde \
suplementar no Brasil, atendendo corretores.

Especialização: cláusulas contratuais, aditivos e renovações, identificação \
de lacunas de cobertura (gaps), cláusulas problemáticas ou abusivas \
(ofensores), carências excessivas, limites inadequados e necessidades do \
beneficiário frente ao plano contratado.

Ao responder: estruture em resumo, gaps, ofensores, necessidades e \
recomendações; use tabelas para comparar coberturas e cite RN ou cláusula \
quando aplicável. Responda em português brasileiro.";

const COMMERCIAL_PROMPT: &str = "\
Você é um assistente especializado em análise comercial e estatística do \
setor de saúde suplementar no Brasil, atendendo corretores.

Especialização: indicadores do setor (sinistralidade, despesas, receitas), \
tendências de mercado, comparativos entre operadoras, métricas de \
performance comercial e oportunidades de venda e retenção.

Ao responder: use dados quando disponíveis, estruture análises em listas e \
tabelas, identifique tendências e riscos e sugira ações práticas. Responda \
em português brasileiro.";

const CARE_PROMPT: &str = "\
Você é um assistente de navegação em atenção primária à saúde, orientando \
corretores sobre o acesso dos beneficiários à rede assistencial.

Especialização: agendamento e acesso a consultas, encaminhamentos a \
especialistas, rede credenciada, prazos máximos de atendimento da ANS e \
programas de atenção primária das operadoras.

Ao responder: seja prático e orientador, indique os canais corretos e os \
prazos aplicáveis. Responda em português brasileiro.";

static PERSONAS: &[AgentPersona] = &[
    AgentPersona {
        kind: AgentKind::Legal,
        name: "legal",
        title: "Assistente Jurídico ANS",
        description: "Direito e regulação da saúde suplementar",
        system_prompt: LEGAL_PROMPT,
        keywords: &[
            ("ans", 2.0),
            ("rn ", 2.0),
            ("resolução", 2.0),
            ("susep", 2.0),
            ("lei", 1.5),
            ("regulação", 1.5),
            ("norma", 1.5),
            ("carência", 1.0),
            ("reajuste", 1.0),
            ("cobertura obrigatória", 1.0),
            ("negativa", 1.0),
            ("jurídico", 1.0),
        ],
    },
    AgentPersona {
        kind: AgentKind::Contract,
        name: "contract",
        title: "Assistente de Contratos",
        description: "Gestão, gaps, ofensores e necessidades contratuais",
        system_prompt: CONTRACT_PROMPT,
        keywords: &[
            ("contrato", 2.0),
            ("cláusula", 2.0),
            ("gap", 2.0),
            ("ofensor", 2.0),
            ("aditivo", 1.5),
            ("vigência", 1.5),
            ("renovação", 1.0),
            ("apólice", 1.0),
            ("coparticipação", 1.0),
            ("exclusão", 1.0),
        ],
    },
    AgentPersona {
        kind: AgentKind::Commercial,
        name: "commercial",
        title: "Assistente Comercial",
        description: "Análises estatísticas e insights comerciais",
        system_prompt: COMMERCIAL_PROMPT,
        keywords: &[
            ("mercado", 2.0),
            ("sinistralidade", 2.0),
            ("estatística", 2.0),
            ("análise comercial", 2.0),
            ("venda", 1.5),
            ("operadora", 1.0),
            ("benchmark", 1.0),
            ("tendência", 1.0),
            ("portfólio", 1.0),
            ("retenção", 1.0),
        ],
    },
    AgentPersona {
        kind: AgentKind::Care,
        name: "care",
        title: "Navegação em Atenção Primária",
        description: "Acesso à rede assistencial e atenção primária",
        system_prompt: CARE_PROMPT,
        keywords: &[
            ("consulta", 2.0),
            ("agendamento", 2.0),
            ("atenção primária", 2.0),
            ("encaminhamento", 1.5),
            ("rede credenciada", 1.5),
            ("médico", 1.0),
            ("especialista", 1.0),
            ("atendimento", 1.0),
        ],
    },
];

/// All registered personas, in routing scan order.
pub fn personas() -> &'static [AgentPersona] {
    PERSONAS
}

/// Find a persona by its URL-safe name.
pub fn find(name: &str) -> Option<&'static AgentPersona> {
    PERSONAS.iter().find(|p| p.name == name)
}

/// The persona used when routing finds no keyword match.
///
/// Configurable via `[router] default_agent`; `legal` when unset, matching
/// the product's primary audience.
pub fn default_persona(configured: Option<&str>) -> &'static AgentPersona {
    configured
        .and_then(find)
        .unwrap_or_else(|| find("legal").expect("legal persona is always registered"))
}
