//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the contract-analysis LLM.
//! It implements the `ContractAnalysisService` port from the `core` crate,
//! talking to an OpenAI-compatible chat-completion endpoint (OpenRouter).

const SYSTEM_PROMPT: &str = "Tu es ClaireAI, expert en analyse de contrats d'assurance français. Tu réponds uniquement en JSON valide.";

const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Tu es ClaireAI, l'intelligence artificielle d'AssurScan, expert en analyse de contrats d'assurance français.

Ta mission : Analyser ce contrat d'assurance et extraire les informations clés au format JSON structuré.

ANALYSE CE CONTRAT :
---
{extracted_text}
---

RÉPONDS UNIQUEMENT AVEC CE JSON (aucun texte avant ou après) :
{
  "contractType": "type précis (auto/habitation/santé/vie/prévoyance/pro)",
  "mainCoverages": [
    "garantie 1",
    "garantie 2",
    "garantie 3"
  ],
  "amounts": {
    "prime_mensuelle": nombre,
    "franchise": nombre,
    "plafond_garantie": nombre
  },
  "exclusions": [
    "exclusion 1",
    "exclusion 2"
  ],
  "optimizationScore": nombre entre 0 et 100,
  "potentialSavings": nombre en euros par an,
  "coverageGaps": [
    {
      "title": "titre de la lacune",
      "description": "explication détaillée",
      "impact": "coût potentiel en cas de sinistre",
      "solution": "comment combler cette lacune"
    }
  ],
  "recommendations": [
    {
      "title": "titre de la recommandation",
      "description": "explication claire",
      "savings": nombre en euros,
      "priority": "haute/moyenne/basse"
    }
  ]
}

CRITÈRES D'ÉVALUATION DU SCORE :
- 90-100 : Excellent contrat, très bien optimisé
- 75-89 : Bon contrat, quelques améliorations possibles
- 50-74 : Contrat moyen, optimisations importantes disponibles
- 0-49 : Contrat sous-optimal, changement recommandé

SOIS PRÉCIS, FACTUEL ET ORIENTÉ ACTION."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use assurscan_core::domain::AnalysisResult;
use assurscan_core::ports::{ContractAnalysisService, PortError, PortResult};

/// Low randomness: the reply must be a machine-parseable JSON document.
const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 2000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContractAnalysisService` against an
/// OpenAI-compatible LLM. Holds `None` when no API key is configured, in
/// which case every call reports a missing-configuration error.
#[derive(Clone)]
pub struct OpenRouterAnalysisAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenRouterAnalysisAdapter {
    /// Creates a new `OpenRouterAnalysisAdapter`.
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }
}

/// Maps an `async-openai` failure onto the port taxonomy, keeping the
/// upstream status in the message where the library exposes one.
pub(crate) fn upstream_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::ApiError(api) => PortError::Upstream {
            status: 500,
            message: api.message,
        },
        other => PortError::Upstream {
            status: 502,
            message: other.to_string(),
        },
    }
}

/// Extracts the first balanced `{...}` block from a raw model reply.
///
/// The model is instructed to reply with bare JSON but occasionally wraps it
/// in prose; this scanner is string- and escape-aware so braces inside JSON
/// string values do not terminate the block early.
pub(crate) fn extract_json_block(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

//=========================================================================================
// `ContractAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContractAnalysisService for OpenRouterAnalysisAdapter {
    /// Analyzes a contract's extracted text. A single attempt per call.
    async fn analyze(&self, extracted_text: &str) -> PortResult<AnalysisResult> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PortError::MissingConfig("OPENROUTER_API_KEY".to_string()))?;

        let prompt = ANALYSIS_PROMPT_TEMPLATE.replace("{extracted_text}", extracted_text);

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(ANALYSIS_TEMPERATURE)
            .max_tokens(ANALYSIS_MAX_TOKENS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = client
            .chat()
            .create(request)
            .await
            .map_err(upstream_error)?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::InvalidPayload("Analysis LLM returned no text content".to_string())
            })?;

        parse_analysis_reply(&content)
    }
}

/// Parses the model's raw reply into a typed analysis record.
pub(crate) fn parse_analysis_reply(content: &str) -> PortResult<AnalysisResult> {
    let block = extract_json_block(content).ok_or_else(|| {
        PortError::InvalidPayload("No JSON object found in analysis reply".to_string())
    })?;

    serde_json::from_str::<AnalysisResult>(block)
        .map_err(|e| PortError::InvalidPayload(format!("Malformed analysis JSON: {}", e)))
}
