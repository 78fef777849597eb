//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the chat assistant LLM.
//! It implements the `ChatAssistantService` port from the `core` crate,
//! answering user questions scoped to one analyzed contract.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use assurscan_core::domain::{ChatRole, ChatTurn, ContractSummary};
use assurscan_core::ports::{ChatAssistantService, PortError, PortResult};

use super::analysis_llm::upstream_error;

/// Only the most recent turns are sent upstream; older context is dropped.
const MAX_HISTORY_TURNS: usize = 10;
/// More creative latitude than the analysis call, but shorter replies.
const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 500;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatAssistantService` against an
/// OpenAI-compatible LLM. Holds `None` when no API key is configured.
#[derive(Clone)]
pub struct OpenRouterChatAdapter {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenRouterChatAdapter {
    /// Creates a new `OpenRouterChatAdapter`.
    pub fn new(client: Option<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Prompt and Message Assembly
//=========================================================================================

fn fmt_amount(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => "non communiqué".to_string(),
    }
}

/// Builds the French system prompt embedding the contract's analysis context.
pub(crate) fn build_system_prompt(contract: &ContractSummary) -> String {
    format!(
        r#"Tu es ClaireAI, l'assistant virtuel intelligent d'AssurScan, expert en assurance française.

CONTEXTE DU CONTRAT DE L'UTILISATEUR :
Type : {}
Garanties : {}
Montants : Prime {}€/mois, Franchise {}€
Exclusions : {}
Score : {}/100
Économies potentielles : {}€/an
Lacunes : {} détectées

INSTRUCTIONS :
- Réponds de manière claire, précise et pédagogique en français
- Base-toi UNIQUEMENT sur le contexte du contrat fourni
- Si tu ne sais pas, dis-le honnêtement et propose de contacter un expert humain
- Utilise des exemples concrets
- Reste professionnel mais accessible
- Si la question concerne des économies, sois précis sur les montants
- Si la question concerne une garantie, explique clairement ce qui est couvert ou non

RÉPONDS EN 2-3 PARAGRAPHES MAXIMUM."#,
        contract.contract_type,
        contract.main_coverages.join(", "),
        fmt_amount(contract.amounts.prime_mensuelle),
        fmt_amount(contract.amounts.franchise),
        contract.exclusions.join(", "),
        contract.optimization_score,
        contract.potential_savings,
        contract.coverage_gap_count,
    )
}

/// Keeps only the most recent `MAX_HISTORY_TURNS` turns, oldest first.
pub(crate) fn windowed_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    &history[start..]
}

/// Assembles the outgoing message list: system prompt, windowed history in
/// chronological order, then the new user message.
pub(crate) fn assemble_messages(
    system_prompt: &str,
    history: &[ChatTurn],
    user_message: &str,
) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);

    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );

    for turn in windowed_history(history) {
        let message = match turn.role {
            ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        };
        messages.push(message);
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );

    Ok(messages)
}

//=========================================================================================
// `ChatAssistantService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatAssistantService for OpenRouterChatAdapter {
    /// Answers a user message within the context of one analyzed contract.
    async fn reply(
        &self,
        user_message: &str,
        contract: &ContractSummary,
        history: &[ChatTurn],
    ) -> PortResult<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PortError::MissingConfig("OPENROUTER_API_KEY".to_string()))?;

        let system_prompt = build_system_prompt(contract);
        let messages = assemble_messages(&system_prompt, history, user_message)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(CHAT_TEMPERATURE)
            .max_tokens(CHAT_MAX_TOKENS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

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
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| PortError::InvalidPayload("empty response".to_string()))?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assurscan_core::domain::Amounts;

    fn turn(role: ChatRole, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
        }
    }

    fn summary() -> ContractSummary {
        ContractSummary {
            contract_type: "auto".to_string(),
            main_coverages: vec!["Responsabilité civile".to_string(), "Vol".to_string()],
            amounts: Amounts {
                prime_mensuelle: Some(45.0),
                franchise: Some(350.0),
                plafond_garantie: Some(50_000.0),
            },
            exclusions: vec!["Usage professionnel".to_string()],
            optimization_score: 72,
            potential_savings: 240.0,
            coverage_gap_count: 2,
        }
    }

    #[test]
    fn system_prompt_embeds_contract_context() {
        let prompt = build_system_prompt(&summary());
        assert!(prompt.contains("Type : auto"));
        assert!(prompt.contains("Responsabilité civile, Vol"));
        assert!(prompt.contains("Prime 45€/mois"));
        assert!(prompt.contains("Score : 72/100"));
        assert!(prompt.contains("240€/an"));
        assert!(prompt.contains("Lacunes : 2 détectées"));
    }

    #[test]
    fn system_prompt_handles_missing_amounts() {
        let mut contract = summary();
        contract.amounts = Amounts::default();
        let prompt = build_system_prompt(&contract);
        assert!(prompt.contains("Prime non communiqué€/mois"));
    }

    #[test]
    fn twelve_turns_are_windowed_to_the_last_ten_in_order() {
        let history: Vec<ChatTurn> = (0..12)
            .map(|i| {
                let role = if i % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                };
                turn(role, &format!("turn {}", i))
            })
            .collect();

        let window = windowed_history(&history);
        assert_eq!(window.len(), 10);
        assert_eq!(window.first().unwrap().content, "turn 2");
        assert_eq!(window.last().unwrap().content, "turn 11");
    }

    #[test]
    fn short_history_is_kept_whole() {
        let history = vec![turn(ChatRole::User, "q"), turn(ChatRole::Assistant, "a")];
        assert_eq!(windowed_history(&history).len(), 2);
    }

    #[test]
    fn assembled_messages_wrap_history_with_system_and_user() {
        let history: Vec<ChatTurn> = (0..12)
            .map(|i| {
                let role = if i % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                };
                turn(role, &format!("turn {}", i))
            })
            .collect();

        let messages = assemble_messages("system", &history, "ma question").unwrap();
        // system + 10 windowed turns + new user message
        assert_eq!(messages.len(), 12);
        assert!(matches!(
            messages.first().unwrap(),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            messages.get(1).unwrap(),
            ChatCompletionRequestMessage::User(_)
        ));
        assert!(matches!(
            messages.last().unwrap(),
            ChatCompletionRequestMessage::User(_)
        ));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_calling_upstream() {
        let adapter = OpenRouterChatAdapter::new(None, "openai/gpt-4o".to_string());
        let err = adapter
            .reply("Que couvre mon contrat ?", &summary(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::MissingConfig(_)));
    }
}
