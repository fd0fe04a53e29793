//! CompletionClient - one chat-completion call per persona turn.
//!
//! Builds the request from history, renders a loading bubble, calls the
//! endpoint with retries, streams or replaces the bubble text, and turns
//! every failure into an inline error reply.

use crate::error::CompletionError;
use crate::request::{ChatCompletionResponse, SharedPrompts, build_request, error_message_from_body};
use crate::retry::{RetryExhausted, retry_with_delay};
use crate::stream::accumulate_deltas;
use crate::transport::{CompletionTransport, ReqwestTransport, TransportRequest};
use async_trait::async_trait;
use chorus_core::config::{ApiConfig, GroupChatConfig};
use chorus_core::persona::Persona;
use chorus_core::render::{BubbleUpdate, ChatRenderer};
use chorus_core::responder::{PersonaReply, PersonaResponder};
use chorus_core::selection::RoundTextScanner;
use chorus_core::session::{ChatMessage, MessageContent};
use chrono::Local;
use std::sync::Arc;

/// Text of the loading bubble before the first byte arrives.
pub const LOADING_TEXT: &str = "...";

/// Stored when a non-streamed response carries no content.
pub const NO_CONTENT_TEXT: &str = "未能获取响应内容";

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Drives an OpenAI-compatible completions endpoint for persona turns.
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    api: ApiConfig,
    prompts: SharedPrompts,
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, api: ApiConfig, prompts: SharedPrompts) -> Self {
        Self {
            transport,
            api,
            prompts,
        }
    }

    /// Client over `reqwest` using the config's API settings and prompts.
    pub fn from_config(config: &GroupChatConfig) -> Self {
        Self::new(
            Arc::new(ReqwestTransport::new()),
            config.api.clone(),
            SharedPrompts {
                user_prompt: config.chat.user_prompt.clone(),
                group_prompt: config.chat.group_prompt.clone(),
            },
        )
    }

    fn endpoint(&self) -> Result<String, CompletionError> {
        let base = self
            .api
            .base_url()
            .ok_or_else(|| CompletionError::Config("api.url is not set".to_string()))?;
        Ok(format!("{}{}", base.trim_end_matches('/'), COMPLETIONS_PATH))
    }

    async fn complete(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        renderer: &dyn ChatRenderer,
    ) -> Result<String, RetryExhausted> {
        let not_sent = |error| RetryExhausted { error, retries: 0 };

        let request = build_request(persona, history, &self.prompts, self.api.streaming, Local::now())
            .map_err(not_sent)?;
        let url = self.endpoint().map_err(not_sent)?;
        let body = serde_json::to_string(&request)
            .map_err(|e| not_sent(CompletionError::Encode(e.to_string())))?;

        let url = url.as_str();
        let body = body.as_str();
        let max_retries = self.api.max_retries;
        retry_with_delay(max_retries, self.api.retry_delay(), move |attempt| {
            if attempt > 0 {
                renderer.update_message(
                    &persona.name,
                    &format!("重新连接中(重试 {}/{})...", attempt, max_retries),
                    BubbleUpdate::Status,
                );
            }
            self.attempt(persona, url, body, renderer)
        })
        .await
    }

    async fn attempt(
        &self,
        persona: &Persona,
        url: &str,
        body: &str,
        renderer: &dyn ChatRenderer,
    ) -> Result<String, CompletionError> {
        tracing::debug!("[Completion] POST {} for {} ({})", url, persona.name, persona.model);
        let response = self
            .transport
            .post(TransportRequest {
                url: url.to_string(),
                api_key: self.api.key.clone(),
                body: body.to_string(),
                timeout: self.api.timeout(),
            })
            .await?;

        if !response.is_success() {
            let status = response.status;
            let status_text = response.status_text.clone();
            let error_body = response.into_text().await.unwrap_or_default();
            let message = error_message_from_body(&error_body)
                .or_else(|| Some(status_text).filter(|text| !text.is_empty()))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(CompletionError::Http { status, message });
        }

        if self.api.streaming {
            accumulate_deltas(response.body, |partial| {
                renderer.update_message(&persona.name, partial, BubbleUpdate::Partial);
            })
            .await
        } else {
            let raw = response.into_text().await?;
            let parsed: ChatCompletionResponse = serde_json::from_str(&raw)
                .map_err(|e| CompletionError::Stream(format!("invalid completion response: {}", e)))?;
            Ok(parsed.into_text().unwrap_or_else(|| NO_CONTENT_TEXT.to_string()))
        }
    }
}

#[async_trait]
impl PersonaResponder for CompletionClient {
    async fn respond(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        renderer: &dyn ChatRenderer,
    ) -> PersonaReply {
        tracing::info!("[Completion] Calling {} ({})", persona.name, persona.model);
        renderer.append_message(&persona.name, &MessageContent::text(LOADING_TEXT), false, true);

        match self.complete(persona, history, renderer).await {
            Ok(text) => {
                let scan = RoundTextScanner::scan_quit_marker(&text);
                if scan.opted_out {
                    tracing::info!("[Completion] {} opted out of the next round", persona.name);
                }
                renderer.update_message(&persona.name, &scan.text, BubbleUpdate::Final);
                PersonaReply::success(&persona.name, scan.text, scan.opted_out)
            }
            Err(RetryExhausted { error, retries }) => {
                tracing::error!(
                    "[Completion] {} failed after {} retries: {}",
                    persona.name,
                    retries,
                    error
                );
                let text = error.user_message(retries);
                renderer.update_message(&persona.name, &text, BubbleUpdate::Final);
                PersonaReply::error(&persona.name, text)
            }
        }
    }
}
