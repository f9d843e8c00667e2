//! OpenAI-compatible chat completions client.
//!
//! xAI and OpenAI accept the same `POST {base}/chat/completions` body; the
//! only per-provider differences are the base URL, the model names, and
//! whether `response_format` is honoured (see
//! [`AiProvider::json_mode_for`](crate::core::provider::AiProvider::json_mode_for)).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::http::truncate;
use crate::core::provider::{Capability, ProviderDescriptor};
use crate::error::{BimcostError, Result};

/// Image attached to a vision request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    /// `data:` URL form accepted by both providers.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Provider-neutral prompt.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub image: Option<ImageInput>,
    /// Ask for a JSON object response where the provider supports it.
    pub json: bool,
    pub max_tokens: Option<u32>,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(
    descriptor: &'a ProviderDescriptor,
    capability: Capability,
    prompt: &Prompt,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !prompt.system.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: MessageContent::Text(prompt.system.clone()),
        });
    }

    let user = match &prompt.image {
        Some(image) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: prompt.user.clone(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                    detail: "high",
                },
            },
        ]),
        None => MessageContent::Text(prompt.user.clone()),
    };
    messages.push(ChatMessage {
        role: "user",
        content: user,
    });

    let json_mode = prompt.json && descriptor.provider.json_mode_for(capability);
    ChatRequest {
        model: descriptor.model_for(capability),
        messages,
        response_format: json_mode.then_some(ResponseFormat {
            kind: "json_object",
        }),
        max_tokens: prompt.max_tokens,
    }
}

/// Send one chat completion and return the first choice's text.
///
/// No retries and no timeout of its own beyond the client's; the gateway
/// bounds the whole call.
///
/// # Errors
///
/// Returns `ProviderApi` for non-success statuses or an empty response,
/// `Network` for transport failures.
pub async fn complete(
    client: &Client,
    descriptor: &ProviderDescriptor,
    capability: Capability,
    prompt: &Prompt,
) -> Result<String> {
    let provider = descriptor.provider.cli_name();
    let url = format!("{}/chat/completions", descriptor.base_url);
    let body = build_request(descriptor, capability, prompt);

    tracing::debug!(
        provider,
        model = body.model,
        json = body.response_format.is_some(),
        "Sending chat completion"
    );

    let response = client
        .post(&url)
        .bearer_auth(descriptor.api_key())
        .json(&body)
        .send()
        .await
        .map_err(|e| BimcostError::Network(format!("{provider}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(BimcostError::ProviderApi {
            provider: provider.to_string(),
            status_code: Some(status.as_u16()),
            message: truncate(&text, 300),
        });
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| BimcostError::ParseResponse(format!("{provider} chat response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| BimcostError::ProviderApi {
            provider: provider.to_string(),
            status_code: None,
            message: "response contained no message content".to_string(),
        })
}
