use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_models::MessagingConfig;

use crate::error::ProviderError;
use crate::models::{
    GraphErrorResponse, SendMessageResponse, SendReceipt, TemplateBody, TemplateComponent,
    TemplateLanguage, TemplateMessageRequest, TemplateParameter, TemplateParams,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends rendered reminder templates to a recipient.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_template_message(
        &self,
        config: &MessagingConfig,
        to: &str,
        params: &TemplateParams,
    ) -> Result<SendReceipt, ProviderError>;
}

/// WhatsApp Business Cloud API client.
/// Based on: https://developers.facebook.com/docs/whatsapp/cloud-api/reference/messages
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
}

impl WhatsAppClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = match Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Could not build WhatsApp HTTP client, using defaults without a timeout: {}", e);
                Client::new()
            }
        };

        Self {
            client,
            base_url: config.whatsapp_api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MessagingProvider for WhatsAppClient {
    /// POST /{phone_number_id}/messages
    async fn send_template_message(
        &self,
        config: &MessagingConfig,
        to: &str,
        params: &TemplateParams,
    ) -> Result<SendReceipt, ProviderError> {
        let url = format!("{}/{}/messages", self.base_url, config.phone_number_id);

        let request_body = TemplateMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "template",
            template: TemplateBody {
                name: &config.template_name_reminder,
                language: TemplateLanguage {
                    code: &config.template_lang_code,
                },
                components: vec![TemplateComponent {
                    component_type: "body",
                    parameters: params
                        .as_list()
                        .into_iter()
                        .map(|text| TemplateParameter {
                            parameter_type: "text",
                            text,
                        })
                        .collect(),
                }],
            },
        };

        debug!("Sending template '{}' to {} via {}", config.template_name_reminder, to, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.access_token)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("WhatsApp send failed: {} - {}", status, response_text);
            return Err(match serde_json::from_str::<GraphErrorResponse>(&response_text) {
                Ok(graph) => ProviderError::Api {
                    status: status.as_u16(),
                    code: graph.error.code,
                    message: graph.error.message,
                },
                Err(_) => ProviderError::Api {
                    status: status.as_u16(),
                    code: None,
                    message: response_text,
                },
            });
        }

        let sent: SendMessageResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse send response: {}", e))
        })?;

        let message = sent.messages.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("send response carried no message id".to_string())
        })?;

        info!("WhatsApp accepted message {} for {}", message.id, to);
        Ok(SendReceipt {
            provider_message_id: message.id,
        })
    }
}

/// Subscription handshake: returns the challenge to echo back when `mode`
/// is `subscribe` and `token` matches the configured verify token.
pub fn verify_subscription(
    config: &MessagingConfig,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Option<String> {
    if mode != Some("subscribe") {
        return None;
    }
    if config.webhook_verify_token.is_empty() || token != Some(config.webhook_verify_token.as_str()) {
        return None;
    }
    challenge.map(str::to_string)
}

/// Checks an `X-Hub-Signature-256` header (`sha256=<hex>`) against the
/// HMAC-SHA256 of the raw request body.
pub fn verify_signature(app_secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(signature) = signature_header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Lowercase hex of the HMAC-SHA256 of `body`, as the provider would send it.
pub fn sign_payload(app_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
