pub mod ports;
pub mod proxy_client;

pub use ports::{ByteStream, CompletionError, CompletionServiceTrait, ProxyClient};
pub use proxy_client::HttpProxyClient;

use crate::chats::{ChatId, MessageId, Settings, SettingsRepository, GENERAL_SETTINGS_ID};
use crate::relay::{RelayOutcome, StreamRelay};
use async_trait::async_trait;
use inference_providers::{ChatCompletionParams, ChatMessage};
use std::sync::Arc;

/// Client-side orchestrator: resolves the model, calls the proxy and hands
/// streamed bodies to the relay.
pub struct CompletionServiceImpl {
    proxy: Arc<dyn ProxyClient>,
    settings: Arc<dyn SettingsRepository>,
    relay: StreamRelay,
    default_model: String,
}

impl CompletionServiceImpl {
    pub fn new(
        proxy: Arc<dyn ProxyClient>,
        settings: Arc<dyn SettingsRepository>,
        relay: StreamRelay,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            proxy,
            settings,
            relay,
            default_model: default_model.into(),
        }
    }

    /// The `general` settings model if set, otherwise the configured default.
    /// Read on every call so settings changes apply to the next request.
    async fn resolve_model(&self) -> Result<String, CompletionError> {
        let configured = self
            .get_settings()
            .await?
            .and_then(|settings| settings.model_identifier)
            .filter(|model| !model.trim().is_empty());

        let model = configured.unwrap_or_else(|| self.default_model.clone());
        if model.trim().is_empty() {
            return Err(CompletionError::Validation(
                "No model configured".to_string(),
            ));
        }
        Ok(model)
    }

    async fn build_params(
        &self,
        messages: Vec<ChatMessage>,
        stream: bool,
    ) -> Result<ChatCompletionParams, CompletionError> {
        Ok(ChatCompletionParams {
            model: self.resolve_model().await?,
            messages,
            stream: stream.then_some(true),
        })
    }
}

#[async_trait]
impl CompletionServiceTrait for CompletionServiceImpl {
    async fn create_chat_completion(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<serde_json::Value, CompletionError> {
        let params = self.build_params(messages, false).await?;
        tracing::info!(model = %params.model, message_count = params.messages.len(), "Requesting chat completion");

        self.proxy.chat(&params).await.inspect_err(|e| {
            tracing::error!(
                model = %params.model,
                message_count = params.messages.len(),
                error = %e,
                "Chat completion failed"
            );
        })
    }

    async fn create_stream_chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<RelayOutcome, CompletionError> {
        let params = self.build_params(messages, true).await?;
        let model = params.model.clone();
        let message_count = params.messages.len();
        tracing::info!(%model, message_count, %chat_id, %message_id, "Requesting streaming chat completion");

        let result = match self.proxy.stream_chat(&params).await {
            Ok(body) => self.relay.relay(chat_id, message_id, body).await,
            Err(e) => Err(e),
        };

        result.inspect_err(|e| {
            tracing::error!(%model, message_count, %chat_id, %message_id, error = %e, "Streaming chat completion failed");
        })
    }

    async fn check_provider_key(&self) -> Result<serde_json::Value, CompletionError> {
        self.create_chat_completion(vec![ChatMessage::user("hello")])
            .await
    }

    async fn get_settings(&self) -> Result<Option<Settings>, CompletionError> {
        self.settings
            .get_settings(GENERAL_SETTINGS_ID)
            .await
            .map_err(|e| CompletionError::Persistence(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::memory::InMemoryChatStore;
    use crate::chats::{ChatRepository, MessageRepository};
    use crate::completions::ports::MockProxyClient;
    use crate::tokens::BpeTokenCounter;
    use bytes::Bytes;
    use futures::stream;
    use inference_providers::MessageRole;
    use serde_json::json;

    fn service(proxy: MockProxyClient, store: Arc<InMemoryChatStore>, default_model: &str) -> CompletionServiceImpl {
        let counter = Arc::new(BpeTokenCounter::r50k().unwrap());
        let relay = StreamRelay::new(store.clone(), store.clone(), counter);
        CompletionServiceImpl::new(Arc::new(proxy), store, relay, default_model)
    }

    fn general(model: Option<&str>) -> Settings {
        Settings {
            id: GENERAL_SETTINGS_ID.to_string(),
            model_identifier: model.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_uses_default_model_without_settings() {
        let mut proxy = MockProxyClient::new();
        proxy
            .expect_chat()
            .withf(|params| params.model == "gpt-3.5-turbo" && params.stream.is_none())
            .times(1)
            .returning(|_| Ok(json!({"id": "chatcmpl-1"})));
        let store = Arc::new(InMemoryChatStore::new());

        let body = service(proxy, store, "gpt-3.5-turbo")
            .create_chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap();

        assert_eq!(body, json!({"id": "chatcmpl-1"}));
    }

    #[tokio::test]
    async fn test_settings_model_read_on_every_call() {
        let mut proxy = MockProxyClient::new();
        let mut seq = mockall::Sequence::new();
        proxy
            .expect_chat()
            .withf(|params| params.model == "gpt-4")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({})));
        proxy
            .expect_chat()
            .withf(|params| params.model == "gpt-4o")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({})));
        let store = Arc::new(InMemoryChatStore::new());
        store.put_settings(general(Some("gpt-4"))).await;
        let service = service(proxy, store.clone(), "gpt-3.5-turbo");

        service.create_chat_completion(vec![]).await.unwrap();
        store.put_settings(general(Some("gpt-4o"))).await;
        service.create_chat_completion(vec![]).await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_settings_model_falls_back_to_default() {
        let mut proxy = MockProxyClient::new();
        proxy
            .expect_chat()
            .withf(|params| params.model == "gpt-3.5-turbo")
            .times(1)
            .returning(|_| Ok(json!({})));
        let store = Arc::new(InMemoryChatStore::new());
        store.put_settings(general(Some("  "))).await;

        service(proxy, store, "gpt-3.5-turbo")
            .create_chat_completion(vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_model_fails_before_network() {
        let mut proxy = MockProxyClient::new();
        proxy.expect_chat().times(0);
        proxy.expect_stream_chat().times(0);
        let store = Arc::new(InMemoryChatStore::new());
        let service = service(proxy, store, "");

        let err = service
            .create_chat_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Validation(_)));

        let err = service
            .create_stream_chat_completion(vec![], ChatId::new(), MessageId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_stream_completion_relays_into_store() {
        let mut proxy = MockProxyClient::new();
        proxy
            .expect_stream_chat()
            .withf(|params| params.stream == Some(true))
            .times(1)
            .returning(|_| {
                let parts = [
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                    "data: [DONE]\n\n",
                ];
                let body: ByteStream = Box::pin(stream::iter(
                    parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))),
                ));
                Ok(body)
            });
        let store = Arc::new(InMemoryChatStore::new());
        let chat_id = ChatId::new();
        let message_id = MessageId::new();
        store.create_chat(chat_id).await.unwrap();

        let outcome = service(proxy, store.clone(), "gpt-3.5-turbo")
            .create_stream_chat_completion(vec![ChatMessage::user("hi")], chat_id, message_id)
            .await
            .unwrap();

        assert_eq!(outcome.content, "Hello");
        assert!(outcome.completed);
        let message = store.get_message(message_id).await.unwrap().unwrap();
        assert_eq!(message.content, "Hello");
        let chat = store.get_chat(chat_id).await.unwrap().unwrap();
        assert_eq!(chat.total_tokens, outcome.tokens);
    }

    #[tokio::test]
    async fn test_stream_rejected_by_proxy_leaves_store_untouched() {
        let mut proxy = MockProxyClient::new();
        proxy.expect_stream_chat().times(1).returning(|_| {
            Err(CompletionError::Provider {
                status: Some(401),
                details: json!({"error": "An error occurred while processing the request"}),
            })
        });
        let store = Arc::new(InMemoryChatStore::new());
        let message_id = MessageId::new();

        let err = service(proxy, store.clone(), "gpt-3.5-turbo")
            .create_stream_chat_completion(vec![], ChatId::new(), message_id)
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Provider { status: Some(401), .. }));
        assert!(store.get_message(message_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_provider_key_sends_single_hello() {
        let mut proxy = MockProxyClient::new();
        proxy
            .expect_chat()
            .withf(|params| {
                params.messages.len() == 1
                    && params.messages[0].role == MessageRole::User
                    && params.messages[0].content == "hello"
            })
            .times(1)
            .returning(|_| Ok(json!({"choices": []})));
        let store = Arc::new(InMemoryChatStore::new());

        service(proxy, store, "gpt-3.5-turbo")
            .check_provider_key()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_provider_key_surfaces_failure() {
        let mut proxy = MockProxyClient::new();
        proxy.expect_chat().times(1).returning(|_| {
            Err(CompletionError::Provider {
                status: Some(401),
                details: json!("invalid key"),
            })
        });
        let store = Arc::new(InMemoryChatStore::new());

        let err = service(proxy, store, "gpt-3.5-turbo")
            .check_provider_key()
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Provider { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn test_get_settings_returns_general_record() {
        let store = Arc::new(InMemoryChatStore::new());
        store.put_settings(general(Some("gpt-4"))).await;

        let settings = service(MockProxyClient::new(), store, "gpt-3.5-turbo")
            .get_settings()
            .await
            .unwrap();

        assert_eq!(settings, Some(general(Some("gpt-4"))));
    }
}
