//! Builds every component crate from a loaded [`Config`] (§2 "control
//! flow", §6). One `App` per process; `serve` and `discord` share it.

use std::sync::Arc;

use sdforge_content::ContentClassifier;
use sdforge_gateway::SdGateway;
use sdforge_llm::{provider_for, LlmRouter, OllamaProvider};
use sdforge_lora::LoraCatalog;
use sdforge_persona::PersonalityChatCore;
use sdforge_queue::QueueEngine;
use sdforge_store::{CleanupPolicy, ConversationStore};
use sdforge_tools::ToolSurface;
use sdforge_types::SdForgeError;
use sdforge_upload::{CredentialStore, ExternalHostClient, GuestCredential, LocalFileSink, UploadRouter};

use crate::pipeline::UploadPipeline;
use crate::Config;

/// Every long-lived component, wired from [`Config`] (§4.9 composes
/// these behind `ToolSurface`; `discord` and `serve` both need them).
pub struct App {
    /// The tool catalog exposed over MCP.
    pub tools: Arc<ToolSurface>,
    /// The chat-turn algorithm, used by the Discord front-end.
    pub chat: Arc<PersonalityChatCore>,
    /// The background generation queue, kept alive for the process
    /// lifetime (dropping it aborts its worker task).
    pub queue: Arc<QueueEngine>,
}

impl App {
    /// Build every component from `config`. Fails with
    /// [`SdForgeError::Configuration`] (propagated from the first store
    /// that can't open its database) or a transport error if nothing
    /// else is wrong but a dependency is unreachable at construction
    /// time — stores only fail to open, they don't probe the network.
    pub async fn build(config: &Config) -> Result<Self, SdForgeError> {
        let mut gateway = SdGateway::new(config.sd_base_url.clone());
        if let Some((user, password)) = &config.sd_basic_auth {
            gateway = gateway.with_basic_auth(user.clone(), password.clone());
        }
        let gateway = Arc::new(gateway);

        let catalog = Arc::new(LoraCatalog::open(&config.lora_db_path).await?);
        let classifier = Arc::new(ContentClassifier::new());
        let store = Arc::new(
            ConversationStore::open(
                &config.conversation_db_path,
                if config.auto_clean_enabled { config.cleanup_policy } else { disabled_cleanup_policy() },
            )
            .await?,
        );

        let credentials = CredentialStore::open(&config.credentials_db_path).await?;
        let external = config.hosting_base_url.as_ref().map(|base_url| {
            ExternalHostClient::new(base_url.clone()).timeout(config.hosting_timeout)
        });
        let guest = config.hosting_guest_api_key.as_ref().map(|api_key| GuestCredential {
            api_key: api_key.clone(),
            album: config.hosting_guest_album.clone(),
        });
        let local = LocalFileSink::new(config.image_output_path.clone(), config.local_base_url());
        let upload = Arc::new(UploadRouter::new(credentials, external, guest, local));

        let censor = config.nsfw_filter_enabled.then(|| config.censor.clone());
        let pipeline = Arc::new(UploadPipeline::new(
            Arc::clone(&gateway),
            censor,
            Arc::clone(&upload),
            config.hosting_max_file_size,
            config.hosting_local_fallback,
        ));
        let queue = Arc::new(QueueEngine::new(Arc::clone(&gateway), pipeline));

        let tools = Arc::new(ToolSurface::new(
            Arc::clone(&gateway),
            Arc::clone(&catalog),
            Arc::clone(&classifier),
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&upload),
        ));

        let chat_provider = provider_for(
            &config.chat_provider,
            config.chat_api_key.as_deref(),
            config.chat_base_url.as_deref(),
            config.chat_model.as_deref(),
            Some(config.chat_timeout),
        );
        let mut image_assist = OllamaProvider::new();
        if let Some(base_url) = &config.image_assist_base_url {
            image_assist = image_assist.base_url(base_url.clone());
        }
        if let Some(model) = &config.image_assist_model {
            image_assist = image_assist.model(model.clone());
        }
        let llm = Arc::new(LlmRouter::new(chat_provider, image_assist));

        let chat = Arc::new(PersonalityChatCore::new(store, llm, Arc::clone(&tools)));

        Ok(Self { tools, chat, queue })
    }

    /// Build the MCP tool registry from the wired tool surface (§4.9).
    #[must_use]
    pub fn tool_registry(&self) -> sdforge_tools::ToolRegistry {
        Arc::clone(&self.tools).into_registry()
    }
}

fn disabled_cleanup_policy() -> CleanupPolicy {
    CleanupPolicy { threshold: i64::MAX, ..CleanupPolicy::default() }
}
