//! [`PersonalityChatCore`]: the single-call "chat with context" turn
//! that handles personality, history, and image-intent detection
//! (§4.8).

use std::sync::Arc;

use sdforge_llm::{ChatMessage, ChatRole, LlmRouter};
use sdforge_store::{ConversationStore, ModerationStatus, Role};
use sdforge_tools::ToolSurface;
use sdforge_types::StylePreference;

use crate::intent::detect_image_intent;
use crate::thinking::strip_thinking;

/// How many chat turns a user may start per minute (§4.5 `check_rate`,
/// action `"chat"`).
const CHAT_RATE_LIMIT_PER_MINUTE: i64 = 10;

fn store_role_to_chat_role(role: Role) -> ChatRole {
    match role {
        Role::System => ChatRole::System,
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    }
}

/// One chat turn's input (§4.8).
pub struct ChatTurnRequest {
    /// The user sending the message.
    pub user_id: String,
    /// The isolated conversation surface (§4.5 "Context keying").
    pub context_key: String,
    /// The raw message text.
    pub message: String,
}

/// The result of a chat turn (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurnOutcome {
    /// Blocked by moderation or rate limiting before anything ran.
    Refused {
        /// Human-readable reason.
        reason: String,
        /// Seconds until the user may retry, when known.
        retry_after_seconds: Option<i64>,
    },
    /// The message was treated as an image request and enqueued.
    ImageAssist {
        /// The queued generation job.
        job_id: String,
        /// A personality-flavored acknowledgement.
        reply: String,
    },
    /// An ordinary chat reply.
    Text {
        /// The filtered assistant reply.
        reply: String,
    },
}

/// Composes [`ConversationStore`], [`LlmRouter`], and [`ToolSurface`]
/// behind the chat-turn algorithm (§4.8).
pub struct PersonalityChatCore {
    store: Arc<ConversationStore>,
    llm: Arc<LlmRouter>,
    tools: Arc<ToolSurface>,
}

impl PersonalityChatCore {
    /// Build a chat core over already-built components.
    #[must_use]
    pub fn new(store: Arc<ConversationStore>, llm: Arc<LlmRouter>, tools: Arc<ToolSurface>) -> Self {
        Self { store, llm, tools }
    }

    /// Run one chat turn end to end (§4.8 steps 1-6).
    pub async fn chat_turn(&self, request: ChatTurnRequest) -> ChatTurnOutcome {
        match self.store.check_status(&request.user_id).await {
            Ok(ModerationStatus::Active) => {}
            Ok(ModerationStatus::Suspended { reason }) => {
                return ChatTurnOutcome::Refused {
                    reason: reason.unwrap_or_else(|| "account suspended".to_string()),
                    retry_after_seconds: None,
                };
            }
            Ok(ModerationStatus::TimedOut { until, reason }) => {
                let remaining = (until - chrono::Utc::now()).num_seconds().max(0);
                return ChatTurnOutcome::Refused {
                    reason: reason.unwrap_or_else(|| "timed out".to_string()),
                    retry_after_seconds: Some(remaining),
                };
            }
            Err(err) => {
                tracing::error!(error = %err, user_id = %request.user_id, "check_status failed");
                return ChatTurnOutcome::Refused { reason: err.to_string(), retry_after_seconds: None };
            }
        }

        match self.store.check_rate(&request.user_id, "chat", CHAT_RATE_LIMIT_PER_MINUTE).await {
            Ok(check) if !check.allowed => {
                return ChatTurnOutcome::Refused {
                    reason: "rate limit exceeded".to_string(),
                    retry_after_seconds: Some(check.seconds_until_reset),
                };
            }
            Err(err) => {
                tracing::error!(error = %err, user_id = %request.user_id, "check_rate failed");
                return ChatTurnOutcome::Refused { reason: err.to_string(), retry_after_seconds: None };
            }
            Ok(_) => {}
        }

        let settings = match self.store.get_settings(&request.user_id).await {
            Ok(settings) => settings,
            Err(err) => return ChatTurnOutcome::Refused { reason: err.to_string(), retry_after_seconds: None },
        };
        let personality_name = settings.effective_personality().to_string();
        let personality = match self.store.get_personality(&personality_name).await {
            Ok(Some(personality)) => personality,
            Ok(None) => {
                tracing::warn!(personality = %personality_name, "configured personality missing, falling back to default");
                match self.store.get_personality("default").await {
                    Ok(Some(personality)) => personality,
                    _ => {
                        return ChatTurnOutcome::Refused {
                            reason: "no personality available".to_string(),
                            retry_after_seconds: None,
                        }
                    }
                }
            }
            Err(err) => return ChatTurnOutcome::Refused { reason: err.to_string(), retry_after_seconds: None },
        };

        let outcome = if let Some(subject) = detect_image_intent(&request.message) {
            self.image_assist(&request, &personality.image_injection_prompt, &personality.system_prompt, &subject)
                .await
        } else {
            self.standard_chat(&request, &settings, &personality.system_prompt).await
        };

        if !matches!(outcome, ChatTurnOutcome::Refused { .. }) {
            if let Err(err) = self.store.record_action(&request.user_id, "chat", Some(&request.context_key)).await {
                tracing::warn!(error = %err, "failed to record rate-limit event");
            }
        }

        outcome
    }

    /// Step 4: compose the enhancer call, hand the result to the
    /// orchestration recipe, and reply in character. The personality
    /// swap here is transient — it never touches persisted settings.
    async fn image_assist(
        &self,
        request: &ChatTurnRequest,
        image_injection_prompt: &str,
        system_prompt: &str,
        subject: &str,
    ) -> ChatTurnOutcome {
        let enhancement = self.llm.image_assist(image_injection_prompt, subject).await;
        let enhanced_prompt = if enhancement.success && !enhancement.content.trim().is_empty() {
            enhancement.content
        } else {
            subject.to_string()
        };

        let result = self
            .tools
            .orchestrate_image_generation(&enhanced_prompt, StylePreference::Balanced, Some(request.user_id.clone()))
            .await;

        if result["success"].as_bool() != Some(true) {
            let error = result["error"].as_str().unwrap_or("image generation failed").to_string();
            return ChatTurnOutcome::Refused { reason: error, retry_after_seconds: None };
        }
        let job_id = result["job_id"].as_str().unwrap_or_default().to_string();

        let flavor = self
            .llm
            .chat(&[
                ChatMessage::new(ChatRole::System, system_prompt),
                ChatMessage::new(
                    ChatRole::User,
                    format!("You just started generating an image of: {enhanced_prompt}. Reply with a short, in-character acknowledgement."),
                ),
            ])
            .await;
        let reply = if flavor.success && !flavor.content.trim().is_empty() {
            strip_thinking(&flavor.content)
        } else {
            "Working on it.".to_string()
        };

        ChatTurnOutcome::ImageAssist { job_id, reply }
    }

    /// Step 5: ordinary chat, grounded in the stored context window.
    async fn standard_chat(
        &self,
        request: &ChatTurnRequest,
        settings: &sdforge_store::UserSettings,
        system_prompt: &str,
    ) -> ChatTurnOutcome {
        let history = match self.store.history(&request.context_key, settings.max_context_messages).await {
            Ok(history) => history,
            Err(err) => return ChatTurnOutcome::Refused { reason: err.to_string(), retry_after_seconds: None },
        };

        let mut messages = vec![ChatMessage::new(ChatRole::System, system_prompt)];
        messages.extend(
            history
                .iter()
                .map(|m| ChatMessage::new(store_role_to_chat_role(m.role), m.content.clone())),
        );
        messages.push(ChatMessage::new(ChatRole::User, request.message.clone()));

        let response = self.llm.chat(&messages).await;
        if !response.success {
            let error = response.error.unwrap_or_else(|| "chat provider unavailable".to_string());
            return ChatTurnOutcome::Refused { reason: error, retry_after_seconds: None };
        }

        if let Err(err) = self
            .store
            .append(&request.context_key, &request.user_id, Role::User, &request.message, serde_json::Value::Null)
            .await
        {
            tracing::warn!(error = %err, "failed to append user message");
        }
        if let Err(err) = self
            .store
            .append(
                &request.context_key,
                &request.user_id,
                Role::Assistant,
                &response.content,
                serde_json::json!({ "personality": response.provider }),
            )
            .await
        {
            tracing::warn!(error = %err, "failed to append assistant message");
        }

        ChatTurnOutcome::Text { reply: strip_thinking(&response.content) }
    }
}
