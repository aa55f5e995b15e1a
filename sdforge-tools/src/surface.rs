//! [`ToolSurface`]: the tool catalog consumed by the LLM host, composing
//! every component crate behind a flat `name -> {success, ...}` call
//! surface (§4.9, §6 tool list).

use std::sync::Arc;

use sdforge_content::ContentClassifier;
use sdforge_gateway::{LoraRef, SdGateway, Txt2ImgRequest};
use sdforge_lora::{LoraCatalog, SelectedLora};
use sdforge_queue::{GenerationRequest, QueueEngine};
use sdforge_store::ConversationStore;
use sdforge_types::{JobId, JobState, LoraCategory, Priority, SdForgeError};
use sdforge_upload::{UploadRequest, UploadRouter};

use crate::orchestrate::orchestrate_image_generation;
use crate::registry::{failure, success, tool_fn, ToolRegistry};

/// Every component `ToolSurface` composes into the outward tool catalog
/// (§2 "Control flow", §4.9).
pub struct ToolSurface {
    /// Typed facade over the external SD engine.
    pub gateway: Arc<SdGateway>,
    /// Persistent LoRA index.
    pub catalog: Arc<LoraCatalog>,
    /// Prompt taxonomy and safety triage.
    pub classifier: Arc<ContentClassifier>,
    /// Priority queue + background worker.
    pub queue: Arc<QueueEngine>,
    /// Conversation/personality/moderation store.
    pub store: Arc<ConversationStore>,
    /// Prioritized upload sink chain.
    pub upload: Arc<UploadRouter>,
}

fn job_snapshot_json(snapshot: &sdforge_queue::JobSnapshot) -> serde_json::Value {
    serde_json::json!({
        "job_id": snapshot.id.as_str(),
        "state": format!("{:?}", snapshot.state).to_lowercase(),
        "progress": snapshot.progress,
        "priority": snapshot.priority.0,
        "error": snapshot.error,
    })
}

impl ToolSurface {
    /// Construct a surface over already-built components.
    #[must_use]
    pub fn new(
        gateway: Arc<SdGateway>,
        catalog: Arc<LoraCatalog>,
        classifier: Arc<ContentClassifier>,
        queue: Arc<QueueEngine>,
        store: Arc<ConversationStore>,
        upload: Arc<UploadRouter>,
    ) -> Self {
        Self { gateway, catalog, classifier, queue, store, upload }
    }

    /// `get_sd_models_summary` (§6).
    pub async fn get_sd_models_summary(&self) -> serde_json::Value {
        match self.gateway.list_models().await {
            Ok(models) => success(serde_json::json!({ "count": models.len(), "models": models })),
            Err(err) => failure(&err),
        }
    }

    /// `search_sd_models(query, limit)` (§6).
    pub async fn search_sd_models(&self, query: &str, limit: usize) -> serde_json::Value {
        match self.gateway.list_models().await {
            Ok(models) => {
                let query = query.to_lowercase();
                let matches: Vec<_> = models
                    .into_iter()
                    .filter(|m| m.title.to_lowercase().contains(&query) || m.model_name.to_lowercase().contains(&query))
                    .take(limit)
                    .collect();
                success(serde_json::json!({ "matches": matches }))
            }
            Err(err) => failure(&err),
        }
    }

    /// `get_samplers_list` (§6).
    pub async fn get_samplers_list(&self) -> serde_json::Value {
        match self.gateway.list_samplers().await {
            Ok(samplers) => success(serde_json::json!({ "samplers": samplers })),
            Err(err) => failure(&err),
        }
    }

    /// `get_lora_summary` (§4.2 `summary`, §6).
    pub async fn get_lora_summary(&self) -> serde_json::Value {
        match self.catalog.summary().await {
            Ok(summary) => success(serde_json::json!({
                "total": summary.total,
                "by_category": summary.by_category.iter().map(|(k, v)| (format!("{k:?}").to_lowercase(), v)).collect::<std::collections::HashMap<_, _>>(),
                "top_trigger_words": summary.top_trigger_words,
            })),
            Err(err) => failure(&err),
        }
    }

    /// `browse_loras_by_category(category, limit)` (§4.2 `browse`, §6).
    pub async fn browse_loras_by_category(&self, category: &str, limit: usize) -> serde_json::Value {
        let Some(category) = parse_category(category) else {
            return failure(&SdForgeError::Validation(format!("unknown category: {category}")));
        };
        match self.catalog.browse(category, limit).await {
            Ok(records) => success(serde_json::json!({ "loras": records.iter().map(lora_record_json).collect::<Vec<_>>() })),
            Err(err) => failure(&err),
        }
    }

    /// `search_loras_smart(query, max_results)` (§4.2 `search`, §6).
    pub async fn search_loras_smart(&self, query: &str, max_results: usize) -> serde_json::Value {
        match self.catalog.search(query, max_results).await {
            Ok(hits) => success(serde_json::json!({
                "hits": hits.iter().map(|h| {
                    let mut json = lora_record_json(&h.record);
                    json["score"] = serde_json::json!(h.score);
                    json
                }).collect::<Vec<_>>(),
            })),
            Err(err) => failure(&err),
        }
    }

    /// `suggest_loras_for_prompt(prompt, limit)` (§4.2 `suggest_for_prompt`, §6).
    pub async fn suggest_loras_for_prompt(&self, prompt: &str, limit: usize) -> serde_json::Value {
        match self.catalog.suggest_for_prompt(prompt, limit).await {
            Ok(suggestions) => success(serde_json::json!({
                "suggestions": suggestions.iter().map(|s| serde_json::json!({
                    "name": s.name,
                    "score": s.score,
                    "confidence": format!("{:?}", s.confidence).to_lowercase(),
                    "matching_tags": s.matching_tags,
                    "recommended_weight": s.recommended_weight,
                })).collect::<Vec<_>>(),
            })),
            Err(err) => failure(&err),
        }
    }

    /// `validate_lora_combination(selected)` (§4.2 `validate_combination`, §6).
    pub fn validate_lora_combination(&self, selected: &[SelectedLora]) -> serde_json::Value {
        let conflicts = self.catalog.validate_combination(selected);
        success(serde_json::json!({
            "conflicts": conflicts.iter().map(|c| serde_json::json!({
                "rule": c.rule,
                "message": c.message,
                "remediation": c.remediation,
            })).collect::<Vec<_>>(),
            "valid": conflicts.is_empty(),
        }))
    }

    /// `generate_image(...)` (§6): a direct, synchronous-feeling call
    /// that drives the gateway without going through the queue.
    pub async fn generate_image(&self, request: Txt2ImgRequest) -> serde_json::Value {
        match self.gateway.txt2img(&request).await {
            Ok(response) => success(serde_json::json!({
                "image_count": response.images.len(),
                "info": response.info,
            })),
            Err(err) => failure(&err),
        }
    }

    /// `enqueue_image_generation(..., priority?)` (§6, §4.4 `enqueue`).
    pub async fn enqueue_image_generation(
        &self,
        request: Txt2ImgRequest,
        user_id: Option<String>,
        priority: Priority,
    ) -> serde_json::Value {
        let job_id = self
            .queue
            .enqueue(GenerationRequest { txt2img: request, output_path: None, user_id }, priority)
            .await;
        success(serde_json::json!({ "job_id": job_id.as_str() }))
    }

    /// `get_generation_progress(job_id?)` (§6, §4.4 `get`).
    pub async fn get_generation_progress(&self, job_id: &str) -> serde_json::Value {
        match self.queue.get(&JobId::new(job_id)).await {
            Some(snapshot) => success(job_snapshot_json(&snapshot)),
            None => failure(&SdForgeError::NotFound(format!("job not found: {job_id}"))),
        }
    }

    /// `get_queue_status` (§6, §4.4 `list`).
    pub async fn get_queue_status(&self) -> serde_json::Value {
        let jobs = self.queue.list(None).await;
        let running = jobs.iter().filter(|j| j.state == JobState::Running).count();
        let queued = jobs.iter().filter(|j| j.state == JobState::Queued).count();
        success(serde_json::json!({
            "running": running,
            "queued": queued,
            "jobs": jobs.iter().map(job_snapshot_json).collect::<Vec<_>>(),
        }))
    }

    /// `cancel_generation_job(job_id)` (§6, §4.4 `cancel`).
    pub async fn cancel_generation_job(&self, job_id: &str) -> serde_json::Value {
        match self.queue.cancel(&JobId::new(job_id)).await {
            Ok(()) => success(serde_json::json!({ "job_id": job_id })),
            Err(err) => failure(&err),
        }
    }

    /// `get_job_history(limit)` (§6, §4.4 `history`).
    pub async fn get_job_history(&self, limit: usize) -> serde_json::Value {
        let jobs = self.queue.history(limit).await;
        success(serde_json::json!({ "jobs": jobs.iter().map(job_snapshot_json).collect::<Vec<_>>() }))
    }

    /// `orchestrate_image_generation(prompt, style_preference)` (§2, §4.9).
    pub async fn orchestrate_image_generation(
        &self,
        prompt: &str,
        style_preference: sdforge_types::StylePreference,
        user_id: Option<String>,
    ) -> serde_json::Value {
        orchestrate_image_generation(self, prompt, style_preference, user_id).await
    }

    /// `analyze_prompt_content(prompt, negative_prompt?)` (§4.3 `analyze`, §6).
    pub async fn analyze_prompt_content(&self, prompt: &str, negative_prompt: &str) -> serde_json::Value {
        let analysis = self.classifier.analyze(prompt, negative_prompt).await;
        success(serde_json::json!({
            "matched": analysis.matched.iter().map(|m| serde_json::json!({
                "word": m.word,
                "category_path": m.category_path,
                "confidence": m.confidence,
            })).collect::<Vec<_>>(),
            "categories_present": analysis.categories_present,
            "missing_axes": analysis.missing_axes,
            "safety": {
                "level": format!("{:?}", analysis.safety.level).to_lowercase(),
                "score": analysis.safety.score,
            },
        }))
    }

    /// `enhanced_prompt_generation(prompt, apply_suggestions?, safety_filter?)` (§4.3 `enhance`, §6).
    pub async fn enhanced_prompt_generation(
        &self,
        prompt: &str,
        apply_suggestions: bool,
        safety_filter: bool,
    ) -> serde_json::Value {
        let enhanced = self.classifier.enhance(prompt, apply_suggestions, safety_filter).await;
        success(serde_json::json!({ "enhanced_prompt": enhanced }))
    }

    /// `get_content_categories(category_type?)` (§4.3 CRUD, §6).
    pub async fn get_content_categories(&self, category_type: Option<&str>) -> serde_json::Value {
        let categories = self.classifier.list_categories(category_type).await;
        success(serde_json::json!({
            "categories": categories.iter().map(|c| serde_json::json!({
                "path": c.path,
                "parent_path": c.parent_path,
                "description": c.description,
            })).collect::<Vec<_>>(),
        }))
    }

    /// `upload test` (§4.9): round-trips a tiny generated image through
    /// the sink chain to confirm hosting is reachable.
    pub async fn upload_test(&self, user_id: Option<String>) -> serde_json::Value {
        const PIXEL_PNG: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        ];
        let mut request = UploadRequest::new(PIXEL_PNG.to_vec(), "png");
        if let Some(user_id) = user_id {
            request = request.for_user(user_id);
        }
        let outcome = self.upload.upload(request).await;
        success(serde_json::json!({
            "sink": outcome.sink,
            "url": outcome.url,
            "fallbacks": outcome.fallbacks.iter().map(|f| serde_json::json!({
                "sink": f.sink,
                "message": f.message,
            })).collect::<Vec<_>>(),
        }))
    }

    /// `personalities list` (§4.9, §4.5).
    pub async fn list_personalities(&self) -> serde_json::Value {
        match self.store.list_personalities().await {
            Ok(personalities) => success(serde_json::json!({
                "personalities": personalities.iter().map(|p| serde_json::json!({
                    "name": p.name,
                    "builtin": p.builtin,
                })).collect::<Vec<_>>(),
            })),
            Err(err) => failure(&err),
        }
    }

    /// Build the published registry of every tool named in §6.
    #[must_use]
    pub fn into_registry(self: Arc<Self>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();

        macro_rules! register {
            ($name:literal, $desc:literal, $schema:expr, |$surface:ident, $input:ident| $body:expr) => {
                let surface = Arc::clone(&self);
                registry.register(tool_fn($name, $desc, $schema, move |$input: serde_json::Value| {
                    let $surface = Arc::clone(&surface);
                    async move { $body }
                }));
            };
        }

        register!("get_sd_models_summary", "Summary of models known to the SD engine.", serde_json::json!({"type": "object"}), |surface, _input| {
            surface.get_sd_models_summary().await
        });
        register!("search_sd_models", "Search SD models by title/name.", serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}}, "required": ["query"]}), |surface, input| {
            let query = input["query"].as_str().unwrap_or_default();
            let limit = input["limit"].as_u64().unwrap_or(10) as usize;
            surface.search_sd_models(query, limit).await
        });
        register!("get_samplers_list", "List samplers the SD engine supports.", serde_json::json!({"type": "object"}), |surface, _input| {
            surface.get_samplers_list().await
        });
        register!("get_lora_summary", "Totals and top trigger words across the LoRA catalog.", serde_json::json!({"type": "object"}), |surface, _input| {
            surface.get_lora_summary().await
        });
        register!("browse_loras_by_category", "List LoRAs in a category.", serde_json::json!({"type": "object", "properties": {"category": {"type": "string"}, "limit": {"type": "integer"}}, "required": ["category"]}), |surface, input| {
            let category = input["category"].as_str().unwrap_or_default();
            let limit = input["limit"].as_u64().unwrap_or(20) as usize;
            surface.browse_loras_by_category(category, limit).await
        });
        register!("search_loras_smart", "Relevance-ranked LoRA search.", serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}, "max_results": {"type": "integer"}}, "required": ["query"]}), |surface, input| {
            let query = input["query"].as_str().unwrap_or_default();
            let max_results = input["max_results"].as_u64().unwrap_or(10) as usize;
            surface.search_loras_smart(query, max_results).await
        });
        register!("suggest_loras_for_prompt", "Suggest LoRAs for a prompt.", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}, "limit": {"type": "integer"}}, "required": ["prompt"]}), |surface, input| {
            let prompt = input["prompt"].as_str().unwrap_or_default();
            let limit = input["limit"].as_u64().unwrap_or(5) as usize;
            surface.suggest_loras_for_prompt(prompt, limit).await
        });
        register!("validate_lora_combination", "Detect LoRA combination conflicts.", serde_json::json!({"type": "object", "properties": {"selected": {"type": "array"}}, "required": ["selected"]}), |surface, input| {
            match parse_selected(&input["selected"]) {
                Ok(selected) => surface.validate_lora_combination(&selected),
                Err(err) => failure(&err),
            }
        });
        register!("generate_image", "Generate an image directly (bypasses the queue).", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}}, "required": ["prompt"]}), |surface, input| {
            match parse_txt2img(&input) {
                Ok(request) => surface.generate_image(request).await,
                Err(err) => failure(&err),
            }
        });
        register!("enqueue_image_generation", "Enqueue a generation job.", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}, "priority": {"type": "integer"}, "user_id": {"type": "string"}}, "required": ["prompt"]}), |surface, input| {
            match parse_txt2img(&input) {
                Ok(request) => {
                    let priority = Priority(input["priority"].as_i64().unwrap_or(0) as i32);
                    let user_id = input["user_id"].as_str().map(str::to_string);
                    surface.enqueue_image_generation(request, user_id, priority).await
                }
                Err(err) => failure(&err),
            }
        });
        register!("get_generation_progress", "Progress snapshot for a job.", serde_json::json!({"type": "object", "properties": {"job_id": {"type": "string"}}, "required": ["job_id"]}), |surface, input| {
            surface.get_generation_progress(input["job_id"].as_str().unwrap_or_default()).await
        });
        register!("get_queue_status", "Running/queued job counts and snapshots.", serde_json::json!({"type": "object"}), |surface, _input| {
            surface.get_queue_status().await
        });
        register!("cancel_generation_job", "Cancel a queued or running job.", serde_json::json!({"type": "object", "properties": {"job_id": {"type": "string"}}, "required": ["job_id"]}), |surface, input| {
            surface.cancel_generation_job(input["job_id"].as_str().unwrap_or_default()).await
        });
        register!("get_job_history", "Most recent terminal jobs.", serde_json::json!({"type": "object", "properties": {"limit": {"type": "integer"}}}), |surface, input| {
            surface.get_job_history(input["limit"].as_u64().unwrap_or(20) as usize).await
        });
        register!("orchestrate_image_generation", "End-to-end recipe: analyze, suggest LoRAs, validate, enqueue.", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}, "style_preference": {"type": "string"}, "user_id": {"type": "string"}}, "required": ["prompt"]}), |surface, input| {
            let prompt = input["prompt"].as_str().unwrap_or_default();
            let style = parse_style_preference(input["style_preference"].as_str().unwrap_or("balanced"));
            let user_id = input["user_id"].as_str().map(str::to_string);
            surface.orchestrate_image_generation(prompt, style, user_id).await
        });
        register!("analyze_prompt_content", "Taxonomy + safety analysis of a prompt.", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}, "negative_prompt": {"type": "string"}}, "required": ["prompt"]}), |surface, input| {
            let prompt = input["prompt"].as_str().unwrap_or_default();
            let negative = input["negative_prompt"].as_str().unwrap_or_default();
            surface.analyze_prompt_content(prompt, negative).await
        });
        register!("enhanced_prompt_generation", "Append canonical fillers for missing axes / strip explicit terms.", serde_json::json!({"type": "object", "properties": {"prompt": {"type": "string"}, "apply_suggestions": {"type": "boolean"}, "safety_filter": {"type": "boolean"}}, "required": ["prompt"]}), |surface, input| {
            let prompt = input["prompt"].as_str().unwrap_or_default();
            let apply = input["apply_suggestions"].as_bool().unwrap_or(true);
            let filter = input["safety_filter"].as_bool().unwrap_or(true);
            surface.enhanced_prompt_generation(prompt, apply, filter).await
        });
        register!("get_content_categories", "List taxonomy categories, optionally scoped to a subtree.", serde_json::json!({"type": "object", "properties": {"category_type": {"type": "string"}}}), |surface, input| {
            surface.get_content_categories(input["category_type"].as_str()).await
        });
        register!("upload_test", "Round-trip a tiny test image through the upload sink chain.", serde_json::json!({"type": "object", "properties": {"user_id": {"type": "string"}}}), |surface, input| {
            surface.upload_test(input["user_id"].as_str().map(str::to_string)).await
        });
        register!("list_personalities", "List available chat personalities.", serde_json::json!({"type": "object"}), |surface, _input| {
            surface.list_personalities().await
        });

        registry
    }
}

fn lora_record_json(record: &sdforge_lora::LoraRecord) -> serde_json::Value {
    serde_json::json!({
        "name": record.name,
        "category": format!("{:?}", record.category).to_lowercase(),
        "content_type": format!("{:?}", record.content_type).to_lowercase(),
        "description": record.description,
        "trigger_words": record.trigger_words,
        "recommended_weight": record.recommended_weight,
    })
}

fn parse_category(s: &str) -> Option<LoraCategory> {
    match s.to_ascii_lowercase().as_str() {
        "anime" => Some(LoraCategory::Anime),
        "realistic" => Some(LoraCategory::Realistic),
        "character" => Some(LoraCategory::Character),
        "style" => Some(LoraCategory::Style),
        "concept" => Some(LoraCategory::Concept),
        "general" => Some(LoraCategory::General),
        _ => None,
    }
}

fn parse_style_preference(s: &str) -> sdforge_types::StylePreference {
    match s.to_ascii_lowercase().as_str() {
        "subtle" => sdforge_types::StylePreference::Subtle,
        "strong" => sdforge_types::StylePreference::Strong,
        _ => sdforge_types::StylePreference::Balanced,
    }
}

fn parse_selected(value: &serde_json::Value) -> Result<Vec<SelectedLora>, SdForgeError> {
    let array = value.as_array().ok_or_else(|| SdForgeError::Validation("selected must be an array".into()))?;
    array
        .iter()
        .map(|entry| {
            let name = entry["name"].as_str().ok_or_else(|| SdForgeError::Validation("missing name".into()))?.to_string();
            let category = entry["category"]
                .as_str()
                .and_then(parse_category)
                .ok_or_else(|| SdForgeError::Validation(format!("unknown category for {name}")))?;
            let weight = entry["weight"].as_f64().unwrap_or(1.0);
            Ok(SelectedLora { name, category, weight })
        })
        .collect()
}

pub(crate) fn parse_txt2img(input: &serde_json::Value) -> Result<Txt2ImgRequest, SdForgeError> {
    let prompt = input["prompt"]
        .as_str()
        .ok_or_else(|| SdForgeError::Validation("prompt is required".into()))?
        .to_string();
    let loras = input["loras"]
        .as_array()
        .map(|loras| {
            loras
                .iter()
                .filter_map(|l| {
                    Some(LoraRef { name: l["name"].as_str()?.to_string(), weight: l["weight"].as_f64().unwrap_or(1.0) })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Txt2ImgRequest {
        prompt,
        negative_prompt: input["negative_prompt"].as_str().unwrap_or_default().to_string(),
        loras,
        steps: input["steps"].as_u64().unwrap_or(20) as u32,
        width: input["width"].as_u64().unwrap_or(512) as u32,
        height: input["height"].as_u64().unwrap_or(512) as u32,
        sampler_name: input["sampler_name"].as_str().unwrap_or("Euler a").to_string(),
        cfg_scale: input["cfg_scale"].as_f64().unwrap_or(7.0),
        seed: input["seed"].as_i64().unwrap_or(-1),
    })
}
