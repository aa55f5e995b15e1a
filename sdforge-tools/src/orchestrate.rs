//! The `orchestrate_image_generation` recipe (§2, §4.9): content
//! analysis → LoRA suggestion → weight optimization → conflict check →
//! enqueue, reporting which steps completed and any downgrades made.

use sdforge_gateway::{LoraRef, Txt2ImgRequest};
use sdforge_lora::SelectedLora;
use sdforge_queue::GenerationRequest;
use sdforge_types::{Priority, StylePreference};

use crate::registry::success;
use crate::surface::ToolSurface;

/// Run the end-to-end generation recipe and report which steps
/// completed, any weight downgrades, and the resulting job id.
pub async fn orchestrate_image_generation(
    surface: &ToolSurface,
    prompt: &str,
    style_preference: StylePreference,
    user_id: Option<String>,
) -> serde_json::Value {
    let mut steps_completed = Vec::new();
    let mut downgrades = Vec::new();

    let analysis = surface.classifier.analyze(prompt, "").await;
    steps_completed.push("content_analysis");

    let suggestions = match surface.catalog.suggest_for_prompt(prompt, 5).await {
        Ok(suggestions) => suggestions,
        Err(err) => return crate::registry::failure(&err),
    };
    steps_completed.push("lora_suggestion");

    let recommended: Vec<(String, f64)> =
        suggestions.iter().map(|s| (s.name.clone(), s.recommended_weight)).collect();
    let optimized = surface.catalog.optimize_weights(&recommended, style_preference);
    steps_completed.push("weight_optimization");

    let mut selected = Vec::with_capacity(suggestions.len());
    for (suggestion, (_, weight)) in suggestions.iter().zip(optimized.iter()) {
        let category = match surface.catalog.search(&suggestion.name, 1).await {
            Ok(hits) => hits.first().map(|h| h.record.category).unwrap_or(sdforge_types::LoraCategory::General),
            Err(_) => sdforge_types::LoraCategory::General,
        };
        selected.push(SelectedLora { name: suggestion.name.clone(), category, weight: *weight });
    }

    // Downgrade-and-retry: drop the lowest-relevance LoRA repeatedly
    // until the combination is conflict-free or nothing is left to drop.
    loop {
        let conflicts = surface.catalog.validate_combination(&selected);
        if conflicts.is_empty() || selected.is_empty() {
            break;
        }
        if let Some(dropped) = selected.pop() {
            downgrades.push(format!("dropped {} to resolve a conflict", dropped.name));
        }
    }
    steps_completed.push("conflict_check");

    let wire_loras: Vec<LoraRef> =
        selected.iter().map(|s| LoraRef { name: s.name.clone(), weight: s.weight }).collect();

    let request = Txt2ImgRequest {
        prompt: prompt.to_string(),
        negative_prompt: String::new(),
        loras: wire_loras,
        steps: 20,
        width: 512,
        height: 512,
        sampler_name: "Euler a".to_string(),
        cfg_scale: 7.0,
        seed: -1,
    };

    let job_id = surface
        .queue
        .enqueue(GenerationRequest { txt2img: request, output_path: None, user_id }, Priority::default())
        .await;
    steps_completed.push("enqueue");

    success(serde_json::json!({
        "job_id": job_id.as_str(),
        "steps_completed": steps_completed,
        "downgrades": downgrades,
        "selected_loras": selected.iter().map(|s| serde_json::json!({"name": s.name, "weight": s.weight})).collect::<Vec<_>>(),
        "safety_level": format!("{:?}", analysis.safety.level).to_lowercase(),
    }))
}
