use sdforge_content::ContentClassifier;
use sdforge_types::SafetyLevel;

#[tokio::test]
async fn negative_prompt_terms_count_toward_safety_score() {
    let classifier = ContentClassifier::new();
    let analysis = classifier.analyze("a woman on a beach", "nude, nsfw").await;
    assert_eq!(analysis.safety.level, SafetyLevel::Explicit);
}

#[tokio::test]
async fn fully_covered_prompt_reports_no_missing_axes() {
    let classifier = ContentClassifier::new();
    let analysis = classifier
        .analyze(
            "anime style, high quality, cinematic lighting, balanced composition woman",
            "",
        )
        .await;
    assert!(analysis.missing_axes.is_empty());
}

#[tokio::test]
async fn custom_category_and_word_participate_in_analysis() {
    let classifier = ContentClassifier::new();
    classifier
        .add_category("subject/creature", Some("subject"), "non-human creatures")
        .await
        .unwrap();
    classifier
        .add_words(vec![sdforge_content::ContentWord {
            word: "dragon".to_string(),
            category_path: "subject/creature".to_string(),
            confidence: 0.6,
        }])
        .await
        .unwrap();

    let analysis = classifier.analyze("a dragon in flight", "").await;
    assert!(analysis
        .categories_present
        .contains(&"subject/creature".to_string()));
}
