// Unit tests for response parsing and topic filtering.
//
// Tests the pure parser: JSON recovery from fenced or chatty replies,
// element validation, the confidence floor (including its exact boundary),
// the topic cap, and confidence ordering.

use serde_json::json;

use topical::parser::{filter_topics, parse_candidates, parse_topics, FilterRules};
use topical::{ExtractError, Topic};

fn topic(name: &str, confidence: f64) -> Topic {
    Topic {
        name: name.to_string(),
        display_name: name.to_string(),
        confidence,
        reasoning: String::new(),
    }
}

fn rules(min_confidence: f64, max_topics: usize) -> FilterRules {
    FilterRules {
        min_confidence,
        max_topics,
        require_topics: false,
    }
}

// ============================================================
// Recovery of the JSON array
// ============================================================

#[test]
fn bare_array_round_trips_in_order() {
    let raw = json!([
        {"name": "rust", "display_name": "Rust", "confidence": 0.7, "reasoning": "a"},
        {"name": "async", "display_name": "Async", "confidence": 0.9, "reasoning": "b"},
        {"name": "tokio", "display_name": "Tokio", "confidence": 0.8, "reasoning": "c"}
    ])
    .to_string();

    let topics = parse_candidates(&raw).unwrap();
    assert_eq!(
        topics,
        vec![
            Topic {
                name: "rust".into(),
                display_name: "Rust".into(),
                confidence: 0.7,
                reasoning: "a".into()
            },
            Topic {
                name: "async".into(),
                display_name: "Async".into(),
                confidence: 0.9,
                reasoning: "b".into()
            },
            Topic {
                name: "tokio".into(),
                display_name: "Tokio".into(),
                confidence: 0.8,
                reasoning: "c".into()
            },
        ]
    );
}

#[test]
fn prose_and_fence_are_stripped() {
    let raw = "Here are the topics:\n```json\n[{\"name\":\"react\",\"display_name\":\"React\",\"confidence\":0.95,\"reasoning\":\"...\"}]\n```";
    let topics = parse_topics(raw, &FilterRules::default()).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "react");
    assert_eq!(topics[0].display_name, "React");
}

#[test]
fn fenced_reply_without_prose() {
    let raw = "```json\n[{\"name\":\"react\",\"confidence\":0.95}]\n```";
    assert_eq!(parse_topics(raw, &FilterRules::default()).unwrap().len(), 1);
}

#[test]
fn trailing_prose_is_ignored() {
    let raw = "[{\"name\":\"react\",\"confidence\":0.95}]\n\nLet me know if you need more!";
    assert_eq!(parse_topics(raw, &FilterRules::default()).unwrap().len(), 1);
}

#[test]
fn footnote_brackets_do_not_win_over_topic_array() {
    let raw = "Based on the text [1], the topics are: [{\"name\":\"react\",\"confidence\":0.9}]";
    let topics = parse_topics(raw, &FilterRules::default()).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "react");
}

#[test]
fn no_array_is_malformed() {
    let err = parse_topics("I could not find any topics.", &FilterRules::default()).unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse(_)));
}

#[test]
fn object_without_topics_is_malformed() {
    let err = parse_topics(r#"{"name":"react"}"#, &FilterRules::default()).unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse(_)));
}

#[test]
fn empty_array_is_fine_by_default() {
    assert!(parse_topics("[]", &FilterRules::default()).unwrap().is_empty());
}

#[test]
fn empty_result_is_malformed_when_topics_required() {
    let strict = FilterRules {
        require_topics: true,
        ..FilterRules::default()
    };
    let raw = r#"[{"name":"hooks","confidence":0.55}]"#;
    let err = parse_topics(raw, &strict).unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse(_)));
}

#[test]
fn invalid_elements_are_dropped_not_fatal() {
    let raw = json!([
        {"name": "react", "confidence": 0.9},
        {"name": "", "confidence": 0.9},
        {"confidence": 0.9},
        {"name": "vue", "confidence": 2.0},
        "just a string",
        {"name": "Svelte Kit", "confidence": 0.8}
    ])
    .to_string();
    let names: Vec<String> = parse_candidates(&raw)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["react", "svelte-kit"]);
}

// ============================================================
// Filtering: confidence floor, cap, ordering
// ============================================================

#[test]
fn react_hooks_scenario_keeps_only_react() {
    let raw = r#"[{"name":"react","display_name":"React","confidence":0.95,"reasoning":"..."},{"name":"hooks","display_name":"Hooks","confidence":0.55,"reasoning":"..."}]"#;
    let topics = parse_topics(raw, &FilterRules::default()).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "react");
}

#[test]
fn confidence_exactly_at_threshold_is_kept() {
    let raw = json!([{"name": "edge", "confidence": 0.6}]).to_string();
    assert_eq!(parse_topics(&raw, &rules(0.6, 5)).unwrap().len(), 1);
}

#[test]
fn confidence_one_ulp_below_threshold_is_dropped() {
    let below = f64::from_bits(0.6f64.to_bits() - 1);
    assert!(below < 0.6);
    let raw = json!([{"name": "edge", "confidence": below}]).to_string();
    assert!(parse_topics(&raw, &rules(0.6, 5)).unwrap().is_empty());
}

#[test]
fn cap_is_applied_in_reply_order_before_sorting() {
    let topics = vec![topic("a", 0.7), topic("b", 0.9), topic("c", 0.95)];
    let kept = filter_topics(topics, &rules(0.6, 2));
    let names: Vec<&str> = kept.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn ties_keep_reply_order() {
    let topics = vec![
        topic("first", 0.8),
        topic("top", 0.9),
        topic("second", 0.8),
        topic("third", 0.8),
    ];
    let kept = filter_topics(topics, &rules(0.0, 10));
    let names: Vec<&str> = kept.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["top", "first", "second", "third"]);
}

#[test]
fn output_respects_bounds_and_order() {
    let raw = json!([
        {"name": "a", "confidence": 0.61},
        {"name": "b", "confidence": 0.99},
        {"name": "c", "confidence": 0.2},
        {"name": "d", "confidence": 0.75},
        {"name": "e", "confidence": 0.75},
        {"name": "f", "confidence": 0.88},
        {"name": "g", "confidence": 0.93},
        {"name": "h", "confidence": 1.0}
    ])
    .to_string();

    for max_topics in 1..=8 {
        for min in [0.0, 0.5, 0.6, 0.75, 0.9] {
            let topics = parse_topics(&raw, &rules(min, max_topics)).unwrap();
            assert!(topics.len() <= max_topics);
            assert!(topics.iter().all(|t| t.confidence >= min));
            assert!(
                topics.windows(2).all(|w| w[0].confidence >= w[1].confidence),
                "not ordered for max={max_topics} min={min}: {topics:?}"
            );
        }
    }
}

#[test]
fn parsing_is_idempotent() {
    let raw = "Sure!\n```\n[{\"name\":\"Web Dev\",\"confidence\":0.8},{\"name\":\"css\",\"confidence\":0.9}]\n```";
    let first = parse_topics(raw, &FilterRules::default()).unwrap();
    let second = parse_topics(raw, &FilterRules::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].name, "css");
    assert_eq!(first[1].name, "web-dev");
}

// ============================================================
// Name normalization: non-ASCII names and duplicate slugs
// ============================================================

#[test]
fn non_ascii_names_are_dropped_not_mangled() {
    let raw = json!([
        {"name": "Café Culture", "confidence": 0.7},
        {"name": "日本語", "confidence": 0.95},
        {"name": "rust", "confidence": 0.8}
    ])
    .to_string();
    let topics = parse_topics(&raw, &FilterRules::default()).unwrap();
    let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["rust"]);
}

#[test]
fn colliding_slugs_keep_first_in_reply_order() {
    let raw = json!([
        {"name": "C++", "confidence": 0.8},
        {"name": "C#", "confidence": 0.9},
        {"name": "go", "confidence": 0.7}
    ])
    .to_string();
    let topics = parse_topics(&raw, &FilterRules::default()).unwrap();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0].name, "c");
    assert_eq!(topics[0].display_name, "C++");
    assert_eq!(topics[1].name, "go");
}

#[test]
fn duplicate_below_threshold_does_not_shadow_a_kept_one() {
    let raw = json!([
        {"name": "rust", "display_name": "Rust (weak)", "confidence": 0.3},
        {"name": "Rust", "display_name": "Rust", "confidence": 0.9}
    ])
    .to_string();
    let topics = parse_topics(&raw, &FilterRules::default()).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].display_name, "Rust");
}

#[test]
fn duplicates_do_not_use_up_the_cap() {
    let topics = vec![topic("a", 0.9), topic("a", 0.8), topic("b", 0.7)];
    let kept = filter_topics(topics, &rules(0.6, 2));
    let names: Vec<&str> = kept.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn names_are_unique_in_any_result() {
    let raw = json!([
        {"name": "Web Dev", "confidence": 0.9},
        {"name": "web-dev", "confidence": 0.95},
        {"name": "WEB_DEV", "confidence": 0.7},
        {"name": "css", "confidence": 0.8}
    ])
    .to_string();
    let topics = parse_topics(&raw, &rules(0.0, 10)).unwrap();
    let mut names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total);
    assert_eq!(total, 2);
}

#[test]
fn text_fields_round_trip_unchanged() {
    let raw = json!([
        {"name": "rust", "display_name": " Rust  Lang ", "confidence": 0.9, "reasoning": "  spaced\n"}
    ])
    .to_string();
    let topics = parse_candidates(&raw).unwrap();
    assert_eq!(topics[0].display_name, " Rust  Lang ");
    assert_eq!(topics[0].reasoning, "  spaced\n");
}
