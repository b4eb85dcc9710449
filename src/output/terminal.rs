// Colored terminal output for extraction results and provider status.
//
// main.rs delegates all human-readable formatting here; --json output
// bypasses this module entirely.

use colored::Colorize;

use crate::config::Config;
use crate::error::ExtractError;
use crate::extractor::cost::pricing_for;
use crate::models::ExtractionResult;
use crate::providers::ProviderKind;

use super::truncate_chars;

/// Display one extraction result.
pub fn display_result(result: &ExtractionResult) {
    println!(
        "\n{}",
        format!("=== Topics from {} ===", result.provider_name).bold()
    );

    if let Some(err) = &result.error {
        println!("  {} {}", "Error:".red().bold(), err);
        if let Some(hint) = error_hint(&err.error) {
            println!("  {}", hint.dimmed());
        }
    } else if result.topics.is_empty() {
        println!("  No topics met the confidence threshold.");
    } else {
        for (i, topic) in result.topics.iter().enumerate() {
            println!(
                "  {:>2}. {:<28} {}  {}",
                i + 1,
                topic.display_name,
                colorize_confidence(topic.confidence),
                topic.name.dimmed(),
            );
            if !topic.reasoning.is_empty() {
                println!("      {}", truncate_chars(&topic.reasoning, 100).dimmed());
            }
        }
    }

    println!(
        "  {}",
        format!(
            "latency {}ms, est. cost ${:.6}",
            result.latency.as_millis(),
            result.cost_estimate
        )
        .dimmed()
    );
}

/// Display a side-by-side summary of a provider comparison.
pub fn display_comparison(results: &[ExtractionResult]) {
    for result in results {
        display_result(result);
    }

    println!("\n{}", "=== Comparison ===".bold());
    println!(
        "  {:<10}  {:>6}  {:>9}  {:>10}  {}",
        "Provider".dimmed(),
        "Topics".dimmed(),
        "Latency".dimmed(),
        "Cost".dimmed(),
        "Top topic".dimmed(),
    );
    println!("  {}", "-".repeat(60).dimmed());

    for result in results {
        let top = match (&result.error, result.topics.first()) {
            (Some(err), _) => format!("failed at {} stage", err.stage).red().to_string(),
            (None, Some(topic)) => topic.name.clone(),
            (None, None) => "-".to_string(),
        };
        println!(
            "  {:<10}  {:>6}  {:>7}ms  ${:>9.6}  {}",
            result.provider_name,
            result.topics.len(),
            result.latency.as_millis(),
            result.cost_estimate,
            top,
        );
    }
}

/// List every provider with its configuration status and pricing.
pub fn display_providers(config: &Config) {
    println!("\n{}", "=== Providers ===".bold());
    for kind in ProviderKind::ALL {
        let Some(provider) = config.provider(kind) else {
            continue;
        };
        let status = if provider.has_api_key() {
            "configured".green()
        } else {
            format!("missing {}", kind.api_key_var()).yellow()
        };
        let pricing = pricing_for(kind);
        println!(
            "  {:<10} {:<26} {}  {}",
            kind.as_str().bold(),
            provider.model,
            status,
            format!(
                "${:.3}/${:.3} per 1M tokens in/out",
                pricing.input_per_million, pricing.output_per_million
            )
            .dimmed(),
        );
    }
}

fn colorize_confidence(confidence: f64) -> colored::ColoredString {
    let text = format!("{confidence:.2}");
    if confidence >= 0.85 {
        text.green().bold()
    } else if confidence >= 0.7 {
        text.green()
    } else {
        text.yellow()
    }
}

fn error_hint(error: &ExtractError) -> Option<&'static str> {
    match error {
        ExtractError::Auth { .. } => Some("Check the API key in your .env file."),
        ExtractError::QuotaExceeded { .. } => {
            Some("Quota exhausted. Try another provider with --provider.")
        }
        ExtractError::MalformedResponse(_) => {
            Some("The model ignored the output format. Try a different model.")
        }
        ExtractError::UnknownProvider(_) => {
            Some("Run `topical providers` to see which providers are configured.")
        }
        _ => None,
    }
}
