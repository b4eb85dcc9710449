// Cost estimation from a static price table.
//
// Token counts are estimated as ceil(chars / 4), which is close enough for
// English prose on all three providers. Prices are USD per million tokens
// for each provider's default model.

use crate::providers::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

pub fn pricing_for(kind: ProviderKind) -> Pricing {
    match kind {
        ProviderKind::OpenAi => Pricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        },
        ProviderKind::Anthropic => Pricing {
            input_per_million: 0.80,
            output_per_million: 4.00,
        },
        ProviderKind::Gemini => Pricing {
            input_per_million: 0.075,
            output_per_million: 0.30,
        },
    }
}

pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Estimated USD cost of sending `prompt` and receiving `response`.
pub fn estimate_cost(kind: ProviderKind, prompt: &str, response: &str) -> f64 {
    let pricing = pricing_for(kind);
    let input = estimate_tokens(prompt) as f64;
    let output = estimate_tokens(response) as f64;
    (input * pricing.input_per_million + output * pricing.output_per_million) / 1_000_000.0
}
