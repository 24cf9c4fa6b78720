//! Model pricing registry.
//!
//! Centralized pricing data for the rating models we run.
//! Costs are in nanodollars (1e-9 USD) per token.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Pricing information for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Provider name.
    pub provider: &'static str,
    /// Cost per input token in nanodollars.
    pub input_nanos_per_token: i64,
    /// Cost per output token in nanodollars.
    pub output_nanos_per_token: i64,
}

impl ModelPricing {
    const fn new(provider: &'static str, input: i64, output: i64) -> Self {
        Self {
            provider,
            input_nanos_per_token: input,
            output_nanos_per_token: output,
        }
    }

    /// Calculate cost for a request.
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        (input_tokens as i64) * self.input_nanos_per_token
            + (output_tokens as i64) * self.output_nanos_per_token
    }
}

// =============================================================================
// PRICING DATA
// =============================================================================

// OpenAI (verify periodically against the OpenAI pricing page)
// GPT-4.1: $2.00/1M input, $8.00/1M output
// GPT-4.1 mini: $0.40/1M input, $1.60/1M output
// GPT-4 Turbo: $10.00/1M input, $30.00/1M output
// GPT-5: $1.25/1M input, $10.00/1M output
// GPT-5 mini: $0.25/1M input, $2.00/1M output

const GPT_4_1: ModelPricing = ModelPricing::new("openai", 2_000, 8_000);
const GPT_4_1_MINI: ModelPricing = ModelPricing::new("openai", 400, 1_600);
const GPT_4_TURBO: ModelPricing = ModelPricing::new("openai", 10_000, 30_000);
const GPT_5: ModelPricing = ModelPricing::new("openai", 1_250, 10_000);
const GPT_5_MINI: ModelPricing = ModelPricing::new("openai", 250, 2_000);

// DeepInfra Llama
// Llama 4 Maverick: $0.15/1M input, $0.60/1M output
// Llama 4 Scout: $0.08/1M input, $0.30/1M output
// Llama 3.3 70B: $0.23/1M input, $0.40/1M output
// Llama 3.2 11B Vision: $0.049/1M input and output

const LLAMA_4_MAVERICK: ModelPricing = ModelPricing::new("deepinfra", 150, 600);
const LLAMA_4_SCOUT: ModelPricing = ModelPricing::new("deepinfra", 80, 300);
const LLAMA_3_3_70B: ModelPricing = ModelPricing::new("deepinfra", 230, 400);
const LLAMA_3_2_11B_VISION: ModelPricing = ModelPricing::new("deepinfra", 49, 49);

static PRICING_MAP: OnceLock<HashMap<&'static str, ModelPricing>> = OnceLock::new();

fn init_pricing() -> HashMap<&'static str, ModelPricing> {
    let mut map = HashMap::new();

    // OpenAI direct
    map.insert("gpt-4.1", GPT_4_1);
    map.insert("gpt-4.1-2025-04-14", GPT_4_1);
    map.insert("gpt-4.1-mini", GPT_4_1_MINI);
    map.insert("gpt-4.1-mini-2025-04-14", GPT_4_1_MINI);
    map.insert("gpt-4-turbo", GPT_4_TURBO);
    map.insert("gpt-5", GPT_5);
    map.insert("gpt-5-2025-08-07", GPT_5);
    map.insert("gpt-5-mini", GPT_5_MINI);
    map.insert("gpt-5-mini-2025-08-07", GPT_5_MINI);

    // DeepInfra
    map.insert(
        "meta-llama/Llama-4-Maverick-17B-128E-Instruct-FP8",
        LLAMA_4_MAVERICK,
    );
    map.insert("meta-llama/Llama-4-Scout-17B-16E-Instruct", LLAMA_4_SCOUT);
    map.insert("meta-llama/Llama-3.3-70B-Instruct", LLAMA_3_3_70B);
    map.insert(
        "meta-llama/Llama-3.2-11B-Vision-Instruct",
        LLAMA_3_2_11B_VISION,
    );

    // OpenRouter routes for the same models
    map.insert("openai/gpt-4.1", GPT_4_1);
    map.insert("openai/gpt-4.1-mini", GPT_4_1_MINI);
    map.insert("openai/gpt-5", GPT_5);
    map.insert("openai/gpt-5-mini", GPT_5_MINI);
    map.insert("meta-llama/llama-4-maverick", LLAMA_4_MAVERICK);
    map.insert("meta-llama/llama-4-scout", LLAMA_4_SCOUT);

    map
}

/// Get pricing for a model.
pub fn get_pricing(model_id: &str) -> Option<ModelPricing> {
    let map = PRICING_MAP.get_or_init(init_pricing);
    map.get(model_id).copied()
}

/// Calculate chat cost.
pub fn chat_cost(model: &str, input_tokens: u32, output_tokens: u32) -> i64 {
    // Default to a mid-range model if unknown
    let default = ModelPricing::new("unknown", 1_000, 5_000);
    let pricing = get_pricing(model).unwrap_or(default);
    pricing.calculate_cost(input_tokens, output_tokens)
}

/// Nanodollars to dollars, for display.
pub fn nanos_to_usd(nanos: i64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}
