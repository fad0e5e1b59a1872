use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Stable tag for a line of models that share wire quirks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelFamily {
    Claude3,
    Claude37,
    Claude4,
    Gpt,
    Gemini,
    Other,
}

impl ModelFamily {
    /// Best effort guess from a model code
    pub fn from_code(code: &str) -> Self {
        let code = code.to_ascii_lowercase();
        if code.starts_with("claude-3-7") {
            ModelFamily::Claude37
        } else if code.starts_with("claude-3") {
            ModelFamily::Claude3
        } else if code.starts_with("claude") {
            ModelFamily::Claude4
        } else if ["gpt", "o1", "o3", "o4"].iter().any(|p| code.starts_with(p)) {
            ModelFamily::Gpt
        } else if code.starts_with("gemini") {
            ModelFamily::Gemini
        } else {
            ModelFamily::Other
        }
    }
}

/// A model version together with its prices in USD per million tokens
///
/// The cached prices are the tiers providers bill for cache hits. For anthropic the input tier
/// is the cache write price and the output tier is the cache read price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub code: String,
    pub family: ModelFamily,
    pub input_price_per_mtok: f64,
    pub output_price_per_mtok: f64,
    pub cached_input_price_per_mtok: f64,
    pub cached_output_price_per_mtok: f64,
}

// code, family, input, output, cached input, cached output
const CATALOG: &[(&str, ModelFamily, f64, f64, f64, f64)] = &[
    ("claude-sonnet-4-5-20250929", ModelFamily::Claude4, 3.0, 15.0, 3.75, 0.3),
    ("claude-opus-4-1-20250805", ModelFamily::Claude4, 15.0, 75.0, 18.75, 1.5),
    ("claude-sonnet-4-20250514", ModelFamily::Claude4, 3.0, 15.0, 3.75, 0.3),
    ("claude-3-7-sonnet-20250219", ModelFamily::Claude37, 3.0, 15.0, 3.75, 0.3),
    ("claude-3-5-haiku-20241022", ModelFamily::Claude3, 0.8, 4.0, 1.0, 0.08),
    ("gpt-4.1", ModelFamily::Gpt, 2.0, 8.0, 0.5, 0.0),
    ("gpt-4.1-mini", ModelFamily::Gpt, 0.4, 1.6, 0.1, 0.0),
    ("gpt-4o", ModelFamily::Gpt, 2.5, 10.0, 1.25, 0.0),
    ("gemini-2.5-pro", ModelFamily::Gemini, 1.25, 10.0, 1.25, 10.0),
    ("gemini-2.5-flash", ModelFamily::Gemini, 0.3, 2.5, 0.3, 2.5),
];

impl ModelInfo {
    pub fn new<S: Into<String>>(
        code: S,
        family: ModelFamily,
        input_price_per_mtok: f64,
        output_price_per_mtok: f64,
        cached_input_price_per_mtok: f64,
        cached_output_price_per_mtok: f64,
    ) -> Self {
        Self {
            code: code.into(),
            family,
            input_price_per_mtok,
            output_price_per_mtok,
            cached_input_price_per_mtok,
            cached_output_price_per_mtok,
        }
    }

    /// Look a model up in the built in catalog, falling back to an unpriced descriptor
    pub fn from_code(code: &str) -> Self {
        CATALOG
            .iter()
            .find(|(known, ..)| *known == code)
            .map(|&(code, family, input, output, cached_input, cached_output)| {
                Self::new(code, family, input, output, cached_input, cached_output)
            })
            .unwrap_or_else(|| Self::new(code, ModelFamily::from_code(code), 0.0, 0.0, 0.0, 0.0))
    }

    pub fn claude_sonnet_4_5() -> Self {
        Self::from_code("claude-sonnet-4-5-20250929")
    }

    pub fn gpt_4_1() -> Self {
        Self::from_code("gpt-4.1")
    }

    pub fn gemini_2_5_pro() -> Self {
        Self::from_code("gemini-2.5-pro")
    }
}
