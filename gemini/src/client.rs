use crate::wire::GenerateRequest;
use crate::wire::GenerateResponse;
use crate::wire::GenerationConfig;
use crate::wire::Tool;
use gear_vault_store::config::GeminiConfig;
use gear_vault_store::enrich::DescriptionWriter;
use gear_vault_store::enrich::LookupError;
use gear_vault_store::enrich::MetadataLookup;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const USER_AGENT: &str = concat!("gear-vault/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SEARCH_TEMPERATURE: f64 = 0.1;

/// Prompt for a grounded search that answers in `IMAGE:`/`STORE:` lines.
pub fn lookup_prompt(gear_name: &str) -> String {
    format!(
        "Search for accurate information about the audio equipment \"{gear_name}\".\n\
         \n\
         Required:\n\
         1. IMAGE_URL: a direct link to a high-resolution product photo showing the whole unit on a white background.\n\
         2. STORE_URL: the product page at a major retailer (Sound House, Amazon, Sweetwater).\n\
         \n\
         Answer in exactly this format and nothing else:\n\
         IMAGE: [URL]\n\
         STORE: [URL]"
    )
}

pub fn polish_prompt(name: &str, notes: &str) -> String {
    format!(
        "Rewrite the following review of a piece of audio equipment so it reads professional and engaging.\n\
         Equipment: {name}\n\
         Notes: {notes}\n\
         \n\
         Structure:\n\
         - Sentence 1: what the equipment is\n\
         - Sentence 2: its specific features or strengths\n\
         - Sentence 3: an overall verdict\n\
         \n\
         Keep it concise and let the enthusiasm show."
    )
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    search_model: String,
    text_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("search_model", &self.search_model)
            .field("text_model", &self.text_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            search_model: config.search_model.clone(),
            text_model: config.text_model.clone(),
        })
    }

    /// Build a client whose API key comes from the environment variable
    /// named by `config.api_key_env`.
    pub fn from_env(config: &GeminiConfig) -> anyhow::Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        let Some(key) = key else {
            anyhow::bail!(
                "no Gemini API key: set {} in the environment",
                config.api_key_env
            );
        };
        Self::new(config, key)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, LookupError> {
        tracing::debug!(model, "sending generateContent request");
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Other(format!("unreadable response: {e}")))?;
        parsed.text().ok_or(LookupError::EmptyResponse)
    }
}

impl MetadataLookup for GeminiClient {
    async fn lookup(&self, query: &str) -> Result<String, LookupError> {
        let mut request = GenerateRequest::prompt(lookup_prompt(query));
        request.tools.push(Tool::GoogleSearch {});
        request.generation_config = Some(GenerationConfig {
            temperature: SEARCH_TEMPERATURE,
        });
        self.generate(&self.search_model, &request).await
    }
}

impl DescriptionWriter for GeminiClient {
    async fn polish(&self, name: &str, notes: &str) -> Result<String, LookupError> {
        let request = GenerateRequest::prompt(polish_prompt(name, notes));
        self.generate(&self.text_model, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let config = GeminiConfig {
            base_url: "http://localhost:9999/".to_string(),
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new(&config, "k").unwrap();
        assert_eq!(
            client.endpoint("gemini-3-pro-preview"),
            "http://localhost:9999/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[test]
    fn prompts_carry_the_inputs() {
        let prompt = lookup_prompt("Neumann U87ai");
        assert!(prompt.contains("\"Neumann U87ai\""));
        assert!(prompt.contains("IMAGE: [URL]"));
        assert!(prompt.contains("STORE: [URL]"));
        let prompt = polish_prompt("Shure SM7B", "great on vocals");
        assert!(prompt.contains("Shure SM7B"));
        assert!(prompt.contains("great on vocals"));
    }

    #[test]
    fn debug_hides_the_key() {
        let client = GeminiClient::new(&GeminiConfig::default(), "secret-key").unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}
