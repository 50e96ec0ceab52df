use crate::config::AssistantConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System prompt for the chat assistant. `{context}` is replaced with the
/// ledger snapshot so answers can reference real jobs and numbers.
const CHAT_PERSONA: &str = "\
Você é o assistente virtual do Bill, um pintor profissional.
O Bill usa este aplicativo para gerenciar suas obras.
Responda de forma curta, direta e amigável (em Português do Brasil).
O Bill não gosta de termos técnicos de computador, fale a língua dele (construção civil, pintura).

Contexto atual dos dados do Bill:
{context}

Se ele perguntar sobre orçamento, ajude-o a calcular baseando-se em áreas quadradas padrão (tinta rende aprox 10m²/litro).";

/// Instruction template for wall repaint previews. Keeps the room intact
/// so only the painted surfaces change.
const IMAGE_EDIT_TEMPLATE: &str = "Apply the following modification to the room/wall in the image: {prompt}. Maintain photorealism. Keep the furniture and structure intact, only change the wall surface/color.";

/// REST client for the text and image generation endpoints.
pub struct AssistantClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    image_model: String,
    temperature: f32,
}

impl AssistantClient {
    pub fn new(cfg: &AssistantConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: cfg.base_url.clone(),
            chat_model: cfg.chat_model.clone(),
            image_model: cfg.image_model.clone(),
            temperature: cfg.temperature,
        }
    }

    /// Answer a business question, grounded in the ledger context.
    pub async fn ask(&self, prompt: &str, context_data: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent::user(RequestPart::text(prompt))],
            system_instruction: Some(RequestContent::bare(RequestPart::text(
                CHAT_PERSONA.replace("{context}", context_data),
            ))),
            generation_config: Some(RequestGenerationConfig {
                temperature: Some(self.temperature),
                response_modalities: None,
            }),
        };

        let response = self.generate(&self.chat_model, &request).await?;
        let answer = response
            .first_part()
            .and_then(|part| part.text.clone())
            .unwrap_or_else(|| "Desculpe, não consegui entender.".to_string());
        Ok(answer)
    }

    /// Render a repaint preview from a photo. Returns the edited image as
    /// base64, or None when the model answered without one.
    pub async fn edit_image(
        &self,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> Result<Option<String>> {
        let request = GenerateRequest {
            contents: vec![RequestContent::user_parts(vec![
                RequestPart::inline_data(mime_type, image_base64),
                RequestPart::text(IMAGE_EDIT_TEMPLATE.replace("{prompt}", instruction)),
            ])],
            system_instruction: None,
            generation_config: Some(RequestGenerationConfig {
                temperature: None,
                response_modalities: Some(vec!["IMAGE".to_string()]),
            }),
        };

        let response = self.generate(&self.image_model, &request).await?;
        let image = response
            .first_part()
            .and_then(|part| part.inline_data.as_ref())
            .map(|blob| blob.data.clone())
            .filter(|data| !data.is_empty());
        Ok(image)
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        // The key travels as a query parameter, so the URL must never
        // appear in logs or error chains.
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        debug!("Calling generateContent on {}", model);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Request to model {} failed", model))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Model {} returned status {}: {}", model, status, body);
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to parse response from model {}", model))
    }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<RequestGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<RequestPart>,
}

impl RequestContent {
    fn user(part: RequestPart) -> Self {
        Self::user_parts(vec![part])
    }

    fn user_parts(parts: Vec<RequestPart>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// System instructions carry no role.
    fn bare(part: RequestPart) -> Self {
        Self {
            role: None,
            parts: vec![part],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<RequestBlob>,
}

impl RequestPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline_data(mime_type: &str, data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(RequestBlob {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

// ============================================================================
// Response payloads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn first_part(&self) -> Option<&CandidatePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
    }
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<CandidateBlob>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateBlob {
    #[serde(default)]
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_camel_case() {
        let request = GenerateRequest {
            contents: vec![RequestContent::user(RequestPart::text("quanto gastei?"))],
            system_instruction: Some(RequestContent::bare(RequestPart::text("persona"))),
            generation_config: Some(RequestGenerationConfig {
                temperature: Some(0.7),
                response_modalities: None,
            }),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value.pointer("/contents/0/parts/0/text").unwrap(),
            "quanto gastei?"
        );
        assert_eq!(value.pointer("/contents/0/role").unwrap(), "user");
        assert!(value.pointer("/systemInstruction/parts/0/text").is_some());
        assert!(value.pointer("/systemInstruction/role").is_none());
        assert_eq!(
            value.pointer("/generationConfig/temperature").unwrap(),
            0.7
        );
        assert!(value.pointer("/generationConfig/responseModalities").is_none());
    }

    #[test]
    fn image_request_carries_inline_data_and_modality() {
        let request = GenerateRequest {
            contents: vec![RequestContent::user_parts(vec![
                RequestPart::inline_data("image/jpeg", "Zm9v"),
                RequestPart::text("paint it blue"),
            ])],
            system_instruction: None,
            generation_config: Some(RequestGenerationConfig {
                temperature: None,
                response_modalities: Some(vec!["IMAGE".to_string()]),
            }),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value
                .pointer("/contents/0/parts/0/inlineData/mimeType")
                .unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            value.pointer("/contents/0/parts/0/inlineData/data").unwrap(),
            "Zm9v"
        );
        assert_eq!(
            value
                .pointer("/generationConfig/responseModalities/0")
                .unwrap(),
            "IMAGE"
        );
    }

    #[test]
    fn response_text_is_extracted_from_first_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Olá Bill!"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.first_part().and_then(|p| p.text.as_deref()),
            Some("Olá Bill!")
        );
    }

    #[test]
    fn empty_response_has_no_parts() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.first_part().is_none());
    }

    #[test]
    fn image_response_exposes_inline_data() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "YWJj"}}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        let data = response
            .first_part()
            .and_then(|p| p.inline_data.as_ref())
            .map(|blob| blob.data.as_str());
        assert_eq!(data, Some("YWJj"));
    }
}
