use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use sceneforge_contracts::{
    EditablePoint, ImagePayload, Language, PointDraft, RenderOptions, VisualAnalysis,
};
use serde_json::{json, Value};

use crate::services::{
    ExpansionRequest, ProductAnalyzer, PromptTranslator, SceneRenderer, SellingPointExpander,
    StudioBackend,
};
use crate::util::{extract_json_from_text, first_non_empty_env, truncate_text};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini `generateContent` transport for all four studio capabilities.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    api_base: String,
    api_key: Option<String>,
    text_model: String,
    image_model: String,
    timeout: Duration,
    transport_retries: usize,
    retry_backoff: Duration,
    http: HttpClient,
}

impl GeminiBackend {
    pub fn from_env() -> Self {
        let api_base = env::var("GEMINI_API_BASE")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_base,
            api_key: first_non_empty_env(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            text_model: first_non_empty_env(&["SCENEFORGE_TEXT_MODEL"])
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: first_non_empty_env(&["SCENEFORGE_IMAGE_MODEL"])
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            timeout: Duration::from_secs(90),
            transport_retries: 2,
            retry_backoff: Duration::from_millis(1200),
            http: HttpClient::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_transport(mut self, timeout: Duration, retries: usize, backoff: Duration) -> Self {
        self.timeout = timeout;
        self.transport_retries = retries.min(4);
        self.retry_backoff = backoff;
        self
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(model);
        let response = self.post_with_transport_retries(&endpoint, api_key, payload)?;
        response_json_or_error(response)
    }

    fn post_with_transport_retries(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(self.timeout)
                .json(payload)
                .send();
            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let retryable = raw.is_timeout() || raw.is_connect();
                    let err = anyhow::Error::new(raw)
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !retryable || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max = self.transport_retries,
                        "Gemini transport retry after transient request failure"
                    );
                    thread::sleep(self.retry_backoff * attempt as u32);
                }
            }
        }
    }
}

impl StudioBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }
}

impl ProductAnalyzer for GeminiBackend {
    fn analyze(
        &self,
        image: &ImagePayload,
        competitor_context: Option<&str>,
    ) -> Result<VisualAnalysis> {
        let payload = analysis_payload(image, competitor_context);
        let response = self.generate_content(&self.text_model, &payload)?;
        let text = extract_text(&response);
        let parsed = extract_json_from_text(&text, '{', '}')
            .with_context(|| format!("analysis was not JSON: {}", truncate_text(&text, 200)))?;
        serde_json::from_value(parsed).context("analysis JSON missing fields")
    }
}

impl PromptTranslator for GeminiBackend {
    fn translate(&self, text: &str, target: Language) -> Result<String> {
        let instruction = translation_instruction(text, target);
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
        });
        let response = self.generate_content(&self.text_model, &payload)?;
        let translated = extract_text(&response).trim().to_string();
        if translated.is_empty() {
            bail!("Gemini returned an empty translation");
        }
        Ok(translated)
    }
}

impl SellingPointExpander for GeminiBackend {
    fn expand(&self, request: &ExpansionRequest) -> Result<Vec<PointDraft>> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": expansion_instruction(request) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "slogan": { "type": "STRING" },
                            "promptEn": { "type": "STRING" },
                            "promptZh": { "type": "STRING" },
                        },
                        "required": ["slogan", "promptEn", "promptZh"],
                    },
                },
            },
        });
        let response = self.generate_content(&self.text_model, &payload)?;
        parse_drafts(&extract_text(&response))
    }
}

impl SceneRenderer for GeminiBackend {
    fn render(
        &self,
        image: &ImagePayload,
        point: &EditablePoint,
        options: RenderOptions,
    ) -> Result<ImagePayload> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [inline_image_part(image), { "text": render_instruction(point) }],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": options.aspect_ratio.as_str(),
                    "imageSize": options.image_size.as_str(),
                },
            },
        });
        let response = self.generate_content(&self.image_model, &payload)?;
        extract_image(&response)?.context("Gemini returned no image data")
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response.text().context("Gemini response body read failed")?;
    if !status.is_success() {
        bail!(
            "Gemini request failed ({}): {}",
            status.as_u16(),
            truncate_text(&body, 512)
        );
    }
    serde_json::from_str(&body).context("Gemini returned invalid JSON payload")
}

fn inline_image_part(image: &ImagePayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.base64(),
        }
    })
}

fn analysis_payload(image: &ImagePayload, competitor_context: Option<&str>) -> Value {
    let context_line = competitor_context
        .map(|link| format!(" Use this competitor listing as extra context: {link}."))
        .unwrap_or_default();
    let instruction = format!(
        "Identify the product in this photo.{context_line} Answer with a JSON object holding \
         'subject' (what the product is), 'accessories' (items included with it) and \
         'materials' (surface texture and build). Output JSON only."
    );
    let mut payload = json!({
        "contents": [{
            "role": "user",
            "parts": [inline_image_part(image), { "text": instruction }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "subject": { "type": "STRING" },
                    "accessories": { "type": "STRING" },
                    "materials": { "type": "STRING" },
                },
                "required": ["subject", "accessories", "materials"],
            },
        },
    });
    if competitor_context.is_some() {
        payload["tools"] = json!([{ "googleSearch": {} }]);
    }
    payload
}

fn translation_instruction(text: &str, target: Language) -> String {
    let direction = match target {
        Language::En => {
            "Rewrite this Chinese description of a commercial scene as a detailed English image-generation prompt."
        }
        Language::Zh => {
            "Rewrite this English image-generation prompt as a descriptive Chinese scene reference."
        }
    };
    format!(
        "You translate advertising copy. {direction}\n\nText: \"{text}\"\n\nReply with the translation only."
    )
}

fn expansion_instruction(request: &ExpansionRequest) -> String {
    let numbered = request
        .points
        .iter()
        .enumerate()
        .map(|(idx, point)| format!("{}. {point}", idx + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are the creative director of a product photo shoot.\n\
         Product: {} ({}).\n\
         Competitor context: {}.\n\
         Market: {}. Category: {}. Platform: {}.\n\
         Scene style: {}\n\n\
         For every selling point below write a punchy slogan of at most five words, a detailed \
         English image prompt, and a descriptive Chinese version of that prompt. Keep the order \
         of the list and return exactly one entry per point.\n\n\
         Selling points:\n{numbered}\n\n\
         Return a JSON array of objects with keys 'slogan', 'promptEn' and 'promptZh'.",
        request.analysis.subject,
        request.analysis.materials,
        request.competitor_context.as_deref().unwrap_or("none"),
        request.market,
        request.category,
        request.platform,
        request.style_template,
    )
}

/// Fidelity and typography instruction sent with the source image.
pub(crate) fn render_instruction(point: &EditablePoint) -> String {
    format!(
        "Place the product from the source photo into this scene without altering it: {}.\n\
         - Keep the product's size, proportions and shape exactly as photographed.\n\
         - Keep its colours, materials and textures unchanged.\n\
         - Add a {} size slogan in {} text reading \"{}\", laid out as part of a professional composition.",
        point.scene_instruction(),
        point.font_size,
        point.font_color,
        point.slogan,
    )
}

fn candidate_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| {
            candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
        })
        .flatten()
}

fn extract_text(response: &Value) -> String {
    candidate_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

fn extract_image(response: &Value) -> Result<Option<ImagePayload>> {
    for part in candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("Gemini image base64 decode failed")?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png");
        return Ok(Some(ImagePayload::new(bytes, mime_type)));
    }
    Ok(None)
}

fn parse_drafts(text: &str) -> Result<Vec<PointDraft>> {
    let parsed = extract_json_from_text(text, '[', ']')
        .with_context(|| format!("expansion was not a JSON array: {}", truncate_text(text, 200)))?;
    serde_json::from_value(parsed).context("expansion entries missing fields")
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    use sceneforge_contracts::{AspectRatio, FontColor, FontSize, ImageSize, PointId};

    use super::*;

    fn point() -> EditablePoint {
        EditablePoint {
            id: PointId::from("pt-1"),
            slogan: "Stay Cold".to_string(),
            prompt_zh: "冰块".to_string(),
            prompt_en: "mug among ice cubes".to_string(),
            font_size: FontSize::ExtraLarge,
            font_color: FontColor::Cyan,
            remarks: "blue rim light".to_string(),
        }
    }

    fn backend(api_base: &str) -> GeminiBackend {
        GeminiBackend::from_env()
            .with_api_base(api_base)
            .with_api_key(Some("test-key".to_string()))
            .with_transport(Duration::from_secs(5), 0, Duration::from_millis(1))
    }

    /// Serves one canned HTTP response and hands back the raw request.
    fn serve_once(
        status: &str,
        body: String,
    ) -> anyhow::Result<(String, thread::JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        let status = status.to_string();
        let handle = thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return String::new();
            };
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let Ok(read) = stream.read(&mut buf) else { break };
                if read == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..read]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .and_then(|value| value.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            String::from_utf8_lossy(&raw).to_string()
        });
        Ok((base, handle))
    }

    #[test]
    fn translate_posts_to_text_model_and_trims_answer() -> anyhow::Result<()> {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  A mug on an oak table \n" }] } }]
        })
        .to_string();
        let (base, server) = serve_once("200 OK", body)?;

        let translated = backend(&base).translate("橡木桌上的杯子", Language::En)?;
        assert_eq!(translated, "A mug on an oak table");

        let request = server.join().unwrap_or_default();
        assert!(request.contains(":generateContent"));
        assert!(request.contains("key=test-key"));
        assert!(request.contains("橡木桌上的杯子"));
        Ok(())
    }

    #[test]
    fn render_sends_requested_shape_and_decodes_image() -> anyhow::Result<()> {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": BASE64.encode([7u8, 8, 9]) } }
            ] } }]
        })
        .to_string();
        let (base, server) = serve_once("200 OK", body)?;

        let options = RenderOptions {
            aspect_ratio: AspectRatio::Tall,
            image_size: ImageSize::TwoK,
        };
        let image = ImagePayload::new(vec![1, 2, 3], "image/png");
        let output = backend(&base).render(&image, &point(), options)?;
        assert_eq!(output, ImagePayload::new(vec![7, 8, 9], "image/png"));

        let request = server.join().unwrap_or_default();
        assert!(request.contains("\"imageSize\":\"2K\""));
        assert!(request.contains("\"aspectRatio\":\"9:16\""));
        Ok(())
    }

    #[test]
    fn http_errors_surface_status_and_body() -> anyhow::Result<()> {
        let body = "{\"error\":\"quota\"}".to_string();
        let (base, server) = serve_once("429 Too Many Requests", body)?;
        let err = backend(&base)
            .translate("hi", Language::Zh)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        let _ = server.join();
        assert!(err.contains("429"));
        assert!(err.contains("quota"));
        Ok(())
    }

    #[test]
    fn missing_key_fails_without_network() {
        let backend = GeminiBackend::from_env()
            .with_api_base("http://127.0.0.1:9")
            .with_api_key(None);
        let err = backend.translate("hi", Language::En).err();
        assert!(err.is_some());
    }

    #[test]
    fn render_instruction_carries_typography_and_remarks() {
        let text = render_instruction(&point());
        assert!(text.contains("mug among ice cubes. Additional details: blue rim light"));
        assert!(text.contains("extra large size slogan in cyan text reading \"Stay Cold\""));
    }

    #[test]
    fn extract_image_decodes_first_inline_part() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/jpeg", "data": BASE64.encode([1u8, 2, 3]) } }
            ] } }]
        });
        let image = extract_image(&response)?;
        assert_eq!(image, Some(ImagePayload::new(vec![1, 2, 3], "image/jpeg")));
        assert_eq!(extract_image(&json!({ "candidates": [] }))?, None);
        Ok(())
    }

    #[test]
    fn parse_drafts_tolerates_code_fences() -> anyhow::Result<()> {
        let text = "```json\n[{\"slogan\":\"Cold\",\"promptEn\":\"ice\",\"promptZh\":\"冰\"}]\n```";
        let drafts = parse_drafts(text)?;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].prompt_zh, "冰");
        assert!(parse_drafts("no json here").is_err());
        Ok(())
    }

    #[test]
    fn analysis_payload_enables_search_only_with_context() {
        let image = ImagePayload::new(vec![0], "image/png");
        assert!(analysis_payload(&image, None).get("tools").is_none());
        let with_link = analysis_payload(&image, Some("https://example.com/item"));
        assert_eq!(with_link["tools"][0], json!({ "googleSearch": {} }));
        assert_eq!(
            with_link["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            json!("image/png")
        );
    }

    #[test]
    fn endpoint_accepts_prefixed_model_names() {
        let backend = backend("https://example.test/v1beta/");
        assert_eq!(
            backend.endpoint_for_model("models/gemini-x"),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
        assert_eq!(
            backend.endpoint_for_model(" gemini-y "),
            "https://example.test/v1beta/models/gemini-y:generateContent"
        );
    }
}
