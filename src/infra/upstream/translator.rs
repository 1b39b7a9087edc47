use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    application::upstream::TranslationSource,
    domain::{creatures::TranslationKind, error::LookupError},
    util::text::collapse_whitespace,
};

use super::{body_snippet, endpoint, read_error_body};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    success: TranslateSuccess,
    contents: TranslateContents,
}

#[derive(Debug, Deserialize)]
struct TranslateSuccess {
    total: u32,
}

#[derive(Debug, Deserialize)]
struct TranslateContents {
    translated: String,
}

#[derive(Debug, Deserialize)]
struct TranslateErrorResponse {
    error: TranslateErrorMessage,
}

#[derive(Debug, Deserialize)]
struct TranslateErrorMessage {
    message: String,
}

fn error_detail(body: &[u8]) -> String {
    match serde_json::from_slice::<TranslateErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body_snippet(body),
    }
}

/// Translation service reached over HTTP (`POST <base>/<kind>.json`).
#[derive(Clone, Debug)]
pub struct TranslatorClient {
    client: Client,
    base: Url,
}

impl TranslatorClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }
}

#[async_trait]
impl TranslationSource for TranslatorClient {
    async fn translate(&self, text: &str, kind: TranslationKind) -> Result<String, LookupError> {
        let url = endpoint(&self.base, &format!("{kind}.json"))?;
        debug!(target = "pokedex::upstream::translator", %url, "requesting translation");

        let response = self
            .client
            .post(url.clone())
            .json(&TranslateRequest { text })
            .send()
            .await
            .map_err(|err| {
                LookupError::upstream(format!("{kind} translation request to {url} failed: {err}"))
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            let detail = error_detail(&read_error_body(response).await);
            if status == StatusCode::TOO_MANY_REQUESTS {
                info!(
                    target = "pokedex::upstream::translator",
                    detail = %detail,
                    "translation rate limit hit"
                );
                return Err(LookupError::TooManyRequests);
            }
            return Err(LookupError::upstream(format!(
                "unexpected status {} for {kind} translation: {detail}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await.map_err(|err| {
            LookupError::upstream(format!("failed to read {kind} translation body: {err}"))
        })?;
        let parsed: TranslateResponse = serde_json::from_slice(&body).map_err(|err| {
            LookupError::upstream(format!("failed to parse {kind} translation: {err}"))
        })?;
        if parsed.success.total != 1 {
            return Err(LookupError::upstream(format!(
                "{kind} translation reported success.total = {}",
                parsed.success.total
            )));
        }

        Ok(collapse_whitespace(&parsed.contents.translated))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer) -> TranslatorClient {
        let base = Url::parse(&server.url("/translate/")).expect("mock url");
        TranslatorClient::new(Client::new(), base)
    }

    #[tokio::test]
    async fn posts_text_to_kind_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/translate/yoda.json")
                .json_body(json!({ "text": "Master Obiwan has lost a planet." }));
            then.status(200).json_body(json!({
                "success": { "total": 1 },
                "contents": {
                    "translated": "Lost a planet,  master obiwan has. ",
                    "text": "Master Obiwan has lost a planet.",
                    "translation": "yoda"
                }
            }));
        });

        let translated = client(&server)
            .translate("Master Obiwan has lost a planet.", TranslationKind::Yoda)
            .await
            .expect("translated");

        mock.assert();
        assert_eq!(translated, "Lost a planet, master obiwan has.");
    }

    #[tokio::test]
    async fn rate_limit_is_too_many_requests() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/translate/shakespeare.json");
            then.status(429).json_body(json!({
                "error": { "code": 429, "message": "Too Many Requests: Rate limit of 5 requests per hour exceeded." }
            }));
        });

        let err = client(&server)
            .translate("Hello", TranslationKind::Shakespeare)
            .await
            .expect_err("rate limited");

        assert_eq!(err, LookupError::TooManyRequests);
    }

    #[tokio::test]
    async fn error_message_is_extracted_from_json_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/translate/yoda.json");
            then.status(500)
                .json_body(json!({ "error": { "message": "translator exploded" } }));
        });

        let err = client(&server)
            .translate("Hello", TranslationKind::Yoda)
            .await
            .expect_err("500");

        match err {
            LookupError::Upstream { message } => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("translator exploded"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsuccessful_total_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/translate/yoda.json");
            then.status(200).json_body(json!({
                "success": { "total": 0 },
                "contents": { "translated": "" }
            }));
        });

        let err = client(&server)
            .translate("Hello", TranslationKind::Yoda)
            .await
            .expect_err("total 0");

        assert!(matches!(err, LookupError::Upstream { .. }));
    }

    #[test]
    fn non_json_error_body_is_truncated() {
        let body = "x".repeat(3000);
        assert_eq!(error_detail(body.as_bytes()).len(), 1024);
    }
}
