use crate::domain::model::{Annotation, AnnotationPage};
use crate::domain::ports::{AdapterCapabilities, AnnotationAdapter};
use crate::utils::error::{AnnoError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use url::Url;

/// Envelope the Annotot server expects for create and update.
#[derive(Debug, Serialize)]
struct AnnototRequest<'a> {
    annotation: AnnototRecord<'a>,
}

#[derive(Debug, Serialize)]
struct AnnototRecord<'a> {
    canvas: &'a str,
    /// The full annotation, serialised a second time as a string.
    data: String,
    uuid: &'a str,
}

/// Remote annotation server speaking the Annotot REST conventions.
#[derive(Debug, Clone)]
pub struct AnnototAdapter {
    client: Client,
    endpoint: Url,
    canvas_id: String,
    token: Option<String>,
}

impl AnnototAdapter {
    pub fn new(client: Client, endpoint: &str, canvas_id: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| AnnoError::InvalidConfigValueError {
            field: "annotot.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(AnnoError::InvalidConfigValueError {
                field: "annotot.endpoint".to_string(),
                value: endpoint.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        Ok(Self {
            client,
            endpoint,
            canvas_id: canvas_id.into(),
            token: None,
        })
    }

    /// Same server and token, scoped to another canvas.
    pub fn for_canvas(&self, canvas_id: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            ..self.clone()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn url_with_segment(&self, segment: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    fn pages_url(&self) -> Url {
        let mut url = self.url_with_segment("pages");
        url.query_pairs_mut()
            .append_pair("uri", &self.canvas_id)
            .append_pair("format", "w3c");
        url
    }

    fn annotation_url(&self, id: &str) -> Url {
        self.url_with_segment(id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn request_body<'a>(&'a self, annotation: &'a Annotation) -> Result<AnnototRequest<'a>> {
        Ok(AnnototRequest {
            annotation: AnnototRecord {
                canvas: &self.canvas_id,
                data: serde_json::to_string(annotation)?,
                uuid: &annotation.id,
            },
        })
    }

    async fn check_status(response: Response, id: &str) -> Result<Response> {
        let status = response.status();
        tracing::debug!("Annotot response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(AnnoError::AuthenticationRequired {
                backend: "annotot".to_string(),
            }),
            StatusCode::FORBIDDEN => Err(AnnoError::NotAuthorized { id: id.to_string() }),
            StatusCode::NOT_FOUND => Err(AnnoError::NotFound { id: id.to_string() }),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(AnnoError::Remote {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl AnnotationAdapter for AnnototAdapter {
    /// The page key is the plain `{endpoint}/pages?uri={canvas}&format=w3c` string,
    /// the canvas IRI unencoded. Requests go to the encoded `pages_url`.
    fn annotation_page_id(&self) -> String {
        format!(
            "{}/pages?uri={}&format=w3c",
            self.endpoint.as_str().trim_end_matches('/'),
            self.canvas_id
        )
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    async fn create(&self, annotation: Annotation) -> Result<AnnotationPage> {
        tracing::debug!("POST {} ({})", self.endpoint, annotation.id);
        let body = self.request_body(&annotation)?;
        let response = self
            .authorize(self.client.post(self.endpoint.clone()))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response, &annotation.id).await?;
        self.all().await
    }

    async fn update(&self, annotation: Annotation) -> Result<AnnotationPage> {
        let url = self.annotation_url(&annotation.id);
        tracing::debug!("PATCH {}", url);
        let body = self.request_body(&annotation)?;
        let response = self
            .authorize(self.client.patch(url))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response, &annotation.id).await?;
        self.all().await
    }

    async fn delete(&self, id: &str) -> Result<AnnotationPage> {
        let url = self.annotation_url(id);
        tracing::debug!("DELETE {}", url);
        let response = self.authorize(self.client.delete(url)).send().await?;
        Self::check_status(response, id).await?;
        self.all().await
    }

    async fn get(&self, id: &str) -> Result<Option<Annotation>> {
        let page = self.all().await?;
        Ok(page.items.into_iter().find(|item| item.id == id))
    }

    async fn all(&self) -> Result<AnnotationPage> {
        let page_id = self.annotation_page_id();
        let response = self
            .authorize(self.client.get(self.pages_url()))
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Annotot server requires a token, returning empty page");
            return Ok(AnnotationPage::empty(page_id));
        }

        let response = Self::check_status(response, &page_id).await?;
        let mut page: AnnotationPage = response.json().await?;
        if page.id.is_empty() {
            page.id = page_id;
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::web_annotation::AnnotationDraft;
    use httpmock::prelude::*;
    use serde_json::json;

    fn adapter(server: &MockServer, canvas: &str) -> AnnototAdapter {
        AnnototAdapter::new(Client::new(), &server.url("/annotations"), canvas).unwrap()
    }

    fn page_json(items: serde_json::Value) -> serde_json::Value {
        json!({"id": "page", "items": items, "type": "AnnotationPage"})
    }

    #[test]
    fn test_page_id_is_pages_query() {
        let adapter =
            AnnototAdapter::new(Client::new(), "http://127.0.0.1:3000/annotations", "c1").unwrap();
        assert_eq!(
            adapter.annotation_page_id(),
            "http://127.0.0.1:3000/annotations/pages?uri=c1&format=w3c"
        );
        assert_eq!(adapter.annotation_page_id(), adapter.annotation_page_id());
        assert!(!adapter.capabilities().export);
    }

    #[tokio::test]
    async fn test_page_id_keeps_canvas_iri_literal() {
        let server = MockServer::start();
        let canvas = "https://example.org/iiif/book/canvas/p1";
        let pages_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/annotations/pages")
                .query_param("uri", canvas)
                .query_param("format", "w3c");
            then.status(200).json_body(json!({"items": [], "type": "AnnotationPage"}));
        });

        let adapter = adapter(&server, canvas);
        let expected = format!(
            "{}/pages?uri=https://example.org/iiif/book/canvas/p1&format=w3c",
            server.url("/annotations")
        );
        assert_eq!(adapter.annotation_page_id(), expected);

        let page = adapter.all().await.unwrap();
        pages_mock.assert();
        assert_eq!(page.id, expected);
    }

    #[test]
    fn test_ids_are_path_encoded() {
        let adapter =
            AnnototAdapter::new(Client::new(), "http://127.0.0.1:3000/annotations/", "c1").unwrap();
        assert_eq!(
            adapter.annotation_url("https://x.org/a 1").as_str(),
            "http://127.0.0.1:3000/annotations/https:%2F%2Fx.org%2Fa%201"
        );
    }

    #[test]
    fn test_rejects_non_base_endpoint() {
        assert!(AnnototAdapter::new(Client::new(), "mailto:someone", "c1").is_err());
        assert!(AnnototAdapter::new(Client::new(), "not a url", "c1").is_err());
    }

    #[tokio::test]
    async fn test_create_posts_envelope_and_refreshes() {
        let server = MockServer::start();
        let mut draft = AnnotationDraft::new("c1").with_body("hello");
        draft.id = "anno-1".to_string();
        let annotation = draft.to_annotation();

        let post_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/annotations")
                .header("Authorization", "Bearer secret")
                .json_body_includes(r#"{"annotation": {"uuid": "anno-1", "canvas": "c1"}}"#);
            then.status(201);
        });
        let pages_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/annotations/pages")
                .query_param("uri", "c1")
                .query_param("format", "w3c");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(page_json(json!([serde_json::to_value(&annotation).unwrap()])));
        });

        let page = adapter(&server, "c1")
            .with_token(Some("secret".to_string()))
            .create(annotation)
            .await
            .unwrap();

        post_mock.assert();
        pages_mock.assert();
        assert_eq!(page.len(), 1);
        assert_eq!(page.items[0].text(), Some("hello"));
    }

    #[tokio::test]
    async fn test_update_and_delete_map_status_codes() {
        let server = MockServer::start();
        let patch_mock = server.mock(|when, then| {
            when.method(PATCH).path("/annotations/missing");
            then.status(404);
        });
        let delete_mock = server.mock(|when, then| {
            when.method(DELETE).path("/annotations/theirs");
            then.status(403);
        });

        let adapter = adapter(&server, "c1");
        let mut draft = AnnotationDraft::new("c1").with_body("x");
        draft.id = "missing".to_string();

        let err = adapter.update(draft.to_annotation()).await.unwrap_err();
        assert!(matches!(err, AnnoError::NotFound { ref id } if id == "missing"));

        let err = adapter.delete("theirs").await.unwrap_err();
        assert!(matches!(err, AnnoError::NotAuthorized { .. }));

        patch_mock.assert();
        delete_mock.assert();
    }

    #[tokio::test]
    async fn test_all_without_credentials_is_empty() {
        let server = MockServer::start();
        let pages_mock = server.mock(|when, then| {
            when.method(GET).path("/annotations/pages");
            then.status(401);
        });

        let adapter = adapter(&server, "c1");
        let page = adapter.all().await.unwrap();

        pages_mock.assert();
        assert!(page.is_empty());
        assert_eq!(page.id, adapter.annotation_page_id());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/annotations/pages");
            then.status(500).body("boom");
        });

        let err = adapter(&server, "c1").all().await.unwrap_err();
        match err {
            AnnoError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_finds_item_in_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/annotations/pages");
            then.status(200).json_body(page_json(json!([
                {"body": {"type": "TextualBody", "value": "a"}, "id": "x", "target": "c1", "type": "Annotation"}
            ])));
        });

        let adapter = adapter(&server, "c1");
        assert!(adapter.get("x").await.unwrap().is_some());
        assert!(adapter.get("y").await.unwrap().is_none());
    }
}
