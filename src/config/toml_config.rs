use crate::adapters::{
    AnnototAdapter, DocumentAnnotationAdapter, FileStorage, LocalStorageAdapter,
    MemoryDocumentStore, RestDocumentStore, StaticSession,
};
use crate::domain::model::Canvas;
use crate::domain::ports::{
    AdapterFactory, AnnotationAdapter, DocumentStore, SessionProvider, SessionUser,
};
use crate::utils::error::{AnnoError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub annotation: AnnotationSection,
    pub local: Option<LocalSection>,
    pub annotot: Option<AnnototSection>,
    pub document: Option<DocumentSection>,
    pub session: Option<SessionSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Local,
    Annotot,
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSection {
    pub adapter: AdapterKind,
    /// Offer JSON export of stored pages.
    pub export: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSection {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnototSection {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSection {
    /// REST base URL. Without it documents only live for the current process.
    pub endpoint: Option<String>,
    pub collection: Option<String>,
    pub manifest_id: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    pub user_id: String,
    pub display_name: Option<String>,
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl AppConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AnnoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AnnoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AnnoError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Local storage in `./annotations` with export enabled.
    pub fn local_default() -> Self {
        Self {
            annotation: AnnotationSection {
                adapter: AdapterKind::Local,
                export: Some(true),
            },
            local: Some(LocalSection {
                path: "./annotations".to_string(),
            }),
            annotot: None,
            document: None,
            session: None,
            logging: None,
        }
    }

    pub fn export_enabled(&self) -> bool {
        self.annotation.export.unwrap_or(false)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn session_provider(&self) -> Arc<dyn SessionProvider> {
        match &self.session {
            Some(section) => Arc::new(StaticSession::signed_in(SessionUser {
                uid: section.user_id.clone(),
                display_name: section.display_name.clone(),
                id_token: resolved_secret("session.id_token", &section.id_token),
            })),
            None => Arc::new(StaticSession::anonymous()),
        }
    }

    /// Builds the per-canvas adapter factory for the configured backend.
    pub fn adapter_factory(&self) -> Result<AdapterFactory> {
        self.validate()?;

        match self.annotation.adapter {
            AdapterKind::Local => {
                let section = validation::validate_required_field("local", &self.local)?;
                let storage = FileStorage::new(&section.path);
                tracing::debug!("Local annotation storage at {}", section.path);
                Ok(Arc::new(move |canvas: &Canvas| {
                    Box::new(LocalStorageAdapter::new(storage.clone(), canvas.id.clone()))
                        as Box<dyn AnnotationAdapter>
                }))
            }
            AdapterKind::Annotot => {
                let section = validation::validate_required_field("annotot", &self.annotot)?;
                let client = build_client(section.timeout_seconds)?;
                let template = AnnototAdapter::new(client, &section.endpoint, "")?
                    .with_token(resolved_secret("annotot.token", &section.token));
                tracing::debug!("Annotot server at {}", section.endpoint);
                Ok(Arc::new(move |canvas: &Canvas| {
                    Box::new(template.for_canvas(canvas.id.clone())) as Box<dyn AnnotationAdapter>
                }))
            }
            AdapterKind::Document => {
                let section = validation::validate_required_field("document", &self.document)?;
                let session = self.session_provider();
                let store: Arc<dyn DocumentStore> = match &section.endpoint {
                    Some(endpoint) => {
                        let client = build_client(section.timeout_seconds)?;
                        Arc::new(RestDocumentStore::new(client, endpoint, session.clone())?)
                    }
                    None => {
                        tracing::warn!(
                            "No document.endpoint configured, annotations are kept in memory only"
                        );
                        Arc::new(MemoryDocumentStore::new())
                    }
                };
                let collection = section
                    .collection
                    .clone()
                    .unwrap_or_else(|| crate::adapters::document::DEFAULT_COLLECTION.to_string());
                let default_manifest = section.manifest_id.clone();

                Ok(Arc::new(move |canvas: &Canvas| {
                    let manifest_id = canvas
                        .manifest_id
                        .clone()
                        .or_else(|| default_manifest.clone());
                    Box::new(
                        DocumentAnnotationAdapter::new(
                            store.clone(),
                            session.clone(),
                            canvas.id.clone(),
                        )
                        .with_collection(collection.clone())
                        .with_manifest(manifest_id),
                    ) as Box<dyn AnnotationAdapter>
                }))
            }
        }
    }
}

/// Empty values and `${VAR}` placeholders left by an unset variable count as no secret.
fn resolved_secret(field: &str, value: &Option<String>) -> Option<String> {
    let value = value.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("${") && value.ends_with('}') {
        tracing::warn!("{} refers to an unset variable {}, ignoring it", field, value);
        return None;
    }
    Some(value.to_string())
}

fn build_client(timeout_seconds: Option<u64>) -> Result<reqwest::Client> {
    let timeout = Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        match self.annotation.adapter {
            AdapterKind::Local => {
                let local = validation::validate_required_field("local", &self.local)?;
                validation::validate_path("local.path", &local.path)?;
            }
            AdapterKind::Annotot => {
                let annotot = validation::validate_required_field("annotot", &self.annotot)?;
                validation::validate_url("annotot.endpoint", &annotot.endpoint)?;
            }
            AdapterKind::Document => {
                let document = validation::validate_required_field("document", &self.document)?;
                if let Some(endpoint) = &document.endpoint {
                    validation::validate_url("document.endpoint", endpoint)?;
                }
                if let Some(collection) = &document.collection {
                    validation::validate_non_empty_string("document.collection", collection)?;
                }
            }
        }

        if let Some(session) = &self.session {
            validation::validate_non_empty_string("session.user_id", &session.user_id)?;
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(AnnoError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_local_config() {
        let toml_content = r#"
[annotation]
adapter = "local"
export = true

[local]
path = "./annotations"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.annotation.adapter, AdapterKind::Local);
        assert!(config.export_enabled());
        assert_eq!(config.log_level(), "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ANNO_STORE_TEST_TOKEN", "s3cret");

        let toml_content = r#"
[annotation]
adapter = "annotot"

[annotot]
endpoint = "http://127.0.0.1:3000/annotations"
token = "${ANNO_STORE_TEST_TOKEN}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.annotot.unwrap().token.as_deref(), Some("s3cret"));

        std::env::remove_var("ANNO_STORE_TEST_TOKEN");
    }

    #[test]
    fn test_unset_placeholder_is_not_a_secret() {
        let unset = Some("${ANNO_STORE_UNSET_TOKEN}".to_string());
        assert_eq!(resolved_secret("annotot.token", &unset), None);
        assert_eq!(resolved_secret("annotot.token", &Some("  ".to_string())), None);
        assert_eq!(resolved_secret("annotot.token", &None), None);
        assert_eq!(
            resolved_secret("annotot.token", &Some("abc".to_string())).as_deref(),
            Some("abc")
        );

        let config = AppConfig::from_toml_str(
            r#"
[annotation]
adapter = "document"

[session]
user_id = "u1"
id_token = "${ANNO_STORE_UNSET_ID_TOKEN}"
"#,
        )
        .unwrap();
        let user = config.session_provider().current_user().unwrap();
        assert_eq!(user.id_token, None);
    }

    #[test]
    fn test_missing_section_fails_validation() {
        let config = AppConfig::from_toml_str("[annotation]\nadapter = \"annotot\"\n").unwrap();
        assert!(config.validate().is_err());
        assert!(config.adapter_factory().is_err());
    }

    #[test]
    fn test_invalid_endpoint_and_level() {
        let bad_url = r#"
[annotation]
adapter = "annotot"
[annotot]
endpoint = "invalid-url"
"#;
        assert!(AppConfig::from_toml_str(bad_url).unwrap().validate().is_err());

        let bad_level = r#"
[annotation]
adapter = "document"
[document]
[logging]
level = "loud"
"#;
        assert!(AppConfig::from_toml_str(bad_level).unwrap().validate().is_err());
    }

    #[test]
    fn test_unknown_adapter_is_rejected() {
        assert!(AppConfig::from_toml_str("[annotation]\nadapter = \"firebase\"\n").is_err());
    }

    #[test]
    fn test_factory_scopes_adapters_per_canvas() {
        let config = AppConfig::from_toml_str(
            r#"
[annotation]
adapter = "annotot"
[annotot]
endpoint = "http://127.0.0.1:3000/annotations"
"#,
        )
        .unwrap();

        let factory = config.adapter_factory().unwrap();
        let first = factory(&Canvas::new("c1"));
        let second = factory(&Canvas::new("c2"));
        assert!(first.annotation_page_id().ends_with("uri=c1&format=w3c"));
        assert!(second.annotation_page_id().ends_with("uri=c2&format=w3c"));
    }

    #[test]
    fn test_document_config_uses_session() {
        let config = AppConfig::from_toml_str(
            r#"
[annotation]
adapter = "document"
[document]
manifest_id = "m1"
[session]
user_id = "u1"
display_name = "User One"
"#,
        )
        .unwrap();

        assert_eq!(config.session_provider().current_user().unwrap().uid, "u1");
        let adapter = config.adapter_factory().unwrap()(&Canvas::new("c1"));
        assert_eq!(adapter.annotation_page_id(), "c1/annotations");
        assert!(adapter.capabilities().requires_session);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[annotation]\nadapter = \"local\"\n[local]\npath = \"./out\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.local.unwrap().path, "./out");
    }
}
