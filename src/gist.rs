//! GitHub Gist client: the shared backing store for tag data
//!
//! The store lives as a single JSON file inside one (secret) gist. Credentials
//! are kept in the Local Cache so later sessions reuse them.

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::local::{LocalCache, SETTINGS_KEY};
use crate::model::Store;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_FILENAME: &str = "slidetags-tags.json";
pub const DEFAULT_DESCRIPTION: &str = "Slide Tags - Tag Management Data";

const USER_AGENT: &str = concat!("slidetags/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Credentials persisted under the `gist-settings` key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GistSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub gist_id: Option<String>,
}

/// Connection options, normally taken from `[sync]` in config.toml
#[derive(Debug, Clone)]
pub struct GistOptions {
    pub api_base: String,
    pub filename: String,
    pub description: String,
    pub public: bool,
    pub timeout: Duration,
}

impl Default for GistOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for GistOptions {
    fn from(sync: &SyncConfig) -> Self {
        Self {
            api_base: sync.api_base.trim_end_matches('/').to_string(),
            filename: sync.filename.clone(),
            description: sync.description.clone(),
            public: sync.public,
            timeout: sync.timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GistStatus {
    pub has_token: bool,
    pub has_gist_id: bool,
    pub is_configured: bool,
}

#[derive(Serialize)]
struct GistPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public: Option<bool>,
    files: BTreeMap<&'a str, GistFilePayload>,
}

#[derive(Serialize)]
struct GistFilePayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct GistDocument {
    id: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Remote Store Client backed by the GitHub Gist REST API
pub struct GistClient {
    http: Client,
    options: GistOptions,
    settings: GistSettings,
    cache: LocalCache,
    /// Gist id confirmed reachable during this session
    verified: Option<String>,
}

impl GistClient {
    /// Build a client, picking up credentials saved by an earlier session
    pub fn new(options: GistOptions, cache: LocalCache) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()?;
        let settings = cache.load_json(SETTINGS_KEY).unwrap_or_default();
        Ok(Self {
            http,
            options,
            settings,
            cache,
            verified: None,
        })
    }

    pub fn settings(&self) -> &GistSettings {
        &self.settings
    }

    pub fn options(&self) -> &GistOptions {
        &self.options
    }

    fn save_settings(&self) {
        self.cache.save_json(SETTINGS_KEY, &self.settings);
    }

    /// Set credentials and persist them
    ///
    /// Without a gist id, one is provisioned on the first authenticated write.
    pub fn configure(&mut self, token: &str, gist_id: Option<&str>) {
        self.settings.token = Some(token.trim().to_string()).filter(|t| !t.is_empty());
        if let Some(id) = gist_id {
            self.settings.gist_id = Some(id.trim().to_string()).filter(|id| !id.is_empty());
        }
        self.verified = None;
        self.save_settings();
    }

    pub fn set_gist_id(&mut self, gist_id: Option<String>) {
        self.settings.gist_id = gist_id;
        self.verified = None;
        self.save_settings();
    }

    /// Remote sync is on whenever a token is present
    pub fn is_configured(&self) -> bool {
        self.settings.token.is_some()
    }

    pub fn status(&self) -> GistStatus {
        GistStatus {
            has_token: self.settings.token.is_some(),
            has_gist_id: self.settings.gist_id.is_some(),
            is_configured: self.is_configured(),
        }
    }

    /// Forget credentials in memory and on disk
    pub fn reset(&mut self) {
        self.settings = GistSettings::default();
        self.verified = None;
        self.cache.remove(SETTINGS_KEY);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.api_base, path)
    }

    fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&GistPayload<'_>>,
    ) -> Result<T> {
        let token = self.settings.token.as_deref().ok_or(Error::NotConfigured)?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, GITHUB_JSON)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(body) = payload {
            request = request.json(body);
        }

        tracing::debug!(%method, url, "github request");
        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn payload<'a>(&'a self, store: &Store, create: bool) -> Result<GistPayload<'a>> {
        let mut files = BTreeMap::new();
        files.insert(
            self.options.filename.as_str(),
            GistFilePayload {
                content: store.to_json_pretty()?,
            },
        );
        Ok(GistPayload {
            description: create.then_some(self.options.description.as_str()),
            public: create.then_some(self.options.public),
            files,
        })
    }

    /// Create a new gist holding `store` and remember its id
    fn create_gist(&mut self, store: &Store) -> Result<String> {
        let payload = self.payload(store, true)?;
        let gist: GistDocument = self.send(Method::POST, &self.url("/gists"), Some(&payload))?;
        tracing::info!(
            gist_id = %gist.id,
            url = gist.html_url.as_deref().unwrap_or(""),
            "created new gist for tag data"
        );
        self.set_gist_id(Some(gist.id.clone()));
        self.verified = Some(gist.id.clone());
        Ok(gist.id)
    }

    fn fetch_gist(&mut self, gist_id: &str) -> Result<GistDocument> {
        let result = self.send(Method::GET, &self.url(&format!("/gists/{}", gist_id)), None);
        if matches!(&result, Err(e) if e.is_not_found()) {
            self.verified = None;
        }
        result
    }

    /// Id of a reachable gist, plus the document if checking it meant fetching it
    fn try_ensure_exists(&mut self) -> Result<(String, Option<GistDocument>)> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        if let Some(id) = self.settings.gist_id.clone() {
            if self.verified.as_deref() == Some(id.as_str()) {
                return Ok((id, None));
            }
            match self.fetch_gist(&id) {
                Ok(gist) => {
                    self.verified = Some(id.clone());
                    return Ok((id, Some(gist)));
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(gist_id = %id, "configured gist not found, provisioning a new one");
                    self.set_gist_id(None);
                }
                Err(e) => return Err(e),
            }
        }

        Ok((self.create_gist(&Store::default())?, None))
    }

    /// Make sure a reachable gist backs the store, creating one if needed
    pub fn ensure_exists(&mut self) -> bool {
        match self.try_ensure_exists() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "gist is not available");
                false
            }
        }
    }

    /// Fetch the store from the gist
    ///
    /// Only fails when no token is configured; every other failure is logged
    /// and yields an empty store.
    pub fn load(&mut self) -> Result<Store> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        match self.try_load() {
            Ok(store) => {
                tracing::info!(tags = store.tags.len(), "loaded tag data from gist");
                Ok(store)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load tag data from gist");
                Ok(Store::default())
            }
        }
    }

    /// Fetch the store, surfacing every failure
    pub(crate) fn try_load(&mut self) -> Result<Store> {
        let gist = match self.try_ensure_exists()? {
            (_, Some(gist)) => gist,
            (id, None) => self.fetch_gist(&id)?,
        };

        let file = gist
            .files
            .get(&self.options.filename)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                Error::Parse(format!("file {} not found in gist", self.options.filename))
            })?;

        let content = match (&file.content, file.truncated, &file.raw_url) {
            (_, true, Some(raw_url)) => self.fetch_raw(raw_url)?,
            (Some(content), _, _) => content.clone(),
            (None, _, _) => {
                return Err(Error::Parse(format!(
                    "file {} has no content",
                    self.options.filename
                )))
            }
        };

        Store::from_json(&content)
    }

    /// Large files come back truncated; the full text lives at raw_url
    fn fetch_raw(&self, raw_url: &str) -> Result<String> {
        let response = self.http.get(raw_url).send()?.error_for_status()?;
        Ok(response.text()?)
    }

    /// Write the store to the gist, stamping `lastUpdated`
    ///
    /// Errors propagate so the caller can flag local-only state.
    pub fn save(&mut self, store: &Store) -> Result<()> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        let (id, _) = self.try_ensure_exists()?;
        let stamped = store.stamped();
        let payload = self.payload(&stamped, false)?;
        let url = self.url(&format!("/gists/{}", id));
        let result: Result<GistDocument> = self.send(Method::PATCH, &url, Some(&payload));
        match result {
            Ok(_) => {
                tracing::info!(gist_id = %id, "synced tag data to gist");
                Ok(())
            }
            Err(e) => {
                if e.is_not_found() {
                    self.verified = None;
                }
                Err(e)
            }
        }
    }

    /// Validate the token against `/user`, then make sure the gist exists
    pub fn test_connection(&mut self) -> bool {
        if !self.is_configured() {
            return false;
        }

        match self.send::<GitHubUser>(Method::GET, &self.url("/user"), None) {
            Ok(user) => tracing::info!(login = %user.login, "github token is valid"),
            Err(e) => {
                tracing::error!(error = %e, "gist connection test failed");
                return false;
            }
        }

        self.ensure_exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(dir: &std::path::Path) -> GistClient {
        GistClient::new(GistOptions::default(), LocalCache::new(dir)).unwrap()
    }

    #[test]
    fn test_unconfigured_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(dir.path());

        assert!(!client.is_configured());
        assert!(matches!(client.load(), Err(Error::NotConfigured)));
        assert!(matches!(client.save(&Store::default()), Err(Error::NotConfigured)));
        assert!(!client.ensure_exists());
        assert!(!client.test_connection());
    }

    #[test]
    fn test_configure_persists_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = client(dir.path());
        first.configure(" ghp_token ", Some("abc123"));

        let second = client(dir.path());
        assert_eq!(second.settings().token.as_deref(), Some("ghp_token"));
        assert_eq!(second.settings().gist_id.as_deref(), Some("abc123"));
        assert_eq!(
            second.status(),
            GistStatus {
                has_token: true,
                has_gist_id: true,
                is_configured: true
            }
        );
    }

    #[test]
    fn test_configure_without_gist_id_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(dir.path());
        client.configure("t1", Some("gist-1"));
        client.configure("t2", None);
        assert_eq!(client.settings().gist_id.as_deref(), Some("gist-1"));
        assert_eq!(client.settings().token.as_deref(), Some("t2"));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(dir.path());
        client.configure("token", Some("gist"));
        client.reset();

        assert_eq!(client.settings(), &GistSettings::default());
        assert!(LocalCache::new(dir.path())
            .load_json::<GistSettings>(SETTINGS_KEY)
            .is_none());
    }

    #[test]
    fn test_settings_json_shape() {
        let settings = GistSettings {
            token: Some("t".to_string()),
            gist_id: Some("g".to_string()),
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"token":"t","gistId":"g"}"#);
    }

    #[test]
    fn test_payload_shape() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(dir.path());

        let create = serde_json::to_value(client.payload(&Store::default(), true).unwrap()).unwrap();
        assert_eq!(create["public"], serde_json::json!(false));
        assert_eq!(create["description"], serde_json::json!(DEFAULT_DESCRIPTION));
        let content = create["files"][DEFAULT_FILENAME]["content"].as_str().unwrap();
        assert_eq!(Store::from_json(content).unwrap(), Store::default());

        let update = serde_json::to_value(client.payload(&Store::default(), false).unwrap()).unwrap();
        assert!(update.get("public").is_none());
        assert!(update.get("description").is_none());
    }
}
