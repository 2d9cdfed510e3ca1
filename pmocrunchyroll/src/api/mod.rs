//! Couche d'accès à l'API REST Crunchyroll
//!
//! [`CrunchyrollApi`] est le dispatcher de requêtes : chaque appel passe par
//! [`TokenAuthority::ensure_valid`](auth::TokenAuthority::ensure_valid), reçoit
//! l'en-tête `Authorization` et les trois paramètres de signature CMS en query,
//! puis la réponse est décodée en JSON (ordre des clés conservé).

pub mod auth;
pub mod content;
pub mod playheads;

use crate::error::{CrunchyrollError, Result};
use crate::session::{MemorySessionStore, SessionStore};
use auth::{Credentials, TokenAuthority};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// URL de base de l'API Crunchyroll
pub const API_BASE_URL: &str = "https://beta-api.crunchyroll.com";

/// Version de l'application annoncée au service
pub const CLIENT_VERSION: &str = "1.1.21.0";

/// Timeout par défaut des appels réseau
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Locale par défaut
pub const DEFAULT_LOCALE: &str = "en-US";

/// Construction des URLs des endpoints à partir d'une base
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(API_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn token(&self) -> String {
        format!("{}/auth/v1/token", self.base)
    }

    pub fn index(&self) -> String {
        format!("{}/index/v2", self.base)
    }

    pub fn profile(&self) -> String {
        format!("{}/accounts/v1/me/profile", self.base)
    }

    /// `bucket` commence par `/` (ex: `/US/M2/crunchyroll`)
    pub fn streams(&self, bucket: &str, stream_id: &str) -> String {
        format!("{}/cms/v2{}/videos/{}/streams", self.base, bucket, stream_id)
    }

    pub fn playheads(&self, account_id: &str) -> String {
        format!("{}/content/v2/{}/playheads", self.base, account_id)
    }

    pub fn watch_history(&self, account_id: &str) -> String {
        format!("{}/content/v2/{}/watch-history", self.base, account_id)
    }

    pub fn up_next(&self, content_id: &str) -> String {
        format!("{}/content/v2/discover/up_next/{}", self.base, content_id)
    }

    pub fn objects(&self, ids: &[&str]) -> String {
        format!("{}/content/v2/cms/objects/{}", self.base, ids.join(","))
    }
}

/// Builder pour [`CrunchyrollApi`]
#[derive(Clone)]
pub struct CrunchyrollApiBuilder {
    client: Option<Client>,
    api_base: String,
    timeout: Duration,
    locale: String,
    user_agent: String,
    store: Option<Arc<dyn SessionStore>>,
}

impl Default for CrunchyrollApiBuilder {
    fn default() -> Self {
        Self {
            client: None,
            api_base: API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            locale: DEFAULT_LOCALE.to_string(),
            user_agent: format!("Crunchyroll/{}", CLIENT_VERSION),
            store: None,
        }
    }
}

impl CrunchyrollApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Utilise un client HTTP existant (le timeout du builder est alors ignoré)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Remplace l'URL de base de l'API (serveur de test, proxy...)
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Stockage de la session (en mémoire si non précisé)
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Construit le dispatcher et sa [`TokenAuthority`]
    pub fn build(self, credentials: Credentials) -> Result<CrunchyrollApi> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout)
                .user_agent(&self.user_agent)
                .build()?,
        };

        let endpoints = Endpoints::new(self.api_base);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        let auth = Arc::new(TokenAuthority::new(
            client.clone(),
            endpoints.clone(),
            credentials,
            store,
        ));

        Ok(CrunchyrollApi {
            client,
            endpoints,
            auth,
            locale: self.locale,
        })
    }
}

/// Dispatcher de requêtes signées
pub struct CrunchyrollApi {
    client: Client,
    endpoints: Endpoints,
    auth: Arc<TokenAuthority>,
    locale: String,
}

impl CrunchyrollApi {
    pub fn builder() -> CrunchyrollApiBuilder {
        CrunchyrollApiBuilder::new()
    }

    pub fn auth(&self) -> &Arc<TokenAuthority> {
        &self.auth
    }

    /// Client HTTP partagé, pour les ressources publiques non signées
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Démarre l'autorité de jetons (session persistée ou connexion complète)
    pub async fn start(&self) -> Result<()> {
        self.auth.start().await
    }

    /// Exécute un appel signé
    ///
    /// Les paramètres de signature sont ajoutés à `query` uniquement, jamais
    /// aux en-têtes ni au corps. Un 401 marque la session comme expirée et
    /// l'appel est rejoué une seule fois après rafraîchissement.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut replayed = false;
        loop {
            let session = self.auth.ensure_valid().await?;

            debug!("{} {} with {} params", method, url, query.len());

            let mut request = self
                .client
                .request(method.clone(), url)
                .header(reqwest::header::AUTHORIZATION, session.authorization_header());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request = request.query(query).query(&session.signing_params());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            match handle_response(response).await {
                Err(CrunchyrollError::AuthExpired) if !replayed => {
                    warn!("Access token rejected on {}, refreshing session", url);
                    self.auth.mark_expired(&session.access_token).await;
                    replayed = true;
                }
                other => return other,
            }
        }
    }

    /// GET signé avec la locale courante
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut query = vec![("locale", self.locale.as_str())];
        query.extend_from_slice(params);
        self.execute(Method::GET, url, &[], &query, None).await
    }

    /// POST signé d'un corps JSON
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.execute(
            Method::POST,
            url,
            &[],
            &[("locale", self.locale.as_str())],
            Some(body),
        )
        .await
    }
}

/// Traite la réponse HTTP : statut non-2xx ou JSON invalide donnent une erreur typée
pub(crate) async fn handle_response(response: Response) -> Result<Value> {
    let status = response.status();
    let status_code = status.as_u16();

    debug!("Response status: {}", status);

    let text = response.text().await?;

    if !status.is_success() {
        warn!("API error ({}): {}", status_code, text);
        return Err(CrunchyrollError::from_status(status_code, text));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to parse response: {}", e);
        CrunchyrollError::MalformedJson {
            status: status_code,
            body: text,
        }
    })
}
