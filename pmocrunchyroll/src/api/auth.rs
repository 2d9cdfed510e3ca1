//! Autorité de jetons : machine à états de l'authentification
//!
//! ```text
//! NoSession → Authenticating → Active → Expired → Refreshing → Active | Aborted
//! ```
//!
//! Un seul mutex protège la session : un rafraîchissement au plus est en vol,
//! les appelants concurrents attendent puis réutilisent la session obtenue.
//! Les refus du endpoint de jetons (HTTP 400) déclenchent une nouvelle
//! connexion complète, dans une boucle bornée par [`MAX_RETRIES`].

use super::{Endpoints, handle_response};
use crate::error::{CrunchyrollError, Result};
use crate::session::{CmsSigning, Session, SessionStore};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// En-tête d'identification du client officiel, envoyé au endpoint de jetons
const CLIENT_AUTHORIZATION: &str =
    "Basic aHJobzlxM2F3dnNrMjJ1LXRzNWE6cHROOURteXRBU2Z6QjZvbXVsSzh6cUxzYTczVE1TY1k=";

/// Nombre de reconnexions tolérées ; l'échec suivant est définitif
pub const MAX_RETRIES: u32 = 2;

/// Identifiants du compte
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// État de l'authentification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoSession,
    Authenticating,
    Active,
    Expired,
    Refreshing,
    /// Plafond de tentatives atteint, de nouveaux identifiants sont requis
    Aborted,
}

/// Type d'échange auprès du endpoint de jetons
enum Grant {
    Password,
    RefreshToken(String),
}

impl Grant {
    fn form<'a>(&'a self, credentials: &'a Credentials) -> Vec<(&'static str, &'a str)> {
        match self {
            Grant::Password => vec![
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("grant_type", "password"),
                ("scope", "offline_access"),
            ],
            Grant::RefreshToken(token) => vec![
                ("refresh_token", token.as_str()),
                ("grant_type", "refresh_token"),
                ("scope", "offline_access"),
            ],
        }
    }
}

/// Réponse du endpoint /auth/v1/token
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    account_id: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Réponse du endpoint /index/v2
#[derive(Debug, Deserialize)]
struct IndexResponse {
    cms: IndexCms,
}

#[derive(Debug, Deserialize)]
struct IndexCms {
    #[serde(default)]
    bucket: String,
    policy: String,
    signature: String,
    key_pair_id: String,
}

struct AuthInner {
    credentials: Credentials,
    session: Option<Session>,
    retries: u32,
}

/// Propriétaire exclusif de la [`Session`]
pub struct TokenAuthority {
    client: Client,
    endpoints: Endpoints,
    store: Arc<dyn SessionStore>,
    inner: Mutex<AuthInner>,
    state: RwLock<AuthState>,
}

impl TokenAuthority {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        credentials: Credentials,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            client,
            endpoints,
            store,
            inner: Mutex::new(AuthInner {
                credentials,
                session: None,
                retries: 0,
            }),
            state: RwLock::new(AuthState::NoSession),
        }
    }

    /// État courant (lecture non bloquante, même pendant un rafraîchissement)
    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: AuthState) {
        let mut current = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *current != state {
            debug!("Auth state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Compteur de reconnexions consécutives
    pub async fn retries(&self) -> u32 {
        self.inner.lock().await.retries
    }

    /// Session courante sans validation
    pub async fn current_session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    /// Restaure la session persistée ou effectue une connexion complète
    ///
    /// Une session persistée encore valide passe directement à `Active` ; une
    /// session expirée est rafraîchie avec son refresh token.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if self.state() == AuthState::Aborted {
            return Err(CrunchyrollError::AuthAborted {
                attempts: inner.retries,
            });
        }

        match self.store.load() {
            Ok(Some(session)) if !session.is_expired() => {
                info!("Restored persisted Crunchyroll session");
                inner.session = Some(session);
                self.set_state(AuthState::Active);
                return Ok(());
            }
            Ok(Some(session)) => {
                info!("Persisted session expired, refreshing");
                let refresh_token = session.refresh_token.clone();
                inner.session = Some(session);
                self.set_state(AuthState::Expired);
                self.authenticate(&mut inner, Grant::RefreshToken(refresh_token))
                    .await?;
            }
            Ok(None) => {
                self.authenticate(&mut inner, Grant::Password).await?;
            }
            Err(e) => {
                warn!("Failed to load persisted session: {}", e);
                self.authenticate(&mut inner, Grant::Password).await?;
            }
        }
        Ok(())
    }

    /// Retourne une session valide, en la rafraîchissant si nécessaire
    ///
    /// Appelée avant chaque requête signée. Après un retour `Ok`, le jeton
    /// porteur et les paramètres CMS sont frais.
    pub async fn ensure_valid(&self) -> Result<Session> {
        let mut inner = self.inner.lock().await;

        let state = self.state();
        if state == AuthState::Aborted {
            return Err(CrunchyrollError::AuthAborted {
                attempts: inner.retries,
            });
        }

        let refresh_token = match inner.session.as_ref() {
            Some(session) if state != AuthState::Expired && !session.is_expired() => {
                return Ok(session.clone());
            }
            Some(session) => Some(session.refresh_token.clone()),
            None => None,
        };

        let grant = match refresh_token {
            Some(token) => {
                self.set_state(AuthState::Expired);
                Grant::RefreshToken(token)
            }
            None => match self.store.load() {
                Ok(Some(session)) if !session.is_expired() => {
                    inner.session = Some(session.clone());
                    self.set_state(AuthState::Active);
                    return Ok(session);
                }
                Ok(Some(session)) => {
                    let token = session.refresh_token.clone();
                    inner.session = Some(session);
                    self.set_state(AuthState::Expired);
                    Grant::RefreshToken(token)
                }
                _ => Grant::Password,
            },
        };

        self.authenticate(&mut inner, grant).await
    }

    /// Signale qu'un jeton a été refusé (401) ; sans effet s'il a déjà été remplacé
    pub async fn mark_expired(&self, access_token: &str) {
        let inner = self.inner.lock().await;
        let is_current = inner
            .session
            .as_ref()
            .is_some_and(|s| s.access_token == access_token);
        if is_current && self.state() == AuthState::Active {
            info!("Session marked as expired");
            self.set_state(AuthState::Expired);
        }
    }

    /// Abandonne la session courante et refait une connexion par mot de passe
    pub async fn restart(&self) -> Result<Session> {
        let mut inner = self.inner.lock().await;
        info!("Restarting Crunchyroll session from scratch");
        self.discard(&mut inner);
        inner.retries = 0;
        self.authenticate(&mut inner, Grant::Password).await
    }

    /// Remplace les identifiants et sort de l'état `Aborted`
    pub async fn reset(&self, credentials: Credentials) {
        let mut inner = self.inner.lock().await;
        inner.credentials = credentials;
        inner.retries = 0;
        self.discard(&mut inner);
        info!("Credentials updated, authentication reset");
    }

    /// Déconnexion : supprime la session persistée
    pub async fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.session = None;
        self.set_state(AuthState::NoSession);
        self.store.delete()
    }

    fn discard(&self, inner: &mut AuthInner) {
        inner.session = None;
        if let Err(e) = self.store.delete() {
            warn!("Failed to delete persisted session: {}", e);
        }
        self.set_state(AuthState::NoSession);
    }

    /// Boucle bornée d'échanges de jetons
    ///
    /// Un 400 supprime la session persistée, incrémente le compteur et relance
    /// une connexion par mot de passe. Au-delà de [`MAX_RETRIES`], l'état passe
    /// à `Aborted` sans nouvel essai.
    async fn authenticate(&self, inner: &mut AuthInner, mut grant: Grant) -> Result<Session> {
        loop {
            self.set_state(match grant {
                Grant::Password => AuthState::Authenticating,
                Grant::RefreshToken(_) => AuthState::Refreshing,
            });

            let token = match self.request_token(&grant, &inner.credentials).await {
                Ok(token) => token,
                Err(CrunchyrollError::Api { status: 400, body }) => {
                    inner.retries += 1;
                    inner.session = None;
                    if let Err(e) = self.store.delete() {
                        warn!("Failed to delete persisted session: {}", e);
                    }

                    if inner.retries > MAX_RETRIES {
                        error!(
                            "Crunchyroll login rejected {} times, aborting",
                            inner.retries
                        );
                        self.set_state(AuthState::Aborted);
                        return Err(CrunchyrollError::AuthAborted {
                            attempts: inner.retries,
                        });
                    }

                    warn!(
                        "Invalid or expired credentials ({}), restarting session from scratch",
                        body
                    );
                    grant = Grant::Password;
                    continue;
                }
                Err(e) => {
                    self.set_state(if inner.session.is_some() {
                        AuthState::Expired
                    } else {
                        AuthState::NoSession
                    });
                    return Err(e);
                }
            };

            let session = match self.complete_session(token).await {
                Ok(session) => session,
                Err(e) => {
                    self.set_state(if inner.session.is_some() {
                        AuthState::Expired
                    } else {
                        AuthState::NoSession
                    });
                    return Err(e);
                }
            };

            if let Err(e) = self.store.save(&session) {
                warn!("Failed to persist session: {}", e);
            }
            inner.retries = 0;
            inner.session = Some(session.clone());
            self.set_state(AuthState::Active);
            info!("Crunchyroll session active for account {}", session.account_id);
            return Ok(session);
        }
    }

    async fn request_token(&self, grant: &Grant, credentials: &Credentials) -> Result<TokenResponse> {
        match grant {
            Grant::Password => info!("Logging in to Crunchyroll as {}", credentials.username),
            Grant::RefreshToken(_) => info!("Refreshing Crunchyroll access token"),
        }

        let response = self
            .client
            .post(self.endpoints.token())
            .header(reqwest::header::AUTHORIZATION, CLIENT_AUTHORIZATION)
            .form(&grant.form(credentials))
            .send()
            .await?;

        let value = handle_response(response).await?;
        let mut token: TokenResponse = serde_json::from_value(value)?;

        // Un rafraîchissement peut ne pas renvoyer de nouveau refresh token
        if token.refresh_token.is_none() {
            if let Grant::RefreshToken(previous) = grant {
                token.refresh_token = Some(previous.clone());
            }
        }
        Ok(token)
    }

    /// Complète l'échange de jetons avec l'index (signature CMS) et le profil
    async fn complete_session(&self, token: TokenResponse) -> Result<Session> {
        let authorization = format!("{} {}", token.token_type, token.access_token);

        let index: IndexResponse =
            serde_json::from_value(self.get_bearer(&self.endpoints.index(), &authorization).await?)
                .map_err(|e| CrunchyrollError::decode(format!("index without cms data: {}", e)))?;

        let profile = self
            .get_bearer(&self.endpoints.profile(), &authorization)
            .await?;
        let account_id = profile
            .get("account_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(token.account_id)
            .ok_or_else(|| CrunchyrollError::decode("no account id in profile or token"))?;

        Ok(Session {
            access_token: token.access_token,
            token_type: token.token_type,
            refresh_token: token.refresh_token.unwrap_or_default(),
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
            account_id,
            cms: CmsSigning {
                policy: index.cms.policy,
                signature: index.cms.signature,
                key_pair_id: index.cms.key_pair_id,
                bucket: index.cms.bucket,
            },
        })
    }

    // Les paramètres CMS n'existent pas encore : porteur seul
    async fn get_bearer(&self, url: &str, authorization: &str) -> Result<Value> {
        debug!("GET {} (bearer only)", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await?;
        handle_response(response).await
    }
}
