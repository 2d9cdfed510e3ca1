//! Extension pour intégrer la configuration Crunchyroll dans pmoconfig
//!
//! Ce module fournit le trait `CrunchyrollConfigExt` qui ajoute à
//! `pmoconfig::Config` les identifiants du compte, la locale, le répertoire
//! de profil (où est persistée la session) et les préférences de lecture.

use crate::api::DEFAULT_LOCALE;
use crate::api::auth::Credentials;
use crate::playback::PlaybackSettings;
use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde_yaml::Value;

const PROFILE_DIR_PATH: &[&str] = &["host", "crunchyroll", "profile_dir"];
const DEFAULT_PROFILE_DIR: &str = "crunchyroll";

/// Trait d'extension pour gérer la configuration Crunchyroll dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocrunchyroll::CrunchyrollConfigExt;
///
/// let config = get_config();
/// let credentials = config.get_crunchyroll_credentials()?;
/// println!("Crunchyroll user: {}", credentials.username);
/// ```
pub trait CrunchyrollConfigExt {
    /// Récupère le nom d'utilisateur (email)
    ///
    /// # Errors
    ///
    /// Retourne une erreur si le nom d'utilisateur n'est pas configuré
    fn get_crunchyroll_username(&self) -> Result<String>;

    fn set_crunchyroll_username(&self, username: &str) -> Result<()>;

    /// Récupère le mot de passe, déchiffré s'il est stocké sous la forme
    /// `encrypted:...`
    fn get_crunchyroll_password(&self) -> Result<String>;

    /// Enregistre le mot de passe chiffré avec la clé de la machine
    fn set_crunchyroll_password(&self, password: &str) -> Result<()>;

    /// Récupère les identifiants complets
    ///
    /// # Exemple
    ///
    /// ```rust,ignore
    /// match config.get_crunchyroll_credentials() {
    ///     Ok(credentials) => println!("Configured for {}", credentials.username),
    ///     Err(e) => eprintln!("Crunchyroll credentials not configured: {}", e),
    /// }
    /// ```
    fn get_crunchyroll_credentials(&self) -> Result<Credentials>;

    /// Locale des contenus et sous-titres (défaut `en-US`)
    fn get_crunchyroll_locale(&self) -> Result<String>;

    fn set_crunchyroll_locale(&self, locale: &str) -> Result<()>;

    /// URL de base de l'API si elle est surchargée
    fn get_crunchyroll_api_base(&self) -> Result<Option<String>>;

    /// Répertoire de profil contenant `session_data.json` (créé si besoin)
    fn get_crunchyroll_profile_dir(&self) -> Result<String>;

    fn set_crunchyroll_profile_dir(&self, directory: String) -> Result<()>;

    /// Préférences de lecture (`playback.*`, toutes actives par défaut)
    fn get_playback_settings(&self) -> Result<PlaybackSettings>;

    fn set_playback_settings(&self, settings: &PlaybackSettings) -> Result<()>;
}

fn get_flag(config: &Config, key: &str) -> bool {
    match config.get_value(&["playback", key]) {
        Ok(Value::Bool(b)) => b,
        _ => true,
    }
}

impl CrunchyrollConfigExt for Config {
    fn get_crunchyroll_username(&self) -> Result<String> {
        self.get_string(&["accounts", "crunchyroll", "username"])
            .ok_or_else(|| anyhow!("Crunchyroll username not configured"))
    }

    fn set_crunchyroll_username(&self, username: &str) -> Result<()> {
        self.set_value(
            &["accounts", "crunchyroll", "username"],
            Value::String(username.to_string()),
        )
    }

    fn get_crunchyroll_password(&self) -> Result<String> {
        let stored = self
            .get_string(&["accounts", "crunchyroll", "password"])
            .ok_or_else(|| anyhow!("Crunchyroll password not configured"))?;
        pmoconfig::encryption::get_password(&stored)
            .map_err(|e| anyhow!("Failed to decrypt password: {}", e))
    }

    fn set_crunchyroll_password(&self, password: &str) -> Result<()> {
        let encrypted = pmoconfig::encryption::encrypt_password(password)?;
        self.set_value(
            &["accounts", "crunchyroll", "password"],
            Value::String(encrypted),
        )
    }

    fn get_crunchyroll_credentials(&self) -> Result<Credentials> {
        let username = self.get_crunchyroll_username()?;
        let password = self.get_crunchyroll_password()?;
        Ok(Credentials::new(username, password))
    }

    fn get_crunchyroll_locale(&self) -> Result<String> {
        Ok(self
            .get_string(&["accounts", "crunchyroll", "locale"])
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string()))
    }

    fn set_crunchyroll_locale(&self, locale: &str) -> Result<()> {
        self.set_value(
            &["accounts", "crunchyroll", "locale"],
            Value::String(locale.to_string()),
        )
    }

    fn get_crunchyroll_api_base(&self) -> Result<Option<String>> {
        Ok(self.get_string(&["accounts", "crunchyroll", "api_base"]))
    }

    fn get_crunchyroll_profile_dir(&self) -> Result<String> {
        self.get_managed_dir(PROFILE_DIR_PATH, DEFAULT_PROFILE_DIR)
    }

    fn set_crunchyroll_profile_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(PROFILE_DIR_PATH, directory)
    }

    fn get_playback_settings(&self) -> Result<PlaybackSettings> {
        Ok(PlaybackSettings {
            sync_playtime: get_flag(self, "sync_playtime"),
            skip_intro: get_flag(self, "skip_intro"),
            skip_credits: get_flag(self, "skip_credits"),
            up_next: get_flag(self, "up_next"),
        })
    }

    fn set_playback_settings(&self, settings: &PlaybackSettings) -> Result<()> {
        self.set_value(&["playback", "sync_playtime"], Value::Bool(settings.sync_playtime))?;
        self.set_value(&["playback", "skip_intro"], Value::Bool(settings.skip_intro))?;
        self.set_value(&["playback", "skip_credits"], Value::Bool(settings.skip_credits))?;
        self.set_value(&["playback", "up_next"], Value::Bool(settings.up_next))
    }
}
