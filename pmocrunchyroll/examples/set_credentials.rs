//! Enregistre les identifiants Crunchyroll dans la configuration
//!
//! Le mot de passe est chiffré avec la clé de la machine avant d'être écrit.
//!
//! Usage:
//!   cargo run --example set_credentials -- <email> <password>
//!   cargo run --example set_credentials -- --show

use anyhow::Result;
use pmocrunchyroll::CrunchyrollConfigExt;

fn main() -> Result<()> {
    let config = pmoconfig::get_config();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [flag] if flag == "--show" => {
            let credentials = config.get_crunchyroll_credentials()?;
            println!("Username: {}", credentials.username);
            println!("Password: {} caractères", credentials.password.chars().count());
            println!("Locale:   {}", config.get_crunchyroll_locale()?);
            println!("Profil:   {}", config.get_crunchyroll_profile_dir()?);
        }
        [username, password] => {
            config.set_crunchyroll_username(username)?;
            config.set_crunchyroll_password(password)?;
            println!("✓ Identifiants enregistrés dans {}", config.directory());

            // Vérifie que le déchiffrement fonctionne sur cette machine
            let stored = config.get_crunchyroll_credentials()?;
            if stored.password != *password {
                return Err(anyhow::anyhow!("stored password does not decrypt"));
            }
        }
        _ => {
            println!("Usage:");
            println!("  cargo run --example set_credentials -- <email> <password>");
            println!("  cargo run --example set_credentials -- --show");
        }
    }

    Ok(())
}
