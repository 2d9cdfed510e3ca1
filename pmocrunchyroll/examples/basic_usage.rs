//! Exemple d'utilisation basique de pmocrunchyroll
//!
//! Cet exemple montre comment :
//! - Se connecter à Crunchyroll avec les identifiants de la configuration
//! - Lire la position de lecture d'un épisode
//! - Trouver l'épisode suivant
//!
//! Usage : `cargo run --example basic_usage -- <episode_id>`

use pmocrunchyroll::CrunchyrollClient;
use pmocrunchyroll::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&pmoconfig::get_config());

    let episode_id = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: basic_usage <episode_id>"))?;

    println!("=== PMOCrunchyroll - Exemple d'utilisation basique ===\n");

    println!("Connexion à Crunchyroll...");
    let client = CrunchyrollClient::from_config().await?;
    println!("✓ Session : {:?}", client.auth_state());

    let api = client.api();

    println!("\n--- Épisode {} ---", episode_id);
    let episode = api.get_episode(&episode_id).await?;
    println!("Titre: {}", episode.title);
    if let Some(duration) = episode.duration {
        println!("Durée: {:.0}s", duration);
    }

    match api.get_playhead(&episode_id).await? {
        Some(info) => println!(
            "Position: {:.0}s{}",
            info.playhead,
            if info.fully_watched { " (vu)" } else { "" }
        ),
        None => println!("Jamais regardé"),
    }

    println!("\n--- Épisode suivant ---");
    match api.get_up_next(&episode_id).await? {
        Some(next) => println!("{} ({})", next.title, next.id),
        None => println!("Aucun"),
    }

    Ok(())
}
