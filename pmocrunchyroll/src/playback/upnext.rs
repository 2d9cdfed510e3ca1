//! Calcul du moment d'annonce de l'épisode suivant

use crate::models::SkipWindow;

/// Un générique qui se termine à moins de cette marge de la fin annonce l'épisode suivant
const CREDITS_END_MARGIN: f64 = 20.0;

/// Position (secondes) à laquelle annoncer l'épisode suivant
///
/// - générique suivi immédiatement de l'aperçu : début du générique ;
/// - sinon, aperçu présent : début de l'aperçu ;
/// - sinon, générique finissant dans les 20 dernières secondes : début du générique ;
/// - sinon aucune annonce.
pub fn compute_up_next_offset(
    duration: Option<f64>,
    credits: Option<SkipWindow>,
    preview: Option<SkipWindow>,
) -> Option<u32> {
    let at = match (credits, preview) {
        (Some(credits), Some(preview)) if credits.end == preview.start => credits.start,
        (_, Some(preview)) => preview.start,
        (Some(credits), None) => {
            let duration = duration?;
            if duration <= credits.end + CREDITS_END_MARGIN {
                credits.start
            } else {
                return None;
            }
        }
        (None, None) => return None,
    };
    Some(at.max(0.0) as u32)
}
