//! Reprise de lecture

/// Bornes (exclues) du ratio position/durée ouvrant une proposition de reprise
const RESUME_MIN_RATIO: f64 = 0.05;
const RESUME_MAX_RATIO: f64 = 0.90;

/// Recul appliqué à la position reprise
const RESUME_REWIND: f64 = 5.0;

/// Pourcentage à proposer si la position est strictement entre 5 % et 90 %
pub fn resume_offer(playhead: f64, duration: f64) -> Option<u32> {
    if duration <= 0.0 || playhead <= 0.0 {
        return None;
    }
    let ratio = playhead / duration;
    (ratio > RESUME_MIN_RATIO && ratio < RESUME_MAX_RATIO).then(|| (ratio * 100.0) as u32)
}

/// Position de reprise : quelques secondes avant la position enregistrée
pub fn resume_position(playhead: f64) -> f64 {
    (playhead - RESUME_REWIND).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_offered_in_range() {
        assert_eq!(resume_offer(300.0, 1200.0), Some(25));
    }

    #[test]
    fn test_resume_not_offered_near_edges() {
        assert_eq!(resume_offer(30.0, 1200.0), None);
        assert_eq!(resume_offer(60.0, 1200.0), None);
        assert_eq!(resume_offer(1080.0, 1200.0), None);
        assert_eq!(resume_offer(1150.0, 1200.0), None);
    }

    #[test]
    fn test_resume_unknown_duration() {
        assert_eq!(resume_offer(300.0, 0.0), None);
        assert_eq!(resume_offer(0.0, 1200.0), None);
    }

    #[test]
    fn test_resume_position() {
        assert_eq!(resume_position(300.0), 295.0);
        assert_eq!(resume_position(3.0), 0.0);
    }
}
