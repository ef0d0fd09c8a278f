use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ninefold_db::models::Draw;

const FIRST_PERIOD: u64 = 2024032000;

/// Génère un historique fictif quand aucune source réelle n'est disponible.
///
/// Un tirage par jour en remontant depuis `today`, numéros au format "d,d,d,d".
pub fn generate_sample_draws(count: usize, seed: Option<u64>, today: NaiveDate) -> Vec<Draw> {
    let mut rng: StdRng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    (0..count)
        .map(|i| {
            let digits: Vec<String> = (0..4)
                .map(|_| rng.random_range(0..10u8).to_string())
                .collect();
            let date = today - Duration::days(i as i64);
            Draw {
                id: Some(i as i64),
                number: digits.join(","),
                draw_date: Some(date.format("%Y-%m-%d").to_string()),
                period: Some((FIRST_PERIOD + i as u64).to_string()),
            }
        })
        .collect()
}
