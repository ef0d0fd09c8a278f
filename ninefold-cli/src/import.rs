use anyhow::{Context, Result, bail};
use ninefold_db::rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::analysis::extract_digits;
use ninefold_db::db::insert_draw;
use ninefold_db::models::Draw;

/// Une réponse JSON peut contenir une liste de tirages ou un seul tirage.
#[derive(Deserialize)]
#[serde(untagged)]
enum DrawPayload {
    Many(Vec<Draw>),
    One(Draw),
}

pub fn parse_json_draws(json: &str) -> Result<Vec<Draw>> {
    let payload: DrawPayload = serde_json::from_str(json)
        .context("JSON de tirages invalide")?;
    Ok(match payload {
        DrawPayload::Many(draws) => draws,
        DrawPayload::One(draw) => vec![draw],
    })
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ligne CSV `period;drawDate;number`.
fn parse_record(record: &csv::StringRecord) -> Result<Draw> {
    let number = record
        .get(2)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .context("Champ 'number' manquant à l'index 2")?;

    Ok(Draw {
        id: None,
        number,
        draw_date: optional(record.get(1)),
        period: optional(record.get(0)),
    })
}

pub fn parse_csv_draws<R: std::io::Read>(reader: R) -> Result<(Vec<Draw>, u32)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let mut draws = Vec::new();
    let mut errors = 0u32;
    for (line, record_result) in reader.records().enumerate() {
        match record_result.map_err(anyhow::Error::from).and_then(|r| parse_record(&r)) {
            Ok(draw) => draws.push(draw),
            Err(e) => {
                warn!(line = line + 2, error = %e, "ligne CSV ignorée");
                errors += 1;
            }
        }
    }
    Ok((draws, errors))
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub malformed: u32,
    pub errors: u32,
}

/// Insère les tirages dans une transaction. Les numéros mal formés sont
/// conservés tels quels et seulement comptés.
pub fn insert_draws(conn: &Connection, draws: &[Draw]) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();

    for draw in draws {
        result.total_records += 1;
        if !draw.is_well_formed() {
            warn!(number = %draw.number, "numéro mal formé, conservé tel quel");
            result.malformed += 1;
        }
        let canonical = extract_digits(&draw.number);
        match insert_draw(&tx, draw, &canonical) {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                warn!(number = %draw.number, error = %e, "échec d'insertion");
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    info!(inserted = result.inserted, skipped = result.skipped, "tirages importés");
    Ok(result)
}

pub fn import_file(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let (draws, parse_errors) = match extension.as_deref() {
        Some("json") => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
            (parse_json_draws(&json)?, 0)
        }
        Some("csv") => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
            parse_csv_draws(file)?
        }
        _ => bail!("Format non reconnu pour {:?} (attendu .json ou .csv)", path),
    };

    let mut result = insert_draws(conn, &draws)?;
    result.total_records += parse_errors;
    result.errors += parse_errors;
    Ok(result)
}
