use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::models::{Draw, HitRecord, HitStatistic, LayerId, LayerRecord, ScoreRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    number      TEXT NOT NULL,
    canonical   TEXT NOT NULL,
    draw_date   TEXT,
    period      TEXT UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scores (
    number             TEXT PRIMARY KEY,
    sum                INTEGER NOT NULL,
    span               INTEGER NOT NULL,
    sum_score          TEXT NOT NULL,
    span_score         TEXT NOT NULL,
    hot_cold_score     TEXT NOT NULL,
    hit_score          TEXT NOT NULL,
    total_score        TEXT NOT NULL,
    contains_key_code  INTEGER NOT NULL DEFAULT 0,
    is_edge_value      INTEGER NOT NULL DEFAULT 0,
    updated_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS layer_results (
    layer_id    TEXT PRIMARY KEY,
    numbers     TEXT NOT NULL,
    count       INTEGER NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hit_statistics (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    draw_number  TEXT NOT NULL,
    is_hit       INTEGER NOT NULL,
    layer_id     TEXT NOT NULL,
    draw_time    TEXT NOT NULL
);
";

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("ninefold.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    debug!(path = %path.display(), "base ouverte");
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Insère un tirage ; un tirage dont la période existe déjà est ignoré.
/// `canonical` est la forme à trois chiffres calculée par l'appelant.
pub fn insert_draw(conn: &Connection, draw: &Draw, canonical: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (number, canonical, draw_date, period, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![draw.number, canonical, draw.draw_date, draw.period, now()],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

/// Derniers tirages, du plus récent au plus ancien.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(
        "SELECT id, number, draw_date, period
         FROM draws ORDER BY draw_date DESC, period DESC, id DESC LIMIT ?1"
    )?;
    let draws = stmt.query_map([limit], |row| {
        Ok(Draw {
            id: row.get(0)?,
            number: row.get(1)?,
            draw_date: row.get(2)?,
            period: row.get(3)?,
        })
    })?.collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

/// Enregistre les notes (une ligne par numéro, écrasée à chaque analyse).
pub fn save_scores(conn: &Connection, scores: &[ScoreRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;
    let updated_at = now();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO scores (number, sum, span, sum_score, span_score, hot_cold_score, hit_score, total_score, contains_key_code, is_edge_value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(number) DO UPDATE SET
                sum = excluded.sum,
                span = excluded.span,
                sum_score = excluded.sum_score,
                span_score = excluded.span_score,
                hot_cold_score = excluded.hot_cold_score,
                hit_score = excluded.hit_score,
                total_score = excluded.total_score,
                contains_key_code = excluded.contains_key_code,
                is_edge_value = excluded.is_edge_value,
                updated_at = excluded.updated_at"
        )?;
        for score in scores {
            stmt.execute(rusqlite::params![
                score.number,
                score.sum,
                score.span,
                score.sum_score,
                score.span_score,
                score.hot_cold_score,
                score.hit_score,
                score.total_score,
                score.contains_key_code as i32,
                score.is_edge_value as i32,
                updated_at,
            ]).with_context(|| format!("Échec de l'enregistrement de la note {}", score.number))?;
        }
    }
    tx.commit().context("Échec du commit")?;
    info!(count = scores.len(), "notes enregistrées");
    Ok(scores.len())
}

pub fn load_scores(conn: &Connection) -> Result<Vec<ScoreRecord>> {
    let mut stmt = conn.prepare(
        "SELECT number, sum, span, sum_score, span_score, hot_cold_score, hit_score, total_score, contains_key_code, is_edge_value
         FROM scores ORDER BY number ASC"
    )?;
    let scores = stmt.query_map([], |row| {
        Ok(ScoreRecord {
            number: row.get(0)?,
            sum: row.get(1)?,
            span: row.get(2)?,
            sum_score: row.get(3)?,
            span_score: row.get(4)?,
            hot_cold_score: row.get(5)?,
            hit_score: row.get(6)?,
            total_score: row.get(7)?,
            contains_key_code: row.get::<_, i32>(8)? != 0,
            is_edge_value: row.get::<_, i32>(9)? != 0,
        })
    })?.collect::<Result<Vec<_>, _>>()?;
    Ok(scores)
}

/// Remplace le résultat stocké pour cette couche.
pub fn save_layer(conn: &Connection, record: &LayerRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO layer_results (layer_id, numbers, count, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            record.layer_id.to_string(),
            record.numbers,
            record.count as i64,
            now(),
        ],
    ).with_context(|| format!("Échec de l'enregistrement de la couche {}", record.layer_id))?;
    debug!(layer = %record.layer_id, count = record.count, "couche enregistrée");
    Ok(())
}

pub fn load_layer(conn: &Connection, layer_id: LayerId) -> Result<Option<LayerRecord>> {
    let row = conn.query_row(
        "SELECT numbers, count FROM layer_results WHERE layer_id = ?1",
        [layer_id.to_string()],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
    ).optional()?;
    Ok(row.map(|(numbers, count)| LayerRecord {
        layer_id,
        numbers,
        count: count as usize,
    }))
}

pub fn insert_hit(conn: &Connection, hit: &HitRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO hit_statistics (draw_number, is_hit, layer_id, draw_time)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            hit.draw_number,
            hit.is_hit as i32,
            hit.layer_id.to_string(),
            hit.draw_time,
        ],
    ).context("Échec de l'enregistrement du test")?;
    Ok(())
}

/// Derniers tests d'une couche, du plus récent au plus ancien.
pub fn fetch_hits(conn: &Connection, layer_id: LayerId, limit: u32) -> Result<Vec<HitRecord>> {
    let mut stmt = conn.prepare(
        "SELECT draw_number, is_hit, layer_id, draw_time
         FROM hit_statistics WHERE layer_id = ?1 ORDER BY id DESC LIMIT ?2"
    )?;
    let rows = stmt.query_map(rusqlite::params![layer_id.to_string(), limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i32>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?.collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(draw_number, is_hit, layer_id, draw_time)| -> Result<HitRecord> {
            Ok(HitRecord {
                draw_number,
                is_hit: is_hit != 0,
                layer_id: layer_id.parse()?,
                draw_time,
            })
        })
        .collect()
}

pub fn hit_summary(conn: &Connection, layer_id: LayerId) -> Result<HitStatistic> {
    let (total, hits): (u32, u32) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_hit), 0) FROM hit_statistics WHERE layer_id = ?1",
        [layer_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(HitStatistic { total, hits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoredCandidate;

    fn test_draw(number: &str, period: &str, date: &str) -> Draw {
        Draw {
            id: None,
            number: number.to_string(),
            draw_date: Some(date.to_string()),
            period: Some(period.to_string()),
        }
    }

    fn test_candidate(number: &str) -> ScoredCandidate {
        ScoredCandidate {
            number: number.to_string(),
            digits: [0, 0, 0],
            sum: 0,
            span: 0,
            sum_score: 2.0,
            span_score: 3.0,
            hot_cold_score: 5.0,
            hit_score: 0.0,
            total_score: 2.5,
            hot_count: 0,
            cold_count: 0,
            contains_key_code: false,
            is_edge_value: true,
        }
    }

    fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_count() {
        let conn = open_test_db();
        assert_eq!(count_draws(&conn).unwrap(), 0);

        insert_draw(&conn, &test_draw("1,2,3,4", "2024032000", "2024-03-20"), "234").unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_period_ignored() {
        let conn = open_test_db();

        let draw = test_draw("1,2,3,4", "2024032000", "2024-03-20");
        assert!(insert_draw(&conn, &draw, "234").unwrap());
        assert!(!insert_draw(&conn, &draw, "234").unwrap());
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_draws_without_period_are_kept() {
        let conn = open_test_db();

        insert_draw(&conn, &Draw::new("1234"), "234").unwrap();
        insert_draw(&conn, &Draw::new("1234"), "234").unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 2);
    }

    #[test]
    fn test_fetch_order() {
        let conn = open_test_db();

        insert_draw(&conn, &test_draw("1111", "001", "2024-01-01"), "111").unwrap();
        insert_draw(&conn, &test_draw("2222", "002", "2024-01-05"), "222").unwrap();
        insert_draw(&conn, &test_draw("3333", "003", "2024-01-03"), "333").unwrap();

        let draws = fetch_last_draws(&conn, 10).unwrap();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].draw_date.as_deref(), Some("2024-01-05"));
        assert_eq!(draws[1].draw_date.as_deref(), Some("2024-01-03"));
        assert_eq!(draws[2].draw_date.as_deref(), Some("2024-01-01"));
        assert_eq!(draws[0].number, "2222");
    }

    #[test]
    fn test_scores_upsert() {
        let conn = open_test_db();

        let mut record = test_candidate("123").record();
        save_scores(&conn, &[record.clone()]).unwrap();
        record.total_score = "9.99".to_string();
        save_scores(&conn, &[record.clone(), test_candidate("000").record()]).unwrap();

        let scores = load_scores(&conn).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].number, "000");
        assert_eq!(scores[1], record);
    }

    #[test]
    fn test_layer_replace_and_count() {
        let conn = open_test_db();

        let first: Vec<ScoredCandidate> = ["001", "002", "003"].iter().map(|n| test_candidate(n)).collect();
        save_layer(&conn, &LayerRecord::from_layer(LayerId::L6, &first).unwrap()).unwrap();
        let second: Vec<ScoredCandidate> = ["004", "005"].iter().map(|n| test_candidate(n)).collect();
        save_layer(&conn, &LayerRecord::from_layer(LayerId::L6, &second).unwrap()).unwrap();

        let stored = load_layer(&conn, LayerId::L6).unwrap().unwrap();
        let candidates = stored.candidates().unwrap();
        assert_eq!(stored.count, 2);
        assert_eq!(stored.count, candidates.len());
        assert_eq!(candidates[0].number, "004");
        assert!(load_layer(&conn, LayerId::L1).unwrap().is_none());
    }

    #[test]
    fn test_hit_summary() {
        let conn = open_test_db();
        assert_eq!(hit_summary(&conn, LayerId::L6).unwrap(), HitStatistic::default());

        for (number, is_hit) in [("123", true), ("456", false), ("789", true)] {
            insert_hit(&conn, &HitRecord {
                draw_number: number.to_string(),
                is_hit,
                layer_id: LayerId::L6,
                draw_time: "2024-03-20T00:00:00+00:00".to_string(),
            }).unwrap();
        }
        insert_hit(&conn, &HitRecord {
            draw_number: "000".to_string(),
            is_hit: false,
            layer_id: LayerId::L1,
            draw_time: "2024-03-21T00:00:00+00:00".to_string(),
        }).unwrap();

        let summary = hit_summary(&conn, LayerId::L6).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.hits, 2);
        assert!((summary.rate() - 66.67).abs() < 1e-9);

        let log = fetch_hits(&conn, LayerId::L6, 10).unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|h| h.layer_id == LayerId::L6));
        assert_eq!(log[0].draw_number, "789");

        let log = fetch_hits(&conn, LayerId::L1, 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].draw_number, "000");
        assert!(fetch_hits(&conn, LayerId::L3, 10).unwrap().is_empty());
    }
}
