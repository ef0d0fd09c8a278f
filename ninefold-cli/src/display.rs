use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

use crate::analysis::HistoryAnalysis;
use crate::analysis::backtest::BacktestReport;
use crate::import::ImportResult;
use ninefold_db::models::{
    Draw, HitRecord, HitStatistic, LayerId, LayerSet, ScoreRecord, ScoredCandidate,
};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn digit_list(digits: &[u8]) -> String {
    if digits.is_empty() {
        return "—".to_string();
    }
    digits
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table(vec!["Période", "Date", "Numéro brut", "3 chiffres"]);
    for draw in draws {
        table.add_row(vec![
            draw.period.clone().unwrap_or_else(|| "—".to_string()),
            draw.draw_date.clone().unwrap_or_else(|| "—".to_string()),
            draw.number.clone(),
            crate::analysis::extract_digits(&draw.number),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.malformed > 0 {
        println!("  Mal formés        : {}", result.malformed);
    }
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

pub fn display_history(history: &HistoryAnalysis, window: usize) {
    println!("\n📊 Fréquences des chiffres sur {} tirages\n", window);

    println!("  Chauds : {}", digit_list(&history.hot));
    println!("  Froids : {}", digit_list(&history.cold));
    println!("  Clés   : {}", digit_list(&history.key));

    if history.freq.is_empty() {
        return;
    }

    let mut table = new_table(vec!["Chiffre", "Fréquence", "Tag"]);
    let mut sorted: Vec<(u8, u32)> = history.freq.iter().map(|(&d, &n)| (d, n)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    for (digit, count) in sorted {
        let (tag, color) = if history.hot.contains(&digit) {
            ("HOT", Color::Green)
        } else if history.cold.contains(&digit) {
            ("COLD", Color::Red)
        } else {
            ("-", Color::White)
        };
        table.add_row(vec![
            Cell::new(digit),
            Cell::new(count),
            Cell::new(tag).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_layer_summary(layers: &LayerSet) {
    println!("\n🧮 Filtrage à neuf couches\n");

    let mut table = new_table(vec![
        "Couche", "Nom", "Description", "Part", "Cible", "Retenus", "Meilleur",
    ]);
    for (id, candidates) in layers.iter() {
        let best = candidates
            .first()
            .map(|c| format!("{} ({:.2})", c.number, c.total_score))
            .unwrap_or_else(|| "—".to_string());
        table.add_row(vec![
            id.to_string(),
            id.name().to_string(),
            id.description().to_string(),
            format!("{:.0} %", id.ratio() * 100.0),
            id.target_size().to_string(),
            candidates.len().to_string(),
            best,
        ]);
    }
    println!("{table}");
}

pub fn display_layer(id: LayerId, candidates: &[ScoredCandidate], top: usize) {
    println!(
        "\n🎯 Couche {} — {} ({} numéros, {} affichés)\n",
        id,
        id.name(),
        candidates.len(),
        top.min(candidates.len())
    );

    let mut table = new_table(vec![
        "#", "Numéro", "Somme", "Écart", "S. somme", "S. écart", "S. chaud/froid", "S. fréquence",
        "Total", "Clé", "Marge",
    ]);

    for (i, c) in candidates.iter().take(top).enumerate() {
        let record = c.record();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&record.number).fg(Color::Cyan),
            Cell::new(record.sum),
            Cell::new(record.span),
            Cell::new(&record.sum_score),
            Cell::new(&record.span_score),
            Cell::new(&record.hot_cold_score),
            Cell::new(&record.hit_score),
            Cell::new(&record.total_score),
            Cell::new(if record.contains_key_code { "oui" } else { "" }),
            Cell::new(if record.is_edge_value { "oui" } else { "" }),
        ]);
    }
    println!("{table}");
}

pub fn display_scores(records: &[ScoreRecord], top: usize) {
    if records.is_empty() {
        println!("Aucune note enregistrée. Lancez d'abord : ninefold analyze");
        return;
    }

    println!(
        "\n🏅 Notes enregistrées ({} numéros, {} affichés)\n",
        records.len(),
        top.min(records.len())
    );

    let mut table = new_table(vec![
        "#", "Numéro", "Somme", "Écart", "S. somme", "S. écart", "S. chaud/froid", "S. fréquence",
        "Total",
    ]);
    for (i, record) in records.iter().take(top).enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&record.number).fg(Color::Cyan),
            Cell::new(record.sum),
            Cell::new(record.span),
            Cell::new(&record.sum_score),
            Cell::new(&record.span_score),
            Cell::new(&record.hot_cold_score),
            Cell::new(&record.hit_score),
            Cell::new(&record.total_score),
        ]);
    }
    println!("{table}");
}

pub fn display_hit(digits: &str, hit: bool, layer: LayerId, stat: &HitStatistic) {
    if hit {
        println!("✅ {} est présent dans {}", digits, layer);
    } else {
        println!("❌ {} est absent de {}", digits, layer);
    }
    display_hit_summary(layer, stat);
}

pub fn display_hit_summary(layer: LayerId, stat: &HitStatistic) {
    println!(
        "Couverture {} : {} / {} tests ({:.2} %)",
        layer, stat.hits, stat.total, stat.rate()
    );
}

pub fn display_hit_log(hits: &[HitRecord]) {
    if hits.is_empty() {
        println!("Aucun test enregistré.");
        return;
    }

    let mut table = new_table(vec!["Date", "Numéro", "Couche", "Résultat"]);
    for hit in hits {
        let (label, color) = if hit.is_hit {
            ("HIT", Color::Green)
        } else {
            ("MISS", Color::Red)
        };
        table.add_row(vec![
            Cell::new(&hit.draw_time),
            Cell::new(&hit.draw_number),
            Cell::new(hit.layer_id),
            Cell::new(label).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_backtest(report: &BacktestReport) {
    println!(
        "\n🔁 Validation glissante sur {} (fenêtre {})\n",
        report.layer, report.window
    );

    let mut table = new_table(vec!["Période", "Numéro", "3 chiffres", "Historique", "Résultat"]);
    for outcome in &report.outcomes {
        let (label, color) = if outcome.hit {
            ("HIT", Color::Green)
        } else {
            ("MISS", Color::Red)
        };
        table.add_row(vec![
            Cell::new(outcome.draw.period.as_deref().unwrap_or("—")),
            Cell::new(&outcome.draw.number),
            Cell::new(&outcome.digits),
            Cell::new(outcome.history_len),
            Cell::new(label).fg(color),
        ]);
    }
    println!("{table}");
    display_hit_summary(report.layer, &report.stat);
}
