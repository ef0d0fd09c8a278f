use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ninefold::analysis::backtest::walk_forward;
use ninefold::analysis::hit::test_hit;
use ninefold::analysis::{extract_digits, run_pipeline};
use ninefold::config::{PipelineConfig, load_or_default, save_config};
use ninefold::display::{
    display_backtest, display_draws, display_history, display_hit, display_hit_log,
    display_hit_summary, display_import_summary, display_layer, display_layer_summary,
    display_scores,
};
use ninefold::import::{import_file, insert_draws};
use ninefold::sampler::generate_sample_draws;
use ninefold_db::db::{
    count_draws, db_path, fetch_hits, fetch_last_draws, hit_summary, insert_hit, load_layer,
    load_scores, migrate, open_db, save_layer, save_scores,
};
use ninefold_db::models::{HitRecord, LayerId, LayerRecord};
use ninefold_db::rusqlite::Connection;

const EMPTY_DB_HINT: &str = "Base vide. Lancez d'abord : ninefold import ou ninefold sample";

#[derive(Parser)]
#[command(name = "ninefold", about = "Notation 4D et filtrage à neuf couches des numéros 000-999")]
struct Cli {
    /// Chemin de la base SQLite (défaut : ./data/ninefold.db)
    #[arg(long, global = true, env = "NINEFOLD_DB")]
    db: Option<PathBuf>,

    /// Fichier de configuration JSON
    #[arg(long, global = true, env = "NINEFOLD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer des tirages depuis un fichier JSON ou CSV
    Import {
        /// Chemin vers le fichier (.json ou .csv `period;drawDate;number`)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Générer un historique fictif
    Sample {
        /// Nombre de tirages (défaut : configuration)
        #[arg(short, long)]
        count: Option<usize>,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Analyser l'historique, noter les 1000 numéros et filtrer les neuf couches
    Analyze {
        /// Fenêtre d'analyse (nombre de tirages)
        #[arg(short, long)]
        window: Option<u32>,

        /// Nombre de chiffres clés
        #[arg(short, long)]
        key_codes: Option<usize>,

        /// Ne pas enregistrer les notes et les couches
        #[arg(long)]
        no_save: bool,
    },

    /// Afficher une couche enregistrée
    Layer {
        /// Identifiant de couche (L1-L9)
        id: LayerId,

        /// Nombre de numéros à afficher
        #[arg(short, long, default_value = "20")]
        top: usize,
    },

    /// Afficher les meilleures notes enregistrées
    Scores {
        /// Nombre de numéros à afficher
        #[arg(short, long, default_value = "20")]
        top: usize,
    },

    /// Tester un tirage contre une couche enregistrée
    TestHit {
        /// Numéro tiré ("d,d,d,d" ou "dddd")
        number: String,

        /// Couche de référence (défaut : configuration)
        #[arg(short, long)]
        layer: Option<LayerId>,
    },

    /// Statistiques de couverture
    Stats {
        /// Nombre de tests à afficher
        #[arg(short = 'n', long, default_value = "20")]
        last: u32,

        /// Couche de référence (défaut : configuration)
        #[arg(short, long)]
        layer: Option<LayerId>,
    },

    /// Validation glissante sur les derniers tirages
    Backtest {
        /// Fenêtre d'analyse pour chaque test
        #[arg(short, long)]
        window: Option<u32>,

        /// Nombre de tirages testés
        #[arg(short, long, default_value = "20")]
        tests: usize,

        /// Couche testée (défaut : configuration)
        #[arg(short, long)]
        layer: Option<LayerId>,
    },

    /// Écrire la configuration courante dans un fichier JSON
    Config {
        #[arg(short, long, default_value = "ninefold.json")]
        output: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NINEFOLD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    let path = cli.db.unwrap_or_else(db_path);

    if let Command::Config { output } = &cli.command {
        return cmd_config(&config, output);
    }

    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file),
        Command::Sample { count, seed } => {
            cmd_sample(&conn, count.unwrap_or(config.sample_size), seed)
        }
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Analyze { window, key_codes, no_save } => {
            let config = PipelineConfig {
                window: window.unwrap_or(config.window),
                key_code_count: key_codes.unwrap_or(config.key_code_count),
                ..config
            };
            config.validate()?;
            cmd_analyze(&conn, &config, !no_save)
        }
        Command::Layer { id, top } => cmd_layer(&conn, id, top),
        Command::Scores { top } => cmd_scores(&conn, top),
        Command::TestHit { number, layer } => {
            cmd_test_hit(&conn, &number, layer.unwrap_or(config.reference_layer))
        }
        Command::Stats { last, layer } => {
            cmd_stats(&conn, last, layer.unwrap_or(config.reference_layer))
        }
        Command::Backtest { window, tests, layer } => cmd_backtest(
            &conn,
            window.unwrap_or(config.window),
            tests,
            layer.unwrap_or(config.reference_layer),
            config.key_code_count,
        ),
        Command::Config { .. } => Ok(()),
    }
}

fn cmd_config(config: &PipelineConfig, output: &Path) -> Result<()> {
    save_config(config, output)?;
    println!("Configuration écrite dans {}", output.display());
    Ok(())
}

fn cmd_import(conn: &Connection, file: &Path) -> Result<()> {
    let result = import_file(conn, file)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_sample(conn: &Connection, count: usize, seed: Option<u64>) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let draws = generate_sample_draws(count, seed, today);
    info!(count, ?seed, "historique fictif généré");
    let result = insert_draws(conn, &draws)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    if count_draws(conn)? == 0 {
        println!("{EMPTY_DB_HINT}");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_analyze(conn: &Connection, config: &PipelineConfig, save: bool) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        warn!("aucun tirage : analyse sur des fréquences nulles");
        println!("{EMPTY_DB_HINT}");
    }
    let effective_window = config.window.min(n);
    let draws = fetch_last_draws(conn, effective_window)?;

    let analysis = run_pipeline(&draws, config.key_code_count);
    display_history(&analysis.history, draws.len());
    display_layer_summary(&analysis.layers);

    if save {
        let records: Vec<_> = analysis.scored.values().map(|c| c.record()).collect();
        save_scores(conn, &records)?;
        for (id, candidates) in analysis.layers.iter() {
            save_layer(conn, &LayerRecord::from_layer(id, candidates)?)?;
        }
        println!("\nNotes et couches enregistrées.");
    }
    Ok(())
}

fn load_saved_layer(conn: &Connection, id: LayerId) -> Result<Vec<ninefold_db::models::ScoredCandidate>> {
    let record = load_layer(conn, id)?
        .with_context(|| format!("Aucun résultat pour {}. Lancez d'abord : ninefold analyze", id))?;
    let candidates = record.candidates()?;
    if candidates.len() != record.count {
        bail!(
            "Couche {} incohérente : {} numéros pour un effectif de {}",
            id,
            candidates.len(),
            record.count
        );
    }
    Ok(candidates)
}

fn cmd_layer(conn: &Connection, id: LayerId, top: usize) -> Result<()> {
    let candidates = load_saved_layer(conn, id)?;
    display_layer(id, &candidates, top);
    Ok(())
}

fn cmd_scores(conn: &Connection, top: usize) -> Result<()> {
    let mut records = load_scores(conn)?;
    records.sort_by(|a, b| {
        let a_total: f64 = a.total_score.parse().unwrap_or(0.0);
        let b_total: f64 = b.total_score.parse().unwrap_or(0.0);
        b_total.total_cmp(&a_total)
    });
    display_scores(&records, top);
    Ok(())
}

fn cmd_test_hit(conn: &Connection, number: &str, layer: LayerId) -> Result<()> {
    let candidates = load_saved_layer(conn, layer)?;
    let digits = extract_digits(number);
    if digits.chars().count() != 3 {
        warn!(number, digits = %digits, "numéro mal formé");
    }
    let hit = test_hit(number, &candidates);

    insert_hit(conn, &HitRecord {
        draw_number: digits.clone(),
        is_hit: hit,
        layer_id: layer,
        draw_time: chrono::Utc::now().to_rfc3339(),
    })?;

    let stat = hit_summary(conn, layer)?;
    display_hit(&digits, hit, layer, &stat);
    Ok(())
}

fn cmd_stats(conn: &Connection, last: u32, layer: LayerId) -> Result<()> {
    let stat = hit_summary(conn, layer)?;
    display_hit_summary(layer, &stat);
    let hits = fetch_hits(conn, layer, last)?;
    display_hit_log(&hits);
    Ok(())
}

fn cmd_backtest(
    conn: &Connection,
    window: u32,
    tests: usize,
    layer: LayerId,
    key_code_count: usize,
) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        println!("{EMPTY_DB_HINT}");
        return Ok(());
    }
    let needed = (tests as u32).saturating_add(window).min(n);
    let draws = fetch_last_draws(conn, needed)?;
    let report = walk_forward(&draws, window as usize, tests, layer, key_code_count);
    display_backtest(&report);
    Ok(())
}
