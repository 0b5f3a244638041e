use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use reviewrank::models::{CatalogListing, Entity, RankingRecord, RankingRun};
use reviewrank::resolution::{find_duplicate_names, merge_entities};
use reviewrank::classifier::TrainingParams;
use reviewrank::{
    CodeAliases, Config, KeywordClassifier, KeywordLabeler, MergeDirective, RankingPipeline,
    Storage,
};

#[derive(Parser, Debug)]
#[command(name = "reviewrank")]
#[command(version = "0.1.0")]
#[command(about = "Aggregate course and professor reviews into confidence-weighted rankings")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every entity and print the leaderboards
    Rank {
        /// Reviews file (JSON array of entity records)
        #[arg(short, long)]
        reviews: PathBuf,

        /// Merge directive file ({"alias": primary})
        #[arg(short, long)]
        merge: Option<PathBuf>,

        /// Catalog listings to rank instead of the whole store
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Course-number aliases for catalog matching ({"4232": "4995"})
        #[arg(long, requires = "catalog")]
        code_aliases: Option<PathBuf>,

        /// Output format (json, text, markdown)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Database path for storing runs (overrides DATABASE_PATH)
        #[arg(long)]
        database: Option<String>,

        /// Print the most recent stored run if available
        #[arg(long)]
        cached: bool,

        /// Label reviews with keywords only, without training a classifier
        #[arg(long)]
        keyword_only: bool,

        /// Vocabulary cap for the trained classifier
        #[arg(long, default_value = "5000")]
        max_features: usize,
    },
    /// Apply a merge directive and write the merged store
    Merge {
        #[arg(short, long)]
        reviews: PathBuf,

        #[arg(short, long)]
        merge: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List professors that share a name across distinct identities
    Duplicates {
        #[arg(short, long)]
        reviews: PathBuf,
    },
    /// List stored ranking runs, newest first
    Runs {
        /// Database path (overrides DATABASE_PATH)
        #[arg(long)]
        database: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reviewrank=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;

    match args.command {
        Command::Rank {
            reviews,
            merge,
            catalog,
            code_aliases,
            format,
            output,
            database,
            cached,
            keyword_only,
            max_features,
        } => {
            if let Some(database) = database {
                config.database_path = database;
            }
            let storage = Storage::new(&config.database_path)?;

            if cached {
                if let Some(run) = storage.latest_run()? {
                    tracing::info!("Using cached run from {}", run.run_date);
                    return write_output(&render_run(&run, &format)?, output.as_deref());
                }
                tracing::info!("No cached run found, ranking from scratch");
            }

            let entities = load_entities(&reviews)?;
            let mut pipeline = RankingPipeline::new(config)
                .with_progress(true)
                .with_training_params(TrainingParams {
                    max_features,
                    ..TrainingParams::default()
                });

            if let Some(path) = merge {
                pipeline = pipeline.with_merge_directive(MergeDirective::from_path(path)?);
            }
            if let Some(path) = catalog {
                let listings: Vec<CatalogListing> = read_json(&path)?;
                let aliases = match code_aliases {
                    Some(path) => CodeAliases::from_path(path)?,
                    None => CodeAliases::default(),
                };
                pipeline = pipeline.with_catalog(listings, aliases);
            }
            if keyword_only {
                pipeline = pipeline.with_classifier(Box::new(KeywordClassifier::new(KeywordLabeler::new())));
            }

            let result = pipeline.run(entities)?;
            if let Some(ref report) = result.match_report {
                tracing::info!(
                    "Catalog: {} matched ({} by review count), {} unmatched",
                    report.matched.len(),
                    report.guessed().count(),
                    report.unmatched.len()
                );
                for listing in &report.unmatched {
                    tracing::warn!("No entity for catalog listing {} ({})", listing.code, listing.name);
                }
            }

            let run_id = storage.save_run(&result.run)?;
            tracing::info!("Stored run {} (classifier: {})", run_id, result.classifier);

            write_output(&render_run(&result.run, &format)?, output.as_deref())
        }
        Command::Merge { reviews, merge, output } => {
            let entities = load_entities(&reviews)?;
            let directive = MergeDirective::from_path(merge)?;
            let outcome = merge_entities(entities, &directive)?;
            tracing::info!(
                "Merged {} aliases, {} entities remain",
                outcome.merged,
                outcome.entities.len()
            );
            write_output(&serde_json::to_string_pretty(&outcome.entities)?, output.as_deref())
        }
        Command::Duplicates { reviews } => {
            let entities = load_entities(&reviews)?;
            let groups = find_duplicate_names(&entities);
            if groups.is_empty() {
                println!("No duplicate names found.");
            }
            for group in groups {
                println!("{}", group.name);
                for identity in group.identities {
                    println!(
                        "  {} (uni: {}, {} reviews) {}",
                        identity.identity,
                        identity.uni.as_deref().unwrap_or("N/A"),
                        identity.review_count,
                        identity.courses.join(", ")
                    );
                }
            }
            Ok(())
        }
        Command::Runs { database } => {
            if let Some(database) = database {
                config.database_path = database;
            }
            let storage = Storage::new(&config.database_path)?;
            let runs = storage.list_runs()?;
            if runs.is_empty() {
                println!("No stored runs in {}.", config.database_path);
            }
            for (id, run_date) in runs {
                println!("  {}  {}", id, run_date);
            }
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&contents)?)
}

fn load_entities(path: &Path) -> anyhow::Result<Vec<Entity>> {
    let entities: Vec<Entity> = read_json(path)?;
    let reviews: usize = entities.iter().map(Entity::review_count).sum();
    tracing::info!("Loaded {} entities with {} reviews from {}", entities.len(), reviews, path.display());
    Ok(entities)
}

fn write_output(output: &str, path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        std::fs::write(path, output)?;
        tracing::info!("Output written to: {}", path.display());
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn render_run(run: &RankingRun, format: &str) -> anyhow::Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(run)?,
        "markdown" => format_markdown(run),
        _ => format_text(run),
    })
}

fn fmt_stat(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "N/A".to_string(),
    }
}

fn boards(run: &RankingRun) -> [(&'static str, &[RankingRecord]); 4] {
    [
        ("Hardest", run.leaderboards.hardest.as_slice()),
        ("Easiest", run.leaderboards.easiest.as_slice()),
        ("Best Rated", run.leaderboards.best_rated.as_slice()),
        ("Worst Rated", run.leaderboards.worst_rated.as_slice()),
    ]
}

fn format_text(run: &RankingRun) -> String {
    let mut output = String::new();

    output.push_str("\n=== Review Rankings ===\n\n");
    output.push_str(&format!("Entities ranked: {}\n", run.records.len()));
    output.push_str(&format!(
        "Global mean rating: {}\n",
        fmt_stat(run.global_mean_rating, 2)
    ));
    output.push_str(&format!(
        "Reliable for difficulty: {} (>= {} texts)\n",
        run.reliable_difficulty_count(&run.config),
        run.config.min_reviews_difficulty
    ));
    output.push_str(&format!(
        "Reliable for rating: {} (>= {} reviews)\n",
        run.reliable_rating_count(&run.config),
        run.config.min_reviews_rating
    ));

    for (title, records) in boards(run) {
        output.push_str(&format!("\n{}:\n", title));
        if records.is_empty() {
            output.push_str("  (none)\n");
        }
        for (rank, record) in records.iter().enumerate() {
            output.push_str(&format!(
                "  {:>2}. {} | rating {} (raw {}) | difficulty {} | hard {}% | {} reviews, {} texts\n",
                rank + 1,
                record.name,
                fmt_stat(record.bayesian_rating, 2),
                fmt_stat(record.raw_rating, 2),
                fmt_stat(record.bayesian_difficulty, 2),
                fmt_stat(record.hard_pct, 1),
                record.review_count,
                record.text_count
            ));
        }
    }

    output.push_str(&format!(
        "\nRanked on: {}\n",
        run.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

fn format_markdown(run: &RankingRun) -> String {
    let mut output = String::new();

    output.push_str("# Review Rankings\n\n");
    output.push_str("## Summary\n\n");
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    output.push_str(&format!("| Entities Ranked | {} |\n", run.records.len()));
    output.push_str(&format!(
        "| Global Mean Rating | {} |\n",
        fmt_stat(run.global_mean_rating, 2)
    ));
    output.push_str(&format!(
        "| Reliable for Difficulty | {} |\n",
        run.reliable_difficulty_count(&run.config)
    ));
    output.push_str(&format!(
        "| Reliable for Rating | {} |\n",
        run.reliable_rating_count(&run.config)
    ));

    for (title, records) in boards(run) {
        output.push_str(&format!("\n## {}\n\n", title));
        if records.is_empty() {
            output.push_str("_No entity meets the review threshold._\n");
            continue;
        }
        output.push_str("| # | Name | Rating | Difficulty | Hard % | Reviews | Texts |\n");
        output.push_str("|---|------|--------|------------|--------|---------|-------|\n");
        for (rank, record) in records.iter().enumerate() {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} |\n",
                rank + 1,
                record.name,
                fmt_stat(record.bayesian_rating, 2),
                fmt_stat(record.bayesian_difficulty, 2),
                fmt_stat(record.hard_pct, 1),
                record.review_count,
                record.text_count
            ));
        }
    }

    output.push_str(&format!(
        "\n---\n*Ranked on {}*\n",
        run.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}
