use std::path::{Path, PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;
use tracing::{error, info, warn};

use ar_common::catalog_file::{CatalogSourceError, load_catalog, resolve_catalog_path};
use ar_common::logging::{self, LogConfig};
use ar_common::{EngineConfig, RecommendationService, ServiceError};

/// Queries covering a spread of job roles and skills.
const SAMPLE_QUERIES: [&str; 10] = [
    "Data Scientist with Python and machine learning experience",
    "Sales Manager with customer relationship skills",
    "Software Engineer proficient in Java and cloud technologies",
    "Financial Analyst with Excel and accounting knowledge",
    "Project Manager with Agile methodology experience",
    "Customer Service Representative with conflict resolution skills",
    "Human Resources Specialist with recruitment experience",
    "Marketing Manager with digital marketing and social media expertise",
    "Mechanical Engineer with CAD design skills",
    "Executive Leadership position requiring strategic decision making",
];

#[derive(Debug, Parser)]
#[command(name = "ar-eval", about = "Run sample queries and report score statistics")]
struct Cli {
    /// Catalog JSON to index. Well-known locations are searched when unset.
    #[arg(long, env = "AR_CATALOG_PATH")]
    catalog_path: Option<PathBuf>,

    /// Recommendations per query
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Query to run instead of the built-in samples; repeatable
    #[arg(long = "query")]
    queries: Vec<String>,
}

#[derive(Debug, Error)]
enum EvalError {
    #[error("no catalog file found; pass --catalog-path")]
    MissingCatalog,
    #[error(transparent)]
    Source(#[from] CatalogSourceError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Aggregate of every similarity score seen during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoreSummary {
    count: usize,
    mean: f64,
    min: f64,
    max: f64,
    median: f64,
}

/// Mean, min, max and median of `scores`; `None` when empty.
/// The median of an even-sized sample is the mean of the two middle values.
fn summarize(scores: &[f64]) -> Option<ScoreSummary> {
    if scores.is_empty() {
        return None;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Some(ScoreSummary {
        count,
        mean: sorted.iter().sum::<f64>() / count as f64,
        min: sorted[0],
        max: sorted[count - 1],
        median,
    })
}

fn load_service(
    explicit: Option<&Path>,
    base: &Path,
) -> Result<RecommendationService, EvalError> {
    let path = resolve_catalog_path(explicit, base).ok_or(EvalError::MissingCatalog)?;
    let raw = load_catalog(&path)?;

    let service = RecommendationService::new(&EngineConfig::from_env());
    let stats = service.index(&raw)?;
    info!(
        path = %path.display(),
        count = stats.count,
        scoring_mode = stats.scoring_mode.as_ref(),
        "catalog loaded"
    );
    Ok(service)
}

fn evaluate(
    service: &RecommendationService,
    queries: &[String],
    top_k: usize,
) -> Result<Vec<f64>, EvalError> {
    let generation = service.current()?;
    let mut scores = Vec::new();

    info!(top_k, queries = queries.len(), "evaluation started");

    for (i, query) in queries.iter().enumerate() {
        let ranking = generation.rank(query, top_k)?;
        info!(
            query_number = i + 1,
            %query,
            scoring_mode = ranking.mode.as_ref(),
            results = ranking.items.len(),
            "query"
        );
        if ranking.items.is_empty() {
            warn!(%query, "no recommendations");
        }

        for (rank, scored) in ranking.items.iter().enumerate() {
            scores.push(scored.similarity_score);
            info!(
                rank = rank + 1,
                name = %scored.item.name,
                score = format_args!("{:.4}", scored.similarity_score),
                category = %scored.item.category,
                tags = %scored.item.tags.join(", "),
                recommended_for = %scored.item.recommended_roles.join(", "),
                "recommendation"
            );
        }
    }

    Ok(scores)
}

fn run() -> Result<(), EvalError> {
    dotenv().ok();
    logging::init(env!("CARGO_PKG_NAME"), &LogConfig::from_env());

    let cli = Cli::parse();
    let queries: Vec<String> = if cli.queries.is_empty() {
        SAMPLE_QUERIES.iter().map(|q| q.to_string()).collect()
    } else {
        cli.queries.clone()
    };

    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let service = load_service(cli.catalog_path.as_deref(), &base)?;
    let scores = evaluate(&service, &queries, cli.top_k)?;

    match summarize(&scores) {
        Some(summary) => info!(
            count = summary.count,
            mean = format_args!("{:.4}", summary.mean),
            min = format_args!("{:.4}", summary.min),
            max = format_args!("{:.4}", summary.max),
            median = format_args!("{:.4}", summary.median),
            "overall statistics"
        ),
        None => warn!("no scores collected"),
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        error!(error = %err, "ar-eval failed");
        std::process::exit(1);
    }
}
