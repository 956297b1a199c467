//! Gnosis CLI
//!
//! Thin command-line front end over `gnosis-core`. The hard engineering — the search pipeline, the index
//! substrate, the memory layer, the transactional graph — all lives in
//! the library; this binary only parses arguments, opens a store, and
//! formats results.

use std::path::PathBuf;

use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use colored::Colorize;
use gnosis_core::search::lexical::{boolean as lexical_boolean, fuzzy as lexical_fuzzy, ranked as lexical_ranked};
use gnosis_core::{Entity, EntityPatch, Gnosis, GnosisConfig, HybridOptions, Relation, SymbolicFilters, TfIdfIndex};

/// Gnosis - embedded knowledge-graph store with hybrid search
#[derive(Parser)]
#[command(name = "gnosis")]
#[command(author, version, about = "CLI for the gnosis knowledge-graph store")]
struct Cli {
    /// Path to the graph file; defaults to the platform data directory.
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Emit machine-readable JSON instead of colored text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the graph via the hybrid pipeline, or a single lexical mode.
    #[command(group(ArgGroup::new("mode").args(["ranked", "boolean", "fuzzy"])))]
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Restrict to a single entity type (case-insensitive).
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// Score purely with TF-IDF, bypassing semantic/symbolic layers.
        #[arg(long)]
        ranked: bool,

        /// Parse `query` as a boolean expression (AND/OR/NOT/FIELD:value).
        #[arg(long)]
        boolean: bool,

        /// Fuzzy (edit-distance) match against entity fields.
        #[arg(long)]
        fuzzy: bool,

        /// Similarity/edit-distance threshold, used by `--fuzzy` and the
        /// semantic layer of hybrid search.
        #[arg(long, default_value_t = 0.6)]
        threshold: f64,

        /// Print the query analysis (question type, complexity, entities
        /// extracted) alongside the results.
        #[arg(long)]
        suggest: bool,
    },

    /// Entity CRUD.
    #[command(subcommand)]
    Entity(EntityCommands),

    /// Relation CRUD.
    #[command(subcommand)]
    Relation(RelationCommands),

    /// List backups taken by the transaction manager.
    Backups,
}

#[derive(Subcommand)]
enum EntityCommands {
    /// Create an entity.
    Create {
        name: String,
        entity_type: String,
        #[arg(long = "observation")]
        observations: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        importance: Option<f64>,
    },
    /// Print one entity.
    Get { name: String },
    /// Add observations/tags to an existing entity.
    Update {
        name: String,
        #[arg(long = "observation")]
        add_observations: Vec<String>,
        #[arg(long)]
        importance: Option<f64>,
    },
    /// Delete an entity (cascades to its relations).
    Delete { name: String },
}

#[derive(Subcommand)]
enum RelationCommands {
    /// Create a relation between two existing-or-deferred entity names.
    Create {
        from: String,
        to: String,
        relation_type: String,
    },
    /// Delete a relation by its (from, to, type) key.
    Delete {
        from: String,
        to: String,
        relation_type: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let path = cli
        .graph
        .clone()
        .unwrap_or_else(gnosis_core::graph::GraphStoreConfig::default_path);
    let gnosis = Gnosis::open(path, GnosisConfig::default())?;

    let exit_code = match cli.command {
        Commands::Search {
            query,
            limit,
            entity_type,
            ranked,
            boolean,
            fuzzy,
            threshold,
            suggest,
        } => {
            run_search(
                &gnosis, &query, limit, entity_type, ranked, boolean, fuzzy, threshold, suggest,
                cli.json,
            )
            .await?
        }
        Commands::Entity(cmd) => run_entity(&gnosis, cmd, cli.json)?,
        Commands::Relation(cmd) => run_relation(&gnosis, cmd, cli.json)?,
        Commands::Backups => run_backups(&gnosis, cli.json)?,
    };
    std::process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
async fn run_search(
    gnosis: &Gnosis,
    query: &str,
    limit: usize,
    entity_type: Option<String>,
    ranked: bool,
    boolean: bool,
    fuzzy: bool,
    threshold: f64,
    suggest: bool,
    json: bool,
) -> anyhow::Result<i32> {
    if suggest {
        let analysis = gnosis_core::analyze(query);
        if json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            println!("{}", "Query analysis:".cyan().bold());
            println!("  question_type: {:?}", analysis.question_type);
            println!("  complexity:    {:?}", analysis.complexity);
            println!("  confidence:    {:.2}", analysis.confidence);
            if !analysis.persons.is_empty() {
                println!("  persons:       {:?}", analysis.persons);
            }
            if !analysis.locations.is_empty() {
                println!("  locations:     {:?}", analysis.locations);
            }
        }
    }

    if ranked {
        let entities = gnosis.store().all_entities();
        let entities: Vec<_> = match &entity_type {
            Some(t) => entities
                .into_iter()
                .filter(|e| e.type_key() == t.to_lowercase())
                .collect(),
            None => entities,
        };
        let index_path = index_path_for(gnosis);
        let index = TfIdfIndex::open(index_path, gnosis.store())?;
        let matches = lexical_ranked(&index, &entities, query, None, None, None, limit);
        print_ranked(&matches, json);
        return Ok(0);
    }

    if boolean {
        let mut entities = gnosis.store().all_entities();
        if let Some(t) = &entity_type {
            entities.retain(|e| e.type_key() == t.to_lowercase());
        }
        let matches = lexical_boolean(&entities, query);
        print_entities(&matches.into_iter().take(limit).cloned().collect::<Vec<_>>(), json);
        return Ok(0);
    }

    if fuzzy {
        let mut entities = gnosis.store().all_entities();
        if let Some(t) = &entity_type {
            entities.retain(|e| e.type_key() == t.to_lowercase());
        }
        let matches = lexical_fuzzy(&entities, query, threshold);
        let matched: Vec<Entity> = matches.into_iter().take(limit).map(|(e, _)| e.clone()).collect();
        print_entities(&matched, json);
        return Ok(0);
    }

    let mut options = HybridOptions {
        limit,
        min_similarity: threshold as f32,
        ..HybridOptions::default()
    };
    if let Some(t) = entity_type {
        options.symbolic_filters = SymbolicFilters {
            entity_types: Some(vec![t]),
            ..SymbolicFilters::default()
        };
    }
    let response = gnosis.search(query, &options).await;
    print_hybrid(&response, json);
    Ok(0)
}

fn print_ranked(matches: &[gnosis_core::search::RankedMatch], json: bool) {
    if json {
        let out: Vec<_> = matches
            .iter()
            .map(|m| serde_json::json!({"name": m.name, "score": m.score}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out).unwrap());
        return;
    }
    for m in matches {
        println!("{:>7.3}  {}", m.score, m.name.green());
    }
}

fn print_entities(entities: &[Entity], json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(entities).unwrap());
        return;
    }
    for e in entities {
        println!(
            "{}  {}  [{}]",
            e.name.green().bold(),
            e.entity_type.dimmed(),
            e.observations.join("; ")
        );
    }
}

fn print_hybrid(response: &gnosis_core::search::SearchResponse, json: bool) {
    if json {
        let out: Vec<_> = response
            .results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.entity.name,
                    "combined": r.combined,
                    "semantic": r.semantic,
                    "lexical": r.lexical,
                    "symbolic": r.symbolic,
                    "matched_layers": r.matched_layers.iter().map(|l| format!("{l:?}")).collect::<Vec<_>>(),
                })
            })
            .collect();
        let executed_layers: Vec<String> = response.executed_layers.iter().map(|l| format!("{l:?}")).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "results": out,
                "early_terminated": response.early_terminated,
                "executed_layers": executed_layers,
            }))
            .unwrap()
        );
        return;
    }
    for r in &response.results {
        println!(
            "{:>6.3}  {}  {}",
            r.combined,
            r.entity.name.green().bold(),
            format!("{:?}", r.matched_layers).dimmed()
        );
    }
    if response.early_terminated {
        println!("{}", "(early terminated)".yellow());
    }
}

fn run_entity(gnosis: &Gnosis, cmd: EntityCommands, json: bool) -> anyhow::Result<i32> {
    match cmd {
        EntityCommands::Create {
            name,
            entity_type,
            observations,
            tags,
            importance,
        } => {
            let mut entity = Entity::new(name, entity_type);
            entity.add_observations(observations);
            for tag in tags {
                entity.tags.insert(tag.to_lowercase());
            }
            if let Some(importance) = importance {
                entity.importance = importance;
            }
            let created = gnosis.create_entity(entity)?;
            print_entities(&[created], json);
            Ok(0)
        }
        EntityCommands::Get { name } => match gnosis.get_entity(&name) {
            Some(entity) => {
                print_entities(&[entity], json);
                Ok(0)
            }
            None => {
                eprintln!("{} no such entity: {name}", "error:".red().bold());
                Ok(1)
            }
        },
        EntityCommands::Update {
            name,
            add_observations,
            importance,
        } => {
            let patch = EntityPatch {
                add_observations,
                importance,
                ..EntityPatch::default()
            };
            let updated = gnosis.update_entity(&name, patch)?;
            print_entities(&[updated], json);
            Ok(0)
        }
        EntityCommands::Delete { name } => {
            gnosis.delete_entity(&name)?;
            if !json {
                println!("{} deleted {name}", "ok:".green().bold());
            }
            Ok(0)
        }
    }
}

fn run_relation(gnosis: &Gnosis, cmd: RelationCommands, json: bool) -> anyhow::Result<i32> {
    match cmd {
        RelationCommands::Create {
            from,
            to,
            relation_type,
        } => {
            let relation = gnosis.create_relation(Relation::new(from, to, relation_type))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&relation)?);
            } else {
                println!(
                    "{} {} -[{}]-> {}",
                    "ok:".green().bold(),
                    relation.from,
                    relation.relation_type,
                    relation.to
                );
            }
            Ok(0)
        }
        RelationCommands::Delete {
            from,
            to,
            relation_type,
        } => {
            gnosis.store().delete_relation(&from, &to, &relation_type)?;
            if !json {
                println!("{} deleted {from} -[{relation_type}]-> {to}", "ok:".green().bold());
            }
            Ok(0)
        }
    }
}

/// Mirrors `Gnosis::open`'s convention of deriving sibling paths from the
/// primary graph file (index.json, backups/).
fn sibling(path: &std::path::Path, file_name: &str) -> PathBuf {
    path.parent()
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

fn index_path_for(gnosis: &Gnosis) -> PathBuf {
    sibling(gnosis.store().path(), "index.json")
}

fn run_backups(gnosis: &Gnosis, json: bool) -> anyhow::Result<i32> {
    let backups_dir = sibling(gnosis.store().path(), "backups");
    let backups = gnosis_core::storage::backup::list_backups(&backups_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&backups)?);
        return Ok(0);
    }
    if backups.is_empty() {
        println!("(no backups)");
        return Ok(0);
    }
    for backup in backups {
        let age = Utc::now().signed_duration_since(backup.timestamp);
        println!(
            "{}  {} entities, {} relations  ({}s ago)",
            backup.timestamp.to_rfc3339().dimmed(),
            backup.entity_count,
            backup.relation_count,
            age.num_seconds()
        );
    }
    Ok(0)
}
