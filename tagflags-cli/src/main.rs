use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::{Map, Value as JsonValue, json};
use tagflags_conditional::ConditionalValue;
use tagflags_encoding::{Direction, EdgeRecord, Mode, PropertyKind, PropertyRegistry};
use tagflags_parsers::{EncodingConfig, OsmBatch, OsmParsers, WayGraph};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static PROGRESS_STYLE: OnceLock<ProgressStyle> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "tagflags-cli", author, version, about, long_about = None)]
struct Cli {
    /// Path to the encoding config (JSON)
    #[arg(env)]
    encoding_config: PathBuf,

    /// Disables progress output
    #[arg(env, long)]
    no_progress: bool,

    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sealed edge record layout
    Layout,
    /// Classify the nodes, ways and relations of a JSON batch and print the decoded records
    Classify {
        /// Path to a JSON file with `nodes`, `ways` and `relations`
        batch: PathBuf,
    },
    /// Evaluate a conditional tag value (e.g. `no @ (Mo-Fr 07:00-09:00)`) at a point in time
    Evaluate {
        expression: String,
        /// Local time, e.g. 2021-01-06T08:30:00
        timestamp: NaiveDateTime,
        /// Mode whose access values classify the clauses; the first configured mode by default
        #[arg(long)]
        mode: Option<Mode>,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read {what} at {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {what}"))
}

fn layout(registry: &PropertyRegistry) -> JsonValue {
    let properties: Vec<JsonValue> = registry
        .descriptors()
        .iter()
        .map(|d| {
            let mut entry = json!({
                "name": d.name(),
                "kind": d.kind().label(),
                "forward": d.forward_range(),
                "backward": d.backward_range(),
            });
            if let PropertyKind::Decimal { factor, min, .. } = d.kind() {
                entry["factor"] = json!(factor);
                entry["min"] = json!(min);
            }
            entry
        })
        .collect();
    json!({
        "words": registry.size_words(),
        "bits_used": registry.bits_used(),
        "properties": properties,
    })
}

fn decode(
    registry: &PropertyRegistry,
    record: &EdgeRecord,
    direction: Direction,
) -> anyhow::Result<JsonValue> {
    let mut values = Map::new();
    for (name, value) in registry.decode(record, direction) {
        values.insert(name.to_string(), serde_json::to_value(value)?);
    }
    Ok(JsonValue::Object(values))
}

fn classify(parsers: &OsmParsers, batch: &OsmBatch) -> anyhow::Result<JsonValue> {
    let relation_flags = parsers.handle_relations(&batch.relations);
    info!(
        relations = batch.relations.len(),
        ways = relation_flags.len(),
        "Aggregated route relations"
    );

    let count = u32::try_from(batch.ways.len()).context("Too many ways in one batch")?;
    let progress_bar = PROGRESS_STYLE.get().map(|style| {
        let bar = ProgressBar::new(u64::from(count));
        bar.set_message(format!("Classifying {count} ways..."));
        bar.set_style(style.clone());
        bar
    });
    let records: Vec<EdgeRecord> = (0..count)
        .into_par_iter()
        .zip(&batch.ways)
        .map(|(edge_id, way)| {
            let mut record = parsers.create_edge_record();
            parsers.handle_way_tags(edge_id, &mut record, way, relation_flags.get(&way.id));
            if let Some(bar) = &progress_bar {
                bar.inc(1);
            }
            record
        })
        .collect();
    progress_bar.inspect(ProgressBar::finish);

    let registry = parsers.registry();
    let ways = batch
        .ways
        .iter()
        .zip(&records)
        .zip(0u32..)
        .map(|((way, record), edge_id)| {
            let conditionals: Vec<JsonValue> = parsers
                .conditionals()
                .entries(edge_id)
                .iter()
                .map(|entry| {
                    json!({
                        "modes": entry.modes().iter().collect::<Vec<_>>(),
                        "type": format!("{:?}", entry.restriction_type()),
                        "value": entry.raw(),
                    })
                })
                .collect();
            Ok(json!({
                "way": way.id,
                "forward": decode(registry, record, Direction::Forward)?,
                "backward": decode(registry, record, Direction::Backward)?,
                "conditional": conditionals,
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let barriers: HashMap<String, Vec<Mode>> = batch
        .nodes
        .iter()
        .map(|node| (node.id, parsers.handle_node_tags(node)))
        .filter(|(_, modes)| !modes.is_empty())
        .map(|(id, modes)| (id.to_string(), modes.iter().collect()))
        .collect();

    let codec = parsers.turn_cost_codec();
    let table = parsers.handle_turn_relations(&batch.relations, &WayGraph::new(&batch.ways))?;
    let mut turns = Vec::with_capacity(table.len());
    for (key, record) in table.iter() {
        let mut restricted = Vec::new();
        for mode in codec.modes() {
            if codec.is_restricted(record, mode)? {
                restricted.push(mode);
            }
        }
        turns.push(json!({ "turn": key, "restricted": restricted }));
    }

    info!(
        ways = records.len(),
        failed = parsers.failed_ways(),
        conditional = parsers.conditional_ways(),
        barriers = barriers.len(),
        turns = turns.len(),
        "Classified batch"
    );
    Ok(json!({
        "ways": ways,
        "barriers": barriers,
        "turn_restrictions": turns,
    }))
}

fn evaluate(
    parsers: &OsmParsers,
    expression: &str,
    at: NaiveDateTime,
    mode: Option<Mode>,
) -> anyhow::Result<JsonValue> {
    let mode = mode
        .or_else(|| parsers.modes().next())
        .ok_or_else(|| anyhow!("The encoding config has no modes"))?;
    let classifier = parsers
        .classifier(mode)
        .ok_or_else(|| anyhow!("Mode {mode} is not configured"))?;
    let value = ConditionalValue::parse(expression)?;
    let state = value.evaluate(at, parsers.calendar(), classifier.inspector().policy(), None);
    Ok(json!({
        "mode": mode,
        "at": at,
        "state": format!("{state:?}").to_lowercase(),
        "skipped": value.skipped.len(),
    }))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    if !cli.no_progress {
        _ = PROGRESS_STYLE.set(
            ProgressStyle::with_template(
                "[{elapsed}] {bar:40.cyan/blue} {msg} {percent}% ETA {eta}",
            )?
            .progress_chars("##-"),
        );
    }

    let config: EncodingConfig = read_json(&cli.encoding_config, "encoding config")?;
    let parsers = OsmParsers::builder(config).build()?;

    let output = match cli.command {
        Commands::Layout => layout(parsers.registry()),
        Commands::Classify { batch } => {
            let batch: OsmBatch = read_json(&batch, "batch")?;
            info!(
                nodes = batch.nodes.len(),
                ways = batch.ways.len(),
                relations = batch.relations.len(),
                "Loaded batch"
            );
            classify(&parsers, &batch)?
        }
        Commands::Evaluate {
            expression,
            timestamp,
            mode,
        } => evaluate(&parsers, &expression, timestamp, mode)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
