//! researchgraph CLI: operate on a research graph database.
//!
//! Usage:
//!   researchgraph merge --name ORCID --category person --value 0000-0001-9510-0802 --source SysA
//!   researchgraph import facts.jsonl
//!   researchgraph link <key|NAME=VALUE> <key|NAME=VALUE> --source SysA
//!   researchgraph enrich <key|NAME=VALUE> --source SysA
//!
//! Every command accepts `--db`, `--config` and `--json`.

use clap::{Args, Parser, Subcommand};
use researchgraph::{
    Category, Config, Fact, MergePolicy, NeighborFilter, Node, NodeKey, PersonRootOutcome,
    PropertyName, ResearchGraphApi,
};
use serde::Serialize;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "researchgraph",
    version,
    about = "Identity-resolving merge engine for research metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file (overrides the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a single fact
    Merge {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        value: String,
        /// Source system asserting the fact
        #[arg(long)]
        source: String,
        /// Extra property as NAME=VALUE (repeatable)
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(PropertyName, String)>,
        /// Identifier of the same person (repeatable)
        #[arg(long = "same-person-as")]
        same_person_as: Vec<String>,
        /// Override the configured merge policy
        #[arg(long)]
        policy: Option<MergePolicy>,
    },
    /// Merge facts from a JSON Lines file ("-" for stdin)
    Import {
        path: PathBuf,
    },
    /// Assert that two identifiers denote the same person
    Link {
        a: String,
        b: String,
        #[arg(long)]
        source: String,
    },
    /// Show a node and its history
    Show {
        key: String,
    },
    /// List the neighbors of a node
    Neighbors {
        key: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Facts around a node that a source system does not know
    Enrich {
        key: String,
        #[arg(long)]
        source: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show the person-roots of a node
    Roots {
        key: String,
    },
    /// Report person-root consistency violations
    Check,
    /// Node and edge counts
    Stats,
    /// Delete every node and edge
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Only neighbors with this name (repeatable)
    #[arg(long = "name")]
    name_want: Vec<String>,
    /// Skip neighbors with this name (repeatable)
    #[arg(long = "exclude-name")]
    name_dontwant: Vec<String>,
    /// Only neighbors of this category (repeatable)
    #[arg(long = "category")]
    category_want: Vec<Category>,
    /// Skip neighbors of this category (repeatable)
    #[arg(long = "exclude-category")]
    category_dontwant: Vec<Category>,
    /// Return at most this many items
    #[arg(long = "max")]
    max_items: Option<usize>,
}

impl From<FilterArgs> for NeighborFilter {
    fn from(args: FilterArgs) -> Self {
        NeighborFilter {
            name_want: args.name_want,
            name_dontwant: args.name_dontwant,
            category_want: args.category_want,
            category_dontwant: args.category_dontwant,
            max_items: args.max_items,
        }
    }
}

fn parse_property(raw: &str) -> Result<(PropertyName, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    Ok((PropertyName::from(name), value.to_string()))
}

/// Accept either a stored key (`name|uuid`) or an identity as `NAME=VALUE`
fn parse_key(raw: &str) -> Result<NodeKey, String> {
    if let Ok(key) = NodeKey::parse(raw) {
        return Ok(key);
    }
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected a node key or NAME=VALUE, got '{}'", raw))?;
    NodeKey::compute(name, value).map_err(|e| e.to_string())
}

fn init_logging(verbose: u8, config_level: Option<&str>) {
    let level = match verbose {
        0 => match config_level {
            Some("trace") => tracing::Level::TRACE,
            Some("debug") => tracing::Level::DEBUG,
            Some("info") => tracing::Level::INFO,
            Some("error") => tracing::Level::ERROR,
            _ => tracing::Level::WARN,
        },
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn print_node_line(node: &Node) {
    println!("{:<48}  {:<14}  {}", node.key, node.category, node.value);
}

fn cmd_merge(api: &ResearchGraphApi, fact: Fact, policy: Option<MergePolicy>, json: bool) -> i32 {
    let policy = policy.unwrap_or(api.handle().settings().policy);
    let engine = researchgraph::MergeEngine::new(api.handle());
    let report = match engine.merge_with(&fact, policy) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&report.node);
    }
    let verb = if report.created { "Created" } else { "Merged into" };
    println!("{} {}", verb, report.node.key);
    for outcome in &report.person_links {
        print_outcome(outcome);
    }
    for hint in &report.skipped_hints {
        println!("Skipped co-identity hint {}", hint);
    }
    0
}

fn cmd_import(api: &ResearchGraphApi, path: &PathBuf, json: bool) -> i32 {
    let result = if path.as_os_str() == "-" {
        api.import_jsonl(std::io::stdin().lock())
    } else {
        match std::fs::File::open(path) {
            Ok(file) => api.import_jsonl(BufReader::new(file)),
            Err(e) => {
                eprintln!("Error: cannot open '{}': {}", path.display(), e);
                return 1;
            }
        }
    };
    let summary = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&summary);
    }
    println!(
        "Imported {} facts: {} created, {} merged, {} rejected",
        summary.created + summary.merged + summary.rejected.len(),
        summary.created,
        summary.merged,
        summary.rejected.len()
    );
    for rejection in &summary.rejected {
        println!("  line {}: {}", rejection.line, rejection.reason);
    }
    for conflict in &summary.conflicts {
        println!("  {}", conflict);
    }
    0
}

fn print_outcome(outcome: &PersonRootOutcome) {
    match outcome {
        PersonRootOutcome::Created { root } => println!("Created person-root {}", root),
        PersonRootOutcome::Joined { root, key } => println!("Joined {} to person-root {}", key, root),
        PersonRootOutcome::AlreadyLinked { root } => println!("Already linked via {}", root),
        PersonRootOutcome::Conflict(conflict) => println!("Conflict: {}", conflict),
    }
}

fn cmd_link(api: &ResearchGraphApi, a: &NodeKey, b: &NodeKey, source: &str, json: bool) -> i32 {
    match api.connect_as_same_person(a, b, source) {
        Ok(outcome) => {
            if json {
                let code = print_json(&outcome);
                if code != 0 {
                    return code;
                }
            } else {
                print_outcome(&outcome);
            }
            // A conflict is reported, not an error, but scripts should notice it
            match outcome.root() {
                Some(_) => 0,
                None => 2,
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_show(api: &ResearchGraphApi, key: &NodeKey, json: bool) -> i32 {
    let node = match api.find_node(key) {
        Ok(Some(node)) => node,
        Ok(None) => {
            eprintln!("Error: node '{}' not found", key);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&node);
    }
    println!("key:      {}", node.key);
    println!("name:     {}", node.name);
    println!("category: {}", node.category);
    println!("value:    {}", node.value);
    for (name, values) in &node.properties {
        println!("{:<9} {}", format!("{}:", name), values.join(", "));
    }
    if !node.history().is_empty() {
        println!("history:");
        for event in node.history() {
            println!("  {}", event.summary());
        }
    }
    0
}

fn cmd_neighbors(api: &ResearchGraphApi, key: &NodeKey, filter: &NeighborFilter, json: bool) -> i32 {
    let nodes: Vec<Node> = match api.neighbors(key, filter) {
        Ok(n) => n.collect(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&nodes);
    }
    if nodes.is_empty() {
        println!("No neighbors.");
    }
    for node in &nodes {
        print_node_line(node);
    }
    0
}

fn cmd_enrich(
    api: &ResearchGraphApi,
    key: &NodeKey,
    source: &str,
    filter: &NeighborFilter,
    json: bool,
) -> i32 {
    let result = match api.enrich(key, source, filter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&result);
    }
    if result.facts.is_empty() {
        println!("Nothing new for {}.", source);
        return 0;
    }
    println!("{:<48}  {:<14}  {:<32}  SOURCES", "KEY", "CATEGORY", "VALUE");
    println!("{}", "-".repeat(110));
    for fact in &result.facts {
        println!(
            "{:<48}  {:<14}  {:<32}  {}",
            fact.key,
            fact.category,
            fact.value,
            fact.sources.join(", ")
        );
    }
    if result.total_count > result.facts.len() {
        println!("({} of {} shown)", result.facts.len(), result.total_count);
    }
    0
}

fn cmd_roots(api: &ResearchGraphApi, key: &NodeKey, json: bool) -> i32 {
    let roots = match api.all_person_root_nodes_of(key) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&roots);
    }
    if roots.is_empty() {
        println!("No person-root.");
    }
    for root in &roots {
        println!("{}", root.key);
    }
    0
}

fn cmd_check(api: &ResearchGraphApi, json: bool) -> i32 {
    let violations = match api.check_consistency() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        print_json(&violations);
    } else if violations.is_empty() {
        println!("No violations.");
    } else {
        for violation in &violations {
            println!("{}", violation);
        }
    }
    if violations.is_empty() {
        0
    } else {
        2
    }
}

fn cmd_stats(api: &ResearchGraphApi, json: bool) -> i32 {
    let counts = match api.stats() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if json {
        return print_json(&counts);
    }
    println!("nodes: {}", counts.nodes);
    println!("edges: {}", counts.edges);
    for (category, count) in &counts.per_category {
        println!("  {:<14} {:>7}", category, count);
    }
    0
}

fn cmd_reset(api: &ResearchGraphApi, yes: bool) -> i32 {
    if !yes {
        eprintln!("Error: reset deletes every node and edge; pass --yes to confirm");
        return 1;
    }
    match api.reset() {
        Ok(()) => {
            println!("Graph reset.");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Resolve a key argument or exit with an error message
fn key_or_exit(raw: &str) -> NodeKey {
    match parse_key(raw) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(db) = cli.db {
        config.database = Some(db);
    }
    init_logging(cli.verbose, config.log_level.as_deref());

    let api = match ResearchGraphApi::open(&config) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let json = cli.json;
    let code = match cli.command {
        Commands::Merge {
            name,
            category,
            value,
            source,
            properties,
            same_person_as,
            policy,
        } => {
            let mut fact = Fact::new(name, category, value, source);
            fact.properties = properties;
            for raw in &same_person_as {
                fact = fact.same_person_as(key_or_exit(raw));
            }
            cmd_merge(&api, fact, policy, json)
        }
        Commands::Import { path } => cmd_import(&api, &path, json),
        Commands::Link { a, b, source } => {
            cmd_link(&api, &key_or_exit(&a), &key_or_exit(&b), &source, json)
        }
        Commands::Show { key } => cmd_show(&api, &key_or_exit(&key), json),
        Commands::Neighbors { key, filter } => {
            cmd_neighbors(&api, &key_or_exit(&key), &filter.into(), json)
        }
        Commands::Enrich { key, source, filter } => {
            cmd_enrich(&api, &key_or_exit(&key), &source, &filter.into(), json)
        }
        Commands::Roots { key } => cmd_roots(&api, &key_or_exit(&key), json),
        Commands::Check => cmd_check(&api, json),
        Commands::Stats => cmd_stats(&api, json),
        Commands::Reset { yes } => cmd_reset(&api, yes),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_prefers_stored_keys_and_falls_back_to_identities() {
        let stored = NodeKey::compute("ORCID", "0000-0001-9510-0802").unwrap();
        assert_eq!(parse_key(stored.as_str()).unwrap(), stored);

        assert_eq!(
            parse_key("FULL_NAME=A|B").unwrap(),
            NodeKey::compute("FULL_NAME", "A|B").unwrap()
        );
        assert_eq!(parse_key("ORCID=0000-0001-9510-0802").unwrap(), stored);
        assert!(parse_key("orcid|not-a-uuid").is_err());
    }
}
