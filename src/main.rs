use clap::{Parser, Subcommand};
use colored::Colorize;
use docstore::{
    Database, DatabaseConfig, DocumentSnapshot, Query, Reference, add_doc, collection, delete_doc, doc, get_doc,
    get_docs, parse_where, set_doc, update_doc, validate_collection_id, validate_document_id,
};
use eyre::{Context, Result};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docstore")]
#[command(about = "DocStore CLI - Local JSON document store with a Firestore-like API")]
#[command(version)]
struct Cli {
    /// Directory holding databases (default: platform data dir)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Database name
    #[arg(short, long, default_value = "default")]
    db: String,

    /// YAML config file with `root_path` and `name` (overrides --root/--db)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a document
    Get { collection: String, id: String },

    /// Create or overwrite a document
    Set { collection: String, id: String, json: String },

    /// Create a document with a generated id
    Add { collection: String, json: String },

    /// Merge fields into an existing document
    Update { collection: String, id: String, json: String },

    /// Delete a document
    Delete { collection: String, id: String },

    /// List documents, optionally filtered
    List {
        collection: String,

        /// Filter clause such as `age>=18`; repeat to AND clauses
        #[arg(short, long = "where")]
        filters: Vec<String>,
    },

    /// List collections
    Collections,
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DatabaseConfig::load(path)?,
        None => DatabaseConfig::new(cli.root.clone().unwrap_or_else(DatabaseConfig::default_root), &cli.db),
    };
    let db = Database::open(config)?;

    match cli.command {
        Commands::Get { collection: coll, id } => {
            let snap = get_doc(&doc(&open_collection(&db, &coll)?, checked_id(&id)?));
            if snap.exists() {
                print_snapshot(&snap)?;
            } else {
                println!("{} {}/{}", "Not found:".yellow(), coll, id);
            }
        }
        Commands::Set { collection: coll, id, json } => {
            let reference = doc(&open_collection(&db, &coll)?, checked_id(&id)?);
            set_doc(&reference, &parse_json(&json)?)?;
            println!("{} {}/{}", "Wrote".green(), coll, reference.id());
        }
        Commands::Add { collection: coll, json } => {
            let reference = add_doc(&open_collection(&db, &coll)?, &parse_json(&json)?)?;
            println!("{} {}/{}", "Added".green(), coll, reference.id());
        }
        Commands::Update { collection: coll, id, json } => {
            let reference = doc(&open_collection(&db, &coll)?, checked_id(&id)?);
            update_doc(&reference, &parse_json(&json)?)?;
            println!("{} {}/{}", "Updated".green(), coll, reference.id());
        }
        Commands::Delete { collection: coll, id } => {
            delete_doc(&doc(&open_collection(&db, &coll)?, checked_id(&id)?))?;
            println!("{} {}/{}", "Deleted".green(), coll, id);
        }
        Commands::List { collection: coll, filters } => {
            let mut query = Query::new(&open_collection(&db, &coll)?);
            for clause in &filters {
                query = query.filter(parse_where(clause)?);
            }

            let snapshots = get_docs(&query);
            for snap in &snapshots {
                print_snapshot(snap)?;
            }
            println!("{} {} document(s) from {}", "Listed".green(), snapshots.len(), query);
        }
        Commands::Collections => {
            for id in db.list_collections()? {
                println!("{}", id);
            }
        }
    }

    Ok(())
}

fn open_collection(db: &Database, id: &str) -> Result<docstore::CollectionReference> {
    validate_collection_id(id)?;
    Ok(collection(db, id))
}

fn checked_id(id: &str) -> Result<&str> {
    validate_document_id(id)?;
    Ok(id)
}

fn parse_json(input: &str) -> Result<Value> {
    serde_json::from_str(input).context("Document body must be valid JSON")
}

fn print_snapshot(snap: &DocumentSnapshot) -> Result<()> {
    let body = json!({
        "id": snap.id(),
        "exists": snap.exists(),
        "data": snap.data(),
        "meta": snap.metadata(),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
