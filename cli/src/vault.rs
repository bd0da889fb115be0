use anyhow::Context as _;
use clap::CommandFactory;
use clap::Parser;
use gear_vault_gemini::GeminiClient;
use gear_vault_store::Category;
use gear_vault_store::backup;
use gear_vault_store::backup::RestoreMode;
use gear_vault_store::config::VaultConfig;
use gear_vault_store::enrich;
use gear_vault_store::enrich::Enricher;
use gear_vault_store::factory;
use gear_vault_store::factory::Backend;
use gear_vault_store::ids::Stamp;
use gear_vault_store::import::import_delimited;
use gear_vault_store::types::EquipmentRecord;
use gear_vault_store::types::RecordDraft;
use gear_vault_store::types::RecordPatch;
use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Personal audio equipment catalog.
#[derive(Debug, Parser)]
#[command(name = "gear-vault", version, about)]
pub struct VaultCli {
    /// Directory holding the catalog (overrides config and environment).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: VaultCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum VaultCommand {
    /// Add a record.
    Add {
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long)]
        model: String,
        /// Unrecognized labels are stored as Microphone.
        #[arg(long, default_value_t = Category::Microphone, value_parser = parse_category)]
        category: Category,
        #[arg(long, default_value_t = 5)]
        rating: u8,
        #[arg(long, default_value = "")]
        description: String,
        /// Image URL or path.
        #[arg(long)]
        image: Option<String>,
        /// Store or info page.
        #[arg(long)]
        url: Option<String>,
    },
    /// List records, newest first.
    List {
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
        /// Print the records as a JSON array.
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of a record. Pass an empty string to clear --image or --url.
    Edit {
        id: String,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove a record by id.
    Rm { id: String },
    /// Import `brand,model,category,shop,url` lines; the first line is a header.
    ImportCsv {
        /// Read from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Write a JSON backup of the whole catalog.
    Export {
        /// Directory for the backup file (default: current directory).
        #[arg(long, conflicts_with = "stdout")]
        out_dir: Option<PathBuf>,
        /// Print the backup instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },
    /// Restore a JSON backup, in front of the current records by default.
    Restore {
        file: PathBuf,
        /// Discard the current records instead of keeping them.
        #[arg(long)]
        replace: bool,
    },
    /// Look up images for records that have a store URL but no image.
    Enrich,
    /// Suggest store and image URLs for a piece of equipment.
    Lookup {
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long)]
        model: String,
    },
    /// Rewrite a record's description with the text model.
    Polish { id: String },
    /// Show counts by category.
    Stats,
    /// Copy the catalog between storage backends in the data directory.
    Transfer {
        #[arg(long)]
        from: Backend,
        #[arg(long)]
        to: Backend,
    },
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Execute a vault command.
pub async fn run(cli: VaultCli) -> anyhow::Result<()> {
    let mut config = VaultConfig::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.cmd {
        VaultCommand::Completion { shell } => {
            let mut cmd = VaultCli::command();
            clap_complete::generate(shell, &mut cmd, "gear-vault", &mut std::io::stdout());
        }
        VaultCommand::Transfer { from, to } => {
            let data_dir = config.data_dir();
            let src = factory::open_storage(&data_dir, from)?;
            let dst = factory::open_storage(&data_dir, to)?;
            let n = factory::transfer(src.as_ref(), dst.as_ref())?;
            println!("Transferred {n} slots");
        }
        cmd => {
            let store = factory::open_record_store(&config)?;
            match cmd {
                VaultCommand::Add {
                    brand,
                    model,
                    category,
                    rating,
                    description,
                    image,
                    url,
                } => {
                    let draft = RecordDraft {
                        brand,
                        model,
                        category,
                        rating,
                        description,
                        image_reference: image,
                        purchase_url: url,
                    };
                    let record = store.add(draft)?;
                    println!("Added {}", record.id);
                }
                VaultCommand::List { category, json } => {
                    let records: Vec<EquipmentRecord> = store
                        .list()?
                        .into_iter()
                        .filter(|r| category.is_none_or(|c| r.category == c))
                        .collect();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    } else {
                        for record in &records {
                            println!("{}", summary_line(record));
                        }
                    }
                }
                VaultCommand::Edit {
                    id,
                    brand,
                    model,
                    category,
                    rating,
                    description,
                    image,
                    url,
                } => {
                    let patch = RecordPatch {
                        brand,
                        model,
                        category,
                        rating,
                        description,
                        image_reference: image,
                        purchase_url: url,
                    };
                    if patch.is_empty() {
                        anyhow::bail!("nothing to change; pass at least one field flag");
                    }
                    let record = store.update(&id, patch)?;
                    println!("{}", summary_line(&record));
                }
                VaultCommand::Rm { id } => {
                    let removed = store.delete(&id)?;
                    println!("Removed {}", removed.display_name());
                }
                VaultCommand::ImportCsv { file } => {
                    let text = match file {
                        Some(path) => std::fs::read_to_string(&path)
                            .with_context(|| format!("read {}", path.display()))?,
                        None => {
                            let mut buf = String::new();
                            std::io::stdin().read_to_string(&mut buf)?;
                            buf
                        }
                    };
                    let outcome = import_delimited(&text, &Stamp::now());
                    let n = store.prepend(outcome.records)?;
                    if outcome.dropped > 0 {
                        println!("Imported {n} records ({} lines skipped)", outcome.dropped);
                    } else {
                        println!("Imported {n} records");
                    }
                }
                VaultCommand::Export { out_dir, stdout } => {
                    let records = store.list()?;
                    let doc = backup::encode(&records, &Stamp::now())?;
                    if stdout {
                        println!("{}", doc.contents);
                    } else {
                        let dir = match out_dir {
                            Some(dir) => dir,
                            None => std::env::current_dir()?,
                        };
                        std::fs::create_dir_all(&dir)?;
                        let path = dir.join(&doc.file_name);
                        std::fs::write(&path, &doc.contents)
                            .with_context(|| format!("write {}", path.display()))?;
                        println!("Exported {} records to {}", records.len(), path.display());
                    }
                }
                VaultCommand::Restore { file, replace } => {
                    let text = std::fs::read_to_string(&file)
                        .with_context(|| format!("read {}", file.display()))?;
                    let records = backup::decode(&text, &Stamp::now())
                        .with_context(|| format!("restore {}", file.display()))?;
                    let mode = if replace {
                        RestoreMode::Replace
                    } else {
                        RestoreMode::Append
                    };
                    let n = store.restore(records, mode)?;
                    println!("Restored {n} records");
                }
                VaultCommand::Enrich => {
                    let client = GeminiClient::from_env(&config.gemini)?;
                    let enricher = Enricher::new(Arc::new(store), client)
                        .with_delay(config.enrich_delay());
                    let cancel = CancellationToken::new();
                    let on_interrupt = cancel.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            tracing::warn!("interrupted; stopping after the current record");
                            on_interrupt.cancel();
                        }
                    });
                    let report = enricher.run_batch(&cancel).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                VaultCommand::Lookup { brand, model } => {
                    let client = GeminiClient::from_env(&config.gemini)?;
                    let suggestion = enrich::suggest(&client, &brand, &model).await?;
                    let show = |url: Option<String>| url.unwrap_or_else(|| "(none)".to_string());
                    println!("STORE: {}", show(suggestion.store_url));
                    println!("IMAGE: {}", show(suggestion.image_url));
                }
                VaultCommand::Polish { id } => {
                    let client = GeminiClient::from_env(&config.gemini)?;
                    let record = enrich::polish_description(&store, &client, &id).await?;
                    println!("{}", record.description);
                }
                VaultCommand::Stats => {
                    let stats = store.stats()?;
                    println!("{stats}");
                }
                VaultCommand::Completion { .. } | VaultCommand::Transfer { .. } => {}
            }
        }
    }
    Ok(())
}

/// Category flags accept any label; unknown ones fall back like stored
/// records do.
fn parse_category(label: &str) -> Result<Category, String> {
    let category = Category::normalize(label);
    if Category::lookup(label).is_none() {
        tracing::warn!(label, fallback = %category, "unrecognized category");
    }
    Ok(category)
}

fn summary_line(record: &EquipmentRecord) -> String {
    let mut line = format!(
        "{}\t{}\t{}\t{}/5",
        record.id,
        record.display_name(),
        record.category,
        record.rating
    );
    if record.image_reference.is_none() && record.purchase_url.is_some() {
        line.push_str("\t(no image)");
    }
    line
}
