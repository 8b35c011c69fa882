use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mangoview::bson::parse_optional_document;
use mangoview::connection::{
    CancellationToken, ConnectionManager, DocumentGateway, Encoding, ExtendedJsonMode,
    JsonExportOptions, JsonImportOptions, JsonTransferFormat, MongoGateway, ProgressCallback,
    QuerySpec, export_collection_to_file, import_collection_from_file,
};
use mangoview::state::{
    ConfigManager, PageSize, QueryResultModel, Settings, expand_filename_template,
};
use mangoview::views::ViewKind;
use mongodb::Client;

#[derive(Parser, Debug)]
#[command(name = "mangoview", version, about = "Browse, export and import MongoDB collections")]
struct Cli {
    /// Connection string; overrides the saved setting
    #[arg(long, env = "MANGOVIEW_URI", global = true)]
    uri: Option<String>,

    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Text encoding for export and import files (utf8, latin1)
    #[arg(long, global = true)]
    encoding: Option<Encoding>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List databases
    Databases,
    /// List collections of a database
    Collections { database: String },
    /// Show one page of a collection
    Browse(BrowseArgs),
    /// Stream a collection to a JSON file
    Export(ExportArgs),
    /// Load a JSON file into a collection
    Import(ImportArgs),
    /// Print the effective settings and where they are stored
    Config,
}

#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// Filter document as JSON
    #[arg(long)]
    filter: Option<String>,
    /// Projection document as JSON
    #[arg(long)]
    projection: Option<String>,
    /// Sort document as JSON
    #[arg(long)]
    sort: Option<String>,
}

impl QueryArgs {
    fn to_query(&self) -> Result<QuerySpec> {
        Ok(QuerySpec {
            filter: parse_arg("filter", self.filter.as_deref())?,
            projection: parse_arg("projection", self.projection.as_deref())?,
            sort: parse_arg("sort", self.sort.as_deref())?,
        })
    }
}

#[derive(Args, Debug)]
struct BrowseArgs {
    database: String,
    collection: String,
    #[command(flatten)]
    query: QueryArgs,
    /// 1-based page to show
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    page: i64,
    #[arg(long, conflicts_with = "unpaged", allow_negative_numbers = true)]
    page_size: Option<i64>,
    /// Show every match on one page
    #[arg(long)]
    unpaged: bool,
    #[arg(long, value_enum, default_value_t = ViewKind::List)]
    view: ViewKind,
}

#[derive(Args, Debug)]
struct ExportArgs {
    database: String,
    collection: String,
    /// Destination file; defaults to the filename template in the export folder
    path: Option<PathBuf>,
    #[command(flatten)]
    query: QueryArgs,
    /// Write a single JSON array instead of one document per line
    #[arg(long)]
    array: bool,
    /// Indent array output
    #[arg(long)]
    pretty: bool,
    #[arg(long)]
    gzip: bool,
    /// Canonical instead of relaxed Extended JSON
    #[arg(long)]
    canonical: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    database: String,
    collection: String,
    path: PathBuf,
    /// Drop the collection before inserting
    #[arg(long)]
    drop_first: bool,
    /// Input is a single JSON array
    #[arg(long)]
    array: bool,
    #[arg(long)]
    batch_size: Option<usize>,
}

fn parse_arg(label: &str, text: Option<&str>) -> Result<Option<mongodb::bson::Document>> {
    match text {
        Some(text) => parse_optional_document(text)
            .map_err(|err| anyhow::anyhow!("Invalid {label} JSON: {err}")),
        None => Ok(None),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,mongodb=warn"))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(mangoview::Error::Cancelled { processed }) =
                err.downcast_ref::<mangoview::Error>()
            {
                log::warn!("Cancelled after {processed} documents");
                return ExitCode::from(130);
            }
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigManager::for_settings_file(path)?,
        None => ConfigManager::new()?,
    };
    let mut settings = config.load_settings()?;
    if let Some(uri) = &cli.uri {
        settings.connection.uri = uri.clone();
    }
    if let Some(encoding) = cli.encoding {
        settings.transfer.encoding = encoding;
    }

    match cli.command {
        Command::Config => {
            println!("# {}", config.settings_path().display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Databases => {
            let session = Session::connect(&settings)?;
            for name in session.gateway("admin").list_database_names()? {
                println!("{name}");
            }
        }
        Command::Collections { database } => {
            let session = Session::connect(&settings)?;
            for name in session.gateway(&database).list_collection_names()? {
                println!("{name}");
            }
        }
        Command::Browse(args) => {
            let session = Session::connect(&settings)?;
            browse(Arc::new(session.gateway(&args.database)), &settings, args)?;
        }
        Command::Export(args) => {
            let session = Session::connect(&settings)?;
            let token = cancel_on_ctrl_c(&session.manager);
            export(&session.gateway(&args.database), &settings, args, token)?;
        }
        Command::Import(args) => {
            let session = Session::connect(&settings)?;
            let token = cancel_on_ctrl_c(&session.manager);
            import(&session.gateway(&args.database), &settings, args, token)?;
        }
    }
    Ok(())
}

/// A connected client plus the runtime that drives it.
struct Session {
    manager: Arc<ConnectionManager>,
    client: Client,
}

impl Session {
    fn connect(settings: &Settings) -> Result<Self> {
        let manager = Arc::new(ConnectionManager::new()?);
        let client = manager.connect(
            &settings.connection.uri,
            Duration::from_secs(settings.connection.connect_timeout_secs),
        )?;
        Ok(Self { manager, client })
    }

    fn gateway(&self, database: &str) -> MongoGateway {
        MongoGateway::new(self.manager.clone(), self.client.clone(), database)
    }
}

/// Cancel the returned token on the first Ctrl-C.
fn cancel_on_ctrl_c(manager: &ConnectionManager) -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    manager.runtime_handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current document");
            signal_token.cancel();
        }
    });
    token
}

fn progress_logger(verb: &'static str) -> ProgressCallback {
    Arc::new(move |count: u64| log::info!("{verb} {count} documents"))
}

fn browse(gateway: Arc<MongoGateway>, settings: &Settings, args: BrowseArgs) -> Result<()> {
    let page_size = if args.unpaged || (args.page_size.is_none() && settings.browse.unpaged) {
        PageSize::Unpaged
    } else {
        PageSize::limited(args.page_size.unwrap_or(settings.browse.default_page_size))?
    };

    let model = QueryResultModel::with_page_size(gateway, &args.collection, page_size);
    let query = args.query.to_query()?;
    model.set_query(query.filter, query.projection, query.sort);
    model.fetch_page(args.page)?;

    print!("{}", args.view.render(&model.snapshot()));
    Ok(())
}

fn export(
    gateway: &MongoGateway,
    settings: &Settings,
    args: ExportArgs,
    token: CancellationToken,
) -> Result<()> {
    let format = if args.array {
        JsonTransferFormat::JsonArray
    } else {
        settings.transfer.export_format
    };
    let path = match args.path {
        Some(path) => path,
        None => default_export_path(settings, &args.database, &args.collection, format, args.gzip),
    };

    let options = JsonExportOptions {
        format,
        json_mode: if args.canonical {
            ExtendedJsonMode::Canonical
        } else {
            ExtendedJsonMode::Relaxed
        },
        pretty_print: args.pretty,
        gzip: args.gzip,
        encoding: settings.transfer.encoding,
        progress: Some(progress_logger("Exported")),
        cancellation: Some(token),
    };

    let count = export_collection_to_file(
        gateway,
        &args.collection,
        args.query.to_query()?,
        &path,
        &options,
    )?;
    println!("Exported {count} documents to {}", path.display());
    Ok(())
}

fn default_export_path(
    settings: &Settings,
    database: &str,
    collection: &str,
    format: JsonTransferFormat,
    gzip: bool,
) -> PathBuf {
    let stem =
        expand_filename_template(&settings.transfer.export_filename_template, database, collection);
    let mut name = format!("{stem}.{}", format.extension());
    if gzip {
        name.push_str(".gz");
    }
    let folder = settings.transfer.default_export_folder.trim();
    if folder.is_empty() { PathBuf::from(name) } else { Path::new(folder).join(name) }
}

fn import(
    gateway: &MongoGateway,
    settings: &Settings,
    args: ImportArgs,
    token: CancellationToken,
) -> Result<()> {
    let options = JsonImportOptions {
        format: if args.array {
            JsonTransferFormat::JsonArray
        } else {
            JsonTransferFormat::JsonLines
        },
        drop_first: args.drop_first,
        batch_size: args.batch_size.unwrap_or(settings.transfer.batch_size),
        encoding: settings.transfer.encoding,
        progress: Some(progress_logger("Imported")),
        cancellation: Some(token),
    };

    let summary = import_collection_from_file(gateway, &args.collection, &args.path, &options)?;
    println!("Imported {} documents from {} lines", summary.inserted, summary.lines);
    Ok(())
}
