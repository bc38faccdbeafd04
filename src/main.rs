use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, BufReader};

use file_client::config::{parse_config, FileClientConfig, CONFIG_FILE};
use file_client::http::{ApiClient, ReqwestTransport, Session, SessionEvent};
use file_client::model::api::FileInfo;
use file_client::model::error::share_errors::ShareAccessError;
use file_client::model::share::CreateShareRequest;
use file_client::model::upload::UploadFile;
use file_client::model::view::{format_date, FileItem};
use file_client::service::chunk_upload::ChunkEvent;
use file_client::service::feedback::{AlwaysConfirm, Confirm, Feedback, LogFeedback, Opener};
use file_client::service::file_actions::{FileActions, UploadOutcome};
use file_client::service::file_api::FileApi;
use file_client::service::file_management::FileManagement;
use file_client::service::selection::{Modifiers, PointerButton, Selection};
use file_client::service::share_api::ShareApi;

#[derive(Parser)]
#[command(name = "file_client", version, about = "Command line client for the file server api")]
struct Cli {
    /// path to the config file
    #[arg(long, default_value = CONFIG_FILE)]
    config: String,
    /// overrides `server.url`
    #[arg(long)]
    server: Option<String>,
    /// overrides `auth.token`
    #[arg(long)]
    token: Option<String>,
    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// list a folder, the root if no id is given
    Ls {
        #[arg(default_value = "")]
        folder: String,
        /// only show names containing this
        #[arg(short, long)]
        search: Option<String>,
    },
    Mkdir {
        name: String,
        #[arg(short, long, default_value = "")]
        parent: String,
    },
    Rename {
        id: String,
        new_name: String,
        /// folder the file lives in
        #[arg(short, long, default_value = "")]
        parent: String,
    },
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short, long, default_value = "")]
        parent: String,
        /// don't ask before deleting
        #[arg(short, long)]
        yes: bool,
    },
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value = "")]
        parent: String,
        /// send each file in resumable chunks
        #[arg(long)]
        chunked: bool,
    },
    /// drop a chunked upload session on the server
    CancelUpload { upload_id: String },
    /// print a download link for a file
    Url {
        id: String,
        #[arg(short, long, default_value = "")]
        parent: String,
    },
    /// print download links for several files, pausing `selection.downloaddelay` between them
    Download {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short, long, default_value = "")]
        parent: String,
    },
    Share {
        #[command(subcommand)]
        command: ShareCommand,
    },
}

#[derive(Subcommand)]
enum ShareCommand {
    Create {
        /// id of the file to share
        file_key: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        expire_days: Option<u32>,
        #[arg(long)]
        max_downloads: Option<u64>,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    Rm { id: u64 },
    Logs {
        id: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// print the download link for a public share
    Open {
        share_id: String,
        #[arg(long)]
        password: Option<String>,
    },
}

/// messages go to stderr so stdout stays clean for listings and urls
struct ConsoleFeedback;

impl Feedback for ConsoleFeedback {
    fn success(&self, message: &str) {
        eprintln!("{message}");
    }

    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

struct StdoutOpener;

impl Opener for StdoutOpener {
    fn open(&self, url: &str) {
        println!("{url}");
    }
}

struct PromptConfirm;

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                log::error!("Failed to read an answer from stdin: {e}");
                false
            }
        }
    }
}

/// lets everything through, `log::set_max_level` does the filtering
fn setup_logger() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Trace)
        // reqwest and friends are far too chatty below warn
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn log_level(configured: LevelFilter, verbose: u8) -> LevelFilter {
    match verbose {
        0 => configured,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// everything the commands need, built once from the config
struct App {
    api: FileApi,
    shares: ShareApi,
    listing: FileManagement,
    actions: FileActions,
    selection: Selection,
}

impl App {
    fn new(config: &FileClientConfig) -> Result<Self, String> {
        let transport = ReqwestTransport::new(&config.server.url, config.server.timeout())
            .map_err(|e| format!("could not set up the http client: {e}"))?;
        let session = Arc::new(Session::new(config.auth.token.clone()));
        session.subscribe(|event| match event {
            SessionEvent::LoginRequired => {
                log::warn!("The server rejected the token, set a new one in auth.token")
            }
            SessionEvent::Banned => log::error!("This account has been banned"),
            SessionEvent::TokenChanged => {}
        });
        let client = Arc::new(ApiClient::new(&config.server.url, transport, session));
        let api = FileApi::new(client.clone());
        // piped or redirected output gets timestamped log lines instead
        let feedback: Arc<dyn Feedback> = if std::io::stderr().is_terminal() {
            Arc::new(ConsoleFeedback)
        } else {
            Arc::new(LogFeedback)
        };
        let actions = FileActions::new(
            api.clone(),
            feedback.clone(),
            Arc::new(StdoutOpener),
            config.upload.chunk_size,
        );
        Ok(Self {
            selection: Selection::new(feedback.clone(), config.selection.download_delay()),
            listing: FileManagement::new(api.clone(), feedback),
            shares: ShareApi::new(client),
            api,
            actions,
        })
    }

    /// opens `parent` and looks `ids` up in it
    async fn resolve(&mut self, parent: &str, ids: &[String]) -> Result<Vec<FileItem>, String> {
        self.enter(parent).await?;
        let items = self.listing.items();
        ids.iter()
            .map(|id| {
                items
                    .iter()
                    .find(|item| item.id == *id)
                    .cloned()
                    .ok_or_else(|| format!("no file with id {id} in that folder"))
            })
            .collect()
    }

    /// makes `parent` the current folder so the actions work inside it
    async fn enter(&mut self, parent: &str) -> Result<(), String> {
        if parent.is_empty() {
            return self.listing.navigate_to_root().await.map_err(|e| e.to_string());
        }
        let folder = FileItem::from(&FileInfo {
            id: parent.to_string(),
            name: parent.to_string(),
            is_folder: true,
            size: 0,
            mime_type: None,
            user_id: 0,
            parent_id: None,
            create_time: None,
            update_time: None,
            deleted_at: None,
        });
        self.listing
            .handle_folder_click(&folder)
            .await
            .map_err(|e| e.to_string())
    }

    async fn run(&mut self, command: Command) -> Result<(), String> {
        match command {
            Command::Ls { folder, search } => {
                self.enter(&folder).await?;
                if let Some(search) = search {
                    self.listing.set_search_query(search);
                }
                for item in self.listing.filtered_items() {
                    println!(
                        "{:>8}  {:<12}  {:>10}  {}  {}",
                        item.id,
                        item.category.to_string(),
                        item.size,
                        item.modified,
                        item.name
                    );
                }
                Ok(())
            }
            Command::Mkdir { name, parent } => {
                self.enter(&parent).await?;
                succeeded(self.actions.create_folder(&mut self.listing, &name).await)
            }
            Command::Rename {
                id,
                new_name,
                parent,
            } => {
                let file = self.single(&parent, id).await?;
                succeeded(
                    self.actions
                        .rename_file(&mut self.listing, &file, &new_name)
                        .await,
                )
            }
            Command::Rm { ids, parent, yes } => {
                let files = self.resolve(&parent, &ids).await?;
                let prompt = format!("Delete {} files? This cannot be undone.", files.len());
                let confirmed = if yes {
                    AlwaysConfirm.confirm(&prompt).await
                } else {
                    PromptConfirm.confirm(&prompt).await
                };
                if !confirmed {
                    return Ok(());
                }
                let summary = self.actions.delete_files(&mut self.listing, &files).await;
                if summary.failed > 0 {
                    Err(format!("{} files could not be deleted", summary.failed))
                } else {
                    Ok(())
                }
            }
            Command::Upload {
                files,
                parent,
                chunked,
            } => {
                self.enter(&parent).await?;
                if chunked {
                    self.upload_chunked(&files).await
                } else {
                    self.upload_whole(&files).await
                }
            }
            Command::CancelUpload { upload_id } => self
                .actions
                .chunk_uploader()
                .cancel(&upload_id)
                .await
                .map_err(|e| e.to_string()),
            Command::Url { id, parent } => {
                let file = self.single(&parent, id).await?;
                succeeded(self.actions.download_file(&file))
            }
            Command::Download { ids, parent } => {
                let files = self.resolve(&parent, &ids).await?;
                self.selection.cancel_selection();
                let ctrl = Modifiers {
                    ctrl: true,
                    ..Modifiers::NONE
                };
                for file in files.iter().filter(|file| !file.is_folder()) {
                    self.selection
                        .handle_row_click(&mut self.listing, file, PointerButton::Primary, ctrl)
                        .await;
                }
                let started = self.selection.batch_download(&self.listing, &self.actions).await;
                succeeded(started > 0)
            }
            Command::Share { command } => self.run_share(command).await,
        }
    }

    async fn single(&mut self, parent: &str, id: String) -> Result<FileItem, String> {
        self.resolve(parent, &[id])
            .await?
            .pop()
            .ok_or_else(|| "nothing found".to_string())
    }

    async fn upload_whole(&mut self, paths: &[PathBuf]) -> Result<(), String> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let file = UploadFile::from_path(path)
                .await
                .map_err(|e| format!("could not read {}: {e}", path.display()))?;
            files.push(file);
        }
        let report = self.actions.upload_files(&mut self.listing, &files).await;
        match report.outcome {
            UploadOutcome::AllFailed(_) | UploadOutcome::Mixed { .. } => {
                let failed: Vec<String> = report
                    .failed_files(&files)
                    .into_iter()
                    .map(|file| file.name)
                    .collect();
                Err(format!("failed: {}", failed.join(", ")))
            }
            UploadOutcome::AllSucceeded(_) | UploadOutcome::Nothing => Ok(()),
        }
    }

    async fn upload_chunked(&mut self, paths: &[PathBuf]) -> Result<(), String> {
        self.actions.chunk_uploader().subscribe(|event| {
            if let ChunkEvent::ChunkSent {
                received,
                total_chunks,
                ..
            } = event
            {
                eprint!("\r{received}/{total_chunks} chunks");
            }
            if let ChunkEvent::Completed { .. } = event {
                eprintln!();
            }
        });
        let mut result = Ok(());
        for path in paths {
            if let Err(e) = self.actions.upload_large_file(&mut self.listing, path).await {
                result = Err(format!("{}: {e}", path.display()));
            }
        }
        result
    }

    async fn run_share(&mut self, command: ShareCommand) -> Result<(), String> {
        match command {
            ShareCommand::Create {
                file_key,
                password,
                expire_days,
                max_downloads,
            } => {
                let share = self
                    .shares
                    .create_share(&CreateShareRequest {
                        file_key,
                        password,
                        expire_days,
                        max_download_count: max_downloads,
                    })
                    .await
                    .map_err(|e| e.to_string())?;
                println!("{}", share.share_id);
                Ok(())
            }
            ShareCommand::List { page, page_size } => {
                let shares = self
                    .shares
                    .list_shares(page, page_size)
                    .await
                    .map_err(|e| e.to_string())?;
                let now = chrono::Local::now().naive_local();
                for share in shares.list {
                    println!(
                        "{:>6}  {}  file {}  {} views  {} downloads{}",
                        share.id,
                        share.share_id,
                        share.file_key,
                        share.view_count,
                        share.download_count,
                        if share.is_active(now) { "" } else { "  (inactive)" }
                    );
                }
                eprintln!("{} shares total", shares.total);
                Ok(())
            }
            ShareCommand::Rm { id } => {
                self.shares.delete_share(id).await.map_err(|e| e.to_string())
            }
            ShareCommand::Logs {
                id,
                page,
                page_size,
            } => {
                let logs = self
                    .shares
                    .access_logs(id, page, page_size)
                    .await
                    .map_err(|e| e.to_string())?;
                for entry in logs.list {
                    println!(
                        "{}  {:?}  {}",
                        format_date(entry.create_time.as_ref()),
                        entry.action_type,
                        entry.ip
                    );
                }
                Ok(())
            }
            ShareCommand::Open { share_id, password } => {
                match self.shares.open_share(&share_id, password.as_deref()).await {
                    Ok(url) => {
                        println!("{url}");
                        Ok(())
                    }
                    Err(ShareAccessError::Expired) => Err("this share has expired".to_string()),
                    Err(ShareAccessError::PasswordRequired) => {
                        Err("this share needs a password, pass --password".to_string())
                    }
                    Err(ShareAccessError::WrongPassword) => Err("wrong password".to_string()),
                    Err(ShareAccessError::MissingToken) => {
                        Err("the server did not hand out a download token".to_string())
                    }
                    Err(ShareAccessError::Api(e)) => Err(e.to_string()),
                }
            }
        }
    }
}

fn succeeded(ok: bool) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err("the operation did not complete".to_string())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // up before the config is read so its warnings show
    if let Err(e) = setup_logger() {
        eprintln!("Failed to set up logging: {e}");
    }
    log::set_max_level(log_level(LevelFilter::Info, cli.verbose));
    let mut config = match parse_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to read {}: {e}", cli.config);
            return ExitCode::FAILURE;
        }
    };
    if let Some(server) = cli.server {
        config.server.url = server;
    }
    if let Some(token) = cli.token {
        config.auth.token = Some(token);
    }
    log::set_max_level(log_level(config.log.level_filter(), cli.verbose));
    let mut app = match App::new(&config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("Talking to {}", app.api.client().base_url());
    match app.run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
