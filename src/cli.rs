//! Command-line surface: the server plus text-mode upload, gallery and admin views.

use std::{
    collections::HashMap,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, bail};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use wedding_snaps::{
    Config,
    client::{HttpPhotoApi, LocalFile, PhotoApi, UploadEvent, UploadObserver, UploadSession},
    server,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Wedding photo and video sharing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ingestion API
    Serve(ServeArgs),
    /// Upload photos and videos
    Upload(UploadArgs),
    /// List everything uploaded, newest first
    List(ApiArgs),
    /// Delete one photo (admin)
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct ApiArgs {
    /// Base URL of the API
    #[arg(long, env = "SNAPS_API_URL", default_value = "http://localhost:3000")]
    pub api: String,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Admin token
    #[arg(long, env = "SNAPS_ADMIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Id of the photo to delete
    pub id: String,
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::info!(
        "Starting with metadata backend {:?} and storage backend {:?}",
        config.metadata_backend,
        config.storage_backend
    );
    server::run(config).await
}

pub async fn upload(args: UploadArgs) -> Result<()> {
    let api = HttpPhotoApi::new(args.api.api);
    let mut session = UploadSession::new();

    let mut picked = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match LocalFile::open(path).await {
            Ok(file) => picked.push(file),
            Err(e) => eprintln!("warning: skipping {}: {}", path.display(), e),
        }
    }

    for warning in session.select(picked)? {
        eprintln!("warning: {}", warning);
    }
    if session.pending().is_empty() {
        bail!("nothing to upload: pick at least one photo or video");
    }

    let mut observer = ConsoleObserver::new()?;
    let report = session.submit(&api, &mut observer).await?;

    if !report.succeeded() {
        bail!("no files were uploaded");
    }
    Ok(())
}

pub async fn list(args: ApiArgs) -> Result<()> {
    let api = HttpPhotoApi::new(args.api);
    let photos = api.list().await?;

    if photos.is_empty() {
        println!("No photos yet.");
        return Ok(());
    }

    for photo in photos {
        let when = Utc
            .timestamp_millis_opt(photo.created_at)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| photo.created_at.to_string());
        println!("{}  {:<5}  {}  {}", when, photo.media_type.as_str(), photo.id, photo.url);
    }
    Ok(())
}

pub async fn delete(args: DeleteArgs) -> Result<()> {
    let Some(token) = args.token else {
        bail!("an admin token is required (--token or SNAPS_ADMIN_TOKEN)");
    };

    if !args.yes {
        let stdin = io::stdin();
        let confirmed = confirm(
            &format!("Delete photo {}? This cannot be undone.", args.id),
            &mut stdin.lock(),
            &mut io::stdout(),
        )?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let api = HttpPhotoApi::new(args.api.api).with_admin_token(token);
    match api.delete(&args.id).await {
        Ok(response) if response.blob_deleted => println!("Deleted {}.", response.id),
        Ok(response) => println!(
            "Deleted {} from the gallery, but its file could not be removed from storage.",
            response.id
        ),
        Err(e) if e.is_not_found() => bail!("photo {} does not exist", args.id),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
fn confirm(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Renders upload events as one progress bar per file.
struct ConsoleObserver {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: HashMap<usize, ProgressBar>,
}

impl ConsoleObserver {
    fn new() -> Result<Self> {
        let style = ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}")?
            .progress_chars("=> ");
        Ok(Self {
            multi: MultiProgress::new(),
            style,
            bars: HashMap::new(),
        })
    }

    fn println(&self, line: &str) {
        if self.multi.println(line).is_err() {
            eprintln!("{}", line);
        }
    }
}

impl UploadObserver for ConsoleObserver {
    fn on_event(&mut self, event: UploadEvent<'_>) {
        match event {
            UploadEvent::Started { index, file } => {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(self.style.clone());
                bar.set_message(file.name.clone());
                self.bars.insert(index, bar);
            }
            UploadEvent::Progress { index, percent } => {
                if let Some(bar) = self.bars.get(&index) {
                    bar.set_position(u64::from(percent));
                }
            }
            UploadEvent::Uploaded { index, .. } => {
                if let Some(bar) = self.bars.get(&index) {
                    bar.finish();
                }
            }
            UploadEvent::Failed { index, file, error } => {
                if let Some(bar) = self.bars.get(&index) {
                    bar.abandon_with_message(format!("{} failed", file.name));
                }
                self.println(&format!("error: could not upload {}: {}", file.name, error));
            }
            UploadEvent::BatchCompleted { uploaded, failed } => {
                let mut line = format!("Thank you! {} file(s) added to the gallery.", uploaded);
                if failed > 0 {
                    line.push_str(&format!(" {} file(s) failed.", failed));
                }
                self.println(&line);
            }
            UploadEvent::Celebrate => self.println("  * . * . * congratulations to the couple * . * . *"),
            UploadEvent::NothingUploaded { failed } => {
                self.println(&format!("No files were uploaded ({} failed).", failed));
            }
        }
    }
}
