use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use doc_model::{
    Annotation, DocumentId, PagePoint, Tool, ViewerPreferences, MAX_ZOOM_PERCENT,
    MIN_ZOOM_PERCENT,
};
use pdf_engine::{default_engine, LopdfEngine, OpenSource, PdfEngine};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{FileBackend, Storage};
use viewer_core::{NotePrompt, Notifier, ScriptedPrompt, Severity, Viewer};

const LOG_ENV: &str = "ANNOTATOR_LOG";

#[derive(Debug, Parser)]
#[command(name = "annotator")]
#[command(about = "Highlight and annotate PDF pages")]
pub struct Cli {
    /// Directory holding preferences and saved annotations.
    #[arg(long, global = true, env = "ANNOTATOR_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document and annotation metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Drag a highlight across a page and save it.
    Highlight {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Press point as `X,Y` in overlay pixels.
        #[arg(long)]
        from: PagePoint,
        /// Release point as `X,Y` in overlay pixels.
        #[arg(long)]
        to: PagePoint,
        /// Zoom percent the coordinates refer to.
        #[arg(long)]
        zoom: Option<u16>,
    },
    /// Pin a text note to a page and save it.
    Note {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        at: PagePoint,
        #[arg(long)]
        text: String,
        #[arg(long)]
        zoom: Option<u16>,
    },
    /// Print saved annotations as JSON.
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only annotations on this page.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Render a page with its annotation overlay to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        zoom: Option<u16>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete every saved annotation of a document.
    Clear {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show or change viewer preferences.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Zoom percent documents open at.
    SetZoom { percent: u16 },
    /// Tool active when a document opens.
    SetTool {
        #[arg(value_enum)]
        tool: ToolArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToolArg {
    None,
    Highlight,
    Note,
}

impl From<ToolArg> for Tool {
    fn from(value: ToolArg) -> Self {
        match value {
            ToolArg::None => Tool::None,
            ToolArg::Highlight => Tool::Highlight,
            ToolArg::Note => Tool::Note,
        }
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    document_id: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
    annotation_count: usize,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

/// Prints viewer notifications to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, severity: Severity, message: &str) {
        eprintln!("[{severity}] {message}");
    }
}

type CliViewer = Viewer<LopdfEngine, FileBackend>;

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let storage = match cli.data_dir {
        Some(dir) => Storage::with_root(dir),
        None => Storage::from_default_project().context("failed to resolve data directory")?,
    };
    log::debug!("using data directory {}", storage.root().display());

    match cli.command {
        Commands::Info { file } => run_info(&storage, &file),
        Commands::Highlight { file, page, from, to, zoom } => {
            run_highlight(&storage, &file, page, from, to, zoom)
        }
        Commands::Note { file, page, at, text, zoom } => {
            run_note(&storage, &file, page, at, text, zoom)
        }
        Commands::List { file, page } => run_list(&storage, &file, page),
        Commands::Render { file, page, zoom, output } => {
            run_render(&storage, &file, page, zoom, output.as_deref())
        }
        Commands::Clear { file } => run_clear(&storage, &file),
        Commands::Config { action } => run_config(&storage, action),
        Commands::Version => Ok(()),
    }
}

fn init_logging(verbose: u8) {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        });

    // A logger may already be installed when `run` is called more than once.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Never);
}

fn run_info(storage: &Storage, file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let document_id = document_id_for(file)?;
    let annotation_count = storage.annotation_store().load(&document_id).len();

    let payload = InfoOutput {
        path: file.display().to_string(),
        document_id: document_id.to_string(),
        page_count,
        first_page_size_pt,
        annotation_count,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_highlight(
    storage: &Storage,
    file: &Path,
    page: u32,
    from: PagePoint,
    to: PagePoint,
    zoom: Option<u16>,
) -> Result<()> {
    let mut viewer = open_viewer(storage, file, page, zoom, ScriptedPrompt::declining())?;
    viewer.set_tool(Tool::Highlight)?;

    viewer.pointer_down(from);
    viewer.pointer_move(to);
    let Some(annotation) = viewer.pointer_up(to) else {
        anyhow::bail!("a highlight needs distinct --from and --to points");
    };

    viewer.save().context("failed to save annotations")?;
    print_json(&annotation)
}

fn run_note(
    storage: &Storage,
    file: &Path,
    page: u32,
    at: PagePoint,
    text: String,
    zoom: Option<u16>,
) -> Result<()> {
    let prompt = ScriptedPrompt::new([Some(text)]);
    let mut viewer = open_viewer(storage, file, page, zoom, prompt)?;
    viewer.set_tool(Tool::Note)?;

    viewer.pointer_down(at);
    let Some(annotation) = viewer.pointer_up(at) else {
        anyhow::bail!("note text must not be empty");
    };

    viewer.save().context("failed to save annotations")?;
    print_json(&annotation)
}

fn run_list(storage: &Storage, file: &Path, page: Option<u32>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let document_id = document_id_for(file)?;
    let annotations: Vec<Annotation> = storage
        .annotation_store()
        .load(&document_id)
        .into_iter()
        .filter(|annotation| page.map_or(true, |page| annotation.page_index() == page))
        .collect();

    print_json(&annotations)
}

fn run_render(
    storage: &Storage,
    file: &Path,
    page: u32,
    zoom: Option<u16>,
    output: Option<&Path>,
) -> Result<()> {
    let viewer = open_viewer(storage, file, page, zoom, ScriptedPrompt::declining())?;
    let image = viewer.composite().context("viewer has no rendered page")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_clear(storage: &Storage, file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let document_id = document_id_for(file)?;
    storage
        .annotation_store()
        .clear(&document_id)
        .with_context(|| format!("failed to clear annotations for {document_id}"))?;

    println!("cleared:{document_id}");
    Ok(())
}

fn run_config(storage: &Storage, action: ConfigAction) -> Result<()> {
    let mut preferences = storage.load_preferences().context("failed to read preferences")?;

    match action {
        ConfigAction::Show => return print_json(&preferences),
        ConfigAction::SetZoom { percent } => {
            if !(MIN_ZOOM_PERCENT..=MAX_ZOOM_PERCENT).contains(&percent) {
                anyhow::bail!(
                    "zoom must be between {MIN_ZOOM_PERCENT} and {MAX_ZOOM_PERCENT} percent"
                );
            }
            preferences.initial_zoom_percent = percent;
        }
        ConfigAction::SetTool { tool } => preferences.default_tool = tool.into(),
    }

    storage.save_preferences(&preferences).context("failed to write preferences")?;
    print_json(&preferences)
}

/// Loads `file` into a viewer positioned on `page` (1-based).
fn open_viewer(
    storage: &Storage,
    file: &Path,
    page: u32,
    zoom: Option<u16>,
    prompt: impl NotePrompt + 'static,
) -> Result<CliViewer> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut preferences: ViewerPreferences =
        storage.load_preferences().context("failed to read preferences")?;
    if let Some(zoom) = zoom {
        preferences.initial_zoom_percent = zoom;
    }

    let mut viewer = Viewer::new(default_engine(), storage.annotation_store())
        .with_notifier(StderrNotifier)
        .with_prompt(prompt)
        .with_preferences(preferences);

    viewer.load(file, document_id_for(file)?).context("failed to open PDF")?;

    let page_count = viewer.state().map_or(0, |state| state.page_count);
    if page > page_count {
        anyhow::bail!("page {page} out of range (page_count={page_count})");
    }
    viewer.go_to_page(page)?;

    Ok(viewer)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

/// Keys annotations by the canonical path, so relative and absolute spellings
/// of one file share a set.
fn document_id_for(file: &Path) -> Result<DocumentId> {
    let canonical = fs::canonicalize(file)
        .with_context(|| format!("failed to resolve {}", file.display()))?;
    Ok(DocumentId::from_path(&canonical))
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("render");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_render_output_sits_next_to_input() {
        let output = default_render_output(Path::new("/tmp/docs/paper.pdf"), 3);
        assert_eq!(output, PathBuf::from("/tmp/docs/paper-page-3.png"));
    }

    #[test]
    fn points_parse_from_command_line() {
        let cli = Cli::try_parse_from([
            "annotator",
            "highlight",
            "paper.pdf",
            "--from",
            "10,10",
            "--to",
            "50,10",
        ])
        .expect("arguments should parse");

        let Commands::Highlight { from, to, page, .. } = cli.command else {
            panic!("expected highlight command");
        };
        assert_eq!(page, 1);
        assert_eq!(from, PagePoint::new(10.0, 10.0));
        assert_eq!(to, PagePoint::new(50.0, 10.0));
    }

    #[test]
    fn malformed_point_is_rejected() {
        let result = Cli::try_parse_from(["annotator", "note", "paper.pdf", "--at", "10", "--text", "x"]);
        assert!(result.is_err());
    }
}
