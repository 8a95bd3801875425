use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use duopage::panic_handler;
use duopage::pdf::{
    BindingState, PageProvider, ProviderEvent, ResolutionTier, ViewId, slot_count, slot_for_page,
};
use duopage::{DocumentFingerprint, ReaderSession, Settings, SettingsStore};

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Compose PDF pages into single-page or two-page spread images
#[derive(Parser, Debug)]
#[command(name = "duopage", version, about)]
struct Cli {
    /// Log verbosity written to duopage.log
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,

    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page count, slot count and fingerprint
    Info { file: PathBuf },

    /// Render slots to PNG files
    Render(RenderArgs),

    /// Change a persisted setting
    Set { key: String, value: String },

    /// Print the current settings
    Show,
}

#[derive(Args, Debug)]
struct RenderArgs {
    file: PathBuf,

    /// Slot to render (0-based)
    #[arg(long, conflicts_with_all = ["page", "all"])]
    slot: Option<usize>,

    /// Render the slot containing this 1-based page
    #[arg(long, conflicts_with = "all")]
    page: Option<usize>,

    /// Render every slot
    #[arg(long)]
    all: bool,

    /// Output directory
    #[arg(long, short, default_value = ".")]
    out: PathBuf,

    /// Two pages per slot
    #[arg(long, conflicts_with = "single")]
    spread: bool,

    /// One page per slot
    #[arg(long)]
    single: bool,

    /// Pair the cover page instead of showing it alone
    #[arg(long)]
    cover_paired: bool,

    /// Right-to-left reading order
    #[arg(long)]
    rtl: bool,

    #[arg(long, value_name = "TIER")]
    resolution: Option<ResolutionTier>,

    #[arg(long)]
    grayscale: bool,

    #[arg(long)]
    invert: bool,

    #[arg(long)]
    sepia: bool,

    #[arg(long)]
    sharpen: bool,
}

impl RenderArgs {
    fn apply_overrides(&self, settings: &mut Settings) {
        if self.spread {
            settings.one_page_mode = false;
        }
        if self.single {
            settings.one_page_mode = true;
        }
        if self.cover_paired {
            settings.cover_page_separate = false;
        }
        if self.rtl {
            settings.left_to_right = false;
        }
        if let Some(tier) = self.resolution {
            settings.resolution = tier;
        }
        settings.grayscale |= self.grayscale;
        settings.invert |= self.invert;
        settings.sepia |= self.sepia;
        settings.sharpen |= self.sharpen;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create("duopage.log").context("Failed to create log file")?,
    )?;
    panic_handler::initialize_panic_handler();
    info!("Starting duopage {}", env!("CARGO_PKG_VERSION"));

    let store = match &cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::default_location()?,
    };

    let result = match cli.command {
        Command::Info { file } => run_info(store, &file),
        Command::Render(args) => run_render(store, &args),
        Command::Set { key, value } => run_set(&store, &key, &value),
        Command::Show => run_show(&store),
    };

    if let Err(e) = &result {
        error!("Command failed: {e:?}");
    }
    result
}

fn open(session: &mut ReaderSession, file: &Path) -> Result<()> {
    let fingerprint = DocumentFingerprint::from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    #[cfg(feature = "pdf")]
    {
        session.open_document(duopage::pdf::MupdfOpener::new(file), &fingerprint)?;
        Ok(())
    }

    #[cfg(not(feature = "pdf"))]
    {
        let _ = (session, fingerprint);
        bail!("duopage was built without PDF support")
    }
}

fn run_info(store: SettingsStore, file: &Path) -> Result<()> {
    let mut session = ReaderSession::new(store)?;
    open(&mut session, file)?;

    let provider = session.provider().context("Document not open")?;
    let mode = provider.mode();
    println!("file:        {}", file.display());
    if let Some(title) = provider.title() {
        println!("title:       {title}");
    }
    println!("pages:       {}", provider.page_count());
    println!(
        "slots:       {} ({:?})",
        slot_count(mode, provider.page_count()),
        mode.layout
    );
    println!(
        "fingerprint: {}",
        session.settings().last_document.as_deref().unwrap_or("-")
    );
    if let Some(indicator) = session.page_indicator() {
        println!("position:    {indicator}");
    }

    session.close_document()
}

fn run_render(store: SettingsStore, args: &RenderArgs) -> Result<()> {
    let mut session = ReaderSession::new(store)?;
    open(&mut session, &args.file)?;
    session.update_settings(|s| args.apply_overrides(s))?;

    let provider = session.provider().context("Document not open")?;
    let page_count = provider.page_count();
    let slots: Vec<usize> = if args.all {
        (0..provider.slot_count()).collect()
    } else if let Some(page) = args.page {
        vec![slot_for_page(page, provider.mode(), page_count)]
    } else if let Some(slot) = args.slot {
        if slot >= provider.slot_count() {
            bail!(
                "slot {slot} out of range (document has {} slots)",
                provider.slot_count()
            );
        }
        vec![slot]
    } else {
        vec![session.current_slot()]
    };

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let stem = args
        .file
        .file_stem()
        .map_or_else(|| "document".into(), |s| s.to_string_lossy());
    let provider = session.provider_mut().context("Document not open")?;
    let mut failures = 0;
    for &slot in &slots {
        match render_slot(provider, slot)? {
            Some(indicator) => {
                let path = args.out.join(format!("{stem}-{slot:04}.png"));
                save_bound(provider, &path)?;
                println!("slot {slot} [{indicator}] -> {}", path.display());
            }
            None => failures += 1,
        }
        provider.recycle(ViewId(0));
    }

    if let [slot] = slots.as_slice() {
        session.set_current_slot(*slot);
    }
    session.close_document()?;

    if failures > 0 {
        bail!("{failures} of {} slots failed to render", slots.len());
    }
    Ok(())
}

/// Bind slot `slot` to the only view and wait for the outcome. Returns the
/// page indicator for a rendered slot, `None` for a failed one.
fn render_slot(provider: &mut PageProvider, slot: usize) -> Result<Option<String>> {
    let view = ViewId(0);
    provider.bind(view, slot)?;

    while matches!(provider.state(view), BindingState::Rendering { .. }) {
        let events = provider.poll_blocking(RENDER_TIMEOUT)?;
        if events.is_empty() {
            bail!("slot {slot} did not render within {RENDER_TIMEOUT:?}");
        }
        for event in events {
            if let ProviderEvent::Failed { slot, error, .. } = event {
                eprintln!("slot {slot} failed: {error}");
                return Ok(None);
            }
        }
    }

    Ok(Some(duopage::pdf::page_indicator(
        slot,
        provider.mode(),
        provider.page_count(),
    )))
}

fn save_bound(provider: &PageProvider, path: &Path) -> Result<()> {
    let image = provider.image(ViewId(0)).context("No image bound")?;
    image
        .save_png(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn run_set(store: &SettingsStore, key: &str, value: &str) -> Result<()> {
    let mut settings = store.load()?;
    settings.set_value(key, value)?;
    store.save(&settings)?;
    info!("Setting {key} = {value}");
    println!("{key} = {value}");
    Ok(())
}

fn run_show(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    print!("{}", serde_yaml::to_string(&settings)?);
    Ok(())
}
