use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::{Color, Colorize};
use slidetags::error::ValidationError;
use slidetags::gist::{GistClient, GistOptions};
use slidetags::tags::{FlushReport, RemoteOutcome};
use slidetags::{
    backup, page, serve, Config, LocalCache, SlideCatalog, SlideFilter, TagColor, TagStore,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "slidetags")]
#[command(author, version, about = "Index page and tag store for a slide-deck collection")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Work from the local cache only; never contact GitHub
    #[arg(long, global = true)]
    offline: bool,

    /// Log progress (SLIDETAGS_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set up slidetags in the current directory
    Init,

    /// Write index.html for the slide catalog
    Build {
        /// Output directory (default: [site] out_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage tag definitions
    Tags {
        #[command(subcommand)]
        action: TagsAction,
    },

    /// Attach a tag to a slide
    Assign { slide: String, tag: String },

    /// Detach a tag from a slide
    Unassign { slide: String, tag: String },

    /// Attach the tag if missing, detach it otherwise
    Toggle { slide: String, tag: String },

    /// List slides, optionally filtered
    Slides {
        /// Case-insensitive text search
        #[arg(short, long, default_value = "")]
        query: String,

        /// Only slides carrying any of these tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Configure and inspect gist sync
    Gist {
        #[command(subcommand)]
        action: GistAction,
    },

    /// Merge gist and local tag data and write the result to both
    Sync,

    /// Write a backup of all tag data
    Export {
        /// Backup file (default: slidetags-backup-YYYY-MM-DD.json)
        file: Option<PathBuf>,
    },

    /// Restore tag data from a backup
    Import {
        file: PathBuf,

        /// Replace current data instead of merging into it
        #[arg(long)]
        replace: bool,
    },

    /// Serve the index page with live tag editing
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Print a shell completion script
    Completion { shell: Shell },
}

#[derive(Subcommand, Debug)]
enum TagsAction {
    /// List tags with their slide counts
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create a tag; the id is derived from the name
    Add { name: String },
    /// Delete a tag and remove it from every slide
    Remove {
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum GistAction {
    /// Save a GitHub token (and optionally an existing gist id)
    Configure {
        #[arg(long, env = "SLIDETAGS_GITHUB_TOKEN", hide_env_values = true)]
        token: String,
        #[arg(long)]
        gist_id: Option<String>,
    },
    /// Check the token and make sure the gist exists
    Test,
    /// Show what is configured
    Status,
    /// Forget the token and gist id
    Reset,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "slidetags=info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("SLIDETAGS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> CliResult {
    let offline = cli.offline;

    match cli.command {
        Command::Init => slidetags::init::init_project()?,

        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "slidetags", &mut io::stdout());
        }

        Command::Build { out } => {
            let config = Config::load();
            let catalog = SlideCatalog::load(&config.slides_path())?;
            let tags = open_tags(&config, offline)?;
            let out_dir = out.unwrap_or_else(|| config.out_dir());

            let path = page::generate(&out_dir, &config.site, &catalog, tags.store())?;
            println!(
                "{} {} ({} slides, {} tags)",
                "Wrote".green(),
                path.display(),
                catalog.len(),
                tags.store().tags.len()
            );
        }

        Command::Tags { action } => {
            let config = Config::load();
            let mut tags = open_tags(&config, offline)?;
            match action {
                TagsAction::List { json } => list_tags(&tags, json)?,
                TagsAction::Add { name } => {
                    let tag = tags.add_tag(&name)?;
                    println!(
                        "{} tag {} ({})",
                        "Added".green(),
                        tag.name.color(term_color(tag.color)).bold(),
                        tag.id
                    );
                    finish(&mut tags);
                }
                TagsAction::Remove { id, yes } => {
                    let tag = tags
                        .tag(&id)
                        .cloned()
                        .ok_or_else(|| ValidationError::UnknownTag(id.clone()))?;
                    let prompt = format!(
                        "Delete tag \"{}\"? It will be removed from all slides.",
                        tag.name
                    );
                    if !yes && !confirm(&prompt) {
                        println!("{}", "Cancelled".yellow());
                        return Ok(());
                    }
                    let slides = tags.slides_by_tag(&id).len();
                    tags.remove_tag(&id);
                    println!(
                        "{} tag {} (was on {} slides)",
                        "Removed".green(),
                        tag.name,
                        slides
                    );
                    finish(&mut tags);
                }
            }
        }

        Command::Assign { slide, tag } => {
            let mut tags = open_for_assignment(&slide, &tag, offline)?;
            if tags.assign_tag(&slide, &tag) {
                println!("{} {} → {}", "Assigned".green(), tag, slide);
            } else {
                println!("{} {} already has {}", "Skipping".yellow(), slide, tag);
            }
            finish(&mut tags);
        }

        Command::Unassign { slide, tag } => {
            let config = Config::load();
            let mut tags = open_tags(&config, offline)?;
            if tags.unassign_tag(&slide, &tag) {
                println!("{} {} from {}", "Unassigned".green(), tag, slide);
            } else {
                println!("{} {} does not have {}", "Skipping".yellow(), slide, tag);
            }
            finish(&mut tags);
        }

        Command::Toggle { slide, tag } => {
            let mut tags = open_for_assignment(&slide, &tag, offline)?;
            if tags.toggle_tag(&slide, &tag) {
                println!("{} {} → {}", "Assigned".green(), tag, slide);
            } else {
                println!("{} {} from {}", "Unassigned".green(), tag, slide);
            }
            finish(&mut tags);
        }

        Command::Slides { query, tags: tag_filter, json } => {
            let config = Config::load();
            let catalog = SlideCatalog::load(&config.slides_path())?;
            let tags = open_tags(&config, offline)?;
            let store = tags.store();

            let filter = SlideFilter::new().with_query(&query).with_tags(tag_filter);
            let result = filter.apply(&catalog.slides, store);

            if json {
                println!("{}", serde_json::to_string_pretty(&result.visible)?);
            } else {
                for slide in &result.visible {
                    let names: Vec<String> = store
                        .resolved_tags(&slide.name)
                        .iter()
                        .map(|t| t.name.color(term_color(t.color)).to_string())
                        .collect();
                    println!(
                        "{:<28} {:<40} {}",
                        slide.name.bold(),
                        truncate(&slide.title, 40),
                        names.join(", ")
                    );
                }
                eprintln!("\n{}", result.summary().dimmed());
            }
        }

        Command::Gist { action } => gist_command(action)?,

        Command::Sync => {
            let config = Config::load();
            let mut tags = TagStore::open(&config, offline)?;
            if !tags.remote_configured() {
                println!(
                    "{} no gist configured, writing local cache only",
                    "Note:".yellow()
                );
            }
            let (loaded, flushed) = tags.sync();
            println!(
                "{} {} tags, {} tagged slides (local: {}, gist: {})",
                "Merged".green(),
                tags.store().tags.len(),
                tags.store().assignments.len(),
                yes_no(loaded.local),
                yes_no(loaded.remote)
            );
            if let Some(report) = flushed {
                print_flush(&report);
            }
        }

        Command::Export { file } => {
            let config = Config::load();
            let tags = open_tags(&config, offline)?;
            let path = file.unwrap_or_else(|| PathBuf::from(backup::default_backup_name()));
            backup::export(tags.store(), &path)?;
            println!(
                "{} {} ({} tags)",
                "Exported".green(),
                path.display(),
                tags.store().tags.len()
            );
        }

        Command::Import { file, replace } => {
            let backup = backup::import(&file)?;
            let config = Config::load();
            let mut tags = open_tags(&config, offline)?;
            let count = backup.data.tags.len();
            if replace {
                tags.replace_store(backup.data);
            } else {
                tags.merge_store(&backup.data);
            }
            println!(
                "{} {} tags from {} ({})",
                "Imported".green(),
                count,
                file.display(),
                if replace { "replaced" } else { "merged" }
            );
            finish(&mut tags);
        }

        Command::Serve { port } => {
            let config = Config::load();
            let catalog = SlideCatalog::load(&config.slides_path())?;
            let tags = open_tags(&config, offline)?;
            let session = serve::Session {
                config,
                catalog,
                tags,
            };
            serve::start(port, session)?;
        }
    }

    Ok(())
}

/// Open the tag store and merge every available source into it
fn open_tags(config: &Config, offline: bool) -> Result<TagStore, slidetags::Error> {
    let mut tags = TagStore::open(config, offline)?;
    let report = tags.load();
    tracing::debug!(?report, "opened tag store");
    Ok(tags)
}

/// Both sides of an assignment must exist
fn open_for_assignment(
    slide: &str,
    tag: &str,
    offline: bool,
) -> Result<TagStore, slidetags::Error> {
    let config = Config::load();
    let catalog = SlideCatalog::load(&config.slides_path())?;
    if !catalog.contains(slide) {
        return Err(ValidationError::UnknownSlide(slide.to_string()).into());
    }
    let tags = open_tags(&config, offline)?;
    if tags.tag(tag).is_none() {
        return Err(ValidationError::UnknownTag(tag.to_string()).into());
    }
    Ok(tags)
}

/// End of a mutating command: write everything out now
fn finish(tags: &mut TagStore) {
    if let Some(report) = tags.flush_now() {
        print_flush(&report);
    }
}

fn print_flush(report: &FlushReport) {
    match &report.remote {
        RemoteOutcome::Synced => println!("   {} gist", "Synced".green()),
        RemoteOutcome::Skipped => {}
        RemoteOutcome::Failed(message) => {
            eprintln!(
                "{} saved locally, but gist sync failed: {}",
                "Warning:".yellow().bold(),
                message
            );
            eprintln!("   Run {} to retry", "slidetags sync".cyan());
        }
    }
}

fn list_tags(tags: &TagStore, json: bool) -> CliResult {
    let store = tags.store();
    if json {
        let list: Vec<_> = store.tags.values().collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if store.tags.is_empty() {
        println!("No tags yet. Add one with {}", "slidetags tags add <NAME>".cyan());
        return Ok(());
    }

    for tag in store.tags.values() {
        let count = tags.slides_by_tag(&tag.id).len();
        println!(
            "{:<24} {:<24} {:<8} {} slides",
            tag.id,
            tag.name.color(term_color(tag.color)).bold(),
            tag.color.as_str().dimmed(),
            count
        );
    }
    Ok(())
}

fn gist_command(action: GistAction) -> CliResult {
    let config = Config::load();
    let cache = LocalCache::new(config.local_dir());
    let mut client = GistClient::new(GistOptions::from(&config.sync), cache)?;

    match action {
        GistAction::Configure { token, gist_id } => {
            client.configure(&token, gist_id.as_deref());
            println!("{} gist credentials", "Saved".green());
            if client.test_connection() {
                let id = client.settings().gist_id.clone().unwrap_or_default();
                println!("{} connected to gist {}", "OK".green().bold(), id);
            } else {
                eprintln!(
                    "{} could not reach the gist; check the token's gist scope",
                    "Warning:".yellow().bold()
                );
            }
        }
        GistAction::Test => {
            if !client.is_configured() {
                return Err(slidetags::Error::NotConfigured.into());
            }
            if !client.test_connection() {
                return Err("connection test failed (run with -v for details)".into());
            }
            let id = client.settings().gist_id.clone().unwrap_or_default();
            println!("{} connected to gist {}", "OK".green().bold(), id);
        }
        GistAction::Status => {
            let status = client.status();
            println!("Token:   {}", yes_no(status.has_token));
            println!(
                "Gist id: {}",
                client.settings().gist_id.as_deref().unwrap_or("(none)")
            );
            println!(
                "Sync:    {}",
                if status.is_configured {
                    "enabled".green()
                } else {
                    "disabled".yellow()
                }
            );
        }
        GistAction::Reset => {
            client.reset();
            println!("{} gist credentials", "Cleared".green());
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    io::stderr().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

fn term_color(color: TagColor) -> Color {
    match color {
        TagColor::Blue => Color::Blue,
        TagColor::Green => Color::Green,
        TagColor::Red => Color::Red,
        TagColor::Yellow => Color::Yellow,
        TagColor::Purple => Color::Magenta,
        TagColor::Pink => Color::BrightMagenta,
        TagColor::Indigo => Color::BrightBlue,
        TagColor::Gray => Color::BrightBlack,
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}
