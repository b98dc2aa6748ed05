use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use concertina::hash::MemoryNavigator;
use concertina::instance::{mount_collection_file, MountOptions};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "concertina")]
#[command(author, version, about = "Collapsible content engine with previews")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write starter collection and config files into the current directory
    Init,

    /// Resolve a collection source and list the normalized items
    Items {
        /// Path to a JSON collection file
        source: PathBuf,

        #[command(flatten)]
        config: ConfigFlags,
    },

    /// Build an instance and print (or write) the rendered HTML page
    Build {
        /// Path to a JSON collection file
        source: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigFlags,
    },

    /// Serve a live preview over HTTP
    Serve {
        /// Path to a JSON collection file
        source: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        #[command(flatten)]
        config: ConfigFlags,
    },

    /// Interactive terminal preview (toggles, simulated navigation)
    Preview {
        /// Path to a JSON collection file
        source: PathBuf,

        #[command(flatten)]
        config: ConfigFlags,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: Shell,
    },
}

/// Instance-level options, applied as declarative attributes on the
/// instance element (above the global config file, per the layering rules).
#[derive(clap::Args, Debug, Default)]
struct ConfigFlags {
    /// Allow multiple items open at once
    #[arg(long)]
    multiple: bool,

    /// Items to open at build: false, "first", "all", a 1-based index, or an item id
    #[arg(long)]
    initial_open: Option<String>,

    /// Maximum item count ("false" for unlimited)
    #[arg(long)]
    limit: Option<String>,

    /// Icon style: plus, arrow, or a custom token
    #[arg(long)]
    icon_style: Option<String>,

    /// Icon placement: left or right
    #[arg(long)]
    icon_placement: Option<String>,

    /// Title alignment: left, center, or right
    #[arg(long)]
    title_alignment: Option<String>,

    /// Reflect the open item in the URL fragment
    #[arg(long)]
    url_sync: bool,

    /// Disable dividers
    #[arg(long)]
    no_dividers: bool,
}

impl ConfigFlags {
    fn as_attrs(&self) -> Vec<(String, String)> {
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut push = |name: &str, value: &str| {
            attrs.push((name.to_string(), value.to_string()));
        };
        if self.multiple {
            push("data-mode", "multiple");
        }
        if let Some(value) = &self.initial_open {
            push("data-initial-open", value);
        }
        if let Some(value) = &self.limit {
            push("data-limit", value);
        }
        if let Some(value) = &self.icon_style {
            push("data-icon-style", value);
        }
        if let Some(value) = &self.icon_placement {
            push("data-icon-placement", value);
        }
        if let Some(value) = &self.title_alignment {
            push("data-title-alignment", value);
        }
        if self.url_sync {
            push("data-url-sync", "true");
        }
        if self.no_dividers {
            push("data-dividers__enabled", "false");
        }
        attrs
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args.command) {
        eprintln!("{} {:#}", "Error:".red(), e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => concertina::init::init_project(),

        Command::Items { source, config } => {
            let (_doc, accordion) = mount_source(&source, &config)?;
            if accordion.items().is_empty() {
                println!("No items in {}", source.display());
                return Ok(());
            }
            println!("{:<5} {:<28} TITLE", "ORD", "ID");
            println!("{}", "-".repeat(70));
            for item in accordion.items() {
                let subtitle = item
                    .subtitle
                    .as_ref()
                    .map(|s| format!("  ({})", s))
                    .unwrap_or_default();
                println!(
                    "{:<5} {:<28} {}{}",
                    item.order,
                    item.id.cyan(),
                    item.title,
                    subtitle.white()
                );
            }
            Ok(())
        }

        Command::Build {
            source,
            output,
            config,
        } => {
            let (doc, accordion) = mount_source(&source, &config)?;
            let nav = MemoryNavigator::new();
            let page = concertina::serve::render_page(&doc, &accordion, &nav);
            match output {
                Some(path) => {
                    std::fs::write(&path, page)?;
                    eprintln!(
                        "{} {} items to {}",
                        "Rendered".green(),
                        accordion.items().len(),
                        path.display()
                    );
                }
                None => println!("{}", page),
            }
            Ok(())
        }

        Command::Serve {
            source,
            port,
            config,
        } => {
            let (doc, accordion) = mount_source(&source, &config)?;
            println!(
                "{} Starting preview at http://localhost:{}",
                "Concertina".cyan(),
                port
            );
            concertina::serve::start_preview_server(port, doc, accordion)?;
            Ok(())
        }

        Command::Preview { source, config } => {
            concertina::tui::run_preview(source, config.as_attrs())
        }

        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Args::command(),
                "concertina",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn mount_source(
    source: &Path,
    config: &ConfigFlags,
) -> anyhow::Result<(concertina::dom::Document, concertina::instance::Accordion)> {
    mount_collection_file(
        source,
        &config.as_attrs(),
        MountOptions {
            global_config: concertina::config::load_global_overlay(),
            ..MountOptions::default()
        },
    )
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose {
        "concertina=debug"
    } else {
        "concertina=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
