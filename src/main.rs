use anyhow::{anyhow, Result};
use asset_gallery::{app::GalleryApp, model::SortMode, orchestrator::PageFilter};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;

#[derive(Parser)]
#[command(author, version, about = "Browse the remote asset catalog", long_about = None)]
struct Cli {
    /// Which records to show
    #[arg(long, value_enum, default_value = "all")]
    view: View,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    All,
    Favorites,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the catalog and print a page of cards
    Show {
        /// Page to print after loading
        #[arg(long, default_value = "1")]
        page: u32,
        /// Re-sort after loading (sheet or alphabetical)
        #[arg(long)]
        sort: Option<String>,
    },
    /// Add or remove a title from favorites
    Favorite {
        title: String,
    },
    /// List favorite titles
    Favorites,
    /// Persist the sort mode used for future loads
    Sort {
        mode: String,
    },
}

fn parse_sort(raw: &str) -> Result<SortMode> {
    SortMode::from_token(raw)
        .ok_or_else(|| anyhow!("unknown sort mode {raw:?}; expected sheet or alphabetical"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let filter = match cli.view {
        View::All => PageFilter::All,
        View::Favorites => PageFilter::Favorites,
    };
    let app = GalleryApp::new(filter)?;

    match cli.command.unwrap_or(Commands::Show {
        page: 1,
        sort: None,
    }) {
        Commands::Show { page, sort } => {
            let sort = sort.as_deref().map(parse_sort).transpose()?;
            app.show(page, sort)?;
        }
        Commands::Favorite { title } => {
            if app.toggle_favorite(&title)? {
                println!("Added {title:?} to favorites");
            } else {
                println!("Removed {title:?} from favorites");
            }
        }
        Commands::Favorites => {
            for title in app.favorites() {
                println!("{title}");
            }
        }
        Commands::Sort { mode } => {
            let mode = parse_sort(&mode)?;
            app.set_sort_mode(mode)?;
            println!("Sort mode set to {mode}");
        }
    }
    Ok(())
}
