use anyhow::{Context, Result};
use capy_road::config::{load_settings, project_paths, save_settings_atomic, Paths};
use capy_road::model::Theme;
use capy_road::profile::{ShopItem, RANKING_LIMIT};
use capy_road::skins::SkinId;
use capy_road::storage::{JsonProfileStore, JsonRankingBoard, ProfileStore, RankingBoard};
use clap::{Parser, Subcommand};
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "capy-road")]
#[command(about = "Hop a capybara across endless roads in your terminal")]
struct Cli {
    /// Lane theme (saved for next time)
    #[arg(long, value_enum)]
    theme: Option<Theme>,

    /// Fixed seed for reproducible lane layouts (saved for next time)
    #[arg(long)]
    seed: Option<u64>,

    /// Forget a saved seed and go back to random layouts
    #[arg(long, conflicts_with = "seed")]
    no_seed: bool,

    /// Rename the player shown on the ranking board
    #[arg(long)]
    name: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Play (the default)
    Play,
    /// Show profile and the top of the ranking board
    Stats,
    /// Spend coins in the shop
    Buy {
        #[arg(value_enum)]
        item: ShopItem,
    },
    /// Wear an unlocked skin
    Equip {
        #[arg(value_enum)]
        skin: SkinId,
    },
    /// Redeem a secret code
    Redeem { code: String },
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = project_paths()?;
    init_logging(&paths.log_path)?;

    let mut settings = load_settings(&paths.settings_path);
    settings.apply_overrides(cli.theme, cli.seed, cli.no_seed);
    save_settings_atomic(&paths.settings_path, &settings)?;

    let mut store = JsonProfileStore::new(&paths.profile_path);
    if let Some(name) = cli.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let mut profile = store.load();
        profile.name = name.to_string();
        store.save(&profile)?;
        info!(name, "profile renamed");
    }

    match cli.command.unwrap_or(Cmd::Play) {
        Cmd::Play => capy_road::app::run(settings, &paths),
        Cmd::Stats => {
            print_stats(&store, &paths);
            Ok(())
        }
        Cmd::Buy { item } => {
            let mut profile = store.load();
            profile.purchase(item)?;
            store.save(&profile)?;
            info!(?item, coins = profile.coins, "purchase");
            println!("Bought {item:?} for {} coins. {} left.", item.price(), profile.coins);
            Ok(())
        }
        Cmd::Equip { skin } => {
            let mut profile = store.load();
            profile.equip(skin)?;
            store.save(&profile)?;
            println!("Now wearing {}.", skin.label());
            Ok(())
        }
        Cmd::Redeem { code } => {
            let mut profile = store.load();
            let skin = profile.redeem(&code)?;
            store.save(&profile)?;
            info!(?skin, "code redeemed");
            println!("Unlocked {}!", skin.label());
            Ok(())
        }
    }
}

fn print_stats(store: &JsonProfileStore, paths: &Paths) {
    let profile = store.load();
    println!("{} ({})", profile.name, profile.identity);
    println!("  best score  {}", profile.high_score);
    println!("  coins       {}", profile.coins);
    println!("  wearing     {}", profile.equipped.label());
    let skins: Vec<_> = profile.unlocked_skins.iter().map(|s| s.label()).collect();
    println!("  skins       {}", skins.join(", "));
    let caps: Vec<_> = profile
        .capabilities
        .iter()
        .map(|c| format!("{c:?}"))
        .collect();
    if !caps.is_empty() {
        println!("  abilities   {}", caps.join(", "));
    }
    if let Some(at) = profile.last_played {
        println!("  last played {}", at.format("%Y-%m-%d %H:%M UTC"));
    }

    let board = JsonRankingBoard::new(&paths.ranking_path);
    let top = board.top(3);
    println!();
    println!("Top {} of {RANKING_LIMIT}", top.len());
    for (i, e) in top.iter().enumerate() {
        println!("  {}. {:<16} {:>6}  {}", i + 1, e.name, e.score, e.skin.label());
    }
}
