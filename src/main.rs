use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use wp_sync::config;
use wp_sync::db;
use wp_sync::gravatar::GravatarClient;
use wp_sync::media::MediaService;
use wp_sync::remote::WpApiFactory;
use wp_sync::repository::PostRepository;
use wp_sync::widgets::WidgetCache;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage locally known blogs
    Blog {
        #[command(subcommand)]
        command: BlogCommand,
    },
    /// Sync one post or page from the remote API into local storage
    SyncPost {
        /// Local blog row id
        #[arg(long)]
        blog: i64,
        /// Remote post id
        #[arg(long)]
        post: i64,
    },
    /// Fetch the Gravatar profile for an email address
    Profile { email: String },
    /// Upload a local file as new media on a blog
    UploadMedia {
        #[arg(long)]
        blog: i64,
        file: PathBuf,
    },
    /// Manage the stats widget cache
    Widgets {
        #[command(subcommand)]
        command: WidgetsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum BlogCommand {
    /// Register a blog
    Add {
        #[arg(long)]
        site_id: i64,
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        api_base: String,
        #[arg(long)]
        api_token: String,
    },
    /// List visible blogs
    List,
}

#[derive(Debug, Subcommand)]
enum WidgetsCommand {
    /// Rebuild the widget site lists from the visible blogs
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/wp-sync.db", cfg.app.data_dir));
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let timeout = Duration::from_secs(cfg.http.timeout_secs);

    match args.command {
        Command::Blog { command } => match command {
            BlogCommand::Add {
                site_id,
                url,
                title,
                api_base,
                api_token,
            } => {
                let id = db::insert_blog(
                    &pool,
                    site_id,
                    &url,
                    title.as_deref(),
                    &api_base,
                    &api_token,
                )
                .await?;
                println!("added blog {} ({})", id, url);
            }
            BlogCommand::List => {
                for blog in db::list_visible_blogs(&pool).await? {
                    println!(
                        "{}\tsite {}\t{}\t{}",
                        blog.id,
                        blog.site_id,
                        blog.title.as_deref().unwrap_or("-"),
                        blog.url
                    );
                }
            }
        },
        Command::SyncPost { blog, post } => {
            let factory = Arc::new(WpApiFactory::new(&cfg.http.user_agent, timeout));
            let repository = PostRepository::new(pool.clone(), factory);
            let post_ref = repository.get_post(post, blog).await?;
            info!(?post_ref, "post synced");
            match post_ref.resolve(&pool).await? {
                Some(local) => println!(
                    "synced {} #{} -> local row {} ({})",
                    local.kind.as_str(),
                    local.remote_id,
                    local.id,
                    local.title.as_deref().unwrap_or("untitled")
                ),
                None => println!("synced row {} (since deleted)", post_ref.row_id),
            }
        }
        Command::Profile { email } => {
            let client = GravatarClient::new(&cfg.gravatar.base_url, &cfg.http.user_agent, timeout)?;
            let profile = client.fetch_profile(&email).await?;
            println!(
                "{}\t{}\t{}",
                profile.display_name, profile.preferred_username, profile.profile_url
            );
        }
        Command::UploadMedia { blog, file } => {
            let service = MediaService::new(pool.clone(), &cfg.http.user_agent, timeout);
            let media = service.upload(blog, &file).await?;
            println!(
                "uploaded media {} -> {}",
                media.id,
                media.url.as_deref().unwrap_or("(no url)")
            );
        }
        Command::Widgets { command } => match command {
            WidgetsCommand::Refresh => {
                let data_dir = PathBuf::from(&cfg.app.data_dir);
                WidgetCache::today(&data_dir).refresh_site_list(&pool).await?;
                WidgetCache::all_time(&data_dir).refresh_site_list(&pool).await?;
                println!("widget caches refreshed");
            }
        },
    }

    Ok(())
}
