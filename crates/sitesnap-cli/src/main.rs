//! SiteSnap CLI: upload site photos and manage sites and users from a terminal.
//!
//! Reads `SITESNAP_*` settings from the environment (or `.env`). Signs in with
//! SITESNAP_ACCESS_TOKEN, or SITESNAP_EMAIL and SITESNAP_PASSWORD.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sitesnap_cli::{asset_from_path, init_tracing, App};
use sitesnap_core::models::{NewSite, ProfileUpdate, Role, SiteStatus};
use sitesnap_core::{ErrorMetadata, SiteSnapConfig};
use sitesnap_services::{check_connection, UserQuery, UserSort};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sitesnap", about = "SiteSnap photo upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload photos to a site, one after another
    Upload {
        /// Site UUID
        #[arg(long)]
        site: Uuid,
        /// Photo files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Site operations
    Sites {
        #[command(subcommand)]
        sub: SiteCommands,
    },
    /// Photo gallery operations
    Photos {
        #[command(subcommand)]
        sub: PhotoCommands,
    },
    /// User administration
    Users {
        #[command(subcommand)]
        sub: UserCommands,
    },
    /// Show the signed-in user's profile
    Whoami,
    /// Check connectivity to the backend and the photo bucket
    Check,
}

#[derive(Subcommand)]
enum SiteCommands {
    /// List sites, newest first
    List {
        /// Filter by name, address, project code or status
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a site
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: Option<String>,
        /// active, completed or on_hold
        #[arg(long, default_value = "active")]
        status: SiteStatus,
        #[arg(long)]
        project_code: Option<String>,
    },
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// List a site's photos, newest first
    List {
        #[arg(long)]
        site: Uuid,
    },
    /// Delete a photo you uploaded (admins: any photo)
    Delete {
        /// Photo UUID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users (manager or admin)
    List {
        /// Match full name or username
        #[arg(long)]
        search: Option<String>,
        /// Only users with this role
        #[arg(long)]
        role: Option<Role>,
        /// name, username, role or created
        #[arg(long, default_value = "created")]
        sort: UserSort,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Set the role of one or more users (admin)
    SetRole {
        role: Role,
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Edit a user's profile (admin)
    Edit {
        id: Uuid,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = SiteSnapConfig::from_env()
        .context("Failed to load configuration. Set SITESNAP_BACKEND_URL and SITESNAP_ANON_KEY")?;
    let app = App::build(config).await?;

    if let Commands::Check = cli.command {
        // Checking works signed out; sign in only if credentials are present.
        if let Err(e) = app.sign_in_from_env().await {
            tracing::debug!(error = %e, "Connection check without a session");
        }
        let report = check_connection(&app.client, &app.config.photo_bucket).await?;
        return print_json(&report);
    }

    let user = app.sign_in_from_env().await?;

    match cli.command {
        Commands::Upload { site, files } => {
            let assets: Vec<_> = files.iter().map(|f| asset_from_path(f)).collect();
            let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();

            let mut on_progress = |done: usize, total: usize| {
                let name = names.get(done - 1).map(String::as_str).unwrap_or("");
                eprintln!("[{}/{}] {}", done, total, name);
            };
            let result = app
                .uploader
                .upload_batch(assets, site, user.id, Some(&mut on_progress))
                .await;

            eprintln!(
                "{} uploaded, {} failed",
                result.successes.len(),
                result.failures.len()
            );
            for failure in &result.failures {
                eprintln!(
                    "  {}: {} ({})",
                    failure.asset.uri,
                    failure.error.user_message(),
                    failure.error.error_code()
                );
            }
            print_json(&result)?;
        }
        Commands::Sites { sub } => match sub {
            SiteCommands::List { search } => {
                let sites = app.sites.search(search.as_deref().unwrap_or("")).await?;
                print_json(&sites)?;
            }
            SiteCommands::Add {
                name,
                address,
                status,
                project_code,
            } => {
                let site = app
                    .sites
                    .add_site(NewSite {
                        name,
                        address,
                        status,
                        project_code,
                    })
                    .await?;
                print_json(&site)?;
            }
        },
        Commands::Photos { sub } => match sub {
            PhotoCommands::List { site } => {
                let photos = app.gallery.list_photos(site).await?;
                print_json(&photos)?;
            }
            PhotoCommands::Delete { id } => {
                app.gallery.delete_photo(id).await?;
                print_json(
                    &serde_json::json!({ "success": true, "message": format!("Photo {} deleted", id) }),
                )?;
            }
        },
        Commands::Users { sub } => match sub {
            UserCommands::List {
                search,
                role,
                sort,
                desc,
            } => {
                let query = UserQuery {
                    search,
                    role,
                    sort,
                    descending: desc,
                };
                let users = app.users.list_users(&query).await?;
                print_json(&users)?;
            }
            UserCommands::SetRole { role, ids } => {
                let outcome = app.users.bulk_update_role(&ids, role).await?;
                print_json(&outcome)?;
            }
            UserCommands::Edit {
                id,
                username,
                full_name,
                role,
            } => {
                let profile = app
                    .users
                    .update_user(
                        id,
                        ProfileUpdate {
                            username,
                            full_name,
                            avatar_url: None,
                            role,
                        },
                    )
                    .await?;
                print_json(&profile)?;
            }
        },
        Commands::Whoami => {
            let profile = app.auth.ensure_profile(&user).await?;
            print_json(&profile)?;
        }
        Commands::Check => {}
    }

    Ok(())
}
