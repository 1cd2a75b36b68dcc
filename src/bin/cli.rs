use bakbak::{
    config::AppConfig,
    db,
    repositories::{SqliteActivityRepository, SqliteUserRepository},
    services::{
        user_service::{hash_secret, normalize_phone},
        ActivityService, AdminGate, UploadStore, UserService, Viewer,
    },
};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bakbak-cli")]
#[command(about = "CLI tool for managing BakBak Bot users and data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Activity inspection commands
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    /// Admin setup helpers
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Show one user
    Show {
        #[arg(short, long)]
        phone: String,
    },

    /// Grant admin rights
    Promote {
        #[arg(short, long)]
        phone: String,
    },

    /// Revoke admin rights
    Demote {
        #[arg(short, long)]
        phone: String,
    },

    /// Delete a user together with their activity and prompt history
    Delete {
        #[arg(short, long)]
        phone: String,

        /// Also remove the user's uploaded files from disk
        #[arg(long)]
        purge_files: bool,
    },
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// List activity, newest first
    List {
        /// Only this user's activity
        #[arg(short, long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Prompt for a passphrase and print its hash for ADMIN_PASSPHRASE_HASH
    HashPassphrase,
}

fn read_secret(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Hashing needs no database.
    if let Commands::Admin {
        command: AdminCommands::HashPassphrase,
    } = cli.command
    {
        let passphrase = read_secret("Admin passphrase")?;
        let confirm = read_secret("Confirm passphrase")?;
        if passphrase.is_empty() {
            fail("Passphrase must not be empty");
        }
        if passphrase != confirm {
            fail("Passphrases do not match");
        }
        match hash_secret(&passphrase) {
            Ok(hash) => {
                println!("ADMIN_PASSPHRASE_HASH='{}'", hash);
                return Ok(());
            }
            Err(err) => fail(format!("Failed to hash passphrase: {}", err)),
        }
    }

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let user_service = UserService::new(
        Arc::new(SqliteUserRepository::new(pool.clone())),
        AdminGate::disabled(),
    );
    let activity_service = ActivityService::new(Arc::new(SqliteActivityRepository::new(pool)));

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::List { limit, offset } => {
                let users = match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) => users,
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                };
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<16} {:<24} {:<4} {:<7} {:<6} {:<6} {:<20}",
                        "Phone", "Name", "Age", "Gender", "Role", "Acts", "Last login"
                    );
                    println!("{}", "-".repeat(89));
                    for user in users {
                        println!(
                            "{:<16} {:<24} {:<4} {:<7} {:<6} {:<6} {:<20}",
                            user.phone,
                            user.name,
                            user.age,
                            user.gender,
                            if user.is_admin { "Admin" } else { "User" },
                            user.activity_count,
                            user.last_login_at
                        );
                    }
                }
            }

            UserCommands::Show { phone } => {
                let phone = normalize_phone(&phone);
                match user_service.find_user(&phone).await {
                    Ok(Some(user)) => {
                        println!("  Phone: {}", user.phone);
                        println!("  Name: {}", user.name);
                        println!("  Age: {}", user.age);
                        println!("  Gender: {}", user.gender);
                        println!("  Role: {}", user.role_label());
                        println!("  Joined: {} UTC", user.created_at);
                        println!("  Last login: {} UTC", user.last_login_at);
                    }
                    Ok(None) => fail(format!("User '{}' not found", phone)),
                    Err(err) => fail(format!("Failed to find user: {}", err)),
                }
            }

            UserCommands::Promote { phone } => {
                let phone = normalize_phone(&phone);
                match user_service.set_admin(&phone, true).await {
                    Ok(()) => println!("✅ User '{}' is now an admin", phone),
                    Err(err) => fail(format!("Failed to promote '{}': {}", phone, err)),
                }
            }

            UserCommands::Demote { phone } => {
                let phone = normalize_phone(&phone);
                match user_service.set_admin(&phone, false).await {
                    Ok(()) => println!("✅ User '{}' is no longer an admin", phone),
                    Err(err) => fail(format!("Failed to demote '{}': {}", phone, err)),
                }
            }

            UserCommands::Delete { phone, purge_files } => {
                let phone = normalize_phone(&phone);

                // Collect file names before the cascade removes the rows.
                let files: Vec<String> = if purge_files {
                    let viewer = Viewer {
                        phone: phone.clone(),
                        is_admin: false,
                    };
                    match activity_service.list_for(&viewer).await {
                        Ok(rows) => rows.into_iter().filter_map(|a| a.file_name).collect(),
                        Err(err) => fail(format!("Failed to list activity: {}", err)),
                    }
                } else {
                    Vec::new()
                };

                if let Err(err) = user_service.delete_user(&phone).await {
                    fail(format!("Failed to delete '{}': {}", phone, err));
                }
                println!("✅ User '{}' deleted successfully!", phone);

                let store = UploadStore::new(config.upload_dir.clone(), config.max_upload_bytes);
                for name in files {
                    let Some(path) = store.resolve(&name) else {
                        continue;
                    };
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => println!("  removed {}", name),
                        Err(err) => eprintln!("  could not remove {}: {}", name, err),
                    }
                }
            }
        },

        Commands::Activity {
            command: ActivityCommands::List { phone },
        } => {
            let viewer = match phone {
                Some(phone) => Viewer {
                    phone: normalize_phone(&phone),
                    is_admin: false,
                },
                None => Viewer {
                    phone: String::new(),
                    is_admin: true,
                },
            };
            let rows = match activity_service.list_for(&viewer).await {
                Ok(rows) => rows,
                Err(err) => fail(format!("Failed to list activity: {}", err)),
            };
            if rows.is_empty() {
                println!("No data found.");
            }
            for row in rows {
                println!(
                    "#{} [{}] {} ({}) {}",
                    row.id, row.timestamp, row.user_name, row.phone, row.activity_type
                );
                if let Some(prompt) = row.prompt {
                    println!("    prompt: {}", prompt);
                }
                if let Some(response) = row.response_text {
                    println!("    response: {}", response);
                }
                if let Some(file) = row.file_name {
                    println!("    file: {}", file);
                }
            }
        }

        Commands::Admin { .. } => {}
    }

    Ok(())
}
