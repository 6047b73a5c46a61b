use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings_from, DEFAULT_SETTINGS_FILE},
    AuthMode, ClientError, Credentials, DurableSessionStore, GameController, GameHandle,
};
use shared::domain::{Language, RiddleId, RoomId};
use tracing_subscriber::EnvFilter;

mod play;

#[derive(Parser, Debug)]
#[command(name = "riddle", about = "Terminal client for the riddle game service")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Overrides `api_base_url` from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    language: Option<Language>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Profile,
    Categories,
    Riddle {
        #[arg(long)]
        category: Option<String>,
    },
    Answer {
        riddle_id: String,
        answer: String,
    },
    Daily,
    DailyAnswer {
        answer: String,
    },
    Leaderboard,
    Rooms,
    CreateRoom {
        name: String,
        #[arg(long, default_value_t = 4)]
        max_players: u32,
    },
    JoinRoom {
        room_id: String,
    },
    Room {
        room_id: String,
    },
    Share {
        riddle_id: String,
    },
    Shared {
        riddle_id: String,
    },
    Achievements,
    ResetHistory,
    /// Interactive loop: answer riddles until `:quit`.
    Play {
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings_from(&cli.config)?;
    if let Some(server_url) = cli.server_url {
        settings.api_base_url = client_core::config::normalize_base_url(&server_url)?;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    if let Some(language) = cli.language {
        settings.language = language;
    }

    let store = DurableSessionStore::initialize(&settings.database_url).await?;
    let client = GameController::from_settings(&settings, store)?;
    let restored = client.restore_session().await?;
    tracing::debug!(restored, server = %settings.api_base_url, "cli: controller ready");

    if let Err(err) = run(&client, cli.command, settings.language).await {
        match err.downcast_ref::<ClientError>() {
            Some(client_err) => bail!(client_err.user_message("Request failed")),
            None => return Err(err),
        }
    }
    Ok(())
}

async fn run(client: &Arc<GameController>, command: Command, language: Language) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let username = client
                .authenticate(AuthMode::Login, Credentials::new(email, password))
                .await?;
            println!("logged in as {username}");
        }
        Command::Signup {
            username,
            email,
            password,
        } => {
            let username = client
                .authenticate(
                    AuthMode::Signup { username, language },
                    Credentials::new(email, password),
                )
                .await?;
            println!("account created for {username}");
        }
        Command::Logout => {
            client.logout().await;
            println!("logged out");
        }
        Command::Profile => {
            let profile = client.refresh_profile().await?;
            println!(
                "{} <{}> points={} rank=#{} streak={} accuracy={:.1}%",
                profile.username,
                profile.email,
                profile.points,
                profile.rank,
                profile.current_streak,
                profile.accuracy
            );
            println!(
                "solved={} correct={} seen={} daily={}",
                profile.total_solved,
                profile.correct_answers,
                profile.unique_riddles_seen,
                profile.daily_challenges_completed
            );
        }
        Command::Categories => {
            for category in client.load_categories().await? {
                println!("{:<16} {}", category.name, category.count);
            }
        }
        Command::Riddle { category } => {
            let riddle = client.load_riddle(language, category).await?;
            play::print_riddle(&riddle);
        }
        Command::Answer { riddle_id, answer } => {
            let feedback = client
                .submit_answer(&RiddleId::from(riddle_id), &answer)
                .await?;
            play::print_feedback(&feedback);
        }
        Command::Daily => {
            let daily = client.load_daily_challenge().await?;
            let date = daily
                .date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "today".into());
            println!(
                "daily challenge {date} participants={} completed={}",
                daily.participants, daily.completed
            );
            play::print_riddle(&daily.riddle);
        }
        Command::DailyAnswer { answer } => {
            let feedback = client.submit_daily_answer(&answer).await?;
            println!("{}", feedback.message);
            if let Some(answer) = feedback.revealed_answer {
                println!("answer: {answer}");
            }
        }
        Command::Leaderboard => {
            for entry in client.load_leaderboard().await? {
                println!(
                    "#{:<3} {:<20} {:>6} pts streak={} accuracy={:.1}%",
                    entry.rank, entry.username, entry.points, entry.streak, entry.accuracy
                );
            }
        }
        Command::Rooms => {
            let rooms = client.load_rooms().await?;
            if rooms.is_empty() {
                println!("no open rooms");
            }
            for room in rooms {
                println!(
                    "{} {:<20} host={} players={}/{}",
                    room.room_id, room.name, room.host, room.players, room.max_players
                );
            }
        }
        Command::CreateRoom { name, max_players } => {
            match client.create_room(&name, max_players).await? {
                Some(created) => println!("{} ({})", created.message, created.room_id),
                None => println!("room name is required"),
            }
        }
        Command::JoinRoom { room_id } => {
            println!("{}", client.join_room(&RoomId::from(room_id)).await?);
        }
        Command::Room { room_id } => {
            let room = client.fetch_room(&RoomId::from(room_id)).await?;
            println!("{} host={} status={:?}", room.name, room.host, room.status);
            for player in room.players {
                println!("  {:<20} {}", player.username, player.score);
            }
        }
        Command::Share { riddle_id } => {
            let shared = client.share_riddle(&RiddleId::from(riddle_id)).await?;
            println!("{}", shared.message);
            if let Some(url) = shared.share_url {
                println!("{url}");
            }
        }
        Command::Shared { riddle_id } => {
            let riddle = client
                .fetch_shared_riddle(&RiddleId::from(riddle_id))
                .await?;
            println!(
                "[{} / {}] {} (shared {} times)",
                riddle.category, riddle.difficulty, riddle.question, riddle.shares
            );
        }
        Command::Achievements => {
            let achievements = client.fetch_achievements().await?;
            let current = &achievements.current_rank;
            println!("{} {} ({} pts)", current.icon, current.title, current.points);
            if let Some(next) = &achievements.next_rank {
                println!(
                    "next: {} {} in {} pts ({:.0}%)",
                    next.icon,
                    next.title,
                    achievements.points_to_next,
                    achievements.progress_percent
                );
            }
            println!(
                "unlocked {}/{}",
                achievements.unlocked_achievements.len(),
                achievements.total_achievements
            );
        }
        Command::ResetHistory => {
            println!("{}", client.reset_history().await?);
        }
        Command::Play { category } => {
            play::run(client, language, category).await?;
        }
    }
    Ok(())
}
