use std::sync::Arc;

use anyhow::{bail, Result};
use client_core::{AnswerFeedback, ClientError, ClientEvent, GameController, GameHandle};
use shared::{domain::Language, protocol::Riddle};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};

const HELP: &str = "commands: :hint :skip :share :profile :quit (anything else is an answer)";

pub fn print_riddle(riddle: &Riddle) {
    println!();
    println!(
        "[{} / {}] {}",
        riddle.category, riddle.difficulty, riddle.question
    );
    if let Some(attempts) = riddle.attempts_left {
        println!("attempts left: {attempts}");
    }
    println!("id: {}", riddle.id);
}

pub fn print_feedback(feedback: &AnswerFeedback) {
    println!("{} ({:+} points)", feedback.message, feedback.points_change);
    if let Some(answer) = &feedback.revealed_answer {
        println!("the answer was: {answer}");
    }
    if let Some(attempts) = feedback.attempts_left.filter(|_| !feedback.correct) {
        println!("attempts left: {attempts}");
    }
}

/// Blocks until the controller's auto-advance publishes the next riddle. `None` when
/// that load failed.
async fn next_riddle(events: &mut broadcast::Receiver<ClientEvent>) -> Result<Option<Riddle>> {
    let mut scheduled = false;
    loop {
        match events.recv().await {
            Ok(ClientEvent::RiddleLoaded(riddle)) => return Ok(Some(riddle)),
            Ok(ClientEvent::AutoAdvanceScheduled { delay }) => {
                scheduled = true;
                println!("next riddle in {:.1}s...", delay.as_secs_f32());
            }
            Ok(ClientEvent::Error(message)) if scheduled => {
                println!("{message}");
                return Ok(None);
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => bail!("controller stopped"),
        }
    }
}

pub async fn run(
    client: &Arc<GameController>,
    language: Language,
    category: Option<String>,
) -> Result<()> {
    let mut riddle = client.load_riddle(language, category).await?;
    println!("{HELP}");
    print_riddle(&riddle);

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut hints_shown = 0;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => println!("{HELP}"),
            ":quit" | ":q" => break,
            ":hint" => match riddle.hints.get(hints_shown) {
                Some(hint) => {
                    hints_shown += 1;
                    println!("hint {hints_shown}: {hint}");
                }
                None => println!("no more hints"),
            },
            ":skip" => {
                let category = client.snapshot().await.selected_category;
                riddle = client.load_riddle(language, category).await?;
                hints_shown = 0;
                print_riddle(&riddle);
            }
            ":share" => match client.share_riddle(&riddle.id).await {
                Ok(shared) => println!(
                    "{} {}",
                    shared.message,
                    shared.share_url.unwrap_or_default()
                ),
                Err(err) => println!("{}", err.user_message("Failed to share riddle")),
            },
            ":profile" => match client.snapshot().await.profile {
                Some(profile) => println!(
                    "{} points={} rank=#{} streak={}",
                    profile.username, profile.points, profile.rank, profile.current_streak
                ),
                None => println!("profile not loaded"),
            },
            answer => {
                client.set_answer_draft(answer.to_string()).await;
                let mut events = client.subscribe_events();
                match client.submit_answer(&riddle.id, answer).await {
                    Ok(feedback) => {
                        print_feedback(&feedback);
                        if feedback.correct {
                            let next = match next_riddle(&mut events).await? {
                                Some(next) => next,
                                None => {
                                    let category = client.snapshot().await.selected_category;
                                    client.load_riddle(language, category).await?
                                }
                            };
                            riddle = next;
                            hints_shown = 0;
                            print_riddle(&riddle);
                        }
                    }
                    Err(err) if err.requires_reauth() => return Err(err.into()),
                    Err(ClientError::Validation(message)) => println!("{message}"),
                    Err(err) => println!("{}", err.user_message("Failed to check answer")),
                }
            }
        }
    }

    Ok(())
}
