use std::process::ExitCode;

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use readlater_digest::models::SummaryTarget;
use readlater_digest::services::DigestRequest;
use readlater_digest::{App, AppError, Config, Result};

const USAGE: &str = "\
Usage: readlater-batch [COMMAND]

With no command, summarizes pending articles and builds today's digests.

Commands:
  --summarize [USER_ID]          Summarize unsummarized articles
  --digest USER_ID [YYYY-MM-DD]  Build one user's daily digest
  --add-user AUTH_ID NAME        Register a user (no-op if it exists)
  --save USER_ID URL [TITLE]     Save an article for a user
  --audio USER_ID                List stored digest audio for a user
  --help                         Show this message";

enum Command {
    RunBatch,
    Summarize(SummaryTarget),
    Digest(DigestRequest),
    AddUser { auth_id: String, name: String },
    Save { user_id: i64, url: String, title: Option<String> },
    Audio(i64),
    Help,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` when set and valid, INFO otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn run(args: &[String]) -> Result<()> {
    let command = parse_args(args)?;
    if let Command::Help = command {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let app = App::new(&config).await?;

    let result = execute(&app, command).await;
    app.close().await?;
    result
}

async fn execute(app: &App, command: Command) -> Result<()> {
    match command {
        Command::RunBatch => {
            let report = app.run_batch().await?;
            println!(
                "Summaries: {} processed, {} succeeded, {} failed ({:?})",
                report.summaries.processed_articles,
                report.summaries.successful_articles,
                report.summaries.failed_articles,
                report.summaries.elapsed
            );
            println!(
                "Digests: {} users, {} succeeded, {} partial, {} failed ({:?})",
                report.digests.eligible_users,
                report.digests.succeeded,
                report.digests.partial,
                report.digests.failed,
                report.digests.elapsed
            );
            for failure in &report.digests.failures {
                println!("  user {}: {}", failure.user_id, failure.error);
            }
        }

        Command::Summarize(target) => {
            let result = app.summarize(target).await?;
            println!(
                "Processed {} articles: {} succeeded, {} failed ({:?})",
                result.processed_articles,
                result.successful_articles,
                result.failed_articles,
                result.elapsed
            );
        }

        Command::Digest(request) => {
            let outcome = app.build_digest(request).await?;
            println!("Processed articles: {}", outcome.processed_articles);
            println!("Digest generated: {}", outcome.daily_summary_generated);
            println!(
                "Audio: {}",
                outcome.audio_locator.as_deref().unwrap_or("none")
            );
        }

        Command::AddUser { auth_id, name } => {
            let user = app.add_user(&auth_id, &name).await?;
            println!("User {} ({})", user.id, user.name);
        }

        Command::Save {
            user_id,
            url,
            title,
        } => {
            let article = app.save_article(user_id, &url, title.as_deref()).await?;
            println!("Saved article {}: {}", article.id, article.url);
        }

        Command::Audio(user_id) => {
            let files = app.list_audio(user_id).await?;
            if files.is_empty() {
                println!("No audio for user {}", user_id);
            }
            for file in files {
                println!("{}\t{} bytes\t{}", file.locator, file.size, file.last_modified);
            }
        }

        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(flag) = args.first() else {
        return Ok(Command::RunBatch);
    };

    let command = match flag.as_str() {
        "--help" | "-h" => Command::Help,
        "--summarize" => match args.get(1) {
            Some(id) => Command::Summarize(SummaryTarget::User(parse_id(id)?)),
            None => Command::Summarize(SummaryTarget::AllUsers),
        },
        "--digest" => {
            let user_id = parse_id(required(args, 1, "USER_ID")?)?;
            let mut request = DigestRequest::for_user(user_id);
            if let Some(raw) = args.get(2) {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| AppError::Validation(format!("invalid date: {}", raw)))?;
                request = request.on(date);
            }
            Command::Digest(request)
        }
        "--add-user" => Command::AddUser {
            auth_id: required(args, 1, "AUTH_ID")?.to_string(),
            name: required(args, 2, "NAME")?.to_string(),
        },
        "--save" => Command::Save {
            user_id: parse_id(required(args, 1, "USER_ID")?)?,
            url: required(args, 2, "URL")?.to_string(),
            title: args.get(3).cloned(),
        },
        "--audio" => Command::Audio(parse_id(required(args, 1, "USER_ID")?)?),
        other => {
            return Err(AppError::Validation(format!(
                "unknown argument: {}\n\n{}",
                other, USAGE
            )))
        }
    };
    Ok(command)
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| AppError::Validation(format!("missing {}\n\n{}", name, USAGE)))
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("not a valid id: {}", raw)))
}
