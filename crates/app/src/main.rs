mod config;

use anyhow::Context;
use clap::Parser;
use pathway_core::model::CodePrefix;
use serde::Serialize;
use services::{AppServices, Clock, IssuerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use config::{Cli, Command};

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let prefix = CodePrefix::new(cli.certificate_prefix.as_str())
        .context("invalid certificate prefix")?;
    let clock = Clock::System;
    let services = AppServices::new_sqlite(
        &cli.database_url,
        clock,
        IssuerConfig {
            code_prefix: prefix,
        },
    )
    .await
    .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::SeedPath {
            title,
            description,
            chapter,
            lessons,
        } => {
            let curriculum = services.curriculum();
            let path = curriculum.create_path(title, description).await?;
            let chapter = curriculum.add_chapter(path.id, chapter, 0).await?;
            for (position, kind) in lessons.into_iter().enumerate() {
                let order = i32::try_from(position)?;
                let title = format!("{} {}", kind, position + 1);
                curriculum
                    .add_lesson(path.id, chapter.id, title, kind, order)
                    .await?;
            }
            emit(&curriculum.path_outline(path.id).await?)
        }
        Command::Outline { path } => emit(&services.curriculum().path_outline(path).await?),
        Command::Complete {
            user,
            lesson,
            file_url,
            drive_link,
        } => emit(
            &services
                .recorder()
                .complete_lesson(user, lesson, file_url, drive_link)
                .await?,
        ),
        Command::Fail { user, lesson } => emit(
            &services
                .cooldown()
                .record_failure(user, lesson, clock.now())
                .await?,
        ),
        Command::Cooldown { user, lesson } => emit(
            &services
                .cooldown()
                .check_cooldown(user, lesson, clock.now())
                .await?,
        ),
        Command::Progress { user, path } => emit(
            &services
                .aggregator()
                .compute_path_completion(user, path)
                .await?,
        ),
        Command::Statuses { user, path } => {
            emit(&services.aggregator().lesson_statuses(user, path).await?)
        }
        Command::LessonProgress { user, lesson } => {
            emit(&services.aggregator().lesson_progress(user, lesson).await?)
        }
        Command::Summary { user } => emit(&services.aggregator().user_summary(user).await?),
        Command::Issue { user, path } => emit(
            &services
                .issuer()
                .try_issue_certificate(user, path)
                .await?,
        ),
        Command::Approve { progress } => {
            emit(&services.review().approve_submission(progress).await?)
        }
        Command::Reject { progress, note } => {
            emit(&services.review().reject_submission(progress, note).await?)
        }
        Command::Submissions { limit } => {
            emit(&services.review().list_submissions(limit).await?)
        }
        Command::Certificates { user, limit } => match user {
            Some(user) => emit(&services.registry().user_certificates(user).await?),
            None => emit(&services.registry().all_certificates(limit).await?),
        },
        Command::Verify { code } => emit(&services.registry().verify(&code).await?),
        Command::Revoke { certificate } => {
            services.registry().revoke(certificate).await?;
            emit(&serde_json::json!({ "revoked": certificate }))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    tracing::debug!(database_url = %cli.database_url, "starting");

    run(cli).await
}
