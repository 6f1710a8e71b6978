use std::sync::Arc;

use super::OrganizeArgs;
use crate::cancel::CancelFlag;
use crate::classifier::GeminiClassifier;
use crate::config::AppConfig;
use crate::credentials::ensure_gemini_api_key;
use crate::drive::auth::authorize;
use crate::drive::DriveClient;
use crate::error::AppError;
use crate::organizer::display::RULE;
use crate::organizer::{Reorganizer, SilentProgress, StageProgress, TerminalPrompter};
use crate::progress::CliProgress;

pub async fn run(config: &AppConfig, args: &OrganizeArgs, cancel: CancelFlag) -> Result<(), AppError> {
    let options = config.organize_options(args.resume);

    let (api_key, key_source) = ensure_gemini_api_key(config, &cancel).await?;
    tracing::debug!(source = ?key_source, "Gemini API key resolved");

    println!("📁 Connecting to Google Drive...");
    let tokens = authorize(&config.credentials_path, &config.token_path, false, &cancel)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;
    let drive = DriveClient::new(Arc::new(tokens));

    println!("🤖 Initializing AI classifier...");
    let classifier = GeminiClassifier::new(config.gemini_config(api_key))?;

    let prompter = TerminalPrompter::new(cancel.clone());
    // The dry-run lines would tear through a progress bar
    let bar = CliProgress::new();
    let progress: &dyn StageProgress = if options.dry_run { &SilentProgress } else { &bar };

    let summary = Reorganizer::new(&drive, &classifier, &prompter, options, cancel)
        .with_progress(progress)
        .run()
        .await?;

    println!("{}\n", RULE);
    println!("{}", summary);
    tracing::info!(spent_usd = classifier.spent(), "Estimated AI spend");
    Ok(())
}
