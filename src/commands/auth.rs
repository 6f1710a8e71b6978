use crate::cancel::CancelFlag;
use crate::config::AppConfig;
use crate::drive::auth::authorize;
use crate::error::AppError;

/// Run the consent flow even when a token is already stored
pub async fn run(config: &AppConfig, cancel: CancelFlag) -> Result<(), AppError> {
    println!("🔐 Starting Google Drive authorization...");
    println!("   Using credentials: {}", config.credentials_path.display());
    println!("   Token will be saved to: {}\n", config.token_path.display());

    authorize(&config.credentials_path, &config.token_path, true, &cancel)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;

    println!("\n✅ Authorization complete!");
    println!("   You can now run: drive-organizer organize");
    Ok(())
}
