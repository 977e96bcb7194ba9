use crate::{config::Config, error, info, spotify, success};

pub async fn auth() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    match spotify::auth::request_refresh_token(&config).await {
        Ok(token) => {
            success!("Authorization successful!");
            info!("Add the following line to your .env file to run backups unattended:");
            println!("SPOTIFY_API_REFRESH_TOKEN={}", token.refresh_token);
        }
        Err(e) => error!("Authorization failed. Err: {}", e),
    }
}
