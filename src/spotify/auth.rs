use chrono::Utc;
use reqwest::{Client, Response, Url};
use serde_json::Value;

use crate::{
    config::Config,
    info,
    server::{CALLBACK_ADDR, CallbackListener, CallbackMode},
    spotify::ApiError,
    types::{AuthorizationEvent, Credential, PkceToken, Token},
    utils, warning,
};

pub fn implicit_redirect_uri() -> String {
    format!("http://{}/redirect", CALLBACK_ADDR)
}

pub fn code_redirect_uri() -> String {
    format!("http://{}/callback", CALLBACK_ADDR)
}

/// Picks the credential strategy for this run.
///
/// A configured refresh token always wins, which lets the backup run
/// unattended. Without one the user is sent through the browser login.
pub async fn obtain_credential(config: &Config) -> Result<Credential, ApiError> {
    match (&config.refresh_token, &config.client_secret) {
        (Some(refresh_token), Some(client_secret)) => {
            info!("Exchanging refresh token...");
            from_refresh_token(
                &config.token_url,
                &config.client_id,
                client_secret,
                refresh_token,
            )
            .await
        }
        (Some(_), None) => Err(ApiError::CredentialExchangeFailed(
            "a refresh token requires SPOTIFY_API_AUTH_CLIENT_SECRET".to_string(),
        )),
        (None, _) => authorize(config).await,
    }
}

/// Builds the URL the user has to open to grant access.
pub fn authorization_url(auth_url: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
    let mut url = Url::parse(auth_url).map_err(|e| ApiError::InvalidUrl {
        url: auth_url.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

/// Interactive login using the implicit grant.
///
/// Binds the local callback listener, opens the authorization page in the
/// default browser and blocks until the listener captured the access token
/// or `config.auth_timeout` elapsed.
///
/// # Errors
///
/// [`ApiError::AuthorizationFailed`] when the listener cannot bind its fixed
/// port, the user denies access, or no token arrives in time.
pub async fn authorize(config: &Config) -> Result<Credential, ApiError> {
    let state = utils::generate_state();
    let redirect_uri = implicit_redirect_uri();
    let url = authorization_url(
        &config.auth_url,
        &[
            ("response_type", "token"),
            ("client_id", config.client_id.as_str()),
            ("scope", config.scope.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("state", state.as_str()),
        ],
    )?;

    // bind before the browser can possibly hit the redirect URI
    let listener = CallbackListener::bind(CallbackMode::Implicit, Some(state))
        .await
        .map_err(|e| {
            ApiError::AuthorizationFailed(format!("cannot listen on {}: {}", CALLBACK_ADDR, e))
        })?;

    open_in_browser(&url);

    match listener.wait(config.auth_timeout).await? {
        AuthorizationEvent::AccessToken(token) => Ok(Credential::new(token)),
        AuthorizationEvent::Code(_) => Err(ApiError::AuthorizationFailed(
            "expected an access token but received an authorization code".to_string(),
        )),
    }
}

/// Exchanges a stored refresh token for an access token.
///
/// Sends the client credentials via HTTP Basic auth. The call is made exactly
/// once: a rejected exchange points at a configuration problem, which waiting
/// will not fix.
///
/// # Errors
///
/// [`ApiError::CredentialExchangeFailed`] on transport errors, non-2xx
/// responses, or a response without `access_token`.
pub async fn from_refresh_token(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<Credential, ApiError> {
    let response = Client::new()
        .post(token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .map_err(|e| ApiError::CredentialExchangeFailed(e.to_string()))?;

    let json = read_token_response(response).await?;
    let access_token = required_str(&json, "access_token")?;

    Ok(Credential::new(access_token))
}

/// One-time authorization code flow (with PKCE) that yields a refresh token.
///
/// The refresh token is meant to be stored by the operator in
/// `SPOTIFY_API_REFRESH_TOKEN`; it is not written anywhere by this function.
pub async fn request_refresh_token(config: &Config) -> Result<Token, ApiError> {
    let client_secret = config.client_secret.as_deref().ok_or_else(|| {
        ApiError::CredentialExchangeFailed(
            "SPOTIFY_API_AUTH_CLIENT_SECRET must be set".to_string(),
        )
    })?;

    let pkce = PkceToken {
        code_verifier: utils::generate_code_verifier(),
        state: utils::generate_state(),
    };
    let code_challenge = utils::generate_code_challenge(&pkce.code_verifier);
    let redirect_uri = code_redirect_uri();

    let url = authorization_url(
        &config.auth_url,
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("scope", config.scope.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("state", pkce.state.as_str()),
            ("code_challenge", code_challenge.as_str()),
            ("code_challenge_method", "S256"),
        ],
    )?;

    let listener = CallbackListener::bind(CallbackMode::AuthorizationCode, Some(pkce.state))
        .await
        .map_err(|e| {
            ApiError::AuthorizationFailed(format!("cannot listen on {}: {}", CALLBACK_ADDR, e))
        })?;

    open_in_browser(&url);

    let code = match listener.wait(config.auth_timeout).await? {
        AuthorizationEvent::Code(code) => code,
        AuthorizationEvent::AccessToken(_) => {
            return Err(ApiError::AuthorizationFailed(
                "expected an authorization code but received an access token".to_string(),
            ));
        }
    };

    exchange_code(
        &config.token_url,
        &config.client_id,
        client_secret,
        &code,
        &pkce.code_verifier,
        &redirect_uri,
    )
    .await
}

/// Exchanges an authorization code for a token pair.
pub async fn exchange_code(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<Token, ApiError> {
    let response = Client::new()
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code_verifier", code_verifier),
        ])
        .send()
        .await
        .map_err(|e| ApiError::CredentialExchangeFailed(e.to_string()))?;

    let json = read_token_response(response).await?;

    Ok(Token {
        access_token: required_str(&json, "access_token")?,
        refresh_token: required_str(&json, "refresh_token")?,
        scope: json["scope"].as_str().unwrap_or_default().to_string(),
        expires_in: json["expires_in"].as_u64().unwrap_or(3600),
        obtained_at: Utc::now().timestamp() as u64,
    })
}

fn open_in_browser(url: &Url) {
    info!("Authorizing... (click if browser doesn't open)\n{}", url);
    if webbrowser::open(url.as_str()).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        )
    }
}

async fn read_token_response(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::CredentialExchangeFailed(e.to_string()))?;
    let json = serde_json::from_str::<Value>(&body);

    if !status.is_success() {
        let reason = json
            .ok()
            .and_then(|json| {
                json["error_description"]
                    .as_str()
                    .or_else(|| json["error"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        return Err(ApiError::CredentialExchangeFailed(format!(
            "token endpoint answered {}: {}",
            status, reason
        )));
    }

    json.map_err(|e| {
        ApiError::CredentialExchangeFailed(format!("token endpoint returned invalid JSON: {}", e))
    })
}

fn required_str(json: &Value, field: &str) -> Result<String, ApiError> {
    json[field]
        .as_str()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::CredentialExchangeFailed(format!("response lacks `{}`", field))
        })
}
