// Token endpoint requests: code exchange and refresh

use reqwest::Client;

use super::types::TokenResponse;
use crate::config::OAuthSettings;
use crate::error::{AuthError, Result};
use crate::http_client::{error_kind, error_parts};

/// Exchange an authorization code for tokens (grant type `authorization_code`)
pub async fn exchange_authorization_code(
    client: &Client,
    settings: &OAuthSettings,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    tracing::info!("Exchanging authorization code for tokens...");

    let form = [
        ("client_id", settings.client_id()),
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", settings.redirect_uri().as_str()),
        ("code_verifier", verifier),
    ];

    post_token_request(client, &settings.token_url(), &form, "authorization_code").await
}

/// Mint a new access token from a refresh token (grant type `refresh_token`)
pub async fn refresh_access_token(
    client: &Client,
    settings: &OAuthSettings,
    refresh_token: &str,
) -> Result<TokenResponse> {
    tracing::info!("Refreshing access token...");

    let form = [
        ("client_id", settings.client_id()),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    post_token_request(client, &settings.token_url(), &form, "refresh_token").await
}

async fn post_token_request(
    client: &Client,
    url: &str,
    form: &[(&str, &str)],
    grant_type: &'static str,
) -> Result<TokenResponse> {
    tracing::debug!(url = %url, grant_type, "Token request");

    // reqwest sets application/x-www-form-urlencoded for .form()
    let response = client.post(url).form(form).send().await.map_err(|e| {
        tracing::warn!(
            error_kind = error_kind(&e),
            error = %e,
            url = %url,
            grant_type,
            "Token request transport error"
        );
        AuthError::Http(e)
    })?;

    if !response.status().is_success() {
        let (status, body) = error_parts(response).await;
        tracing::error!(status, body = %body, grant_type, "Token request failed");

        // OAuth error bodies carry error / error_description
        if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(error_code) = error_json.get("error").and_then(|v| v.as_str()) {
                tracing::error!(
                    error = error_code,
                    description = error_json
                        .get("error_description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default(),
                    "Token endpoint error details"
                );
            }
        }

        return Err(AuthError::TokenExchangeFailed { status, body });
    }

    let data: TokenResponse = response.json().await?;

    tracing::info!(
        grant_type,
        expires_in = data.expires_in,
        rotated_refresh_token = data.refresh_token.is_some(),
        "Token endpoint succeeded"
    );

    Ok(data)
}
