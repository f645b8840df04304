use crate::errors::AuthError;
use costrig_models::TriggerDoc;
use serde::Deserialize;

const TOKEN_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Authentication mechanism for outbound platform calls, selected once per
/// call from the trigger's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    TokenIssuer { url: String, apikey: String },
    StaticKey { user: String, key: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl AuthStrategy {
    /// Token-issuer credentials in the additional data win over the static
    /// platform api key.
    pub fn resolve(trigger: &TriggerDoc) -> Result<AuthStrategy, AuthError> {
        if let Some(data) = &trigger.additional_data {
            let url = data.get("iamUrl").and_then(|v| v.as_str());
            let apikey = data.get("iamApikey").and_then(|v| v.as_str());
            if let (Some(url), Some(apikey)) = (url, apikey) {
                return Ok(AuthStrategy::TokenIssuer {
                    url: url.to_string(),
                    apikey: apikey.to_string(),
                });
            }
        }
        match &trigger.apikey {
            Some(apikey) => match apikey.split_once(':') {
                Some((user, key)) => Ok(AuthStrategy::StaticKey {
                    user: user.to_string(),
                    key: key.to_string(),
                }),
                None => Err(AuthError::MalformedKey(trigger.id.clone())),
            },
            None => Err(AuthError::MissingCredentials(trigger.id.clone())),
        }
    }

    pub async fn apply(
        &self,
        http: &reqwest::Client,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, AuthError> {
        match self {
            AuthStrategy::StaticKey { user, key } => {
                Ok(request.basic_auth(user, Some(key)))
            }
            AuthStrategy::TokenIssuer { url, apikey } => {
                let resp = http
                    .post(url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .form(&[
                        ("grant_type", TOKEN_GRANT_TYPE),
                        ("apikey", apikey.as_str()),
                    ])
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(AuthError::TokenRejected(resp.status()));
                }
                let token: TokenResponse = resp.json().await?;
                Ok(request.bearer_auth(token.access_token))
            }
        }
    }
}

/// Resolve the trigger's strategy and apply it to the request.
pub async fn authenticated(
    http: &reqwest::Client,
    trigger: &TriggerDoc,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::RequestBuilder, AuthError> {
    AuthStrategy::resolve(trigger)?.apply(http, request).await
}
