// Last.fm signed API calls and web authentication
// API Documentation: https://www.last.fm/api/authspec

use super::traits::ScrobblerError;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const AUTH_PAGE: &str = "https://www.last.fm/api/auth/";

// Invalid authentication, invalid session key, unauthorized token, expired token
const AUTH_ERROR_CODES: [u64; 4] = [4, 9, 14, 15];

/// Blocking Last.fm API client, signs every call with the shared secret
pub struct LastFmApi {
    api_key: String,
    api_secret: String,
    api_root: String,
}

impl LastFmApi {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            api_root: API_ROOT.to_string(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Request a token to be authorized by the user
    pub fn get_token(&self) -> Result<String> {
        let response = self.call("auth.getToken", Vec::new(), false)?;
        response["token"]
            .as_str()
            .map(str::to_string)
            .context("Last.fm token response has no token")
    }

    /// Exchange an authorized token for a session key
    pub fn get_session(&self, token: &str) -> Result<String> {
        let response = self.call("auth.getSession", vec![("token", token.to_string())], false)?;
        response["session"]["key"]
            .as_str()
            .map(str::to_string)
            .context("Last.fm session response has no key")
    }

    /// Page where the user grants access for `token`
    pub fn auth_url(&self, token: &str) -> Result<Url> {
        Url::parse_with_params(AUTH_PAGE, &[("api_key", self.api_key.as_str()), ("token", token)])
            .context("Failed to build Last.fm auth URL")
    }

    /// Call an API method; write methods are sent as POST
    pub fn call(
        &self,
        method: &str,
        mut params: Vec<(&str, String)>,
        write: bool,
    ) -> Result<Value, ScrobblerError> {
        params.push(("method", method.to_string()));
        params.push(("api_key", self.api_key.clone()));
        let signature = sign(&params, &self.api_secret);
        params.push(("api_sig", signature));
        params.push(("format", "json".to_string()));

        log::debug!("Last.fm: calling {}", method);

        let request = if write {
            attohttpc::post(&self.api_root)
                .form(&params)
                .context("Failed to encode Last.fm request")?
                .send()
        } else {
            attohttpc::get(&self.api_root).params(&params).send()
        };
        let response = request.with_context(|| format!("Failed to send {} to Last.fm", method))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("Failed to read Last.fm {} response", method))?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => match api_error(&value) {
                Some(err) => Err(err),
                None if status.is_success() => Ok(value),
                None => Err(ScrobblerError::Service {
                    code: None,
                    message: format!("HTTP {}", status),
                }),
            },
            Err(_) if !status.is_success() => Err(ScrobblerError::Service {
                code: None,
                message: format!("HTTP {}: {}", status, body),
            }),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Failed to decode Last.fm {} response", method))
                .into()),
        }
    }
}

/// `api_sig`: md5 of every parameter name and value sorted by name, followed by the secret
pub fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params
        .iter()
        .filter(|(name, _)| *name != "format" && *name != "callback")
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut payload = String::new();
    for (name, value) in sorted {
        payload.push_str(name);
        payload.push_str(value);
    }
    payload.push_str(secret);

    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Map a Last.fm error body (`{"error": 9, "message": "..."}`) to a scrobbler error
pub fn api_error(body: &Value) -> Option<ScrobblerError> {
    let code = body.get("error")?.as_u64()?;
    let message = body["message"].as_str().unwrap_or("unknown error").to_string();

    if AUTH_ERROR_CODES.contains(&code) {
        Some(ScrobblerError::Auth(message))
    } else {
        Some(ScrobblerError::Service {
            code: u32::try_from(code).ok(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_sorts_and_skips_format() {
        let params = vec![
            ("method", "auth.getSession".to_string()),
            ("token", "tok".to_string()),
            ("api_key", "key".to_string()),
            ("format", "json".to_string()),
        ];

        let expected = format!(
            "{:x}",
            md5::compute("api_keykeymethodauth.getSessiontokentoksecret".as_bytes())
        );
        assert_eq!(sign(&params, "secret"), expected);
    }

    #[test]
    fn test_sign_is_order_independent() {
        let a = vec![("artist", "Low".to_string()), ("track", "Words".to_string())];
        let b = vec![("track", "Words".to_string()), ("artist", "Low".to_string())];
        assert_eq!(sign(&a, "s"), sign(&b, "s"));
    }

    #[test]
    fn test_api_error_auth_codes() {
        for code in AUTH_ERROR_CODES {
            let err = api_error(&json!({"error": code, "message": "Invalid session key"})).unwrap();
            assert!(err.is_auth_error(), "code {} should be an auth error", code);
        }
    }

    #[test]
    fn test_api_error_service_codes() {
        let err = api_error(&json!({"error": 11, "message": "Service Offline"})).unwrap();
        assert!(!err.is_auth_error());
        assert!(matches!(err, ScrobblerError::Service { code: Some(11), .. }));
    }

    #[test]
    fn test_api_error_ignores_success_bodies() {
        assert!(api_error(&json!({"token": "abc"})).is_none());
        assert!(api_error(&json!({"scrobbles": {"@attr": {"accepted": 1}}})).is_none());
    }

    #[test]
    fn test_auth_url() {
        let api = LastFmApi::new("key".to_string(), "secret".to_string());
        let url = api.auth_url("tok").unwrap();
        assert_eq!(url.as_str(), "https://www.last.fm/api/auth/?api_key=key&token=tok");
    }
}
