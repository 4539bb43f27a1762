use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, warn};

use crate::{config::UserEntry, error::ApiError, routes::AppState};

/// Users allowed to call the bridge, as configured. Passwords are compared
/// verbatim.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    users: HashMap<String, UserEntry>,
}

impl CredentialStore {
    pub fn new(users: HashMap<String, UserEntry>) -> Self {
        Self { users }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|user| user.password == password)
    }
}

/// Proof that the request passed Basic authentication. Taking it as a
/// handler argument rejects unauthenticated requests before anything else
/// runs.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some((username, password)) = basic_credentials(&parts.headers) else {
            warn!("request without basic credentials");
            return Err(ApiError::Unauthorized);
        };

        if state.credentials.verify(&username, &password) {
            info!("User: {} - Valid Credentials", username);
            Ok(Self { username })
        } else {
            error!("User: {} - Invalid Credentials", username);
            Err(ApiError::Unauthorized)
        }
    }
}

/// Decodes `Authorization: Basic <base64(user:password)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn store() -> CredentialStore {
        CredentialStore::new(HashMap::from([(
            "ncentral".to_string(),
            UserEntry {
                password: "S3cret".to_string(),
                metadata: HashMap::new(),
            },
        )]))
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn verifies_exact_password() {
        let store = store();
        assert!(store.verify("ncentral", "S3cret"));
        assert!(!store.verify("ncentral", "s3cret"));
        assert!(!store.verify("NCENTRAL", "S3cret"));
        assert!(!store.verify("someone", "S3cret"));
    }

    #[test]
    fn decodes_basic_header() {
        let encoded = BASE64.encode("ncentral:pa:ss");
        assert_eq!(
            basic_credentials(&headers(&format!("Basic {encoded}"))),
            Some(("ncentral".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
        assert_eq!(basic_credentials(&headers("Bearer abc")), None);
        assert_eq!(basic_credentials(&headers("Basic not-base64!")), None);

        let no_colon = BASE64.encode("ncentral");
        assert_eq!(basic_credentials(&headers(&format!("Basic {no_colon}"))), None);
    }
}
