use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::session::SessionData;
use crate::{
    error::{Error, ErrorKind},
    store::Store,
    AUTH_SCHEMES,
};

/// Splits `Token <key>` (or `Bearer <key>`) into the key
fn parse_authorization(header: &str) -> Result<&str, Error> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !AUTH_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Err(ErrorKind::Authorization.default());
    }

    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(key),
        (None, _) => Err(ErrorKind::Authorization
            .new("Invalid token header. No credentials provided.")),
        (Some(_), Some(_)) => Err(ErrorKind::Authorization
            .new("Invalid token header. Token string should not contain spaces.")),
    }
}

pub async fn authenticate<S: Store>(header: Option<&str>, store: &S) -> Result<SessionData, Error> {
    let Some(header) = header else {
        return Err(ErrorKind::Authorization.default());
    };
    let key = parse_authorization(header)?;

    match store.get_token_user(key).await? {
        Some(user) if user.is_active => Ok(SessionData::from(&user)),
        Some(user) => {
            log::debug!("Rejected token of inactive user {}", user.id);
            Err(ErrorKind::Authorization.new("User inactive or deleted."))
        }
        None => {
            log::debug!("Rejected unknown token");
            Err(ErrorKind::Authorization.new("Invalid token."))
        }
    }
}

pub fn with_session<S: Store>(
    store: Arc<S>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let store = store.clone();
        async move {
            authenticate(header.as_deref(), &*store)
                .await
                .map_err(warp::reject::custom)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, schema::NewUser};

    #[test]
    fn parses_token_and_bearer_schemes() {
        assert_eq!(parse_authorization("Token abc").unwrap(), "abc");
        assert_eq!(parse_authorization("bearer abc").unwrap(), "abc");
        assert!(parse_authorization("Basic abc").is_err());
        assert!(parse_authorization("Token").is_err());
        assert!(parse_authorization("Token a b").is_err());
    }

    #[tokio::test]
    async fn resolves_sessions_from_tokens() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                email: "salman@gmail.com".to_string(),
                password: "hash".to_string(),
                name: "Salman".to_string(),
                is_staff: false,
                is_superuser: false,
            })
            .await
            .unwrap()
            .unwrap();
        let key = store.get_or_create_token(user.id, "abc").await.unwrap();

        let header = format!("Token {key}");
        let session = authenticate(Some(header.as_str()), &store).await.unwrap();
        assert_eq!(session.user_id, user.id);

        let missing = authenticate(None, &store).await.unwrap_err();
        assert_eq!(missing.info(), "Authentication credentials were not provided.");

        let unknown = authenticate(Some("Token nope"), &store).await.unwrap_err();
        assert_eq!(unknown.kind, ErrorKind::Authorization);
        assert_eq!(unknown.info(), "Invalid token.");
    }

    #[tokio::test]
    async fn inactive_users_are_rejected() {
        let store = MemoryStore::new();
        let mut user = store
            .insert_user(NewUser {
                email: "salman@gmail.com".to_string(),
                password: "hash".to_string(),
                name: String::new(),
                is_staff: false,
                is_superuser: false,
            })
            .await
            .unwrap()
            .unwrap();
        store.get_or_create_token(user.id, "abc").await.unwrap();
        user.is_active = false;
        store.update_user(&user).await.unwrap();

        let error = authenticate(Some("Token abc"), &store).await.unwrap_err();
        assert_eq!(error.info(), "User inactive or deleted.");
    }
}
