//! HTTP Basic Auth against `http_users`, grounded in the original system's
//! `get_current_http_user` dependency: look the username up, reject if the
//! login is disabled or the password doesn't verify, record the outcome.

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use axum::http::{HeaderMap, StatusCode};
use bbs_store::Store;
use chrono::Utc;

/// The authenticated identity behind a request: the `HttpUser`'s username,
/// used as the caller callsign when forwarding into the dispatcher.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

fn unauthorized() -> (StatusCode, [(&'static str, &'static str); 1], &'static str) {
    (StatusCode::UNAUTHORIZED, [("www-authenticate", "Basic")], "invalid username or password")
}

/// Parse `Authorization: Basic <base64>`, verify against `store`, and record
/// the login outcome. Returns `Err` with a ready-to-send status/body on any
/// failure (missing header, unknown user, disabled login, bad password).
pub fn authenticate(
    store: &Store,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, (StatusCode, [(&'static str, &'static str); 1], &'static str)> {
    let header = headers.get("authorization").and_then(|v| v.to_str().ok()).ok_or_else(unauthorized)?;
    let encoded = header.strip_prefix("Basic ").ok_or_else(unauthorized)?;
    let decoded = {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;
        BASE64.decode(encoded).map_err(|_| unauthorized())?
    };
    let text = String::from_utf8(decoded).map_err(|_| unauthorized())?;
    let (username, password) = text.split_once(':').ok_or_else(unauthorized)?;
    let username = username.trim().to_ascii_uppercase();

    let outcome = store
        .transaction(|root| {
            let Some(user) = root.http_users.get_mut(&username) else {
                return Ok(false);
            };
            if !user.http_enabled {
                return Ok(false);
            }
            let parsed_hash = match PasswordHash::new(&user.password_hash) {
                Ok(h) => h,
                Err(_) => return Ok(false),
            };
            if Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok() {
                user.last_login = Some(Utc::now());
                user.failed_attempts = 0;
                Ok(true)
            } else {
                user.failed_attempts += 1;
                Ok(false)
            }
        })
        .unwrap_or(false);

    if outcome {
        Ok(AuthenticatedUser { username })
    } else {
        Err(unauthorized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHasher, SaltString};
    use axum::http::HeaderValue;
    use bbs_core::HttpUser;
    use bbs_store::FileBackend;

    fn opened_store(dir: &std::path::Path) -> Store {
        let store = Store::new(FileBackend::new(dir.join("store.json")));
        store.open().unwrap();
        store
    }

    fn hash(password: &str) -> String {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        Argon2::default().hash_password(password.as_bytes(), &salt).unwrap().to_string()
    }

    fn basic_header(user: &str, pass: &str) -> HeaderValue {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;
        let encoded = BASE64.encode(format!("{user}:{pass}"));
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap()
    }

    fn seed_user(store: &Store, username: &str, password: &str, enabled: bool) {
        store
            .transaction(|root| {
                root.http_users.insert(
                    username.to_string(),
                    HttpUser {
                        username: username.to_string(),
                        password_hash: hash(password),
                        http_enabled: enabled,
                        created_at: Utc::now(),
                        last_login: None,
                        failed_attempts: 0,
                    },
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn correct_credentials_authenticate_and_record_login() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        seed_user(&store, "W1AW", "hunter2", true);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", basic_header("w1aw", "hunter2"));
        let user = authenticate(&store, &headers).unwrap();
        assert_eq!(user.username, "W1AW");
        assert!(store.snapshot().http_users["W1AW"].last_login.is_some());
    }

    #[test]
    fn wrong_password_is_rejected_and_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        seed_user(&store, "W1AW", "hunter2", true);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", basic_header("W1AW", "wrong"));
        assert!(authenticate(&store, &headers).is_err());
        assert_eq!(store.snapshot().http_users["W1AW"].failed_attempts, 1);
    }

    #[test]
    fn disabled_login_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        seed_user(&store, "W1AW", "hunter2", false);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", basic_header("W1AW", "hunter2"));
        assert!(authenticate(&store, &headers).is_err());
    }

    #[test]
    fn missing_header_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        assert!(authenticate(&store, &HeaderMap::new()).is_err());
    }
}
