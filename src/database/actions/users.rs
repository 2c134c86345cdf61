use crate::{
    authentication::{
        cryptography::{hash_password_blocking, unusable_password},
        session::SessionData,
    },
    error::{Error, ErrorKind},
    form::{Form, FormData, StrField},
    schema::{NewUser, User, UserExtra},
    store::Store,
    EMAIL_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH,
};

const DUPLICATE_EMAIL: &str = "user with this email already exists.";

/// Lower-cases the domain part; the local part is kept as given
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Creates a user. Without a password the account gets an unusable hash
/// and can't obtain a token until one is set.
pub async fn create_user<S: Store>(
    store: &S,
    email: Option<&str>,
    password: Option<&str>,
    extra: UserExtra,
) -> Result<User, Error> {
    let email = email.map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        return Err(Error::field("email", "Users must have an email address."));
    }

    let password = match password {
        Some(password) => hash_password_blocking(password).await?,
        None => unusable_password(),
    };

    let new_user = NewUser {
        email,
        password,
        name: extra.name,
        is_staff: extra.is_staff,
        is_superuser: extra.is_superuser,
    };
    let Some(user) = store.insert_user(new_user).await? else {
        return Err(Error::field("email", DUPLICATE_EMAIL));
    };

    log::info!("Created user {}", user.id);
    Ok(user)
}

pub async fn create_superuser<S: Store>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<User, Error> {
    let mut user = create_user(store, Some(email), Some(password), UserExtra::default()).await?;
    user.is_staff = true;
    user.is_superuser = true;

    store
        .update_user(&user)
        .await?
        .ok_or_else(|| Error::field("email", DUPLICATE_EMAIL))
}

/// Validates a public sign-up payload and creates the account
pub async fn register_user<S: Store>(store: &S, data: FormData) -> Result<User, Error> {
    let mut form = Form::from_data(data);
    let email = form.get_email("email", EMAIL_MAX_LENGTH, true);
    let password = form.get_str("password", StrField::secret(PASSWORD_MIN_LENGTH), true);
    let name = form.get_str("name", StrField::text(NAME_MAX_LENGTH), true);
    form.finish()?;

    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(ErrorKind::Validation.default());
    };

    let extra = UserExtra {
        name,
        ..Default::default()
    };
    create_user(store, Some(&email), Some(&password), extra).await
}

pub async fn get_profile<S: Store>(store: &S, session: &SessionData) -> Result<User, Error> {
    store
        .get_user_by_id(session.user_id)
        .await?
        .ok_or_else(|| ErrorKind::Authorization.new("User inactive or deleted."))
}

/// Applies whichever of `name`, `password` and `email` are present
pub async fn update_profile<S: Store>(
    store: &S,
    session: &SessionData,
    data: FormData,
) -> Result<User, Error> {
    let mut form = Form::from_data(data);
    let name = form.get_str("name", StrField::text(NAME_MAX_LENGTH), false);
    let password = form.get_str("password", StrField::secret(PASSWORD_MIN_LENGTH), false);
    let email = form.get_email("email", EMAIL_MAX_LENGTH, false);
    form.finish()?;

    let mut user = get_profile(store, session).await?;
    if let Some(name) = name {
        user.name = name;
    }
    if let Some(email) = email {
        user.email = normalize_email(&email);
    }
    if let Some(password) = password {
        user.password = hash_password_blocking(&password).await?;
    }

    let Some(user) = store.update_user(&user).await? else {
        return Err(Error::field("email", DUPLICATE_EMAIL));
    };

    log::debug!("Updated profile of user {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{authentication::cryptography::verify_password, memory::MemoryStore};
    use serde_json::{json, Value};

    fn data(value: Value) -> FormData {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn only_the_domain_is_lower_cased() {
        assert_eq!(normalize_email("Salman@GMAIL.COM"), "Salman@gmail.com");
        assert_eq!(normalize_email(" a@b@Example.org "), "a@b@example.org");
        assert_eq!(normalize_email("nobody"), "nobody");
    }

    #[tokio::test]
    async fn stores_a_hash_not_the_password() {
        let store = MemoryStore::new();
        let user = create_user(
            &store,
            Some("salman@GMAIL.com"),
            Some("test1234"),
            UserExtra::default(),
        )
        .await
        .unwrap();

        assert_eq!(user.email, "salman@gmail.com");
        assert_ne!(user.password, "test1234");
        assert!(verify_password("test1234", &user.password).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn email_is_required() {
        let store = MemoryStore::new();

        for email in [None, Some(""), Some("  ")] {
            let error = create_user(&store, email, Some("test1234"), UserExtra::default())
                .await
                .unwrap_err();
            assert_eq!(error.kind, ErrorKind::Validation);
            assert!(error.fields.contains_key("email"));
        }
    }

    #[tokio::test]
    async fn superusers_get_both_flags() {
        let store = MemoryStore::new();
        let user = create_superuser(&store, "admin@gmail.com", "test1234")
            .await
            .unwrap();

        assert!(user.is_staff);
        assert!(user.is_superuser);
        let stored = store.get_user("admin@gmail.com").await.unwrap().unwrap();
        assert!(stored.is_superuser);
    }

    #[tokio::test]
    async fn registration_rejects_short_passwords_and_duplicates() {
        let store = MemoryStore::new();

        let error = register_user(
            &store,
            data(json!({ "email": "salman@gmail.com", "password": "pw", "name": "Salman" })),
        )
        .await
        .unwrap_err();
        assert!(error.fields.contains_key("password"));
        assert!(store.get_user("salman@gmail.com").await.unwrap().is_none());

        let payload =
            json!({ "email": "salman@gmail.com", "password": "test1234", "name": "Salman" });
        register_user(&store, data(payload)).await.unwrap();

        let error = register_user(
            &store,
            data(json!({ "email": "SALMAN@gmail.com", "password": "test1234", "name": "Other" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.fields["email"], vec![DUPLICATE_EMAIL.to_string()]);
    }

    #[tokio::test]
    async fn duplicates_fold_non_ascii_case() {
        let store = MemoryStore::new();
        create_user(
            &store,
            Some("ÉLÈVE@gmail.com"),
            Some("test1234"),
            UserExtra::default(),
        )
        .await
        .unwrap();

        let error = create_user(
            &store,
            Some("élève@gmail.com"),
            Some("test1234"),
            UserExtra::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(error.fields["email"], vec![DUPLICATE_EMAIL.to_string()]);
    }

    #[tokio::test]
    async fn profile_updates_apply_present_keys_only() {
        let store = MemoryStore::new();
        let user = register_user(
            &store,
            data(json!({ "email": "salman@gmail.com", "password": "test1234", "name": "Salman" })),
        )
        .await
        .unwrap();
        let session = SessionData::from(&user);

        let updated = update_profile(
            &store,
            &session,
            data(json!({ "name": "New name", "password": "newpassword" })),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "New name");
        assert_eq!(updated.email, "salman@gmail.com");
        assert!(verify_password("newpassword", &updated.password).unwrap());
    }

    #[tokio::test]
    async fn profile_email_must_stay_unique() {
        let store = MemoryStore::new();
        create_user(&store, Some("taken@gmail.com"), Some("test1234"), UserExtra::default())
            .await
            .unwrap();
        let user = create_user(
            &store,
            Some("salman@gmail.com"),
            Some("test1234"),
            UserExtra::default(),
        )
        .await
        .unwrap();

        let error = update_profile(
            &store,
            &SessionData::from(&user),
            data(json!({ "email": "Taken@Gmail.com" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.fields["email"], vec![DUPLICATE_EMAIL.to_string()]);
    }
}
