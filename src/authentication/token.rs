use super::cryptography::{
    generate_access_token, hash_password_blocking, is_usable_password, verify_password_blocking,
};
use crate::{
    actions::users::normalize_email,
    error::{Error, ErrorKind},
    form::{Form, FormData, StrField},
    schema::User,
    store::Store,
    EMAIL_MAX_LENGTH,
};

/// Checks credentials against the identity store. Unknown users, inactive
/// users and wrong passwords are indistinguishable to the caller.
pub async fn authenticate_user<S: Store>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<Option<User>, Error> {
    let Some(user) = store.get_user(&normalize_email(email)).await? else {
        // Keeps the unknown-user path about as slow as a real verification
        let _ = hash_password_blocking(password).await;
        return Ok(None);
    };

    let authenticated = is_usable_password(&user.password)
        && verify_password_blocking(password, &user.password).await?;
    if !authenticated || !user.is_active {
        return Ok(None);
    }

    Ok(Some(user))
}

/// Returns the caller's persistent token, creating it on first login
pub async fn obtain_token<S: Store>(store: &S, data: FormData) -> Result<String, Error> {
    let mut form = Form::from_data(data);
    let email = form.get_str("email", StrField::text(EMAIL_MAX_LENGTH), true);
    let password = form.get_str("password", StrField::secret(1), true);

    let (Some(email), Some(password), Ok(())) = (email, password, form.finish()) else {
        return Err(ErrorKind::Authentication.default());
    };

    let Some(user) = authenticate_user(store, &email, &password).await? else {
        log::debug!("Token refused for {email}");
        return Err(ErrorKind::Authentication.default());
    };

    let token = store
        .get_or_create_token(user.id, &generate_access_token())
        .await?;
    log::info!("Issued token for user {}", user.id);

    Ok(token)
}
