use crate::{
    authentication::session::SessionData,
    error::Error,
    form::{Form, FormData, StrField},
    query::AttributeFilter,
    schema::{Attribute, AttributeKind, Id},
    store::Store,
};

pub async fn list_attributes<S: Store>(
    store: &S,
    session: &SessionData,
    kind: AttributeKind,
    filter: AttributeFilter,
) -> Result<Vec<Attribute>, Error> {
    store.list_attributes(kind, session.user_id, filter).await
}

/// Only `name` is read from the payload; the owner is always the caller
pub async fn create_attribute<S: Store>(
    store: &S,
    session: &SessionData,
    kind: AttributeKind,
    data: FormData,
) -> Result<Attribute, Error> {
    let mut form = Form::from_data(data);
    let name = form.get_str("name", StrField::text(kind.name_max_length()), true);
    form.finish()?;

    let name = name.unwrap_or_default();
    let attribute = store.create_attribute(kind, session.user_id, &name).await?;
    log::debug!(
        "User {} created {} {}",
        session.user_id,
        kind.table(),
        attribute.id
    );

    Ok(attribute)
}

/// Fails with a field error on the first id that doesn't exist for the
/// caller. Foreign ids get the same message as missing ones.
pub async fn check_ownership<S: Store>(
    store: &S,
    session: &SessionData,
    kind: AttributeKind,
    ids: &[Id],
) -> Result<(), Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let owned = store
        .owned_attribute_ids(kind, session.user_id, ids)
        .await?;
    match ids.iter().find(|id| !owned.contains(id)) {
        Some(id) => Err(Error::field(
            kind.field(),
            &format!("Invalid pk \"{id}\" - object does not exist."),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, memory::MemoryStore};
    use serde_json::{json, Value};

    fn data(value: Value) -> FormData {
        serde_json::from_value(value).unwrap()
    }

    fn session(user_id: Id) -> SessionData {
        SessionData {
            user_id,
            email: format!("user{user_id}@gmail.com"),
            is_staff: false,
            is_superuser: false,
        }
    }

    #[tokio::test]
    async fn listings_are_scoped_and_ordered_by_name() {
        let store = MemoryStore::new();
        let (alice, bob) = (session(1), session(2));

        for name in ["Breakfast", "Vegan", "Dessert"] {
            create_attribute(&store, &alice, AttributeKind::Tag, data(json!({ "name": name })))
                .await
                .unwrap();
        }
        create_attribute(&store, &bob, AttributeKind::Tag, data(json!({ "name": "Fruity" })))
            .await
            .unwrap();

        let names: Vec<String> =
            list_attributes(&store, &alice, AttributeKind::Tag, AttributeFilter::default())
                .await
                .unwrap()
                .into_iter()
                .map(|tag| tag.name)
                .collect();
        assert_eq!(names, vec!["Vegan", "Dessert", "Breakfast"]);
    }

    #[tokio::test]
    async fn payload_owner_is_ignored() {
        let store = MemoryStore::new();
        let attribute = create_attribute(
            &store,
            &session(1),
            AttributeKind::Ingredient,
            data(json!({ "name": "Kale", "user": 2 })),
        )
        .await
        .unwrap();

        assert_eq!(attribute.user_id, 1);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let store = MemoryStore::new();

        let error = create_attribute(
            &store,
            &session(1),
            AttributeKind::Tag,
            data(json!({ "name": "" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Validation);
        assert!(error.fields.contains_key("name"));

        let listed =
            list_attributes(&store, &session(1), AttributeKind::Tag, AttributeFilter::default())
                .await
                .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn foreign_ids_look_missing() {
        let store = MemoryStore::new();
        let mine = create_attribute(
            &store,
            &session(1),
            AttributeKind::Tag,
            data(json!({ "name": "Mine" })),
        )
        .await
        .unwrap();
        let theirs = create_attribute(
            &store,
            &session(2),
            AttributeKind::Tag,
            data(json!({ "name": "Theirs" })),
        )
        .await
        .unwrap();

        assert!(check_ownership(&store, &session(1), AttributeKind::Tag, &[mine.id]).await.is_ok());

        let error = check_ownership(&store, &session(1), AttributeKind::Tag, &[mine.id, theirs.id])
            .await
            .unwrap_err();
        assert_eq!(
            error.fields["tags"],
            vec![format!("Invalid pk \"{}\" - object does not exist.", theirs.id)]
        );
    }
}
