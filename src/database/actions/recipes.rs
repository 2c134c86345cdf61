use rust_decimal::Decimal;

use super::attributes::check_ownership;
use crate::{
    authentication::session::SessionData,
    error::{Error, ErrorKind, FieldErrors},
    form::{Form, FormData, StrField},
    query::RecipeFilter,
    schema::{AttributeKind, Id, RecipeDetail, RecipeDraft, RecipeSummary},
    store::Store,
    RECIPE_TITLE_MAX_LENGTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// PUT: scalar fields required, omitted associations are cleared
    Full,
    /// PATCH: only the keys present are applied
    Partial,
}

/// A validated recipe payload. `None` means the key was absent.
struct RecipeFields {
    title: Option<String>,
    time_minutes: Option<i32>,
    price: Option<Decimal>,
    tags: Option<Vec<Id>>,
    ingredients: Option<Vec<Id>>,
}

impl RecipeFields {
    fn read(data: FormData, required: bool) -> Result<Self, Error> {
        let mut form = Form::from_data(data);
        let fields = Self {
            title: form.get_str("title", StrField::text(RECIPE_TITLE_MAX_LENGTH), required),
            time_minutes: form.get_non_negative("time_minutes", required),
            price: form.get_price("price", required),
            tags: form.get_id_list(AttributeKind::Tag.field()),
            ingredients: form.get_id_list(AttributeKind::Ingredient.field()),
        };
        form.finish()?;

        Ok(fields)
    }

    fn full_draft(&self) -> Result<RecipeDraft, Error> {
        match (&self.title, self.time_minutes, self.price) {
            (Some(title), Some(time_minutes), Some(price)) => Ok(RecipeDraft {
                title: title.to_owned(),
                time_minutes,
                price,
            }),
            _ => Err(ErrorKind::Validation.default()),
        }
    }

    fn partial_draft(&self, base: RecipeDraft) -> RecipeDraft {
        RecipeDraft {
            title: self.title.clone().unwrap_or(base.title),
            time_minutes: self.time_minutes.unwrap_or(base.time_minutes),
            price: self.price.unwrap_or(base.price),
        }
    }
}

/// Every referenced tag and ingredient must belong to the caller
async fn check_links<S: Store>(
    store: &S,
    session: &SessionData,
    tags: Option<&[Id]>,
    ingredients: Option<&[Id]>,
) -> Result<(), Error> {
    let mut fields = FieldErrors::new();
    for (kind, ids) in [
        (AttributeKind::Tag, tags),
        (AttributeKind::Ingredient, ingredients),
    ] {
        let Some(ids) = ids else {
            continue;
        };
        match check_ownership(store, session, kind, ids).await {
            Ok(()) => {}
            Err(error) if error.kind == ErrorKind::Validation => fields.extend(error.fields),
            Err(error) => return Err(error),
        }
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(fields))
    }
}

pub async fn list_recipes<S: Store>(
    store: &S,
    session: &SessionData,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeSummary>, Error> {
    store.list_recipes(session.user_id, filter).await
}

pub async fn get_recipe<S: Store>(
    store: &S,
    session: &SessionData,
    id: Id,
) -> Result<RecipeDetail, Error> {
    store
        .get_recipe(session.user_id, id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())
}

pub async fn create_recipe<S: Store>(
    store: &S,
    session: &SessionData,
    data: FormData,
) -> Result<RecipeSummary, Error> {
    let fields = RecipeFields::read(data, true)?;
    let draft = fields.full_draft()?;
    let tags = fields.tags.unwrap_or_default();
    let ingredients = fields.ingredients.unwrap_or_default();
    check_links(store, session, Some(&tags), Some(&ingredients)).await?;

    let recipe = store
        .create_recipe(session.user_id, &draft, &tags, &ingredients)
        .await?;
    log::info!("User {} created recipe {}", session.user_id, recipe.id);

    Ok(recipe)
}

pub async fn update_recipe<S: Store>(
    store: &S,
    session: &SessionData,
    id: Id,
    data: FormData,
    mode: UpdateMode,
) -> Result<RecipeSummary, Error> {
    let existing = get_recipe(store, session, id).await?;
    let fields = RecipeFields::read(data, mode == UpdateMode::Full)?;

    let (draft, tags, ingredients) = match mode {
        UpdateMode::Full => (
            fields.full_draft()?,
            Some(fields.tags.unwrap_or_default()),
            Some(fields.ingredients.unwrap_or_default()),
        ),
        UpdateMode::Partial => (
            fields.partial_draft(existing.draft()),
            fields.tags,
            fields.ingredients,
        ),
    };
    check_links(store, session, tags.as_deref(), ingredients.as_deref()).await?;

    let recipe = store
        .update_recipe(
            session.user_id,
            id,
            &draft,
            tags.as_deref(),
            ingredients.as_deref(),
        )
        .await?
        .ok_or_else(|| ErrorKind::NotFound.default())?;
    log::debug!("User {} updated recipe {id} ({mode:?})", session.user_id);

    Ok(recipe)
}

pub async fn delete_recipe<S: Store>(
    store: &S,
    session: &SessionData,
    id: Id,
) -> Result<(), Error> {
    if !store.delete_recipe(session.user_id, id).await? {
        return Err(ErrorKind::NotFound.default());
    }

    log::info!("User {} deleted recipe {id}", session.user_id);
    Ok(())
}
