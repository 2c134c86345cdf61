use std::future::Future;

use super::{
    error::Error,
    query::{AttributeFilter, RecipeFilter},
    schema::{
        Attribute, AttributeKind, Id, NewUser, RecipeDetail, RecipeDraft, RecipeSummary, User,
    },
};

/// Persistence seam. Every recipe and attribute operation is scoped by the
/// owning user id; rows of other owners behave as if they didn't exist.
pub trait Store: Send + Sync + 'static {
    /// `None` when the email (compared case-insensitively) is taken
    fn insert_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    /// Case-insensitive lookup
    fn get_user(&self, email: &str) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    fn get_user_by_id(&self, id: Id) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    /// Writes every mutable column of `user`. `None` when the new email is taken.
    fn update_user(&self, user: &User) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    /// Stores `candidate` unless the user already has a token; returns the
    /// token in effect.
    fn get_or_create_token(
        &self,
        user_id: Id,
        candidate: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    fn get_token_user(&self, key: &str) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    /// Ordered by name descending, each row once
    fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Id,
        filter: AttributeFilter,
    ) -> impl Future<Output = Result<Vec<Attribute>, Error>> + Send;

    fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Id,
        name: &str,
    ) -> impl Future<Output = Result<Attribute, Error>> + Send;

    /// The subset of `ids` that exist and belong to `owner`
    fn owned_attribute_ids(
        &self,
        kind: AttributeKind,
        owner: Id,
        ids: &[Id],
    ) -> impl Future<Output = Result<Vec<Id>, Error>> + Send;

    /// Ordered by id descending
    fn list_recipes(
        &self,
        owner: Id,
        filter: &RecipeFilter,
    ) -> impl Future<Output = Result<Vec<RecipeSummary>, Error>> + Send;

    fn get_recipe(
        &self,
        owner: Id,
        id: Id,
    ) -> impl Future<Output = Result<Option<RecipeDetail>, Error>> + Send;

    /// Row and links are written atomically
    fn create_recipe(
        &self,
        owner: Id,
        draft: &RecipeDraft,
        tags: &[Id],
        ingredients: &[Id],
    ) -> impl Future<Output = Result<RecipeSummary, Error>> + Send;

    /// `None` for an association leaves its links untouched, `Some` replaces
    /// them. Applied atomically; `Ok(None)` when the recipe is not found.
    fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        draft: &RecipeDraft,
        tags: Option<&[Id]>,
        ingredients: Option<&[Id]>,
    ) -> impl Future<Output = Result<Option<RecipeSummary>, Error>> + Send;

    fn delete_recipe(&self, owner: Id, id: Id) -> impl Future<Output = Result<bool, Error>> + Send;
}
