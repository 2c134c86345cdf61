use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::Utc;

use super::{
    error::Error,
    query::{AttributeFilter, RecipeFilter},
    schema::{
        Attribute, AttributeKind, Id, NewUser, Recipe, RecipeDetail, RecipeDraft, RecipeSummary,
        User,
    },
    store::Store,
};

struct Table<T> {
    rows: BTreeMap<Id, T>,
    last_id: Id,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, row: impl FnOnce(Id) -> T) -> T {
        self.last_id += 1;
        let row = row(self.last_id);
        self.rows.insert(self.last_id, row.clone());
        row
    }
}

#[derive(Default)]
struct State {
    users: Table<User>,
    /// key -> user id
    tokens: HashMap<String, Id>,
    tags: Table<Attribute>,
    ingredients: Table<Attribute>,
    recipes: Table<Recipe>,
    /// (recipe id, tag id)
    recipe_tags: BTreeSet<(Id, Id)>,
    /// (recipe id, ingredient id)
    recipe_ingredients: BTreeSet<(Id, Id)>,
}

impl State {
    fn attributes(&self, kind: AttributeKind) -> &Table<Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attributes_mut(&mut self, kind: AttributeKind) -> &mut Table<Attribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn links(&self, kind: AttributeKind) -> &BTreeSet<(Id, Id)> {
        match kind {
            AttributeKind::Tag => &self.recipe_tags,
            AttributeKind::Ingredient => &self.recipe_ingredients,
        }
    }

    fn links_mut(&mut self, kind: AttributeKind) -> &mut BTreeSet<(Id, Id)> {
        match kind {
            AttributeKind::Tag => &mut self.recipe_tags,
            AttributeKind::Ingredient => &mut self.recipe_ingredients,
        }
    }

    fn email_taken(&self, email: &str, except: Option<Id>) -> bool {
        let email = email.to_lowercase();
        self.users
            .rows
            .values()
            .any(|user| Some(user.id) != except && user.email.to_lowercase() == email)
    }

    /// Ascending, the way the link tables are read back
    fn linked_ids(&self, kind: AttributeKind, recipe_id: Id) -> Vec<Id> {
        self.links(kind)
            .range((recipe_id, Id::MIN)..=(recipe_id, Id::MAX))
            .map(|(_, id)| *id)
            .collect()
    }

    fn replace_links(&mut self, kind: AttributeKind, recipe_id: Id, ids: &[Id]) {
        let links = self.links_mut(kind);
        links.retain(|(recipe, _)| *recipe != recipe_id);
        links.extend(ids.iter().map(|id| (recipe_id, *id)));
    }

    fn summary(&self, recipe: &Recipe) -> RecipeSummary {
        RecipeSummary::from_row(
            recipe.clone(),
            self.linked_ids(AttributeKind::Tag, recipe.id),
            self.linked_ids(AttributeKind::Ingredient, recipe.id),
        )
    }
}

/// Process-local store with the same semantics as the Postgres one. Each
/// operation holds the lock for its whole duration, so multi-row writes are
/// atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("MemoryStore lock poisoned on read; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("MemoryStore lock poisoned on write; recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<Option<User>, Error> {
        let mut state = self.write();
        if state.email_taken(&user.email, None) {
            return Ok(None);
        }

        Ok(Some(state.users.insert_with(|id| User {
            id,
            email: user.email,
            password: user.password,
            name: user.name,
            is_active: true,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            date_joined: Utc::now(),
        })))
    }

    /// Folds case the way `LOWER()` does, not only ASCII
    async fn get_user(&self, email: &str) -> Result<Option<User>, Error> {
        let email = email.to_lowercase();
        Ok(self
            .read()
            .users
            .rows
            .values()
            .find(|user| user.email.to_lowercase() == email)
            .cloned())
    }

    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        Ok(self.read().users.rows.get(&id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, Error> {
        let mut state = self.write();
        if state.email_taken(&user.email, Some(user.id)) {
            return Ok(None);
        }

        match state.users.rows.get_mut(&user.id) {
            Some(row) => {
                row.email = user.email.to_owned();
                row.password = user.password.to_owned();
                row.name = user.name.to_owned();
                row.is_active = user.is_active;
                row.is_staff = user.is_staff;
                row.is_superuser = user.is_superuser;
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_or_create_token(&self, user_id: Id, candidate: &str) -> Result<String, Error> {
        let mut state = self.write();
        if let Some((key, _)) = state.tokens.iter().find(|(_, owner)| **owner == user_id) {
            return Ok(key.to_owned());
        }

        state.tokens.insert(candidate.to_string(), user_id);
        Ok(candidate.to_string())
    }

    async fn get_token_user(&self, key: &str) -> Result<Option<User>, Error> {
        let state = self.read();
        Ok(state
            .tokens
            .get(key)
            .and_then(|user_id| state.users.rows.get(user_id))
            .cloned())
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Id,
        filter: AttributeFilter,
    ) -> Result<Vec<Attribute>, Error> {
        let state = self.read();
        let assigned: BTreeSet<Id> = state.links(kind).iter().map(|(_, id)| *id).collect();

        let mut rows: Vec<Attribute> = state
            .attributes(kind)
            .rows
            .values()
            .filter(|row| row.user_id == owner)
            .filter(|row| !filter.assigned_only || assigned.contains(&row.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.name.cmp(&a.name).then(b.id.cmp(&a.id)));

        Ok(rows)
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Id,
        name: &str,
    ) -> Result<Attribute, Error> {
        Ok(self.write().attributes_mut(kind).insert_with(|id| Attribute {
            id,
            user_id: owner,
            name: name.to_string(),
        }))
    }

    async fn owned_attribute_ids(
        &self,
        kind: AttributeKind,
        owner: Id,
        ids: &[Id],
    ) -> Result<Vec<Id>, Error> {
        let state = self.read();
        let table = state.attributes(kind);

        Ok(ids
            .iter()
            .filter(|id| table.rows.get(*id).is_some_and(|row| row.user_id == owner))
            .copied()
            .collect())
    }

    async fn list_recipes(
        &self,
        owner: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeSummary>, Error> {
        let state = self.read();

        Ok(state
            .recipes
            .rows
            .values()
            .rev()
            .filter(|recipe| recipe.user_id == owner)
            .map(|recipe| state.summary(recipe))
            .filter(|summary| filter.matches(&summary.tags, &summary.ingredients))
            .collect())
    }

    async fn get_recipe(&self, owner: Id, id: Id) -> Result<Option<RecipeDetail>, Error> {
        let state = self.read();
        let Some(recipe) = state.recipes.rows.get(&id).filter(|r| r.user_id == owner) else {
            return Ok(None);
        };

        let linked = |kind: AttributeKind| -> Vec<Attribute> {
            state
                .linked_ids(kind, id)
                .iter()
                .filter_map(|attribute_id| state.attributes(kind).rows.get(attribute_id).cloned())
                .collect()
        };

        Ok(Some(RecipeDetail::from_row(
            recipe.clone(),
            linked(AttributeKind::Tag),
            linked(AttributeKind::Ingredient),
        )))
    }

    async fn create_recipe(
        &self,
        owner: Id,
        draft: &RecipeDraft,
        tags: &[Id],
        ingredients: &[Id],
    ) -> Result<RecipeSummary, Error> {
        let mut state = self.write();
        let recipe = state.recipes.insert_with(|id| Recipe {
            id,
            user_id: owner,
            title: draft.title.to_owned(),
            time_minutes: draft.time_minutes,
            price: draft.price,
        });
        state.replace_links(AttributeKind::Tag, recipe.id, tags);
        state.replace_links(AttributeKind::Ingredient, recipe.id, ingredients);

        Ok(state.summary(&recipe))
    }

    async fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        draft: &RecipeDraft,
        tags: Option<&[Id]>,
        ingredients: Option<&[Id]>,
    ) -> Result<Option<RecipeSummary>, Error> {
        let mut state = self.write();
        let recipe = match state.recipes.rows.get_mut(&id) {
            Some(recipe) if recipe.user_id == owner => {
                recipe.title = draft.title.to_owned();
                recipe.time_minutes = draft.time_minutes;
                recipe.price = draft.price;
                recipe.clone()
            }
            _ => return Ok(None),
        };

        if let Some(tags) = tags {
            state.replace_links(AttributeKind::Tag, id, tags);
        }
        if let Some(ingredients) = ingredients {
            state.replace_links(AttributeKind::Ingredient, id, ingredients);
        }

        Ok(Some(state.summary(&recipe)))
    }

    async fn delete_recipe(&self, owner: Id, id: Id) -> Result<bool, Error> {
        let mut state = self.write();
        let owned = state
            .recipes
            .rows
            .get(&id)
            .is_some_and(|recipe| recipe.user_id == owner);
        if !owned {
            return Ok(false);
        }

        state.recipes.rows.remove(&id);
        state.replace_links(AttributeKind::Tag, id, &[]);
        state.replace_links(AttributeKind::Ingredient, id, &[]);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn draft(title: &str) -> RecipeDraft {
        RecipeDraft {
            title: title.to_string(),
            time_minutes: 12,
            price: Decimal::new(1200, 2),
        }
    }

    #[tokio::test]
    async fn emails_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        let user = NewUser {
            email: "salman@gmail.com".to_string(),
            password: "hash".to_string(),
            name: String::new(),
            is_staff: false,
            is_superuser: false,
        };

        assert!(store.insert_user(user.clone()).await.unwrap().is_some());
        let shouting = NewUser {
            email: "SALMAN@gmail.com".to_string(),
            ..user
        };
        assert!(store.insert_user(shouting).await.unwrap().is_none());
        assert!(store.get_user("Salman@Gmail.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn emails_fold_non_ascii_case() {
        let store = MemoryStore::new();
        let user = NewUser {
            email: "ÉLÈVE@gmail.com".to_string(),
            password: "hash".to_string(),
            name: String::new(),
            is_staff: false,
            is_superuser: false,
        };

        assert!(store.insert_user(user.clone()).await.unwrap().is_some());
        let lowered = NewUser {
            email: "élève@gmail.com".to_string(),
            ..user
        };
        assert!(store.insert_user(lowered).await.unwrap().is_none());
        assert!(store.get_user("Élève@gmail.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn assigned_only_counts_links_once() {
        let store = MemoryStore::new();
        let tag = store.create_attribute(AttributeKind::Tag, 1, "Vegan").await.unwrap();
        store.create_attribute(AttributeKind::Tag, 1, "Dessert").await.unwrap();
        store.create_recipe(1, &draft("a"), &[tag.id], &[]).await.unwrap();
        store.create_recipe(1, &draft("b"), &[tag.id], &[]).await.unwrap();

        let filter = AttributeFilter { assigned_only: true };
        let rows = store.list_attributes(AttributeKind::Tag, 1, filter).await.unwrap();

        assert_eq!(rows, vec![tag]);
    }

    #[tokio::test]
    async fn delete_drops_links_but_keeps_attributes() {
        let store = MemoryStore::new();
        let tag = store.create_attribute(AttributeKind::Tag, 1, "Vegan").await.unwrap();
        let recipe = store.create_recipe(1, &draft("a"), &[tag.id], &[]).await.unwrap();

        assert!(!store.delete_recipe(2, recipe.id).await.unwrap());
        assert!(store.delete_recipe(1, recipe.id).await.unwrap());
        assert!(store.get_recipe(1, recipe.id).await.unwrap().is_none());

        let filter = AttributeFilter { assigned_only: true };
        assert!(store.list_attributes(AttributeKind::Tag, 1, filter).await.unwrap().is_empty());
        assert_eq!(
            store.list_attributes(AttributeKind::Tag, 1, AttributeFilter::default()).await.unwrap(),
            vec![tag]
        );
    }

    #[tokio::test]
    async fn update_without_links_keeps_them() {
        let store = MemoryStore::new();
        let tag = store.create_attribute(AttributeKind::Tag, 1, "Vegan").await.unwrap();
        let recipe = store.create_recipe(1, &draft("a"), &[tag.id], &[]).await.unwrap();

        let kept = store
            .update_recipe(1, recipe.id, &draft("b"), None, Some(&[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.title, "b");
        assert_eq!(kept.tags, vec![tag.id]);

        let cleared = store
            .update_recipe(1, recipe.id, &draft("c"), Some(&[]), None)
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.tags.is_empty());

        assert!(store
            .update_recipe(2, recipe.id, &draft("d"), None, None)
            .await
            .unwrap()
            .is_none());
    }
}
