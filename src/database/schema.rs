use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub type Id = i32;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub password: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

/// Public face of a user; the password hash never leaves the crate
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

/// Optional columns accepted by `create_user`
#[derive(Debug, Clone, Default)]
pub struct UserExtra {
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Tags and ingredients share one shape and one set of queries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Key under which a recipe payload lists ids of this kind
    pub fn field(&self) -> &'static str {
        self.table()
    }

    pub fn name_max_length(&self) -> usize {
        match self {
            AttributeKind::Tag => crate::TAG_NAME_MAX_LENGTH,
            AttributeKind::Ingredient => crate::INGREDIENT_NAME_MAX_LENGTH,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct Attribute {
    pub id: Id,
    #[serde(skip)]
    pub user_id: Id,
    pub name: String,
}

pub type Tag = Attribute;
pub type Ingredient = Attribute;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
}

/// Mutable scalar fields of a recipe
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
}

/// List representation; associations as ids
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeSummary {
    pub id: Id,
    pub title: String,
    pub tags: Vec<Id>,
    pub ingredients: Vec<Id>,
    pub time_minutes: i32,
    pub price: Decimal,
}

impl RecipeSummary {
    pub fn from_row(recipe: Recipe, tags: Vec<Id>, ingredients: Vec<Id>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            tags,
            ingredients,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
        }
    }
}

/// Detail representation; associations inline
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDetail {
    pub id: Id,
    #[serde(skip)]
    pub user_id: Id,
    pub title: String,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
    pub time_minutes: i32,
    pub price: Decimal,
}

impl RecipeDetail {
    pub fn from_row(recipe: Recipe, tags: Vec<Tag>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: recipe.id,
            user_id: recipe.user_id,
            title: recipe.title,
            tags,
            ingredients,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
        }
    }

    pub fn draft(&self) -> RecipeDraft {
        RecipeDraft {
            title: self.title.to_owned(),
            time_minutes: self.time_minutes,
            price: self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenResponse {
    pub token: String,
}
