use std::{collections::HashMap, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgConnection, Pool, Postgres, QueryBuilder};

use super::{
    error::{Error, QueryError},
    query::{AttributeFilter, RecipeFilter},
    schema::{
        Attribute, AttributeKind, Id, NewUser, Recipe, RecipeDetail, RecipeDraft, RecipeSummary,
        User,
    },
    store::Store,
};

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Retries once per second until the database accepts connections or
    /// `attempts` runs out
    pub async fn connect(url: &str, max_connections: u32, attempts: u32) -> Result<Self, Error> {
        let mut attempt = 1;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => {
                    log::info!("Database is available");
                    return Ok(Self::new(pool));
                }
                Err(e) if attempt < attempts => {
                    log::warn!(
                        "Database not available ({attempt}/{attempts}): {e}; waiting 1 second..."
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => return Err(QueryError::from(e).into()),
            }
        }
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueryError::new(format!("Migration failed: {e}")))?;

        Ok(())
    }

    async fn list_links(
        &self,
        kind: AttributeKind,
        recipe_ids: &[Id],
    ) -> Result<HashMap<Id, Vec<Id>>, Error> {
        let rows: Vec<(Id, Id)> = sqlx::query_as(&format!(
            "SELECT recipe_id, {column} FROM {link} WHERE recipe_id = ANY($1) ORDER BY {column}",
            column = kind.link_column(),
            link = kind.link_table(),
        ))
        .bind(recipe_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        let mut hashmap: HashMap<Id, Vec<Id>> = HashMap::new();
        rows.into_iter()
            .for_each(|(recipe_id, id)| hashmap.entry(recipe_id).or_default().push(id));

        Ok(hashmap)
    }

    async fn list_linked_attributes(
        &self,
        kind: AttributeKind,
        recipe_id: Id,
    ) -> Result<Vec<Attribute>, Error> {
        let rows: Vec<Attribute> = sqlx::query_as(&format!(
            "
            SELECT a.*
            FROM {table} a
            INNER JOIN {link} l ON l.{column} = a.id
            WHERE l.recipe_id = $1
            ORDER BY a.id
        ",
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        ))
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }
}

async fn replace_links(
    conn: &mut PgConnection,
    kind: AttributeKind,
    recipe_id: Id,
    ids: &[Id],
) -> Result<(), Error> {
    sqlx::query(&format!(
        "DELETE FROM {link} WHERE recipe_id = $1",
        link = kind.link_table()
    ))
    .bind(recipe_id)
    .execute(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    if ids.len() > 0 {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {link} (recipe_id, {column}) ",
            link = kind.link_table(),
            column = kind.link_column(),
        ));

        query_builder.push_values(ids.iter().take(65535 / 2), |mut b, id| {
            b.push_bind(recipe_id).push_bind(*id);
        });

        query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

async fn linked_ids(
    conn: &mut PgConnection,
    kind: AttributeKind,
    recipe_id: Id,
) -> Result<Vec<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT {column} FROM {link} WHERE recipe_id = $1 ORDER BY {column}",
        column = kind.link_column(),
        link = kind.link_table(),
    ))
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

fn begin_failed(_e: sqlx::Error) -> QueryError {
    QueryError::new("Could not start transaction".to_owned())
}

fn commit_failed(_e: sqlx::Error) -> QueryError {
    QueryError::new("Could not commit transaction".to_owned())
}

impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as(
            "
            INSERT INTO users (email, password, name, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING RETURNING *;
        ",
        )
        .bind(user.email)
        .bind(user.password)
        .bind(user.name)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn update_user(&self, user: &User) -> Result<Option<User>, Error> {
        let result: Result<Option<User>, sqlx::Error> = sqlx::query_as(
            "
            UPDATE users
            SET email = $2, password = $3, name = $4,
                is_active = $5, is_staff = $6, is_superuser = $7
            WHERE id = $1
            RETURNING *
        ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.name)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(QueryError::from(e).into()),
        }
    }

    async fn get_or_create_token(&self, user_id: Id, candidate: &str) -> Result<String, Error> {
        sqlx::query(
            "INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(candidate)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(QueryError::from)?;

        let token: (String,) = sqlx::query_as("SELECT key FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(token.0)
    }

    async fn get_token_user(&self, key: &str) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as(
            "
            SELECT u.*
            FROM auth_tokens t
            INNER JOIN users u ON u.id = t.user_id
            WHERE t.key = $1
        ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Id,
        filter: AttributeFilter,
    ) -> Result<Vec<Attribute>, Error> {
        let assigned = if filter.assigned_only {
            format!(
                "AND EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = a.id)",
                link = kind.link_table(),
                column = kind.link_column(),
            )
        } else {
            String::new()
        };

        let rows: Vec<Attribute> = sqlx::query_as(&format!(
            "SELECT a.* FROM {table} a WHERE a.user_id = $1 {assigned}
            ORDER BY a.name DESC, a.id DESC",
            table = kind.table(),
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn create_attribute(
        &self,
        kind: AttributeKind,
        owner: Id,
        name: &str,
    ) -> Result<Attribute, Error> {
        let row: Attribute = sqlx::query_as(&format!(
            "INSERT INTO {table} (user_id, name) VALUES ($1, $2) RETURNING *",
            table = kind.table(),
        ))
        .bind(owner)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn owned_attribute_ids(
        &self,
        kind: AttributeKind,
        owner: Id,
        ids: &[Id],
    ) -> Result<Vec<Id>, Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(Id,)> = sqlx::query_as(&format!(
            "SELECT id FROM {table} WHERE user_id = $1 AND id = ANY($2)",
            table = kind.table(),
        ))
        .bind(owner)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn list_recipes(
        &self,
        owner: Id,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeSummary>, Error> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE r.user_id = ");
        query_builder.push_bind(owner);

        for (kind, ids) in [
            (AttributeKind::Tag, &filter.tags),
            (AttributeKind::Ingredient, &filter.ingredients),
        ] {
            if let Some(ids) = ids {
                query_builder.push(format!(
                    " AND EXISTS (SELECT 1 FROM {link} l \
                    WHERE l.recipe_id = r.id AND l.{column} = ANY(",
                    link = kind.link_table(),
                    column = kind.link_column(),
                ));
                query_builder.push_bind(ids.to_owned());
                query_builder.push("))");
            }
        }
        query_builder.push(" ORDER BY r.id DESC");

        let rows: Vec<Recipe> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let recipe_ids: Vec<Id> = rows.iter().map(|recipe| recipe.id).collect();
        let mut tags = self.list_links(AttributeKind::Tag, &recipe_ids).await?;
        let mut ingredients = self.list_links(AttributeKind::Ingredient, &recipe_ids).await?;

        Ok(rows
            .into_iter()
            .map(|recipe| {
                let id = recipe.id;
                RecipeSummary::from_row(
                    recipe,
                    tags.remove(&id).unwrap_or_default(),
                    ingredients.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn get_recipe(&self, owner: Id, id: Id) -> Result<Option<RecipeDetail>, Error> {
        let row: Option<Recipe> =
            sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        let Some(recipe) = row else {
            return Ok(None);
        };

        let tags = self.list_linked_attributes(AttributeKind::Tag, id).await?;
        let ingredients = self
            .list_linked_attributes(AttributeKind::Ingredient, id)
            .await?;

        Ok(Some(RecipeDetail::from_row(recipe, tags, ingredients)))
    }

    async fn create_recipe(
        &self,
        owner: Id,
        draft: &RecipeDraft,
        tags: &[Id],
        ingredients: &[Id],
    ) -> Result<RecipeSummary, Error> {
        let mut tr = self.pool.begin().await.map_err(begin_failed)?;

        let recipe: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (user_id, title, time_minutes, price)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        ",
        )
        .bind(owner)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .fetch_one(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        replace_links(&mut tr, AttributeKind::Tag, recipe.id, tags).await?;
        replace_links(&mut tr, AttributeKind::Ingredient, recipe.id, ingredients).await?;
        let tags = linked_ids(&mut tr, AttributeKind::Tag, recipe.id).await?;
        let ingredients = linked_ids(&mut tr, AttributeKind::Ingredient, recipe.id).await?;

        tr.commit().await.map_err(commit_failed)?;

        Ok(RecipeSummary::from_row(recipe, tags, ingredients))
    }

    async fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        draft: &RecipeDraft,
        tags: Option<&[Id]>,
        ingredients: Option<&[Id]>,
    ) -> Result<Option<RecipeSummary>, Error> {
        let mut tr = self.pool.begin().await.map_err(begin_failed)?;

        let recipe: Option<Recipe> = sqlx::query_as(
            "
            UPDATE recipes
            SET title = $3, time_minutes = $4, price = $5
            WHERE id = $1 AND user_id = $2
            RETURNING *
        ",
        )
        .bind(id)
        .bind(owner)
        .bind(&draft.title)
        .bind(draft.time_minutes)
        .bind(draft.price)
        .fetch_optional(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        // Dropping the transaction rolls it back
        let Some(recipe) = recipe else {
            return Ok(None);
        };

        if let Some(tags) = tags {
            replace_links(&mut tr, AttributeKind::Tag, id, tags).await?;
        }
        if let Some(ingredients) = ingredients {
            replace_links(&mut tr, AttributeKind::Ingredient, id, ingredients).await?;
        }
        let tags = linked_ids(&mut tr, AttributeKind::Tag, id).await?;
        let ingredients = linked_ids(&mut tr, AttributeKind::Ingredient, id).await?;

        tr.commit().await.map_err(commit_failed)?;

        Ok(Some(RecipeSummary::from_row(recipe, tags, ingredients)))
    }

    async fn delete_recipe(&self, owner: Id, id: Id) -> Result<bool, Error> {
        let query = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(query.rows_affected() > 0)
    }
}
