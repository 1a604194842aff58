use std::{borrow::Cow, time::Duration};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    types::Json,
    Connection, Executor, PgPool,
};
use uuid::Uuid;

use crate::models::{Business, NewBusiness, NewReview, OwnerResponse, Review};

const BUSINESS_COLUMNS: &str = "id, owner_id, name, description, category, street, city, state, \
     zip_code, country, longitude, latitude, phone, email, website, hours, images, rating, \
     review_count, is_active, featured, created_at";

const REVIEW_COLUMNS: &str =
    "id, business_id, author_id, rating, title, comment, response, is_verified, helpful, \
     created_at";

/// Filters applied to the public business listing.
#[derive(Debug, Default)]
pub struct BusinessFilter<'a> {
    pub category: Option<&'a str>,
    pub city: Option<&'a str>,
    pub search: Option<&'a str>,
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = match Self::pool_options().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;

                Self::pool_options().connect(database_url).await?
            }
            Err(err) => return Err(err),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .test_before_acquire(true)
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    pub async fn create_business(&self, business: NewBusiness) -> Result<Business, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO businesses (
                id, owner_id, name, description, category, street, city, state,
                zip_code, country, longitude, latitude, phone, email, website,
                hours, images, is_active, featured, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            RETURNING {BUSINESS_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, Business>(&query)
            .bind(business.id)
            .bind(business.owner_id)
            .bind(business.name)
            .bind(business.description)
            .bind(business.category)
            .bind(business.address.street)
            .bind(business.address.city)
            .bind(business.address.state)
            .bind(business.address.zip_code)
            .bind(business.address.country)
            .bind(business.location.longitude)
            .bind(business.location.latitude)
            .bind(business.contact.phone)
            .bind(business.contact.email)
            .bind(business.contact.website)
            .bind(business.hours)
            .bind(business.images)
            .bind(business.is_active)
            .bind(business.featured)
            .bind(business.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>, sqlx::Error> {
        let query = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1");

        sqlx::query_as::<_, Business>(&query)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Public listing page. Only active businesses; filters and sort are
    /// resolved by the caller from the query string.
    pub async fn list_businesses(
        &self,
        filter: &BusinessFilter<'_>,
        order_clause: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Business>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {BUSINESS_COLUMNS}
            FROM businesses
            WHERE is_active = TRUE
              AND ($1::text IS NULL OR category::text = $1)
              AND ($2::text IS NULL OR city ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL
                   OR name ILIKE '%' || $3 || '%'
                   OR description ILIKE '%' || $3 || '%')
            ORDER BY {order_clause}
            LIMIT $4 OFFSET $5
            "#
        );

        sqlx::query_as::<_, Business>(&query)
            .bind(filter.category)
            .bind(filter.city)
            .bind(filter.search)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_businesses(
        &self,
        filter: &BusinessFilter<'_>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM businesses
            WHERE is_active = TRUE
              AND ($1::text IS NULL OR category::text = $1)
              AND ($2::text IS NULL OR city ILIKE '%' || $2 || '%')
              AND ($3::text IS NULL
                   OR name ILIKE '%' || $3 || '%'
                   OR description ILIKE '%' || $3 || '%')
            "#,
        )
        .bind(filter.category)
        .bind(filter.city)
        .bind(filter.search)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_businesses_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<Business>, sqlx::Error> {
        let query = format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE owner_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Business>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Full-row update. The denormalized rating columns are deliberately
    /// absent from the SET list; only the recompute writes them.
    pub async fn update_business(&self, business: Business) -> Result<Business, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE businesses
            SET name = $2, description = $3, category = $4, street = $5, city = $6,
                state = $7, zip_code = $8, country = $9, longitude = $10, latitude = $11,
                phone = $12, email = $13, website = $14, hours = $15, images = $16,
                is_active = $17, featured = $18
            WHERE id = $1
            RETURNING {BUSINESS_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Business>(&query)
            .bind(business.id)
            .bind(business.name)
            .bind(business.description)
            .bind(business.category)
            .bind(business.address.street)
            .bind(business.address.city)
            .bind(business.address.state)
            .bind(business.address.zip_code)
            .bind(business.address.country)
            .bind(business.location.longitude)
            .bind(business.location.latitude)
            .bind(business.contact.phone)
            .bind(business.contact.email)
            .bind(business.contact.website)
            .bind(business.hours)
            .bind(business.images)
            .bind(business.is_active)
            .bind(business.featured)
            .fetch_one(&self.pool)
            .await
    }

    /// Removes a business together with its reviews in one transaction, so
    /// no review row is left referencing a dead business.
    pub async fn delete_business(&self, business_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM reviews WHERE business_id = $1")
            .bind(business_id)
            .execute(tx.as_mut())
            .await?;

        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(business_id)
            .execute(tx.as_mut())
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    /// Inserts a review. A second review by the same author for the same
    /// business trips the (business_id, author_id) unique constraint; the
    /// caller maps that to a duplicate error.
    pub async fn create_review(&self, review: NewReview) -> Result<Review, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO reviews (id, business_id, author_id, rating, title, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REVIEW_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(review.id)
            .bind(review.business_id)
            .bind(review.author_id)
            .bind(review.rating)
            .bind(review.title)
            .bind(review.comment)
            .bind(review.created_at)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, sqlx::Error> {
        let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");

        sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_reviews(
        &self,
        business_id: Uuid,
        order_clause: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews
            WHERE business_id = $1
            ORDER BY {order_clause}
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(business_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count_reviews(&self, business_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn update_review(
        &self,
        review_id: Uuid,
        rating: i32,
        title: String,
        comment: String,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE reviews
            SET rating = $2, title = $3, comment = $4
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .bind(rating)
            .bind(title)
            .bind(comment)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn set_review_response(
        &self,
        review_id: Uuid,
        response: OwnerResponse,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            "UPDATE reviews SET response = $2 WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .bind(Json(response))
            .fetch_one(&self.pool)
            .await
    }

    /// Repeatable by design; there is no per-identity uniqueness on the
    /// helpful counter.
    pub async fn increment_review_helpful(&self, review_id: Uuid) -> Result<Review, sqlx::Error> {
        let query = format!(
            "UPDATE reviews SET helpful = helpful + 1 WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );

        sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn delete_review(&self, review_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    // ========================================================================
    // RATING AGGREGATOR
    // ========================================================================

    /// Re-derives a business's rating summary from the full set of its
    /// reviews and persists it. Idempotent and order-independent: concurrent
    /// recomputes converge because each one re-scans the whole set instead
    /// of maintaining a running average.
    pub async fn recompute_business_rating(&self, business_id: Uuid) -> Result<(), sqlx::Error> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::float8, COUNT(*) FROM reviews WHERE business_id = $1",
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        let (rating, review_count) = resolve_aggregate(average, count);

        sqlx::query("UPDATE businesses SET rating = $2, review_count = $3 WHERE id = $1")
            .bind(business_id)
            .bind(rating)
            .bind(review_count)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Rounds a mean rating half-up at the tenths digit.
fn round_rating(mean: f64) -> f64 {
    (mean * 10.0).round() / 10.0
}

/// Maps the aggregate query output to the persisted summary pair; an empty
/// review set resets the summary to 0.0 / 0.
fn resolve_aggregate(average: Option<f64>, count: i64) -> (f64, i32) {
    match average {
        Some(mean) if count > 0 => (round_rating(mean), count as i32),
        _ => (0.0, 0),
    }
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    // If we're already targeting the default maintenance database, nothing to do.
    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");

    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
