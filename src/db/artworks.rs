//! Artwork metadata operations: insert on successful generation, paginated
//! gallery reads.

use crate::error::{Error, Result};
use crate::model::{Artwork, GalleryPage};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use uuid::Uuid;

/// Fields for a new artwork row. The worker pool is the sole writer.
#[derive(Debug, Clone)]
pub struct NewArtwork {
    pub name: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub satellite_name: String,
    pub image_url: String,
}

impl super::Db {
    /// Persist a completed generation. Exactly one row per successfully
    /// processed request; rows are never mutated afterwards.
    pub async fn insert_artwork(&self, new: NewArtwork) -> Result<Artwork> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO artworks (id, name, prompt, negative_prompt, satellite_name, image_url, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.prompt)
        .bind(&new.negative_prompt)
        .bind(&new.satellite_name)
        .bind(&new.image_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        metrics::artworks_created().add(
            1,
            &[KeyValue::new("satellite", new.satellite_name.clone())],
        );

        Ok(Artwork {
            id,
            name: new.name,
            prompt: new.prompt,
            negative_prompt: new.negative_prompt,
            satellite_name: new.satellite_name,
            image_url: new.image_url,
            created_at: now,
        })
    }

    /// Get a single artwork by ID.
    pub async fn get_artwork(&self, id: Uuid) -> Result<Artwork> {
        let row: Option<ArtworkRow> = sqlx::query_as(
            "SELECT id, name, prompt, negative_prompt, satellite_name, image_url, created_at
             FROM artworks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArtworkRow::into_artwork)
            .ok_or_else(|| Error::NotFound(format!("artwork {id}")))
    }

    /// Paginated gallery read, newest first, optionally filtered by
    /// satellite name. Pages are 1-based.
    pub async fn list_artworks(
        &self,
        page: i64,
        limit: i64,
        satellite_name: Option<&str>,
    ) -> Result<GalleryPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let total: (i64,) = sqlx::query_as(
            "SELECT count(*) FROM artworks WHERE ($1::text IS NULL OR satellite_name = $1)",
        )
        .bind(satellite_name)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<ArtworkRow> = sqlx::query_as(
            "SELECT id, name, prompt, negative_prompt, satellite_name, image_url, created_at
             FROM artworks
             WHERE ($1::text IS NULL OR satellite_name = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(satellite_name)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_artworks = total.0;
        Ok(GalleryPage {
            artworks: rows.into_iter().map(ArtworkRow::into_artwork).collect(),
            current_page: page,
            total_pages: (total_artworks + limit - 1) / limit,
            total_artworks,
        })
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ArtworkRow {
    id: Uuid,
    name: String,
    prompt: String,
    negative_prompt: String,
    satellite_name: String,
    image_url: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ArtworkRow {
    fn into_artwork(self) -> Artwork {
        Artwork {
            id: self.id,
            name: self.name,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            satellite_name: self.satellite_name,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }
}
