use crate::{
    db::DbPool,
    entities::{
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        production_item::{self, Entity as ProductionItemEntity},
    },
    errors::ServiceError,
    services::validate_amount,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

static SKU_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("SKU pattern compiles"));

pub(crate) fn validate_sku(sku: &str) -> Result<(), ValidationError> {
    if SKU_RE.is_match(sku) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_sku"))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_sku")]
    pub sku: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub unit: String,
    #[validate(custom = "validate_amount")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub cost: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom = "validate_sku")]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    #[validate(custom = "validate_amount")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_amount")]
    pub cost: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
}

/// Accepted image formats: (mime type, extension, magic bytes)
const IMAGE_FORMATS: [(&str, &str, &[u8]); 3] = [
    ("image/png", "png", b"\x89PNG\r\n\x1a\n"),
    ("image/jpeg", "jpg", b"\xff\xd8\xff"),
    ("image/webp", "webp", b"RIFF"),
];

/// Extension for an upload, checked against both the declared type and the content
pub fn image_extension(content_type: &str, bytes: &[u8]) -> Result<&'static str, ServiceError> {
    let (_, ext, magic) = IMAGE_FORMATS
        .iter()
        .find(|(mime, _, _)| mime.eq_ignore_ascii_case(content_type))
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Unsupported image type '{}'; use PNG, JPEG or WebP",
                content_type
            ))
        })?;
    let is_webp = *ext == "webp" && bytes.len() >= 12 && &bytes[8..12] == b"WEBP";
    if !bytes.starts_with(magic) || (*ext == "webp" && !is_webp) {
        return Err(ServiceError::ValidationError(
            "File content does not match its declared image type".to_string(),
        ));
    }
    Ok(ext)
}

#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    uploads_dir: PathBuf,
    max_upload_bytes: usize,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, uploads_dir: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            db_pool,
            uploads_dir: uploads_dir.into(),
            max_upload_bytes,
        }
    }

    async fn ensure_unique_sku(&self, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db_pool).await?.is_some() {
            return Err(ServiceError::Conflict(format!("SKU '{}' is already in use", sku)));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<product::Model, ServiceError> {
        request.validate()?;
        self.ensure_unique_sku(&request.sku, None).await?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            sku: Set(request.sku),
            category: Set(request.category),
            description: Set(request.description),
            unit: Set(request.unit),
            price: Set(request.price),
            cost: Set(request.cost),
            is_active: Set(request.is_active),
            image_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(product_id = %model.id, "Product created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = ProductEntity::find();
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(product::Column::Sku.contains(term)),
            );
        }
        if let Some(category) = &filter.category {
            query = query.filter(product::Column::Category.eq(category.as_str()));
        }
        if let Some(active) = filter.active {
            query = query.filter(product::Column::IsActive.eq(active));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Distinct categories in use
    pub async fn categories(&self) -> Result<Vec<String>, ServiceError> {
        let mut categories: Vec<String> = ProductEntity::find()
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|p| p.category)
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    #[instrument(skip(self, request), fields(product_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if let Some(sku) = &request.sku {
            self.ensure_unique_sku(sku, Some(id)).await?;
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(sku) = request.sku {
            active.sku = Set(sku);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(cost) = request.cost {
            active.cost = Set(cost);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await?;
        info!("Product updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let db = &*self.db_pool;

        let ordered = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(db)
            .await?;
        let scheduled = ProductionItemEntity::find()
            .filter(production_item::Column::ProductId.eq(id))
            .count(db)
            .await?;
        if ordered > 0 || scheduled > 0 {
            return Err(ServiceError::Conflict(
                "Product is referenced by orders or production; deactivate it instead".to_string(),
            ));
        }

        ProductEntity::delete_by_id(id).exec(db).await?;
        if let Some(path) = existing.image_path {
            if let Err(e) = tokio::fs::remove_file(self.uploads_dir.join(&path)).await {
                warn!(error = %e, path, "Could not remove product image");
            }
        }
        info!("Product deleted");
        Ok(())
    }

    /// Store an uploaded image under `products/` named by its content hash
    #[instrument(skip(self, bytes), fields(product_id = %id, size = bytes.len()))]
    pub async fn store_image(
        &self,
        id: Uuid,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<product::Model, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::ValidationError("Empty upload".to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::PayloadTooLarge(format!(
                "Images are limited to {} bytes",
                self.max_upload_bytes
            )));
        }
        let ext = image_extension(content_type, bytes)?;
        let existing = self.get(id).await?;

        let digest = hex::encode(Sha256::digest(bytes));
        let relative = format!("products/{}.{}", &digest[..32], ext);
        let dir = self.uploads_dir.join("products");
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.uploads_dir.join(&relative), bytes).await?;

        let mut active: product::ActiveModel = existing.into();
        active.image_path = Set(Some(relative));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db_pool).await?;

        metrics::counter!("bakery_product_images_uploaded", 1);
        info!(image = ?updated.image_path, "Product image stored");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("CROISSANT-01", true)]
    #[case("bread_white", true)]
    #[case("-leading-dash", false)]
    #[case("has space", false)]
    #[case("", false)]
    fn sku_format(#[case] sku: &str, #[case] ok: bool) {
        assert_eq!(validate_sku(sku).is_ok(), ok);
    }

    #[test]
    fn png_magic_is_checked() {
        let png = b"\x89PNG\r\n\x1a\n rest of file";
        assert_eq!(image_extension("image/png", png).unwrap(), "png");
        assert_matches!(
            image_extension("image/png", b"GIF89a"),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn webp_needs_riff_and_webp_tag() {
        let webp = b"RIFF\x00\x00\x00\x00WEBPVP8 ";
        assert_eq!(image_extension("image/webp", webp).unwrap(), "webp");
        assert!(image_extension("image/webp", b"RIFF\x00\x00\x00\x00WAVE").is_err());
    }

    #[test]
    fn unsupported_type_rejected() {
        assert_matches!(
            image_extension("image/gif", b"GIF89a"),
            Err(ServiceError::ValidationError(_))
        );
    }
}
