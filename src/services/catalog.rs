use crate::{
    auth::Caller,
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        PaymentMethod, ProductCategory,
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Catalog facts copied into an order when it is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub available_quantity: i32,
    pub minimum_order_quantity: i32,
}

/// Source of product facts for order placement.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fails `NotFound` for unknown products and `ServiceUnavailable` when
    /// the catalog cannot be reached.
    async fn snapshot(&self, product_id: Uuid) -> Result<ProductSnapshot, ServiceError>;
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_stock_bounds", skip_on_field_errors = true))]
pub struct NewProduct {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ProductCategory,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Available quantity cannot be negative"))]
    pub available_quantity: i32,
    #[validate(range(min = 1, message = "Minimum order quantity must be at least 1"))]
    pub minimum_order_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
    pub demo_video_link: Option<String>,
    #[serde(default)]
    pub payment_options: Vec<PaymentMethod>,
    #[serde(default)]
    pub show_on_home: bool,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must be greater than 0".into());
        Err(err)
    }
}

fn validate_stock_bounds(product: &NewProduct) -> Result<(), ValidationError> {
    if product.minimum_order_quantity > product.available_quantity {
        let mut err = ValidationError::new("minimum_order_quantity");
        err.message = Some("Minimum order quantity cannot exceed available quantity".into());
        return Err(err);
    }
    Ok(())
}

/// Products table access. Implements [`Catalog`] for order placement.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn create_product(
        &self,
        caller: &Caller,
        request: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        caller.ensure_active()?;
        caller.require_staff()?;
        request.validate()?;

        let now = Utc::now();
        let payment_options = if request.payment_options.is_empty() {
            vec![PaymentMethod::CashOnDelivery]
        } else {
            request.payment_options
        };

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            category: Set(request.category),
            price: Set(request.price.round_dp(2)),
            available_quantity: Set(request.available_quantity),
            minimum_order_quantity: Set(request.minimum_order_quantity),
            images: Set(serde_json::to_value(&request.images)?),
            demo_video_link: Set(request.demo_video_link),
            payment_options: Set(serde_json::to_value(&payment_options)?),
            show_on_home: Set(request.show_on_home),
            created_by: Set(caller.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %model.id, "Product created");
        Ok(model)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    pub async fn list_products(
        &self,
        category: Option<ProductCategory>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = Product::find().order_by_desc(product::Column::CreatedAt);
        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }
        Ok(query.all(&*self.db_pool).await?)
    }
}

#[async_trait]
impl Catalog for CatalogService {
    async fn snapshot(&self, product_id: Uuid) -> Result<ProductSnapshot, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Catalog lookup failed");
                ServiceError::ServiceUnavailable("Product catalog is unavailable".to_string())
            })?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        Ok(ProductSnapshot {
            product_id: product.id,
            title: product.name,
            price: product.price,
            available_quantity: product.available_quantity,
            minimum_order_quantity: product.minimum_order_quantity,
        })
    }
}
