use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::created_response;
use crate::{
    auth::Caller,
    entities::{product, PaymentMethod, ProductCategory},
    errors::ServiceError,
    services::catalog::NewProduct,
    ApiResponse, ApiResult, AppState,
};

pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub available_quantity: i32,
    pub minimum_order_quantity: i32,
    pub images: Vec<String>,
    pub demo_video_link: Option<String>,
    pub payment_options: Vec<PaymentMethod>,
    pub show_on_home: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<product::Model> for ProductView {
    fn from(m: product::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            category: m.category,
            price: m.price,
            available_quantity: m.available_quantity,
            minimum_order_quantity: m.minimum_order_quantity,
            images: serde_json::from_value(m.images).unwrap_or_default(),
            demo_video_link: m.demo_video_link,
            payment_options: serde_json::from_value(m.payment_options).unwrap_or_default(),
            show_on_home: m.show_on_home,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductQuery {
    pub category: Option<ProductCategory>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Catalog products, newest first", body = ApiResponse<Vec<ProductView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<ProductView>> {
    let products = state.services.catalog.list_products(query.category).await?;
    Ok(Json(ApiResponse::success(
        products.into_iter().map(ProductView::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductView>),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<NewProduct>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.create_product(&caller, request).await?;
    Ok(created_response(ProductView::from(product)))
}
