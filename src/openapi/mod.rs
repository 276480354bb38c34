use axum::{response::Json, routing::get, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GarmentFlow API",
        version = "1.0.0",
        description = r#"
# GarmentFlow Order API

Order placement, approval and production tracking for made-to-order garments.

## Authentication

Every endpoint under `/api/v1` expects a bearer JWT:

```
Authorization: Bearer <token>
```

## Errors

Failures share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Cannot transition order from Delivered to Cancelled",
  "request_id": "3f0c…",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

## Pagination

`GET /api/v1/orders` takes `skip` (default 0) and `limit` (default 10, capped at 100).
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement and lifecycle"),
        (name = "Tracking", description = "Production and delivery checkpoints"),
        (name = "Analytics", description = "Revenue, status and product reporting"),
        (name = "Dashboard", description = "Role-specific counters"),
        (name = "Exports", description = "CSV and JSON exports"),
        (name = "Products", description = "Catalog"),
        (name = "Users", description = "Account administration")
    ),
    paths(
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::approve_order,
        crate::handlers::orders::reject_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::transition_order,

        crate::handlers::tracking::get_tracking,
        crate::handlers::tracking::update_tracking,

        crate::handlers::analytics::get_revenue,
        crate::handlers::analytics::get_order_status,
        crate::handlers::analytics::get_popular_products,
        crate::handlers::analytics::get_manager_performance,
        crate::handlers::analytics::get_report,

        crate::handlers::dashboard::get_stats,
        crate::handlers::dashboard::get_activity,

        crate::handlers::exports::export_orders,
        crate::handlers::exports::export_products,
        crate::handlers::exports::export_user_data,

        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,

        crate::handlers::users::register_user,
        crate::handlers::users::list_users,
        crate::handlers::users::approve_user,
        crate::handlers::users::suspend_user,
    ),
    components(
        schemas(
            crate::entities::OrderStatus,
            crate::entities::PaymentMethod,
            crate::entities::ProductCategory,
            crate::entities::UserRole,
            crate::entities::AccountStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
