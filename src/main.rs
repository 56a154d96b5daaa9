//! CityCart - Hyperlocal Grocery Storefront Service

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post, put, delete}, Json, Router};
use chrono::Utc;
use citycart::cart::CheckoutQuote;
use citycart::catalog::{CatalogService, NewProduct};
use citycart::config::Config;
use citycart::coupons::{self, AppliedCoupon};
use citycart::error::Error;
use citycart::geo::CityService;
use citycart::models::{City, Coupon, CustomerInfo, GlobalSettings, Order, OrderStatus, Product, StoreEvent};
use citycart::notify::Notifier;
use citycart::orders::{OrderService, PlaceOrder, RequestedItem};
use citycart::store::{Document, FileStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub catalog: CatalogService,
    pub cities: CityService,
    pub orders: OrderService,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;
    let nats = match &config.nats_url {
        Some(url) => async_nats::connect(url).await.ok(),
        None => None,
    };
    let store = Arc::new(FileStore::new(&config.data_dir));
    let state = AppState {
        catalog: CatalogService::new(store.clone()),
        cities: CityService::new(store.clone()),
        orders: OrderService::new(store.clone(), Notifier::new(nats)),
        store,
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "citycart"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/products/:id/related", get(related_products))
        .route("/api/v1/recommendations/cart", post(cart_recommendations))
        .route("/api/v1/cities", get(list_cities))
        .route("/api/v1/cities/nearest", get(nearest_city))
        .route("/api/v1/events/active", get(active_events))
        .route("/api/v1/orders", get(list_orders).post(place_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/checkout/quote", post(checkout_quote))
        .route("/api/v1/settings", get(get_settings))
        .route("/api/v1/admin/products", post(admin_create_product))
        .route("/api/v1/admin/products/:id", put(admin_update_product).delete(admin_delete_product))
        .route("/api/v1/admin/inventory", put(admin_set_inventory))
        .route("/api/v1/admin/cities", post(admin_create_city))
        .route("/api/v1/admin/coupons", post(admin_create_coupon))
        .route("/api/v1/admin/coupons/:code", delete(admin_delete_coupon))
        .route("/api/v1/admin/settings", put(admin_update_settings))
        .route("/api/v1/admin/orders/:id/status", put(admin_transition_order))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    tracing::info!("🛒 CityCart listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

fn validated<T: Validate>(value: &T) -> Result<(), Error> {
    value.validate().map_err(|e| Error::Validation(e.to_string()))
}

/// Admin endpoints compare the `x-admin-key` header against the plaintext
/// settings password. Not production-grade, same as the store it guards.
async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Error> {
    let settings: GlobalSettings = state.store.read(Document::Settings).await?;
    let supplied = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
    if supplied != Some(settings.admin_password.as_str()) {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CityParam { pub city: Option<String> }

async fn list_products(State(s): State<AppState>, Query(p): Query<CityParam>) -> Result<Json<Vec<Product>>, Error> {
    Ok(Json(s.catalog.list_products(p.city.as_deref()).await?))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>, Query(p): Query<CityParam>) -> Result<Json<Product>, Error> {
    Ok(Json(s.catalog.get_product(&id, p.city.as_deref()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedParams { pub city: Option<String>, pub limit: Option<usize> }

async fn related_products(State(s): State<AppState>, Path(id): Path<String>, Query(p): Query<RelatedParams>) -> Result<Json<Vec<Product>>, Error> {
    let catalog = s.catalog.list_products(p.city.as_deref()).await?;
    let seed = catalog.iter().find(|prod| prod.id == id).ok_or_else(|| Error::NotFound(format!("product {id}")))?;
    let related = citycart::recommend::related_products(seed, &catalog, p.limit.unwrap_or(8));
    Ok(Json(related.into_iter().cloned().collect()))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartRecsRequest {
    #[validate(length(min = 1))]
    pub product_ids: Vec<String>,
    pub city: Option<String>,
    pub limit: Option<usize>,
}

async fn cart_recommendations(State(s): State<AppState>, Json(r): Json<CartRecsRequest>) -> Result<Json<Vec<Product>>, Error> {
    validated(&r)?;
    let catalog = s.catalog.list_products(r.city.as_deref()).await?;
    let recs = citycart::recommend::cart_recommendations(&r.product_ids, &catalog, r.limit.unwrap_or(8));
    Ok(Json(recs.into_iter().cloned().collect()))
}

async fn list_cities(State(s): State<AppState>) -> Result<Json<Vec<City>>, Error> {
    Ok(Json(s.cities.list_cities().await?))
}

#[derive(Debug, Deserialize)]
pub struct NearestParams { pub lat: f64, pub lng: f64 }

async fn nearest_city(State(s): State<AppState>, Query(p): Query<NearestParams>) -> Result<Json<City>, Error> {
    Ok(Json(s.cities.nearest_city(p.lat, p.lng).await?))
}

#[derive(Debug, Deserialize)]
pub struct EventsParams { pub city: String }

async fn active_events(State(s): State<AppState>, Query(p): Query<EventsParams>) -> Result<Json<Vec<StoreEvent>>, Error> {
    Ok(Json(s.cities.active_events(&p.city, Utc::now()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: usize, pub page: u32 }

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>, Error> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100) as usize;
    let orders = s.orders.list().await?; // already most-recent-first
    let total = orders.len();
    let data = orders.into_iter().skip((page as usize - 1) * per_page).take(per_page).collect();
    Ok(Json(PaginatedResponse { data, total, page }))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Order>, Error> {
    Ok(Json(s.orders.get(&id).await?))
}

// Serialize is required by the Validate derive on PlaceOrderRequest, which
// records offending field values in its error params.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest { pub product_id: String, pub quantity: u32 }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1))]
    pub city_id: String,
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemRequest>,
    pub customer: Option<CustomerInfo>,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub tip: i64,
}

async fn place_order(State(s): State<AppState>, Json(r): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<Order>), Error> {
    validated(&r)?;
    let order = s.orders.place(PlaceOrder {
        city_id: r.city_id,
        items: r.items.into_iter().map(|i| RequestedItem { product_id: i.product_id, quantity: i.quantity }).collect(),
        customer: r.customer,
        coupon_code: r.coupon_code,
        tip: r.tip,
    }).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest { pub code: String, pub subtotal: i64 }

async fn validate_coupon(State(s): State<AppState>, Json(r): Json<ValidateCouponRequest>) -> Result<Json<AppliedCoupon>, Error> {
    let all: Vec<Coupon> = s.store.read(Document::Coupons).await?;
    Ok(Json(coupons::validate(&r.code, r.subtotal, &all)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest { pub subtotal: i64, pub coupon_code: Option<String>, #[serde(default)] pub tip: i64 }

async fn checkout_quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<CheckoutQuote>, Error> {
    let settings: GlobalSettings = s.store.read(Document::Settings).await?;
    let applied = match &r.coupon_code {
        Some(code) => {
            let all: Vec<Coupon> = s.store.read(Document::Coupons).await?;
            Some(coupons::validate(code, r.subtotal, &all)?)
        }
        None => None,
    };
    Ok(Json(CheckoutQuote::compute(r.subtotal, &settings, applied.as_ref(), r.tip)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub store_name: String,
    pub support_email: String,
    pub currency_symbol: String,
    pub delivery_fee: i64,
    pub handling_fee: i64,
    pub platform_fee: i64,
    pub free_delivery_above: i64,
}

impl From<GlobalSettings> for PublicSettings {
    fn from(s: GlobalSettings) -> Self {
        Self {
            store_name: s.store_name,
            support_email: s.support_email,
            currency_symbol: s.currency_symbol,
            delivery_fee: s.delivery_fee,
            handling_fee: s.handling_fee,
            platform_fee: s.platform_fee,
            free_delivery_above: s.free_delivery_above,
        }
    }
}

async fn get_settings(State(s): State<AppState>) -> Result<Json<PublicSettings>, Error> {
    let settings: GlobalSettings = s.store.read(Document::Settings).await?;
    Ok(Json(settings.into()))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    pub price: i64,
    pub image: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub best_seller: bool,
    #[serde(default)]
    pub new_arrival: bool,
}

impl From<ProductRequest> for NewProduct {
    fn from(r: ProductRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            price: r.price,
            image: r.image,
            category: r.category,
            tags: r.tags,
            best_seller: r.best_seller,
            new_arrival: r.new_arrival,
        }
    }
}

async fn admin_create_product(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<ProductRequest>) -> Result<(StatusCode, Json<Product>), Error> {
    require_admin(&s, &headers).await?;
    validated(&r)?;
    Ok((StatusCode::CREATED, Json(s.catalog.create_product(r.into()).await?)))
}

async fn admin_update_product(State(s): State<AppState>, Path(id): Path<String>, headers: HeaderMap, Json(r): Json<ProductRequest>) -> Result<Json<Product>, Error> {
    require_admin(&s, &headers).await?;
    validated(&r)?;
    Ok(Json(s.catalog.update_product(&id, r.into()).await?))
}

async fn admin_delete_product(State(s): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> Result<StatusCode, Error> {
    require_admin(&s, &headers).await?;
    s.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInventoryRequest { pub city_id: String, pub product_id: String, pub stock: u32, pub price: Option<i64> }

async fn admin_set_inventory(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<SetInventoryRequest>) -> Result<StatusCode, Error> {
    require_admin(&s, &headers).await?;
    s.catalog.set_inventory(&r.city_id, &r.product_id, r.stock, r.price).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCityRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[serde(default)]
    pub pincodes: Vec<String>,
    pub lat: f64,
    pub lng: f64,
}

async fn admin_create_city(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<CreateCityRequest>) -> Result<(StatusCode, Json<City>), Error> {
    require_admin(&s, &headers).await?;
    validated(&r)?;
    let city = City {
        id: r.name.to_lowercase().replace(' ', "-"),
        name: r.name,
        pincodes: r.pincodes,
        active: true,
        lat: r.lat,
        lng: r.lng,
    };
    let _guard = s.store.lock_mutations().await;
    let mut cities: Vec<City> = s.store.read(Document::Cities).await?;
    if cities.iter().any(|c| c.id == city.id) {
        return Err(Error::Validation(format!("city {} already exists", city.id)));
    }
    cities.push(city.clone());
    s.store.write(Document::Cities, &cities).await?;
    Ok((StatusCode::CREATED, Json(city)))
}

async fn admin_create_coupon(State(s): State<AppState>, headers: HeaderMap, Json(coupon): Json<Coupon>) -> Result<(StatusCode, Json<Coupon>), Error> {
    require_admin(&s, &headers).await?;
    if coupon.code.trim().is_empty() {
        return Err(Error::Validation("coupon code must not be empty".into()));
    }
    let _guard = s.store.lock_mutations().await;
    let mut all: Vec<Coupon> = s.store.read(Document::Coupons).await?;
    if all.iter().any(|c| c.code.eq_ignore_ascii_case(&coupon.code)) {
        return Err(Error::Validation(format!("coupon {} already exists", coupon.code)));
    }
    all.push(coupon.clone());
    s.store.write(Document::Coupons, &all).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn admin_delete_coupon(State(s): State<AppState>, Path(code): Path<String>, headers: HeaderMap) -> Result<StatusCode, Error> {
    require_admin(&s, &headers).await?;
    let _guard = s.store.lock_mutations().await;
    let mut all: Vec<Coupon> = s.store.read(Document::Coupons).await?;
    let before = all.len();
    all.retain(|c| !c.code.eq_ignore_ascii_case(&code));
    if all.len() == before {
        return Err(Error::NotFound(format!("coupon {code}")));
    }
    s.store.write(Document::Coupons, &all).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_update_settings(State(s): State<AppState>, headers: HeaderMap, Json(settings): Json<GlobalSettings>) -> Result<Json<PublicSettings>, Error> {
    require_admin(&s, &headers).await?;
    let _guard = s.store.lock_mutations().await;
    s.store.write(Document::Settings, &settings).await?;
    Ok(Json(settings.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest { pub status: OrderStatus, #[serde(default)] pub force: bool }

async fn admin_transition_order(State(s): State<AppState>, Path(id): Path<String>, headers: HeaderMap, Json(r): Json<TransitionRequest>) -> Result<Json<Order>, Error> {
    require_admin(&s, &headers).await?;
    Ok(Json(s.orders.transition(&id, r.status, r.force).await?))
}
