#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use storefront_rs::{
    auth::{AuthState, StaticTokenAuthenticator},
    create_app,
    handlers::ApiState,
    models::{
        CartItem, DeleteSummary, Patch, Product, ProductFilter, RepositoryError,
        RepositoryResult, UpdateSummary,
    },
    observability::{BusinessTracingMiddleware, Metrics},
    repositories::{CartRepository, ProductRepository},
    services::{CartService, ProductService},
    AppOptions,
};

pub const AUTH_TOKEN: &str = "Admin";

/// Merge `patch` into a serialized document, reporting whether anything changed
fn apply_patch<T: Serialize + DeserializeOwned>(
    document: &T,
    patch: &Patch,
) -> RepositoryResult<Option<T>> {
    let mut fields: Map<String, Value> = match serde_json::to_value(document)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if !patch.would_modify(&fields) {
        return Ok(None);
    }
    for (key, value) in patch.iter() {
        fields.insert(key.clone(), value.clone());
    }
    Ok(Some(serde_json::from_value(Value::Object(fields))?))
}

/// Product store kept in memory, in insertion order
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<Vec<Product>>,
    fail_with_connection_error: bool,
}

impl InMemoryProductRepository {
    pub fn failing() -> Self {
        Self {
            products: Mutex::new(Vec::new()),
            fail_with_connection_error: true,
        }
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.fail_with_connection_error {
            Err(RepositoryError::ConnectionFailed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn insert(&self, product: &Product) -> RepositoryResult<()> {
        self.check()?;
        let mut products = self.products.lock().unwrap();
        if products.iter().any(|p| p.product_id == product.product_id) {
            return Err(RepositoryError::ConstraintViolation {
                message: "productId already exists".to_string(),
            });
        }
        products.push(product.clone());
        Ok(())
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        self.check()?;
        Ok(self.products.lock().unwrap().clone())
    }

    async fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        self.check()?;
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned())
    }

    async fn find_by_attribute(
        &self,
        filter: ProductFilter,
        value: &str,
    ) -> RepositoryResult<Vec<Product>> {
        self.check()?;
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| match filter {
                ProductFilter::Brand => p.brand == value,
                ProductFilter::Category => p.category == value,
            })
            .cloned()
            .collect())
    }

    async fn update(&self, product_id: &str, patch: &Patch) -> RepositoryResult<UpdateSummary> {
        self.check()?;
        let mut products = self.products.lock().unwrap();
        let mut summary = UpdateSummary::default();
        for product in products.iter_mut().filter(|p| p.product_id == product_id) {
            summary.matched_count += 1;
            if let Some(updated) = apply_patch(product, patch)? {
                *product = updated;
                summary.modified_count += 1;
            }
        }
        Ok(summary)
    }

    async fn delete(&self, product_id: &str) -> RepositoryResult<DeleteSummary> {
        self.check()?;
        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|p| p.product_id != product_id);
        Ok(DeleteSummary::new((before - products.len()) as u64))
    }
}

/// Cart store kept in memory, in insertion order
#[derive(Default)]
pub struct InMemoryCartRepository {
    items: Mutex<Vec<CartItem>>,
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn insert(&self, item: &CartItem) -> RepositoryResult<()> {
        self.items.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn find_by_user(&self, user_id: &str) -> RepositoryResult<Vec<CartItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        user_id: &str,
        product_id: &str,
        patch: &Patch,
    ) -> RepositoryResult<UpdateSummary> {
        let mut items = self.items.lock().unwrap();
        let mut summary = UpdateSummary::default();
        for item in items
            .iter_mut()
            .filter(|item| item.user_id == user_id && item.product_id == product_id)
        {
            summary.matched_count += 1;
            if let Some(mut updated) = apply_patch(item, patch)? {
                updated.cart_item_id = item.cart_item_id.clone();
                *item = updated;
                summary.modified_count += 1;
            }
        }
        Ok(summary)
    }

    async fn delete(&self, user_id: &str, product_id: &str) -> RepositoryResult<DeleteSummary> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|item| !(item.user_id == user_id && item.product_id == product_id));
        Ok(DeleteSummary::new((before - items.len()) as u64))
    }
}

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub metrics: Arc<Metrics>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_repositories(
            Arc::new(InMemoryProductRepository::default()),
            Arc::new(InMemoryCartRepository::default()),
            false,
        )
        .await
    }

    pub async fn with_repositories(
        product_repository: Arc<dyn ProductRepository>,
        cart_repository: Arc<dyn CartRepository>,
        refresh_last_modified_on_edit: bool,
    ) -> Self {
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));

        let state = ApiState {
            product_service: Arc::new(ProductService::new(product_repository)),
            cart_service: Arc::new(
                CartService::new(cart_repository)
                    .with_last_modified_refresh(refresh_last_modified_on_edit),
            ),
            business_tracing: BusinessTracingMiddleware::new(metrics.clone()),
        };
        let auth = AuthState::new(Arc::new(StaticTokenAuthenticator::new(AUTH_TOKEN)))
            .with_metrics(metrics.clone());

        let app = create_app(state, auth, metrics.clone(), &AppOptions::default());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            metrics,
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Send an authenticated request and return the status and envelope
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = self
            .client
            .request(method, self.api_url(path))
            .header("authToken", AUTH_TOKEN);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.expect("Failed to send request");
        let status = response.status().as_u16();
        let envelope = response.json().await.expect("Failed to parse envelope");
        (status, envelope)
    }

    /// Send an authenticated url-encoded form
    pub async fn send_form(
        &self,
        method: reqwest::Method,
        path: &str,
        fields: &[(&str, &str)],
    ) -> (u16, Value) {
        let response = self
            .client
            .request(method, self.api_url(path))
            .header("authToken", AUTH_TOKEN)
            .form(fields)
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status().as_u16();
        let envelope = response.json().await.expect("Failed to parse envelope");
        (status, envelope)
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        self.send(reqwest::Method::POST, path, body).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        self.send(reqwest::Method::PUT, path, Some(body)).await
    }
}
