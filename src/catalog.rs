//! Product catalog: listing, city-aware pricing, brand enrichment, admin edits.

use crate::error::{Error, Result};
use crate::models::{Inventory, Product};
use crate::store::{Document, FileStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Brand registry matched by case-insensitive substring against product names.
const BRANDS: &[&str] = &[
    "Amul",
    "Britannia",
    "Nestle",
    "Tata",
    "Parle",
    "Haldiram",
    "Mother Dairy",
    "Fortune",
    "Aashirvaad",
    "Dabur",
    "Patanjali",
    "MTR",
    "Everest",
    "Maggi",
    "Kissan",
    "Bingo",
    "Lay's",
    "Cadbury",
    "Surf Excel",
    "Colgate",
];

/// Memoized brand lookups, one entry per product id. Owned by the service
/// and invalidated on catalog writes; never consulted across processes.
#[derive(Default)]
pub struct BrandCache {
    inner: RwLock<HashMap<String, Option<String>>>,
}

impl BrandCache {
    pub async fn get_or_derive(&self, product: &Product) -> Option<String> {
        if let Some(cached) = self.inner.read().await.get(&product.id) {
            return cached.clone();
        }
        let derived = derive_brand(&product.name);
        self.inner
            .write()
            .await
            .insert(product.id.clone(), derived.clone());
        derived
    }

    pub async fn invalidate(&self) {
        self.inner.write().await.clear();
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

pub fn derive_brand(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    BRANDS
        .iter()
        .find(|brand| lower.contains(&brand.to_lowercase()))
        .map(|brand| brand.to_string())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<FileStore>,
    brands: Arc<BrandCache>,
}

pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub best_seller: bool,
    pub new_arrival: bool,
}

impl CatalogService {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            store,
            brands: Arc::new(BrandCache::default()),
        }
    }

    /// Full catalog, brand-enriched. With a city, each product carries that
    /// city's stock and price; the price falls back to the catalog base
    /// price where the bucket has no override, stock to 0 where absent.
    pub async fn list_products(&self, city_id: Option<&str>) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.store.read(Document::Products).await?;
        let bucket = match city_id {
            Some(city) => {
                let inventory: Inventory = self.store.read(Document::Inventory).await?;
                Some(inventory.get(city).cloned().unwrap_or_default())
            }
            None => None,
        };
        for product in &mut products {
            let brand = self.brands.get_or_derive(product).await;
            product.brand = brand;
            if let Some(bucket) = &bucket {
                match bucket.get(&product.id) {
                    Some(entry) => {
                        product.stock = Some(entry.stock);
                        product.price = entry.price.unwrap_or(product.price);
                    }
                    None => product.stock = Some(0),
                }
            }
        }
        Ok(products)
    }

    pub async fn get_product(&self, id: &str, city_id: Option<&str>) -> Result<Product> {
        self.list_products(city_id)
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("product {id}")))
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            price: new.price,
            image: new.image,
            category: new.category,
            brand: None,
            tags: new.tags,
            best_seller: new.best_seller,
            new_arrival: new.new_arrival,
            stock: None,
        };
        let _guard = self.store.lock_mutations().await;
        let mut products: Vec<Product> = self.store.read(Document::Products).await?;
        products.push(product.clone());
        self.store.write(Document::Products, &products).await?;
        self.brands.invalidate().await;
        info!(product = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: &str, new: NewProduct) -> Result<Product> {
        let _guard = self.store.lock_mutations().await;
        let mut products: Vec<Product> = self.store.read(Document::Products).await?;
        let product = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("product {id}")))?;
        product.name = new.name;
        product.description = new.description;
        product.price = new.price;
        product.image = new.image;
        product.category = new.category;
        product.tags = new.tags;
        product.best_seller = new.best_seller;
        product.new_arrival = new.new_arrival;
        let updated = product.clone();
        self.store.write(Document::Products, &products).await?;
        self.brands.invalidate().await;
        Ok(updated)
    }

    /// List-level removal; orders keep their line snapshots regardless.
    pub async fn delete_product(&self, id: &str) -> Result<()> {
        let _guard = self.store.lock_mutations().await;
        let mut products: Vec<Product> = self.store.read(Document::Products).await?;
        let before = products.len();
        products.retain(|p| p.id != id);
        if products.len() == before {
            return Err(Error::NotFound(format!("product {id}")));
        }
        self.store.write(Document::Products, &products).await?;
        self.brands.invalidate().await;
        Ok(())
    }

    /// Admin absolute set of one city/product inventory cell.
    pub async fn set_inventory(
        &self,
        city_id: &str,
        product_id: &str,
        stock: u32,
        price: Option<i64>,
    ) -> Result<()> {
        let _guard = self.store.lock_mutations().await;
        let mut inventory: Inventory = self.store.read(Document::Inventory).await?;
        inventory
            .entry(city_id.to_string())
            .or_default()
            .insert(product_id.to_string(), crate::models::InventoryEntry { stock, price });
        self.store.write(Document::Inventory, &inventory).await?;
        info!(city = city_id, product = product_id, stock, "inventory set");
        Ok(())
    }
}
