//! Product catalogue model
//!
//! Two shapes share the table: loose flower priced per gram, and pre-roll
//! packs sold at a fixed pack price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Sold by the gram
    Flower,

    /// Sold by the pack
    Preroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "strain_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StrainType {
    Indica,
    Sativa,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    pub product_type: ProductType,

    /// Flower only
    pub strain_type: Option<StrainType>,

    /// MWK per gram, flower only
    pub price_per_gram: Option<i64>,

    /// Pack size in milligrams, pre-roll only
    pub size_mg: Option<i32>,

    /// MWK per pack, pre-roll only
    pub total_price: Option<i64>,

    pub stock_quantity: i32,

    pub image_url: Option<String>,

    pub is_available: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price of one unit of `quantity`: a gram of flower or a pre-roll pack
    pub fn unit_price(&self) -> Option<i64> {
        match self.product_type {
            ProductType::Flower => self.price_per_gram,
            ProductType::Preroll => self.total_price,
        }
    }

    /// Checks the per-type field invariants
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the missing or invalid field.
    pub fn check_shape(&self) -> Result<(), String> {
        check_shape(
            self.product_type,
            self.strain_type,
            self.price_per_gram,
            self.size_mg,
            self.total_price,
        )?;

        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        if self.stock_quantity < 0 {
            return Err("Stock quantity cannot be negative".to_string());
        }
        Ok(())
    }

    pub fn from_create(data: CreateProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            product_type: data.product_type,
            strain_type: data.strain_type,
            price_per_gram: data.price_per_gram,
            size_mg: data.size_mg,
            total_price: data.total_price,
            stock_quantity: data.stock_quantity,
            image_url: data.image_url,
            is_available: data.is_available,
            created_at: now,
            updated_at: now,
        }
    }
}

fn check_shape(
    product_type: ProductType,
    strain_type: Option<StrainType>,
    price_per_gram: Option<i64>,
    size_mg: Option<i32>,
    total_price: Option<i64>,
) -> Result<(), String> {
    match product_type {
        ProductType::Flower => {
            if strain_type.is_none() {
                return Err("Flower products require a strain type".to_string());
            }
            match price_per_gram {
                Some(p) if p > 0 => Ok(()),
                _ => Err("Flower products require a positive price per gram".to_string()),
            }
        }
        ProductType::Preroll => {
            if !matches!(size_mg, Some(s) if s > 0) {
                return Err("Pre-roll products require a size".to_string());
            }
            match total_price {
                Some(p) if p > 0 => Ok(()),
                _ => Err("Pre-roll products require a positive total price".to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,

    pub description: Option<String>,

    pub product_type: ProductType,

    pub strain_type: Option<StrainType>,

    pub price_per_gram: Option<i64>,

    pub size_mg: Option<i32>,

    pub total_price: Option<i64>,

    pub stock_quantity: i32,

    pub image_url: Option<String>,

    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}

impl CreateProduct {
    pub fn check_shape(&self) -> Result<(), String> {
        Product::from_create(self.clone()).check_shape()
    }
}

/// Partial product update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,

    pub description: Option<String>,

    pub strain_type: Option<StrainType>,

    pub price_per_gram: Option<i64>,

    pub size_mg: Option<i32>,

    pub total_price: Option<i64>,

    pub stock_quantity: Option<i32>,

    pub image_url: Option<String>,

    pub is_available: Option<bool>,
}

impl UpdateProduct {
    pub fn apply(self, product: &mut Product) {
        if let Some(v) = self.name {
            product.name = v;
        }
        if let Some(v) = self.description {
            product.description = Some(v);
        }
        if let Some(v) = self.strain_type {
            product.strain_type = Some(v);
        }
        if let Some(v) = self.price_per_gram {
            product.price_per_gram = Some(v);
        }
        if let Some(v) = self.size_mg {
            product.size_mg = Some(v);
        }
        if let Some(v) = self.total_price {
            product.total_price = Some(v);
        }
        if let Some(v) = self.stock_quantity {
            product.stock_quantity = v;
        }
        if let Some(v) = self.image_url {
            product.image_url = Some(v);
        }
        if let Some(v) = self.is_available {
            product.is_available = v;
        }
        product.updated_at = Utc::now();
    }
}

/// The storefront catalogue a fresh store starts with
pub fn seed_catalogue() -> Vec<CreateProduct> {
    let flower = |name: &str, description: &str, strain: StrainType, price: i64, stock: i32| {
        CreateProduct {
            name: name.to_string(),
            description: Some(description.to_string()),
            product_type: ProductType::Flower,
            strain_type: Some(strain),
            price_per_gram: Some(price),
            size_mg: None,
            total_price: None,
            stock_quantity: stock,
            image_url: None,
            is_available: true,
        }
    };
    let preroll = |name: &str, description: &str, size: i32, price: i64, stock: i32| {
        CreateProduct {
            name: name.to_string(),
            description: Some(description.to_string()),
            product_type: ProductType::Preroll,
            strain_type: None,
            price_per_gram: None,
            size_mg: Some(size),
            total_price: Some(price),
            stock_quantity: stock,
            image_url: None,
            is_available: true,
        }
    };

    vec![
        flower(
            "Premium Indica Flower",
            "Relaxing indica strain, perfect for evening use",
            StrainType::Indica,
            3500,
            50,
        ),
        flower(
            "Golden Sativa Flower",
            "Energizing sativa strain for daytime",
            StrainType::Sativa,
            3000,
            40,
        ),
        flower(
            "Balanced Hybrid Flower",
            "Balanced hybrid for any time of day",
            StrainType::Hybrid,
            3200,
            60,
        ),
        preroll("Mini Pre-Roll Pack", "Pack of small pre-rolls", 500, 500, 100),
        preroll("Standard Pre-Roll Pack", "Pack of standard pre-rolls", 1000, 1000, 80),
    ]
}

const PRODUCT_COLUMNS: &str = "id, name, description, product_type, strain_type, price_per_gram, \
     size_mg, total_price, stock_quantity, image_url, is_available, created_at, updated_at";

impl Product {
    pub async fn create(pool: &PgPool, data: CreateProduct) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO products (name, description, product_type, strain_type, price_per_gram,
                                  size_mg, total_price, stock_quantity, image_url, is_available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Product>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.product_type)
            .bind(data.strain_type)
            .bind(data.price_per_gram)
            .bind(data.size_mg)
            .bind(data.total_price)
            .bind(data.stock_quantity)
            .bind(data.image_url)
            .bind(data.is_available)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Catalogue listing ordered by name
    pub async fn list(pool: &PgPool, include_unavailable: bool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE ($1 OR is_available) ORDER BY name ASC"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(include_unavailable)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                strain_type = COALESCE($4, strain_type),
                price_per_gram = COALESCE($5, price_per_gram),
                size_mg = COALESCE($6, size_mg),
                total_price = COALESCE($7, total_price),
                stock_quantity = COALESCE($8, stock_quantity),
                image_url = COALESCE($9, image_url),
                is_available = COALESCE($10, is_available),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.strain_type)
            .bind(data.price_per_gram)
            .bind(data.size_mg)
            .bind(data.total_price)
            .bind(data.stock_quantity)
            .bind(data.image_url)
            .bind(data.is_available)
            .fetch_optional(pool)
            .await
    }

    /// Products at or below `threshold` units, lowest stock first
    pub async fn low_stock(pool: &PgPool, threshold: i32) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE stock_quantity <= $1
            ORDER BY stock_quantity ASC, name ASC
            "#
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(threshold)
            .fetch_all(pool)
            .await
    }
}
