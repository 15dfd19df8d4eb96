use std::sync::Arc;
use tracing::{instrument, warn};

use crate::models::{
    CreateProductRequest, DeleteSummary, Patch, Product, ProductFilter, RepositoryError,
    ServiceError, ServiceResult, UpdateSummary,
};
use crate::repositories::ProductRepository;

/// Insert attempts before giving up on finding a free product id
const MAX_ID_ATTEMPTS: u32 = 3;

/// Service for managing the product catalog
pub struct ProductService {
    repository: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(repository: Arc<dyn ProductRepository>) -> Self {
        Self { repository }
    }

    /// Create a product under a freshly generated id
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProductRequest) -> ServiceResult<Product> {
        let mut product = Product::new(request);
        let mut attempt = 1;

        loop {
            match self.repository.insert(&product).await {
                Ok(()) => {
                    crate::info_with_trace!(product_id = %product.product_id, "Product created");
                    return Ok(product);
                }
                Err(RepositoryError::ConstraintViolation { message })
                    if attempt < MAX_ID_ATTEMPTS =>
                {
                    warn!(attempt, %message, "Product id collision, retrying with a new id");
                    product.regenerate_id();
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        let products = self.repository.find_all().await?;

        if products.is_empty() {
            crate::info_with_trace!("No products in catalog");
            return Err(ServiceError::NoProductsFound {
                criteria: "all".to_string(),
            });
        }

        crate::info_with_trace!("Found {} products", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &str) -> ServiceResult<Product> {
        validate_id("Product ID", product_id)?;

        match self.repository.find_by_id(product_id).await? {
            Some(product) => {
                crate::info_with_trace!("Product found");
                Ok(product)
            }
            None => {
                crate::info_with_trace!("Product not found");
                Err(ServiceError::ProductNotFound {
                    id: product_id.to_string(),
                })
            }
        }
    }

    pub async fn list_by_category(&self, category: &str) -> ServiceResult<Vec<Product>> {
        self.list_by(ProductFilter::Category, category).await
    }

    pub async fn list_by_brand(&self, brand: &str) -> ServiceResult<Vec<Product>> {
        self.list_by(ProductFilter::Brand, brand).await
    }

    #[instrument(skip(self), fields(filter = %filter, value = %value))]
    async fn list_by(&self, filter: ProductFilter, value: &str) -> ServiceResult<Vec<Product>> {
        let products = self.repository.find_by_attribute(filter, value).await?;

        if products.is_empty() {
            crate::info_with_trace!("No products matched");
            return Err(ServiceError::NoProductsFound {
                criteria: format!("{}={}", filter, value),
            });
        }

        crate::info_with_trace!("Found {} products", products.len());
        Ok(products)
    }

    /// Apply a partial update. Zero matches is `ProductNotFound`; a match that
    /// changes nothing is a success with `modified_count == 0`.
    #[instrument(skip(self, patch), fields(product_id = %product_id, fields = patch.len()))]
    pub async fn edit_product(
        &self,
        product_id: &str,
        patch: Patch,
    ) -> ServiceResult<UpdateSummary> {
        validate_id("Product ID", product_id)?;

        let summary = self.repository.update(product_id, &patch).await?;
        if !summary.matched() {
            crate::info_with_trace!("No product matched edit");
            return Err(ServiceError::ProductNotFound {
                id: product_id.to_string(),
            });
        }

        crate::info_with_trace!(modified = summary.modified_count, "Product edited");
        Ok(summary)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: &str) -> ServiceResult<DeleteSummary> {
        validate_id("Product ID", product_id)?;

        let summary = self.repository.delete(product_id).await?;
        if !summary.deleted() {
            crate::info_with_trace!("No product matched delete");
            return Err(ServiceError::ProductNotFound {
                id: product_id.to_string(),
            });
        }

        crate::info_with_trace!("Product deleted");
        Ok(summary)
    }
}

pub(crate) fn validate_id(label: &str, id: &str) -> ServiceResult<()> {
    if id.trim().is_empty() {
        return Err(ServiceError::ValidationError {
            message: format!("{} cannot be empty", label),
        });
    }
    Ok(())
}
