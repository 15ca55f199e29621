// ===============================
// src/products.rs
// ===============================
//
// Product reconciliation: pages the buyer catalog and converges the seller
// catalog onto it. One page-fetch failure aborts the pass; a failure on a
// single product only skips that product.
//
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::alerts::Alerter;
use crate::client::ApiClient;
use crate::compare::products_match;
use crate::config::SyncPolicy;
use crate::domain::{Event, Image, Product, ProductOption, ProductUpdateBody, Variant};
use crate::error::SyncError;

pub struct Job {
    pub id: String,
    pub since: Option<DateTime<Utc>>,
    pub client: ApiClient,
    pub seller_api_key: String,
    pub buyer_api_key: String,
    pub policy: SyncPolicy,
    pub alerter: Alerter,
    pub events: Option<mpsc::Sender<Event>>,
}

impl Job {
    /// Full catalog pass: buyer account is the source, seller account is
    /// converged onto it.
    pub async fn sync_products(&self) {
        info!(job = %self.id, "syncing products...");
        let mut page = 0;
        let mut product_count = 0;
        loop {
            let products = match self.get_products(page, &self.buyer_api_key).await {
                Ok(products) => products,
                Err(e) => {
                    error!(job = %self.id, page, error = %e, "failed to get products");
                    return;
                }
            };
            product_count += products.len();
            if products.is_empty() {
                info!(job = %self.id, total = product_count, "all products have been found");
                return;
            }
            info!(job = %self.id, page, count = products.len(), "products found on buyer account");

            for product in products {
                self.sync_product(product).await;
            }
            page += 1;
        }
    }

    /// Reconciles a single buyer product against the seller account.
    async fn sync_product(&self, buyer_product: Product) {
        let seller_product = match self
            .find_product_by_code(&buyer_product.code, &self.seller_api_key)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                error!(job = %self.id, product = %buyer_product.id, error = %e, "failed to get product counterpart");
                return;
            }
        };

        if let Err(validation) = validate_product(&buyer_product) {
            match &seller_product {
                Some(seller) => {
                    error!(job = %self.id, buyer = %buyer_product.id, seller = %seller.id, error = %validation, "invalid product")
                }
                None => {
                    error!(job = %self.id, buyer = %buyer_product.id, error = %validation, "invalid product")
                }
            }
            let message = format!("Invalid product [{}] because {}", buyer_product.id, validation);
            self.alerter.send(&self.id, &message).await;
            self.record(Event::Alert { message });
            return;
        }

        match seller_product {
            Some(seller) => self.update_seller_product(seller, buyer_product).await,
            None => self.create_seller_product(buyer_product).await,
        }
    }

    /// Counterpart exists: check for drift and converge it.
    async fn update_seller_product(&self, seller_product: Product, buyer_product: Product) {
        info!(job = %self.id, code = %seller_product.code, "product exists, checking for updates");
        match products_match(&seller_product, &buyer_product) {
            Ok(()) => {
                info!(job = %self.id, buyer = %buyer_product.id, seller = %seller_product.id, "products match");
                return;
            }
            Err(mismatch) => {
                info!(job = %self.id, buyer = %buyer_product.id, seller = %seller_product.id, reason = %mismatch, "products did not match")
            }
        }

        // Image src cannot be updated in place, so every existing image is
        // deleted and the fresh list is re-added by the update below.
        for image in &seller_product.images {
            info!(job = %self.id, image = %image.id, product = %seller_product.id, "deleting image");
            if let Err(e) = self
                .delete_product_image(&self.seller_api_key, &seller_product.id, &image.id)
                .await
            {
                error!(job = %self.id, product = %seller_product.id, error = %e, "failed to delete product image");
                return;
            }
        }

        let mut body = ProductUpdateBody {
            title: Some(buyer_product.title),
            active: Some(buyer_product.active),
            body_html: Some(buyer_product.body_html),
            tags: Some(buyer_product.tags),
            vendor: Some(buyer_product.vendor),
            variants: Some(strip_variant_ids(buyer_product.variants)),
            images: Some(strip_image_ids(buyer_product.images)),
            options: Some(strip_option_ids(buyer_product.options)),
            attributes: Some(buyer_product.attributes),
        };
        if self.policy.product_updates_to_inactive {
            body.active = Some(false);
        }

        if let Err(e) = self
            .update_product(&self.seller_api_key, &seller_product.id, &body)
            .await
        {
            error!(job = %self.id, product = %seller_product.id, error = %e, "failed to update the product on seller account");
            return;
        }
        self.record(Event::ProductUpdated {
            code: seller_product.code.clone(),
            seller_id: seller_product.id.clone(),
        });
    }

    /// No counterpart: create one, then apply the new-product policy.
    async fn create_seller_product(&self, buyer_product: Product) {
        info!(job = %self.id, code = %buyer_product.code, "product does not exist, creating new instance");
        let payload = to_create_payload(buyer_product.clone());
        let seller_id = match self.create_product(&payload, &self.seller_api_key).await {
            Ok(id) => id,
            Err(e) => {
                error!(job = %self.id, product = %buyer_product.id, error = %e, "failed to create new product on seller account");
                return;
            }
        };
        info!(job = %self.id, buyer = %buyer_product.id, seller = %seller_id, "new product created on seller account");
        self.record(Event::ProductCreated {
            code: buyer_product.code.clone(),
            seller_id: seller_id.clone(),
        });

        if self.policy.new_product_to_inactive {
            if let Err(e) = self
                .update_product_as_inactive(&self.seller_api_key, &seller_id)
                .await
            {
                error!(job = %self.id, product = %seller_id, error = %e, "failed to mark new product as inactive on seller account");
            }
        }
    }

    // ---- gateway calls ----

    async fn get_products(&self, page: u32, api_key: &str) -> Result<Vec<Product>, SyncError> {
        let resp = self
            .client
            .get("/products", page, api_key, self.since.as_ref())
            .await?;
        Ok(serde_json::from_slice(&resp)?)
    }

    /// Counterpart lookup by the stable cross-side code. Zero results is a
    /// valid outcome, not an error.
    async fn find_product_by_code(
        &self,
        code: &str,
        api_key: &str,
    ) -> Result<Option<Product>, SyncError> {
        let path = format!("/products?productCode={}", urlencoding::encode(code));
        let resp = self
            .client
            .get(&path, 0, api_key, self.since.as_ref())
            .await?;
        let mut products: Vec<Product> = serde_json::from_slice(&resp)?;
        if products.is_empty() {
            return Ok(None);
        }
        Ok(Some(products.remove(0)))
    }

    async fn create_product(&self, product: &Product, api_key: &str) -> Result<String, SyncError> {
        let payload = serde_json::to_vec(product)?;
        let resp = self.client.post("/products", api_key, payload).await?;
        let created: Product = serde_json::from_slice(&resp)?;
        Ok(created.id)
    }

    async fn update_product(
        &self,
        api_key: &str,
        product_id: &str,
        body: &ProductUpdateBody,
    ) -> Result<(), SyncError> {
        let payload = serde_json::to_vec(body)?;
        let resp = self
            .client
            .patch(&format!("/products/{product_id}"), api_key, payload)
            .await?;
        let _: Product = serde_json::from_slice(&resp)?;
        Ok(())
    }

    async fn delete_product_image(
        &self,
        api_key: &str,
        product_id: &str,
        image_id: &str,
    ) -> Result<(), SyncError> {
        let resp = self
            .client
            .delete(&format!("/products/{product_id}/images/{image_id}"), api_key)
            .await?;
        let _: Product = serde_json::from_slice(&resp)?;
        Ok(())
    }

    async fn update_product_as_inactive(
        &self,
        api_key: &str,
        product_id: &str,
    ) -> Result<(), SyncError> {
        let body = ProductUpdateBody {
            active: Some(false),
            ..Default::default()
        };
        self.update_product(api_key, product_id, &body).await
    }

    /// Resolves a variant's side-local id from its barcode by walking the
    /// whole catalog — the API has no variant-level filter. Exhausting every
    /// page without a match is an error, not an empty result.
    pub async fn find_variant_by_barcode(
        &self,
        api_key: &str,
        barcode: &str,
        barcode_type: &str,
    ) -> Result<String, SyncError> {
        let mut page = 0;
        loop {
            let resp = self.client.get("/products", page, api_key, None).await?;
            let products: Vec<Product> = serde_json::from_slice(&resp)?;
            if products.is_empty() {
                return Err(SyncError::VariantNotFound {
                    barcode: barcode.to_string(),
                    barcode_type: barcode_type.to_string(),
                });
            }
            for product in &products {
                for variant in &product.variants {
                    if variant.barcode == barcode && variant.barcode_type == barcode_type {
                        return Ok(variant.id.clone());
                    }
                }
            }
            page += 1;
        }
    }

    fn record(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

/// Required data for a product to cross sides: a title, and a barcode plus
/// barcode type on every variant.
pub fn validate_product(product: &Product) -> Result<(), SyncError> {
    if product.title.is_empty() {
        return Err(SyncError::MissingTitle {
            id: product.id.clone(),
        });
    }
    for variant in &product.variants {
        if variant.barcode.is_empty() {
            return Err(SyncError::MissingBarcode {
                title: product.title.clone(),
                id: product.id.clone(),
            });
        }
        if variant.barcode_type.is_empty() {
            return Err(SyncError::MissingBarcodeType {
                title: product.title.clone(),
                id: product.id.clone(),
            });
        }
    }
    Ok(())
}

// The counterpart API must treat every sub-object as new, so side-local ids
// are cleared before a snapshot is re-submitted.

pub fn strip_image_ids(mut images: Vec<Image>) -> Vec<Image> {
    for image in &mut images {
        image.id.clear();
    }
    images
}

pub fn strip_variant_ids(mut variants: Vec<Variant>) -> Vec<Variant> {
    for variant in &mut variants {
        variant.id.clear();
    }
    variants
}

pub fn strip_option_ids(mut options: Vec<ProductOption>) -> Vec<ProductOption> {
    for option in &mut options {
        option.id.clear();
    }
    options
}

fn to_create_payload(mut product: Product) -> Product {
    product.id.clear();
    product.images = strip_image_ids(product.images);
    product.variants = strip_variant_ids(product.variants);
    product.options = strip_option_ids(product.options);
    product
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testutil::sample_product;
    use crate::ratelimit::RateGate;
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SELLER_KEY: &str = "seller-key";
    const BUYER_KEY: &str = "buyer-key";

    fn policy(new_inactive: bool, updates_inactive: bool) -> SyncPolicy {
        SyncPolicy {
            new_product_to_inactive: new_inactive,
            product_updates_to_inactive: updates_inactive,
        }
    }

    fn job(server: &MockServer, policy: SyncPolicy) -> Job {
        let base = Url::parse(&server.uri()).unwrap();
        Job {
            id: "JOB-TEST".into(),
            since: None,
            client: ApiClient::new(&base, Arc::new(RateGate::new(1_000))),
            seller_api_key: SELLER_KEY.into(),
            buyer_api_key: BUYER_KEY.into(),
            policy,
            alerter: Alerter::new(None),
            events: None,
        }
    }

    async fn mount_buyer_page(server: &MockServer, page: u32, products: &[Product]) {
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", page.to_string()))
            .and(header("Authorization", BUYER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(products))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_seller_lookup(server: &MockServer, code: &str, products: &[Product]) {
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("productCode", code))
            .and(header("Authorization", SELLER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(products))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn lookup_with_zero_results_is_not_an_error() {
        let server = MockServer::start().await;
        mount_seller_lookup(&server, "P-404", &[]).await;

        let found = job(&server, policy(false, false))
            .find_product_by_code("P-404", SELLER_KEY)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn missing_counterpart_is_created_and_policy_marks_it_inactive() {
        let server = MockServer::start().await;
        let product = sample_product();

        mount_buyer_page(&server, 0, std::slice::from_ref(&product)).await;
        mount_buyer_page(&server, 1, &[]).await;
        mount_seller_lookup(&server, "P-1", &[]).await;

        let mut created = product.clone();
        created.id = "seller-1".into();
        Mock::given(method("POST"))
            .and(path("/products"))
            .and(header("Authorization", SELLER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(&created))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/products/seller-1"))
            .and(header("Authorization", SELLER_KEY))
            .and(body_json(serde_json::json!({ "active": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&created))
            .expect(1)
            .mount(&server)
            .await;

        job(&server, policy(true, false)).sync_products().await;

        // The create payload must not leak the buyer's identifier space.
        let requests = server.received_requests().await.unwrap();
        let create = requests
            .iter()
            .find(|r| r.method == wiremock::http::Method::POST)
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
        assert!(body.get("_id").is_none());
        assert!(body["images"][0].get("_id").is_none());
        assert!(body["variants"][0].get("_id").is_none());
        assert!(body["options"][0].get("_id").is_none());
    }

    #[tokio::test]
    async fn pagination_stops_at_the_first_empty_page() {
        let server = MockServer::start().await;
        let mut one = sample_product();
        let mut two = sample_product();
        one.code = "P-1".into();
        two.code = "P-2".into();

        mount_buyer_page(&server, 0, std::slice::from_ref(&one)).await;
        mount_buyer_page(&server, 1, std::slice::from_ref(&two)).await;
        mount_buyer_page(&server, 2, &[]).await;
        // Counterparts are identical, so no mutation should be issued.
        mount_seller_lookup(&server, "P-1", std::slice::from_ref(&one)).await;
        mount_seller_lookup(&server, "P-2", std::slice::from_ref(&two)).await;

        job(&server, policy(true, true)).sync_products().await;

        let requests = server.received_requests().await.unwrap();
        assert!(requests
            .iter()
            .all(|r| r.method == wiremock::http::Method::GET));
        let list_fetches = requests
            .iter()
            .filter(|r| r.url.query().unwrap_or("").contains("page="))
            .filter(|r| !r.url.query().unwrap_or("").contains("productCode"))
            .count();
        assert_eq!(list_fetches, 3);
    }

    #[tokio::test]
    async fn drifted_counterpart_gets_images_deleted_then_one_update() {
        let server = MockServer::start().await;
        let buyer_product = sample_product();
        let mut seller_product = buyer_product.clone();
        seller_product.id = "seller-9".into();
        seller_product.images[0].id = "seller-img-1".into();
        seller_product.variants[0].id = "seller-var-1".into();
        seller_product.variants[0].retail_price = 9.99;

        mount_buyer_page(&server, 0, std::slice::from_ref(&buyer_product)).await;
        mount_buyer_page(&server, 1, &[]).await;
        mount_seller_lookup(&server, "P-1", std::slice::from_ref(&seller_product)).await;

        Mock::given(method("DELETE"))
            .and(path("/products/seller-9/images/seller-img-1"))
            .and(header("Authorization", SELLER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(&seller_product))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/products/seller-9"))
            .and(header("Authorization", SELLER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(&seller_product))
            .expect(1)
            .mount(&server)
            .await;

        job(&server, policy(false, false)).sync_products().await;

        let requests = server.received_requests().await.unwrap();
        let update = requests
            .iter()
            .find(|r| r.method == wiremock::http::Method::PATCH)
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
        assert_eq!(body["variants"][0]["retailPrice"], 19.99);
        assert_eq!(body["active"], true);
        assert!(body["images"][0].get("_id").is_none());
        assert!(body["variants"][0].get("_id").is_none());
    }

    #[tokio::test]
    async fn update_policy_forces_the_outgoing_active_flag_off() {
        let server = MockServer::start().await;
        let buyer_product = sample_product();
        let mut seller_product = buyer_product.clone();
        seller_product.id = "seller-9".into();
        seller_product.images.clear();
        seller_product.title = "Old Title".into();

        mount_buyer_page(&server, 0, std::slice::from_ref(&buyer_product)).await;
        mount_buyer_page(&server, 1, &[]).await;
        mount_seller_lookup(&server, "P-1", std::slice::from_ref(&seller_product)).await;
        Mock::given(method("PATCH"))
            .and(path("/products/seller-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&seller_product))
            .expect(1)
            .mount(&server)
            .await;

        job(&server, policy(false, true)).sync_products().await;

        let requests = server.received_requests().await.unwrap();
        let update = requests
            .iter()
            .find(|r| r.method == wiremock::http::Method::PATCH)
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
        assert_eq!(body["active"], false);
    }

    #[tokio::test]
    async fn invalid_product_is_alerted_and_never_partially_created() {
        let alert_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&alert_server)
            .await;

        let server = MockServer::start().await;
        let mut product = sample_product();
        product.variants[0].barcode.clear();

        mount_buyer_page(&server, 0, std::slice::from_ref(&product)).await;
        mount_buyer_page(&server, 1, &[]).await;
        mount_seller_lookup(&server, "P-1", &[]).await;
        Mock::given(method("POST"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&product))
            .expect(0)
            .mount(&server)
            .await;

        let mut job = job(&server, policy(true, false));
        job.alerter = Alerter::new(Some(
            Url::parse(&format!("{}/alerts", alert_server.uri())).unwrap(),
        ));
        job.sync_products().await;
    }

    #[tokio::test]
    async fn transport_error_aborts_the_whole_pass() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        job(&server, policy(true, false)).sync_products().await;
    }

    #[tokio::test]
    async fn variant_lookup_walks_pages_until_the_barcode_matches() {
        let server = MockServer::start().await;
        let mut other = sample_product();
        other.variants[0].barcode = "9999999999999".into();
        let mut wanted = sample_product();
        wanted.variants[0].id = "var-77".into();

        mount_buyer_page(&server, 0, std::slice::from_ref(&other)).await;
        mount_buyer_page(&server, 1, std::slice::from_ref(&wanted)).await;

        let id = job(&server, policy(false, false))
            .find_variant_by_barcode(BUYER_KEY, "0123456789012", "EAN13")
            .await
            .unwrap();
        assert_eq!(id, "var-77");
    }

    #[tokio::test]
    async fn exhausting_the_catalog_without_a_match_is_an_error() {
        let server = MockServer::start().await;
        mount_buyer_page(&server, 0, &[]).await;

        let err = job(&server, policy(false, false))
            .find_variant_by_barcode(BUYER_KEY, "0123456789012", "EAN13")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::VariantNotFound { .. }));
    }

    #[test]
    fn validation_requires_title_and_barcodes() {
        let product = sample_product();
        assert!(validate_product(&product).is_ok());

        let mut untitled = product.clone();
        untitled.title.clear();
        assert!(matches!(
            validate_product(&untitled),
            Err(SyncError::MissingTitle { .. })
        ));

        let mut no_barcode = product.clone();
        no_barcode.variants[0].barcode.clear();
        assert!(matches!(
            validate_product(&no_barcode),
            Err(SyncError::MissingBarcode { .. })
        ));

        let mut no_barcode_type = product;
        no_barcode_type.variants[0].barcode_type.clear();
        assert!(matches!(
            validate_product(&no_barcode_type),
            Err(SyncError::MissingBarcodeType { .. })
        ));
    }
}
