// ===============================
// src/orders.rs
// ===============================
//
// Order reconciliation runs as two independent passes: new orders flow from
// the seller account to the buyer account, shipment state flows back. The
// same page/abort/isolation rules as the product pass apply.
//
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::client::ApiClient;
use crate::domain::{
    BuyerItem, BuyerOrder, Event, Fulfillment, NewFulfillmentItem, NewFulfillmentRequestBody,
    Order,
};
use crate::error::SyncError;
use crate::products;

pub struct Job<'a> {
    pub id: String,
    pub since: Option<DateTime<Utc>>,
    pub client: ApiClient,
    pub seller_api_key: String,
    pub buyer_api_key: String,
    /// Variant references are resolved through the product job's catalog walk.
    pub products: &'a products::Job,
    pub events: Option<mpsc::Sender<Event>>,
}

impl Job<'_> {
    pub async fn sync_orders(&self) {
        // New orders from the seller account (retailer side).
        self.sync_new_orders().await;
        // Shipment updates from the buyer account (supplier side).
        self.sync_order_updates().await;
    }

    /// Pass A: every not-yet-shipped seller order must exist on the buyer
    /// account. Re-running with nothing new creates nothing.
    pub async fn sync_new_orders(&self) {
        info!(job = %self.id, "syncing new orders...");
        let mut page = 0;
        let mut order_count = 0;
        loop {
            let orders = match self.seller_non_shipped_orders(page).await {
                Ok(orders) => orders,
                Err(e) => {
                    error!(job = %self.id, page, error = %e, "failed to get orders");
                    return;
                }
            };
            order_count += orders.len();
            if orders.is_empty() {
                info!(job = %self.id, total = order_count, "all new orders have been found and synced");
                return;
            }
            info!(job = %self.id, count = orders.len(), total = order_count, "orders to process");

            for order in orders {
                self.process_new_order(order).await;
            }
            page += 1;
        }
    }

    async fn process_new_order(&self, order: Order) {
        let existing = match self.buyer_order_by_code(&order.seller_order_code).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(job = %self.id, order = %order.id, error = %e, "failed to get order with buyer order code");
                return;
            }
        };
        if existing.is_some() {
            info!(job = %self.id, order = %order.id, "order has already been created");
            return;
        }

        let buyer_order = match self.to_buyer_order(&order).await {
            Ok(buyer_order) => buyer_order,
            Err(e) => {
                error!(job = %self.id, order = %order.id, error = %e, "failed to convert order to buyer order");
                return;
            }
        };
        let buyer_order_id = match self.create_buyer_order(&buyer_order).await {
            Ok(id) => id,
            Err(e) => {
                error!(job = %self.id, order = %order.id, error = %e, "failed to create new order");
                return;
            }
        };
        info!(job = %self.id, seller = %order.id, buyer = %buyer_order_id, "new order created on the buyer account");
        self.record(Event::OrderCreated {
            seller_order_id: order.id.clone(),
            buyer_order_id,
        });
    }

    /// Pass B: every shipped buyer order must have its seller counterpart
    /// marked shipped via fulfillments.
    pub async fn sync_order_updates(&self) {
        info!(job = %self.id, "syncing order updates...");
        let mut page = 0;
        let mut order_count = 0;
        loop {
            let buyer_orders = match self.buyer_shipped_orders(page).await {
                Ok(orders) => orders,
                Err(e) => {
                    error!(job = %self.id, page, error = %e, "failed to get orders");
                    return;
                }
            };
            order_count += buyer_orders.len();
            if buyer_orders.is_empty() {
                info!(job = %self.id, total = order_count, "all shipped orders have been found");
                return;
            }
            info!(job = %self.id, count = buyer_orders.len(), total = order_count, "shipped orders from the buyer");

            for buyer_order in buyer_orders {
                self.process_order_update(buyer_order).await;
            }
            page += 1;
        }
    }

    async fn process_order_update(&self, buyer_order: Order) {
        let seller_order = match self
            .seller_order_by_code(&buyer_order.buyer_order_code)
            .await
        {
            Ok(Some(order)) => order,
            Ok(None) => {
                let e = SyncError::OrderNotSynced(buyer_order.buyer_order_code.clone());
                error!(job = %self.id, order = %buyer_order.id, error = %e, "order is missing on the seller account");
                return;
            }
            Err(e) => {
                error!(job = %self.id, order = %buyer_order.id, error = %e, "failed to get order with seller order code");
                return;
            }
        };

        if buyer_order.shipped && !seller_order.shipped {
            info!(job = %self.id, order = %seller_order.id, "order has been shipped in buyer account, sharing it with the seller account");
            if let Err(e) = self
                .create_fulfillments(&seller_order.id, &buyer_order.fulfillments)
                .await
            {
                error!(job = %self.id, order = %seller_order.id, error = %e, "failed to create fulfillment on the seller order");
                return;
            }
            info!(job = %self.id, order = %seller_order.id, "order has been marked as shipped in both accounts");
        } else if !buyer_order.shipped && seller_order.shipped {
            // Neither side is known to be authoritative here, so the
            // divergence is reported and left alone.
            let e = SyncError::ShippedStateConflict(buyer_order.buyer_order_code.clone());
            error!(job = %self.id, order = %seller_order.id, error = %e, "order state is inconsistent between accounts");
        }
    }

    /// Builds the buyer-side creation payload for a seller order. Fails as a
    /// whole if any item's variant reference cannot be resolved; no partial
    /// order is ever submitted.
    async fn to_buyer_order(&self, order: &Order) -> Result<BuyerOrder, SyncError> {
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let variant_id = self
                .products
                .find_variant_by_barcode(&self.buyer_api_key, &item.barcode, &item.barcode_type)
                .await?;
            items.push(BuyerItem {
                variant_id,
                buyer_reference: item.id.clone(),
                quantity: item.quantity,
            });
        }
        Ok(BuyerOrder {
            id: String::new(),
            buyer_reference: order.seller_order_code.clone(),
            ordered_date: order.created,
            created: order.created,
            updated: order.updated,
            // The creation payload has a single address slot; a distinct
            // billing address is not supported.
            address: order.shipping_address.clone(),
            items,
        })
    }

    // ---- gateway calls ----

    async fn seller_non_shipped_orders(&self, page: u32) -> Result<Vec<Order>, SyncError> {
        let resp = self
            .client
            .get("/orders?shipped=false", page, &self.seller_api_key, None)
            .await?;
        Ok(serde_json::from_slice(&resp)?)
    }

    async fn buyer_shipped_orders(&self, page: u32) -> Result<Vec<Order>, SyncError> {
        let resp = self
            .client
            .get("/orders?shipped=true", page, &self.buyer_api_key, None)
            .await?;
        Ok(serde_json::from_slice(&resp)?)
    }

    async fn buyer_order_by_code(&self, code: &str) -> Result<Option<Order>, SyncError> {
        let path = format!("/orders?buyerOrderCode={}", urlencoding::encode(code));
        let resp = self
            .client
            .get(&path, 0, &self.buyer_api_key, self.since.as_ref())
            .await?;
        let mut orders: Vec<Order> = serde_json::from_slice(&resp)?;
        if orders.is_empty() {
            return Ok(None);
        }
        Ok(Some(orders.remove(0)))
    }

    /// More than one seller order behind a single code is an inconsistency
    /// the platform should never produce; it is reported, never resolved by
    /// picking one.
    async fn seller_order_by_code(&self, code: &str) -> Result<Option<Order>, SyncError> {
        let path = format!("/orders?sellerOrderCode={}", urlencoding::encode(code));
        let resp = self
            .client
            .get(&path, 0, &self.seller_api_key, None)
            .await?;
        let mut orders: Vec<Order> = serde_json::from_slice(&resp)?;
        match orders.len() {
            0 => Ok(None),
            1 => Ok(Some(orders.remove(0))),
            _ => Err(SyncError::DuplicateOrder(code.to_string())),
        }
    }

    async fn create_buyer_order(&self, buyer_order: &BuyerOrder) -> Result<String, SyncError> {
        let payload = serde_json::to_vec(buyer_order)?;
        let resp = self
            .client
            .post("/buyer/orders", &self.buyer_api_key, payload)
            .await?;
        let created: BuyerOrder = serde_json::from_slice(&resp)?;
        Ok(created.id)
    }

    /// One create call per fulfillment record, sequential, each rate-gated by
    /// the transport client.
    async fn create_fulfillments(
        &self,
        order_id: &str,
        fulfillments: &[Fulfillment],
    ) -> Result<(), SyncError> {
        for (index, fulfillment) in fulfillments.iter().enumerate() {
            let items = fulfillment
                .items
                .iter()
                .map(|item| NewFulfillmentItem {
                    id: index as i32 + 1,
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                })
                .collect();
            let body = NewFulfillmentRequestBody {
                carrier: fulfillment.carrier.clone(),
                tracking_code: fulfillment.tracking_code.clone(),
                tracking_urls: fulfillment.tracking_urls.clone(),
                items,
            };
            let payload = serde_json::to_vec(&body)?;
            self.client
                .post(
                    &format!("/orders/{order_id}/fulfillments"),
                    &self.seller_api_key,
                    payload,
                )
                .await?;
            self.record(Event::FulfillmentCreated {
                order_id: order_id.to_string(),
                carrier: body.carrier.clone(),
                tracking_code: body.tracking_code.clone(),
            });
        }
        Ok(())
    }

    fn record(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}
