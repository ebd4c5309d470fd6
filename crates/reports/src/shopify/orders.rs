//! Order fetching for the daily sales and unfulfilled audit reports.

use chrono::{DateTime, Utc};
use marginalia_core::{OrderId, ProductId, SalesChannel, VariantId};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::model::{LineItemRecord, OrderRecord, VariantRef};
use crate::risk::UnfulfilledLine;
use crate::window::TimeWindow;

use super::{Connection, ReportsClient, ShopifyError};

/// Orders per page; the first line-item page per order holds the same
/// figure, with follow-up queries for anything beyond it.
const PAGE_SIZE: u32 = 100;

const ORDERS_QUERY: &str = r"
query ReportOrders($query: String!, $pageSize: Int!, $cursor: String) {
  orders(first: $pageSize, query: $query, after: $cursor, sortKey: PROCESSED_AT) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        name
        processedAt
        sourceName
        channel {
          handle
        }
        lineItems(first: 100) {
          pageInfo {
            hasNextPage
            endCursor
          }
          edges {
            node {
              title
              quantity
              unfulfilledQuantity
              vendor
              customAttributes {
                key
                value
              }
              product {
                id
                totalInventory
                tracksInventory
              }
              variant {
                id
                sku
                barcode
              }
            }
          }
        }
      }
    }
  }
}
";

/// Follow-up query for orders whose line items span more than one page.
const ORDER_LINE_ITEMS_QUERY: &str = r"
query OrderLineItems($id: ID!, $cursor: String) {
  order(id: $id) {
    lineItems(first: 100, after: $cursor) {
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          title
          quantity
          unfulfilledQuantity
          vendor
          customAttributes {
            key
            value
          }
          product {
            id
            totalInventory
            tracksInventory
          }
          variant {
            id
            sku
            barcode
          }
        }
      }
    }
  }
}
";

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct OrdersData {
    orders: Connection<OrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderNode {
    id: String,
    name: String,
    processed_at: DateTime<Utc>,
    source_name: Option<String>,
    channel: Option<ChannelNode>,
    line_items: Connection<LineItemNode>,
}

#[derive(Debug, Deserialize)]
struct ChannelNode {
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemNode {
    title: String,
    quantity: i64,
    unfulfilled_quantity: i64,
    vendor: Option<String>,
    #[serde(default)]
    custom_attributes: Vec<CustomAttributeNode>,
    product: Option<ProductRefNode>,
    variant: Option<VariantNode>,
}

#[derive(Debug, Deserialize)]
struct CustomAttributeNode {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRefNode {
    id: String,
    total_inventory: Option<i64>,
    #[serde(default)]
    tracks_inventory: bool,
}

#[derive(Debug, Deserialize)]
struct VariantNode {
    id: String,
    sku: Option<String>,
    barcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderLineItemsData {
    order: Option<OrderLineItemsNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderLineItemsNode {
    line_items: Connection<LineItemNode>,
}

// =============================================================================
// Fetching
// =============================================================================

/// Fetch the paid, non-refunded orders inside the window.
///
/// The search-index range filter is advisory only: Shopify's index can
/// lag or drift, so every returned order is re-checked against the
/// window and drift is discarded (counted at warn level).
///
/// # Errors
///
/// A failed page is fatal to the run; there is no partial result.
#[instrument(skip(client))]
pub async fn fetch_sales_orders(
    client: &ReportsClient,
    window: &TimeWindow,
) -> Result<Vec<OrderRecord>, ShopifyError> {
    let query = format!(
        "financial_status:paid -financial_status:refunded processed_at:>='{}' processed_at:<='{}'",
        window.start.to_rfc3339(),
        window.end.to_rfc3339()
    );

    let nodes = fetch_all_order_pages(client, &query).await?;
    let total = nodes.len();

    let mut drift = 0usize;
    let orders: Vec<OrderRecord> = nodes
        .into_iter()
        .filter(|node| {
            if window.contains(&node.processed_at) {
                true
            } else {
                drift += 1;
                false
            }
        })
        .map(convert_order)
        .collect();

    if drift > 0 {
        warn!(drift, total, "discarded orders outside the window");
    }
    debug!(count = orders.len(), "fetched sales orders");
    Ok(orders)
}

/// Fetch the outstanding line items inside the window.
///
/// Adds the unfulfilled filter and keeps only line items with units
/// still awaiting fulfillment. Returns the lines plus the distinct
/// product ids touched (the snapshot fetch list).
///
/// # Errors
///
/// A failed page is fatal to the run.
#[instrument(skip(client))]
pub async fn fetch_unfulfilled_lines(
    client: &ReportsClient,
    window: &TimeWindow,
) -> Result<(Vec<UnfulfilledLine>, Vec<ProductId>), ShopifyError> {
    let query = format!(
        "financial_status:paid -financial_status:refunded fulfillment_status:unfulfilled \
         processed_at:>='{}' processed_at:<='{}'",
        window.start.to_rfc3339(),
        window.end.to_rfc3339()
    );

    let nodes = fetch_all_order_pages(client, &query).await?;

    let mut drift = 0usize;
    let mut lines = Vec::new();
    let mut product_ids = Vec::new();
    for node in nodes {
        if !window.contains(&node.processed_at) {
            drift += 1;
            continue;
        }
        let order_id = OrderId::new(node.id);
        for edge in node.line_items.edges {
            let item = edge.node;
            if item.unfulfilled_quantity <= 0 {
                continue;
            }
            let product_id = item.product.as_ref().map(|p| ProductId::new(p.id.clone()));
            if let Some(id) = &product_id
                && !product_ids.contains(id)
            {
                product_ids.push(id.clone());
            }
            lines.push(UnfulfilledLine {
                order_id: order_id.clone(),
                order_name: node.name.clone(),
                processed_at: node.processed_at,
                product_id,
                title: item.title,
                quantity: item.unfulfilled_quantity,
            });
        }
    }

    if drift > 0 {
        warn!(drift, "discarded unfulfilled orders outside the window");
    }
    debug!(
        lines = lines.len(),
        products = product_ids.len(),
        "fetched unfulfilled lines"
    );
    Ok((lines, product_ids))
}

async fn fetch_all_order_pages(
    client: &ReportsClient,
    query: &str,
) -> Result<Vec<OrderNode>, ShopifyError> {
    let mut nodes = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "query": query,
            "pageSize": PAGE_SIZE,
            "cursor": cursor,
        });
        let data: OrdersData = client.execute(ORDERS_QUERY, variables).await?;

        let page = data.orders;
        for edge in page.edges {
            let mut node = edge.node;
            complete_line_items(client, &mut node).await?;
            nodes.push(node);
        }

        if page.page_info.has_next_page {
            cursor = page.page_info.end_cursor;
            if cursor.is_none() {
                return Err(ShopifyError::MissingData(
                    "hasNextPage without endCursor".to_string(),
                ));
            }
        } else {
            return Ok(nodes);
        }
    }
}

/// Fetch the remaining line-item pages for an oversized order.
///
/// Most orders fit in one page; this only runs when the embedded
/// connection reports another page, so no quantity is ever truncated.
async fn complete_line_items(
    client: &ReportsClient,
    node: &mut OrderNode,
) -> Result<(), ShopifyError> {
    while node.line_items.page_info.has_next_page {
        let cursor = node.line_items.page_info.end_cursor.take().ok_or_else(|| {
            ShopifyError::MissingData("hasNextPage without endCursor".to_string())
        })?;
        let variables = serde_json::json!({ "id": node.id, "cursor": cursor });
        let data: OrderLineItemsData = client.execute(ORDER_LINE_ITEMS_QUERY, variables).await?;
        let page = data
            .order
            .ok_or_else(|| ShopifyError::MissingData(format!("order {} disappeared", node.id)))?
            .line_items;

        node.line_items.edges.extend(page.edges);
        node.line_items.page_info = page.page_info;
    }
    Ok(())
}

// =============================================================================
// Conversion
// =============================================================================

fn convert_order(node: OrderNode) -> OrderRecord {
    let channel = SalesChannel::classify(
        node.source_name.as_deref(),
        node.channel.as_ref().and_then(|c| c.handle.as_deref()),
    );
    let line_items = node
        .line_items
        .edges
        .into_iter()
        .map(|e| convert_line_item(e.node))
        .collect();

    OrderRecord {
        id: OrderId::new(node.id),
        name: node.name,
        processed_at: node.processed_at,
        channel,
        line_items,
    }
}

fn convert_line_item(node: LineItemNode) -> LineItemRecord {
    let product_total_inventory = node
        .product
        .as_ref()
        .filter(|p| p.tracks_inventory)
        .and_then(|p| p.total_inventory);

    LineItemRecord {
        title: node.title,
        quantity: node.quantity,
        unfulfilled_quantity: node.unfulfilled_quantity,
        vendor: node.vendor,
        product_id: node.product.map(|p| ProductId::new(p.id)),
        variant: node.variant.map(|v| VariantRef {
            id: VariantId::new(v.id),
            sku: v.sku,
            barcode: v.barcode,
        }),
        product_total_inventory,
        custom_attributes: node
            .custom_attributes
            .into_iter()
            .map(|a| (a.key, a.value.unwrap_or_default()))
            .collect(),
    }
}
