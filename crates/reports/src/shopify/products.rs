//! Product snapshot and catalog fetching.
//!
//! Snapshots enrich line items with inventory, committed quantities,
//! collections, and pricing, fetched via `nodes(ids:)` batches.
//! Enrichment is best-effort: a failed batch is logged and skipped so
//! one bad product id cannot sink a run. The catalog scan walks the
//! whole `products` connection instead and is all-or-nothing, since
//! hygiene views over a partial catalog would underreport.

use std::collections::HashMap;

use marginalia_core::ProductId;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::model::{CatalogProduct, ProductSnapshot};

use super::{Connection, ReportsClient, ShopifyError};

/// Products per `nodes(ids:)` call, bounded by query cost.
const BATCH_SIZE: usize = 25;

/// Products per catalog scan page.
const CATALOG_PAGE_SIZE: u32 = 50;

const PRODUCT_SNAPSHOTS_QUERY: &str = r#"
query ProductSnapshots($ids: [ID!]!) {
  nodes(ids: $ids) {
    ... on Product {
      id
      title
      vendor
      totalInventory
      tracksInventory
      priceRangeV2 {
        minVariantPrice {
          amount
        }
      }
      collections(first: 20) {
        pageInfo {
          hasNextPage
          endCursor
        }
        edges {
          node {
            title
          }
        }
      }
      variants(first: 50) {
        pageInfo {
          hasNextPage
          endCursor
        }
        edges {
          node {
            inventoryItem {
              inventoryLevels(first: 10) {
                pageInfo {
                  hasNextPage
                  endCursor
                }
                edges {
                  node {
                    quantities(names: ["committed", "incoming"]) {
                      name
                      quantity
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const CATALOG_QUERY: &str = r#"
query CatalogProducts($pageSize: Int!, $cursor: String) {
  products(first: $pageSize, after: $cursor) {
    pageInfo {
      hasNextPage
      endCursor
    }
    edges {
      node {
        id
        title
        vendor
        status
        totalInventory
        tracksInventory
        priceRangeV2 {
          minVariantPrice {
            amount
          }
        }
        collections(first: 20) {
          pageInfo {
            hasNextPage
            endCursor
          }
          edges {
            node {
              title
            }
          }
        }
        variants(first: 50) {
          pageInfo {
            hasNextPage
            endCursor
          }
          edges {
            node {
              inventoryItem {
                inventoryLevels(first: 10) {
                  pageInfo {
                    hasNextPage
                    endCursor
                  }
                  edges {
                    node {
                      quantities(names: ["committed", "incoming"]) {
                        name
                        quantity
                      }
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct NodesData {
    nodes: Vec<Option<ProductNode>>,
}

#[derive(Debug, Deserialize)]
struct CatalogData {
    products: Connection<ProductNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductNode {
    id: String,
    title: String,
    vendor: Option<String>,
    /// Only selected by the catalog query; absent from snapshot batches.
    #[serde(default)]
    status: Option<String>,
    total_inventory: Option<i64>,
    #[serde(default)]
    tracks_inventory: bool,
    price_range_v2: Option<PriceRangeNode>,
    collections: Connection<CollectionNode>,
    variants: Connection<VariantNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRangeNode {
    min_variant_price: MoneyNode,
}

#[derive(Debug, Deserialize)]
struct MoneyNode {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct CollectionNode {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    inventory_item: InventoryItemNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryItemNode {
    inventory_levels: Connection<InventoryLevelNode>,
}

#[derive(Debug, Deserialize)]
struct InventoryLevelNode {
    quantities: Vec<QuantityNode>,
}

#[derive(Debug, Deserialize)]
struct QuantityNode {
    name: String,
    quantity: i64,
}

// =============================================================================
// Fetching
// =============================================================================

/// Fetch point-in-time snapshots for the given products.
///
/// Ids are queried in batches of [`BATCH_SIZE`]. A failed batch is
/// logged at error level and skipped; its products simply have no
/// snapshot and downstream stages fall back accordingly.
#[instrument(skip(client, ids), fields(products = ids.len()))]
pub async fn fetch_product_snapshots(
    client: &ReportsClient,
    ids: &[ProductId],
) -> HashMap<ProductId, ProductSnapshot> {
    let mut snapshots = HashMap::with_capacity(ids.len());

    for batch in ids.chunks(BATCH_SIZE) {
        let id_strings: Vec<&str> = batch.iter().map(ProductId::as_str).collect();
        let variables = serde_json::json!({ "ids": id_strings });

        match client
            .execute::<NodesData>(PRODUCT_SNAPSHOTS_QUERY, variables)
            .await
        {
            Ok(data) => {
                for node in data.nodes.into_iter().flatten() {
                    let product = convert_product(node);
                    snapshots.insert(product.id, product.snapshot);
                }
            }
            Err(err) => {
                error!(batch = batch.len(), %err, "product snapshot batch failed; skipping");
            }
        }
    }

    debug!(count = snapshots.len(), "fetched product snapshots");
    snapshots
}

/// Walk the entire product catalog, one page at a time.
///
/// Unlike snapshot enrichment this is fatal on error: the maintenance
/// views compare against the whole catalog, and a truncated scan would
/// silently drop findings.
#[instrument(skip(client))]
pub async fn fetch_catalog_products(
    client: &ReportsClient,
) -> Result<Vec<CatalogProduct>, ShopifyError> {
    let mut products = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let variables = serde_json::json!({
            "pageSize": CATALOG_PAGE_SIZE,
            "cursor": cursor,
        });
        let data: CatalogData = client.execute(CATALOG_QUERY, variables).await?;
        let page = data.products;

        products.extend(page.edges.into_iter().map(|e| convert_product(e.node)));

        if !page.page_info.has_next_page {
            break;
        }
        cursor = Some(page.page_info.end_cursor.ok_or_else(|| {
            ShopifyError::MissingData("hasNextPage without endCursor".to_string())
        })?);
    }

    debug!(count = products.len(), "fetched product catalog");
    Ok(products)
}

// =============================================================================
// Conversion
// =============================================================================

fn convert_product(node: ProductNode) -> CatalogProduct {
    let mut committed = 0;
    let mut incoming = 0;
    for variant in node.variants.edges {
        for level in variant.node.inventory_item.inventory_levels.edges {
            for q in level.node.quantities {
                match q.name.as_str() {
                    "committed" => committed += q.quantity,
                    "incoming" => incoming += q.quantity,
                    _ => {}
                }
            }
        }
    }

    let snapshot = ProductSnapshot {
        title: node.title,
        vendor: node.vendor,
        total_inventory: if node.tracks_inventory {
            node.total_inventory
        } else {
            None
        },
        incoming,
        committed,
        min_price: node
            .price_range_v2
            .and_then(|p| p.min_variant_price.amount.parse::<Decimal>().ok()),
        collections: node
            .collections
            .edges
            .into_iter()
            .map(|e| e.node.title)
            .collect(),
    };

    CatalogProduct {
        id: ProductId::new(node.id),
        active: node.status.as_deref() == Some("ACTIVE"),
        snapshot,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_and_incoming_sum_across_variants_and_levels() {
        let json = serde_json::json!({
            "id": "gid://shopify/Product/7",
            "title": "Six Seasons",
            "vendor": "Artisan",
            "totalInventory": -2,
            "tracksInventory": true,
            "priceRangeV2": { "minVariantPrice": { "amount": "35.00" } },
            "collections": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "edges": [{ "node": { "title": "Cookbooks" } }]
            },
            "variants": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "edges": [
                    { "node": { "inventoryItem": { "inventoryLevels": {
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "edges": [
                            { "node": { "quantities": [
                                { "name": "committed", "quantity": 2 },
                                { "name": "incoming", "quantity": 5 }
                            ] } },
                            { "node": { "quantities": [
                                { "name": "committed", "quantity": 1 }
                            ] } }
                        ]
                    } } } },
                    { "node": { "inventoryItem": { "inventoryLevels": {
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "edges": [
                            { "node": { "quantities": [
                                { "name": "committed", "quantity": 4 },
                                { "name": "incoming", "quantity": 1 }
                            ] } }
                        ]
                    } } } }
                ]
            }
        });

        let node: ProductNode = serde_json::from_value(json).unwrap();
        let product = convert_product(node);
        assert_eq!(product.id.as_str(), "gid://shopify/Product/7");
        assert_eq!(product.snapshot.committed, 7);
        assert_eq!(product.snapshot.incoming, 6);
        assert_eq!(product.snapshot.total_inventory, Some(-2));
        assert_eq!(product.snapshot.min_price, Some(Decimal::new(3500, 2)));
        assert_eq!(
            product.snapshot.collections,
            vec!["Cookbooks".to_string()]
        );
    }

    #[test]
    fn test_untracked_inventory_is_none() {
        let json = serde_json::json!({
            "id": "gid://shopify/Product/8",
            "title": "Gift Wrap",
            "vendor": null,
            "totalInventory": 0,
            "tracksInventory": false,
            "priceRangeV2": null,
            "collections": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "edges": []
            },
            "variants": {
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "edges": []
            }
        });

        let node: ProductNode = serde_json::from_value(json).unwrap();
        let product = convert_product(node);
        assert_eq!(product.snapshot.total_inventory, None);
        assert_eq!(product.snapshot.min_price, None);
        assert!(!product.active);
    }

    #[test]
    fn test_catalog_page_carries_status() {
        let json = serde_json::json!({
            "products": {
                "pageInfo": { "hasNextPage": true, "endCursor": "pg1" },
                "edges": [{ "node": {
                    "id": "gid://shopify/Product/9",
                    "title": "An Everlasting Meal",
                    "vendor": "Scribner",
                    "status": "ACTIVE",
                    "totalInventory": 4,
                    "tracksInventory": true,
                    "priceRangeV2": null,
                    "collections": {
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "edges": []
                    },
                    "variants": {
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "edges": []
                    }
                } }]
            }
        });

        let data: CatalogData = serde_json::from_value(json).unwrap();
        assert!(data.products.page_info.has_next_page);
        let product = convert_product(data.products.edges.into_iter().next().unwrap().node);
        assert!(product.active);
        assert_eq!(product.snapshot.title, "An Everlasting Meal");
    }
}
