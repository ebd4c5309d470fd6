//! Sales-channel classification for orders.
//!
//! Shopify exposes two overlapping signals for where an order originated:
//! the legacy `sourceName` field and the newer `channel.handle`. Either one
//! identifying the online store marks the order as online; everything else
//! is treated as point-of-sale.

use serde::{Deserialize, Serialize};

/// Source name reported by web checkout orders.
const WEB_SOURCE_NAME: &str = "web";
/// Channel handle of the online store sales channel.
const ONLINE_STORE_HANDLE: &str = "online_store";

/// The sales channel an order came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
    /// Web checkout / online store.
    Online,
    /// In-store point-of-sale (and any unrecognized source).
    PointOfSale,
}

impl SalesChannel {
    /// Classify an order from its source name and channel handle.
    ///
    /// Both signals are consulted because older orders carry only
    /// `sourceName` while newer ones carry `channel.handle`.
    #[must_use]
    pub fn classify(source_name: Option<&str>, channel_handle: Option<&str>) -> Self {
        let is_online =
            source_name == Some(WEB_SOURCE_NAME) || channel_handle == Some(ONLINE_STORE_HANDLE);
        if is_online { Self::Online } else { Self::PointOfSale }
    }

    /// Whether this is the online channel.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}
