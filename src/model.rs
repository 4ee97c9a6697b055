//! Input records supplied by the persistence layer.
//!
//! These carry only the facts the extension builder reads; they are plain
//! values owned by the caller for the duration of one issuance.

use std::collections::BTreeMap;

use bon::Builder;
use time::OffsetDateTime;

/// The system a certificate is issued to.
#[derive(Clone, Debug, Builder)]
pub struct Consumer {
    #[builder(into)]
    pub uuid: String,
}

/// Content delivered by a product (a repository, file set, or kickstart tree).
#[derive(Clone, Debug, Builder)]
pub struct Content {
    #[builder(into)]
    pub id: String,
    /// Content type, e.g. `yum`.
    #[builder(into)]
    pub content_type: String,
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub label: String,
    #[builder(into)]
    pub vendor: String,
    #[builder(into)]
    pub content_url: Option<String>,
    #[builder(into)]
    pub gpg_url: Option<String>,
    /// Metadata expiry in seconds.
    pub metadata_expire: Option<i64>,
    /// Comma separated tags a consumer must provide.
    #[builder(into)]
    pub required_tags: Option<String>,
}

/// Association between a product and one of its content sets.
#[derive(Clone, Debug, Builder)]
pub struct ProductContent {
    pub content: Content,
    #[builder(default)]
    pub flex_entitlement: i64,
    #[builder(default)]
    pub physical_entitlement: i64,
    #[builder(default = true)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Builder)]
pub struct Product {
    #[builder(into)]
    pub id: String,
    #[builder(into)]
    pub name: String,
    #[builder(default)]
    pub attributes: BTreeMap<String, String>,
    #[builder(default)]
    pub product_content: Vec<ProductContent>,
}

impl Product {
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A subscription (order) a pool of entitlements was created from.
#[derive(Clone, Debug, Builder)]
pub struct Subscription {
    #[builder(into)]
    pub id: String,
    pub product: Option<Product>,
    pub quantity: i64,
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
    #[builder(into)]
    pub contract_number: Option<String>,
    #[builder(into)]
    pub account_number: Option<String>,
}

/// A consumer's claim against a subscription.
#[derive(Clone, Debug, Builder)]
pub struct Entitlement {
    pub quantity: i64,
}
