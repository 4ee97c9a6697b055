//! OID namespace table for vendor entitlement extensions.
//!
//! Every vendor extension lives under a single root OID, split into a closed
//! set of top-level namespaces. Each namespace maps semantic field keys to a
//! numeric sub-segment. The table is built once and shared read-only.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;

use crate::error::{PkiError, Result};

/// Default vendor root OID.
pub const VENDOR_ROOT_OID: &str = "1.3.6.1.4.1.2312.9";

/// Field keys understood by the default table.
pub mod keys {
    pub const UUID: &str = "uuid";
    pub const HOST_UUID: &str = "host_uuid";

    pub const ORDER_NAME: &str = "name";
    pub const ORDER_NUMBER: &str = "number";
    pub const ORDER_SKU: &str = "sku";
    pub const ORDER_REGNUM: &str = "regnum";
    pub const ORDER_QUANTITY: &str = "quantity";
    pub const ORDER_START_DATE: &str = "start_date";
    pub const ORDER_END_DATE: &str = "end_date";
    pub const ORDER_SUBTYPE: &str = "subtype";
    pub const ORDER_VIRT_LIMIT: &str = "virt_limit";
    pub const ORDER_SOCKET_LIMIT: &str = "socket_limit";
    pub const ORDER_CONTRACT_NUMBER: &str = "contract_number";
    pub const ORDER_QUANTITY_USED: &str = "quantity_used";
    pub const ORDER_WARNING_PERIOD: &str = "warning_period";
    pub const ORDER_ACCOUNT_NUMBER: &str = "account_number";

    pub const PRODUCT_NAME: &str = "name";
    pub const PRODUCT_DESC: &str = "desc";
    pub const PRODUCT_ARCH: &str = "arch";
    pub const PRODUCT_VERSION: &str = "version";

    pub const CONTENT_NAME: &str = "name";
    pub const CONTENT_LABEL: &str = "label";
    pub const CONTENT_PHYS_QUANTITY: &str = "phys_quantity";
    pub const CONTENT_FLEX_QUANTITY: &str = "flex_quantity";
    pub const CONTENT_VENDOR_ID: &str = "vendor_id";
    pub const CONTENT_DOWNLOAD_URL: &str = "download_url";
    pub const CONTENT_GPG_URL: &str = "gpg_url";
    pub const CONTENT_ENABLED: &str = "enabled";
    pub const CONTENT_METADATA_EXPIRE: &str = "metadata_expire";
    pub const CONTENT_REQUIRED_TAGS: &str = "required_tags";
}

/// Top-level namespaces below the vendor root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    ProductCert,
    ChannelFamily,
    Order,
    System,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::ProductCert,
        Namespace::ChannelFamily,
        Namespace::Order,
        Namespace::System,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Namespace::ProductCert => "product-cert",
            Namespace::ChannelFamily => "channel-family",
            Namespace::Order => "order",
            Namespace::System => "system",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Namespace {
    type Err = PkiError;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.key() == s)
            .ok_or_else(|| PkiError::UnknownKey(format!("namespace '{s}'")))
    }
}

/// Immutable mapping from semantic keys to dotted OID paths.
///
/// Constructed at startup (usually via [`OidTable::default`]) and passed to
/// whoever needs it; there is no global instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidTable {
    root: String,
    namespaces: BTreeMap<Namespace, u32>,
    fields: BTreeMap<Namespace, BTreeMap<String, u32>>,
    content_types: BTreeMap<String, u32>,
}

impl OidTable {
    /// Creates an empty table under `root`, which must be a valid OID.
    pub fn new(root: &str) -> Result<Self> {
        ObjectIdentifier::new(root)
            .map_err(|e| PkiError::InvalidInput(format!("root OID '{root}': {e}")))?;
        Ok(Self {
            root: root.to_string(),
            namespaces: BTreeMap::new(),
            fields: BTreeMap::new(),
            content_types: BTreeMap::new(),
        })
    }

    /// Registers the top-level segment for a namespace.
    pub fn with_namespace(mut self, namespace: Namespace, segment: u32) -> Self {
        self.namespaces.insert(namespace, segment);
        self
    }

    /// Registers a field sub-segment within a namespace.
    pub fn with_field(mut self, namespace: Namespace, key: &str, segment: u32) -> Self {
        self.fields
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), segment);
        self
    }

    /// Registers the OID code for a content type such as `yum`.
    pub fn with_content_type(mut self, content_type: &str, segment: u32) -> Self {
        self.content_types.insert(content_type.to_string(), segment);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns `root.<namespace>`.
    pub fn namespace_oid(&self, namespace: Namespace) -> Result<String> {
        let segment = self
            .namespaces
            .get(&namespace)
            .ok_or_else(|| PkiError::UnknownKey(format!("namespace '{namespace}'")))?;
        Ok(format!("{}.{}", self.root, segment))
    }

    /// Returns the sub-segment registered for `key` in `namespace`.
    pub fn field_segment(&self, namespace: Namespace, key: &str) -> Result<u32> {
        self.fields
            .get(&namespace)
            .and_then(|fields| fields.get(key))
            .copied()
            .ok_or_else(|| PkiError::UnknownKey(format!("field '{key}' in namespace '{namespace}'")))
    }

    /// Returns the code registered for a content type.
    pub fn content_type_segment(&self, content_type: &str) -> Result<u32> {
        self.content_types
            .get(content_type)
            .copied()
            .ok_or_else(|| PkiError::UnknownKey(format!("content type '{content_type}'")))
    }

    /// Returns `root.<namespace>.<field>`.
    pub fn oid(&self, namespace: Namespace, key: &str) -> Result<String> {
        let base = self.namespace_oid(namespace)?;
        let segment = self.field_segment(namespace, key)?;
        Ok(format!("{base}.{segment}"))
    }

    /// String-keyed lookup, e.g. `oid_for("order", "quantity")`.
    pub fn oid_for(&self, namespace_key: &str, field_key: &str) -> Result<String> {
        self.oid(namespace_key.parse()?, field_key)
    }
}

impl Default for OidTable {
    /// The vendor table used by entitlement consumers in the field.
    fn default() -> Self {
        use keys::*;
        use Namespace::*;

        let table = OidTable {
            root: VENDOR_ROOT_OID.to_string(),
            namespaces: BTreeMap::new(),
            fields: BTreeMap::new(),
            content_types: BTreeMap::new(),
        };

        table
            .with_namespace(ProductCert, 1)
            .with_namespace(ChannelFamily, 2)
            .with_namespace(Order, 4)
            .with_namespace(System, 5)
            .with_field(System, UUID, 1)
            .with_field(System, HOST_UUID, 2)
            .with_field(Order, ORDER_NAME, 1)
            .with_field(Order, ORDER_NUMBER, 2)
            .with_field(Order, ORDER_SKU, 3)
            .with_field(Order, ORDER_REGNUM, 4)
            .with_field(Order, ORDER_QUANTITY, 5)
            .with_field(Order, ORDER_START_DATE, 6)
            .with_field(Order, ORDER_END_DATE, 7)
            .with_field(Order, ORDER_SUBTYPE, 8)
            .with_field(Order, ORDER_VIRT_LIMIT, 9)
            .with_field(Order, ORDER_SOCKET_LIMIT, 10)
            .with_field(Order, ORDER_CONTRACT_NUMBER, 11)
            .with_field(Order, ORDER_QUANTITY_USED, 12)
            .with_field(Order, ORDER_WARNING_PERIOD, 13)
            .with_field(Order, ORDER_ACCOUNT_NUMBER, 14)
            .with_field(ProductCert, PRODUCT_NAME, 1)
            .with_field(ProductCert, PRODUCT_DESC, 2)
            .with_field(ProductCert, PRODUCT_ARCH, 3)
            .with_field(ProductCert, PRODUCT_VERSION, 4)
            .with_field(ChannelFamily, CONTENT_NAME, 1)
            .with_field(ChannelFamily, CONTENT_LABEL, 2)
            .with_field(ChannelFamily, CONTENT_PHYS_QUANTITY, 3)
            .with_field(ChannelFamily, CONTENT_FLEX_QUANTITY, 4)
            .with_field(ChannelFamily, CONTENT_VENDOR_ID, 5)
            .with_field(ChannelFamily, CONTENT_DOWNLOAD_URL, 6)
            .with_field(ChannelFamily, CONTENT_GPG_URL, 7)
            .with_field(ChannelFamily, CONTENT_ENABLED, 8)
            .with_field(ChannelFamily, CONTENT_METADATA_EXPIRE, 9)
            .with_field(ChannelFamily, CONTENT_REQUIRED_TAGS, 10)
            .with_content_type("yum", 1)
            .with_content_type("file", 2)
            .with_content_type("kickstart", 3)
    }
}

/// Checks that `oid` is a syntactically valid dotted-decimal OID.
pub fn validate_oid(oid: &str) -> Result<ObjectIdentifier> {
    ObjectIdentifier::new(oid).map_err(|e| PkiError::InvalidInput(format!("OID '{oid}': {e}")))
}
