//! Translation of entitlement facts into vendor certificate extensions.
//!
//! Every method is lenient: a missing optional fact omits its wrapper, and
//! a fact that cannot be placed under a valid OID is skipped with a warning.
//! Nothing here fails.

use time::{OffsetDateTime, UtcOffset};
use tracing::warn;

use crate::cert::params::ExtensionWrapper;
use crate::error::Result;
use crate::model::{Consumer, Entitlement, Product, ProductContent, Subscription};
use crate::oid::{Namespace, OidTable, keys, validate_oid};

/// Product attribute holding the subscription warning period, in days.
pub const WARNING_PERIOD_ATTRIBUTE: &str = "warning_period";
pub const ARCH_ATTRIBUTE: &str = "arch";
pub const VERSION_ATTRIBUTE: &str = "version";

/// Builds ordered extension lists for consumers, subscriptions,
/// entitlements, products and content, using a shared [`OidTable`].
#[derive(Clone, Copy, Debug)]
pub struct X509ExtensionBuilder<'a> {
    oids: &'a OidTable,
}

/// Collects wrappers, dropping any whose OID could not be formed.
#[derive(Default)]
struct Wrappers(Vec<ExtensionWrapper>);

impl Wrappers {
    fn push(&mut self, oid: Result<String>, value: impl Into<String>) {
        match oid.and_then(|oid| validate_oid(&oid).map(|_| oid)) {
            Ok(oid) => self.0.push(ExtensionWrapper::text(oid, value)),
            Err(e) => warn!("Skipping extension: {}", e),
        }
    }
}

/// Renders `at` as `yyyy-MM-ddTHH:mm:ssZ` in UTC.
pub fn format_utc(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// A decimal OID arc in canonical form: digits only, no leading zero.
fn is_arc(id: &str) -> bool {
    !id.is_empty()
        && id.bytes().all(|b| b.is_ascii_digit())
        && (id == "0" || !id.starts_with('0'))
}

impl<'a> X509ExtensionBuilder<'a> {
    pub fn new(oids: &'a OidTable) -> Self {
        Self { oids }
    }

    pub fn oids(&self) -> &'a OidTable {
        self.oids
    }

    /// The consumer UUID under the system namespace.
    pub fn consumer_extensions(&self, consumer: &Consumer) -> Vec<ExtensionWrapper> {
        let mut out = Wrappers::default();
        out.push(self.oids.oid(Namespace::System, keys::UUID), &consumer.uuid);
        out.0
    }

    /// Order facts of a subscription under the order namespace.
    ///
    /// Product id and SKU are omitted when the subscription has no product.
    pub fn subscription_extensions(&self, subscription: &Subscription) -> Vec<ExtensionWrapper> {
        let order = |key| self.oids.oid(Namespace::Order, key);
        let product = subscription.product.as_ref();
        let mut out = Wrappers::default();

        match product {
            Some(product) => out.push(order(keys::ORDER_NAME), &product.id),
            None => warn!("Subscription {} has no product", subscription.id),
        }
        out.push(order(keys::ORDER_NUMBER), &subscription.id);
        if let Some(product) = product {
            out.push(order(keys::ORDER_SKU), &product.id);
        }
        out.push(order(keys::ORDER_QUANTITY), subscription.quantity.to_string());
        out.push(order(keys::ORDER_START_DATE), format_utc(subscription.start_date));
        out.push(order(keys::ORDER_END_DATE), format_utc(subscription.end_date));

        let warning_period = product
            .and_then(|p| p.attribute_value(WARNING_PERIOD_ATTRIBUTE))
            .unwrap_or("0");
        out.push(order(keys::ORDER_WARNING_PERIOD), warning_period);

        if let Some(contract_number) = &subscription.contract_number {
            out.push(order(keys::ORDER_CONTRACT_NUMBER), contract_number);
        }
        if let Some(account_number) = &subscription.account_number {
            out.push(order(keys::ORDER_ACCOUNT_NUMBER), account_number);
        }
        out.0
    }

    /// The quantity consumed by an entitlement.
    pub fn entitlement_extensions(&self, entitlement: &Entitlement) -> Vec<ExtensionWrapper> {
        let mut out = Wrappers::default();
        out.push(
            self.oids.oid(Namespace::Order, keys::ORDER_QUANTITY_USED),
            entitlement.quantity.to_string(),
        );
        out.0
    }

    /// Product name, plus arch and version when the product declares them.
    ///
    /// The product id becomes an OID arc; a non-numeric id yields nothing.
    pub fn product_extensions(&self, product: &Product) -> Vec<ExtensionWrapper> {
        let mut out = Wrappers::default();
        if !is_arc(&product.id) {
            warn!("Product id '{}' is not a valid OID arc", product.id);
            return out.0;
        }

        let field = |key| -> Result<String> {
            Ok(format!(
                "{}.{}.{}",
                self.oids.namespace_oid(Namespace::ProductCert)?,
                product.id,
                self.oids.field_segment(Namespace::ProductCert, key)?
            ))
        };

        out.push(field(keys::PRODUCT_NAME), &product.name);
        if let Some(arch) = product.attribute_value(ARCH_ATTRIBUTE) {
            out.push(field(keys::PRODUCT_ARCH), arch);
        }
        if let Some(version) = product.attribute_value(VERSION_ATTRIBUTE) {
            out.push(field(keys::PRODUCT_VERSION), version);
        }
        out.0
    }

    /// Wrappers for every content set of `product`, in product order.
    pub fn content_extensions(&self, product: &Product) -> Vec<ExtensionWrapper> {
        product
            .product_content
            .iter()
            .flat_map(|pc| self.single_content_extensions(pc))
            .collect()
    }

    fn single_content_extensions(&self, pc: &ProductContent) -> Vec<ExtensionWrapper> {
        let content = &pc.content;
        let mut out = Wrappers::default();

        if !is_arc(&content.id) {
            warn!("Content id '{}' is not a valid OID arc", content.id);
            return out.0;
        }
        let base = match self.content_oid(&content.id, &content.content_type) {
            Ok(base) => base,
            Err(e) => {
                warn!("Skipping content {}: {}", content.id, e);
                return out.0;
            }
        };
        let field = |key| -> Result<String> {
            Ok(format!(
                "{base}.{}",
                self.oids.field_segment(Namespace::ChannelFamily, key)?
            ))
        };

        out.push(Ok(base.clone()), &content.content_type);
        out.push(field(keys::CONTENT_NAME), &content.name);
        out.push(field(keys::CONTENT_LABEL), &content.label);
        out.push(field(keys::CONTENT_VENDOR_ID), &content.vendor);
        if let Some(url) = &content.content_url {
            out.push(field(keys::CONTENT_DOWNLOAD_URL), url);
        }
        if let Some(url) = &content.gpg_url {
            out.push(field(keys::CONTENT_GPG_URL), url);
        }
        out.push(field(keys::CONTENT_FLEX_QUANTITY), pc.flex_entitlement.to_string());
        out.push(
            field(keys::CONTENT_PHYS_QUANTITY),
            pc.physical_entitlement.to_string(),
        );
        out.push(field(keys::CONTENT_ENABLED), if pc.enabled { "1" } else { "0" });
        if let Some(expire) = content.metadata_expire {
            out.push(field(keys::CONTENT_METADATA_EXPIRE), expire.to_string());
        }
        if let Some(tags) = &content.required_tags {
            out.push(field(keys::CONTENT_REQUIRED_TAGS), tags);
        }
        out.0
    }

    /// `<root>.<channel-family>.<content id>.<type code>`
    fn content_oid(&self, content_id: &str, content_type: &str) -> Result<String> {
        Ok(format!(
            "{}.{}.{}",
            self.oids.namespace_oid(Namespace::ChannelFamily)?,
            content_id,
            self.oids.content_type_segment(content_type)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Content;
    use std::collections::BTreeMap;
    use time::Duration;

    fn pairs(wrappers: &[ExtensionWrapper]) -> Vec<(String, String)> {
        wrappers
            .iter()
            .map(|w| (w.oid().to_string(), w.as_text().unwrap_or_default().to_string()))
            .collect()
    }

    fn product(id: &str) -> Product {
        Product::builder().id(id).name("Awesome OS").build()
    }

    fn subscription(contract_number: Option<&str>) -> Subscription {
        let start = OffsetDateTime::from_unix_timestamp(1_262_304_000).unwrap();
        Subscription::builder()
            .id("8a8d01")
            .product(product("37060"))
            .quantity(10)
            .start_date(start)
            .end_date(start + Duration::days(365))
            .maybe_contract_number(contract_number)
            .build()
    }

    #[test]
    fn test_consumer_uuid() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let consumer = Consumer::builder().uuid("abc-123").build();
        assert_eq!(
            pairs(&builder.consumer_extensions(&consumer)),
            vec![("1.3.6.1.4.1.2312.9.5.1".to_string(), "abc-123".to_string())]
        );
    }

    #[test]
    fn test_subscription_fields_in_order() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let got = pairs(&builder.subscription_extensions(&subscription(None)));
        let order = "1.3.6.1.4.1.2312.9.4";
        let expected: Vec<(String, String)> = [
            ("1", "37060"),
            ("2", "8a8d01"),
            ("3", "37060"),
            ("5", "10"),
            ("6", "2010-01-01T00:00:00Z"),
            ("7", "2011-01-01T00:00:00Z"),
            ("13", "0"),
        ]
        .iter()
        .map(|(field, value)| (format!("{order}.{field}"), value.to_string()))
        .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_contract_number_adds_one_wrapper() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let without = builder.subscription_extensions(&subscription(None));
        let with = builder.subscription_extensions(&subscription(Some("C-1")));
        assert_eq!(with.len(), without.len() + 1);
        let last = with.last().unwrap();
        assert_eq!(last.oid(), "1.3.6.1.4.1.2312.9.4.11");
        assert_eq!(last.as_text(), Some("C-1"));
    }

    #[test]
    fn test_warning_period_from_attribute() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let mut sub = subscription(None);
        sub.product = Some(
            Product::builder()
                .id("1")
                .name("p")
                .attributes(BTreeMap::from([(
                    WARNING_PERIOD_ATTRIBUTE.to_string(),
                    "30".to_string(),
                )]))
                .build(),
        );
        let wrappers = builder.subscription_extensions(&sub);
        let warning = wrappers
            .iter()
            .find(|w| w.oid() == "1.3.6.1.4.1.2312.9.4.13")
            .unwrap();
        assert_eq!(warning.as_text(), Some("30"));
    }

    #[test]
    fn test_subscription_without_product_is_lenient() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let mut sub = subscription(None);
        sub.product = None;
        let oids: Vec<String> = builder
            .subscription_extensions(&sub)
            .iter()
            .map(|w| w.oid().to_string())
            .collect();
        assert!(!oids.contains(&"1.3.6.1.4.1.2312.9.4.1".to_string()));
        assert!(!oids.contains(&"1.3.6.1.4.1.2312.9.4.3".to_string()));
        assert!(oids.contains(&"1.3.6.1.4.1.2312.9.4.2".to_string()));
    }

    #[test]
    fn test_entitlement_quantity_used() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let wrappers = builder.entitlement_extensions(&Entitlement::builder().quantity(3).build());
        assert_eq!(
            pairs(&wrappers),
            vec![("1.3.6.1.4.1.2312.9.4.12".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn test_product_name_and_invalid_id() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        assert_eq!(
            pairs(&builder.product_extensions(&product("37060"))),
            vec![(
                "1.3.6.1.4.1.2312.9.1.37060.1".to_string(),
                "Awesome OS".to_string()
            )]
        );
        assert!(builder.product_extensions(&product("not-a-number")).is_empty());
    }

    #[test]
    fn test_leading_zero_id_is_skipped() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        assert!(builder.product_extensions(&product("0123")).is_empty());
        assert_eq!(builder.product_extensions(&product("0")).len(), 1);
        assert!(is_arc("100"));
        assert!(!is_arc("00"));
    }

    #[test]
    fn test_content_wrappers() {
        let table = OidTable::default();
        let builder = X509ExtensionBuilder::new(&table);
        let content = Content::builder()
            .id("1234")
            .content_type("yum")
            .name("base")
            .label("awesome-base")
            .vendor("test-vendor")
            .content_url("/content/base")
            .gpg_url("/gpg")
            .build();
        let mut prod = product("37060");
        prod.product_content = vec![
            ProductContent::builder()
                .content(content.clone())
                .flex_entitlement(2)
                .physical_entitlement(5)
                .build(),
            ProductContent::builder()
                .content(Content {
                    id: "99".to_string(),
                    content_type: "unknown".to_string(),
                    ..content
                })
                .enabled(false)
                .build(),
        ];

        let base = "1.3.6.1.4.1.2312.9.2.1234.1";
        let expected: Vec<(String, String)> = [
            ("", "yum"),
            (".1", "base"),
            (".2", "awesome-base"),
            (".5", "test-vendor"),
            (".6", "/content/base"),
            (".7", "/gpg"),
            (".4", "2"),
            (".3", "5"),
            (".8", "1"),
        ]
        .iter()
        .map(|(suffix, value)| (format!("{base}{suffix}"), value.to_string()))
        .collect();

        // The second content set has an unknown type and is skipped.
        assert_eq!(pairs(&builder.content_extensions(&prod)), expected);
    }

    #[test]
    fn test_format_utc_normalises_offset() {
        let at = OffsetDateTime::from_unix_timestamp(0)
            .unwrap()
            .to_offset(UtcOffset::from_hms(5, 30, 0).unwrap());
        assert_eq!(format_utc(at), "1970-01-01T00:00:00Z");
    }
}
