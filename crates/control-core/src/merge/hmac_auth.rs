//! hmac-auth plugin configuration merge.
//!
//! Same document shape as key-auth minus the key-lookup settings; the
//! identity key is the `key` half of each consumer's key/secret pair.

use tracing::debug;

use super::consumer_acl::{self, AclIdentity};
use crate::wire::ConsumerAclDocument;
use crate::Result;

pub fn merge(
    current: &ConsumerAclDocument,
    update: &ConsumerAclDocument,
) -> Result<ConsumerAclDocument> {
    let next = consumer_acl::merge(current, update, AclIdentity::Key)?;
    debug!(
        consumers = next.consumers.len(),
        rules = next.rules.len(),
        "merged hmac-auth configuration"
    );
    Ok(next)
}

pub fn remove_consumer(current: &ConsumerAclDocument, consumer_name: &str) -> ConsumerAclDocument {
    consumer_acl::remove_consumer(current, consumer_name, AclIdentity::Key)
}

pub fn remove_credential(
    current: &ConsumerAclDocument,
    credential_value: &str,
) -> ConsumerAclDocument {
    consumer_acl::remove_credential(current, credential_value, AclIdentity::Key)
}
