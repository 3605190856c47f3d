//! key-auth plugin configuration merge.
//!
//! Identity key is the bare credential string. Besides consumers and rules,
//! key-auth documents carry `keys`/`in_query`/`in_header` describing where
//! the gateway reads the key from; those survive a merge unless the update
//! explicitly replaces them.

use tracing::debug;

use super::consumer_acl::{self, AclIdentity};
use crate::wire::ConsumerAclDocument;
use crate::Result;

pub fn merge(
    current: &ConsumerAclDocument,
    update: &ConsumerAclDocument,
) -> Result<ConsumerAclDocument> {
    let mut next = consumer_acl::merge(current, update, AclIdentity::Credential)?;
    carry_key_lookup(&mut next, current, update);
    debug!(
        consumers = next.consumers.len(),
        rules = next.rules.len(),
        "merged key-auth configuration"
    );
    Ok(next)
}

/// Drop one consumer from every allow-list; used when a consumer is deleted.
pub fn remove_consumer(current: &ConsumerAclDocument, consumer_name: &str) -> ConsumerAclDocument {
    let mut next = consumer_acl::remove_consumer(current, consumer_name, AclIdentity::Credential);
    carry_key_lookup(&mut next, current, &ConsumerAclDocument::default());
    next
}

/// Drop the consumer entry holding one credential value; allow-lists are kept.
pub fn remove_credential(
    current: &ConsumerAclDocument,
    credential_value: &str,
) -> ConsumerAclDocument {
    let mut next =
        consumer_acl::remove_credential(current, credential_value, AclIdentity::Credential);
    carry_key_lookup(&mut next, current, &ConsumerAclDocument::default());
    next
}

fn carry_key_lookup(
    next: &mut ConsumerAclDocument,
    current: &ConsumerAclDocument,
    update: &ConsumerAclDocument,
) {
    next.keys = update.keys.clone().or_else(|| current.keys.clone());
    next.in_query = update.in_query.or(current.in_query);
    next.in_header = update.in_header.or(current.in_header);
}
