//! Wicket Policy Reconciler
//!
//! Consumer/credential lifecycle and plugin-configuration reconciliation for
//! the Wicket API-gateway control plane. Invoked as a library by an HTTP
//! service layer; there is no CLI surface here.
//!
//! The entry point is [`PolicyReconciler`], constructed from a
//! [`ProviderAdapter`] for the target backend, a
//! [`wicket_credential_store::CredentialStore`] and the cluster's
//! [`PluginRegistry`]. Grant and revoke operations fetch the deployed plugin
//! document, fold the change through the pure merge engine in
//! `wicket-control-core`, and push the result back, serialized per
//! (cluster, plugin) so concurrent writers cannot lose updates.

pub mod adapter;
pub mod grants;
pub mod lifecycle;
pub mod locks;
pub mod registry;

pub use adapter::{
    ConfigLevel, ConsumerReply, ConsumerRequest, CredentialInit, GatewayProvider,
    PluginConfigEntry, ProviderAdapter,
};
pub use grants::{render_legacy_allow_list, AllowList, RoutePolicy, LEGACY_EMPTY_ALLOW_LIST};
pub use lifecycle::{CredentialBundle, PolicyReconciler};
pub use locks::PluginLocks;
pub use registry::PluginRegistry;
