//! Chat dispatcher assembly from the provider catalog.

use polychat_adapters::{TimedHttpClient, adapter_for};
use polychat_app::{ChatDispatcher, ProviderRoute};
use polychat_config::{ProviderCatalog, ValidatedClientSettings};
use polychat_domain::EndpointValidator;
use polychat_ports::{ChatProviderPort, LoggerPort};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Build a dispatcher with one route per catalog entry.
///
/// Providers sharing a protocol family share one adapter. Settings overrides
/// replace catalog endpoints and default models.
pub fn build_dispatcher(
    catalog: &ProviderCatalog,
    settings: &ValidatedClientSettings,
    http: &Arc<TimedHttpClient>,
    logger: Option<Arc<dyn LoggerPort>>,
) -> ChatDispatcher {
    let endpoints = EndpointValidator::new(settings.http.allow_loopback);
    let mut adapters: BTreeMap<&'static str, Arc<dyn ChatProviderPort>> = BTreeMap::new();
    let mut dispatcher = ChatDispatcher::new();
    if let Some(logger) = logger {
        dispatcher = dispatcher.with_logger(logger);
    }

    for descriptor in &catalog.entries {
        let adapter = Arc::clone(
            adapters
                .entry(descriptor.protocol.as_str())
                .or_insert_with(|| adapter_for(descriptor.protocol, Arc::clone(http), endpoints)),
        );
        let mut route = ProviderRoute::from_descriptor(descriptor, adapter);
        if let Some(overrides) = settings.provider_override(&descriptor.id) {
            if let Some(endpoint) = overrides.endpoint.as_deref() {
                route.endpoint = endpoint.to_string();
            }
            if let Some(model) = overrides.default_model.as_deref() {
                route.default_model = model.to_string();
            }
        }
        if dispatcher.register(descriptor.id.clone(), route).is_some() {
            tracing::warn!(provider = %descriptor.id, "duplicate provider entry replaced");
        }
    }

    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_config::{
        ClientSettings, ProviderOverride, ProvidersDomain, bundled_json, parse_document,
    };
    use polychat_domain::{ConfigDomain, ProtocolFamily, ProviderId};
    use polychat_shared::Result;
    use std::time::Duration;

    fn catalog() -> ProviderCatalog {
        parse_document::<ProvidersDomain>(bundled_json(ConfigDomain::Providers))
            .expect("bundled catalog")
    }

    fn http() -> Result<Arc<TimedHttpClient>> {
        Ok(Arc::new(TimedHttpClient::new(Duration::from_secs(5))?))
    }

    #[test]
    fn every_catalog_entry_is_routed() -> Result<()> {
        let catalog = catalog();
        let settings = ClientSettings::default()
            .validate_and_normalize()
            .expect("default settings");
        let dispatcher = build_dispatcher(&catalog, &settings, &http()?, None);

        for descriptor in &catalog.entries {
            assert!(dispatcher.supports(&descriptor.id), "{}", descriptor.id);
        }
        Ok(())
    }

    #[test]
    fn overrides_replace_endpoint_and_model() -> Result<()> {
        let mut raw = ClientSettings::default();
        raw.providers.insert(
            "openai".to_string(),
            ProviderOverride {
                endpoint: Some("https://proxy.example.com/v1/chat/completions".to_string()),
                default_model: Some("gpt-4.1".to_string()),
            },
        );
        let settings = raw.validate_and_normalize().expect("valid settings");
        let dispatcher = build_dispatcher(&catalog(), &settings, &http()?, None);

        let openai = ProviderId::parse("openai").expect("provider id");
        let (id, route) = dispatcher
            .routes()
            .find(|(id, _)| **id == openai)
            .expect("openai route");
        assert_eq!(id.as_str(), "openai");
        assert_eq!(route.endpoint, "https://proxy.example.com/v1/chat/completions");
        assert_eq!(route.default_model, "gpt-4.1");
        Ok(())
    }

    #[test]
    fn providers_of_one_family_share_an_adapter() -> Result<()> {
        let catalog = catalog();
        let settings = ClientSettings::default()
            .validate_and_normalize()
            .expect("default settings");
        let dispatcher = build_dispatcher(&catalog, &settings, &http()?, None);

        let openai_family: Vec<&ProviderRoute> = dispatcher
            .routes()
            .map(|(_, route)| route)
            .filter(|route| route.protocol() == ProtocolFamily::OpenAi)
            .collect();
        assert!(openai_family.len() > 1);
        if let [first, rest @ ..] = openai_family.as_slice() {
            for route in rest {
                assert!(Arc::ptr_eq(&first.adapter, &route.adapter));
            }
        }
        Ok(())
    }
}
