use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::ModelClient;
use crate::config::GeminiConfig;
use crate::dryrun::DryrunClient;
use crate::gemini::GeminiClient;

/// Model clients addressable by provider name.
#[derive(Default)]
pub struct ModelClientRegistry {
    clients: BTreeMap<String, Arc<dyn ModelClient>>,
}

impl ModelClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: ModelClient + 'static>(&mut self, client: C) {
        self.clients
            .insert(client.name().to_string(), Arc::new(client));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelClient>> {
        self.clients.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }
}

pub fn default_client_registry(gemini: GeminiConfig) -> anyhow::Result<ModelClientRegistry> {
    let mut clients = ModelClientRegistry::new();
    clients.register(DryrunClient::new());
    clients.register(GeminiClient::new(gemini)?);
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::default_client_registry;
    use crate::config::GeminiConfig;

    #[test]
    fn default_registry_has_gemini_and_dryrun() -> anyhow::Result<()> {
        let registry = default_client_registry(GeminiConfig::default().with_model("gemini-2.5-pro"))?;
        assert_eq!(registry.names(), vec!["dryrun", "gemini"]);
        let gemini = registry.get("gemini");
        assert_eq!(gemini.as_ref().map(|client| client.model()), Some("gemini-2.5-pro"));
        assert!(registry.get("openai").is_none());
        Ok(())
    }
}
