use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent::{AgentConfig, AgentTier};
use crate::error::CatalogError;

const BUILTIN_CATALOG: &str = include_str!("../agents.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
#[serde(tag = "version")]
enum VersionedCatalog {
    #[serde(rename = "0.1")]
    V01 { agents: Vec<AgentConfig> },
}

/// The agents offered by the marketplace, in listing order.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: Vec<Arc<AgentConfig>>,
    index: HashMap<String, usize>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentConfig>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(agents.len());
        for (position, agent) in agents.iter().enumerate() {
            if agent.tier == AgentTier::Premium && agent.price_cents.is_none() {
                return Err(CatalogError::MissingPrice(agent.id.clone()));
            }
            if index.insert(agent.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateAgent(agent.id.clone()));
            }
        }
        Ok(Self {
            agents: agents.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self, CatalogError> {
        let VersionedCatalog::V01 { agents } = serde_yml::from_str(source)?;
        Self::new(agents)
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        tracing::debug!(?path, "loading agent catalog");
        let source = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_yaml(&source)?;
        tracing::info!(agents = catalog.len(), "loaded agent catalog");
        Ok(catalog)
    }

    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<Arc<AgentConfig>> {
        self.index.get(agent_id).map(|&position| Arc::clone(&self.agents[position]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AgentConfig>> {
        self.agents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
