// Signal chain - Ordered source → effects description of one track
//
// The single source is a dedicated field, so "exactly one source" holds by
// construction. Effects are append-only.

use super::types::{EffectModule, Module, ModuleId, SourceModule};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChain {
    source: SourceModule,
    #[serde(default)]
    effects: Vec<EffectModule>,
}

impl SignalChain {
    pub fn new(source: SourceModule) -> Self {
        Self {
            source,
            effects: Vec::new(),
        }
    }

    pub fn source(&self) -> &SourceModule {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut SourceModule {
        &mut self.source
    }

    pub fn effects(&self) -> &[EffectModule] {
        &self.effects
    }

    /// Append an effect at the tail of the chain
    pub fn push_effect(&mut self, effect: EffectModule) {
        self.effects.push(effect);
    }

    pub fn effect(&self, id: &ModuleId) -> Option<&EffectModule> {
        self.effects.iter().find(|e| e.id() == id)
    }

    pub fn effect_mut(&mut self, id: &ModuleId) -> Option<&mut EffectModule> {
        self.effects.iter_mut().find(|e| e.id() == id)
    }

    /// Number of modules, source included
    pub fn len(&self) -> usize {
        1 + self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ids in routing order
    pub fn ids(&self) -> Vec<ModuleId> {
        std::iter::once(self.source.id.clone())
            .chain(self.effects.iter().map(|e| e.id().clone()))
            .collect()
    }

    /// Owned copy of every module in routing order
    pub fn modules(&self) -> Vec<Module> {
        std::iter::once(Module::Source(self.source.clone()))
            .chain(self.effects.iter().cloned().map(Module::Effect))
            .collect()
    }

    /// True when no two modules share an id
    pub fn has_unique_ids(&self) -> bool {
        let ids = self.ids();
        let mut seen = std::collections::HashSet::new();
        ids.iter().all(|id| seen.insert(id))
    }
}
