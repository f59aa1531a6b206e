//! Synapse model registry

use crate::{
    connection::{CommonSynapseProperties, Connection},
    error::{ConnectionError, Result},
    ids::{NodeId, SynapseTypeId},
    target::TargetMode,
};
use std::{any::TypeId, collections::HashMap};

/// Number of models the registry can hold; the last 9-bit id stays unused
pub const MAX_SYNAPSE_MODELS: usize = SynapseTypeId::MAX as usize;

/// A registered synapse model
#[derive(Debug, Clone)]
pub struct SynapseModel {
    name: String,
    id: SynapseTypeId,
    rust_type: TypeId,
    rust_name: &'static str,
    target_mode: TargetMode,
    common: CommonSynapseProperties,
}

impl SynapseModel {
    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigned synapse type id
    pub fn id(&self) -> SynapseTypeId {
        self.id
    }

    /// Model name of the Rust edge type
    pub fn edge_model(&self) -> &'static str {
        self.rust_name
    }

    /// Target representation of new edges
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Properties shared by all edges of this type
    pub fn common(&self) -> &CommonSynapseProperties {
        &self.common
    }
}

/// Assigns synapse type ids and keeps per-type properties
#[derive(Debug, Clone, Default)]
pub struct SynapseRegistry {
    models: Vec<SynapseModel>,
    by_name: HashMap<String, SynapseTypeId>,
}

impl SynapseRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register edge type `C` under `name`.
    ///
    /// The same edge type may be registered under several names; each gets
    /// its own id and common properties.
    pub fn register<C: Connection>(&mut self, name: impl Into<String>) -> Result<SynapseTypeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ConnectionError::configuration(format!(
                "synapse model '{}' is already registered",
                name
            )));
        }
        if self.models.len() >= MAX_SYNAPSE_MODELS {
            return Err(ConnectionError::configuration(format!(
                "cannot register '{}': at most {} synapse models are supported",
                name, MAX_SYNAPSE_MODELS
            )));
        }

        let id = SynapseTypeId::new(self.models.len() as u16)?;
        self.models.push(SynapseModel {
            name: name.clone(),
            id,
            rust_type: TypeId::of::<C>(),
            rust_name: C::MODEL_NAME,
            target_mode: TargetMode::default(),
            common: CommonSynapseProperties::default(),
        });
        self.by_name.insert(name, id);
        log::debug!("registered synapse model {} as {}", C::MODEL_NAME, id);
        Ok(id)
    }

    /// Model with id `id`
    pub fn get(&self, id: SynapseTypeId) -> Option<&SynapseModel> {
        self.models.get(id.raw() as usize)
    }

    /// Id registered under `name`
    pub fn id_of(&self, name: &str) -> Option<SynapseTypeId> {
        self.by_name.get(name).copied()
    }

    /// Model `id`, checked to be backed by edge type `C`
    pub fn expect<C: Connection>(&self, id: SynapseTypeId) -> Result<&SynapseModel> {
        match self.get(id) {
            Some(model) if model.rust_type == TypeId::of::<C>() => Ok(model),
            _ => Err(ConnectionError::UnknownSynapseModel {
                synapse_type: id,
                model: C::MODEL_NAME.to_string(),
            }),
        }
    }

    /// Common properties of `id`
    pub fn common(&self, id: SynapseTypeId) -> Option<&CommonSynapseProperties> {
        self.get(id).map(SynapseModel::common)
    }

    /// Route weight-record events of `id` to `recorder`
    pub fn set_weight_recorder(&mut self, id: SynapseTypeId, recorder: Option<NodeId>) -> Result<()> {
        self.model_mut(id)?.common.weight_recorder = recorder;
        Ok(())
    }

    /// Target representation for new edges of `id`
    pub fn set_target_mode(&mut self, id: SynapseTypeId, mode: TargetMode) -> Result<()> {
        self.model_mut(id)?.target_mode = mode;
        Ok(())
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in id order
    pub fn iter(&self) -> impl Iterator<Item = &SynapseModel> {
        self.models.iter()
    }

    fn model_mut(&mut self, id: SynapseTypeId) -> Result<&mut SynapseModel> {
        self.models
            .get_mut(id.raw() as usize)
            .ok_or_else(|| ConnectionError::configuration(format!("unknown synapse type {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{synapse::StaticSynapse, test_utils::BareEdge};

    #[test]
    fn test_ids_assigned_in_order() {
        let mut reg = SynapseRegistry::new();
        let a = reg.register::<StaticSynapse>("static_synapse").unwrap();
        let b = reg.register::<StaticSynapse>("static_copy").unwrap();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(reg.id_of("static_copy"), Some(b));
        assert!(reg.register::<BareEdge>("static_copy").is_err());
    }

    #[test]
    fn test_type_check() {
        let mut reg = SynapseRegistry::new();
        let id = reg.register::<StaticSynapse>("static_synapse").unwrap();
        assert!(reg.expect::<StaticSynapse>(id).is_ok());
        assert!(matches!(
            reg.expect::<BareEdge>(id),
            Err(ConnectionError::UnknownSynapseModel { .. })
        ));
    }

    #[test]
    fn test_capacity() {
        let mut reg = SynapseRegistry::new();
        for i in 0..MAX_SYNAPSE_MODELS {
            reg.register::<BareEdge>(format!("m{}", i)).unwrap();
        }
        assert!(matches!(
            reg.register::<BareEdge>("one_too_many"),
            Err(ConnectionError::Configuration { .. })
        ));
    }

    #[test]
    fn test_common_properties() {
        let mut reg = SynapseRegistry::new();
        let id = reg.register::<StaticSynapse>("static_synapse").unwrap();
        reg.set_weight_recorder(id, Some(NodeId::new(4))).unwrap();
        reg.set_target_mode(id, TargetMode::Indexed).unwrap();
        assert_eq!(reg.common(id).unwrap().weight_recorder, Some(NodeId::new(4)));
        assert_eq!(reg.get(id).unwrap().target_mode(), TargetMode::Indexed);
    }
}
