//! Parameter modulation
//!
//! A numeric control input of a module (an oscillator's frequency, a gain
//! amount) is a parameter. Each parameter is fed by a [`ParamSource`]:
//!
//! - a constant, replicated across a full block each cycle, or
//! - the root of a module sub-chain, whose processed block is handed to the
//!   owner verbatim. This is how one chain modulates another (an LFO driving
//!   a frequency, an envelope driving a gain).
//!
//! The owner never sees the difference: its `process` hook reads one block
//! per parameter from the [`ProcessContext`](crate::module::ProcessContext).
//! A [`ParamSet`] holds every parameter of one module so the chain can fan
//! lifecycle calls out to all of them.

use crate::block::AudioBlock;
use crate::chain::ModuleId;
use crate::info::ChainInfo;
use crate::module::ParamDef;

/// Where a parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSource {
    Constant(f64),
    /// Root of a sub-chain pulled once per owner cycle
    Module(ModuleId),
}

impl ParamSource {
    /// Sub-chain root, if this parameter is modulated
    pub fn module(&self) -> Option<ModuleId> {
        match self {
            ParamSource::Module(id) => Some(*id),
            ParamSource::Constant(_) => None,
        }
    }

    /// Block for a constant source sized from the owner's descriptor
    pub fn constant_block(&self, info: &ChainInfo) -> Option<AudioBlock> {
        match self {
            ParamSource::Constant(value) => Some(AudioBlock::constant(
                info.block_size,
                info.channels,
                *value,
            )),
            ParamSource::Module(_) => None,
        }
    }
}

/// One declared parameter and its current source
#[derive(Debug, Clone)]
pub struct ModuleParam {
    def: ParamDef,
    source: ParamSource,
}

impl ModuleParam {
    pub fn new(def: ParamDef) -> Self {
        let source = ParamSource::Constant(def.default);
        Self { def, source }
    }

    pub fn def(&self) -> &ParamDef {
        &self.def
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    pub fn set_constant(&mut self, value: f64) {
        self.source = ParamSource::Constant(value);
    }

    pub fn set_module(&mut self, root: ModuleId) {
        self.source = ParamSource::Module(root);
    }

    /// Return to the declared default
    pub fn reset(&mut self) {
        self.source = ParamSource::Constant(self.def.default);
    }
}

/// Fixed-size collection of parameters owned on behalf of one module
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    params: Vec<ModuleParam>,
}

impl ParamSet {
    /// Build from a module's declarations, every parameter at its default
    pub fn from_defs(defs: &[ParamDef]) -> Self {
        Self {
            params: defs.iter().cloned().map(ModuleParam::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModuleParam> {
        self.params.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ModuleParam> {
        self.params.get_mut(index)
    }

    /// Index of the parameter called `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.def.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleParam> {
        self.params.iter()
    }

    /// Sources in declaration order
    pub fn sources(&self) -> Vec<ParamSource> {
        self.params.iter().map(|p| p.source).collect()
    }

    /// Roots of every modulating sub-chain
    pub fn sub_chains(&self) -> Vec<ModuleId> {
        self.params.iter().filter_map(|p| p.source.module()).collect()
    }

    /// Reset every parameter fed by `root` back to its default
    pub fn detach(&mut self, root: ModuleId) {
        for param in &mut self.params {
            if param.source == ParamSource::Module(root) {
                param.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn defs() -> Vec<ParamDef> {
        vec![ParamDef::new("frequency", 440.0), ParamDef::new("gain", 1.0)]
    }

    #[test]
    fn test_defaults_are_constants() {
        let set = ParamSet::from_defs(&defs());
        assert_eq!(set.len(), 2);
        assert_eq!(set.sources(), vec![ParamSource::Constant(440.0), ParamSource::Constant(1.0)]);
        assert_eq!(set.index_of("gain"), Some(1));
        assert!(set.sub_chains().is_empty());
    }

    #[test]
    fn test_constant_block_fills_descriptor_shape() {
        let info = ChainInfo::new(1000, 2, 16);
        let block = ParamSource::Constant(0.25).constant_block(&info).unwrap();
        assert_eq!(block.frames(), 16);
        assert_eq!(block.channels(), 2);
        assert!(block.as_slice().iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_modulate_and_detach() {
        let mut keys: SlotMap<ModuleId, ()> = SlotMap::with_key();
        let lfo = keys.insert(());

        let mut set = ParamSet::from_defs(&defs());
        set.get_mut(0).unwrap().set_module(lfo);
        assert_eq!(set.sub_chains(), vec![lfo]);
        assert!(ParamSource::Module(lfo).constant_block(&ChainInfo::default()).is_none());

        set.detach(lfo);
        assert_eq!(set.get(0).unwrap().source(), ParamSource::Constant(440.0));
    }
}
