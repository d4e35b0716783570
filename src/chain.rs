//! Processing graph
//!
//! A [`Chain`] owns every module and every descriptor of a graph. Modules are
//! addressed by [`ModuleId`] handles into a slot map; links between them are
//! ids, never references, so the container is the single owner of all nodes.
//!
//! Topology is built with three operations:
//!
//! - [`Chain::bind`] attaches a predecessor behind a successor. It is the only
//!   way to extend a linear chain and always extends it at its open end.
//! - [`Chain::add_input`] attaches an extra input to a fan-in module
//!   ([`Mixdown`](crate::topology::Mixdown)).
//! - [`Chain::modulate`] feeds a parameter from a sub-chain.
//!
//! A driver then calls the four lifecycle entry points on the terminal module:
//!
//! ```text
//! configure -> start -> { process }* -> stop
//! ```
//!
//! `configure`, `start` and `stop` recurse backward first and act locally
//! last. `process` recurses backward, takes ownership of the predecessor's
//! finished block, hands it to the local hook and keeps the block the hook
//! returns until a successor (or the driver) takes it.
//!
//! Call order is the driver's responsibility and is not checked.

use crate::block::AudioBlock;
use crate::error::ChainError;
use crate::info::ChainInfo;
use crate::module::{AudioModule, ProcessContext, Transfer};
use crate::param::{ParamSet, ParamSource};
use log::debug;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashSet;

new_key_type! {
    /// Handle to a module owned by a [`Chain`]
    pub struct ModuleId;

    /// Handle to a descriptor owned by a [`Chain`]
    pub struct InfoId;
}

/// Internal node representation
struct Node {
    module: Box<dyn AudioModule>,
    name: String,
    info: InfoId,
    backward: Option<ModuleId>,
    forward: Vec<ModuleId>,
    /// Fan-in inputs, processed locally each cycle
    inputs: Vec<ModuleId>,
    params: ParamSet,
    block: Option<AudioBlock>,
    /// Cycle in which a copy-on-read module last processed
    last_cycle: Option<u64>,
}

/// Container owning a graph of modules and their shared descriptors
pub struct Chain {
    nodes: SlotMap<ModuleId, Node>,
    infos: SlotMap<InfoId, ChainInfo>,
    default_info: ChainInfo,
    cycle: u64,
}

impl Chain {
    /// Create an empty chain whose new modules start with the default descriptor
    pub fn new() -> Self {
        Self::with_info(ChainInfo::default())
    }

    /// Create an empty chain whose new modules start with `info`
    pub fn with_info(info: ChainInfo) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            infos: SlotMap::with_key(),
            default_info: info,
            cycle: 0,
        }
    }

    /// Add a module. It starts unbound, with a descriptor of its own.
    pub fn add<M: AudioModule>(&mut self, name: impl Into<String>, module: M) -> ModuleId {
        self.add_boxed(name, Box::new(module))
    }

    /// Add a boxed module
    pub fn add_boxed(&mut self, name: impl Into<String>, module: Box<dyn AudioModule>) -> ModuleId {
        let info = self.infos.insert(self.default_info);
        let params = ParamSet::from_defs(module.params());
        let name = name.into();
        let kind = module.kind();
        let id = self.nodes.insert(Node {
            module,
            name,
            info,
            backward: None,
            forward: Vec::new(),
            inputs: Vec::new(),
            params,
            block: None,
            last_cycle: None,
        });
        debug!("added {} module {:?}", kind, id);
        id
    }

    /// Remove a module, unlinking it from every neighbour
    pub fn remove(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let node = self.nodes.remove(id).ok_or(ChainError::InvalidModule(id))?;

        let upstream = node
            .backward
            .into_iter()
            .chain(node.inputs.iter().copied())
            .chain(node.params.sub_chains());
        for up in upstream {
            if let Some(n) = self.nodes.get_mut(up) {
                n.forward.retain(|&f| f != id);
            }
        }

        for down in node.forward {
            if let Some(n) = self.nodes.get_mut(down) {
                if n.backward == Some(id) {
                    n.backward = None;
                }
                n.inputs.retain(|&i| i != id);
                n.params.detach(id);
            }
        }

        self.release_unused_infos();
        debug!("removed module {:?}", id);
        Ok(())
    }

    /// Attach `predecessor` behind `successor`.
    ///
    /// The successor's descriptor is installed into the predecessor and into
    /// everything behind it, so splicing a pre-built chain re-synchronizes it.
    /// Binding another branch behind a copy-on-read predecessor works the
    /// other way round: the branch adopts the predecessor's descriptor.
    /// A previous predecessor of `successor` is unlinked. Returns `predecessor`
    /// so chains can be built back to front.
    pub fn bind(&mut self, successor: ModuleId, predecessor: ModuleId) -> Result<ModuleId, ChainError> {
        self.check_attach(successor, predecessor)?;

        let old = self.node(successor)?.backward;
        if let Some(old) = old {
            if let Some(n) = self.nodes.get_mut(old) {
                n.forward.retain(|&f| f != successor);
            }
        }

        // A fan-out predecessor already belongs to a chain; the new branch joins it
        let fan_out = !self.node(predecessor)?.forward.is_empty();

        self.node_mut(successor)?.backward = Some(predecessor);
        self.node_mut(predecessor)?.forward.push(successor);

        if fan_out {
            let info = self.node(predecessor)?.info;
            self.node_mut(successor)?.info = info;
        } else {
            let info = self.node(successor)?.info;
            self.install_info(predecessor, info);
        }
        self.release_unused_infos();

        debug!("bound {:?} behind {:?}", predecessor, successor);
        Ok(predecessor)
    }

    /// Attach an extra input to a fan-in module.
    ///
    /// Inputs share the fan-in module's descriptor so their blocks sum cleanly.
    pub fn add_input(&mut self, target: ModuleId, input: ModuleId) -> Result<(), ChainError> {
        if !self.node(target)?.module.accepts_inputs() {
            return Err(ChainError::Unsupported {
                module: target,
                operation: "fan-in inputs",
            });
        }
        self.check_attach(target, input)?;

        self.node_mut(target)?.inputs.push(input);
        self.node_mut(input)?.forward.push(target);

        let info = self.node(target)?.info;
        self.install_info(input, info);
        self.release_unused_infos();

        debug!("added input {:?} to {:?}", input, target);
        Ok(())
    }

    /// Set parameter `index` of `owner` to a constant
    pub fn set_param(&mut self, owner: ModuleId, index: usize, value: f64) -> Result<(), ChainError> {
        let previous = self.param_source(owner, index)?;
        self.detach_param_source(owner, previous);
        self.node_mut(owner)?
            .params
            .get_mut(index)
            .ok_or(ChainError::InvalidParam { module: owner, index })?
            .set_constant(value);
        Ok(())
    }

    /// Feed parameter `index` of `owner` from the sub-chain ending at `root`
    pub fn modulate(&mut self, owner: ModuleId, index: usize, root: ModuleId) -> Result<(), ChainError> {
        let previous = self.param_source(owner, index)?;
        self.check_attach(owner, root)?;
        self.detach_param_source(owner, previous);

        self.node_mut(owner)?
            .params
            .get_mut(index)
            .ok_or(ChainError::InvalidParam { module: owner, index })?
            .set_module(root);
        self.node_mut(root)?.forward.push(owner);
        self.sync_param_info(owner, root)?;

        debug!("parameter {} of {:?} modulated by {:?}", index, owner, root);
        Ok(())
    }

    /// Current source of parameter `index` of `owner`
    pub fn param_source(&self, owner: ModuleId, index: usize) -> Result<ParamSource, ChainError> {
        self.node(owner)?
            .params
            .get(index)
            .map(|p| p.source())
            .ok_or(ChainError::InvalidParam { module: owner, index })
    }

    /// Index of the parameter called `name` on `owner`
    pub fn param_index(&self, owner: ModuleId, name: &str) -> Option<usize> {
        self.nodes.get(owner)?.params.index_of(name)
    }

    // ---------------------------------------------------------------------
    // Lifecycle entry points
    // ---------------------------------------------------------------------

    /// Synchronize descriptors and run every configure hook up to `id`
    pub fn configure(&mut self, id: ModuleId) -> Result<(), ChainError> {
        debug!("configuring chain at {:?}", id);
        self.configure_node(id)?;
        self.release_unused_infos();
        Ok(())
    }

    /// Start every module up to `id`, predecessors first
    pub fn start(&mut self, id: ModuleId) -> Result<(), ChainError> {
        debug!("starting chain at {:?}", id);
        self.start_node(id)
    }

    /// Stop every module up to `id`, predecessors first
    pub fn stop(&mut self, id: ModuleId) -> Result<(), ChainError> {
        debug!("stopping chain at {:?}", id);
        self.stop_node(id)
    }

    /// Pull one block through the chain ending at `id` and return it
    pub fn process(&mut self, id: ModuleId) -> Result<AudioBlock, ChainError> {
        self.cycle = self.cycle.wrapping_add(1);
        self.process_node(id)?;
        self.take_block(id)
    }

    /// Pull several roots within one processing cycle.
    ///
    /// A copy-on-read module shared by the branches runs once and serves
    /// every branch the same block.
    pub fn process_many(&mut self, roots: &[ModuleId]) -> Result<Vec<AudioBlock>, ChainError> {
        self.cycle = self.cycle.wrapping_add(1);
        let mut blocks = Vec::with_capacity(roots.len());
        for &root in roots {
            self.process_node(root)?;
            blocks.push(self.take_block(root)?);
        }
        Ok(blocks)
    }

    /// Pull `periods` blocks from `id`, handing each one to `sink`
    pub fn run<F>(&mut self, id: ModuleId, periods: usize, mut sink: F) -> Result<(), ChainError>
    where
        F: FnMut(&AudioBlock),
    {
        for _ in 0..periods {
            let block = self.process(id)?;
            sink(&block);
        }
        Ok(())
    }

    /// Run only the local processing step of `id`.
    ///
    /// Works on whatever block the module currently holds as input; the
    /// predecessor is not advanced.
    pub fn process_local(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let (inputs, sources, info) = {
            let node = self.node(id)?;
            let info = *self.infos.get(node.info).ok_or(ChainError::InvalidModule(id))?;
            (node.inputs.clone(), node.params.sources(), info)
        };

        // Fan-in inputs run their local step only
        let mut gathered = Vec::with_capacity(inputs.len());
        for input in inputs {
            self.process_local(input)?;
            gathered.push(self.take_block(input)?);
        }

        let mut params = Vec::with_capacity(sources.len());
        for source in sources {
            match source {
                ParamSource::Constant(_) => {
                    params.extend(source.constant_block(&info));
                }
                ParamSource::Module(root) => {
                    self.process_node(root)?;
                    params.push(self.take_block(root)?);
                }
            }
        }

        let cycle = self.cycle;
        let node = self.node_mut(id)?;
        let input = node.block.take();
        let mut ctx = ProcessContext::new(&info)
            .with_input(input)
            .with_gathered(gathered)
            .with_params(params);
        let output = node.module.process(&mut ctx);
        node.block = Some(output);
        node.last_cycle = Some(cycle);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Block transfer
    // ---------------------------------------------------------------------

    /// Take the block held by `id`.
    ///
    /// Move modules are left empty. Copy-on-read modules keep their block and
    /// hand out a fresh copy on every request.
    pub fn take_block(&mut self, id: ModuleId) -> Result<AudioBlock, ChainError> {
        let node = self.node_mut(id)?;
        let block = match node.module.transfer() {
            Transfer::Move => node.block.take(),
            Transfer::Copy => node.block.clone(),
        };
        block.ok_or(ChainError::NoBlock(id))
    }

    /// Install a block as the one held by `id`
    pub fn set_block(&mut self, id: ModuleId, block: AudioBlock) -> Result<(), ChainError> {
        self.node_mut(id)?.block = Some(block);
        Ok(())
    }

    /// Borrow the block held by `id` without taking it
    pub fn block(&self, id: ModuleId) -> Option<&AudioBlock> {
        self.nodes.get(id)?.block.as_ref()
    }

    /// Report a failure recorded by `id` or any module upstream of it.
    ///
    /// Modules that fail inside `process` keep producing blocks and hold on to
    /// the error until it is collected here. Each failure is reported once.
    pub fn check(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(err) = self.node_mut(next)?.module.take_fault() {
                return Err(err);
            }
            stack.extend(self.upstream(next)?);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Descriptor access
    // ---------------------------------------------------------------------

    /// Descriptor currently used by `id`
    pub fn info(&self, id: ModuleId) -> Result<ChainInfo, ChainError> {
        let node = self.node(id)?;
        self.infos
            .get(node.info)
            .copied()
            .ok_or(ChainError::InvalidModule(id))
    }

    /// Overwrite the descriptor shared by `id` and every module sharing it
    pub fn set_info(&mut self, id: ModuleId, info: ChainInfo) -> Result<(), ChainError> {
        self.update_info(id, |i| *i = info)
    }

    // The field setters reject a zero value and leave the descriptor untouched

    pub fn set_sample_rate(&mut self, id: ModuleId, sample_rate: u32) -> Result<(), ChainError> {
        self.update_info(id, |i| i.sample_rate = sample_rate)
    }

    pub fn set_channels(&mut self, id: ModuleId, channels: usize) -> Result<(), ChainError> {
        self.update_info(id, |i| i.channels = channels)
    }

    pub fn set_block_size(&mut self, id: ModuleId, block_size: usize) -> Result<(), ChainError> {
        self.update_info(id, |i| i.block_size = block_size)
    }

    /// True if both modules read the same descriptor instance
    pub fn shares_info(&self, a: ModuleId, b: ModuleId) -> bool {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => a.info == b.info,
            _ => false,
        }
    }

    /// Number of live descriptors
    pub fn info_count(&self) -> usize {
        self.infos.len()
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Borrow the concrete module behind `id`
    pub fn module<T: AudioModule>(&self, id: ModuleId) -> Option<&T> {
        self.nodes.get(id)?.module.downcast_ref::<T>()
    }

    /// Mutably borrow the concrete module behind `id`
    pub fn module_mut<T: AudioModule>(&mut self, id: ModuleId) -> Option<&mut T> {
        self.nodes.get_mut(id)?.module.downcast_mut::<T>()
    }

    pub fn name(&self, id: ModuleId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    /// Module this one pulls from
    pub fn predecessor(&self, id: ModuleId) -> Option<ModuleId> {
        self.nodes.get(id)?.backward
    }

    /// Modules that pull from this one
    pub fn successors(&self, id: ModuleId) -> &[ModuleId] {
        self.nodes.get(id).map(|n| n.forward.as_slice()).unwrap_or(&[])
    }

    /// Fan-in inputs of this module
    pub fn inputs(&self, id: ModuleId) -> &[ModuleId] {
        self.nodes.get(id).map(|n| n.inputs.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all modules
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &str, &dyn AudioModule)> {
        self.nodes
            .iter()
            .map(|(id, node)| (id, node.name.as_str(), node.module.as_ref()))
    }

    // ---------------------------------------------------------------------
    // Recursion
    // ---------------------------------------------------------------------

    fn configure_node(&mut self, id: ModuleId) -> Result<(), ChainError> {
        if let Some(prev) = self.node(id)?.backward {
            self.configure_node(prev)?;
            let info = self.node(prev)?.info;
            self.node_mut(id)?.info = info;
        }

        for input in self.node(id)?.inputs.clone() {
            self.configure_node(input)?;
        }

        for root in self.node(id)?.params.sub_chains() {
            self.sync_param_info(id, root)?;
            self.configure_node(root)?;
        }

        let info = self.info(id)?;
        self.node_mut(id)?.module.configure(&info);
        Ok(())
    }

    fn start_node(&mut self, id: ModuleId) -> Result<(), ChainError> {
        for up in self.upstream(id)? {
            self.start_node(up)?;
        }
        self.node_mut(id)?.module.start();
        Ok(())
    }

    fn stop_node(&mut self, id: ModuleId) -> Result<(), ChainError> {
        for up in self.upstream(id)? {
            self.stop_node(up)?;
        }
        self.node_mut(id)?.module.stop();
        Ok(())
    }

    fn process_node(&mut self, id: ModuleId) -> Result<(), ChainError> {
        let node = self.node(id)?;
        // A copy-on-read module serves every successor from one pass per cycle
        if node.module.transfer() == Transfer::Copy
            && node.last_cycle == Some(self.cycle)
            && node.block.is_some()
        {
            return Ok(());
        }
        let backward = node.backward;
        self.node_mut(id)?.module.begin();

        if let Some(prev) = backward {
            self.process_node(prev)?;
            let block = self.take_block(prev)?;
            self.node_mut(id)?.block = Some(block);
        }
        self.process_local(id)
    }

    /// Backward link, fan-in inputs and parameter sub-chains, in that order
    fn upstream(&self, id: ModuleId) -> Result<Vec<ModuleId>, ChainError> {
        let node = self.node(id)?;
        Ok(node
            .backward
            .into_iter()
            .chain(node.inputs.iter().copied())
            .chain(node.params.sub_chains())
            .collect())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn node(&self, id: ModuleId) -> Result<&Node, ChainError> {
        self.nodes.get(id).ok_or(ChainError::InvalidModule(id))
    }

    fn node_mut(&mut self, id: ModuleId) -> Result<&mut Node, ChainError> {
        self.nodes.get_mut(id).ok_or(ChainError::InvalidModule(id))
    }

    /// Edit a copy of the descriptor and store it only if it still validates
    fn update_info<F: FnOnce(&mut ChainInfo)>(&mut self, id: ModuleId, f: F) -> Result<(), ChainError> {
        let key = self.node(id)?.info;
        let info = self.infos.get_mut(key).ok_or(ChainError::InvalidModule(id))?;
        let mut updated = *info;
        f(&mut updated);
        updated.validate().map_err(ChainError::Info)?;
        *info = updated;
        Ok(())
    }

    /// Validate attaching `upstream` so that `downstream` pulls from it
    fn check_attach(&self, downstream: ModuleId, upstream: ModuleId) -> Result<(), ChainError> {
        self.node(downstream)?;
        let up = self.node(upstream)?;
        if upstream == downstream || self.is_upstream(upstream, downstream) {
            return Err(ChainError::CycleDetected {
                from: upstream,
                to: downstream,
            });
        }
        if up.module.transfer() == Transfer::Move && !up.forward.is_empty() {
            return Err(ChainError::AlreadyBound(upstream));
        }
        Ok(())
    }

    /// True if `target` is reachable walking upstream from `from`
    fn is_upstream(&self, from: ModuleId, target: ModuleId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Ok(up) = self.upstream(id) {
                stack.extend(up);
            }
        }
        false
    }

    /// Point `start` and everything behind it (backward links and fan-in
    /// inputs) at descriptor `info`
    fn install_info(&mut self, start: ModuleId, info: InfoId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id) {
                if node.info == info {
                    continue;
                }
                node.info = info;
                stack.extend(node.backward);
                stack.extend(node.inputs.iter().copied());
            }
        }
    }

    /// Copy the owner's descriptor values into a parameter sub-chain
    fn sync_param_info(&mut self, owner: ModuleId, root: ModuleId) -> Result<(), ChainError> {
        let info = self.info(owner)?;
        if !self.shares_info(owner, root) {
            self.update_info(root, |i| *i = info)?;
        }
        Ok(())
    }

    fn detach_param_source(&mut self, owner: ModuleId, source: ParamSource) {
        if let Some(root) = source.module() {
            if let Some(n) = self.nodes.get_mut(root) {
                if let Some(pos) = n.forward.iter().position(|&f| f == owner) {
                    n.forward.remove(pos);
                }
            }
        }
    }

    fn release_unused_infos(&mut self) {
        let used: HashSet<InfoId> = self.nodes.values().map(|n| n.info).collect();
        self.infos.retain(|key, _| used.contains(&key));
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
