//! The processing-graph collaborator interface.

use crate::component::{ComponentDescriptor, NodeId};
use crate::status::Status;
use crate::unit::AudioUnit;

/// A mutable graph of audio nodes, owned by the sequence that produced it.
///
/// The core only ever borrows a graph; it never disposes one. Node order is
/// the graph's insertion order and may shift when nodes are removed, so
/// indices are only meaningful until the next mutation.
pub trait ProcessingGraph {
    /// Unit handle type returned by [`node_unit`](Self::node_unit).
    type Unit: AudioUnit;

    /// Opens the graph, instantiating its units.
    fn open(&mut self) -> Result<(), Status>;

    /// Number of nodes currently in the graph.
    fn node_count(&self) -> Result<usize, Status>;

    /// Node at `index` in insertion order.
    fn node_at(&self, index: usize) -> Result<NodeId, Status>;

    /// Component descriptor of `node`.
    fn node_descriptor(&self, node: NodeId) -> Result<ComponentDescriptor, Status>;

    /// Unit behind `node`.
    fn node_unit(&self, node: NodeId) -> Result<Self::Unit, Status>;

    /// Removes `node` and every connection touching it.
    fn remove_node(&mut self, node: NodeId) -> Result<(), Status>;

    /// Adds a node for `descriptor` at the end of the node order.
    fn add_node(&mut self, descriptor: ComponentDescriptor) -> Result<NodeId, Status>;

    /// Connects `source`'s output bus to `dest`'s input bus, replacing any
    /// existing connection on that input.
    fn connect(
        &mut self,
        source: NodeId,
        source_bus: u32,
        dest: NodeId,
        dest_bus: u32,
    ) -> Result<(), Status>;

    /// Prepares every unit for rendering. Topology changes after this call
    /// are not supported.
    fn initialize(&mut self) -> Result<(), Status>;

    /// Render CPU load as a fraction of the real-time budget.
    fn cpu_load(&self) -> Result<f32, Status>;
}
