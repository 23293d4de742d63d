//! Node identity and component classification.

use crate::status::FourCc;
use std::fmt;

/// Opaque handle to a node in a processing graph.
///
/// Handles are assigned by the graph and are never reused within a graph
/// instance, so a handle to a removed node stays invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role class of a node's component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Converts sequence events into audio (a synthesizer).
    MusicDevice,
    /// Terminal node: a live device or an offline pull endpoint.
    Output,
    /// Processes audio from its input.
    Effect,
    /// Sums several inputs.
    Mixer,
    /// Any other component, by four-character type code.
    Other(FourCc),
}

impl ComponentType {
    /// Four-character code of this component type.
    pub fn code(self) -> FourCc {
        match self {
            Self::MusicDevice => FourCc::new(b"aumu"),
            Self::Output => FourCc::new(b"auou"),
            Self::Effect => FourCc::new(b"aufx"),
            Self::Mixer => FourCc::new(b"aumx"),
            Self::Other(code) => code,
        }
    }
}

/// The concrete component within a [`ComponentType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentSubtype {
    /// Output to the system's default audio device.
    DeviceOutput,
    /// Output pulled by the caller, used for offline rendering.
    GenericOutput,
    /// Built-in sample-playback synthesizer.
    Synth,
    /// Peak limiter effect.
    PeakLimiter,
    /// Any other component, by four-character subtype code.
    Other(FourCc),
}

impl ComponentSubtype {
    /// Four-character code of this subtype.
    pub fn code(self) -> FourCc {
        match self {
            Self::DeviceOutput => FourCc::new(b"def "),
            Self::GenericOutput => FourCc::new(b"genr"),
            Self::Synth => FourCc::new(b"dls "),
            Self::PeakLimiter => FourCc::new(b"lmtr"),
            Self::Other(code) => code,
        }
    }
}

/// Type and subtype classifying a node's role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDescriptor {
    /// Role class.
    pub component_type: ComponentType,
    /// Concrete component.
    pub subtype: ComponentSubtype,
}

impl ComponentDescriptor {
    /// Creates a descriptor.
    pub const fn new(component_type: ComponentType, subtype: ComponentSubtype) -> Self {
        Self {
            component_type,
            subtype,
        }
    }

    /// The built-in synthesizer.
    pub const SYNTH: Self = Self::new(ComponentType::MusicDevice, ComponentSubtype::Synth);
    /// Live device output.
    pub const DEVICE_OUTPUT: Self =
        Self::new(ComponentType::Output, ComponentSubtype::DeviceOutput);
    /// Offline generic output.
    pub const GENERIC_OUTPUT: Self =
        Self::new(ComponentType::Output, ComponentSubtype::GenericOutput);
    /// Peak limiter effect.
    pub const PEAK_LIMITER: Self = Self::new(ComponentType::Effect, ComponentSubtype::PeakLimiter);

    /// Returns `true` if the node is a synthesizer.
    pub fn is_synth(&self) -> bool {
        self.component_type == ComponentType::MusicDevice
    }

    /// Returns `true` if the node is an output of any kind.
    pub fn is_output(&self) -> bool {
        self.component_type == ComponentType::Output
    }
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' '{}'",
            self.component_type.code(),
            self.subtype.code()
        )
    }
}
