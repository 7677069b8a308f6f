pub mod element;
pub mod sequence;
pub mod sync;

pub use element::{
    AlignmentErrors, BendParams, CorrectorParams, Element, ElementKind, QuadrupoleParams,
    RfGapParams, ThinLensParams,
};
pub use sequence::{Lattice, LatticeSpec};
pub use sync::{
    LiveParameter, ParameterSource, SnapshotParameters, SyncError, SynchronizationMode, resync,
};
