pub mod errors;

pub use errors::{ModelError, ModelErrorKind, ModelResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Phase-space plane; each plane owns a (position, angle) coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    X,
    Y,
    Z,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::X, Plane::Y, Plane::Z];
    pub const TRANSVERSE: [Plane; 2] = [Plane::X, Plane::Y];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    /// Index of the position coordinate; the angle sits at `offset() + 1`.
    pub const fn offset(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 2,
            Self::Z => 4,
        }
    }

    pub const fn index(self) -> usize {
        self.offset() / 2
    }
}

impl Display for Plane {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}
