//! Node role tags.
//!
//! Ids follow the mesh dataset convention; the one-hot encoding is
//! [`NodeType::SIZE`] wide, leaving room for ids that are reserved but
//! unused by cloth meshes.

use serde::{Deserialize, Serialize};

use crate::error::{DrapeError, DrapeResult};

/// Role of a mesh node.
///
/// Only [`NodeType::Normal`] nodes are free to move; the rest are driven
/// externally (handles, obstacles, boundaries).
///
/// # Example
///
/// ```
/// use drape_core::NodeType;
///
/// let t = NodeType::from_id(3).unwrap();
/// assert_eq!(t, NodeType::Handle);
/// assert_eq!(t.one_hot()[3], 1.0);
/// assert!(NodeType::from_id(42).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum NodeType {
    /// Free cloth node.
    Normal,
    /// Static or moving collider.
    Obstacle,
    /// Airfoil surface.
    Airfoil,
    /// Pinned handle node.
    Handle,
    /// Inflow boundary.
    Inflow,
    /// Outflow boundary.
    Outflow,
    /// Wall boundary.
    WallBoundary,
}

impl NodeType {
    /// Width of the one-hot node type encoding.
    pub const SIZE: usize = 9;

    /// Parses a raw dataset id.
    ///
    /// # Errors
    ///
    /// Returns [`DrapeError::InvalidNodeType`] for unknown ids.
    pub fn from_id(id: u32) -> DrapeResult<Self> {
        match id {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Obstacle),
            2 => Ok(Self::Airfoil),
            3 => Ok(Self::Handle),
            4 => Ok(Self::Inflow),
            5 => Ok(Self::Outflow),
            6 => Ok(Self::WallBoundary),
            _ => Err(DrapeError::InvalidNodeType { id }),
        }
    }

    /// The raw dataset id.
    pub fn id(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Obstacle => 1,
            Self::Airfoil => 2,
            Self::Handle => 3,
            Self::Inflow => 4,
            Self::Outflow => 5,
            Self::WallBoundary => 6,
        }
    }

    /// One-hot encoding of width [`NodeType::SIZE`].
    pub fn one_hot(self) -> [f32; Self::SIZE] {
        let mut v = [0.0; Self::SIZE];
        v[self.id() as usize] = 1.0;
        v
    }

    /// `true` for nodes whose motion the model predicts.
    pub fn is_free(self) -> bool {
        self == Self::Normal
    }
}

impl TryFrom<u32> for NodeType {
    type Error = DrapeError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Self::from_id(id)
    }
}

impl From<NodeType> for u32 {
    fn from(t: NodeType) -> Self {
        t.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for id in 0..7 {
            assert_eq!(NodeType::from_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn reserved_ids_rejected() {
        assert_eq!(
            NodeType::from_id(7).unwrap_err(),
            DrapeError::InvalidNodeType { id: 7 }
        );
    }

    #[test]
    fn one_hot_has_single_bit() {
        let v = NodeType::WallBoundary.one_hot();
        assert_eq!(v.iter().sum::<f32>(), 1.0);
        assert_eq!(v[6], 1.0);
    }

    #[test]
    fn only_normal_is_free() {
        assert!(NodeType::Normal.is_free());
        assert!(!NodeType::Handle.is_free());
        assert!(!NodeType::Obstacle.is_free());
    }

    #[test]
    fn serde_uses_integer_ids() {
        let json = serde_json::to_string(&vec![NodeType::Normal, NodeType::Handle]).unwrap();
        assert_eq!(json, "[0,3]");
        let back: Vec<NodeType> = serde_json::from_str("[3,0]").unwrap();
        assert_eq!(back, vec![NodeType::Handle, NodeType::Normal]);
        assert!(serde_json::from_str::<NodeType>("12").is_err());
    }
}
