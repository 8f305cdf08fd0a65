use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;




/**
 * The physical quantities a database can store. The set is closed: each
 * database registers the fields it will hold in its header at construction,
 * and an index whose field is not registered there is rejected.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CellVolume,
    CellCoords,
    VertCoords,
    FaceAreaI,
    FaceAreaJ,
    FaceVelocityI,
    FaceVelocityJ,
    Conserved,
    Primitive,
}




/**
 * Identifies where within a mesh cell a field's data resides. The location
 * fixes the array shape for that field: node-like axes carry one extra
 * sample with respect to the cell count.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshLocation {
    Vert,
    Cell,
    FaceI,
    FaceJ,
}




/**
 * Describes one registered field: how many scalar components it stores per
 * zone, and where on the mesh those components live.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub num_fields: usize,
    pub location: MeshLocation,
}




/// The mapping from every field a database will store to its descriptor.
pub type Header = BTreeMap<Field, FieldDescriptor>;




// ============================================================================
impl Field {
    fn as_str(&self) -> &'static str {
        use Field::*;

        match self {
            CellVolume => "cell_volume",
            CellCoords => "cell_coords",
            VertCoords => "vert_coords",
            FaceAreaI => "face_area_i",
            FaceAreaJ => "face_area_j",
            FaceVelocityI => "face_velocity_i",
            FaceVelocityJ => "face_velocity_j",
            Conserved => "conserved",
            Primitive => "primitive",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(str: &str) -> Result<Self, Error> {
        use Field::*;

        match str {
            "cell_volume" => Ok(CellVolume),
            "cell_coords" => Ok(CellCoords),
            "vert_coords" => Ok(VertCoords),
            "face_area_i" => Ok(FaceAreaI),
            "face_area_j" => Ok(FaceAreaJ),
            "face_velocity_i" => Ok(FaceVelocityI),
            "face_velocity_j" => Ok(FaceVelocityJ),
            "conserved" => Ok(Conserved),
            "primitive" => Ok(Primitive),
            _ => Err(Error::ParseError(format!("unknown field: {}", str))),
        }
    }
}




// ============================================================================
impl MeshLocation {
    fn as_str(&self) -> &'static str {
        use MeshLocation::*;

        match self {
            Vert => "vert",
            Cell => "cell",
            FaceI => "face_i",
            FaceJ => "face_j",
        }
    }
}

impl fmt::Display for MeshLocation {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

impl FromStr for MeshLocation {
    type Err = Error;

    fn from_str(str: &str) -> Result<Self, Error> {
        use MeshLocation::*;

        match str {
            "vert" => Ok(Vert),
            "cell" => Ok(Cell),
            "face_i" => Ok(FaceI),
            "face_j" => Ok(FaceJ),
            _ => Err(Error::ParseError(format!("unknown location: {}", str))),
        }
    }
}




// ============================================================================
impl FieldDescriptor {
    pub fn new(num_fields: usize, location: MeshLocation) -> Self {
        assert!(num_fields >= 1, "a field must have at least one component");
        Self { num_fields, location }
    }
}


/**
 * A descriptor serializes as the two-element sequence
 * `[num_fields, location]`, so a serialized header is a mapping from field
 * names to such pairs.
 */
impl Serialize for FieldDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.num_fields, self.location).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (num_fields, location) = <(usize, MeshLocation)>::deserialize(deserializer)?;

        if num_fields == 0 {
            return Err(de::Error::custom("a field must have at least one component"));
        }
        Ok(Self { num_fields, location })
    }
}
