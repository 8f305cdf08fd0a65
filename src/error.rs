use std::error;
use std::fmt;

use crate::field::{Field, MeshLocation};
use crate::index::{PatchEdge, PatchIndex};

#[derive(Clone, Debug, PartialEq)]

/**
 * Error to represent a failed database operation. Operations validate their
 * inputs before touching the patch container, so a returned error means the
 * database contents are exactly what they were before the call.
 */
pub enum Error {
    UnknownField(Field),
    PatchMissing(PatchIndex),
    ShapeMismatch {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
    UnsupportedLocation(MeshLocation),
    BoundaryUnresolved(PatchIndex, PatchEdge),
    ParseError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            UnknownField(field) => {
                write!(fmt, "field {} is not in the database header", field)
            }
            PatchMissing(index) => {
                write!(fmt, "no patch at index {}", index)
            }
            ShapeMismatch { expected, got } => {
                write!(fmt, "patch data has shape {:?} where {:?} was expected", got, expected)
            }
            UnsupportedLocation(location) => {
                write!(fmt, "operation requires cell data, got {}", location)
            }
            BoundaryUnresolved(index, edge) => {
                write!(fmt, "no boundary value callback to fill edge {} of patch {}", edge, index)
            }
            ParseError(message) => {
                write!(fmt, "{}", message)
            }
        }
    }
}

impl error::Error for Error {}
