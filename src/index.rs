use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::field::Field;




/**
 * The key under which a patch is stored: the block position `(i, j)` on a
 * quadtree at refinement level `level`, together with the field the patch
 * holds. The coordinates are signed so that meshes may extend below the
 * origin (wrapped topologies index their ghost blocks at `-1`).
 *
 * Indexes are totally ordered, lexicographically in `(i, j, level, field)`,
 * so they can key an ordered map.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatchIndex {
    pub i: i64,
    pub j: i64,
    pub level: i32,
    pub field: Field,
}




/**
 * One of the four edges of a patch, named by axis and side:
 *
 *  ```text
 *          jl
 *      +--------+
 *      |        |
 *  il  |        |  ir
 *      |        |
 *      +--------+
 *          jr
 *  ```
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchEdge {
    Il,
    Ir,
    Jl,
    Jr,
}




// ============================================================================
impl PatchIndex {


    pub fn new(i: i64, j: i64, level: i32, field: Field) -> Self {
        Self { i, j, level, field }
    }


    /**
     * Return the index of the patch one level coarser which contains this
     * one. The division is floored, rounding toward negative infinity, so
     * that blocks at negative coordinates coarsen into the correct parent.
     * Coarsening a level-zero index produces a key at level `-1`, which no
     * stored patch can carry; lookups of such a key simply miss.
     */
    pub fn coarsen(self) -> Self {
        Self {
            i: self.i.div_euclid(2),
            j: self.j.div_euclid(2),
            level: self.level - 1,
            field: self.field,
        }
    }


    /**
     * Return the four indexes of the patches one level finer which cover
     * this one, ordered `(0,0), (0,1), (1,0), (1,1)` in the child offsets
     * `(a, b)`. `tile` lays children out under the same ordering, and the
     * two must stay paired.
     */
    pub fn refine(self) -> [Self; 4] {
        [(0, 0), (0, 1), (1, 0), (1, 1)].map(|(a, b)| Self {
            i: self.i * 2 + a,
            j: self.j * 2 + b,
            level: self.level + 1,
            field: self.field,
        })
    }


    /**
     * Return which quadrant of its parent this patch occupies. Euclidean
     * remainders keep the result in `{0, 1}` for negative coordinates.
     */
    pub fn orientation(self) -> (usize, usize) {
        (self.i.rem_euclid(2) as usize, self.j.rem_euclid(2) as usize)
    }


    /**
     * Return the index displaced by the given number of blocks on each axis,
     * at the same level and for the same field.
     */
    pub fn translate(self, di: i64, dj: i64) -> Self {
        Self {
            i: self.i + di,
            j: self.j + dj,
            ..self
        }
    }


    /**
     * Return this index with the field component replaced.
     */
    pub fn with_field(self, field: Field) -> Self {
        Self { field, ..self }
    }
}




/**
 * The canonical text form is `<level>.<i>-<j>/<field>`, for example
 * `1.4-5/conserved`. Serializers use it as the storage path of a patch.
 */
impl fmt::Display for PatchIndex {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}.{}-{}/{}", self.level, self.i, self.j, self.field)
    }
}


impl FromStr for PatchIndex {
    type Err = Error;

    fn from_str(str: &str) -> Result<Self, Error> {
        let malformed = || Error::ParseError(format!("malformed patch index: {}", str));

        let (prefix, field) = str.split_once('/').ok_or_else(malformed)?;
        let (level, blocks) = prefix.split_once('.').ok_or_else(malformed)?;

        // The i-j separator is the first dash directly preceded by a digit,
        // which leaves any leading minus signs attached to their numbers.
        let dash = blocks
            .char_indices()
            .skip(1)
            .find(|&(n, c)| c == '-' && blocks.as_bytes()[n - 1].is_ascii_digit())
            .map(|(n, _)| n)
            .ok_or_else(malformed)?;

        Ok(Self {
            i: blocks[..dash].parse().map_err(|_| malformed())?,
            j: blocks[dash + 1..].parse().map_err(|_| malformed())?,
            level: level.parse().map_err(|_| malformed())?,
            field: field.parse()?,
        })
    }
}




impl fmt::Display for PatchEdge {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchEdge::Il => write!(fmt, "il"),
            PatchEdge::Ir => write!(fmt, "ir"),
            PatchEdge::Jl => write!(fmt, "jl"),
            PatchEdge::Jr => write!(fmt, "jr"),
        }
    }
}
