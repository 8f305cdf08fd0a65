use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use log::{debug, info};
use ndarray::{s, Array3, CowArray, Ix3};

use crate::error::Error;
use crate::field::{Field, FieldDescriptor, Header, MeshLocation};
use crate::index::{PatchEdge, PatchIndex};
use crate::serializer::Serializer;
use crate::transfer::{prolongation, quadrant, restriction, tile};




/// The 3D array of doubles backing every patch: two block axes and one
/// field-component axis.
pub type Array = Array3<f64>;




/**
 * A callback invoked when a guard zone region of a target patch cannot be
 * computed from neighbor patches. The callback receives the index of the
 * target patch (the one whose edge values are required), the edge being
 * filled, the guard zone depth, and the data currently in the target patch.
 * It must return an array shaped like the patch data but with `depth`
 * samples on the off-edge axis: `(depth, nj, k)` for the `il`/`ir` edges and
 * `(ni, depth, k)` for `jl`/`jr`.
 *
 * Configure it with `Database::set_boundary_value`. If a `fetch` needs the
 * callback and none is set, the fetch fails with `BoundaryUnresolved`.
 */
pub type BoundaryValue = Box<dyn Fn(PatchIndex, PatchEdge, usize, &Array) -> Array>;




/**
 * An in-memory store of rectangular blocks of field data, keyed by their
 * quadtree position `(i, j)`, refinement level, and field. Its central
 * service is `fetch`: assembling a guard-zone-padded copy of a patch by
 * pulling edge data from neighbors at the same, coarser, or finer level,
 * prolongating or restricting as required. Solvers call `fetch` at every
 * substep, compute an update, and `commit` it back.
 *
 * The store owns its arrays exclusively. `at` borrows a stored array;
 * `fetch` and `assemble` return freshly allocated arrays the caller owns.
 * All operations are synchronous and validate their inputs before mutating
 * anything, so a failed call leaves the database untouched.
 */
pub struct Database {
    ni: usize,
    nj: usize,
    header: Header,
    patches: BTreeMap<PatchIndex, Array>,
    boundary_value: Option<BoundaryValue>,
}




// ============================================================================
impl Database {


    /**
     * Create an empty database holding `ni` by `nj` blocks of the fields
     * registered in `header`.
     */
    pub fn new(ni: usize, nj: usize, header: Header) -> Self {

        assert!(
            ni > 0 && nj > 0,
            "block size must be positive, got ({}, {})", ni, nj);

        Self {
            ni,
            nj,
            header,
            patches: BTreeMap::new(),
            boundary_value: None,
        }
    }


    /**
     * Set the callback invoked when a guard zone region cannot be found in
     * neighboring patches.
     */
    pub fn set_boundary_value<F>(&mut self, callback: F)
    where
        F: Fn(PatchIndex, PatchEdge, usize, &Array) -> Array + 'static
    {
        self.boundary_value = Some(Box::new(callback));
    }


    /** Return the block size `(ni, nj)` this database was built with. */
    pub fn block_size(&self) -> (usize, usize) {
        (self.ni, self.nj)
    }


    /** Return the header describing the fields this database stores. */
    pub fn header(&self) -> &Header {
        &self.header
    }


    /**
     * Return the array shape a patch at the given index must have: the
     * block extent, adjusted upward on node-like axes per the field's mesh
     * location, by the field's component count.
     */
    pub fn expected_shape(&self, index: PatchIndex) -> Result<(usize, usize, usize), Error> {
        let FieldDescriptor { num_fields, location } = *self.descriptor(index.field)?;
        let (ni, nj) = (self.ni, self.nj);

        Ok(match location {
            MeshLocation::Cell => (ni, nj, num_fields),
            MeshLocation::Vert => (ni + 1, nj + 1, num_fields),
            MeshLocation::FaceI => (ni + 1, nj, num_fields),
            MeshLocation::FaceJ => (ni, nj + 1, num_fields),
        })
    }


    /**
     * Store patch data at the given index, overwriting any existing entry.
     * The data moves into the database, which owns it exclusively from then
     * on. Fails with `ShapeMismatch` if the shape is not the expected one
     * for the index's field, leaving the store unchanged.
     */
    pub fn insert(&mut self, index: PatchIndex, data: Array) -> Result<(), Error> {
        self.check_shape(&data, index)?;
        self.patches.insert(index, data);
        Ok(())
    }


    /** Remove and return the patch at the given index, if present. */
    pub fn erase(&mut self, index: PatchIndex) -> Option<Array> {
        self.patches.remove(&index)
    }


    /** Remove all stored patches. */
    pub fn clear(&mut self) {
        self.patches.clear();
    }


    /**
     * Merge data into the patch at the given index with the given blending
     * factor: the stored value becomes `data * (1 - rk_factor) + old *
     * rk_factor`. A factor of zero overwrites the stored data; factors in
     * `(0, 1)` form the convex combinations used by low-storage Runge-Kutta
     * updates. The patch must already exist (use `insert` to create one) and
     * must hold cell data of the expected shape.
     */
    pub fn commit(&mut self, index: PatchIndex, data: Array, rk_factor: f64) -> Result<(), Error> {
        let location = self.location(index.field)?;

        if location != MeshLocation::Cell {
            return Err(Error::UnsupportedLocation(location));
        }
        self.check_shape(&data, index)?;

        let target = self.patches.get_mut(&index).ok_or(Error::PatchMissing(index))?;

        if rk_factor == 0.0 {
            *target = data;
        } else {
            *target = data * (1.0 - rk_factor) + &*target * rk_factor;
        }
        Ok(())
    }


    /**
     * Return a newly allocated copy of the patch at the given index, padded
     * with `guard` zones on each of its four edges.
     */
    pub fn fetch(&self, index: PatchIndex, guard: usize) -> Result<Array, Error> {
        self.fetch_with(index, [guard; 4])
    }


    /**
     * Return a newly allocated copy of the patch at the given index, padded
     * with the given guard zone depths `[il, ir, jl, jr]`:
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
     *
     * Each edge with nonzero depth is filled from the neighbor on that side,
     * resolved through `locate` (so a missing same-level neighbor may be
     * synthesized from a coarser or finer one). Where no neighbor can be
     * resolved the boundary value callback supplies the edge data. The four
     * corner regions are left zeroed; callers needing corner data must reach
     * the diagonal neighbors through a `fetch` along either axis.
     *
     * The index must refer to cell data and the center patch must be
     * present.
     */
    pub fn fetch_with(&self, index: PatchIndex, guards: [usize; 4]) -> Result<Array, Error> {
        let location = self.location(index.field)?;

        if location != MeshLocation::Cell {
            return Err(Error::UnsupportedLocation(location));
        }

        let [ngil, ngir, ngjl, ngjr] = guards;
        let (ni, nj) = (self.ni, self.nj);

        assert!(
            ngil <= ni && ngir <= ni && ngjl <= nj && ngjr <= nj,
            "guard depth may not exceed the block size");

        let center = self.patches.get(&index).ok_or(Error::PatchMissing(index))?;
        let mi = ni + ngil + ngir;
        let mj = nj + ngjl + ngjr;
        let mut result = Array::zeros((mi, mj, center.dim().2));

        result
            .slice_mut(s![ngil..ngil + ni, ngjl..ngjl + nj, ..])
            .assign(center);

        if ngil > 0 {
            match self.locate(index.translate(-1, 0)) {
                Some(neighbor) => result
                    .slice_mut(s![..ngil, ngjl..ngjl + nj, ..])
                    .assign(&neighbor.slice(s![ni - ngil.., .., ..])),
                None => result
                    .slice_mut(s![..ngil, ngjl..ngjl + nj, ..])
                    .assign(&self.boundary_slab(index, PatchEdge::Il, ngil, center)?),
            }
        }

        if ngir > 0 {
            match self.locate(index.translate(1, 0)) {
                Some(neighbor) => result
                    .slice_mut(s![mi - ngir.., ngjl..ngjl + nj, ..])
                    .assign(&neighbor.slice(s![..ngir, .., ..])),
                None => result
                    .slice_mut(s![mi - ngir.., ngjl..ngjl + nj, ..])
                    .assign(&self.boundary_slab(index, PatchEdge::Ir, ngir, center)?),
            }
        }

        if ngjl > 0 {
            match self.locate(index.translate(0, -1)) {
                Some(neighbor) => result
                    .slice_mut(s![ngil..ngil + ni, ..ngjl, ..])
                    .assign(&neighbor.slice(s![.., nj - ngjl.., ..])),
                None => result
                    .slice_mut(s![ngil..ngil + ni, ..ngjl, ..])
                    .assign(&self.boundary_slab(index, PatchEdge::Jl, ngjl, center)?),
            }
        }

        if ngjr > 0 {
            match self.locate(index.translate(0, 1)) {
                Some(neighbor) => result
                    .slice_mut(s![ngil..ngil + ni, mj - ngjr.., ..])
                    .assign(&neighbor.slice(s![.., ..ngjr, ..])),
                None => result
                    .slice_mut(s![ngil..ngil + ni, mj - ngjr.., ..])
                    .assign(&self.boundary_slab(index, PatchEdge::Jr, ngjr, center)?),
            }
        }

        Ok(result)
    }


    /**
     * Resolve a possibly absent patch to an array of patch data, trying
     * three rules in order:
     *
     * 1. the patch itself, if stored (returned as a borrowed view);
     * 2. the quadrant of a stored parent one level coarser, prolongated to
     *    this level;
     * 3. the four stored children one level finer, tiled together and
     *    restricted to this level.
     *
     * Returns `None` when none of the rules apply; `fetch` decides what a
     * miss means. The result is read-only and never aliases mutable state.
     */
    pub fn locate(&self, index: PatchIndex) -> Option<CowArray<'_, f64, Ix3>> {
        if let Some(patch) = self.patches.get(&index) {
            return Some(patch.view().into());
        }

        if let Some(parent) = self.patches.get(&index.coarsen()) {
            let (qi, qj) = index.orientation();
            return Some(prolongation(quadrant(parent.view(), qi, qj).view()).into());
        }

        let children = index.refine();

        if children.iter().all(|child| self.patches.contains_key(child)) {
            let tiled = tile(children.map(|child| self.patches[&child].view()));
            return Some(restriction(tiled.view()).into());
        }

        None
    }


    /**
     * Return a single array spanning the rectangular range of blocks
     * `di` by `dj` at a fixed level, all of which must be stored. Vertex and
     * face data carries redundant samples at interior patch seams (the right
     * faces of one patch are the left faces of the next); each seam sample
     * is taken from the patch that holds it on its lower edge, and no
     * attempt is made to reconcile differing values at the redundant
     * locations. Keeping those consistent is the caller's obligation.
     */
    pub fn assemble(
        &self,
        di: Range<i64>,
        dj: Range<i64>,
        level: i32,
        field: Field,
    ) -> Result<Array, Error> {

        assert!(
            di.start < di.end && dj.start < dj.end,
            "assemble requires a non-empty block range");

        let FieldDescriptor { num_fields, location } = *self.descriptor(field)?;
        let (ni, nj) = (self.ni, self.nj);
        let (bi, bj) = ((di.end - di.start) as usize, (dj.end - dj.start) as usize);

        let (xi, xj) = match location {
            MeshLocation::Cell => (0, 0),
            MeshLocation::Vert => (1, 1),
            MeshLocation::FaceI => (1, 0),
            MeshLocation::FaceJ => (0, 1),
        };
        let mut result = Array::zeros((bi * ni + xi, bj * nj + xj, num_fields));

        for (a, i) in di.clone().enumerate() {
            for (b, j) in dj.clone().enumerate() {
                let index = PatchIndex::new(i, j, level, field);
                let patch = self.patches.get(&index).ok_or(Error::PatchMissing(index))?;

                // Only the last patch on each axis contributes its node-like
                // boundary slab.
                let ei = if i == di.end - 1 { xi } else { 0 };
                let ej = if j == dj.end - 1 { xj } else { 0 };

                result
                    .slice_mut(s![a * ni..(a + 1) * ni + ei, b * nj..(b + 1) * nj + ej, ..])
                    .assign(&patch.slice(s![..ni + ei, ..nj + ej, ..]));
            }
        }
        Ok(result)
    }


    /** Borrow the patch at the given index. */
    pub fn at(&self, index: PatchIndex) -> Result<&Array, Error> {
        self.patches.get(&index).ok_or(Error::PatchMissing(index))
    }


    /**
     * Borrow the patch at the given index, with the index's field component
     * replaced by the given field.
     */
    pub fn at_field(&self, index: PatchIndex, field: Field) -> Result<&Array, Error> {
        self.at(index.with_field(field))
    }


    /** Visit all patches registered for the given field. */
    pub fn all(&self, field: Field) -> impl Iterator<Item = (&PatchIndex, &Array)> {
        self.patches.iter().filter(move |(index, _)| index.field == field)
    }


    /** Visit all stored patches in index order. */
    pub fn iter(&self) -> impl Iterator<Item = (&PatchIndex, &Array)> {
        self.patches.iter()
    }


    /** Return the number of stored patches. */
    pub fn len(&self) -> usize {
        self.patches.len()
    }


    /** Determine whether the database holds no patches. */
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }


    /** Return the number of patches registered for the given field. */
    pub fn count(&self, field: Field) -> usize {
        self.all(field).count()
    }


    /** Return the total number of cells covered by the given field. */
    pub fn num_cells(&self, field: Field) -> usize {
        self.count(field) * self.ni * self.nj
    }


    /**
     * Write the header, the block size, and every patch under its canonical
     * path through the given serializer.
     */
    pub fn dump<S: Serializer>(&self, ser: &mut S) -> Result<(), Error> {
        ser.write_header(&self.header)?;
        ser.write_block_size((self.ni, self.nj))?;

        for (index, data) in &self.patches {
            debug!("write {}", index);
            ser.write_array(&index.to_string(), data)?;
        }
        info!("wrote {} patches", self.patches.len());
        Ok(())
    }


    /**
     * Build a database from the given serializer. If `fields` is non-empty,
     * only patches of those fields are read. After each patch is inserted
     * the `bailout` predicate, if given, is consulted; when it fires the
     * partially loaded database is returned immediately. Loading is the one
     * operation that can hand back a database mid-mutation, and a bailed-out
     * result is usable but incomplete.
     */
    pub fn load<S: Serializer>(
        ser: &S,
        fields: &[Field],
        mut bailout: Option<&mut dyn FnMut() -> bool>,
    ) -> Result<Self, Error> {

        let header = ser.read_header()?;
        let (ni, nj) = ser.read_block_size()?;
        let mut database = Self::new(ni, nj, header);

        for patch in ser.list_patches() {
            for field_name in ser.list_fields(&patch) {
                let field: Field = field_name.parse()?;

                if fields.is_empty() || fields.contains(&field) {
                    let path = format!("{}/{}", patch, field_name);
                    let index: PatchIndex = path.parse()?;

                    debug!("read {}", index);
                    database.insert(index, ser.read_array(&path)?)?;

                    if bailout.as_mut().map_or(false, |f| f()) {
                        info!("load bailed out after {} patches", database.len());
                        return Ok(database);
                    }
                }
            }
        }
        info!("read {} patches", database.len());
        Ok(database)
    }


    // ========================================================================
    fn descriptor(&self, field: Field) -> Result<&FieldDescriptor, Error> {
        self.header.get(&field).ok_or(Error::UnknownField(field))
    }

    fn location(&self, field: Field) -> Result<MeshLocation, Error> {
        Ok(self.descriptor(field)?.location)
    }

    fn check_shape(&self, data: &Array, index: PatchIndex) -> Result<(), Error> {
        let expected = self.expected_shape(index)?;

        if data.dim() != expected {
            return Err(Error::ShapeMismatch { expected, got: data.dim() });
        }
        Ok(())
    }

    fn boundary_slab(
        &self,
        index: PatchIndex,
        edge: PatchEdge,
        depth: usize,
        center: &Array,
    ) -> Result<Array, Error> {

        let callback = self
            .boundary_value
            .as_ref()
            .ok_or(Error::BoundaryUnresolved(index, edge))?;

        let slab = callback(index, edge, depth, center);
        let expected = match edge {
            PatchEdge::Il | PatchEdge::Ir => (depth, self.nj, center.dim().2),
            PatchEdge::Jl | PatchEdge::Jr => (self.ni, depth, center.dim().2),
        };

        if slab.dim() != expected {
            return Err(Error::ShapeMismatch { expected, got: slab.dim() });
        }
        Ok(slab)
    }
}




// ============================================================================
impl fmt::Display for Database {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "block size: {} {}", self.ni, self.nj)?;
        writeln!(fmt, "mesh patches:")?;

        for index in self.patches.keys() {
            writeln!(fmt, "    {}", index)?;
        }
        Ok(())
    }
}


impl<'a> IntoIterator for &'a Database {
    type Item = (&'a PatchIndex, &'a Array);
    type IntoIter = std::collections::btree_map::Iter<'a, PatchIndex, Array>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::collections::BTreeMap;

    use ndarray::{s, Array3};

    use crate::error::Error;
    use crate::field::{Field, FieldDescriptor, Header, MeshLocation};
    use crate::index::{PatchEdge, PatchIndex};
    use super::{Array, Database};

    fn cell_header() -> Header {
        BTreeMap::from([
            (Field::Conserved, FieldDescriptor::new(1, MeshLocation::Cell)),
        ])
    }

    fn conserved(i: i64, j: i64, level: i32) -> PatchIndex {
        PatchIndex::new(i, j, level, Field::Conserved)
    }

    fn ramp() -> Array {
        Array3::from_shape_fn((2, 2, 1), |(a, b, _)| (10 * a + b) as f64)
    }

    fn constant(value: f64) -> Array {
        Array3::from_elem((2, 2, 1), value)
    }


    // ========================================================================
    #[test]
    fn insert_stores_and_at_borrows() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        assert_eq!(database.at(conserved(0, 0, 0)).unwrap(), &ramp());
        assert_eq!(
            database.at(conserved(0, 1, 0)),
            Err(Error::PatchMissing(conserved(0, 1, 0))));
        assert_eq!(
            database.expected_shape(conserved(0, 0, 0)).unwrap(),
            database.at(conserved(0, 0, 0)).unwrap().dim());
    }

    #[test]
    fn insert_rejects_bad_shapes_and_leaves_the_store_alone() {
        let mut database = Database::new(2, 2, cell_header());

        let result = database.insert(conserved(0, 0, 0), Array::zeros((3, 2, 1)));

        assert_eq!(
            result,
            Err(Error::ShapeMismatch { expected: (2, 2, 1), got: (3, 2, 1) }));
        assert!(database.is_empty());
    }

    #[test]
    fn insert_rejects_unregistered_fields() {
        let mut database = Database::new(2, 2, cell_header());
        let index = PatchIndex::new(0, 0, 0, Field::Primitive);

        assert_eq!(
            database.insert(index, Array::zeros((2, 2, 1))),
            Err(Error::UnknownField(Field::Primitive)));
    }

    #[test]
    fn erase_and_clear_remove_patches() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();
        database.insert(conserved(0, 1, 0), constant(3.0)).unwrap();

        assert_eq!(database.erase(conserved(0, 0, 0)), Some(ramp()));
        assert_eq!(database.erase(conserved(0, 0, 0)), None);
        assert_eq!(database.len(), 1);

        database.clear();
        assert!(database.is_empty());
    }

    #[test]
    fn introspection_counts_by_field() {
        let header = BTreeMap::from([
            (Field::Conserved, FieldDescriptor::new(1, MeshLocation::Cell)),
            (Field::CellCoords, FieldDescriptor::new(2, MeshLocation::Cell)),
        ]);
        let mut database = Database::new(2, 2, header);

        database.insert(conserved(0, 0, 0), ramp()).unwrap();
        database.insert(conserved(1, 0, 0), ramp()).unwrap();
        database
            .insert(conserved(0, 0, 0).with_field(Field::CellCoords), Array::zeros((2, 2, 2)))
            .unwrap();

        assert_eq!(database.len(), 3);
        assert_eq!(database.count(Field::Conserved), 2);
        assert_eq!(database.count(Field::CellCoords), 1);
        assert_eq!(database.num_cells(Field::Conserved), 8);
        assert_eq!(database.all(Field::Conserved).count(), 2);
        assert_eq!(database.iter().count(), 3);
        assert_eq!(
            database.at_field(conserved(0, 0, 0), Field::CellCoords).unwrap().dim(),
            (2, 2, 2));
    }


    // ========================================================================
    #[test]
    fn locate_finds_stored_patches() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        assert_eq!(database.locate(conserved(0, 0, 0)).unwrap(), ramp());
        assert!(database.locate(conserved(5, 5, 0)).is_none());
    }

    #[test]
    fn locate_prolongates_a_stored_parent() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        // Each child of block (0, 0) is one replicated zone of the parent.
        assert_eq!(database.locate(conserved(0, 0, 1)).unwrap(), constant(0.0));
        assert_eq!(database.locate(conserved(0, 1, 1)).unwrap(), constant(1.0));
        assert_eq!(database.locate(conserved(1, 0, 1)).unwrap(), constant(10.0));
        assert_eq!(database.locate(conserved(1, 1, 1)).unwrap(), constant(11.0));
    }

    #[test]
    fn locate_prolongates_at_negative_coordinates() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(-1, -1, 0), ramp()).unwrap();

        assert_eq!(database.locate(conserved(-2, -2, 1)).unwrap(), constant(0.0));
        assert_eq!(database.locate(conserved(-1, -1, 1)).unwrap(), constant(11.0));
    }

    #[test]
    fn locate_restricts_four_stored_children() {
        let mut database = Database::new(2, 2, cell_header());

        for (n, child) in conserved(0, 0, 0).refine().into_iter().enumerate() {
            let (a, b) = (n / 2, n % 2);
            database.insert(child, constant((a + b) as f64)).unwrap();
        }

        let expected = Array3::from_shape_vec((2, 2, 1), vec![0.0, 1.0, 1.0, 2.0]).unwrap();
        assert_eq!(database.locate(conserved(0, 0, 0)).unwrap(), expected);
    }

    #[test]
    fn locate_requires_all_four_children() {
        let mut database = Database::new(2, 2, cell_header());

        for child in conserved(0, 0, 0).refine().into_iter().skip(1) {
            database.insert(child, constant(1.0)).unwrap();
        }
        assert!(database.locate(conserved(0, 0, 0)).is_none());
    }


    // ========================================================================
    #[test]
    fn fetch_with_zero_guards_copies_the_patch() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        assert_eq!(database.fetch(conserved(0, 0, 0), 0).unwrap(), ramp());
    }

    #[test]
    fn fetch_assembles_neighbors_callback_and_corners() {
        let mut database = Database::new(2, 2, cell_header());

        for (i, j) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            database
                .insert(conserved(i, j, 0), constant((10 * i + j) as f64))
                .unwrap();
        }
        database.set_boundary_value(|_, edge, depth, patch| {
            let (ni, nj, k) = patch.dim();
            match edge {
                PatchEdge::Il | PatchEdge::Ir => Array::from_elem((depth, nj, k), 9.0),
                PatchEdge::Jl | PatchEdge::Jr => Array::from_elem((ni, depth, k), 9.0),
            }
        });

        let result = database.fetch(conserved(0, 0, 0), 1).unwrap();
        let expected = Array3::from_shape_vec((4, 4, 1), vec![
            0.0,  9.0,  9.0, 0.0,
            9.0,  0.0,  0.0, 1.0,
            9.0,  0.0,  0.0, 1.0,
            0.0, 10.0, 10.0, 0.0,
        ])
        .unwrap();

        assert_eq!(result, expected);
    }

    #[test]
    fn fetch_interior_always_equals_the_stored_patch() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();
        database.set_boundary_value(|_, edge, depth, patch| {
            let (ni, nj, k) = patch.dim();
            match edge {
                PatchEdge::Il | PatchEdge::Ir => Array::zeros((depth, nj, k)),
                PatchEdge::Jl | PatchEdge::Jr => Array::zeros((ni, depth, k)),
            }
        });

        let result = database.fetch(conserved(0, 0, 0), 2).unwrap();

        assert_eq!(result.dim(), (6, 6, 1));
        assert_eq!(result.slice(s![2..4, 2..4, ..]), ramp());
    }

    #[test]
    fn fetch_fills_guards_from_a_coarser_neighbor() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();
        database.insert(conserved(1, 1, 1), constant(0.0)).unwrap();

        let result = database.fetch_with(conserved(1, 1, 1), [1, 0, 1, 0]).unwrap();
        let expected = Array3::from_shape_vec((3, 3, 1), vec![
             0.0, 1.0, 1.0,
            10.0, 0.0, 0.0,
            10.0, 0.0, 0.0,
        ])
        .unwrap();

        assert_eq!(result, expected);
    }

    #[test]
    fn fetch_fills_guards_from_finer_neighbors() {
        let mut database = Database::new(2, 2, cell_header());

        for (n, child) in conserved(0, 0, 0).refine().into_iter().enumerate() {
            let (a, b) = (n / 2, n % 2);
            database.insert(child, constant((a + b) as f64)).unwrap();
        }
        database.insert(conserved(1, 0, 0), constant(0.0)).unwrap();

        let result = database.fetch_with(conserved(1, 0, 0), [1, 0, 0, 0]).unwrap();
        let expected = Array3::from_shape_vec((3, 2, 1), vec![
            1.0, 2.0,
            0.0, 0.0,
            0.0, 0.0,
        ])
        .unwrap();

        assert_eq!(result, expected);
    }

    #[test]
    fn fetch_requires_the_center_patch() {
        let database = Database::new(2, 2, cell_header());

        assert_eq!(
            database.fetch(conserved(0, 0, 0), 1),
            Err(Error::PatchMissing(conserved(0, 0, 0))));
    }

    #[test]
    fn fetch_requires_cell_data() {
        let header = BTreeMap::from([
            (Field::VertCoords, FieldDescriptor::new(2, MeshLocation::Vert)),
        ]);
        let mut database = Database::new(2, 2, header);
        let index = PatchIndex::new(0, 0, 0, Field::VertCoords);

        database.insert(index, Array::zeros((3, 3, 2))).unwrap();

        assert_eq!(
            database.fetch(index, 1),
            Err(Error::UnsupportedLocation(MeshLocation::Vert)));
    }

    #[test]
    fn fetch_without_a_callback_fails_on_unresolved_edges() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        assert_eq!(
            database.fetch_with(conserved(0, 0, 0), [1, 0, 0, 0]),
            Err(Error::BoundaryUnresolved(conserved(0, 0, 0), PatchEdge::Il)));
    }

    #[test]
    fn fetch_rejects_misshapen_callback_slabs() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();
        database.set_boundary_value(|_, _, _, _| Array::zeros((1, 1, 1)));

        assert_eq!(
            database.fetch_with(conserved(0, 0, 0), [1, 0, 0, 0]),
            Err(Error::ShapeMismatch { expected: (1, 2, 1), got: (1, 1, 1) }));
    }


    // ========================================================================
    #[test]
    fn commit_blends_with_the_stored_data() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), constant(2.0)).unwrap();
        database.commit(conserved(0, 0, 0), constant(8.0), 0.25).unwrap();

        assert_eq!(database.at(conserved(0, 0, 0)).unwrap(), &constant(6.5));
    }

    #[test]
    fn commit_extremes_overwrite_or_keep() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), constant(2.0)).unwrap();

        database.commit(conserved(0, 0, 0), constant(8.0), 1.0).unwrap();
        assert_eq!(database.at(conserved(0, 0, 0)).unwrap(), &constant(2.0));

        database.commit(conserved(0, 0, 0), constant(8.0), 0.0).unwrap();
        assert_eq!(database.at(conserved(0, 0, 0)).unwrap(), &constant(8.0));
    }

    #[test]
    fn commit_requires_an_existing_patch_of_the_right_shape() {
        let mut database = Database::new(2, 2, cell_header());

        assert_eq!(
            database.commit(conserved(0, 0, 0), constant(1.0), 0.0),
            Err(Error::PatchMissing(conserved(0, 0, 0))));

        database.insert(conserved(0, 0, 0), constant(2.0)).unwrap();

        assert_eq!(
            database.commit(conserved(0, 0, 0), Array::zeros((1, 2, 1)), 0.0),
            Err(Error::ShapeMismatch { expected: (2, 2, 1), got: (1, 2, 1) }));
        assert_eq!(database.at(conserved(0, 0, 0)).unwrap(), &constant(2.0));
    }


    // ========================================================================
    #[test]
    fn assemble_concatenates_cell_patches() {
        let mut database = Database::new(2, 2, cell_header());

        for (i, j) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            database
                .insert(conserved(i, j, 0), constant((10 * i + j) as f64))
                .unwrap();
        }

        let result = database.assemble(0..2, 0..2, 0, Field::Conserved).unwrap();

        assert_eq!(result.dim(), (4, 4, 1));
        assert_eq!(result.slice(s![0..2, 0..2, ..]), constant(0.0));
        assert_eq!(result.slice(s![0..2, 2..4, ..]), constant(1.0));
        assert_eq!(result.slice(s![2..4, 0..2, ..]), constant(10.0));
        assert_eq!(result.slice(s![2..4, 2..4, ..]), constant(11.0));

        let offset = database.assemble(1..2, 0..2, 0, Field::Conserved).unwrap();

        assert_eq!(offset.dim(), (2, 4, 1));
        assert_eq!(offset.slice(s![.., 0..2, ..]), constant(10.0));
        assert_eq!(offset.slice(s![.., 2..4, ..]), constant(11.0));
    }

    #[test]
    fn assemble_resolves_node_seams_from_the_upper_patch() {
        let header = BTreeMap::from([
            (Field::VertCoords, FieldDescriptor::new(1, MeshLocation::Vert)),
        ]);
        let mut database = Database::new(2, 2, header);
        let vert = |i, j| PatchIndex::new(i, j, 0, Field::VertCoords);

        database.insert(vert(0, 0), Array::from_elem((3, 3, 1), 0.0)).unwrap();
        database.insert(vert(1, 0), Array::from_elem((3, 3, 1), 1.0)).unwrap();

        let result = database.assemble(0..2, 0..1, 0, Field::VertCoords).unwrap();

        assert_eq!(result.dim(), (5, 3, 1));
        assert_eq!(result.slice(s![0..2, .., ..]), Array::from_elem((2, 3, 1), 0.0));
        assert_eq!(result.slice(s![2..5, .., ..]), Array::from_elem((3, 3, 1), 1.0));
    }

    #[test]
    fn assemble_requires_every_patch() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        assert_eq!(
            database.assemble(0..2, 0..1, 0, Field::Conserved),
            Err(Error::PatchMissing(conserved(1, 0, 0))));
    }


    // ========================================================================
    #[test]
    fn display_lists_the_stored_patches() {
        let mut database = Database::new(2, 2, cell_header());

        database.insert(conserved(0, 0, 0), ramp()).unwrap();

        let text = database.to_string();
        assert!(text.contains("block size: 2 2"));
        assert!(text.contains("0.0-0/conserved"));
    }
}
