use std::collections::BTreeMap;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::field::Header;
use crate::index::PatchIndex;




/**
 * The storage capability consumed by `Database::dump` and `Database::load`.
 * An implementation maps patch paths (the canonical index encoding,
 * `<level>.<i>-<j>/<field>`) to arrays, and holds one header document and
 * one block size document alongside them. A filesystem implementation would
 * back these with directories and files, an HDF5 one with groups and
 * datasets; the database does not care.
 */
pub trait Serializer {

    /** Return the names of the patches currently in storage. */
    fn list_patches(&self) -> Vec<String>;

    /** Return the field names stored under the given patch name. */
    fn list_fields(&self, patch: &str) -> Vec<String>;

    /** Read the array stored at the given path. */
    fn read_array(&self, path: &str) -> Result<Array3<f64>, Error>;

    /** Read the header document. */
    fn read_header(&self) -> Result<Header, Error>;

    /** Read the block size document. */
    fn read_block_size(&self) -> Result<(usize, usize), Error>;

    /** Write an array of patch data at the given path. */
    fn write_array(&mut self, path: &str, data: &Array3<f64>) -> Result<(), Error>;

    /** Write the header document. */
    fn write_header(&mut self, header: &Header) -> Result<(), Error>;

    /** Write the block size document. */
    fn write_block_size(&mut self, block_size: (usize, usize)) -> Result<(), Error>;
}




/**
 * A serializer backed by process memory. Patch arrays are held as-is in an
 * ordered map; the header and block size are held as JSON documents in their
 * canonical serialized forms. Round-trip tests and demos use this in place
 * of a real storage backend.
 */
#[derive(Default)]
pub struct MemorySerializer {
    header: Option<serde_json::Value>,
    block_size: Option<serde_json::Value>,
    arrays: BTreeMap<String, Array3<f64>>,
}


#[derive(Serialize, Deserialize)]
struct BlockSize {
    ni: usize,
    nj: usize,
}


impl MemorySerializer {
    pub fn new() -> Self {
        Self::default()
    }
}




// ============================================================================
impl Serializer for MemorySerializer {

    fn list_patches(&self) -> Vec<String> {
        let mut patches: Vec<String> = self
            .arrays
            .keys()
            .filter_map(|path| path.split_once('/'))
            .map(|(patch, _)| patch.to_string())
            .collect();

        patches.dedup();
        patches
    }

    fn list_fields(&self, patch: &str) -> Vec<String> {
        let prefix = format!("{}/", patch);

        self.arrays
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .map(String::from)
            .collect()
    }

    fn read_array(&self, path: &str) -> Result<Array3<f64>, Error> {
        let index: PatchIndex = path.parse()?;

        self.arrays
            .get(path)
            .cloned()
            .ok_or(Error::PatchMissing(index))
    }

    fn read_header(&self) -> Result<Header, Error> {
        let value = self
            .header
            .clone()
            .ok_or_else(|| Error::ParseError("storage has no header document".to_string()))?;

        serde_json::from_value(value).map_err(|e| Error::ParseError(e.to_string()))
    }

    fn read_block_size(&self) -> Result<(usize, usize), Error> {
        let value = self
            .block_size
            .clone()
            .ok_or_else(|| Error::ParseError("storage has no block size document".to_string()))?;

        let BlockSize { ni, nj } =
            serde_json::from_value(value).map_err(|e| Error::ParseError(e.to_string()))?;

        Ok((ni, nj))
    }

    fn write_array(&mut self, path: &str, data: &Array3<f64>) -> Result<(), Error> {
        self.arrays.insert(path.to_string(), data.clone());
        Ok(())
    }

    fn write_header(&mut self, header: &Header) -> Result<(), Error> {
        self.header = Some(serde_json::to_value(header).map_err(|e| Error::ParseError(e.to_string()))?);
        Ok(())
    }

    fn write_block_size(&mut self, (ni, nj): (usize, usize)) -> Result<(), Error> {
        self.block_size =
            Some(serde_json::to_value(BlockSize { ni, nj }).map_err(|e| Error::ParseError(e.to_string()))?);
        Ok(())
    }
}
