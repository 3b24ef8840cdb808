//! Durable storage for intermediate and final arrays.
//!
//! Arrays are written as NumPy `.npy` files (format version 1.0,
//! little-endian `f64`, C order) so they can be loaded directly with
//! `numpy.load`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_shape, Error, Result};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGNMENT: usize = 64;

/// Dense n-dimensional `f64` array in C (row-major) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    /// Create from a shape and row-major data.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `data.len()` is not the product of `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::InvalidParameter {
                name: "data",
                reason: format!("shape {shape:?} needs {expected} values, got {}", data.len()),
            });
        }
        Ok(Self { shape, data })
    }

    /// Two-dimensional array with the matrix's rows and columns.
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Self {
        let (rows, cols) = matrix.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for row in matrix.row_iter() {
            data.extend(row.iter().copied());
        }
        Self {
            shape: vec![rows, cols],
            data,
        }
    }

    /// Three-dimensional array stacking equal-shape matrices along axis 0.
    ///
    /// # Errors
    ///
    /// - [`Error::InsufficientData`] if `matrices` is empty.
    /// - [`Error::ShapeMismatch`] if the matrices differ in shape.
    pub fn from_stack(matrices: &[&DMatrix<f64>]) -> Result<Self> {
        let first = matrices.first().ok_or(Error::InsufficientData {
            what: "array stack",
            got: 0,
            need: 1,
        })?;
        let (rows, cols) = first.shape();

        let mut data = Vec::with_capacity(matrices.len() * rows * cols);
        for matrix in matrices {
            ensure_same_shape((rows, cols), matrix.shape())?;
            data.extend(Self::from_matrix(matrix).data);
        }
        Ok(Self {
            shape: vec![matrices.len(), rows, cols],
            data,
        })
    }

    /// Array dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Values in C order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Encode as a complete `.npy` v1.0 file.
    pub fn to_npy_bytes(&self) -> Vec<u8> {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({n},)"),
            dims => format!(
                "({})",
                dims.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
        };
        let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape}, }}");

        // magic + version + u16 length + header + '\n' is padded to the alignment
        let preamble = NPY_MAGIC.len() + 2 + 2;
        let unpadded = preamble + header.len() + 1;
        let padding = (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT;
        header.extend(std::iter::repeat(' ').take(padding));
        header.push('\n');

        let mut bytes = Vec::with_capacity(preamble + header.len() + self.data.len() * 8);
        bytes.extend_from_slice(NPY_MAGIC);
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}

/// Destination for persisted arrays and summaries.
pub trait ArrayStore {
    /// Persist `array` under `name` and return where it was written.
    fn save(&mut self, name: &str, array: &NdArray) -> Result<PathBuf>;

    /// Persist a JSON document under `name`.
    fn save_json(&mut self, name: &str, value: &serde_json::Value) -> Result<PathBuf>;
}

/// Writes `{name}.npy` and `{name}.json` files under a directory.
#[derive(Debug, Clone)]
pub struct NpyStore {
    root: PathBuf,
}

impl NpyStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory files are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, file_name: String, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|source| Error::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.root.join(file_name);
        let io_err = |source| Error::Io {
            path: path.clone(),
            source,
        };
        let mut file = fs::File::create(&path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved array");
        Ok(path)
    }
}

impl ArrayStore for NpyStore {
    fn save(&mut self, name: &str, array: &NdArray) -> Result<PathBuf> {
        tracing::debug!(name, shape = ?array.shape(), "writing npy");
        self.write(format!("{name}.npy"), &array.to_npy_bytes())
    }

    fn save_json(&mut self, name: &str, value: &serde_json::Value) -> Result<PathBuf> {
        let text = serde_json::to_string_pretty(value)?;
        self.write(format!("{name}.json"), text.as_bytes())
    }
}

/// Keeps saved arrays in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    arrays: BTreeMap<String, NdArray>,
    documents: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Array saved under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&NdArray> {
        self.arrays.get(name)
    }

    /// JSON document saved under `name`, if any.
    pub fn document(&self, name: &str) -> Option<&serde_json::Value> {
        self.documents.get(name)
    }

    /// Names of saved arrays in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }
}

impl ArrayStore for MemoryStore {
    fn save(&mut self, name: &str, array: &NdArray) -> Result<PathBuf> {
        self.arrays.insert(name.to_string(), array.clone());
        Ok(PathBuf::from(format!("{name}.npy")))
    }

    fn save_json(&mut self, name: &str, value: &serde_json::Value) -> Result<PathBuf> {
        self.documents.insert(name.to_string(), value.clone());
        Ok(PathBuf::from(format!("{name}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_matrix_is_row_major() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = NdArray::from_matrix(&m);
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_stack() {
        let a = DMatrix::from_element(2, 2, 1.0);
        let b = DMatrix::from_element(2, 2, 2.0);
        let stack = NdArray::from_stack(&[&a, &b]).unwrap();
        assert_eq!(stack.shape(), &[2, 2, 2]);
        assert_eq!(&stack.data()[4..], &[2.0; 4]);

        let c = DMatrix::from_element(3, 2, 0.0);
        assert!(NdArray::from_stack(&[&a, &c]).is_err());
        assert!(NdArray::from_stack(&[]).is_err());
    }

    #[test]
    fn test_new_checks_length() {
        assert!(NdArray::new(vec![2, 2], vec![0.0; 3]).is_err());
        assert!(NdArray::new(vec![4], vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_npy_header_layout() {
        let array = NdArray::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
        let bytes = array.to_npy_bytes();
        assert_eq!(&bytes[..6], NPY_MAGIC);
        assert_eq!(&bytes[6..8], &[1, 0]);

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % NPY_ALIGNMENT, 0);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (3,), }"));
        assert!(header.ends_with('\n'));

        let payload = &bytes[10 + header_len..];
        assert_eq!(payload.len(), 24);
        assert_eq!(f64::from_le_bytes(payload[8..16].try_into().unwrap()), 2.0);
    }

    #[test]
    fn test_npy_store_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("out");
        let mut store = NpyStore::new(&root);

        let m = DMatrix::from_element(2, 2, 0.5);
        let path = store.save("cors", &NdArray::from_matrix(&m)).unwrap();
        assert_eq!(path, root.join("cors.npy"));
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes, NdArray::from_matrix(&m).to_npy_bytes());

        let json_path = store.save_json("summary", &serde_json::json!({"regions": 2})).unwrap();
        let text = fs::read_to_string(json_path).unwrap();
        assert!(text.contains("\"regions\": 2"));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        let array = NdArray::new(vec![1], vec![7.0]).unwrap();
        store.save("b", &array).unwrap();
        store.save("a", &array).unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("a"), Some(&array));
        assert!(store.get("c").is_none());
    }
}
