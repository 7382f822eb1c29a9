use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;

use crate::ShapeViolation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    F32,
    F16,
    I64,
    I32,
    U8,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::I32 => 4,
            DType::U8 => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Element strides of a dense row-major tensor with this shape.
    pub fn contiguous_strides(&self) -> SmallVec<[usize; 6]> {
        let mut strides: SmallVec<[usize; 6]> = SmallVec::from_elem(1, self.rank());
        for axis in (0..self.rank().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.0[axis + 1];
        }
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
    /// Element strides; `None` means dense row-major.
    pub strides: Option<SmallVec<[usize; 6]>>,
}

/// A tensor over little-endian element bytes.
///
/// Cloning is cheap: the storage is a reference-counted [`Bytes`] buffer, so
/// reshapes of dense tensors share it.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub data: Bytes,
}

impl Tensor {
    pub fn from_bytes(dtype: DType, shape: Shape, data: Bytes) -> Self {
        Self {
            desc: TensorDesc {
                dtype,
                shape,
                strides: None,
            },
            data,
        }
    }

    pub fn from_f32(shape: Shape, values: &[f32]) -> Self {
        let mut buf = BytesMut::with_capacity(std::mem::size_of_val(values));
        for v in values {
            buf.put_f32_le(*v);
        }
        Self::from_bytes(DType::F32, shape, buf.freeze())
    }

    /// Reinterprets the storage with explicit element strides.
    pub fn with_strides(mut self, strides: &[usize]) -> Self {
        self.desc.strides = Some(strides.iter().copied().collect());
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn numel(&self) -> usize {
        self.desc.shape.numel()
    }

    /// Number of bytes this tensor occupies once serialized densely.
    pub fn dense_byte_len(&self) -> usize {
        self.numel() * self.desc.dtype.byte_size()
    }

    pub fn is_contiguous(&self) -> bool {
        match &self.desc.strides {
            None => true,
            Some(strides) => *strides == self.desc.shape.contiguous_strides(),
        }
    }

    /// Checks that the storage can back every element the descriptor names.
    pub fn check_storage(&self) -> Result<(), ShapeViolation> {
        let elem = self.desc.dtype.byte_size();
        let expected = match &self.desc.strides {
            None => self.dense_byte_len(),
            Some(strides) => {
                if strides.len() != self.desc.shape.rank() {
                    return Err(ShapeViolation::StrideRank {
                        shape: self.desc.shape.clone(),
                        strides: strides.len(),
                    });
                }
                if self.numel() == 0 {
                    0
                } else {
                    let last = self
                        .desc
                        .shape
                        .0
                        .iter()
                        .zip(strides.iter())
                        .map(|(d, s)| (d - 1) * s)
                        .sum::<usize>();
                    (last + 1) * elem
                }
            }
        };

        let ok = if self.desc.strides.is_none() {
            self.data.len() == expected
        } else {
            self.data.len() >= expected
        };
        if ok {
            Ok(())
        } else {
            Err(ShapeViolation::ByteLength {
                shape: self.desc.shape.clone(),
                expected,
                got: self.data.len(),
            })
        }
    }

    /// Returns a dense row-major copy, or a cheap clone if already dense.
    pub fn to_contiguous(&self) -> Result<Tensor, ShapeViolation> {
        self.check_storage()?;
        let Some(strides) = self.desc.strides.as_ref().filter(|_| !self.is_contiguous()) else {
            // row-major strides may still sit over a longer buffer
            return Ok(Tensor::from_bytes(
                self.desc.dtype,
                self.desc.shape.clone(),
                self.data.slice(..self.dense_byte_len()),
            ));
        };

        let elem = self.desc.dtype.byte_size();
        let dims = self.desc.shape.dims();
        let mut out = BytesMut::with_capacity(self.dense_byte_len());
        let mut index: SmallVec<[usize; 6]> = SmallVec::from_elem(0, dims.len());

        for _ in 0..self.numel() {
            let offset = index
                .iter()
                .zip(strides.iter())
                .map(|(i, s)| i * s)
                .sum::<usize>()
                * elem;
            out.extend_from_slice(&self.data[offset..offset + elem]);

            // odometer increment, last axis fastest
            for axis in (0..dims.len()).rev() {
                index[axis] += 1;
                if index[axis] < dims[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        Ok(Tensor::from_bytes(
            self.desc.dtype,
            self.desc.shape.clone(),
            out.freeze(),
        ))
    }

    /// Views a dense tensor under a new shape with the same element count.
    pub fn reshape(&self, shape: Shape) -> Result<Tensor, ShapeViolation> {
        if shape.numel() != self.numel() {
            return Err(ShapeViolation::Reshape {
                from: self.desc.shape.clone(),
                to: shape,
            });
        }
        let dense = self.to_contiguous()?;
        Ok(Tensor::from_bytes(dense.desc.dtype, shape, dense.data))
    }

    /// Decodes the tensor as f32 values in row-major order.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, ShapeViolation> {
        if self.desc.dtype != DType::F32 {
            return Err(ShapeViolation::DType(self.desc.dtype));
        }
        let dense = self.to_contiguous()?;
        Ok(dense
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}
