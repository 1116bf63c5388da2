//! Opaque compute-context and device-buffer seam
//!
//! The transform layer never talks to a GPU API directly. Embedders implement
//! [`ContextOps`] over their device/queue object and hand buffers around as
//! [`DeviceArray`] values: a reference-counted base allocation identified by a
//! `u64` handle, plus a byte offset, shape, and element type.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::shape;
use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::sync::Arc;

/// Operations the transform layer needs from a compute context.
///
/// One implementation wraps one device + queue pair. Handles are opaque
/// `u64` values whose meaning is private to the implementation.
pub trait ContextOps: Send + Sync {
    /// Stable identity of this context within the process
    fn id(&self) -> usize;

    /// Allocate `size_bytes` of device memory, returning its handle
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Release an allocation made by [`ContextOps::allocate`]
    fn deallocate(&self, handle: u64, size_bytes: usize);

    /// Block until every operation queued on this context has completed
    fn finish(&self);

    /// Copy host bytes into an allocation at a byte offset
    fn upload(&self, handle: u64, byte_offset: usize, src: &[u8]) -> Result<()>;

    /// Copy bytes from an allocation at a byte offset into host memory
    fn download(&self, handle: u64, byte_offset: usize, dst: &mut [u8]) -> Result<()>;
}

/// Pluggable allocation strategy for [`DeviceArray::empty_with`].
///
/// The default strategy allocates straight from the context; embedders can
/// interpose pooling or alignment policies here.
pub trait BufferAllocator: Send + Sync {
    /// Allocate `size_bytes`, returning the handle
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Release an allocation made by this allocator
    fn deallocate(&self, handle: u64, size_bytes: usize);
}

/// Cheap cloneable handle to a compute context
#[derive(Clone)]
pub struct Context {
    ops: Arc<dyn ContextOps>,
}

impl Context {
    /// Wrap a context implementation
    pub fn new(ops: Arc<dyn ContextOps>) -> Self {
        Context { ops }
    }

    /// Stable identity of this context within the process
    pub fn id(&self) -> usize {
        self.ops.id()
    }

    /// Whether two handles refer to the same context
    pub fn is_same(&self, other: &Context) -> bool {
        self.id() == other.id()
    }

    /// Block until every operation queued on this context has completed
    pub fn finish(&self) {
        self.ops.finish();
    }

    /// Allocator that allocates straight from this context
    pub fn default_allocator(&self) -> Arc<dyn BufferAllocator> {
        Arc::new(ContextAllocator {
            ops: Arc::clone(&self.ops),
        })
    }

    fn upload(&self, handle: u64, byte_offset: usize, src: &[u8]) -> Result<()> {
        self.ops.upload(handle, byte_offset, src)
    }

    fn download(&self, handle: u64, byte_offset: usize, dst: &mut [u8]) -> Result<()> {
        self.ops.download(handle, byte_offset, dst)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.id())
    }
}

struct ContextAllocator {
    ops: Arc<dyn ContextOps>,
}

impl BufferAllocator for ContextAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        self.ops.allocate(size_bytes)
    }

    fn deallocate(&self, handle: u64, size_bytes: usize) {
        self.ops.deallocate(handle, size_bytes)
    }
}

/// One base allocation; freed through its allocator when the last view drops
struct Storage {
    context: Context,
    allocator: Arc<dyn BufferAllocator>,
    handle: u64,
    size_bytes: usize,
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.allocator.deallocate(self.handle, self.size_bytes);
    }
}

/// An N-dimensional typed view into a device allocation
///
/// Clones share the underlying allocation. Views created by
/// [`DeviceArray::reinterpret`] and [`DeviceArray::offset_view`] share it too,
/// so the allocation lives until the last view drops.
#[derive(Clone)]
pub struct DeviceArray {
    storage: Arc<Storage>,
    byte_offset: usize,
    shape: Vec<usize>,
    dtype: DType,
}

impl DeviceArray {
    /// Allocate an uninitialized array with the context's default allocator
    pub fn empty(context: &Context, shape: &[usize], dtype: DType) -> Result<Self> {
        let allocator = context.default_allocator();
        Self::empty_with(context, shape, dtype, &allocator)
    }

    /// Allocate an uninitialized array with an explicit allocator
    pub fn empty_with(
        context: &Context,
        shape: &[usize],
        dtype: DType,
        allocator: &Arc<dyn BufferAllocator>,
    ) -> Result<Self> {
        let size_bytes = shape::num_elements(shape) * dtype.size_in_bytes();
        let handle = allocator.allocate(size_bytes)?;
        Ok(DeviceArray {
            storage: Arc::new(Storage {
                context: context.clone(),
                allocator: Arc::clone(allocator),
                handle,
                size_bytes,
            }),
            byte_offset: 0,
            shape: shape.to_vec(),
            dtype,
        })
    }

    /// Allocate a fresh array with this array's shape, dtype, and allocator
    pub fn empty_like(&self) -> Result<Self> {
        Self::empty_with(
            &self.storage.context,
            &self.shape,
            self.dtype,
            &self.storage.allocator,
        )
    }

    /// Logical shape (slowest axis first)
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Context this array lives on
    pub fn context(&self) -> &Context {
        &self.storage.context
    }

    /// Handle of the base allocation
    pub fn base_handle(&self) -> u64 {
        self.storage.handle
    }

    /// Byte offset of this view within the base allocation
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Number of elements in the view
    pub fn num_elements(&self) -> usize {
        shape::num_elements(&self.shape)
    }

    /// Byte length of the view
    pub fn size_bytes(&self) -> usize {
        self.num_elements() * self.dtype.size_in_bytes()
    }

    /// View the same bytes as a different shape and element type.
    ///
    /// The new view starts at the same offset and must fit inside the base
    /// allocation. This is how an in-place real transform exposes its result:
    /// the padded real buffer reinterpreted as the complex half spectrum, or
    /// the reverse.
    pub fn reinterpret(&self, dtype: DType, new_shape: &[usize]) -> Result<Self> {
        let new_bytes = shape::num_elements(new_shape) * dtype.size_in_bytes();
        if self.byte_offset + new_bytes > self.storage.size_bytes {
            return Err(Error::ShapeMismatch {
                op: "reinterpret",
                expected: self.shape.clone(),
                got: new_shape.to_vec(),
            });
        }
        Ok(DeviceArray {
            storage: Arc::clone(&self.storage),
            byte_offset: self.byte_offset,
            shape: new_shape.to_vec(),
            dtype,
        })
    }

    /// View a sub-range starting `elements` into this view.
    pub fn offset_view(&self, elements: usize, new_shape: &[usize]) -> Result<Self> {
        let byte_offset = self.byte_offset + elements * self.dtype.size_in_bytes();
        let new_bytes = shape::num_elements(new_shape) * self.dtype.size_in_bytes();
        if byte_offset + new_bytes > self.storage.size_bytes {
            return Err(Error::ShapeMismatch {
                op: "offset_view",
                expected: self.shape.clone(),
                got: new_shape.to_vec(),
            });
        }
        Ok(DeviceArray {
            storage: Arc::clone(&self.storage),
            byte_offset,
            shape: new_shape.to_vec(),
            dtype: self.dtype,
        })
    }

    /// Upload a host slice into this view. The byte lengths must match.
    pub fn write_slice<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != self.size_bytes() {
            return Err(Error::SizeMismatch {
                op: "write_slice",
                array_bytes: self.size_bytes(),
                host_bytes: bytes.len(),
            });
        }
        self.storage
            .context
            .upload(self.storage.handle, self.byte_offset, bytes)
    }

    /// Download this view into a host vector. `T`'s size must divide the
    /// view's byte length.
    pub fn read_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let elem = std::mem::size_of::<T>();
        if elem == 0 || self.size_bytes() % elem != 0 {
            return Err(Error::SizeMismatch {
                op: "read_vec",
                array_bytes: self.size_bytes(),
                host_bytes: elem,
            });
        }
        let mut out = vec![T::zeroed(); self.size_bytes() / elem];
        self.storage.context.download(
            self.storage.handle,
            self.byte_offset,
            bytemuck::cast_slice_mut(&mut out),
        )?;
        Ok(out)
    }
}

impl fmt::Debug for DeviceArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceArray")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("byte_offset", &self.byte_offset)
            .field("context", &self.storage.context)
            .finish()
    }
}

/// Whether two operands occupy the same allocation at the same offset.
///
/// `None` on either side means out-of-place. Distinct offsets into one
/// allocation are out-of-place too.
pub fn is_in_place(a: Option<&DeviceArray>, b: Option<&DeviceArray>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            a.context().is_same(b.context())
                && a.base_handle() == b.base_handle()
                && a.byte_offset() == b.byte_offset()
        }
        _ => false,
    }
}
