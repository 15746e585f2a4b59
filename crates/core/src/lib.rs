//! Low-level data structures shared by the compiler and the VM: the tagged
//! [`Value`], the heap of interned strings, the string/global hash table,
//! and bytecode [`Chunk`]s.

pub mod chunk;
pub mod error;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use error::CoreError;
pub use object::{copy_string, fnv1a_hash, take_string, Heap, ObjHandle};
pub use table::Table;
pub use value::Value;
