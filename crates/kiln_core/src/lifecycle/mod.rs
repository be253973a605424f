//! Object lifecycle: intrusive reference counting and live-object
//! accounting.
//!
//! A [`RefCounted`] value is created with a count of zero and destroyed
//! when a release brings the count from 1 to 0. Callers normally hold it
//! through a [`Retained`] handle, which retains on creation and releases on
//! drop. Every counted object also carries an [`InstanceCounted`] token so
//! that [`object_count`] reports how many are alive.

mod counter;
mod ref_counted;
mod retained;

pub use counter::{object_count, InstanceCounted};
pub use ref_counted::RefCounted;
pub use retained::Retained;
