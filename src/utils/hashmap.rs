//! Aliases for the hash-map and hash-set types used across this crate.

pub use std::collections::{HashMap, HashSet};
