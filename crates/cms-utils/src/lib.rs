//! # cms-utils
//!
//! Small helpers used around cms-rs.
//!
//! - [`remote`] - Fetching remote URLs with form data
//! - [`xml`] - Reading XML documents by element name

pub mod remote;
pub mod xml;
