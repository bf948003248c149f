//! OpenLung - discrete-time simulation of branch-structured physical networks
//!
//! [`engine`] is the generic part: branch storage addressed by stable
//! handles, serial or parallel branch passes, aggregate organ state and a
//! sampled history log. [`model`] plugs a biomechanical lung into it.

pub mod core;
pub mod engine;
pub mod model;
