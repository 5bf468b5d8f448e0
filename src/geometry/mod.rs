//! The contact-record interface through which collision detection feeds the
//! solver. Collision detection itself lives outside this crate.

pub use self::contact::{Contact, ContactGeom, SurfaceFlags, SurfaceParams};

mod contact;
