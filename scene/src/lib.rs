//! Scene engine for the moodboard editor.
//!
//! This crate owns everything that happens on the freeform canvas: placing
//! decoded images, keeping their geometry consistent across canvas resizes,
//! resolving pointer input to selection and drag, and flattening the scene to
//! a fixed-size raster for export. It performs no I/O; the host is responsible
//! for loading images, persisting exports, and showing [`notice::Notice`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level [`engine::EngineCore`] and the [`engine::Action`]s it returns |
//! | [`doc`] | Scene objects and the ordered in-memory scene store |
//! | [`geom`] | Points, sizes, affine transforms and letterbox fitting |
//! | [`raster`] | Decoded images and their origin (same-origin or cross-origin) |
//! | [`input`] | Input event types and the drag state machine |
//! | [`hit`] | Hit-testing against scene objects |
//! | [`render`] | Software rasterizer for viewport redraws and composite export |
//! | [`notice`] | Advisory events for the notification layer |
//! | [`consts`] | Shared numeric constants (area budget, minimum size, etc.) |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod geom;
pub mod hit;
pub mod input;
pub mod notice;
pub mod raster;
pub mod render;
