//! Shared numeric constants for the scene crate.

// ── Placement ───────────────────────────────────────────────────

/// Largest share of the canvas area a newly added image may cover.
pub const MAX_AREA_FRACTION: f64 = 0.15;

/// Smallest allowed dimension of a newly added image, in canvas pixels.
pub const MIN_DIMENSION_PX: f64 = 50.0;

/// Fraction position given to every newly added image (canvas center).
pub const INITIAL_FRACTION: f64 = 0.5;

// ── Keyboard transforms ─────────────────────────────────────────

/// Rotation applied by the rotate shortcut (45°).
pub const ROTATE_STEP_RAD: f64 = std::f64::consts::FRAC_PI_4;

/// Scale multiplier applied by the grow shortcut.
pub const SCALE_UP_FACTOR: f64 = 1.1;

/// Scale multiplier applied by the shrink shortcut.
pub const SCALE_DOWN_FACTOR: f64 = 0.9;

// ── Grid arrangement ────────────────────────────────────────────

/// Columns used by [`crate::engine::EngineCore::arrange_grid`].
pub const GRID_COLUMNS: usize = 4;

/// Distance between grid cell origins, in canvas pixels.
pub const GRID_PITCH_PX: f64 = 180.0;

/// Top-left margin of the first grid cell, in canvas pixels.
pub const GRID_MARGIN_PX: f64 = 50.0;

// ── Rendering ───────────────────────────────────────────────────

/// Gap between an object's box and its selection outline, in canvas pixels.
pub const SELECTION_GAP_PX: f64 = 5.0;

/// Stroke width of the selection outline, in canvas pixels.
pub const SELECTION_STROKE_PX: f64 = 3.0;

/// Selection outline colour (`#007bff`).
pub const SELECTION_RGBA: [u8; 4] = [0x00, 0x7b, 0xff, 0xff];

/// Default export background (white).
pub const DEFAULT_BACKGROUND_RGBA: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Export size used by the publish flow when the caller does not choose one.
pub const DEFAULT_EXPORT_PX: u32 = 600;

/// Largest export side accepted by the rasterizer, in pixels.
pub const MAX_EXPORT_SIDE_PX: u32 = 8192;

/// A 1×1 PNG returned when the export pipeline itself fails.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00,
    0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00,
    0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64, 0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80,
    0xeb, 0x47, 0xba, 0x92, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];
