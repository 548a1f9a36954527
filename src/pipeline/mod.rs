//! Pipeline stages for grid composition.
//!
//! Each submodule implements one step. Keeping stages separate makes each
//! independently testable and lets the PDF renderer and the input resolver
//! be swapped without touching the layout or writer code.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ raster ──▶ compose ──▶ encode ──▶ writer
//! (ref→file) (pixels)   (grid+cell)  (JPEG/Flate) (lopdf)
//!              │                        ▲
//!              └─ render / fallback ────┘
//! ```
//!
//! 1. [`input`]    — turn a caller reference (path, `file://`, URL) into a
//!    local file and sniff whether it is a PDF or an image
//! 2. [`raster`]   — decode images with power-of-two subsampling (reduced
//!    inside the decoder by [`decode`]); render PDF
//!    pages in bounded batches through [`render`], dropping to [`fallback`]
//!    when the direct path fails
//! 3. [`layout`]   — pick rows × columns for each output page
//! 4. [`compose`]  — place each pixel page into the next free cell
//! 5. [`encode`]   — JPEG or lossless Flate, depending on transparency
//! 6. [`writer`]   — assemble and serialise the output PDF
//!
//! [`schedule`] drives the whole thing in batches of source items so only a
//! bounded number of decoded buffers is alive at any time.

pub mod compose;
pub mod decode;
pub mod encode;
pub mod fallback;
pub mod input;
pub mod layout;
pub mod raster;
pub mod render;
pub mod schedule;
pub mod writer;
