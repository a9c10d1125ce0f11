//! Persistence of finished batches.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2024-03-20/
//!     ├── deals_081502.json
//!     └── deals_143010.json
//! ```

pub mod json;
