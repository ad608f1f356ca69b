//! Report generation: document assembly and sealing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Report Pipeline                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │ Tabular      │───▶│  Assembler   │───▶│   Renderer   │  │
//! │  │ Documents    │    │ (base64 opt) │    │   (genpdf)   │  │
//! │  └──────────────┘    └──────────────┘    └──────────────┘  │
//! │                                                 │           │
//! │                                                 ▼           │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐  │
//! │  │   Persist    │◀───│  Encrypt     │◀───│ Rasterize +  │  │
//! │  │ (atomic)     │    │  (RC4 R3)    │    │  Watermark   │  │
//! │  └──────────────┘    └──────────────┘    └──────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ffx_evidence::report::{assemble, Sealer};
//!
//! let document = assemble("Partitions", &[table], config.obfuscate);
//! let sealed = Sealer::from_config(&config, clock)?.seal(&document, &config.password, "meta_disk")?;
//! println!("{}", sealed.path.display());
//! ```

pub mod assembler;
pub mod clock;
pub mod fonts;
pub mod pdf_writer;
pub mod raster;
pub mod sealer;
pub mod security;
pub mod table;
pub mod watermark;

pub use assembler::{assemble, decode_obfuscated, AssembledDocument, RenderedTable};
pub use clock::{ReportClock, ReportTimestamp, SystemTimeSource, TimeSource};
pub use raster::{PdftoppmRasterizer, Rasterizer};
pub use sealer::{DocumentRenderer, GenpdfRenderer, SealedReport, Sealer};
pub use security::authenticate_user_password;
pub use table::{Cell, TabularDocument};
pub use watermark::{FontStamper, PageStamper};
