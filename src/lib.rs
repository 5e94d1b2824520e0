//! # Fireline
//!
//! Closure-aware shortest paths on a directed road graph.
//!
//! Two engines answer the same queries: an exact Dijkstra baseline over the
//! live graph and a Contraction Hierarchy query. When a road closes or
//! reopens, the hierarchy is repaired in place by recontracting only the nodes
//! whose shortcuts or witness paths depended on that road.
//!
//! ```
//! use fireline::{graph::demo, route::Engine, Router, RouterConfig};
//!
//! let router = Router::new(demo::lahaina(), RouterConfig::default())?;
//! assert_eq!(router.route(Engine::Ch, "A", "F")?.cost, 460.0);
//!
//! router.set_closed("C", "D", true)?;
//! assert!(!router.route(Engine::Ch, "A", "F")?.found());
//! # Ok::<(), fireline::Error>(())
//! ```

pub mod ch;
pub mod config;
pub mod dijkstra;
pub mod error;
pub mod fire;
pub mod graph;
pub mod route;
pub mod router;
pub mod validate;

pub use ch::{CancelToken, Hierarchy, UpdateOutcome};
pub use config::RouterConfig;
pub use error::{Error, Result};
pub use graph::GraphStore;
pub use route::{Comparison, Engine, RouteResult};
pub use router::Router;
