//! # bindery - Dependency Injection Engine
//!
//! A type-safe dependency injection container with keyed bindings,
//! recursive resolution and dependency loop detection.
//!
//! ## Features
//!
//! - 🔑 **Keyed bindings** - a binding is identified by its type, an optional tag and, for
//!   factories, the argument type
//! - 🔄 **Four lifecycles** - pre-built instances, providers, singletons and scoped instances
//! - 🔁 **Loop detection** - cyclic graphs fail with the full loop path instead of overflowing
//! - 🌳 **Child containers** - inherit everything, override explicitly
//! - 🧵 **Thread-safe** - singletons are created exactly once, even under contention
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use bindery::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::builder()
//!     .bind::<Database>()
//!     .instance(Database { url: "postgres://localhost".into() })?
//!     .bind::<UserService>()
//!     .singleton(|r| Ok(UserService { db: r.get()? }))?
//!     .build();
//!
//! let users = container.get::<UserService>()?;
//! assert_eq!(users.db.url, "postgres://localhost");
//! # Ok::<(), bindery::DiError>(())
//! ```
//!
//! ## Lifecycles
//!
//! ```rust
//! use bindery::prelude::*;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! struct Config { debug: bool }
//! struct RequestId(u64);
//! struct Pool { size: usize }
//! struct Greeting(String);
//!
//! let container = Container::builder()
//!     // Pre-built, returned as-is
//!     .bind::<Config>().instance(Config { debug: true })?
//!     // Built on first use, then shared
//!     .bind::<Pool>().singleton(|_| Ok(Pool { size: 8 }))?
//!     // Built on every resolution
//!     .bind::<RequestId>().provider(|_| Ok(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst))))?
//!     // Built on every resolution, from an argument
//!     .bind::<Greeting>().factory(|_, name: String| Ok(Greeting(format!("hi {name}"))))?
//!     .build();
//!
//! assert_ne!(container.get::<RequestId>()?.0, container.get::<RequestId>()?.0);
//! assert_eq!(container.get_with::<String, Greeting>("ana".into())?.0, "hi ana");
//! # Ok::<(), bindery::DiError>(())
//! ```
//!
//! ## Dependency Loops
//!
//! ```rust
//! use bindery::prelude::*;
//!
//! struct A(Arc<B>);
//! struct B(Arc<A>);
//!
//! let container = Container::builder()
//!     .bind::<A>().singleton(|r| Ok(A(r.get()?)))?
//!     .bind::<B>().singleton(|r| Ok(B(r.get()?)))?
//!     .build();
//!
//! let err = container.get::<A>().err().unwrap();
//! assert_eq!(err.loop_path().map(<[_]>::len), Some(3));
//! # Ok::<(), bindery::DiError>(())
//! ```
//!
//! ## Child Containers
//!
//! ```rust
//! use bindery::prelude::*;
//!
//! struct AppConfig { name: String }
//!
//! let root = Container::builder()
//!     .bind::<AppConfig>().instance(AppConfig { name: "MyApp".into() })?
//!     .build();
//!
//! // Tests swap the configuration without touching the root
//! let test = root
//!     .child()
//!     .bind::<AppConfig>().overriding().instance(AppConfig { name: "Test".into() })?
//!     .build();
//!
//! assert_eq!(test.get::<AppConfig>()?.name, "Test");
//! assert_eq!(root.get::<AppConfig>()?.name, "MyApp");
//! # Ok::<(), bindery::DiError>(())
//! ```

mod binding;
mod builder;
mod cache;
mod container;
mod context;
mod error;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod registry;
mod resolver;
mod scope;

pub use binding::{AnyArgument, Binding, Lifecycle};
pub use builder::{Bind, ContainerBuilder, Declaration};
pub use cache::{AnyInstance, ScopeCache};
pub use container::{Container, Contextual};
pub use context::ResolutionContext;
pub use error::{DiError, NotFoundReason, OverrideViolation, Result};
pub use key::{BindingKey, Tag, TypeDescriptor};
pub use provider::{Factory, Inject, Injectable, LazyInstance, Provider};
pub use registry::BindingRegistry;
pub use resolver::{Resolve, Resolver};
pub use scope::{KeyedScope, Scope, ScopeContext, ScopeId};

#[cfg(feature = "derive")]
pub use bindery_derive::Inject;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Container, ContainerBuilder, DiError, Factory, Inject, Injectable, LazyInstance, Provider,
        Resolve, Resolver, Result,
    };
    pub use std::sync::Arc;
}
