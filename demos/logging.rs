//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use bindery::prelude::*;
use bindery::{BindingKey, KeyedScope};

// Example services
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

#[allow(dead_code)]
struct Session {
    id: u32,
}

#[allow(dead_code)]
struct Cart {
    items: Vec<String>,
}

#[allow(dead_code)]
struct Loop(Arc<Loop>);

fn main() -> bindery::Result<()> {
    // JSON if logging-json is enabled, pretty if logging-pretty is
    bindery::logging::builder().trace().bindery_only().init();

    println!("=== bindery Logging Demo ===\n");

    let sessions = Arc::new(KeyedScope::new(|session: &Session| session.id));

    // logs: "Declaring binding" per binding, then "Creating DI container"
    let container = Container::builder()
        .bind::<Database>()
        .instance(Database {
            url: "postgres://localhost/mydb".into(),
        })?
        .bind::<UserService>()
        .singleton(|r| {
            println!("  [App] UserService being created...");
            Ok(UserService { db: r.get()? })
        })?
        .bind::<Cart>()
        .scoped(Arc::clone(&sessions), |_| Ok(Cart { items: Vec::new() }))?
        .bind::<Loop>()
        .provider(|r| Ok(Loop(r.get()?)))?
        .build();

    // logs: "Resolving binding" for UserService and its Database
    let _users = container.get::<UserService>()?;
    // Cached now: no creation this time
    let _users = container.get::<UserService>()?;

    // logs: "Resolution failed"
    let missing = container.try_get::<i32>()?;
    assert!(missing.is_none());

    // logs: "Dependency loop detected"
    if let Err(err) = container.get::<Loop>() {
        println!("{err}\n");
    }

    // logs: "Opening scope instance"
    let _cart = container.on(Session { id: 7 }).get::<Cart>()?;
    sessions.invalidate(&7, &BindingKey::of::<Cart>());
    // logs: "Scope instance closed"
    sessions.close(&7);

    // logs: "Creating DI container" at depth 1
    let child = container
        .child()
        .bind::<Database>()
        .overriding()
        .instance(Database {
            url: "postgres://localhost/test".into(),
        })?
        .build();
    let _db = child.get::<Database>()?;

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");

    Ok(())
}
