//! Example demonstrating the #[derive(Inject)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use bindery::prelude::*;

// Dependencies
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct Cache {
    size: usize,
}

#[allow(dead_code)]
struct Logger {
    level: String,
}

// Service with injected dependencies
#[derive(Inject)]
struct UserService {
    #[inject]
    db: Arc<Database>,
    #[inject(tag = "sessions")]
    cache: Arc<Cache>,
    #[inject(optional)]
    logger: Option<Arc<Logger>>,
    // Non-injected field uses Default
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = if self.logger.is_some() {
            "with logging"
        } else {
            "without logging"
        };
        format!(
            "UserService connected to {} with cache size {} ({}, requests: {})",
            self.db.url, self.cache.size, logger_status, self.request_count
        )
    }
}

// Nested injection
#[derive(Inject)]
struct ApiController {
    #[inject]
    users: Arc<UserService>,
}

fn main() -> bindery::Result<()> {
    println!("=== bindery Derive Macro Demo ===\n");

    let root = Container::builder()
        .bind::<Database>()
        .instance(Database {
            url: "postgres://localhost:5432/myapp".into(),
        })?
        .bind::<Cache>()
        .tagged("sessions")
        .instance(Cache { size: 1024 })?
        .bind::<UserService>()
        .singleton(UserService::inject)?
        .bind::<ApiController>()
        .provider(ApiController::inject)?
        .build();

    // Logger is not bound, so the optional field stays empty
    println!("Resolving ApiController from the root container...");
    let controller = root.get::<ApiController>()?;
    println!("  {}", controller.users.describe());
    println!();

    // A child container adds a logger; UserService is rebuilt there
    let verbose = root
        .child()
        .bind::<Logger>()
        .instance(Logger {
            level: "DEBUG".into(),
        })?
        .bind::<UserService>()
        .overriding()
        .singleton(UserService::inject)?
        .build();

    println!("Resolving UserService from a child container with a Logger...");
    println!("  {}", verbose.get::<UserService>()?.describe());

    println!("\n=== Demo Complete ===");
    println!("\n#[derive(Inject)] generated `UserService::inject`, which:");
    println!("  - Resolves #[inject] fields, honoring tags");
    println!("  - Uses Option<Arc<T>> for #[inject(optional)] fields");
    println!("  - Uses Default::default() for non-injected fields");

    Ok(())
}
