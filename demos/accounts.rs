//! Account bookkeeping on the shared database.
//!
//! Selects a per-user database file, runs the migrations, then walks
//! through create, update, lookup and removal of records.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p activerow-demos --example accounts
//! ```

use activerow_core::{Model, SchemaBuilder, Value};
use activerow_sqlite::{
    Key, Migrator, Record, StoreConfig, close_database, set_database_name_with, shared_queue,
};

#[derive(Debug, Default, Clone)]
struct Account {
    id: i64,
    name: String,
    balance: f64,
    active: bool,
}

impl Model for Account {
    fn describe() -> SchemaBuilder {
        SchemaBuilder::new("Account")
            .field_of::<i64>("id")
            .field_of::<String>("name")
            .field_of::<f64>("balance")
            .field_of::<bool>("active")
    }

    fn value_of(&self, field: &str) -> Value {
        match field {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "balance" => self.balance.into(),
            "active" => self.active.into(),
            _ => Value::Null,
        }
    }

    fn assign(&mut self, field: &str, value: Value) {
        match field {
            "id" => self.id = value.decode(),
            "name" => self.name = value.decode(),
            "balance" => self.balance = value.decode(),
            "active" => self.active = value.decode(),
            _ => {}
        }
    }
}

fn migrations() -> Migrator {
    Migrator::builder()
        .step(1, "create accounts", |conn| Account::create_table_in(conn))
        .step(2, "index account names", |conn| {
            conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_accounts_name ON accounts (name)")?;
            Ok(())
        })
        .build()
        .unwrap()
}

fn main() {
    // === Step 1: Pick the database for the signed-in user ===
    let data_dir = std::env::temp_dir().join("activerow_accounts_demo");
    let config = StoreConfig {
        data_dir: data_dir.clone(),
        ..StoreConfig::default()
    };
    set_database_name_with("alice", &config).unwrap();
    println!("=== Database ===");
    println!("Opened {}", config.database_path("alice").display());

    // === Step 2: Bring the schema up to date ===
    println!("\n=== Migrations ===");
    let migrator = migrations();
    let status = migrator.status(shared_queue()).unwrap();
    println!(
        "Stored version {}, latest {}, pending {:?}",
        status.current_version, status.latest_version, status.pending
    );
    let report = migrator.perform_needed_migrations(shared_queue()).unwrap();
    println!(
        "Migrated {} -> {} (applied {:?})",
        report.from_version, report.to_version, report.applied
    );

    // === Step 3: Create and update records ===
    println!("\n=== Records ===");
    for (id, name, balance) in [(1, "a", 10.0), (2, "b", 25.5), (3, "c", 0.0)] {
        Account {
            id,
            name: name.to_string(),
            balance,
            active: true,
        }
        .save()
        .unwrap();
    }
    println!("Accounts stored: {}", Account::count().unwrap());

    let mut first = Account::first().unwrap().unwrap();
    first.name = "b".to_string();
    first.save().unwrap();
    println!("Renamed account {} to '{}'", first.id, first.name);

    // === Step 4: Look things up ===
    println!("\n=== Finders ===");
    let named_b = Account::find_all(Key::column("name", "b")).unwrap();
    println!("Accounts named 'b': {:?}", named_b.iter().map(|a| a.id).collect::<Vec<_>>());

    let funded = Account::count_where_sql("balance > ?", &[Value::Real(5.0)]).unwrap();
    println!("Accounts with balance > 5: {funded}");

    if let Some(last) = Account::last().unwrap() {
        println!("Last account: {last:?}");
    }

    // === Step 5: Remove and verify ===
    println!("\n=== Removal ===");
    first.remove().unwrap();
    let remaining = Account::find_by_sql_where("id = ?", &[Value::Integer(first.id)]).unwrap();
    println!("Account {} still present: {}", first.id, !remaining.is_empty());

    let mut stale = first.clone();
    match stale.refresh() {
        Ok(()) => println!("Refreshed unexpectedly"),
        Err(e) => println!("Refresh after removal: {e}"),
    }

    // Cleanup
    close_database().unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
    println!("\nDone!");
}
