//! Many threads, one connection.
//!
//! Spawns writer and reader threads that all go through the same
//! [`DatabaseQueue`]; every write lands and every read sees a consistent
//! table.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p activerow-demos --example concurrent_writers
//! ```

use std::time::Instant;

use activerow_core::{Model, SchemaBuilder, Value};
use activerow_sqlite::{DatabaseQueue, Key, Record, StoreConfig};

const WRITERS: i64 = 8;
const WRITES_PER_THREAD: i64 = 250;

#[derive(Debug, Default)]
struct Reading {
    id: i64,
    sensor: String,
    celsius: f64,
}

impl Model for Reading {
    fn describe() -> SchemaBuilder {
        SchemaBuilder::new("Reading")
            .field_of::<i64>("id")
            .field_of::<String>("sensor")
            .field_of::<f64>("celsius")
    }

    fn value_of(&self, field: &str) -> Value {
        match field {
            "id" => self.id.into(),
            "sensor" => self.sensor.as_str().into(),
            "celsius" => self.celsius.into(),
            _ => Value::Null,
        }
    }

    fn assign(&mut self, field: &str, value: Value) {
        match field {
            "id" => self.id = value.decode(),
            "sensor" => self.sensor = value.decode(),
            "celsius" => self.celsius = value.decode(),
            _ => {}
        }
    }
}

fn main() {
    let path = std::env::temp_dir().join("activerow_concurrency_demo.sqlite");
    std::fs::remove_file(&path).ok();
    let queue = DatabaseQueue::open_path(&path, &StoreConfig::default()).unwrap();
    Reading::create_table_in(&queue).unwrap();

    println!("=== Writing ===");
    let started = Instant::now();
    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let queue = &queue;
            scope.spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    Reading {
                        id: writer * WRITES_PER_THREAD + i + 1,
                        sensor: format!("sensor-{writer}"),
                        celsius: 20.0 + (i % 10) as f64 * 0.5,
                    }
                    .save_in(queue)
                    .unwrap();
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..20 {
                let seen = Reading::finder_in(&queue).count().unwrap();
                println!("  reader sees {seen} rows");
                std::thread::yield_now();
            }
        });
    });
    println!("Wrote in {:?}", started.elapsed());

    println!("\n=== Totals ===");
    let total = Reading::finder_in(&queue).count().unwrap();
    println!("Rows: {total} (expected {})", WRITERS * WRITES_PER_THREAD);
    for writer in 0..WRITERS {
        let sensor = format!("sensor-{writer}");
        let rows = Reading::finder_in(&queue)
            .count_where(Key::column("sensor", sensor.as_str()))
            .unwrap();
        println!("  {sensor}: {rows}");
    }

    queue.close().unwrap();
    std::fs::remove_file(&path).ok();
    println!("\nDone!");
}
