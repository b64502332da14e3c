use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use rust_decimal::Decimal;
use stockledger_core::{ActorId, LocationId, ProductId};
use stockledger_infra::{
    InMemoryLedgerStore, InMemoryReferenceDirectory, InventoryOperations, MovementFilter,
    Pagination,
};
use stockledger_inventory::{ImportStock, TransferStock};

type Ops = InventoryOperations<InMemoryLedgerStore, InMemoryReferenceDirectory>;

fn setup() -> Ops {
    InventoryOperations::new(InMemoryLedgerStore::new(), InMemoryReferenceDirectory::new())
}

fn import(parts_number: String, location_id: LocationId) -> ImportStock {
    ImportStock {
        parts_number,
        description: "Timing belt".to_string(),
        quantity: 10,
        cost_price: Decimal::new(1250, 2),
        location_id,
        import_origin_id: None,
        selling_price: None,
        actor_id: ActorId::new(),
        notes: String::new(),
        occurred_at: Utc::now(),
    }
}

fn transfer(product_id: ProductId, from: LocationId, to: LocationId) -> TransferStock {
    TransferStock {
        product_id,
        from_location_id: from,
        to_location_id: to,
        quantity: black_box(1),
        unit_price: None,
        actor_id: ActorId::new(),
        notes: String::new(),
        occurred_at: Utc::now(),
    }
}

fn bench_import_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("import_latency");
    group.sample_size(1000);

    // Benchmark: first import of a new parts number (creates the product)
    group.bench_function("import_new_parts_number", |b| {
        let ops = setup();
        let location_id = LocationId::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            ops.import(import(format!("TB-{n}"), location_id)).unwrap();
        });
    });

    // Benchmark: repeat import of one parts number (augments the product)
    group.bench_function("import_existing_parts_number", |b| {
        let ops = setup();
        let location_id = LocationId::new();
        ops.import(import("TB-0".to_string(), location_id)).unwrap();
        b.iter(|| {
            ops.import(import(black_box("TB-0".to_string()), location_id)).unwrap();
        });
    });

    group.finish();
}

fn bench_transfer_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_throughput");

    for locations in [2usize, 16, 128].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("ping_pong", locations),
            locations,
            |b, &count| {
                let ops = setup();
                let locations: Vec<LocationId> = (0..count).map(|_| LocationId::new()).collect();
                let mut product_id = None;
                for loc in &locations {
                    product_id = Some(ops.import(import("TB-X".to_string(), *loc)).unwrap().id);
                }
                let product_id = product_id.unwrap();
                let (a, z) = (locations[0], locations[count - 1]);

                let mut forward = true;
                b.iter(|| {
                    let (from, to) = if forward { (a, z) } else { (z, a) };
                    forward = !forward;
                    black_box(ops.transfer(transfer(product_id, from, to)).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_movement_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_listing");

    for history in [100usize, 1000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("search_page", history), history, |b, &size| {
            let ops = setup();
            let location_id = LocationId::new();
            for n in 0..size {
                ops.import(import(format!("TB-{}", n % 50), location_id)).unwrap();
            }
            let filter = MovementFilter {
                search: Some("tb-7".to_string()),
                ..MovementFilter::default()
            };

            b.iter(|| {
                black_box(ops.list_movements(&filter, Pagination::default()).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_import_latency,
    bench_transfer_throughput,
    bench_movement_listing
);
criterion_main!(benches);
