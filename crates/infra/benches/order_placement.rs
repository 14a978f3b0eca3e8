use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use storefront_auth::{Principal, StaticIdentityVerifier};
use storefront_catalog::ProductId;
use storefront_core::UserId;
use storefront_infra::StorefrontConfig;
use storefront_infra::external::InMemoryObjectStorage;
use storefront_infra::services::{
    InMemoryBus, InMemoryStore, NewProduct, NewVariant, OrderLine, OrderTerms, Storefront,
};
use storefront_orders::{PaymentMethod, ShippingAddress};

type BenchStorefront = Storefront<InMemoryStore, InMemoryBus>;

const SIZES: [&str; 5] = ["xs", "s", "m", "l", "xl"];

fn setup(products: usize, stock: u32) -> (BenchStorefront, Vec<ProductId>) {
    let sf = Storefront::in_memory(
        StorefrontConfig::default(),
        Arc::new(StaticIdentityVerifier::new()),
        Arc::new(InMemoryObjectStorage::default()),
    );
    let admin = Principal::admin(UserId::new());

    let ids = (0..products)
        .map(|i| {
            let input = NewProduct {
                name: format!("Bench Tee {i}"),
                description: "bench".to_string(),
                material: "cotton".to_string(),
                category: "tees".to_string(),
                price: 999,
                discount_price: Some(799),
                is_featured: false,
                variants: SIZES
                    .iter()
                    .map(|size| NewVariant {
                        size: size.to_string(),
                        color: "black".to_string(),
                        stock,
                    })
                    .collect(),
                image_paths: Vec::new(),
            };
            sf.catalog
                .create_product(&admin, input)
                .map(|view| view.product_id)
                .unwrap_or_else(|e| panic!("create product: {e}"))
        })
        .collect();

    (sf, ids)
}

fn terms() -> OrderTerms {
    OrderTerms {
        shipping_address: ShippingAddress {
            name: "Bench Buyer".to_string(),
            phone: "9800000000".to_string(),
            address_line: "1 Test Street".to_string(),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "411001".to_string(),
            country: String::new(),
        },
        payment_method: PaymentMethod::Online,
        payment_id: Some("pay_bench".to_string()),
        shipping_charge: 0,
        discount: 0,
    }
}

/// Stock adjustment through the conditional append, on a fresh stream and on
/// one carrying history that every load replays.
fn bench_stock_adjustment(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_adjustment");

    group.bench_function("deduct_fresh_product", |b| {
        b.iter_batched(
            || setup(1, 100),
            |(sf, ids)| {
                black_box(sf.inventory.adjust_stock(ids[0], "m", "black", -1)).ok();
            },
            BatchSize::SmallInput,
        );
    });

    for history in [10u32, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("deduct_with_history", history),
            history,
            |b, &history| {
                b.iter_batched(
                    || {
                        let (sf, ids) = setup(1, 10_000);
                        for _ in 0..history {
                            sf.inventory
                                .adjust_stock(ids[0], "m", "black", -1)
                                .unwrap_or_else(|e| panic!("seed history: {e}"));
                        }
                        (sf, ids)
                    },
                    |(sf, ids)| {
                        black_box(sf.inventory.adjust_stock(ids[0], "m", "black", -1)).ok();
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Direct placement, one line per product, including every deduction and the
/// order record.
fn bench_order_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_placement");

    for lines in [1usize, 5, 20].iter() {
        group.throughput(Throughput::Elements(*lines as u64));
        group.bench_with_input(BenchmarkId::new("place_order", lines), lines, |b, &lines| {
            b.iter_batched(
                || {
                    let (sf, ids) = setup(lines, 100);
                    let order_lines: Vec<OrderLine> = ids
                        .iter()
                        .map(|id| OrderLine {
                            product_id: *id,
                            size: "m".to_string(),
                            color: "black".to_string(),
                            quantity: 2,
                        })
                        .collect();
                    (sf, order_lines)
                },
                |(sf, order_lines)| {
                    let buyer = Principal::customer(UserId::new());
                    black_box(sf.orders.place_order(&buyer, &order_lines, terms())).ok();
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// The read-only gate a cart passes before placement.
fn bench_checkout_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout_summary");

    for lines in [1usize, 10, 50].iter() {
        let (sf, ids) = setup(*lines, 100);
        let buyer = Principal::customer(UserId::new());
        for id in &ids {
            sf.carts
                .add_item(&buyer, *id, "l", "black", 1)
                .unwrap_or_else(|e| panic!("fill cart: {e}"));
        }

        group.throughput(Throughput::Elements(*lines as u64));
        group.bench_function(BenchmarkId::new("build", lines), |b| {
            b.iter(|| black_box(sf.carts.build_checkout_summary(&buyer)).ok());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stock_adjustment,
    bench_order_placement,
    bench_checkout_summary
);
criterion_main!(benches);
