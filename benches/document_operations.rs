use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use storefront_rs::models::{CreateProductRequest, Patch, Product, PRODUCTS};
use storefront_rs::repositories::document::{from_item, item_to_model, model_to_item, to_item};

fn sample_product(i: usize) -> Product {
    let mut product = Product::new(CreateProductRequest {
        name: format!("Benchmark Product {}", i),
        description: format!("Description for benchmark product {}", i),
        price: Some(19.99),
        brand: "Acme".to_string(),
        cash_on_delivery: i % 2 == 0,
        category: "garden".to_string(),
    });
    product
        .extra
        .insert("tags".to_string(), json!(["outdoor", "steel", i]));
    product
        .extra
        .insert("dimensions".to_string(), json!({"w": 10, "h": 2.5}));
    product
}

fn bench_product_to_item(c: &mut Criterion) {
    let product = sample_product(1);

    c.bench_function("product_to_item", |b| {
        b.iter(|| model_to_item(black_box(&product)).unwrap())
    });
}

fn bench_item_to_product(c: &mut Criterion) {
    let item = model_to_item(&sample_product(1)).unwrap();

    c.bench_function("item_to_product", |b| {
        b.iter(|| item_to_model::<Product>(black_box(&item)).unwrap())
    });
}

fn bench_document_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_round_trip");

    for fields in [4usize, 16, 64] {
        let document: serde_json::Map<String, serde_json::Value> = (0..fields)
            .map(|i| (format!("field{}", i), json!({"n": i, "s": "value", "l": [1, 2, 3]})))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(fields), &document, |b, document| {
            b.iter(|| from_item(&to_item(black_box(document))).unwrap())
        });
    }

    group.finish();
}

fn bench_patch_coercion(c: &mut Criterion) {
    let body = json!({
        "name": "Renamed",
        "price": "24.50",
        "cashOnDelivery": "yes",
        "productId": "ignored",
        "color": "red"
    });

    c.bench_function("patch_coercion", |b| {
        b.iter(|| Patch::from_value(&PRODUCTS, black_box(body.clone())).unwrap())
    });
}

criterion_group!(
    benches,
    bench_product_to_item,
    bench_item_to_product,
    bench_document_round_trip,
    bench_patch_coercion
);
criterion_main!(benches);
