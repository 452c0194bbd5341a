//! Benchmarks for the row codec.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rowxml::{decode, from_str, to_query_string, to_string};
use serde::{Deserialize, Serialize};
use std::hint::black_box;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Product {
    #[serde(rename = "Product Id")]
    id: u64,
    #[serde(rename = "Product Name")]
    name: String,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Unit Price")]
    unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename = "Invoices")]
struct Invoice {
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Account Name")]
    account: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Grand Total")]
    total: f64,
    #[serde(rename = "Product Details>product")]
    products: Vec<Product>,
}

#[derive(Serialize)]
struct SearchOptions {
    #[serde(rename = "selectColumns,required")]
    select_columns: &'static str,
    #[serde(rename = "searchCondition,noencode")]
    condition: &'static str,
    #[serde(rename = "fromIndex,default>1")]
    from_index: u32,
    #[serde(rename = "toIndex,default>20")]
    to_index: u32,
}

fn invoice(i: u64) -> Invoice {
    Invoice {
        subject: format!("Invoice {}", i),
        account: "Acme & Sons".to_string(),
        status: "Created".to_string(),
        total: 1250.5 + i as f64,
        products: (0..5)
            .map(|p| Product {
                id: i * 100 + p,
                name: format!("Widget <{}>", p),
                quantity: (p + 1) as u32,
                unit_price: 9.99,
            })
            .collect(),
    }
}

fn invoices(n: u64) -> Vec<Invoice> {
    (0..n).map(invoice).collect()
}

fn wrapped(xml: &str) -> String {
    format!("<response uri=\"/crm/private/xml/Invoices/getRecords\"><result>{}</result></response>", xml)
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Encode");

    let one = invoice(1);
    let many = invoices(50);

    group.bench_function("single", |b| b.iter(|| to_string(black_box(&one)).unwrap()));
    group.bench_function("batch_50", |b| b.iter(|| to_string(black_box(&many)).unwrap()));

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("Decode");

    let xml = wrapped(&to_string(&invoices(50)).unwrap());
    group.throughput(Throughput::Bytes(xml.len() as u64));

    group.bench_function("tree", |b| b.iter(|| decode(black_box(xml.as_bytes())).unwrap()));
    group.bench_function("records", |b| {
        b.iter(|| from_str::<Invoice>(black_box(&xml)).unwrap())
    });

    group.finish();
}

fn bench_query_string(c: &mut Criterion) {
    let options = SearchOptions {
        select_columns: "Invoices(Subject,Account Name,Grand Total)",
        condition: "(Status|=|Created)",
        from_index: 0,
        to_index: 200,
    };

    c.bench_function("query_string", |b| {
        b.iter(|| to_query_string(black_box(&options)).unwrap())
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scaling");

    for size in [1u64, 10, 100, 1000].iter() {
        let data = invoices(*size);
        let xml = to_string(&data).unwrap();

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
            b.iter(|| to_string(black_box(data)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &xml, |b, xml| {
            b.iter(|| from_str::<Invoice>(black_box(xml)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_query_string,
    bench_scaling,
);

criterion_main!(benches);
