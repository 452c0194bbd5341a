//! Example decoding a quote response with nested product groups.

use rowxml::{from_str, to_string_with_root, IndentConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Product {
    #[serde(rename = "Product Name")]
    name: String,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "List Price")]
    price: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Stage {
    Draft,
    Delivered,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename = "Quotes")]
struct Quote {
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Quote Stage")]
    stage: Option<Stage>,
    #[serde(rename = "Valid Till", with = "rowxml::time::date")]
    valid_till: Option<chrono::NaiveDate>,
    #[serde(rename = "Product Details>product")]
    products: Vec<Product>,
}

const RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<response uri="/crm/private/xml/Quotes/getRecords">
  <result>
    <Quotes>
      <row no="1">
        <FL val="Subject">Spring order</FL>
        <FL val="Quote Stage">Draft</FL>
        <FL val="Valid Till">2024-05-31</FL>
        <FL val="Product Details">
          <product no="1">
            <FL val="Product Name">Cedar boards</FL>
            <FL val="Quantity">40</FL>
            <FL val="List Price">12.5</FL>
          </product>
          <product no="2">
            <FL val="Product Name">Deck screws</FL>
            <FL val="Quantity">many</FL>
            <FL val="List Price">0.1</FL>
          </product>
        </FL>
      </row>
      <row no="2">
        <FL val="Subject">Summer order</FL>
        <FL val="Quote Stage">Negotiation</FL>
        <FL val="Valid Till">31/08/2024</FL>
      </row>
    </Quotes>
  </result>
</response>"#;

fn main() {
    let quotes = from_str::<Quote>(RESPONSE).expect("Failed to decode");

    println!("Quotes:");
    for quote in &quotes.records {
        println!("  {} ({:?}, valid till {:?})", quote.subject, quote.stage, quote.valid_till);
        for product in &quote.products {
            println!("    {} x {} at {}", product.quantity, product.name, product.price);
        }
    }
    println!();

    println!("Fields that did not parse:");
    for failure in &quotes.failures {
        println!("  {}", failure);
    }
    println!();

    let data = rowxml::to_xml_data_with_root(&quotes.records, "Quotes").expect("Failed to encode");
    println!("Re-encoded:");
    println!("{}", data.to_xml_pretty(IndentConfig::default()));
    println!();

    let compact = to_string_with_root(&quotes.records, "Quotes").expect("Failed to encode");
    let again = from_str::<Quote>(&compact).expect("Failed to decode");
    assert_eq!(again.records, quotes.records);
    println!("Round trip of {} records OK", again.records.len());
}
