//! Example building request parameters from option records.

use rowxml::{to_query_string, to_query_string_with_config, NullValues, UrlConfig};
use serde::Serialize;

#[derive(Serialize, Default)]
struct SearchRecords {
    #[serde(rename = "selectColumns,required")]
    select_columns: String,
    #[serde(rename = "criteria,noencode")]
    criteria: String,
    #[serde(rename = "fromIndex,default>1")]
    from_index: u32,
    #[serde(rename = "toIndex,default>20")]
    to_index: u32,
}

#[derive(Serialize)]
#[serde(rename = "Leads")]
struct Lead {
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Last Name")]
    last_name: String,
}

#[derive(Serialize)]
struct InsertRecords {
    #[serde(rename = "xmlData,required")]
    leads: Vec<Lead>,
    #[serde(rename = "id,wfTrigger")]
    workflow: String,
}

fn main() {
    let search = SearchRecords {
        select_columns: "Leads(First Name,Last Name,Email)".to_string(),
        criteria: "(Email:jo@example.com)".to_string(),
        ..SearchRecords::default()
    };
    println!("search:  {}", to_query_string(&search).expect("Failed to encode"));

    let config = UrlConfig {
        null_values: NullValues::Include,
        ..UrlConfig::default()
    };
    println!(
        "with nulls: {}",
        to_query_string_with_config(&search, &config).expect("Failed to encode")
    );

    let insert = InsertRecords {
        leads: vec![Lead {
            company: "Acme & Sons".to_string(),
            last_name: "Doe".to_string(),
        }],
        workflow: "true".to_string(),
    };
    println!("insert:  {}", to_query_string(&insert).expect("Failed to encode"));

    match to_query_string(&SearchRecords::default()) {
        Ok(query) => println!("unexpected: {}", query),
        Err(e) => println!("missing:  {}", e),
    }
}
