// src/main.rs

use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    employees: usize,
    time_entries: usize,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    report: serde_json::Value,
    target: u32,
    predicted_utilization: String,
    message_text: Option<String>,
}

const METHODS: [&str; 3] = ["Month to Date", "Last Month", "Year to Date"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url =
        std::env::var("UTILIZATION_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Status
    println!("\n🔍 Testing status endpoint...");
    let status = client
        .get(format!("{}/status", base_url))
        .send()
        .await?
        .json::<StatusResponse>()
        .await?;
    println!("Status response: {:?}", status);
    if status.status != "ok" {
        return Err(format!("Unexpected status: {}", status.status).into());
    }

    // Test 2: Roster
    println!("\n🔍 Testing employees endpoint...");
    let employees = client
        .get(format!("{}/api/employees", base_url))
        .send()
        .await?
        .json::<Vec<String>>()
        .await?;
    println!("Employees ({}): {:?}", employees.len(), employees);

    let Some(employee) = employees.first() else {
        println!("\n⚠️ Roster is empty, skipping report tests.");
        return Ok(());
    };

    // Test 3: One report per forecasting method
    for method in METHODS {
        println!("\n🔍 Testing utilization report for {} ({})...", employee, method);
        let response = client
            .get(format!("{}/api/utilization", base_url))
            .query(&[("name", employee.as_str()), ("method", method), ("target", "75")])
            .send()
            .await?;

        println!("Report response status: {}", response.status());
        if response.status().is_success() {
            let report = response.json::<ReportResponse>().await?;
            let rows = report.report["rows"].as_array().map_or(0, Vec::len);
            println!(
                "Current month: {}, rows: {}, predicted: {}% (target {}%)",
                report.report["current_month"], rows, report.predicted_utilization, report.target
            );
            if let Some(text) = report.message_text {
                println!("Message: {}", text);
            }
        } else {
            println!("Failed to get report: {}", response.text().await?);
        }
    }

    // Test 4: Invalid method is rejected
    println!("\n🔍 Testing invalid forecasting method...");
    let response = client
        .get(format!("{}/api/utilization", base_url))
        .query(&[("name", employee.as_str()), ("method", "Gut Feeling")])
        .send()
        .await?;
    println!("Invalid method status: {} (expected 400)", response.status());

    println!(
        "\n✅ Testing complete! (server has {} employees, {} time entries)",
        status.employees, status.time_entries
    );

    Ok(())
}
