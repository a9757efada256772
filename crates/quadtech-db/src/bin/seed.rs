//! # Seed Data Generator
//!
//! Populates a database with demo data for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./quadtech.db (default)
//! cargo run -p quadtech-db --bin seed
//!
//! # Specify database path
//! cargo run -p quadtech-db --bin seed -- --db ./data/quadtech.db
//! ```
//!
//! Creates an admin user (admin / change-me-now), the catalog lookup
//! tables, a handful of products with opening stock, and two trading
//! partners on each side.

use std::env;

use quadtech_core::{NewCustomer, NewProduct, NewSupplier, NewUser};
use quadtech_db::{Database, DbConfig};

const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    // (sku, name, cost_cents, sell_cents, opening_qty)
    ("QX1-FRAME", "Quad X1 Frame", 4_000, 9_900, 25),
    ("QX1-PROP", "Quad X1 Propeller Set", 600, 1_500, 120),
    ("QX1-ESC", "Quad X1 Speed Controller", 2_200, 4_900, 40),
    ("QX1-BAT", "Quad X1 Battery 4S", 3_500, 7_500, 60),
    ("QX1-CAM", "Quad X1 FPV Camera", 5_100, 11_900, 15),
    ("QX1-RX", "Quad X1 Receiver", 1_400, 3_200, 80),
    ("TOOL-HEX", "Hex Driver Set", 900, 2_400, 30),
    ("TOOL-SOLD", "Soldering Station", 12_000, 24_900, 8),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "./quadtech.db".to_string());
    println!("Seeding database at {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    // Admin user
    let admin_role = db
        .roles()
        .get_by_name("admin")
        .await?
        .expect("roles are seeded by migration");
    let admin = db
        .users()
        .create(&NewUser {
            role_id: admin_role.id,
            username: "admin".into(),
            email: Some("admin@quadtech.example".into()),
            full_name: "Administrator".into(),
            password: "change-me-now".into(),
        })
        .await?;
    println!("Created admin user (id {})", admin.id);

    // Catalog lookups
    let brand = db.brands().create("QuadTech", Some("House brand")).await?;
    let frames = db.categories().create("Frames & Parts", None).await?;
    let tools = db.categories().create("Tools", None).await?;
    let vat = db.taxes().create("VAT 12%", 1200).await?;

    // Products
    for (sku, name, cost, sell, qty) in PRODUCTS {
        let category_id = if sku.starts_with("TOOL") {
            tools.id
        } else {
            frames.id
        };

        db.products()
            .create(&NewProduct {
                brand_id: Some(brand.id),
                category_id: Some(category_id),
                tax_id: Some(vat.id),
                name: name.to_string(),
                sku: sku.to_string(),
                model_number: None,
                cost_price_cents: Some(*cost),
                sell_price_cents: *sell,
                quantity: *qty,
            })
            .await?;
    }
    println!("Created {} products", PRODUCTS.len());

    // Trading partners
    db.suppliers()
        .create(&NewSupplier {
            name: "Aero Components Ltd".into(),
            contact_person: Some("Kim Park".into()),
            phone: Some("+63 2 8555 0100".into()),
            email: Some("sales@aerocomponents.example".into()),
            address: Some("14 Industrial Ave, Quezon City".into()),
        })
        .await?;
    db.suppliers()
        .create(&NewSupplier {
            name: "Pacific Electronics Trading".into(),
            contact_person: None,
            phone: None,
            email: Some("orders@pacet.example".into()),
            address: None,
        })
        .await?;

    db.customers()
        .create(&NewCustomer {
            name: "Dana Reyes".into(),
            contact_number: Some("0917-555-0001".into()),
            email: None,
            address: None,
        })
        .await?;
    db.customers()
        .create(&NewCustomer {
            name: "Metro Hobby Shop".into(),
            contact_number: Some("0917-555-0002".into()),
            email: Some("purchasing@metrohobby.example".into()),
            address: Some("Unit 5, Riverside Mall".into()),
        })
        .await?;

    println!("Seed complete");
    db.close().await;

    Ok(())
}

/// Parses `--db <path>` from the command line.
fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .cloned()
}
