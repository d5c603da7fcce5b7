//! # Seed Data Generator
//!
//! Populates a database with a demo pharmacy for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db (default)
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - One shop ("Main Street, Accra", GHS) and an owner profile
//! - Four categories and five products, two of them at or below threshold
//! - Three customers and one supplier

use std::env;

use tally_db::{
    CategoryRepository, CustomerRepository, Database, DbConfig, NewCustomer, NewProduct,
    NewSupplier, ProductRepository, ProfileRepository, ShopDetails, ShopRepository,
    SupplierRepository,
};

/// (category, name, sku, price_cents, cost_cents, stock)
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64)] = &[
    ("Pain Relief", "Paracetamol Advance", "PAN-ADV", 1200, 600, 45),
    ("Antibiotics", "Amoxicillin 500mg", "AMX-500", 2500, 1500, 5),
    ("Supplements", "Vitamin C 1000mg", "VIT-C", 3500, 2000, 120),
    ("Supplements", "Zinc Fizz", "ZFL-01", 1850, 1000, 0),
    ("Personal Care", "Hand Sanitizer 100ml", "HS-100", 1500, 700, 8),
];

/// (full_name, phone, email)
const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Ama Ghana", "0241234567", "ama@example.com"),
    ("Kojo Prince", "0209876543", "kojo@example.com"),
    ("Efua Bio", "0555550123", "efua@example.com"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut tx = db.begin().await?;

    let existing = ProductRepository::new(&mut tx).count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let shop = ShopRepository::new(&mut tx)
        .insert(&ShopDetails {
            name: "Tally Pharmacy".to_string(),
            address: Some("Main Street, Accra".to_string()),
            phone: Some("0302000000".to_string()),
            currency: "GHS".to_string(),
        })
        .await?;
    println!("✓ Shop: {} ({})", shop.name, shop.currency);

    ProfileRepository::new(&mut tx)
        .insert("owner", Some("Shop Owner"), "owner", Some(shop.id.as_str()))
        .await?;

    for (category_name, name, sku, price_cents, cost_cents, stock) in PRODUCTS {
        let category = CategoryRepository::new(&mut tx)
            .find_or_create(category_name)
            .await?;

        ProductRepository::new(&mut tx)
            .insert(&NewProduct {
                shop_id: Some(shop.id.clone()),
                category_id: Some(category.id),
                name: name.to_string(),
                sku: sku.to_string(),
                price_cents: *price_cents,
                cost_cents: *cost_cents,
                stock_quantity: *stock,
                low_stock_threshold: 10,
            })
            .await?;
    }
    println!("✓ {} products", PRODUCTS.len());

    for (full_name, phone, email) in CUSTOMERS {
        CustomerRepository::new(&mut tx)
            .insert(&NewCustomer {
                shop_id: Some(shop.id.clone()),
                full_name: full_name.to_string(),
                phone: Some(phone.to_string()),
                email: Some(email.to_string()),
            })
            .await?;
    }
    println!("✓ {} customers", CUSTOMERS.len());

    SupplierRepository::new(&mut tx)
        .insert(&NewSupplier {
            shop_id: Some(shop.id.clone()),
            name: "Tema Pharma Distributors".to_string(),
            contact_name: Some("Yaw Mensah".to_string()),
            phone: Some("0303111222".to_string()),
            email: None,
        })
        .await?;
    println!("✓ 1 supplier");

    tx.commit().await?;

    let mut conn = db.acquire().await?;
    let low_stock = ProductRepository::new(&mut conn).list_low_stock().await?;
    drop(conn);
    println!();
    println!("Low stock: {} products", low_stock.len());
    for product in &low_stock {
        println!("  {} ({}): {}", product.name, product.sku, product.stock_quantity);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
