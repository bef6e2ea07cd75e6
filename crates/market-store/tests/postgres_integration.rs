//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p market-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{MedicineId, Money, OrderId, OrderStatus, UserId};
use market_store::{
    CartItemRecord, MarketStore, MedicineRecord, OrderItemRecord, OrderRecord, OrderScope,
    PAYMENT_METHOD_COD, PostgresMarketStore,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresMarketStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::raw_sql("TRUNCATE order_items, orders, cart_items, medicines")
        .execute(&pool)
        .await
        .unwrap();

    PostgresMarketStore::new(pool)
}

fn medicine(stock: i64) -> MedicineRecord {
    MedicineRecord {
        id: MedicineId::new(),
        name: "Paracetamol 500mg".to_string(),
        manufacturer: "Acme Pharma".to_string(),
        price: Money::from_cents(1000),
        stock,
        is_active: true,
        seller_id: UserId::new(),
        category_id: Uuid::new_v4(),
        image_url: Some("https://img.example/paracetamol.png".to_string()),
    }
}

fn order(customer_id: UserId) -> OrderRecord {
    OrderRecord {
        id: OrderId::new(),
        customer_id,
        total_amount: Money::from_cents(2000),
        status: OrderStatus::Placed,
        payment_method: PAYMENT_METHOD_COD.to_string(),
        shipping_name: "Jordan Rivers".to_string(),
        shipping_phone: "01700000000".to_string(),
        shipping_address: "12 Lake Road, Dhaka".to_string(),
        notes: None,
        created_at: Utc::now(),
        delivered_at: None,
    }
}

fn item(order_id: OrderId, medicine: &MedicineRecord, quantity: u32) -> OrderItemRecord {
    OrderItemRecord {
        id: Uuid::new_v4(),
        order_id,
        medicine_id: medicine.id,
        seller_id: medicine.seller_id,
        medicine_name: medicine.name.clone(),
        manufacturer: medicine.manufacturer.clone(),
        unit_price: medicine.price,
        quantity,
        subtotal: medicine.price.times(quantity),
    }
}

#[tokio::test]
#[serial]
async fn medicine_round_trip() {
    let store = get_test_store().await;
    let med = medicine(10);

    store.insert_medicine(&med).await.unwrap();
    let loaded = store.get_medicine(med.id).await.unwrap().unwrap();
    assert_eq!(loaded, med);

    assert!(store.get_medicine(MedicineId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn rollback_discards_stock_and_order_writes() {
    let store = get_test_store().await;
    let med = medicine(10);
    store.insert_medicine(&med).await.unwrap();

    let ord = order(UserId::new());
    let mut tx = store.begin().await.unwrap();
    store.adjust_stock(&mut tx, med.id, -4).await.unwrap();
    store
        .insert_order(&mut tx, &ord, &[item(ord.id, &med, 4)])
        .await
        .unwrap();
    store.rollback(tx).await.unwrap();

    assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 10);
    assert!(store.get_order(ord.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn commit_persists_order_with_items() {
    let store = get_test_store().await;
    let med = medicine(10);
    store.insert_medicine(&med).await.unwrap();

    let ord = order(UserId::new());
    let mut tx = store.begin().await.unwrap();
    store.adjust_stock(&mut tx, med.id, -2).await.unwrap();
    store
        .insert_order(&mut tx, &ord, &[item(ord.id, &med, 2)])
        .await
        .unwrap();
    store.commit(tx).await.unwrap();

    let loaded = store.get_order(ord.id).await.unwrap().unwrap();
    assert_eq!(loaded.order.id, ord.id);
    assert_eq!(loaded.order.status, OrderStatus::Placed);
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].quantity, 2);
    assert_eq!(loaded.items[0].unit_price, Money::from_cents(1000));
    assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 8);
}

#[tokio::test]
#[serial]
async fn medicine_for_update_sees_staged_decrement() {
    let store = get_test_store().await;
    let med = medicine(10);
    store.insert_medicine(&med).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    store.adjust_stock(&mut tx, med.id, -3).await.unwrap();
    let staged = store
        .medicine_for_update(&mut tx, med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staged.stock, 7);
    store.rollback(tx).await.unwrap();

    // Outside the transaction nothing happened.
    assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 10);
}

#[tokio::test]
#[serial]
async fn negative_stock_is_rejected_by_the_schema() {
    let store = get_test_store().await;
    let med = medicine(1);
    store.insert_medicine(&med).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let result = store.adjust_stock(&mut tx, med.id, -2).await;
    assert!(result.is_err());
    store.rollback(tx).await.unwrap();

    assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
#[serial]
async fn set_order_status_updates_only_what_is_given() {
    let store = get_test_store().await;
    let mut ord = order(UserId::new());
    ord.notes = Some("leave at the front desk".to_string());

    let mut tx = store.begin().await.unwrap();
    store.insert_order(&mut tx, &ord, &[]).await.unwrap();
    store.commit(tx).await.unwrap();

    // Status only: notes and delivered_at untouched.
    let mut tx = store.begin().await.unwrap();
    store
        .set_order_status(&mut tx, ord.id, OrderStatus::Processing, None, None)
        .await
        .unwrap();
    store.commit(tx).await.unwrap();

    let loaded = store.get_order(ord.id).await.unwrap().unwrap().order;
    assert_eq!(loaded.status, OrderStatus::Processing);
    assert_eq!(loaded.notes.as_deref(), Some("leave at the front desk"));
    assert!(loaded.delivered_at.is_none());

    // With delivery timestamp and new notes.
    let delivered_at = Utc::now();
    let mut tx = store.begin().await.unwrap();
    store
        .set_order_status(
            &mut tx,
            ord.id,
            OrderStatus::Delivered,
            Some(delivered_at),
            Some("Cancelled: test"),
        )
        .await
        .unwrap();
    store.commit(tx).await.unwrap();

    let loaded = store.get_order(ord.id).await.unwrap().unwrap().order;
    assert_eq!(loaded.status, OrderStatus::Delivered);
    assert!(loaded.delivered_at.is_some());
    assert_eq!(loaded.notes.as_deref(), Some("Cancelled: test"));
}

#[tokio::test]
#[serial]
async fn clear_cart_removes_only_that_customer() {
    let store = get_test_store().await;
    let customer_a = UserId::new();
    let customer_b = UserId::new();

    for customer in [customer_a, customer_a, customer_b] {
        store
            .upsert_cart_item(&CartItemRecord {
                id: Uuid::new_v4(),
                customer_id: customer,
                medicine_id: MedicineId::new(),
                quantity: 1,
            })
            .await
            .unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    let removed = store.clear_cart(&mut tx, customer_a).await.unwrap();
    store.commit(tx).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(store.cart_item_count(customer_a).await.unwrap(), 0);
    assert_eq!(store.cart_item_count(customer_b).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn upsert_cart_item_is_unique_per_customer_and_medicine() {
    let store = get_test_store().await;
    let customer = UserId::new();
    let med_id = MedicineId::new();

    for quantity in [1, 5] {
        store
            .upsert_cart_item(&CartItemRecord {
                id: Uuid::new_v4(),
                customer_id: customer,
                medicine_id: med_id,
                quantity,
            })
            .await
            .unwrap();
    }

    assert_eq!(store.cart_item_count(customer).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn list_orders_scopes_by_customer_and_seller() {
    let store = get_test_store().await;
    let customer_a = UserId::new();
    let customer_b = UserId::new();
    let med_a = medicine(10);
    let med_b = medicine(10);
    store.insert_medicine(&med_a).await.unwrap();
    store.insert_medicine(&med_b).await.unwrap();

    let order_a = order(customer_a);
    let order_b = order(customer_b);

    let mut tx = store.begin().await.unwrap();
    store
        .insert_order(&mut tx, &order_a, &[item(order_a.id, &med_a, 1)])
        .await
        .unwrap();
    store
        .insert_order(&mut tx, &order_b, &[item(order_b.id, &med_b, 1)])
        .await
        .unwrap();
    store.commit(tx).await.unwrap();

    let all = store.list_orders(OrderScope::All).await.unwrap();
    assert_eq!(all.len(), 2);

    let for_customer = store
        .list_orders(OrderScope::Customer(customer_a))
        .await
        .unwrap();
    assert_eq!(for_customer.len(), 1);
    assert_eq!(for_customer[0].order.id, order_a.id);
    assert_eq!(for_customer[0].items.len(), 1);

    let for_seller = store
        .list_orders(OrderScope::Seller(med_b.seller_id))
        .await
        .unwrap();
    assert_eq!(for_seller.len(), 1);
    assert_eq!(for_seller[0].order.id, order_b.id);

    let for_stranger = store
        .list_orders(OrderScope::Seller(UserId::new()))
        .await
        .unwrap();
    assert!(for_stranger.is_empty());
}

#[tokio::test]
#[serial]
async fn deleting_an_order_cascades_to_items() {
    let store = get_test_store().await;
    let med = medicine(10);
    store.insert_medicine(&med).await.unwrap();

    let ord = order(UserId::new());
    let mut tx = store.begin().await.unwrap();
    store
        .insert_order(&mut tx, &ord, &[item(ord.id, &med, 1)])
        .await
        .unwrap();
    store.commit(tx).await.unwrap();

    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(ord.id.as_uuid())
        .execute(store.pool())
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE order_id = $1")
        .bind(ord.id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn concurrent_reservations_cannot_oversell() {
    let store = get_test_store().await;
    let med = medicine(1);
    store.insert_medicine(&med).await.unwrap();

    // Two transactions race for the last unit: the row lock from
    // medicine_for_update serializes them, so the loser observes the
    // decremented stock.
    let mut tx1 = store.begin().await.unwrap();
    let seen1 = store
        .medicine_for_update(&mut tx1, med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen1.stock, 1);
    store.adjust_stock(&mut tx1, med.id, -1).await.unwrap();

    let store2 = PostgresMarketStore::new(store.pool().clone());
    let med_id = med.id;
    let loser = tokio::spawn(async move {
        let mut tx2 = store2.begin().await.unwrap();
        // Blocks until tx1 commits.
        let seen2 = store2
            .medicine_for_update(&mut tx2, med_id)
            .await
            .unwrap()
            .unwrap();
        store2.rollback(tx2).await.unwrap();
        seen2.stock
    });

    // Give the second transaction time to block on the row lock.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    store.commit(tx1).await.unwrap();

    assert_eq!(loser.await.unwrap(), 0);
    assert_eq!(store.get_medicine(med.id).await.unwrap().unwrap().stock, 0);
}
