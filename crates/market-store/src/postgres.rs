//! PostgreSQL-backed market store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MedicineId, Money, OrderId, OrderStatus, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItemRecord, MarketStore, MedicineRecord, OrderItemRecord, OrderRecord, OrderScope,
    OrderWithItems, Result, StoreError,
};

/// PostgreSQL implementation of [`MarketStore`].
///
/// Row-level locking (`SELECT ... FOR UPDATE`) serializes conflicting
/// stock reservations on the same medicine; everything else relies on
/// ordinary transaction atomicity.
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running database migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_medicine(row: PgRow) -> Result<MedicineRecord> {
        Ok(MedicineRecord {
            id: MedicineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            manufacturer: row.try_get("manufacturer")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
            is_active: row.try_get("is_active")?,
            seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            category_id: row.try_get("category_id")?,
            image_url: row.try_get("image_url")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        let status_str: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_str)
            .ok_or_else(|| StoreError::Decode(format!("unknown order status: {status_str}")))?;

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: UserId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            total_amount: Money::from_cents(row.try_get("total_cents")?),
            status,
            payment_method: row.try_get("payment_method")?,
            shipping_name: row.try_get("shipping_name")?,
            shipping_phone: row.try_get("shipping_phone")?,
            shipping_address: row.try_get("shipping_address")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            delivered_at: row.try_get("delivered_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItemRecord> {
        let quantity: i64 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| StoreError::Decode(format!("order item quantity out of range: {quantity}")))?;

        Ok(OrderItemRecord {
            id: row.try_get("id")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            medicine_id: MedicineId::from_uuid(row.try_get::<Uuid, _>("medicine_id")?),
            seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            medicine_name: row.try_get("medicine_name")?,
            manufacturer: row.try_get("manufacturer")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity,
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    async fn items_for_orders(&self, order_ids: &[Uuid]) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, medicine_id, seller_id, medicine_name, manufacturer,
                   unit_price_cents, quantity, subtotal_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        Ok(tx.rollback().await?)
    }

    async fn insert_medicine(&self, medicine: &MedicineRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO medicines (id, name, manufacturer, price_cents, stock, is_active,
                                   seller_id, category_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(medicine.id.as_uuid())
        .bind(&medicine.name)
        .bind(&medicine.manufacturer)
        .bind(medicine.price.cents())
        .bind(medicine.stock)
        .bind(medicine.is_active)
        .bind(medicine.seller_id.as_uuid())
        .bind(medicine.category_id)
        .bind(&medicine.image_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_medicine(&self, id: MedicineId) -> Result<Option<MedicineRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, manufacturer, price_cents, stock, is_active,
                   seller_id, category_id, image_url
            FROM medicines
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_medicine).transpose()
    }

    async fn update_medicine(&self, medicine: &MedicineRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE medicines
            SET name = $2, manufacturer = $3, price_cents = $4, stock = $5,
                is_active = $6, seller_id = $7, category_id = $8, image_url = $9
            WHERE id = $1
            "#,
        )
        .bind(medicine.id.as_uuid())
        .bind(&medicine.name)
        .bind(&medicine.manufacturer)
        .bind(medicine.price.cents())
        .bind(medicine.stock)
        .bind(medicine.is_active)
        .bind(medicine.seller_id.as_uuid())
        .bind(medicine.category_id)
        .bind(&medicine.image_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn medicine_for_update(
        &self,
        tx: &mut Self::Tx,
        id: MedicineId,
    ) -> Result<Option<MedicineRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, manufacturer, price_cents, stock, is_active,
                   seller_id, category_id, image_url
            FROM medicines
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Self::row_to_medicine).transpose()
    }

    async fn adjust_stock(&self, tx: &mut Self::Tx, id: MedicineId, delta: i64) -> Result<()> {
        sqlx::query("UPDATE medicines SET stock = stock + $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(delta)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn upsert_cart_item(&self, item: &CartItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, customer_id, medicine_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id, medicine_id)
            DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(item.id)
        .bind(item.customer_id.as_uuid())
        .bind(item.medicine_id.as_uuid())
        .bind(i64::from(item.quantity))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cart_item_count(&self, customer_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn clear_cart(&self, tx: &mut Self::Tx, customer_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(
        &self,
        tx: &mut Self::Tx,
        order: &OrderRecord,
        items: &[OrderItemRecord],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total_cents, status, payment_method,
                                shipping_name, shipping_phone, shipping_address, notes,
                                created_at, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .bind(&order.payment_method)
        .bind(&order.shipping_name)
        .bind(&order.shipping_phone)
        .bind(&order.shipping_address)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.delivered_at)
        .execute(&mut **tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, medicine_id, seller_id, medicine_name,
                                         manufacturer, unit_price_cents, quantity, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id.as_uuid())
            .bind(item.medicine_id.as_uuid())
            .bind(item.seller_id.as_uuid())
            .bind(&item.medicine_name)
            .bind(&item.manufacturer)
            .bind(item.unit_price.cents())
            .bind(i64::from(item.quantity))
            .bind(item.subtotal.cents())
            .execute(&mut **tx)
            .await?;
        }

        tracing::debug!(order_id = %order.id, items = items.len(), "order staged for insert");
        Ok(())
    }

    async fn order_for_update(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
    ) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, total_cents, status, payment_method, shipping_name,
                   shipping_phone, shipping_address, notes, created_at, delivered_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn order_items(&self, tx: &mut Self::Tx, id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, medicine_id, seller_id, medicine_name, manufacturer,
                   unit_price_cents, quantity, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn set_order_status(
        &self,
        tx: &mut Self::Tx,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                delivered_at = COALESCE($3, delivered_at),
                notes = COALESCE($4, notes)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(delivered_at)
        .bind(notes)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithItems>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, total_cents, status, payment_method, shipping_name,
                   shipping_phone, shipping_address, notes, created_at, delivered_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = Self::row_to_order(row)?;
        let items = self.items_for_orders(&[order.id.as_uuid()]).await?;

        Ok(Some(OrderWithItems { order, items }))
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<OrderWithItems>> {
        let base = r#"
            SELECT o.id, o.customer_id, o.total_cents, o.status, o.payment_method,
                   o.shipping_name, o.shipping_phone, o.shipping_address, o.notes,
                   o.created_at, o.delivered_at
            FROM orders o
        "#;

        let rows = match scope {
            OrderScope::All => {
                sqlx::query(&format!("{base} ORDER BY o.created_at DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
            OrderScope::Customer(customer_id) => {
                sqlx::query(&format!(
                    "{base} WHERE o.customer_id = $1 ORDER BY o.created_at DESC"
                ))
                .bind(customer_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            OrderScope::Seller(seller_id) => {
                sqlx::query(&format!(
                    r#"{base}
                    WHERE EXISTS (
                        SELECT 1 FROM order_items i
                        WHERE i.order_id = o.id AND i.seller_id = $1
                    )
                    ORDER BY o.created_at DESC"#
                ))
                .bind(seller_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
        };

        let orders: Vec<OrderRecord> = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<_>>()?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let mut by_order: std::collections::HashMap<OrderId, Vec<OrderItemRecord>> =
            std::collections::HashMap::new();
        for item in self.items_for_orders(&order_ids).await? {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}
