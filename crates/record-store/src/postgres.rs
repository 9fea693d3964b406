use async_trait::async_trait;
use chrono::Utc;
use common::{
    ActorId, FulfillmentServiceId, PartnershipId, PartnershipRequestId, PriceListId, ProductId,
    RemoteId, VariantId,
};
use domain::{
    FulfillmentService, Margin, Money, NewPartnership, NewPartnershipRequest, NewProduct,
    NewVariant, Partnership, PartnershipRequest, PriceList, PriceListSettings, PricingStrategy,
    Product, RequestKind, RequestStatus, Variant, VariantUpdate,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    RecordStoreError, RequestQuery, Result,
    store::{RecordStore, RecordTransaction},
};

const PRICE_LIST_COLUMNS: &str =
    "id, supplier_id, name, is_general, strategy, margin, requires_approval, created_at";
const PRODUCT_COLUMNS: &str = "id, price_list_id, remote_id, listing_id, title, image_url";
const VARIANT_COLUMNS: &str =
    "v.id, v.product_id, v.remote_id, v.retail_price, v.wholesale_price, v.retailer_cost";
const PARTNERSHIP_COLUMNS: &str = "id, supplier_id, retailer_id, price_list_ids, created_at";
const REQUEST_COLUMNS: &str =
    "id, sender_id, recipient_id, kind, price_list_ids, message, status, created_at";

/// PostgreSQL-backed record store implementation.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new PostgreSQL record store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and wraps it in a store.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// Transaction handle of [`PostgresRecordStore`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

fn constraint_error(e: sqlx::Error) -> RecordStoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        return RecordStoreError::Constraint(format!("{constraint}: {}", db_err.message()));
    }
    RecordStoreError::Database(e)
}

fn not_found(entity: &'static str, id: impl ToString) -> RecordStoreError {
    RecordStoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn decode<T: std::str::FromStr<Err = String>>(entity: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|reason| RecordStoreError::Decode { entity, reason })
}

fn row_to_price_list(row: PgRow) -> Result<PriceList> {
    let strategy: String = row.try_get("strategy")?;
    let margin = match row.try_get::<Option<i32>, _>("margin")? {
        Some(percent) => Some(
            u32::try_from(percent)
                .ok()
                .and_then(|p| Margin::new(p).ok())
                .ok_or_else(|| RecordStoreError::Decode {
                    entity: "price list",
                    reason: format!("invalid margin {percent}"),
                })?,
        ),
        None => None,
    };

    Ok(PriceList {
        id: PriceListId::from_uuid(row.try_get("id")?),
        supplier_id: ActorId::from_uuid(row.try_get("supplier_id")?),
        settings: PriceListSettings {
            name: row.try_get("name")?,
            is_general: row.try_get("is_general")?,
            strategy: decode::<PricingStrategy>("price list", &strategy)?,
            margin,
            requires_approval: row.try_get("requires_approval")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        price_list_id: PriceListId::from_uuid(row.try_get("price_list_id")?),
        remote_id: RemoteId::new(row.try_get::<String, _>("remote_id")?),
        listing_id: RemoteId::new(row.try_get::<String, _>("listing_id")?),
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
    })
}

fn row_to_variant(row: PgRow) -> Result<Variant> {
    Ok(Variant {
        id: VariantId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        remote_id: RemoteId::new(row.try_get::<String, _>("remote_id")?),
        retail_price: Money::from_cents(row.try_get("retail_price")?),
        wholesale_price: row
            .try_get::<Option<i64>, _>("wholesale_price")?
            .map(Money::from_cents),
        retailer_cost: Money::from_cents(row.try_get("retailer_cost")?),
    })
}

fn row_to_partnership(row: PgRow) -> Result<Partnership> {
    let price_list_ids: Vec<Uuid> = row.try_get("price_list_ids")?;
    Ok(Partnership {
        id: PartnershipId::from_uuid(row.try_get("id")?),
        supplier_id: ActorId::from_uuid(row.try_get("supplier_id")?),
        retailer_id: ActorId::from_uuid(row.try_get("retailer_id")?),
        price_list_ids: price_list_ids.into_iter().map(PriceListId::from).collect(),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_request(row: PgRow) -> Result<PartnershipRequest> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let price_list_ids: Vec<Uuid> = row.try_get("price_list_ids")?;
    Ok(PartnershipRequest {
        id: PartnershipRequestId::from_uuid(row.try_get("id")?),
        sender_id: ActorId::from_uuid(row.try_get("sender_id")?),
        recipient_id: ActorId::from_uuid(row.try_get("recipient_id")?),
        kind: decode::<RequestKind>("partnership request", &kind)?,
        price_list_ids: price_list_ids.into_iter().map(PriceListId::from).collect(),
        message: row.try_get("message")?,
        status: decode::<RequestStatus>("partnership request", &status)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_fulfillment_service(row: PgRow) -> Result<FulfillmentService> {
    Ok(FulfillmentService {
        id: FulfillmentServiceId::from_uuid(row.try_get("id")?),
        owner_id: ActorId::from_uuid(row.try_get("owner_id")?),
        remote_id: RemoteId::new(row.try_get::<String, _>("remote_id")?),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RecordTransaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn find_price_lists(&mut self, ids: &[PriceListId]) -> Result<Vec<PriceList>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRICE_LIST_COLUMNS} FROM price_lists WHERE id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_price_list).collect()
    }

    async fn find_general_price_list(&mut self, supplier_id: ActorId) -> Result<Option<PriceList>> {
        let row = sqlx::query(&format!(
            "SELECT {PRICE_LIST_COLUMNS} FROM price_lists WHERE supplier_id = $1 AND is_general"
        ))
        .bind(supplier_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_price_list).transpose()
    }

    async fn insert_price_list(
        &mut self,
        supplier_id: ActorId,
        settings: &PriceListSettings,
    ) -> Result<PriceList> {
        let price_list = PriceList {
            id: PriceListId::new(),
            supplier_id,
            settings: settings.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO price_lists (id, supplier_id, name, is_general, strategy, margin, requires_approval, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(price_list.id.as_uuid())
        .bind(supplier_id.as_uuid())
        .bind(&settings.name)
        .bind(settings.is_general)
        .bind(settings.strategy.as_str())
        .bind(settings.margin.map(|m| m.percent() as i32))
        .bind(settings.requires_approval)
        .bind(price_list.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(constraint_error)?;

        Ok(price_list)
    }

    async fn update_price_list(
        &mut self,
        id: PriceListId,
        settings: &PriceListSettings,
    ) -> Result<PriceList> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE price_lists
            SET name = $2, is_general = $3, strategy = $4, margin = $5, requires_approval = $6
            WHERE id = $1
            RETURNING {PRICE_LIST_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&settings.name)
        .bind(settings.is_general)
        .bind(settings.strategy.as_str())
        .bind(settings.margin.map(|m| m.percent() as i32))
        .bind(settings.requires_approval)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(constraint_error)?
        .ok_or_else(|| not_found("price list", id))?;

        row_to_price_list(row)
    }

    async fn delete_price_lists(
        &mut self,
        supplier_id: ActorId,
        ids: &[PriceListId],
    ) -> Result<u64> {
        // Products and variants go with the price list through ON DELETE CASCADE
        let deleted: Vec<Uuid> = sqlx::query_scalar(
            "DELETE FROM price_lists WHERE supplier_id = $1 AND id = ANY($2) RETURNING id",
        )
        .bind(supplier_id.as_uuid())
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        if deleted.is_empty() {
            return Ok(0);
        }

        for table in ["partnerships", "partnership_requests"] {
            sqlx::query(&format!(
                r#"
                UPDATE {table}
                SET price_list_ids = ARRAY(
                    SELECT x FROM unnest(price_list_ids) WITH ORDINALITY AS t(x, n)
                    WHERE NOT x = ANY($1) ORDER BY n
                )
                WHERE price_list_ids && $1
                "#
            ))
            .bind(deleted.clone())
            .execute(&mut *self.tx)
            .await?;
        }

        sqlx::query("DELETE FROM partnership_requests WHERE cardinality(price_list_ids) = 0")
            .execute(&mut *self.tx)
            .await?;

        Ok(deleted.len() as u64)
    }

    async fn products_for_price_list(
        &mut self,
        price_list_id: PriceListId,
    ) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE price_list_id = $1 ORDER BY remote_id"
        ))
        .bind(price_list_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn insert_products(&mut self, products: Vec<NewProduct>) -> Result<Vec<Product>> {
        let mut inserted = Vec::with_capacity(products.len());
        for new in products {
            let product = Product {
                id: ProductId::new(),
                price_list_id: new.price_list_id,
                remote_id: new.remote_id,
                listing_id: new.listing_id,
                title: new.title,
                image_url: new.image_url,
            };

            sqlx::query(
                r#"
                INSERT INTO products (id, price_list_id, remote_id, listing_id, title, image_url)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(product.id.as_uuid())
            .bind(product.price_list_id.as_uuid())
            .bind(product.remote_id.as_str())
            .bind(product.listing_id.as_str())
            .bind(&product.title)
            .bind(&product.image_url)
            .execute(&mut *self.tx)
            .await
            .map_err(constraint_error)?;

            inserted.push(product);
        }
        Ok(inserted)
    }

    async fn update_product_listing(
        &mut self,
        id: ProductId,
        listing_id: &RemoteId,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE products SET listing_id = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(listing_id.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("product", id));
        }
        Ok(())
    }

    async fn delete_products(&mut self, ids: &[ProductId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn variants_for_price_list(
        &mut self,
        price_list_id: PriceListId,
    ) -> Result<Vec<Variant>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VARIANT_COLUMNS}
            FROM variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.price_list_id = $1
            ORDER BY v.remote_id
            "#
        ))
        .bind(price_list_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_variant).collect()
    }

    async fn insert_variants(&mut self, variants: Vec<NewVariant>) -> Result<Vec<Variant>> {
        let mut inserted = Vec::with_capacity(variants.len());
        for new in variants {
            let variant = Variant {
                id: VariantId::new(),
                product_id: new.product_id,
                remote_id: new.remote_id,
                retail_price: new.pricing.retail_price,
                wholesale_price: new.pricing.wholesale_price,
                retailer_cost: new.pricing.retailer_cost,
            };

            sqlx::query(
                r#"
                INSERT INTO variants (id, product_id, remote_id, retail_price, wholesale_price, retailer_cost)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(variant.id.as_uuid())
            .bind(variant.product_id.as_uuid())
            .bind(variant.remote_id.as_str())
            .bind(variant.retail_price.cents())
            .bind(variant.wholesale_price.map(|m| m.cents()))
            .bind(variant.retailer_cost.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(constraint_error)?;

            inserted.push(variant);
        }
        Ok(inserted)
    }

    async fn update_variants(&mut self, updates: Vec<VariantUpdate>) -> Result<u64> {
        let mut updated = 0;
        for update in updates {
            let result = sqlx::query(
                r#"
                UPDATE variants
                SET product_id = $2, retail_price = $3, wholesale_price = $4, retailer_cost = $5
                WHERE id = $1
                "#,
            )
            .bind(update.id.as_uuid())
            .bind(update.product_id.as_uuid())
            .bind(update.pricing.retail_price.cents())
            .bind(update.pricing.wholesale_price.map(|m| m.cents()))
            .bind(update.pricing.retailer_cost.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(constraint_error)?;

            if result.rows_affected() == 0 {
                return Err(not_found("variant", update.id));
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_variants(&mut self, ids: &[VariantId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM variants WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_partnership(
        &mut self,
        supplier_id: ActorId,
        retailer_id: ActorId,
    ) -> Result<Option<Partnership>> {
        let row = sqlx::query(&format!(
            "SELECT {PARTNERSHIP_COLUMNS} FROM partnerships WHERE supplier_id = $1 AND retailer_id = $2"
        ))
        .bind(supplier_id.as_uuid())
        .bind(retailer_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_partnership).transpose()
    }

    async fn partnerships_for_supplier(
        &mut self,
        supplier_id: ActorId,
    ) -> Result<Vec<Partnership>> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTNERSHIP_COLUMNS} FROM partnerships WHERE supplier_id = $1 ORDER BY created_at, id"
        ))
        .bind(supplier_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_partnership).collect()
    }

    async fn insert_partnership(&mut self, partnership: NewPartnership) -> Result<Partnership> {
        let mut price_list_ids = Vec::new();
        for id in partnership.price_list_ids {
            if !price_list_ids.contains(&id) {
                price_list_ids.push(id);
            }
        }
        let partnership = Partnership {
            id: PartnershipId::new(),
            supplier_id: partnership.supplier_id,
            retailer_id: partnership.retailer_id,
            price_list_ids,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO partnerships (id, supplier_id, retailer_id, price_list_ids, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(partnership.id.as_uuid())
        .bind(partnership.supplier_id.as_uuid())
        .bind(partnership.retailer_id.as_uuid())
        .bind(uuids(&partnership.price_list_ids))
        .bind(partnership.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(constraint_error)?;

        Ok(partnership)
    }

    async fn attach_price_lists(
        &mut self,
        partnership_id: PartnershipId,
        price_list_ids: &[PriceListId],
    ) -> Result<()> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(price_list_ids.len());
        for id in uuids(price_list_ids) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE partnerships
            SET price_list_ids = price_list_ids || ARRAY(
                SELECT x FROM unnest($2::uuid[]) WITH ORDINALITY AS t(x, n)
                WHERE NOT x = ANY(price_list_ids) ORDER BY n
            )
            WHERE id = $1
            "#,
        )
        .bind(partnership_id.as_uuid())
        .bind(ids)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("partnership", partnership_id));
        }
        Ok(())
    }

    async fn detach_price_list(
        &mut self,
        partnership_ids: &[PartnershipId],
        price_list_id: PriceListId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE partnerships
            SET price_list_ids = array_remove(price_list_ids, $2)
            WHERE id = ANY($1) AND $2 = ANY(price_list_ids)
            "#,
        )
        .bind(uuids(partnership_ids))
        .bind(price_list_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_partnership_requests(
        &mut self,
        ids: &[PartnershipRequestId],
    ) -> Result<Vec<PartnershipRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM partnership_requests WHERE id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_request).collect()
    }

    async fn query_partnership_requests(
        &mut self,
        query: &RequestQuery,
    ) -> Result<Vec<PartnershipRequest>> {
        let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM partnership_requests WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.sender_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sender_id = ${param_count}"));
        }
        if query.recipient_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND recipient_id = ${param_count}"));
        }
        if query.kind.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND kind = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.price_list_ids.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_list_ids && ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at, id");

        let mut q = sqlx::query(&sql);
        if let Some(sender_id) = query.sender_id {
            q = q.bind(sender_id.as_uuid());
        }
        if let Some(recipient_id) = query.recipient_id {
            q = q.bind(recipient_id.as_uuid());
        }
        if let Some(kind) = query.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        if let Some(ref ids) = query.price_list_ids {
            q = q.bind(uuids(ids));
        }

        let rows = q.fetch_all(&mut *self.tx).await?;
        rows.into_iter().map(row_to_request).collect()
    }

    async fn insert_partnership_request(
        &mut self,
        request: NewPartnershipRequest,
    ) -> Result<PartnershipRequest> {
        let request = PartnershipRequest {
            id: PartnershipRequestId::new(),
            sender_id: request.sender_id,
            recipient_id: request.recipient_id,
            kind: request.kind,
            price_list_ids: request.price_list_ids,
            message: request.message,
            status: request.status,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO partnership_requests (id, sender_id, recipient_id, kind, price_list_ids, message, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.sender_id.as_uuid())
        .bind(request.recipient_id.as_uuid())
        .bind(request.kind.as_str())
        .bind(uuids(&request.price_list_ids))
        .bind(&request.message)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(constraint_error)?;

        Ok(request)
    }

    async fn update_partnership_request(
        &mut self,
        id: PartnershipRequestId,
        message: &str,
        status: RequestStatus,
    ) -> Result<PartnershipRequest> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE partnership_requests SET message = $2, status = $3
            WHERE id = $1
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(message)
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| not_found("partnership request", id))?;

        row_to_request(row)
    }

    async fn delete_partnership_requests(&mut self, ids: &[PartnershipRequestId]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM partnership_requests WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_fulfillment_service(
        &mut self,
        owner_id: ActorId,
    ) -> Result<Option<FulfillmentService>> {
        let row = sqlx::query(
            "SELECT id, owner_id, remote_id, created_at FROM fulfillment_services WHERE owner_id = $1",
        )
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_fulfillment_service).transpose()
    }

    async fn insert_fulfillment_service(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<FulfillmentService> {
        let service = FulfillmentService {
            id: FulfillmentServiceId::new(),
            owner_id,
            remote_id: remote_id.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO fulfillment_services (id, owner_id, remote_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(service.id.as_uuid())
        .bind(owner_id.as_uuid())
        .bind(remote_id.as_str())
        .bind(service.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(constraint_error)?;

        Ok(service)
    }

    async fn update_fulfillment_service_remote_id(
        &mut self,
        owner_id: ActorId,
        remote_id: &RemoteId,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE fulfillment_services SET remote_id = $2 WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .bind(remote_id.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("fulfillment service", owner_id));
        }
        Ok(())
    }

    async fn delete_fulfillment_service(&mut self, owner_id: ActorId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM fulfillment_services WHERE owner_id = $1")
            .bind(owner_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }
}
