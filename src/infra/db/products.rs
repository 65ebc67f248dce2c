use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::pagination::PageRequest,
    application::repos::{
        CreateProductParams, ProductQueryFilter, ProductSort, ProductsRepo, ProductsWriteRepo,
        RepoError, UpdateProductParams,
    },
    domain::entities::{CategoryRecord, ProductRecord},
    domain::types::{ProductSortField, SortOrder},
};

use super::{PostgresRepositories, map_sqlx_error};

const PRODUCT_COLUMNS: &str = "p.id, p.sku, p.name, p.description, p.price, p.currency, \
    p.stock, p.image_url, c.id AS category_id, c.name AS category_name, \
    p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    sku: String,
    name: String,
    description: Option<String>,
    price: f64,
    currency: String,
    stock: i32,
    image_url: Option<String>,
    category_id: i64,
    category_name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            price: row.price,
            currency: row.currency,
            stock: row.stock,
            image_url: row.image_url,
            category: CategoryRecord {
                id: row.category_id,
                name: row.category_name,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// `ILIKE` pattern matching `search` literally anywhere in the column.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

impl PostgresRepositories {
    fn apply_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductQueryFilter) {
        if let Some(search) = filter.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (p.name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR p.description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR p.sku ILIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }

        if let Some(category) = filter.category.as_ref() {
            qb.push(" AND c.name = ");
            qb.push_bind(category.clone());
        }

        if let Some(min_price) = filter.min_price {
            qb.push(" AND p.price >= ");
            qb.push_bind(min_price);
        }

        if let Some(max_price) = filter.max_price {
            qb.push(" AND p.price <= ");
            qb.push_bind(max_price);
        }
    }

    fn push_product_order(qb: &mut QueryBuilder<'_, Postgres>, sort: ProductSort) {
        let column = match sort.field {
            ProductSortField::Price => "p.price",
            ProductSortField::CreatedAt => "p.created_at",
        };
        let direction = match sort.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(" ORDER BY {column} {direction}, p.id {direction}"));
    }

    async fn fetch_product<'e, E>(executor: E, id: i64) -> Result<Option<ProductRecord>, RepoError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} \
             FROM products p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ProductRecord::from))
    }

    async fn upsert_category<'e, E>(executor: E, name: &str) -> Result<i64, RepoError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(executor)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn list_with_count(
        &self,
        filter: &ProductQueryFilter,
        sort: ProductSort,
        page: PageRequest,
    ) -> Result<(Vec<ProductRecord>, u64), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut count_qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM products p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE 1=1",
        );
        Self::apply_product_filter(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let limit = i64::try_from(page.limit())
            .map_err(|_| RepoError::from_persistence("page size exceeds supported range"))?;
        let offset = i64::try_from(page.offset())
            .map_err(|_| RepoError::from_persistence("page offset exceeds supported range"))?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE 1=1"
        ));
        Self::apply_product_filter(&mut qb, filter);
        Self::push_product_order(&mut qb, sort);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(ProductRecord::from).collect(),
            Self::convert_count(total)?,
        ))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRecord>, RepoError> {
        Self::fetch_product(self.pool(), id).await
    }
}

#[async_trait]
impl ProductsWriteRepo for PostgresRepositories {
    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let category_id = Self::upsert_category(&mut *tx, &params.category).await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO products (sku, name, description, price, currency, stock, image_url, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&params.sku)
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.price)
        .bind(&params.currency)
        .bind(params.stock)
        .bind(params.image_url.as_deref())
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let product = Self::fetch_product(&mut *tx, id)
            .await?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(product)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let category_id = match params.category.as_deref() {
            Some(name) => Some(Self::upsert_category(&mut *tx, name).await?),
            None => None,
        };

        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE products
            SET sku = COALESCE($2, sku),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                currency = COALESCE($6, currency),
                stock = COALESCE($7, stock),
                image_url = COALESCE($8, image_url),
                category_id = COALESCE($9, category_id),
                updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(params.id)
        .bind(params.sku.as_deref())
        .bind(params.name.as_deref())
        .bind(params.description.as_deref())
        .bind(params.price)
        .bind(params.currency.as_deref())
        .bind(params.stock)
        .bind(params.image_url.as_deref())
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let product = Self::fetch_product(&mut *tx, updated)
            .await?
            .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(product)
    }

    async fn delete_product(&self, id: i64) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            WITH deleted AS (
                DELETE FROM products WHERE id = $1 RETURNING *
            )
            SELECT p.id, p.sku, p.name, p.description, p.price, p.currency,
                   p.stock, p.image_url, c.id AS category_id, c.name AS category_name,
                   p.created_at, p.updated_at
            FROM deleted p
            INNER JOIN categories c ON c.id = p.category_id
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ProductRecord::from).ok_or(RepoError::NotFound)
    }
}
