//! Database service for cleaning-service.

use crate::models::{
    AddonService, Agent, Carpet, CarpetAddon, CarpetType, Client, Commission, CommissionStatus,
    CommissionType, CreateAddonService, CreateAgent, CreateCarpet, CreateCarpetType, CreateClient,
    CreateCommissionType, CreateOrder, CreateTaxSetting, Invoice, LineItem, Order, OrderStatus,
    Payment, TaxSetting,
};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "cleaning-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Used by tests that provision their own
    /// database.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (client_id, name, phone, email, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING client_id, name, phone, email, address, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)))?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, phone, email, address, created_utc
            FROM clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients, newest first.
    #[instrument(skip(self))]
    pub async fn list_clients(&self, page_size: i32) -> Result<Vec<Client>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, phone, email, address, created_utc
            FROM clients
            ORDER BY created_utc DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        Ok(clients)
    }

    // -------------------------------------------------------------------------
    // Agent and Commission Type Operations
    // -------------------------------------------------------------------------

    /// Create a new agent.
    #[instrument(skip(self, input))]
    pub async fn create_agent(&self, input: &CreateAgent) -> Result<Agent, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_agent"])
            .start_timer();

        if let Some(commission_type_id) = input.commission_type_id {
            if self.get_commission_type(commission_type_id).await?.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Commission type {} does not exist",
                    commission_type_id
                )));
            }
        }

        let agent = sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents (
                agent_id, name, phone, email, commission_type_id,
                fixed_amount_override, percentage_rate_override,
                fixed_commission, percentage_commission, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
            RETURNING agent_id, name, phone, email, commission_type_id,
                fixed_amount_override, percentage_rate_override,
                fixed_commission, percentage_commission, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.commission_type_id)
        .bind(input.fixed_amount_override)
        .bind(input.percentage_rate_override)
        .bind(input.fixed_commission)
        .bind(input.percentage_commission)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create agent: {}", e)))?;

        timer.observe_duration();

        info!(agent_id = %agent.agent_id, "Agent created");

        Ok(agent)
    }

    /// Get an agent by ID.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_agent"])
            .start_timer();

        let agent = sqlx::query_as::<_, Agent>(
            r#"
            SELECT agent_id, name, phone, email, commission_type_id,
                fixed_amount_override, percentage_rate_override,
                fixed_commission, percentage_commission, active, created_utc
            FROM agents
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get agent: {}", e)))?;

        timer.observe_duration();

        Ok(agent)
    }

    /// List agents, newest first.
    #[instrument(skip(self))]
    pub async fn list_agents(&self, page_size: i32) -> Result<Vec<Agent>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;

        let agents = sqlx::query_as::<_, Agent>(
            r#"
            SELECT agent_id, name, phone, email, commission_type_id,
                fixed_amount_override, percentage_rate_override,
                fixed_commission, percentage_commission, active, created_utc
            FROM agents
            ORDER BY created_utc DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list agents: {}", e)))?;

        Ok(agents)
    }

    /// Create a commission type. Marking it default clears the flag on
    /// every other type in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn create_commission_type(
        &self,
        input: &CreateCommissionType,
    ) -> Result<CommissionType, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_commission_type"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        if input.is_default {
            sqlx::query("UPDATE commission_types SET is_default = FALSE WHERE is_default")
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear defaults: {}", e))
                })?;
        }

        let commission_type = sqlx::query_as::<_, CommissionType>(
            r#"
            INSERT INTO commission_types (commission_type_id, name, fixed_amount, percentage_rate, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.fixed_amount)
        .bind(input.percentage_rate)
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Commission type '{}' already exists",
                    input.name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create commission type: {}", e)),
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(commission_type_id = %commission_type.commission_type_id, "Commission type created");

        Ok(commission_type)
    }

    /// Get a commission type by ID.
    #[instrument(skip(self), fields(commission_type_id = %commission_type_id))]
    pub async fn get_commission_type(
        &self,
        commission_type_id: Uuid,
    ) -> Result<Option<CommissionType>, AppError> {
        let commission_type = sqlx::query_as::<_, CommissionType>(
            r#"
            SELECT commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            FROM commission_types
            WHERE commission_type_id = $1
            "#,
        )
        .bind(commission_type_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get commission type: {}", e))
        })?;

        Ok(commission_type)
    }

    /// List commission types.
    #[instrument(skip(self))]
    pub async fn list_commission_types(&self) -> Result<Vec<CommissionType>, AppError> {
        let commission_types = sqlx::query_as::<_, CommissionType>(
            r#"
            SELECT commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            FROM commission_types
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list commission types: {}", e))
        })?;

        Ok(commission_types)
    }

    /// Mark a commission type as the default. A single guarded update
    /// clears the flag everywhere else, so at most one default exists.
    #[instrument(skip(self), fields(commission_type_id = %commission_type_id))]
    pub async fn set_default_commission_type(
        &self,
        commission_type_id: Uuid,
    ) -> Result<Option<CommissionType>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_default_commission_type"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            "UPDATE commission_types SET is_default = FALSE WHERE is_default AND commission_type_id <> $1",
        )
        .bind(commission_type_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to clear defaults: {}", e)))?;

        let commission_type = sqlx::query_as::<_, CommissionType>(
            r#"
            UPDATE commission_types
            SET is_default = TRUE
            WHERE commission_type_id = $1
            RETURNING commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            "#,
        )
        .bind(commission_type_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set default commission type: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref ct) = commission_type {
            info!(commission_type_id = %ct.commission_type_id, "Default commission type set");
        }

        Ok(commission_type)
    }

    // -------------------------------------------------------------------------
    // Catalog Operations (carpet types, addon services, tax settings)
    // -------------------------------------------------------------------------

    /// Create a carpet type.
    #[instrument(skip(self, input))]
    pub async fn create_carpet_type(
        &self,
        input: &CreateCarpetType,
    ) -> Result<CarpetType, AppError> {
        let carpet_type = sqlx::query_as::<_, CarpetType>(
            r#"
            INSERT INTO carpet_types (carpet_type_id, name, price, is_per_square_foot, active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING carpet_type_id, name, price, is_per_square_foot, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.price)
        .bind(input.is_per_square_foot)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Carpet type '{}' already exists", input.name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create carpet type: {}", e)),
        })?;

        info!(carpet_type_id = %carpet_type.carpet_type_id, "Carpet type created");

        Ok(carpet_type)
    }

    /// Get a carpet type by ID.
    #[instrument(skip(self), fields(carpet_type_id = %carpet_type_id))]
    pub async fn get_carpet_type(
        &self,
        carpet_type_id: Uuid,
    ) -> Result<Option<CarpetType>, AppError> {
        let carpet_type = sqlx::query_as::<_, CarpetType>(
            r#"
            SELECT carpet_type_id, name, price, is_per_square_foot, active, created_utc
            FROM carpet_types
            WHERE carpet_type_id = $1
            "#,
        )
        .bind(carpet_type_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get carpet type: {}", e)))?;

        Ok(carpet_type)
    }

    /// List active carpet types.
    #[instrument(skip(self))]
    pub async fn list_carpet_types(&self) -> Result<Vec<CarpetType>, AppError> {
        let carpet_types = sqlx::query_as::<_, CarpetType>(
            r#"
            SELECT carpet_type_id, name, price, is_per_square_foot, active, created_utc
            FROM carpet_types
            WHERE active = TRUE
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list carpet types: {}", e))
        })?;

        Ok(carpet_types)
    }

    /// Create an addon service.
    #[instrument(skip(self, input))]
    pub async fn create_addon_service(
        &self,
        input: &CreateAddonService,
    ) -> Result<AddonService, AppError> {
        let addon = sqlx::query_as::<_, AddonService>(
            r#"
            INSERT INTO addon_services (addon_service_id, name, price, is_per_square_foot, active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING addon_service_id, name, price, is_per_square_foot, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.price)
        .bind(input.is_per_square_foot)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Addon service '{}' already exists",
                    input.name
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create addon service: {}", e)),
        })?;

        info!(addon_service_id = %addon.addon_service_id, "Addon service created");

        Ok(addon)
    }

    /// Get an addon service by ID.
    #[instrument(skip(self), fields(addon_service_id = %addon_service_id))]
    pub async fn get_addon_service(
        &self,
        addon_service_id: Uuid,
    ) -> Result<Option<AddonService>, AppError> {
        let addon = sqlx::query_as::<_, AddonService>(
            r#"
            SELECT addon_service_id, name, price, is_per_square_foot, active, created_utc
            FROM addon_services
            WHERE addon_service_id = $1
            "#,
        )
        .bind(addon_service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get addon service: {}", e))
        })?;

        Ok(addon)
    }

    /// List active addon services.
    #[instrument(skip(self))]
    pub async fn list_addon_services(&self) -> Result<Vec<AddonService>, AppError> {
        let addons = sqlx::query_as::<_, AddonService>(
            r#"
            SELECT addon_service_id, name, price, is_per_square_foot, active, created_utc
            FROM addon_services
            WHERE active = TRUE
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list addon services: {}", e))
        })?;

        Ok(addons)
    }

    /// Create a tax setting.
    #[instrument(skip(self, input))]
    pub async fn create_tax_setting(
        &self,
        input: &CreateTaxSetting,
    ) -> Result<TaxSetting, AppError> {
        if input.calculation != "percentage" && input.calculation != "fixed" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Tax calculation must be 'percentage' or 'fixed'"
            )));
        }

        let tax_setting = sqlx::query_as::<_, TaxSetting>(
            r#"
            INSERT INTO tax_settings (tax_setting_id, name, rate, calculation, active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING tax_setting_id, name, rate, calculation, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.rate)
        .bind(&input.calculation)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create tax setting: {}", e))
        })?;

        info!(tax_setting_id = %tax_setting.tax_setting_id, "Tax setting created");

        Ok(tax_setting)
    }

    /// Get a tax setting by ID.
    #[instrument(skip(self), fields(tax_setting_id = %tax_setting_id))]
    pub async fn get_tax_setting(
        &self,
        tax_setting_id: Uuid,
    ) -> Result<Option<TaxSetting>, AppError> {
        let tax_setting = sqlx::query_as::<_, TaxSetting>(
            r#"
            SELECT tax_setting_id, name, rate, calculation, active, created_utc
            FROM tax_settings
            WHERE tax_setting_id = $1
            "#,
        )
        .bind(tax_setting_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get tax setting: {}", e)))?;

        Ok(tax_setting)
    }

    /// List tax settings.
    #[instrument(skip(self))]
    pub async fn list_tax_settings(&self) -> Result<Vec<TaxSetting>, AppError> {
        let tax_settings = sqlx::query_as::<_, TaxSetting>(
            r#"
            SELECT tax_setting_id, name, rate, calculation, active, created_utc
            FROM tax_settings
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list tax settings: {}", e))
        })?;

        Ok(tax_settings)
    }

    // -------------------------------------------------------------------------
    // Order and Carpet Operations
    // -------------------------------------------------------------------------

    /// Create a new order.
    #[instrument(skip(self, input))]
    pub async fn create_order(&self, input: &CreateOrder) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        if let Some(client_id) = input.client_id {
            if self.get_client(client_id).await?.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Client {} does not exist",
                    client_id
                )));
            }
        }
        if let Some(agent_id) = input.agent_id {
            if self.get_agent(agent_id).await?.is_none() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Agent {} does not exist",
                    agent_id
                )));
            }
        }

        let status = if input.agent_id.is_some() {
            OrderStatus::Assigned
        } else {
            OrderStatus::Pending
        };

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (order_id, client_id, agent_id, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING order_id, client_id, agent_id, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.client_id)
        .bind(input.agent_id)
        .bind(status.as_str())
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create order: {}", e)))?;

        timer.observe_duration();

        info!(order_id = %order.order_id, "Order created");

        Ok(order)
    }

    /// Get an order by ID.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, client_id, agent_id, status, notes, created_utc, updated_utc
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();

        Ok(order)
    }

    /// List orders, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page_size: i32,
    ) -> Result<Vec<Order>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;
        let status_str = status.map(|s| s.as_str().to_string());

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, client_id, agent_id, status, notes, created_utc, updated_utc
            FROM orders
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(&status_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list orders: {}", e)))?;

        Ok(orders)
    }

    /// Move an order along its workflow. Rejects transitions the
    /// workflow does not allow.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_order_status"])
            .start_timer();

        let existing = match self.get_order(order_id).await? {
            Some(order) => order,
            None => return Ok(None),
        };

        let current = OrderStatus::from_string(&existing.status);
        if !current.can_transition_to(next) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot transition order from '{}' to '{}'",
                current.as_str(),
                next.as_str()
            )));
        }

        let order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $3, updated_utc = NOW()
            WHERE order_id = $1 AND status = $2
            RETURNING order_id, client_id, agent_id, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(order_id)
        .bind(current.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update order status: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref o) = order {
            info!(order_id = %o.order_id, status = %o.status, "Order status updated");
        }

        Ok(order)
    }

    /// Add a carpet to an order.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn add_carpet(&self, input: &CreateCarpet) -> Result<Carpet, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_carpet"])
            .start_timer();

        let order = self
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
        let order_status = OrderStatus::from_string(&order.status);
        if matches!(order_status, OrderStatus::Completed | OrderStatus::Cancelled) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot add carpets to a {} order",
                order_status.as_str()
            )));
        }
        if self.get_carpet_type(input.carpet_type_id).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Carpet type {} does not exist",
                input.carpet_type_id
            )));
        }

        let carpet = sqlx::query_as::<_, Carpet>(
            r#"
            INSERT INTO carpets (
                carpet_id, order_id, carpet_type_id, scan_code, color,
                width, length, additional_charges, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'received')
            RETURNING carpet_id, order_id, carpet_type_id, scan_code, color,
                width, length, additional_charges, status, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.order_id)
        .bind(input.carpet_type_id)
        .bind(&input.scan_code)
        .bind(&input.color)
        .bind(input.width)
        .bind(input.length)
        .bind(input.additional_charges)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Scan code '{}' is already in use",
                    input.scan_code
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to add carpet: {}", e)),
        })?;

        timer.observe_duration();

        info!(carpet_id = %carpet.carpet_id, scan_code = %carpet.scan_code, "Carpet added");

        Ok(carpet)
    }

    /// Get a carpet by ID.
    #[instrument(skip(self), fields(carpet_id = %carpet_id))]
    pub async fn get_carpet(&self, carpet_id: Uuid) -> Result<Option<Carpet>, AppError> {
        let carpet = sqlx::query_as::<_, Carpet>(
            r#"
            SELECT carpet_id, order_id, carpet_type_id, scan_code, color,
                width, length, additional_charges, status, created_utc
            FROM carpets
            WHERE carpet_id = $1
            "#,
        )
        .bind(carpet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get carpet: {}", e)))?;

        Ok(carpet)
    }

    /// List the carpets on an order, in insertion order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn list_carpets_for_order(&self, order_id: Uuid) -> Result<Vec<Carpet>, AppError> {
        let carpets = sqlx::query_as::<_, Carpet>(
            r#"
            SELECT carpet_id, order_id, carpet_type_id, scan_code, color,
                width, length, additional_charges, status, created_utc
            FROM carpets
            WHERE order_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list carpets: {}", e)))?;

        Ok(carpets)
    }

    /// Attach an addon service to a carpet, with an optional price
    /// override that replaces the computed price.
    #[instrument(skip(self), fields(carpet_id = %carpet_id, addon_service_id = %addon_service_id))]
    pub async fn attach_addon(
        &self,
        carpet_id: Uuid,
        addon_service_id: Uuid,
        price_override: Option<Decimal>,
    ) -> Result<CarpetAddon, AppError> {
        if self.get_carpet(carpet_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Carpet not found")));
        }
        if self.get_addon_service(addon_service_id).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Addon service {} does not exist",
                addon_service_id
            )));
        }

        let addon = sqlx::query_as::<_, CarpetAddon>(
            r#"
            INSERT INTO carpet_addons (carpet_id, addon_service_id, price_override)
            VALUES ($1, $2, $3)
            RETURNING carpet_id, addon_service_id, price_override
            "#,
        )
        .bind(carpet_id)
        .bind(addon_service_id)
        .bind(price_override)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Addon already attached to this carpet"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to attach addon: {}", e)),
        })?;

        info!(carpet_id = %carpet_id, addon_service_id = %addon_service_id, "Addon attached");

        Ok(addon)
    }

    /// Cancel a carpet. Terminal; the carpet keeps appearing on invoices
    /// with a zeroed contribution.
    #[instrument(skip(self), fields(carpet_id = %carpet_id))]
    pub async fn cancel_carpet(&self, carpet_id: Uuid) -> Result<Option<Carpet>, AppError> {
        let carpet = sqlx::query_as::<_, Carpet>(
            r#"
            UPDATE carpets
            SET status = 'canceled'
            WHERE carpet_id = $1 AND status <> 'canceled'
            RETURNING carpet_id, order_id, carpet_type_id, scan_code, color,
                width, length, additional_charges, status, created_utc
            "#,
        )
        .bind(carpet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel carpet: {}", e)))?;

        if let Some(ref c) = carpet {
            info!(carpet_id = %c.carpet_id, "Carpet canceled");
        }

        Ok(carpet)
    }

    // -------------------------------------------------------------------------
    // Invoice Read Operations (writes live in services::invoicing)
    // -------------------------------------------------------------------------

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, order_id, invoice_number, status, subtotal,
                discount_value, discount_type, discount_amount, tax_setting_id,
                tax_amount, total_amount, notes, previous_invoice_id,
                issued_at, due_date, created_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get an order's active (non-canceled) invoice, if any.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_active_invoice_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, order_id, invoice_number, status, subtotal,
                discount_value, discount_type, discount_amount, tax_setting_id,
                tax_amount, total_amount, notes, previous_invoice_id,
                issued_at, due_date, created_utc
            FROM invoices
            WHERE order_id = $1 AND status <> 'canceled'
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get active invoice: {}", e))
        })?;

        Ok(invoice)
    }

    /// List invoices, newest first, optionally filtered by order.
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        order_id: Option<Uuid>,
        page_size: i32,
    ) -> Result<Vec<Invoice>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, order_id, invoice_number, status, subtotal,
                discount_value, discount_type, discount_amount, tax_setting_id,
                tax_amount, total_amount, notes, previous_invoice_id,
                issued_at, due_date, created_utc
            FROM invoices
            WHERE ($1::uuid IS NULL OR order_id = $1)
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(order_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        Ok(invoices)
    }

    /// Get line items for an invoice, in display order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_line_items(&self, invoice_id: Uuid) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT line_item_id, invoice_id, carpet_id, item_type, name, description,
                quantity, unit, unit_price, subtotal, sort_order, created_utc
            FROM line_items
            WHERE invoice_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    // -------------------------------------------------------------------------
    // Commission Operations
    // -------------------------------------------------------------------------

    /// Get a commission by ID.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn get_commission(
        &self,
        commission_id: Uuid,
    ) -> Result<Option<Commission>, AppError> {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            SELECT commission_id, agent_id, invoice_id, commission_type_id,
                fixed_amount, percentage_rate, total_commission, status, paid_at, created_utc
            FROM commissions
            WHERE commission_id = $1
            "#,
        )
        .bind(commission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get commission: {}", e)))?;

        Ok(commission)
    }

    /// List an agent's commissions, newest first.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn list_commissions_for_agent(
        &self,
        agent_id: Uuid,
        page_size: i32,
    ) -> Result<Vec<Commission>, AppError> {
        let limit = page_size.clamp(1, 100) as i64;

        let commissions = sqlx::query_as::<_, Commission>(
            r#"
            SELECT commission_id, agent_id, invoice_id, commission_type_id,
                fixed_amount, percentage_rate, total_commission, status, paid_at, created_utc
            FROM commissions
            WHERE agent_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list commissions: {}", e))
        })?;

        Ok(commissions)
    }

    /// Mark a pending commission paid. Terminal.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn mark_commission_paid(
        &self,
        commission_id: Uuid,
    ) -> Result<Option<Commission>, AppError> {
        self.transition_commission(commission_id, CommissionStatus::Paid)
            .await
    }

    /// Cancel a pending commission. Terminal.
    #[instrument(skip(self), fields(commission_id = %commission_id))]
    pub async fn cancel_commission(
        &self,
        commission_id: Uuid,
    ) -> Result<Option<Commission>, AppError> {
        self.transition_commission(commission_id, CommissionStatus::Cancelled)
            .await
    }

    async fn transition_commission(
        &self,
        commission_id: Uuid,
        next: CommissionStatus,
    ) -> Result<Option<Commission>, AppError> {
        let existing = match self.get_commission(commission_id).await? {
            Some(commission) => commission,
            None => return Ok(None),
        };
        if CommissionStatus::from_string(&existing.status) != CommissionStatus::Pending {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only pending commissions can transition to '{}'",
                next.as_str()
            )));
        }

        let paid_at = matches!(next, CommissionStatus::Paid);
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            UPDATE commissions
            SET status = $2,
                paid_at = CASE WHEN $3 THEN NOW() ELSE paid_at END
            WHERE commission_id = $1 AND status = 'pending'
            RETURNING commission_id, agent_id, invoice_id, commission_type_id,
                fixed_amount, percentage_rate, total_commission, status, paid_at, created_utc
            "#,
        )
        .bind(commission_id)
        .bind(next.as_str())
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update commission: {}", e))
        })?;

        if let Some(ref c) = commission {
            crate::services::metrics::COMMISSIONS_TOTAL
                .with_label_values(&[&c.status])
                .inc();
            info!(commission_id = %c.commission_id, status = %c.status, "Commission updated");
        }

        Ok(commission)
    }

    // -------------------------------------------------------------------------
    // Payment Read Operations (writes live in services::payments)
    // -------------------------------------------------------------------------

    /// Get a payment by ID.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        Ok(payment)
    }

    /// Get a payment by its gateway bill code.
    #[instrument(skip(self), fields(bill_code = %bill_code))]
    pub async fn get_payment_by_bill_code(
        &self,
        bill_code: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
            FROM payments
            WHERE bill_code = $1
            "#,
        )
        .bind(bill_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        Ok(payment)
    }

    /// List payments against an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_payments_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
            FROM payments
            WHERE invoice_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        Ok(payments)
    }
}
