use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_access_tables::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_orders_tables::Migration),
            Box::new(m20240101_000004_create_inventory_tables::Migration),
            Box::new(m20240101_000005_create_staff_tables::Migration),
            Box::new(m20240101_000006_create_production_table::Migration),
            Box::new(m20240101_000007_create_ledger_table::Migration),
            Box::new(m20240101_000008_create_settings_and_notifications::Migration),
        ]
    }
}

fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 4)
        .not_null()
        .default(0)
        .to_owned()
}

fn created_at(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

mod m20240101_000001_create_access_tables {
    use super::created_at;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_access_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Email)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::FullName).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(created_at(Users::CreatedAt))
                        .col(created_at(Users::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RolePermissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RolePermissions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RolePermissions::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(RolePermissions::Module)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RolePermissions::CanView).boolean().not_null())
                        .col(ColumnDef::new(RolePermissions::CanCreate).boolean().not_null())
                        .col(ColumnDef::new(RolePermissions::CanEdit).boolean().not_null())
                        .col(ColumnDef::new(RolePermissions::CanDelete).boolean().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_role_permissions_role_module")
                        .table(RolePermissions::Table)
                        .col(RolePermissions::Role)
                        .col(RolePermissions::Module)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserPermissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserPermissions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(UserPermissions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(UserPermissions::Module)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(UserPermissions::CanView).boolean().not_null())
                        .col(ColumnDef::new(UserPermissions::CanCreate).boolean().not_null())
                        .col(ColumnDef::new(UserPermissions::CanEdit).boolean().not_null())
                        .col(ColumnDef::new(UserPermissions::CanDelete).boolean().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_permissions_user")
                                .from(UserPermissions::Table, UserPermissions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_user_permissions_user_module")
                        .table(UserPermissions::Table)
                        .col(UserPermissions::UserId)
                        .col(UserPermissions::Module)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Username).string().null())
                        .col(ColumnDef::new(AuditLogs::Action).string_len(32).not_null())
                        .col(ColumnDef::new(AuditLogs::EntityType).string_len(32).not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).string().null())
                        .col(ColumnDef::new(AuditLogs::Details).json().null())
                        .col(created_at(AuditLogs::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_created_at")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LoginLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(LoginLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(LoginLogs::UserId).uuid().null())
                        .col(ColumnDef::new(LoginLogs::Username).string().not_null())
                        .col(ColumnDef::new(LoginLogs::Success).boolean().not_null())
                        .col(ColumnDef::new(LoginLogs::IpAddress).string().null())
                        .col(ColumnDef::new(LoginLogs::UserAgent).string().null())
                        .col(created_at(LoginLogs::CreatedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LoginLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserPermissions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RolePermissions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Username,
        Email,
        FullName,
        PasswordHash,
        Role,
        IsActive,
        LastLoginAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RolePermissions {
        Table,
        Id,
        Role,
        Module,
        CanView,
        CanCreate,
        CanEdit,
        CanDelete,
    }

    #[derive(DeriveIden)]
    enum UserPermissions {
        Table,
        Id,
        UserId,
        Module,
        CanView,
        CanCreate,
        CanEdit,
        CanDelete,
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        UserId,
        Username,
        Action,
        EntityType,
        EntityId,
        Details,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum LoginLogs {
        Table,
        Id,
        UserId,
        Username,
        Success,
        IpAddress,
        UserAgent,
        CreatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Category).string_len(64).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(ColumnDef::new(Products::Unit).string_len(32).not_null())
                        .col(money(Products::Price))
                        .col(money(Products::Cost))
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::ImagePath).string().null())
                        .col(created_at(Products::CreatedAt))
                        .col(created_at(Products::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category")
                        .table(Products::Table)
                        .col(Products::Category)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Phone).string_len(32).null())
                        .col(ColumnDef::new(Customers::Email).string().null())
                        .col(ColumnDef::new(Customers::Address).text().null())
                        .col(money(Customers::OpeningBalance))
                        .col(money(Customers::CurrentBalance))
                        .col(ColumnDef::new(Customers::Notes).text().null())
                        .col(created_at(Customers::CreatedAt))
                        .col(created_at(Customers::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parties::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parties::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parties::Name).string().not_null())
                        .col(ColumnDef::new(Parties::Company).string().null())
                        .col(ColumnDef::new(Parties::Phone).string_len(32).null())
                        .col(ColumnDef::new(Parties::Email).string().null())
                        .col(ColumnDef::new(Parties::Address).text().null())
                        .col(ColumnDef::new(Parties::TaxId).string_len(64).null())
                        .col(money(Parties::OpeningBalance))
                        .col(money(Parties::CurrentBalance))
                        .col(ColumnDef::new(Parties::Notes).text().null())
                        .col(created_at(Parties::CreatedAt))
                        .col(created_at(Parties::UpdatedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Parties::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        Id,
        Name,
        Sku,
        Category,
        Description,
        Unit,
        Price,
        Cost,
        IsActive,
        ImagePath,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Customers {
        Table,
        Id,
        Name,
        Phone,
        Email,
        Address,
        OpeningBalance,
        CurrentBalance,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Parties {
        Table,
        Id,
        Name,
        Company,
        Phone,
        Email,
        Address,
        TaxId,
        OpeningBalance,
        CurrentBalance,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_orders_tables {
    use super::m20240101_000002_create_catalog_tables::{Customers, Products};
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string_len(32).null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::DeliveryDate).date().null())
                        .col(money(Orders::TotalAmount))
                        .col(money(Orders::AmountPaid))
                        .col(ColumnDef::new(Orders::PaymentStatus).string_len(16).not_null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().null())
                        .col(created_at(Orders::CreatedAt))
                        .col(created_at(Orders::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_customer")
                                .from(Orders::Table, Orders::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(money(OrderItems::Quantity))
                        .col(money(OrderItems::UnitPrice))
                        .col(money(OrderItems::LineTotal))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderPayments::OrderId).uuid().not_null())
                        .col(money(OrderPayments::Amount))
                        .col(ColumnDef::new(OrderPayments::Note).string().null())
                        .col(ColumnDef::new(OrderPayments::RecordedBy).uuid().null())
                        .col(created_at(OrderPayments::ReceivedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_payments_order")
                                .from(OrderPayments::Table, OrderPayments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        CustomerName,
        CustomerPhone,
        Status,
        DeliveryDate,
        TotalAmount,
        AmountPaid,
        PaymentStatus,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum OrderPayments {
        Table,
        Id,
        OrderId,
        Amount,
        Note,
        RecordedBy,
        ReceivedAt,
    }
}

mod m20240101_000004_create_inventory_tables {
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Sku)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Category)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Unit).string_len(32).not_null())
                        .col(money(InventoryItems::Quantity))
                        .col(money(InventoryItems::ReorderLevel))
                        .col(money(InventoryItems::UnitCost))
                        .col(ColumnDef::new(InventoryItems::ProductId).uuid().null())
                        .col(ColumnDef::new(InventoryItems::SupplierId).uuid().null())
                        .col(created_at(InventoryItems::CreatedAt))
                        .col(created_at(InventoryItems::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_product_id")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::ItemId).uuid().not_null())
                        .col(money(InventoryMovements::Delta))
                        .col(money(InventoryMovements::QuantityAfter))
                        .col(
                            ColumnDef::new(InventoryMovements::Reason)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryMovements::Reference).string().null())
                        .col(ColumnDef::new(InventoryMovements::CreatedBy).uuid().null())
                        .col(created_at(InventoryMovements::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_movements_item")
                                .from(InventoryMovements::Table, InventoryMovements::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_movements_item_id")
                        .table(InventoryMovements::Table)
                        .col(InventoryMovements::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryItems {
        Table,
        Id,
        Name,
        Sku,
        Category,
        Unit,
        Quantity,
        ReorderLevel,
        UnitCost,
        ProductId,
        SupplierId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InventoryMovements {
        Table,
        Id,
        ItemId,
        Delta,
        QuantityAfter,
        Reason,
        Reference,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240101_000005_create_staff_tables {
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_staff_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Staff::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Staff::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Staff::Name).string().not_null())
                        .col(ColumnDef::new(Staff::Position).string().not_null())
                        .col(ColumnDef::new(Staff::Phone).string_len(32).null())
                        .col(ColumnDef::new(Staff::SalaryType).string_len(16).not_null())
                        .col(money(Staff::SalaryAmount))
                        .col(ColumnDef::new(Staff::JoinDate).date().not_null())
                        .col(
                            ColumnDef::new(Staff::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(created_at(Staff::CreatedAt))
                        .col(created_at(Staff::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Attendance::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Attendance::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Attendance::StaffId).uuid().not_null())
                        .col(ColumnDef::new(Attendance::Date).date().not_null())
                        .col(ColumnDef::new(Attendance::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Attendance::CheckIn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Attendance::CheckOut)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(money(Attendance::HoursWorked))
                        .col(ColumnDef::new(Attendance::Notes).string().null())
                        .col(created_at(Attendance::CreatedAt))
                        .col(created_at(Attendance::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_attendance_staff")
                                .from(Attendance::Table, Attendance::StaffId)
                                .to(Staff::Table, Staff::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_attendance_staff_date")
                        .table(Attendance::Table)
                        .col(Attendance::StaffId)
                        .col(Attendance::Date)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Attendance::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Staff::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Staff {
        Table,
        Id,
        Name,
        Position,
        Phone,
        SalaryType,
        SalaryAmount,
        JoinDate,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Attendance {
        Table,
        Id,
        StaffId,
        Date,
        Status,
        CheckIn,
        CheckOut,
        HoursWorked,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_production_table {
    use super::m20240101_000002_create_catalog_tables::Products;
    use super::m20240101_000005_create_staff_tables::Staff;
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_production_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionSchedule::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionSchedule::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionSchedule::ProductId).uuid().not_null())
                        .col(money(ProductionSchedule::Quantity))
                        .col(
                            ColumnDef::new(ProductionSchedule::ScheduledDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSchedule::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionSchedule::AssignedTo).uuid().null())
                        .col(ColumnDef::new(ProductionSchedule::Notes).text().null())
                        .col(
                            ColumnDef::new(ProductionSchedule::StartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSchedule::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(created_at(ProductionSchedule::CreatedAt))
                        .col(created_at(ProductionSchedule::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_product")
                                .from(ProductionSchedule::Table, ProductionSchedule::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_staff")
                                .from(ProductionSchedule::Table, ProductionSchedule::AssignedTo)
                                .to(Staff::Table, Staff::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_scheduled_date")
                        .table(ProductionSchedule::Table)
                        .col(ProductionSchedule::ScheduledDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionSchedule::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionSchedule {
        Table,
        Id,
        ProductId,
        Quantity,
        ScheduledDate,
        Status,
        AssignedTo,
        Notes,
        StartedAt,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_ledger_table {
    use super::{created_at, money};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_ledger_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LedgerTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerTransactions::EntityType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerTransactions::EntityId).uuid().not_null())
                        .col(ColumnDef::new(LedgerTransactions::TxnDate).date().not_null())
                        .col(
                            ColumnDef::new(LedgerTransactions::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerTransactions::Reference).string().null())
                        .col(money(LedgerTransactions::Debit))
                        .col(money(LedgerTransactions::Credit))
                        .col(money(LedgerTransactions::Balance))
                        .col(ColumnDef::new(LedgerTransactions::OrderId).uuid().null())
                        .col(ColumnDef::new(LedgerTransactions::CreatedBy).uuid().null())
                        .col(created_at(LedgerTransactions::CreatedAt))
                        .col(created_at(LedgerTransactions::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            // Replay order for running balances
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ledger_entity_chronology")
                        .table(LedgerTransactions::Table)
                        .col(LedgerTransactions::EntityType)
                        .col(LedgerTransactions::EntityId)
                        .col(LedgerTransactions::TxnDate)
                        .col(LedgerTransactions::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LedgerTransactions {
        Table,
        Id,
        EntityType,
        EntityId,
        TxnDate,
        Description,
        Reference,
        Debit,
        Credit,
        Balance,
        OrderId,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000008_create_settings_and_notifications {
    use super::created_at;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_settings_and_notifications"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Settings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Settings::Key)
                                .string_len(64)
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Settings::Value).json().not_null())
                        .col(ColumnDef::new(Settings::UpdatedBy).uuid().null())
                        .col(created_at(Settings::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Notifications::Title).string().not_null())
                        .col(ColumnDef::new(Notifications::Message).text().not_null())
                        .col(ColumnDef::new(Notifications::Kind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Notifications::IsRead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(created_at(Notifications::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_created_at")
                        .table(Notifications::Table)
                        .col(Notifications::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Settings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Settings {
        Table,
        Key,
        Value,
        UpdatedBy,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        Title,
        Message,
        Kind,
        IsRead,
        CreatedAt,
    }
}
