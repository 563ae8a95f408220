use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_quote_tables::Migration),
            Box::new(m20240301_000002_create_settlement_tables::Migration),
            Box::new(m20240301_000003_create_purchase_order_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_quote_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_quote_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Quotes::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Quotes::Title).string().not_null())
                        .col(ColumnDef::new(Quotes::Description).text())
                        .col(ColumnDef::new(Quotes::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Quotes::Deadline).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Quotes::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Quotes::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Quotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Quotes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotes::ClosedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quotes_tenant_status")
                        .table(Quotes::Table)
                        .col(Quotes::TenantId)
                        .col(Quotes::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuoteItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(QuoteItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(QuoteItems::TenantId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::PackageId).uuid())
                        .col(ColumnDef::new(QuoteItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(QuoteItems::Notes).text())
                        .col(
                            ColumnDef::new(QuoteItems::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(QuoteItems::WinnerSupplierId).uuid())
                        .col(ColumnDef::new(QuoteItems::WinnerResponseId).uuid())
                        .col(ColumnDef::new(QuoteItems::WinnerReason).text())
                        .col(ColumnDef::new(QuoteItems::WinnerSetAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(QuoteItems::WinnerSetBy).uuid())
                        .col(
                            ColumnDef::new(QuoteItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quote_items_quote")
                                .from(QuoteItems::Table, QuoteItems::QuoteId)
                                .to(Quotes::Table, Quotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_quote_items_quote")
                        .table(QuoteItems::Table)
                        .col(QuoteItems::QuoteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuoteInvitations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteInvitations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteInvitations::TenantId).uuid().not_null())
                        .col(ColumnDef::new(QuoteInvitations::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteInvitations::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(QuoteInvitations::PublicToken)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteInvitations::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteInvitations::ContactEmail).string())
                        .col(
                            ColumnDef::new(QuoteInvitations::InvitedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteInvitations::LastAccessAt)
                                .timestamp_with_time_zone(),
                        )
                        .col(
                            ColumnDef::new(QuoteInvitations::SubmittedAt)
                                .timestamp_with_time_zone(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quote_invitations_quote")
                                .from(QuoteInvitations::Table, QuoteInvitations::QuoteId)
                                .to(Quotes::Table, Quotes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // One invitation per (quote, supplier); the token is the
            // supplier's bearer credential and must be unique.
            manager
                .create_index(
                    Index::create()
                        .name("uq_quote_invitations_quote_supplier")
                        .table(QuoteInvitations::Table)
                        .col(QuoteInvitations::QuoteId)
                        .col(QuoteInvitations::SupplierId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_quote_invitations_token")
                        .table(QuoteInvitations::Table)
                        .col(QuoteInvitations::PublicToken)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuoteResponses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteResponses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteResponses::TenantId).uuid().not_null())
                        .col(ColumnDef::new(QuoteResponses::InvitationId).uuid().not_null())
                        .col(ColumnDef::new(QuoteResponses::QuoteItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(QuoteResponses::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteResponses::MinOrderQuantity).integer())
                        .col(ColumnDef::new(QuoteResponses::DeliveryDays).integer())
                        .col(ColumnDef::new(QuoteResponses::Note).text())
                        .col(
                            ColumnDef::new(QuoteResponses::FilledAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quote_responses_invitation")
                                .from(QuoteResponses::Table, QuoteResponses::InvitationId)
                                .to(QuoteInvitations::Table, QuoteInvitations::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quote_responses_item")
                                .from(QuoteResponses::Table, QuoteResponses::QuoteItemId)
                                .to(QuoteItems::Table, QuoteItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Upsert target: at most one bid per (invitation, item).
            manager
                .create_index(
                    Index::create()
                        .name("uq_quote_responses_invitation_item")
                        .table(QuoteResponses::Table)
                        .col(QuoteResponses::InvitationId)
                        .col(QuoteResponses::QuoteItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuoteResponses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuoteInvitations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Quotes::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Quotes {
        Table,
        Id,
        TenantId,
        Title,
        Description,
        Status,
        Deadline,
        IsDeleted,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        ClosedAt,
    }

    #[derive(DeriveIden)]
    enum QuoteItems {
        Table,
        Id,
        TenantId,
        QuoteId,
        ProductId,
        PackageId,
        Quantity,
        Notes,
        SortOrder,
        WinnerSupplierId,
        WinnerResponseId,
        WinnerReason,
        WinnerSetAt,
        WinnerSetBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum QuoteInvitations {
        Table,
        Id,
        TenantId,
        QuoteId,
        SupplierId,
        PublicToken,
        Status,
        ContactEmail,
        InvitedAt,
        LastAccessAt,
        SubmittedAt,
    }

    #[derive(DeriveIden)]
    enum QuoteResponses {
        Table,
        Id,
        TenantId,
        InvitationId,
        QuoteItemId,
        Price,
        MinOrderQuantity,
        DeliveryDays,
        Note,
        FilledAt,
    }
}

mod m20240301_000002_create_settlement_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_settlement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuoteSnapshots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteSnapshots::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuoteSnapshots::TenantId).uuid().not_null())
                        .col(ColumnDef::new(QuoteSnapshots::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteSnapshots::Payload).json().not_null())
                        .col(ColumnDef::new(QuoteSnapshots::ItemCount).integer().not_null())
                        .col(
                            ColumnDef::new(QuoteSnapshots::SupplierCount)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteSnapshots::ResponseCount)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteSnapshots::TotalValue)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuoteSnapshots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Write-once: a second snapshot for the same quote is a
            // rejected re-closure, enforced at the storage layer too.
            manager
                .create_index(
                    Index::create()
                        .name("uq_quote_snapshots_quote")
                        .table(QuoteSnapshots::Table)
                        .col(QuoteSnapshots::QuoteId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PriceHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PriceHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PriceHistory::TenantId).uuid().not_null())
                        .col(ColumnDef::new(PriceHistory::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PriceHistory::PackageId).uuid())
                        .col(ColumnDef::new(PriceHistory::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(PriceHistory::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PriceHistory::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(PriceHistory::QuoteItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(PriceHistory::RecordedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_price_history_tenant_product")
                        .table(PriceHistory::Table)
                        .col(PriceHistory::TenantId)
                        .col(PriceHistory::ProductId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PriceHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuoteSnapshots::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum QuoteSnapshots {
        Table,
        Id,
        TenantId,
        QuoteId,
        Payload,
        ItemCount,
        SupplierCount,
        ResponseCount,
        TotalValue,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PriceHistory {
        Table,
        Id,
        TenantId,
        ProductId,
        PackageId,
        SupplierId,
        Price,
        QuoteId,
        QuoteItemId,
        RecordedAt,
    }
}

mod m20240301_000003_create_purchase_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::TenantId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::PoNumber)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Subtotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::TaxAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ShippingCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::DeliveryAddress).text())
                        .col(ColumnDef::new(PurchaseOrders::PaymentTerms).string())
                        .col(ColumnDef::new(PurchaseOrders::Notes).text())
                        .col(
                            ColumnDef::new(PurchaseOrders::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_purchase_orders_tenant_po_number")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::TenantId)
                        .col(PurchaseOrders::PoNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderItems::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrderItems::PackageId).uuid())
                        .col(ColumnDef::new(PurchaseOrderItems::QuoteItemId).uuid())
                        .col(ColumnDef::new(PurchaseOrderItems::QuoteResponseId).uuid())
                        .col(ColumnDef::new(PurchaseOrderItems::Description).text())
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_items_order")
                                .from(
                                    PurchaseOrderItems::Table,
                                    PurchaseOrderItems::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_order_items_order")
                        .table(PurchaseOrderItems::Table)
                        .col(PurchaseOrderItems::PurchaseOrderId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        TenantId,
        QuoteId,
        SupplierId,
        PoNumber,
        Status,
        Subtotal,
        TaxAmount,
        ShippingCost,
        TotalAmount,
        DeliveryAddress,
        PaymentTerms,
        Notes,
        IsDeleted,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        TenantId,
        PurchaseOrderId,
        ProductId,
        PackageId,
        QuoteItemId,
        QuoteResponseId,
        Description,
        Quantity,
        UnitPrice,
        TotalPrice,
        CreatedAt,
        UpdatedAt,
    }
}
