use sea_orm::sea_query::{ColumnDef, Index, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::{info, wallet_state};
use healthwatch_domain::storage::{StorageError, StorageResult};

const WALLET_STATE_UNIQUE_INDEX: &str = "idx_wallet_state_address_network";

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let info_table = Table::create()
        .table(info::Entity)
        .col(
            ColumnDef::new(info::Column::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(info::Column::Key).string().not_null())
        .col(ColumnDef::new(info::Column::Value).text().not_null())
        .col(
            ColumnDef::new(info::Column::RowType)
                .string_len(32)
                .not_null(),
        )
        .col(
            ColumnDef::new(info::Column::IsActive)
                .boolean()
                .not_null()
                .default(true),
        )
        .col(ColumnDef::new(info::Column::Note).text().null())
        .to_owned();
    create_table(db, backend, info_table).await?;

    let wallet_table = Table::create()
        .table(wallet_state::Entity)
        .col(
            ColumnDef::new(wallet_state::Column::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(wallet_state::Column::WalletAddress)
                .string()
                .not_null(),
        )
        .col(
            ColumnDef::new(wallet_state::Column::Balance)
                .string()
                .not_null(),
        )
        .col(
            ColumnDef::new(wallet_state::Column::BalanceChange)
                .string()
                .not_null(),
        )
        .col(
            ColumnDef::new(wallet_state::Column::NetworkEnv)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(wallet_state::Column::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned();
    create_table(db, backend, wallet_table).await?;

    let unique_wallet = Index::create()
        .if_not_exists()
        .name(WALLET_STATE_UNIQUE_INDEX)
        .table(wallet_state::Entity)
        .col(wallet_state::Column::WalletAddress)
        .col(wallet_state::Column::NetworkEnv)
        .unique()
        .to_owned();
    db.execute(backend.build(&unique_wallet))
        .await
        .map_err(StorageError::from_source)?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
