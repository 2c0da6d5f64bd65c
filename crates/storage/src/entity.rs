pub mod info {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "info")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub key: String,
        pub value: String,
        #[sea_orm(column_name = "type")]
        pub row_type: String,
        pub is_active: bool,
        pub note: Option<String>,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod wallet_state {
    use sea_orm::entity::prelude::*;

    /// Balances are kept as exact decimal text.
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "wallet_state")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub wallet_address: String,
        pub balance: String,
        pub balance_change: String,
        pub network_env: String,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
