pub mod file_mod_times {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "file_mod_times")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub file_path: String,
        pub last_mod_time: DateTimeUtc,
        pub last_offset: i64,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
